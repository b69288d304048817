//! Folio CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! folio-cli migrate
//!
//! # Load the catalog from a JSON file, replacing what is there
//! folio-cli seed products data/products.json --owner admin@example.com --clear
//!
//! # Make an existing account an administrator
//! folio-cli user promote admin@example.com
//!
//! # Remove expired bearer tokens
//! folio-cli prune-tokens
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "folio-cli")]
#[command(author, version, about = "Folio CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Delete expired bearer tokens
    PruneTokens,
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert products from a JSON file
    Products {
        /// Path to a JSON array of products
        file: String,

        /// Email of the account recorded as the products' creator
        #[arg(short, long)]
        owner: String,

        /// Delete all existing products first
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Grant the admin role to an existing account
    Promote {
        /// Account email address
        email: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await,
        Commands::Seed { target } => match target {
            SeedTarget::Products { file, owner, clear } => {
                commands::seed::products(&file, &owner, clear).await
            }
        },
        Commands::User { action } => match action {
            UserAction::Promote { email } => commands::user::promote(&email).await,
        },
        Commands::PruneTokens => commands::tokens::prune().await,
    }
}
