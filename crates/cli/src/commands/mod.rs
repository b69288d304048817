//! CLI command implementations.
//!
//! Every command reads `FOLIO_DATABASE_URL` (falling back to `DATABASE_URL`),
//! loading a `.env` file first if one is present.

pub mod migrate;
pub mod seed;
pub mod tokens;
pub mod user;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use folio_core::EmailError;
use folio_core::product::ProductError;
use folio_storefront::db::{self, RepositoryError};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Repository operation failed.
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    /// Seed file could not be read.
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Seed file is not valid JSON for products.
    #[error("Invalid seed file: {0}")]
    Json(#[from] serde_json::Error),

    /// A seeded product failed validation.
    #[error("Product #{index} is invalid: {source}")]
    InvalidProduct { index: usize, source: ProductError },

    /// Email argument is malformed.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// No user has the given email.
    #[error("No user with email {0}")]
    UserNotFound(String),
}

/// Connect to the storefront database.
///
/// # Errors
///
/// Returns `CliError::MissingEnvVar` if no database URL is configured.
pub async fn connect() -> Result<PgPool, CliError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("FOLIO_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("FOLIO_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&database_url).await?)
}
