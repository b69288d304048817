//! Account management commands.
//!
//! ```bash
//! folio-cli user promote ada@example.com
//! ```

use folio_core::{Email, UserRole};
use folio_storefront::db::{RepositoryError, UserRepository};

use super::{CliError, connect};

/// Grant the administrator role to an existing account.
///
/// # Errors
///
/// Returns `CliError::UserNotFound` if no account has that email.
pub async fn promote(email: &str) -> Result<(), CliError> {
    let email = Email::parse(email)?;
    let pool = connect().await?;

    let user = UserRepository::new(&pool)
        .set_role(&email, UserRole::Admin)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => CliError::UserNotFound(email.to_string()),
            other => other.into(),
        })?;

    tracing::info!(user_id = %user.id, email = %user.email, "User promoted to admin");
    Ok(())
}
