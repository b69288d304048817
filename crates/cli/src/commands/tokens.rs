//! Bearer token housekeeping.

use folio_storefront::db::TokenRepository;

use super::{CliError, connect};

/// Delete every expired bearer token.
///
/// # Errors
///
/// Returns an error if the database is unreachable.
pub async fn prune() -> Result<(), CliError> {
    let pool = connect().await?;
    let removed = TokenRepository::new(&pool).delete_expired().await?;
    tracing::info!(removed, "Expired tokens pruned");
    Ok(())
}
