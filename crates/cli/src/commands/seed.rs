//! Seed the catalog from a JSON file.
//!
//! The file holds an array of product objects in the same camelCase shape the
//! `POST /api/products` endpoint accepts:
//!
//! ```json
//! [{ "name": "Dune", "price": 9.99, "countInStock": 12, "sku": "BK-001",
//!    "category": "Fiction", "publisher": "Ace" }]
//! ```
//!
//! Seeded products are recorded as created by the user named with
//! `--owner`, which should be an administrator.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use folio_core::product::{Product, ProductDraft};
use folio_core::{Email, UserId};
use folio_storefront::db::{ProductRepository, UserRepository};

use super::{CliError, connect};

/// Seed products from `file_path`.
///
/// # Arguments
///
/// * `file_path` - Path to the JSON product list
/// * `owner` - Email of the user recorded as the products' creator
/// * `clear_existing` - If true, delete every existing product first
///
/// # Errors
///
/// Returns an error if the file is unreadable or invalid, the owner does not
/// exist, or a database operation fails. Nothing is inserted unless every
/// product validates.
pub async fn products(file_path: &str, owner: &str, clear_existing: bool) -> Result<(), CliError> {
    let owner = Email::parse(owner)?;

    info!(path = %file_path, "Loading products from file");
    let content = tokio::fs::read_to_string(Path::new(file_path))
        .await
        .map_err(|source| CliError::Io {
            path: file_path.to_owned(),
            source,
        })?;

    let pool = connect().await?;
    let owner = UserRepository::new(&pool)
        .get_by_email(&owner)
        .await?
        .ok_or_else(|| CliError::UserNotFound(owner.to_string()))?;
    if !owner.is_admin() {
        warn!(email = %owner.email, "Seed owner is not an administrator");
    }

    // Validate everything before touching the catalog
    let products = parse_products(&content, owner.id, Utc::now())?;
    info!(count = products.len(), "Parsed products");

    let repo = ProductRepository::new(&pool);
    if clear_existing {
        let removed = repo.delete_all().await?;
        info!(removed, "Cleared existing products");
    }

    let inserted = repo.insert_many(&products).await?;
    info!(inserted, "Seeding complete");
    Ok(())
}

fn parse_products(
    content: &str,
    owner: UserId,
    now: DateTime<Utc>,
) -> Result<Vec<Product>, CliError> {
    let drafts: Vec<ProductDraft> = serde_json::from_str(content)?;
    drafts
        .into_iter()
        .enumerate()
        .map(|(index, draft)| {
            draft
                .into_product(owner, now)
                .map_err(|source| CliError::InvalidProduct { index, source })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_products() {
        let owner = UserId::new();
        let products = parse_products(
            r#"[
                {"name": "Dune", "price": 9.99, "countInStock": 3, "sku": "BK-1", "category": "Fiction"},
                {"name": "Emma", "price": 5, "sku": "BK-2", "category": "Classics", "publisher": "Penguin"}
            ]"#,
            owner,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].created_by, Some(owner));
        assert_eq!(products[1].publisher.as_deref(), Some("Penguin"));
    }

    #[test]
    fn test_invalid_product_reports_index() {
        let err = parse_products(
            r#"[
                {"name": "Dune", "price": 9.99, "sku": "BK-1", "category": "Fiction"},
                {"name": "Gone", "price": 1, "countInStock": -1, "sku": "BK-2", "category": "Fiction"}
            ]"#,
            UserId::new(),
            Utc::now(),
        )
        .unwrap_err();

        assert!(matches!(err, CliError::InvalidProduct { index: 1, .. }));
    }

    #[test]
    fn test_not_an_array() {
        let err = parse_products(r#"{"name": "Dune"}"#, UserId::new(), Utc::now()).unwrap_err();
        assert!(matches!(err, CliError::Json(_)));
    }
}
