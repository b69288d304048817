//! Checkout repository.
//!
//! State transitions are decided in `folio_core::checkout`; the SQL here
//! re-checks the source state in its `WHERE` clause so two concurrent
//! requests cannot both pay or both finalize the same checkout.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use folio_core::cart::CartItem;
use folio_core::checkout::{Checkout, ShippingAddress};
use folio_core::order::Order;
use folio_core::{CheckoutId, Money, UserId};

use super::{RepositoryError, orders};

const CHECKOUT_COLUMNS: &str = "id, user_id, checkout_items, shipping_address, payment_method, \
     total_price, is_paid, paid_at, payment_status, payment_details, is_finalized, \
     finalized_at, created_at, updated_at";

/// Internal row type for `PostgreSQL` checkout queries.
#[derive(Debug, sqlx::FromRow)]
struct CheckoutRow {
    id: CheckoutId,
    user_id: UserId,
    checkout_items: Json<Vec<CartItem>>,
    shipping_address: Json<ShippingAddress>,
    payment_method: String,
    total_price: Money,
    is_paid: bool,
    paid_at: Option<DateTime<Utc>>,
    payment_status: String,
    payment_details: Option<serde_json::Value>,
    is_finalized: bool,
    finalized_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CheckoutRow> for Checkout {
    fn from(row: CheckoutRow) -> Self {
        Self {
            id: row.id,
            user: row.user_id,
            checkout_items: row.checkout_items.0,
            shipping_address: row.shipping_address.0,
            payment_method: row.payment_method,
            total_price: row.total_price,
            is_paid: row.is_paid,
            paid_at: row.paid_at,
            payment_status: row.payment_status,
            payment_details: row.payment_details,
            is_finalized: row.is_finalized,
            finalized_at: row.finalized_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for checkout database operations.
pub struct CheckoutRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CheckoutRepository<'a> {
    /// Create a new checkout repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a freshly created checkout.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, checkout: &Checkout) -> Result<Checkout, RepositoryError> {
        let row = sqlx::query_as::<_, CheckoutRow>(&format!(
            r"
            INSERT INTO checkouts (
                id, user_id, checkout_items, shipping_address, payment_method,
                total_price, is_paid, paid_at, payment_status, payment_details,
                is_finalized, finalized_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {CHECKOUT_COLUMNS}
            "
        ))
        .bind(checkout.id)
        .bind(checkout.user)
        .bind(Json(&checkout.checkout_items))
        .bind(Json(&checkout.shipping_address))
        .bind(&checkout.payment_method)
        .bind(checkout.total_price)
        .bind(checkout.is_paid)
        .bind(checkout.paid_at)
        .bind(&checkout.payment_status)
        .bind(&checkout.payment_details)
        .bind(checkout.is_finalized)
        .bind(checkout.finalized_at)
        .bind(checkout.created_at)
        .bind(checkout.updated_at)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Get a checkout by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CheckoutId) -> Result<Option<Checkout>, RepositoryError> {
        let row = sqlx::query_as::<_, CheckoutRow>(&format!(
            "SELECT {CHECKOUT_COLUMNS} FROM checkouts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Checkout::from))
    }

    /// Persist a `Created → Paid` transition.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the checkout was paid in the meantime.
    pub async fn save_payment(&self, checkout: &Checkout) -> Result<Checkout, RepositoryError> {
        let row = sqlx::query_as::<_, CheckoutRow>(&format!(
            r"
            UPDATE checkouts
            SET is_paid = TRUE, paid_at = $2, payment_status = $3,
                payment_details = $4, payment_method = $5, updated_at = $6
            WHERE id = $1 AND NOT is_paid
            RETURNING {CHECKOUT_COLUMNS}
            "
        ))
        .bind(checkout.id)
        .bind(checkout.paid_at)
        .bind(&checkout.payment_status)
        .bind(&checkout.payment_details)
        .bind(&checkout.payment_method)
        .bind(checkout.updated_at)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| RepositoryError::Conflict("checkout is already paid".to_owned()))?;

        Ok(row.into())
    }

    /// Persist a `Paid → Finalized` transition: mark the checkout, insert
    /// the order and delete the owner's cart, all in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the checkout was finalized in
    /// the meantime; nothing is written in that case.
    pub async fn finalize(
        &self,
        checkout: &Checkout,
        order: &Order,
    ) -> Result<(Checkout, Order), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CheckoutRow>(&format!(
            r"
            UPDATE checkouts
            SET is_finalized = TRUE, finalized_at = $2, updated_at = $3
            WHERE id = $1 AND is_paid AND NOT is_finalized
            RETURNING {CHECKOUT_COLUMNS}
            "
        ))
        .bind(checkout.id)
        .bind(checkout.finalized_at)
        .bind(checkout.updated_at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::Conflict("checkout is already finalized".to_owned()))?;

        let order = orders::insert(&mut *tx, order).await?;

        sqlx::query("DELETE FROM carts WHERE user_id = $1")
            .bind(checkout.user)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            checkout_id = %checkout.id,
            order_id = %order.id,
            "Checkout finalized"
        );
        Ok((row.into(), order))
    }
}
