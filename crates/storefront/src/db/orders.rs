//! Order repository.
//!
//! Orders are only ever inserted by checkout finalization (see
//! [`super::CheckoutRepository::finalize`]); afterwards only the
//! fulfilment fields change.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use folio_core::cart::CartItem;
use folio_core::checkout::ShippingAddress;
use folio_core::order::Order;
use folio_core::{CheckoutId, Money, OrderId, OrderStatus, UserId};

use super::RepositoryError;

const ORDER_COLUMNS: &str = "id, user_id, checkout_id, order_items, shipping_address, \
     payment_method, total_price, is_paid, paid_at, payment_status, payment_details, \
     is_delivered, delivered_at, status, created_at, updated_at";

/// Internal row type for `PostgreSQL` order queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    checkout_id: CheckoutId,
    order_items: Json<Vec<CartItem>>,
    shipping_address: Json<ShippingAddress>,
    payment_method: String,
    total_price: Money,
    is_paid: bool,
    paid_at: Option<DateTime<Utc>>,
    payment_status: String,
    payment_details: Option<serde_json::Value>,
    is_delivered: bool,
    delivered_at: Option<DateTime<Utc>>,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            user: row.user_id,
            checkout_id: row.checkout_id,
            order_items: row.order_items.0,
            shipping_address: row.shipping_address.0,
            payment_method: row.payment_method,
            total_price: row.total_price,
            is_paid: row.is_paid,
            paid_at: row.paid_at,
            payment_status: row.payment_status,
            payment_details: row.payment_details,
            is_delivered: row.is_delivered,
            delivered_at: row.delivered_at,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// Every order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    /// Persist the fulfilment fields of `order`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn update_status(&self, order: &Order) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE orders
            SET status = $2, is_delivered = $3, delivered_at = $4, updated_at = $5
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.id)
        .bind(order.status)
        .bind(order.is_delivered)
        .bind(order.delivered_at)
        .bind(order.updated_at)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn delete(&self, id: OrderId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Insert an order on an open connection or transaction.
pub(super) async fn insert(conn: &mut PgConnection, order: &Order) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        r"
        INSERT INTO orders (
            id, user_id, checkout_id, order_items, shipping_address,
            payment_method, total_price, is_paid, paid_at, payment_status,
            payment_details, is_delivered, delivered_at, status, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(order.id)
    .bind(order.user)
    .bind(order.checkout_id)
    .bind(Json(&order.order_items))
    .bind(Json(&order.shipping_address))
    .bind(&order.payment_method)
    .bind(order.total_price)
    .bind(order.is_paid)
    .bind(order.paid_at)
    .bind(&order.payment_status)
    .bind(&order.payment_details)
    .bind(order.is_delivered)
    .bind(order.delivered_at)
    .bind(order.status)
    .bind(order.created_at)
    .bind(order.updated_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| RepositoryError::conflict_on_unique(e, "checkout already has an order"))?;

    Ok(row.into())
}
