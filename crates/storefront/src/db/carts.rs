//! Cart repository.
//!
//! A cart row is keyed by either `user_id` or `guest_id`; both columns are
//! unique, so each shopper has at most one cart. Lines are stored as JSONB.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use folio_core::cart::{Cart, CartItem, CartOwner};
use folio_core::{CartId, Money, UserId};

use super::RepositoryError;

const CART_COLUMNS: &str = "id, user_id, guest_id, products, total_price, updated_at";

/// Internal row type for `PostgreSQL` cart queries.
#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: CartId,
    user_id: Option<UserId>,
    guest_id: Option<String>,
    products: Json<Vec<CartItem>>,
    total_price: Money,
    updated_at: DateTime<Utc>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            id: row.id,
            user: row.user_id,
            guest_id: row.guest_id,
            products: row.products.0,
            total_price: row.total_price,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load the cart belonging to `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find(&self, owner: &CartOwner) -> Result<Option<Cart>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        find(&mut *conn, owner, false).await
    }

    /// Change the owner's cart while holding its row lock.
    ///
    /// `change` receives the locked cart, or `None` when the owner has none,
    /// and returns the cart to store. Concurrent changes to one cart are
    /// applied one after the other. Two requests creating the same owner's
    /// first cart race on the owner's unique key and the loser gets
    /// `RepositoryError::Conflict`.
    ///
    /// # Errors
    ///
    /// Returns whatever `change` returns, and `RepositoryError::Database`
    /// if a query fails.
    pub async fn update<F, E>(&self, owner: &CartOwner, change: F) -> Result<Cart, E>
    where
        F: FnOnce(Option<Cart>) -> Result<Cart, E> + Send,
        E: From<RepositoryError>,
    {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let current = find(&mut *tx, owner, true).await?;
        let cart = save(&mut *tx, &change(current)?).await?;

        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(cart)
    }

    /// Delete the cart belonging to `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if there is no such cart.
    pub async fn delete(&self, owner: &CartOwner) -> Result<(), RepositoryError> {
        let result = match owner {
            CartOwner::User(user_id) => sqlx::query("DELETE FROM carts WHERE user_id = $1")
                .bind(*user_id)
                .execute(self.pool)
                .await?,
            CartOwner::Guest(guest_id) => sqlx::query("DELETE FROM carts WHERE guest_id = $1")
                .bind(guest_id)
                .execute(self.pool)
                .await?,
        };

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Fold the guest cart into the user's cart.
    ///
    /// With no user cart the guest cart is handed over to the user. With no
    /// guest cart the user's cart is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` when neither cart exists and
    /// `RepositoryError::Conflict` when the merged total is not storable.
    pub async fn merge_guest(
        &self,
        guest_id: &str,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let guest = find(&mut *tx, &CartOwner::Guest(guest_id.to_owned()), true).await?;
        let user = find(&mut *tx, &CartOwner::User(user_id), true).await?;

        let merged = match (guest, user) {
            (None, None) => return Err(RepositoryError::NotFound),
            (None, Some(user)) => user,
            (Some(guest), Some(mut user)) => {
                sqlx::query("DELETE FROM carts WHERE id = $1")
                    .bind(guest.id)
                    .execute(&mut *tx)
                    .await?;
                user.merge(guest)
                    .map_err(|e| RepositoryError::Conflict(e.to_string()))?;
                user.updated_at = now;
                save(&mut *tx, &user).await?
            }
            (Some(mut guest), None) => {
                guest.user = Some(user_id);
                guest.guest_id = None;
                guest.updated_at = now;
                save(&mut *tx, &guest).await?
            }
        };

        tx.commit().await?;
        Ok(merged)
    }
}

async fn find(
    conn: &mut PgConnection,
    owner: &CartOwner,
    for_update: bool,
) -> Result<Option<Cart>, RepositoryError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let row = match owner {
        CartOwner::User(user_id) => {
            sqlx::query_as::<_, CartRow>(&format!(
                "SELECT {CART_COLUMNS} FROM carts WHERE user_id = $1{lock}"
            ))
            .bind(*user_id)
            .fetch_optional(&mut *conn)
            .await?
        }
        CartOwner::Guest(guest_id) => {
            sqlx::query_as::<_, CartRow>(&format!(
                "SELECT {CART_COLUMNS} FROM carts WHERE guest_id = $1{lock}"
            ))
            .bind(guest_id)
            .fetch_optional(&mut *conn)
            .await?
        }
    };

    Ok(row.map(Cart::from))
}

async fn save(conn: &mut PgConnection, cart: &Cart) -> Result<Cart, RepositoryError> {
    let row = sqlx::query_as::<_, CartRow>(&format!(
        r"
        INSERT INTO carts (id, user_id, guest_id, products, total_price, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (id) DO UPDATE SET
            user_id = EXCLUDED.user_id,
            guest_id = EXCLUDED.guest_id,
            products = EXCLUDED.products,
            total_price = EXCLUDED.total_price,
            updated_at = EXCLUDED.updated_at
        RETURNING {CART_COLUMNS}
        "
    ))
    .bind(cart.id)
    .bind(cart.user)
    .bind(&cart.guest_id)
    .bind(Json(&cart.products))
    .bind(cart.total_price)
    .bind(cart.updated_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| RepositoryError::conflict_on_unique(e, "cart already exists"))?;

    Ok(row.into())
}
