//! Cart route handlers.
//!
//! A cart is addressed by the bearer token's user when one is supplied,
//! otherwise by the `guestId` the client generated for the visitor.

use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection, rejection::QueryRejection},
    routing::{delete, post},
};
use chrono::Utc;
use serde::Deserialize;

use folio_core::ProductId;
use folio_core::cart::{Cart, CartOwner};

use crate::db::{CartRepository, ProductRepository};
use crate::error::{AppError, Result, add_breadcrumb, not_found};
use crate::middleware::{OptionalUser, RequireUser};
use crate::models::User;
use crate::routes::MessageResponse;
use crate::state::AppState;

/// Query string for cart reads.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLookup {
    pub guest_id: Option<String>,
}

/// Body of `POST /api/cart`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCart {
    pub product_id: String,
    #[serde(default = "one")]
    pub quantity: u32,
    pub guest_id: Option<String>,
}

const fn one() -> u32 {
    1
}

/// Body of `PUT /api/cart`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartLine {
    pub product_id: String,
    pub quantity: u32,
    pub guest_id: Option<String>,
}

/// Body of `DELETE /api/cart`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveCartLine {
    pub product_id: String,
    pub guest_id: Option<String>,
}

/// Body of `POST /api/cart/merge`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeCarts {
    pub guest_id: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(add).get(show).put(update).delete(remove))
        .route("/merge", post(merge))
        .route("/clear", delete(clear))
}

/// Resolve who the cart belongs to. The authenticated user wins over a
/// `guestId`.
fn cart_owner(user: Option<&User>, guest_id: Option<String>) -> Result<CartOwner> {
    if let Some(user) = user {
        return Ok(CartOwner::User(user.id));
    }
    guest_id
        .map(|id| id.trim().to_owned())
        .filter(|id| !id.is_empty())
        .map(CartOwner::Guest)
        .ok_or_else(|| AppError::BadRequest("guestId or authentication is required".to_string()))
}

fn cart_not_found() -> AppError {
    AppError::NotFound("Cart not found".to_string())
}

async fn show(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    query: std::result::Result<Query<CartLookup>, QueryRejection>,
) -> Result<Json<Cart>> {
    let Query(lookup) = query?;
    let owner = cart_owner(user.as_ref(), lookup.guest_id)?;
    let cart = CartRepository::new(state.pool())
        .find(&owner)
        .await?
        .ok_or_else(cart_not_found)?;
    Ok(Json(cart))
}

async fn add(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    body: std::result::Result<Json<AddToCart>, JsonRejection>,
) -> Result<Json<Cart>> {
    let Json(input) = body?;
    let owner = cart_owner(user.as_ref(), input.guest_id)?;
    let product_id: ProductId = input.product_id.parse()?;

    let product = ProductRepository::new(state.pool())
        .get(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let now = Utc::now();
    let cart = CartRepository::new(state.pool())
        .update(&owner, |cart| -> Result<Cart> {
            let mut cart = cart.unwrap_or_else(|| Cart::new(&owner, now));
            cart.add(&product, input.quantity)?;
            cart.updated_at = now;
            Ok(cart)
        })
        .await?;

    let product_ref = product_id.to_string();
    add_breadcrumb(
        "cart",
        "Product added to cart",
        Some(&[("product_id", product_ref.as_str())]),
    );
    Ok(Json(cart))
}

async fn update(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    body: std::result::Result<Json<UpdateCartLine>, JsonRejection>,
) -> Result<Json<Cart>> {
    let Json(input) = body?;
    let owner = cart_owner(user.as_ref(), input.guest_id)?;
    let product_id: ProductId = input.product_id.parse()?;

    let cart = CartRepository::new(state.pool())
        .update(&owner, |cart| -> Result<Cart> {
            let mut cart = cart.ok_or_else(cart_not_found)?;
            cart.set_quantity(product_id, input.quantity)?;
            cart.updated_at = Utc::now();
            Ok(cart)
        })
        .await?;
    Ok(Json(cart))
}

async fn remove(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    body: std::result::Result<Json<RemoveCartLine>, JsonRejection>,
) -> Result<Json<Cart>> {
    let Json(input) = body?;
    let owner = cart_owner(user.as_ref(), input.guest_id)?;
    let product_id: ProductId = input.product_id.parse()?;

    let cart = CartRepository::new(state.pool())
        .update(&owner, |cart| -> Result<Cart> {
            let mut cart = cart.ok_or_else(cart_not_found)?;
            cart.remove(product_id)?;
            cart.updated_at = Utc::now();
            Ok(cart)
        })
        .await?;
    Ok(Json(cart))
}

async fn merge(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    body: std::result::Result<Json<MergeCarts>, JsonRejection>,
) -> Result<Json<Cart>> {
    let Json(input) = body?;
    let guest_id = input.guest_id.trim();
    if guest_id.is_empty() {
        return Err(AppError::BadRequest("guestId is required".to_string()));
    }

    let cart = CartRepository::new(state.pool())
        .merge_guest(guest_id, user.id, Utc::now())
        .await
        .map_err(not_found("Cart"))?;

    tracing::info!(user_id = %user.id, cart_id = %cart.id, "Guest cart merged");
    Ok(Json(cart))
}

async fn clear(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    query: std::result::Result<Query<CartLookup>, QueryRejection>,
) -> Result<Json<MessageResponse>> {
    let Query(lookup) = query?;
    let owner = cart_owner(user.as_ref(), lookup.guest_id)?;
    CartRepository::new(state.pool())
        .delete(&owner)
        .await
        .map_err(not_found("Cart"))?;
    Ok(Json(MessageResponse::new("Cart cleared")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use folio_core::{Email, UserId, UserRole};

    use super::*;

    fn user() -> User {
        User {
            id: UserId::new(),
            name: "Ada".to_string(),
            email: Email::parse("ada@example.com").unwrap(),
            role: UserRole::Customer,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_user_wins_over_guest() {
        let user = user();
        let owner = cart_owner(Some(&user), Some("guest_1".to_string())).unwrap();
        assert_eq!(owner, CartOwner::User(user.id));
    }

    #[test]
    fn test_guest_id_is_trimmed() {
        let owner = cart_owner(None, Some("  guest_1 ".to_string())).unwrap();
        assert_eq!(owner, CartOwner::Guest("guest_1".to_string()));
    }

    #[test]
    fn test_anonymous_without_guest_id_rejected() {
        assert!(matches!(
            cart_owner(None, Some("   ".to_string())),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(cart_owner(None, None), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_add_defaults_to_one_unit() {
        let body: AddToCart =
            serde_json::from_str(r#"{"productId":"x","guestId":"guest_1"}"#).unwrap();
        assert_eq!(body.quantity, 1);
    }
}
