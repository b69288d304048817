//! Administrator route handlers.
//!
//! Every handler takes [`RequireAdmin`], so non-admin callers get 403 and
//! anonymous callers 401 before any work is done.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, put},
};
use chrono::Utc;
use folio_core::order::{Order, OrderStatusUpdate};
use folio_core::product::Product;
use folio_core::{Email, OrderId, UserId, UserRole};

use crate::db::{OrderRepository, ProductRepository, UserRepository};
use crate::error::{AppError, Result, not_found};
use crate::middleware::RequireAdmin;
use crate::models::{NewUser, User, UserUpdate};
use crate::routes::MessageResponse;
use crate::services::auth::AuthService;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products))
        .route("/orders", get(orders))
        .route("/orders/{id}", put(update_order).delete(delete_order))
        .route("/users", get(users).post(create_user))
        .route("/users/{id}", put(update_user).delete(delete_user))
}

// =============================================================================
// Products
// =============================================================================

async fn products(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(ProductRepository::new(state.pool()).list_all().await?))
}

// =============================================================================
// Orders
// =============================================================================

/// Every order as a bare array; the dashboard computes its own totals.
async fn orders(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(OrderRepository::new(state.pool()).list_all().await?))
}

async fn update_order(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    body: std::result::Result<Json<OrderStatusUpdate>, JsonRejection>,
) -> Result<Json<Order>> {
    let id: OrderId = id.parse()?;
    let Json(update) = body?;
    let repo = OrderRepository::new(state.pool());

    let mut order = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    order.set_status(update.status, Utc::now());
    let order = repo.update_status(&order).await.map_err(not_found("Order"))?;

    tracing::info!(order_id = %order.id, status = %order.status, admin_id = %admin.id, "Order status updated");
    Ok(Json(order))
}

async fn delete_order(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let id: OrderId = id.parse()?;
    OrderRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(not_found("Order"))?;

    tracing::info!(order_id = %id, admin_id = %admin.id, "Order deleted");
    Ok(Json(MessageResponse::new("Order removed")))
}

// =============================================================================
// Users
// =============================================================================

async fn users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<User>>> {
    Ok(Json(UserRepository::new(state.pool()).list_all().await?))
}

async fn create_user(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    body: std::result::Result<Json<NewUser>, JsonRejection>,
) -> Result<(StatusCode, Json<User>)> {
    let Json(input) = body?;
    let role = input.role.unwrap_or(UserRole::Customer);
    let user = AuthService::new(state.pool())
        .create_user(input, role)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update_user(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    body: std::result::Result<Json<UserUpdate>, JsonRejection>,
) -> Result<Json<User>> {
    let id: UserId = id.parse()?;
    let Json(update) = body?;
    let repo = UserRepository::new(state.pool());

    let existing = repo
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let name = match update.name.as_deref().map(str::trim) {
        Some("") => return Err(AppError::BadRequest("Name is required".to_string())),
        Some(name) => name.to_owned(),
        None => existing.name,
    };
    let email = match update.email.as_deref() {
        Some(raw) => Email::parse(raw)
            .map_err(|_| AppError::BadRequest("Invalid email address".to_string()))?,
        None => existing.email,
    };
    let role = update.role.unwrap_or(existing.role);

    let user = repo
        .update(id, &name, &email, role)
        .await
        .map_err(not_found("User"))?;
    Ok(Json(user))
}

async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let id: UserId = id.parse()?;
    if id == admin.id {
        return Err(AppError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }
    UserRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(not_found("User"))?;

    tracing::info!(user_id = %id, admin_id = %admin.id, "User deleted");
    Ok(Json(MessageResponse::new("User deleted")))
}
