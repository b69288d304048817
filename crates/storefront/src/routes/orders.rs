//! Customer order route handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use folio_core::OrderId;
use folio_core::order::Order;

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/my-orders", get(my_orders))
        .route("/{id}", get(show))
}

/// The caller's orders, newest first.
async fn my_orders(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(orders))
}

/// Order detail. Only the owner or an administrator may read it.
async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<Json<Order>> {
    let id: OrderId = id.parse()?;
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    if order.user != user.id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view this order".to_string(),
        ));
    }
    Ok(Json(order))
}
