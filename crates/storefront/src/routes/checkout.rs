//! Checkout route handlers.
//!
//! A checkout moves `Created → Paid → Finalized`. Payment is only recorded
//! after the payment provider confirms the capture; the status the client
//! reports is never trusted on its own.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{post, put},
};
use std::collections::HashMap;

use chrono::Utc;

use folio_core::{CheckoutId, Money, ProductId};
use folio_core::checkout::{Checkout, CheckoutError, CheckoutState, NewCheckout, PaymentUpdate};
use folio_core::order::Order;

use crate::db::{CheckoutRepository, ProductRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireUser;
use crate::models::User;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/{id}/pay", put(pay))
        .route("/{id}/finalize", post(finalize))
        .route("/{id}/finalise", post(finalize))
}

/// Load a checkout the caller may act on.
async fn owned_checkout(repo: &CheckoutRepository<'_>, id: &str, user: &User) -> Result<Checkout> {
    let id: CheckoutId = id.parse()?;
    let checkout = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Checkout not found".to_string()))?;
    if checkout.user != user.id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to access this checkout".to_string(),
        ));
    }
    Ok(checkout)
}

#[tracing::instrument(skip_all, fields(user_id = %user.id))]
async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    body: std::result::Result<Json<NewCheckout>, JsonRejection>,
) -> Result<(StatusCode, Json<Checkout>)> {
    let Json(input) = body?;

    // Lines must carry the current catalog price
    let ids: Vec<ProductId> = input
        .checkout_items
        .iter()
        .map(|item| item.product_id)
        .collect();
    let prices: HashMap<ProductId, Money> = ProductRepository::new(state.pool())
        .get_many(&ids)
        .await?
        .into_iter()
        .map(|product| (product.id, product.selling_price()))
        .collect();

    let checkout = input.into_checkout(user.id, |id| prices.get(&id).copied(), Utc::now())?;
    let checkout = CheckoutRepository::new(state.pool()).create(&checkout).await?;

    tracing::info!(checkout_id = %checkout.id, total = %checkout.total_price, "Checkout created");
    Ok((StatusCode::CREATED, Json(checkout)))
}

#[tracing::instrument(skip_all, fields(user_id = %user.id, checkout_id = %id))]
async fn pay(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
    body: std::result::Result<Json<PaymentUpdate>, JsonRejection>,
) -> Result<Json<Checkout>> {
    let Json(update) = body?;
    let repo = CheckoutRepository::new(state.pool());
    let mut checkout = owned_checkout(&repo, &id, &user).await?;

    // Settle state and request shape before calling the provider
    match checkout.state() {
        CheckoutState::Created => {}
        CheckoutState::Paid => return Err(CheckoutError::AlreadyPaid.into()),
        CheckoutState::Finalized => return Err(CheckoutError::AlreadyFinalized.into()),
    }
    let reference = update.provider_reference()?.to_owned();

    let verified = state.payments().verify(&reference).await?;
    checkout.mark_paid(update, &verified, Utc::now())?;
    let checkout = repo.save_payment(&checkout).await?;

    add_breadcrumb(
        "checkout",
        "Checkout paid",
        Some(&[("provider_order_id", reference.as_str())]),
    );
    tracing::info!(amount = %verified.amount, "Checkout paid");
    Ok(Json(checkout))
}

#[tracing::instrument(skip_all, fields(user_id = %user.id, checkout_id = %id))]
async fn finalize(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Order>)> {
    let repo = CheckoutRepository::new(state.pool());
    let mut checkout = owned_checkout(&repo, &id, &user).await?;

    let order = checkout.finalize(Utc::now())?;
    let (_, order) = repo.finalize(&checkout, &order).await?;

    Ok((StatusCode::CREATED, Json(order)))
}
