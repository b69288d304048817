//! Catalog route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection, rejection::QueryRejection},
    http::StatusCode,
    routing::get,
};
use chrono::Utc;
use serde::Serialize;

use folio_core::ProductId;
use folio_core::catalog::ProductQuery;
use folio_core::product::{Product, ProductDraft, ProductPatch};

use crate::db::ProductRepository;
use crate::error::{AppError, Result, not_found};
use crate::middleware::RequireAdmin;
use crate::routes::MessageResponse;
use crate::state::AppState;

/// `{ "data": [...] }` wrapper used by the new arrivals endpoint.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/best-seller", get(best_seller))
        .route("/new-arrivals", get(new_arrivals))
        .route("/similar/{id}", get(similar))
        .route("/{id}", get(show).put(update).delete(destroy))
}

/// List products matching the query string filters.
#[tracing::instrument(skip(state, query))]
async fn list(
    State(state): State<AppState>,
    query: std::result::Result<Query<ProductQuery>, QueryRejection>,
) -> Result<Json<Vec<Product>>> {
    let Query(query) = query?;
    let request = query.build()?;
    let products = ProductRepository::new(state.pool()).list(&request).await?;
    Ok(Json(products))
}

async fn best_seller(State(state): State<AppState>) -> Result<Json<Product>> {
    ProductRepository::new(state.pool())
        .best_seller()
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No best seller found".to_string()))
}

async fn new_arrivals(State(state): State<AppState>) -> Result<Json<DataResponse<Vec<Product>>>> {
    let data = ProductRepository::new(state.pool()).new_arrivals().await?;
    Ok(Json(DataResponse { data }))
}

async fn similar(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Product>>> {
    let id: ProductId = id.parse()?;
    let products = ProductRepository::new(state.pool())
        .similar(id)
        .await
        .map_err(not_found("Product"))?;
    Ok(Json(products))
}

async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Product>> {
    let id: ProductId = id.parse()?;
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    body: std::result::Result<Json<ProductDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>)> {
    let Json(draft) = body?;
    let product = draft.into_product(admin.id, Utc::now())?;
    let product = ProductRepository::new(state.pool()).create(&product).await?;

    tracing::info!(product_id = %product.id, sku = %product.sku, admin_id = %admin.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    body: std::result::Result<Json<ProductPatch>, JsonRejection>,
) -> Result<Json<Product>> {
    let id: ProductId = id.parse()?;
    let Json(patch) = body?;
    let repo = ProductRepository::new(state.pool());

    let existing = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
    let product = patch.apply(&existing, admin.id, Utc::now())?;
    let product = repo.update(&product).await.map_err(not_found("Product"))?;

    tracing::info!(product_id = %product.id, admin_id = %admin.id, "Product updated");
    Ok(Json(product))
}

async fn destroy(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let id: ProductId = id.parse()?;
    ProductRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(not_found("Product"))?;

    tracing::info!(product_id = %id, admin_id = %admin.id, "Product deleted");
    Ok(Json(MessageResponse::new("Product removed")))
}
