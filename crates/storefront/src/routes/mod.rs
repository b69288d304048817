//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! # Catalog
//! GET    /api/products                  - Filter, sort and paginate products
//! POST   /api/products                  - Create product (admin)
//! GET    /api/products/best-seller      - Highest-rated product
//! GET    /api/products/new-arrivals     - Eight newest products
//! GET    /api/products/similar/{id}     - Up to four products in the same category
//! GET    /api/products/{id}             - Product detail (with reviews)
//! PUT    /api/products/{id}             - Update product (admin)
//! DELETE /api/products/{id}             - Delete product (admin)
//!
//! # Cart (bearer token or guestId)
//! GET    /api/cart                      - Current cart
//! POST   /api/cart                      - Add a product
//! PUT    /api/cart                      - Set a line quantity (0 removes)
//! DELETE /api/cart                      - Remove a line
//! POST   /api/cart/merge                - Merge a guest cart into the user's cart
//! DELETE /api/cart/clear                - Drop the cart
//!
//! # Checkout (requires auth)
//! POST   /api/checkout                  - Open a checkout from cart lines
//! PUT    /api/checkout/{id}/pay         - Record a provider-verified payment
//! POST   /api/checkout/{id}/finalize    - Turn a paid checkout into an order
//! POST   /api/checkout/{id}/finalise    - Same as above
//!
//! # Orders (requires auth)
//! GET    /api/orders/my-orders          - Caller's orders
//! GET    /api/orders/{id}               - Order detail (owner or admin)
//!
//! # Users
//! POST   /api/users/register            - Create account, returns token
//! POST   /api/users/login               - Sign in, returns token
//! GET    /api/users/profile             - Current user
//!
//! # Admin (requires admin role)
//! GET    /api/admin/products            - Every product, newest first
//! GET    /api/admin/orders              - Every order
//! PUT    /api/admin/orders/{id}         - Update order status
//! DELETE /api/admin/orders/{id}         - Delete order
//! GET    /api/admin/users               - Every user
//! POST   /api/admin/users               - Create user with a role
//! PUT    /api/admin/users/{id}          - Edit user
//! DELETE /api/admin/users/{id}          - Delete user
//! ```

pub mod admin;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod products;
pub mod users;

use axum::Router;
use serde::Serialize;

use crate::state::AppState;

/// Body for endpoints that only report an outcome.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Build the API router (all `/api` routes).
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/products", products::routes())
        .nest("/api/cart", cart::routes())
        .nest("/api/checkout", checkout::routes())
        .nest("/api/orders", orders::routes())
        .nest("/api/users", users::routes())
        .nest("/api/admin", admin::routes())
}
