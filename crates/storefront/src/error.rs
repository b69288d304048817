//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`; every error body is `{ "message": "..." }`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use folio_core::IdError;
use folio_core::cart::CartError;
use folio_core::catalog::CatalogError;
use folio_core::checkout::CheckoutError;
use folio_core::product::ProductError;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::payment::PaymentError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Payment verification failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Checkout transition rejected.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Cart mutation rejected.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Catalog query parameters rejected.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Product payload rejected.
    #[error("Product error: {0}")]
    Product(#[from] ProductError),

    /// Malformed path ID.
    #[error("{0}")]
    InvalidId(#[from] IdError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

impl AppError {
    /// HTTP status and client-facing message.
    ///
    /// Server-side details never reach the client.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Auth(err) => auth_status(err),
            Self::Payment(err) if err.is_declined() => {
                (StatusCode::PAYMENT_REQUIRED, err.to_string())
            }
            Self::Payment(_) => (
                StatusCode::BAD_GATEWAY,
                "Payment provider error".to_string(),
            ),
            Self::Checkout(err) => (checkout_status(err), err.to_string()),
            Self::Cart(err) => {
                let status = match err {
                    CartError::InvalidQuantity | CartError::TotalTooLarge => {
                        StatusCode::BAD_REQUEST
                    }
                    CartError::ItemNotFound(_) => StatusCode::NOT_FOUND,
                    CartError::OutOfStock(_) => StatusCode::CONFLICT,
                };
                (status, err.to_string())
            }
            Self::Catalog(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::Product(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::InvalidId(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests".to_string(),
            ),
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

fn repository_status(err: &RepositoryError) -> (StatusCode, String) {
    match err {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Resource not found".to_string()),
        RepositoryError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        ),
    }
}

fn auth_status(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidCredentials => {
            (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
        }
        AuthError::InvalidToken => (
            StatusCode::UNAUTHORIZED,
            "Not authorized, token failed".to_string(),
        ),
        AuthError::UserNotFound => (StatusCode::NOT_FOUND, "User not found".to_string()),
        AuthError::UserAlreadyExists => (StatusCode::CONFLICT, "User already exists".to_string()),
        AuthError::WeakPassword(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        AuthError::InvalidEmail(_) => (StatusCode::BAD_REQUEST, "Invalid email address".to_string()),
        AuthError::MissingName => (StatusCode::BAD_REQUEST, "Name is required".to_string()),
        AuthError::Repository(err) => repository_status(err),
        AuthError::PasswordHash => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        ),
    }
}

const fn checkout_status(err: &CheckoutError) -> StatusCode {
    match err {
        CheckoutError::EmptyCart
        | CheckoutError::InvalidQuantity(_)
        | CheckoutError::MissingAddressField(_)
        | CheckoutError::MissingPaymentMethod
        | CheckoutError::UnknownProduct(_)
        | CheckoutError::TotalTooLarge
        | CheckoutError::TotalMismatch { .. }
        | CheckoutError::UnsupportedPaymentStatus(_)
        | CheckoutError::MissingPaymentReference
        | CheckoutError::NotPaid => StatusCode::BAD_REQUEST,
        CheckoutError::PaymentNotCompleted(_) | CheckoutError::AmountMismatch { .. } => {
            StatusCode::PAYMENT_REQUIRED
        }
        CheckoutError::PriceChanged { .. }
        | CheckoutError::AlreadyPaid
        | CheckoutError::AlreadyFinalized => StatusCode::CONFLICT,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(ErrorResponse { message })).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Map `RepositoryError::NotFound` to a 404 naming the resource.
pub fn not_found(resource: &'static str) -> impl FnOnce(RepositoryError) -> AppError {
    move |err| match err {
        RepositoryError::NotFound => AppError::NotFound(format!("{resource} not found")),
        other => AppError::Database(other),
    }
}

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Checkout paid", Some(&[("checkout_id", "…")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use folio_core::{Money, ProductId};

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_message(err: AppError) -> String {
        let body = axum::body::to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        json["message"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_error_status_codes() {
        assert_eq!(
            get_status(CheckoutError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CheckoutError::NotPaid.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CheckoutError::AlreadyFinalized.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(
                CheckoutError::AmountMismatch {
                    expected: Money::from_cents(2000),
                    captured: Money::from_cents(1000),
                }
                .into()
            ),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            get_status(PaymentError::OrderNotFound("X".to_string()).into()),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            get_status(
                PaymentError::Provider {
                    status: 500,
                    body: String::new()
                }
                .into()
            ),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(RepositoryError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(RepositoryError::Conflict("dup".to_string()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CartError::ItemNotFound(ProductId::new()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(CartError::TotalTooLarge.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CheckoutError::TotalTooLarge.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(
                CheckoutError::PriceChanged {
                    product_id: ProductId::new(),
                    current: Money::from_cents(5000),
                    submitted: Money::from_cents(1),
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status("nope".parse::<ProductId>().unwrap_err().into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AuthError::UserAlreadyExists.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AuthError::InvalidCredentials.into()),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_server_error_details_are_hidden() {
        let err = AppError::Database(RepositoryError::DataCorruption("secret".to_string()));
        assert_eq!(body_message(err).await, "Internal server error");

        let err = AppError::Checkout(CheckoutError::NotPaid);
        assert_eq!(body_message(err).await, "checkout is not paid");
    }

    #[tokio::test]
    async fn test_not_found_names_resource() {
        let err = not_found("Order")(RepositoryError::NotFound);
        assert_eq!(body_message(err).await, "Order not found");

        let err = not_found("Order")(RepositoryError::Conflict("dup".to_string()));
        assert!(matches!(err, AppError::Database(RepositoryError::Conflict(_))));
    }
}
