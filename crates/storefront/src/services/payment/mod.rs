//! Server-side payment verification.
//!
//! The client reports a payment as "paid" and hands over the provider's
//! order payload. Nothing is recorded until a [`PaymentVerifier`] has asked
//! the provider itself for that order's status and captured amount.

pub mod paypal;

use async_trait::async_trait;
use thiserror::Error;

use folio_core::checkout::VerifiedPayment;

pub use paypal::PayPalClient;

/// Errors that can occur when verifying a payment with the provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected our API credentials.
    #[error("authentication with payment provider failed: {0}")]
    Authentication(String),

    /// The provider has no order with this id.
    #[error("payment provider order not found: {0}")]
    OrderNotFound(String),

    /// The payment was made in a currency the store does not accept.
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),

    /// Unexpected HTTP status from the provider.
    #[error("payment provider returned HTTP {status}: {body}")]
    Provider {
        /// HTTP status code.
        status: u16,
        /// Response body, for the logs.
        body: String,
    },

    /// The provider's response could not be interpreted.
    #[error("invalid payment provider response: {0}")]
    InvalidResponse(String),

    /// The client could not be built from configuration.
    #[error("payment provider misconfigured: {0}")]
    Configuration(String),
}

impl PaymentError {
    /// Whether the error is about the payment itself rather than our link
    /// to the provider. These are the shopper's problem (402); the rest are
    /// upstream failures (502).
    #[must_use]
    pub const fn is_declined(&self) -> bool {
        matches!(self, Self::OrderNotFound(_) | Self::UnsupportedCurrency(_))
    }
}

/// Confirms a payment with the provider.
#[async_trait]
pub trait PaymentVerifier: Send + Sync + 'static {
    /// Look up a provider order and report its status and amount.
    async fn verify(&self, provider_order_id: &str) -> Result<VerifiedPayment, PaymentError>;
}
