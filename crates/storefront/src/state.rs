//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::payment::{PayPalClient, PaymentError, PaymentVerifier};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    payments: Arc<dyn PaymentVerifier>,
}

impl AppState {
    /// Create a new application state backed by the `PayPal` Orders API.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if the `PayPal` client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, PaymentError> {
        let payments = Arc::new(PayPalClient::new(&config.paypal)?);
        Ok(Self::with_verifier(config, pool, payments))
    }

    /// Create application state with an explicit payment verifier.
    #[must_use]
    pub fn with_verifier(
        config: StorefrontConfig,
        pool: PgPool,
        payments: Arc<dyn PaymentVerifier>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                payments,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get the payment verifier.
    #[must_use]
    pub fn payments(&self) -> &dyn PaymentVerifier {
        self.inner.payments.as_ref()
    }
}
