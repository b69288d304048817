//! HTTP middleware stack for the storefront API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, request transactions)
//! 2. `TraceLayer` (request span with method, uri, status, latency)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS
//! 5. Rate limiting on login/registration (governor)
//!
//! Authentication is not a layer: handlers opt in through the
//! [`RequireUser`], [`RequireAdmin`] and [`OptionalUser`] extractors.

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{OptionalUser, RequireAdmin, RequireUser};
pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
