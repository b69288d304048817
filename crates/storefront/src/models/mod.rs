//! Domain models owned by the storefront.
//!
//! Catalog, cart, checkout and order types live in `folio-core`; only the
//! account types, which carry authentication concerns, are defined here.

pub mod user;

pub use user::{AuthResponse, NewUser, User, UserUpdate};
