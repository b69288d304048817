//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Password accounts and bearer tokens
//! - `payment` - Server-side payment verification with the provider

pub mod auth;
pub mod payment;
