//! Core value types for Folio.
//!
//! Type-safe wrappers for IDs, money, emails, and statuses.

pub mod email;
pub mod id;
pub mod money;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{AmountError, Money};
pub use status::*;
