//! Folio Core - shared domain library for the Folio bookstore.
//!
//! This crate provides the domain model used across all Folio components:
//! - `storefront` - JSON REST API (catalog, cart, checkout, orders, users)
//! - `cli` - Command-line tools for migrations, seeding, and account management
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. Persistence lives in the storefront's repositories,
//! which render the same types to SQL.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, and statuses
//! - [`product`] - Catalog records
//! - [`catalog`] - Product filters and sorting built from query parameters
//! - [`cart`] - Line items and cart mutations
//! - [`checkout`] - Checkout records and the created → paid → finalized progression
//! - [`order`] - Orders produced by finalized checkouts
//! - [`client`] - Unidirectional state container used by storefront clients

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod client;
pub mod order;
pub mod product;
pub mod types;

pub use types::*;
