//! GEARUP Commerce Backend
//!
//! Storefront backend service built around a voucher/discount engine and
//! cart/stock reconciliation.
//!
//! ## Features
//! - Product catalog management
//! - Shopping cart with stock-aware quantities and lazy repair of
//!   references to deleted products
//! - Wishlist with the same self-healing reads
//! - Voucher issuance, claiming with a race-free global cap, and discount
//!   computation
//! - Per-user notifications

pub mod domain;
pub mod error;
pub mod http;
pub mod service;
pub mod store;

pub use error::{Error, Result};
