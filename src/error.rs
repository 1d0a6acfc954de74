//! Crate-wide error taxonomy.
//!
//! Validation failures are raised before any store mutation; unexpected
//! lower-layer failures are converted to [`Error::Internal`] with a
//! diagnostic message. No operation is retried.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} is inactive")]
    Inactive(&'static str),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("{field} '{value}' is already taken")]
    Conflict { field: &'static str, value: String },

    #[error("voucher has reached its claim limit")]
    LimitReached,

    #[error("voucher already claimed by this user")]
    AlreadyClaimed,

    #[error("insufficient stock: {available} available")]
    InsufficientStock { available: u32 },

    #[error("purchase total {price} is below the voucher minimum of {min_purchase}")]
    BelowMinimumPurchase { price: i64, min_purchase: i64 },

    #[error("could not generate a unique voucher code")]
    CodeGeneration,

    #[error("storage error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::Invalid(msg.into())
    }

    pub fn conflict(field: &'static str, value: impl Into<String>) -> Self {
        Error::Conflict {
            field,
            value: value.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
