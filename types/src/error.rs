//! Error type for parsing and validating the shared types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("unknown transaction version: {0}")]
    InvalidVersion(u8),

    #[error("invalid authority bits: {0:#x}")]
    InvalidAuthorities(u64),

    #[error("amount {0} does not fit a signed 64-bit balance")]
    InvalidAmount(u64),

    #[error("balance arithmetic overflow")]
    Overflow,

    #[error("invalid token id: {0:?}")]
    InvalidTokenId(String),

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
