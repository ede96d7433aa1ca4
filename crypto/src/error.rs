use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid extended public key: {0}")]
    InvalidXpub(String),

    #[error("cannot derive index {index}: {reason}")]
    Derivation { index: u32, reason: String },
}
