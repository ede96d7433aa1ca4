//! Cryptographic primitives for the windex wallet indexer.
//!
//! - **BIP32** public derivation of wallet addresses from an extended public key
//! - **HASH160 + base58check** address encoding with the network's version byte
//! - **Double SHA-256** wallet ids

pub mod address;
pub mod error;
pub mod hash;

pub use address::{address_at, addresses_in_range, validate_address, XpubDeriver};
pub use error::CryptoError;
pub use hash::{sha256d, wallet_id};
