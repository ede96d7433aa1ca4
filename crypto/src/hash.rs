//! SHA-256 based hashing.

use sha2::{Digest, Sha256};
use windex_types::WalletId;

/// SHA-256 applied twice.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut output = [0u8; 32];
    output.copy_from_slice(&second);
    output
}

/// Wallet id for an extended public key: hex of `sha256d(xpubkey)`.
///
/// Clients compute the same id locally, so the input is the xpubkey string
/// exactly as submitted.
pub fn wallet_id(xpubkey: &str) -> WalletId {
    WalletId::new(hex::encode(sha256d(xpubkey.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256d_of_empty_input() {
        assert_eq!(
            hex::encode(sha256d(b"")),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn wallet_id_known_answer() {
        let xpub = "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8";
        assert_eq!(
            wallet_id(xpub).as_str(),
            "6091d09dbfdd27fdb09a47934060a02be31f432477eb799a8ec06c69d5bd8d72"
        );
    }

    #[test]
    fn wallet_id_is_deterministic() {
        assert_eq!(wallet_id("xpub-a"), wallet_id("xpub-a"));
        assert_ne!(wallet_id("xpub-a"), wallet_id("xpub-b"));
        assert_eq!(wallet_id("xpub-a").as_str().len(), 64);
    }
}
