//! Wallet address derivation from an extended public key.
//!
//! The xpubkey a wallet registers is its change-level key (`m/44'/280'/0'/0`).
//! Address `i` is its non-hardened child `i`:
//!
//! 1. `child = CKDpub(xpub, i)`
//! 2. `payload = version_byte(network) ++ HASH160(compressed(child))`
//! 3. `address = base58(payload ++ sha256d(payload)[0..4])`
//!
//! Clients derive the same addresses independently, so this must stay
//! byte-for-byte stable.

use std::ops::Range;
use std::str::FromStr;
use std::sync::OnceLock;

use bitcoin::base58;
use bitcoin::bip32::{ChildNumber, Xpub};
use bitcoin::hashes::{hash160, Hash};
use bitcoin::secp256k1::{Secp256k1, VerifyOnly};
use rayon::prelude::*;

use windex_types::{Address, Network};

use crate::CryptoError;

/// Length of a decoded address: version byte + 20-byte hash.
const PAYLOAD_LEN: usize = 21;

fn secp() -> &'static Secp256k1<VerifyOnly> {
    static CTX: OnceLock<Secp256k1<VerifyOnly>> = OnceLock::new();
    CTX.get_or_init(Secp256k1::verification_only)
}

/// A parsed xpubkey bound to a network, ready to derive many addresses.
#[derive(Clone, Debug)]
pub struct XpubDeriver {
    xpub: Xpub,
    network: Network,
}

impl XpubDeriver {
    pub fn new(xpubkey: &str, network: Network) -> Result<Self, CryptoError> {
        let xpub =
            Xpub::from_str(xpubkey).map_err(|e| CryptoError::InvalidXpub(e.to_string()))?;
        Ok(Self { xpub, network })
    }

    /// Address at `index`.
    pub fn address_at(&self, index: u32) -> Result<Address, CryptoError> {
        let child_number =
            ChildNumber::from_normal_idx(index).map_err(|e| CryptoError::Derivation {
                index,
                reason: e.to_string(),
            })?;
        let child = self
            .xpub
            .ckd_pub(secp(), child_number)
            .map_err(|e| CryptoError::Derivation {
                index,
                reason: e.to_string(),
            })?;
        let pubkey_hash = hash160::Hash::hash(&child.public_key.serialize());

        let mut payload = Vec::with_capacity(PAYLOAD_LEN);
        payload.push(self.network.p2pkh_version());
        payload.extend_from_slice(pubkey_hash.as_byte_array());
        Ok(Address::new(base58::encode_check(&payload)))
    }

    /// Addresses for every index in `range`, derived in parallel, in index order.
    pub fn addresses_in_range(&self, range: Range<u32>) -> Result<Vec<(u32, Address)>, CryptoError> {
        range
            .into_par_iter()
            .map(|index| self.address_at(index).map(|a| (index, a)))
            .collect()
    }

    /// Addresses for an arbitrary set of indexes, derived in parallel, in the
    /// order given.
    pub fn addresses_at(&self, indexes: &[u32]) -> Result<Vec<(u32, Address)>, CryptoError> {
        indexes
            .par_iter()
            .map(|&index| self.address_at(index).map(|a| (index, a)))
            .collect()
    }
}

/// Address at `index` of `xpubkey`.
pub fn address_at(xpubkey: &str, index: u32, network: Network) -> Result<Address, CryptoError> {
    XpubDeriver::new(xpubkey, network)?.address_at(index)
}

/// Addresses for every index in `range` of `xpubkey`.
pub fn addresses_in_range(
    xpubkey: &str,
    range: Range<u32>,
    network: Network,
) -> Result<Vec<(u32, Address)>, CryptoError> {
    XpubDeriver::new(xpubkey, network)?.addresses_in_range(range)
}

/// Whether `address` decodes with a valid checksum and a version byte of `network`.
pub fn validate_address(address: &str, network: Network) -> bool {
    match base58::decode_check(address) {
        Ok(payload) => {
            payload.len() == PAYLOAD_LEN
                && (payload[0] == network.p2pkh_version() || payload[0] == network.p2sh_version())
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// BIP32 test vector 1, chain m.
    const XPUB: &str = "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8";

    #[test]
    fn mainnet_known_addresses() {
        let deriver = XpubDeriver::new(XPUB, Network::Mainnet).unwrap();
        assert_eq!(deriver.address_at(0).unwrap().as_str(), "HLp7WwjkdJNXGV7AeXJuzD6QyFuBSfLDL6");
        assert_eq!(deriver.address_at(1).unwrap().as_str(), "HPeXbhwRWvkQJeLMacr8qs4K35gUDUZCuo");
        assert_eq!(deriver.address_at(7).unwrap().as_str(), "HR7aQdkfzSGbNXBnWiBYgSgAJvopKHqWck");
    }

    #[test]
    fn testnet_known_address() {
        assert_eq!(
            address_at(XPUB, 0, Network::Testnet).unwrap().as_str(),
            "Wcy21XaG4FfSFni2TNJRzM5NjuQJwBgJxq"
        );
        assert_eq!(
            address_at(XPUB, 0, Network::Privatenet).unwrap().as_str(),
            "Wcy21XaG4FfSFni2TNJRzM5NjuQJwBgJxq"
        );
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = address_at(XPUB, 7, Network::Mainnet).unwrap();
        let b = address_at(XPUB, 7, Network::Mainnet).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn indexes_give_distinct_addresses() {
        let a = address_at(XPUB, 0, Network::Mainnet).unwrap();
        let b = address_at(XPUB, 1, Network::Mainnet).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn derived_address_validates_on_its_network_only() {
        let addr = address_at(XPUB, 3, Network::Mainnet).unwrap();
        assert!(validate_address(addr.as_str(), Network::Mainnet));
        assert!(!validate_address(addr.as_str(), Network::Testnet));
        assert!(addr.as_str().starts_with('H'));
    }

    #[test]
    fn testnet_addresses_use_testnet_prefix() {
        let addr = address_at(XPUB, 0, Network::Testnet).unwrap();
        assert!(validate_address(addr.as_str(), Network::Testnet));
        assert!(addr.as_str().starts_with('W'));
    }

    #[test]
    fn range_matches_single_derivation() {
        let deriver = XpubDeriver::new(XPUB, Network::Mainnet).unwrap();
        let batch = deriver.addresses_in_range(0..5).unwrap();
        assert_eq!(batch.len(), 5);
        for (index, address) in batch {
            assert_eq!(address, deriver.address_at(index).unwrap());
        }
    }

    #[test]
    fn sparse_indexes_keep_their_order() {
        let deriver = XpubDeriver::new(XPUB, Network::Mainnet).unwrap();
        let sparse = deriver.addresses_at(&[9, 2]).unwrap();
        assert_eq!(sparse[0], (9, deriver.address_at(9).unwrap()));
        assert_eq!(sparse[1], (2, deriver.address_at(2).unwrap()));
    }

    #[test]
    fn hardened_index_rejected() {
        let deriver = XpubDeriver::new(XPUB, Network::Mainnet).unwrap();
        assert!(matches!(
            deriver.address_at(1 << 31),
            Err(CryptoError::Derivation { .. })
        ));
    }

    #[test]
    fn invalid_xpub_rejected() {
        assert!(matches!(
            XpubDeriver::new("xpub-not-really", Network::Mainnet),
            Err(CryptoError::InvalidXpub(_))
        ));
    }

    #[test]
    fn garbage_address_rejected() {
        assert!(!validate_address("H1111", Network::Mainnet));
        assert!(!validate_address("", Network::Mainnet));
        assert!(!validate_address("A\0B", Network::Mainnet));
        // One character changed breaks the checksum.
        assert!(!validate_address("HLp7WwjkdJNXGV7AeXJuzD6QyFuBSfLDL7", Network::Mainnet));
    }
}
