//! Identifier types: transactions, tokens, addresses and wallets.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::TypesError;

/// A 32-byte transaction id, rendered as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxId([u8; 32]);

impl TxId {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypesError> {
        let bytes = hex::decode(s).map_err(|e| TypesError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| TypesError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({}\u{2026})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for TxId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TxId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Identifies a token. The native token is `"00"`; custom tokens are the id
/// of the transaction that created them.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    pub const NATIVE_UID: &'static str = "00";

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn native() -> Self {
        Self(Self::NATIVE_UID.to_string())
    }

    /// The token created by a token-creation transaction.
    pub fn from_tx(tx_id: &TxId) -> Self {
        Self(tx_id.to_hex())
    }

    pub fn is_native(&self) -> bool {
        self.0 == Self::NATIVE_UID
    }

    /// The native uid, or 64 lowercase hex characters.
    pub fn is_well_formed(&self) -> bool {
        self.is_native()
            || (self.0.len() == 64 && self.0.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A base58 ledger address.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A wallet id: hex of the double SHA-256 of the wallet's xpubkey.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(String);

impl WalletId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_id_hex_round_trip() {
        let id = TxId::new([0xab; 32]);
        assert_eq!(TxId::from_hex(&id.to_hex()).unwrap(), id);
    }

    #[test]
    fn tx_id_rejects_short_hex() {
        assert!(matches!(
            TxId::from_hex("abcd"),
            Err(TypesError::InvalidLength { expected: 32, actual: 2 })
        ));
    }

    #[test]
    fn tx_id_serializes_as_hex_string() {
        let id = TxId::new([1; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));
    }

    #[test]
    fn native_token() {
        assert!(TokenId::native().is_native());
        assert!(!TokenId::from_tx(&TxId::new([2; 32])).is_native());
    }

    #[test]
    fn token_id_shape() {
        assert!(TokenId::native().is_well_formed());
        assert!(TokenId::from_tx(&TxId::new([0xcd; 32])).is_well_formed());
        assert!(!TokenId::new("01").is_well_formed());
        assert!(!TokenId::new("CD".repeat(32)).is_well_formed());
        assert!(!TokenId::new(format!("{}\0", "c".repeat(63))).is_well_formed());
    }
}
