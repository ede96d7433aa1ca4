//! Token authorities: the mint/melt permission flags carried by authority outputs.
//!
//! Two representations exist. [`Authorities`] is the plain presence bitset stored
//! on UTXOs and aggregates. [`AuthorityDelta`] is a signed per-bit counter used
//! while accounting a transaction: receiving an authority adds one, spending it
//! subtracts one. Counters make deltas invertible; the bitset view is recovered
//! with [`AuthorityDelta::present`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// High bit of an output's token-data byte: the value is an authority bitmask.
pub const TOKEN_AUTHORITY_MASK: u8 = 0b1000_0000;

/// Low bits of an output's token-data byte: index into the transaction's token list.
pub const TOKEN_INDEX_MASK: u8 = 0b0111_1111;

/// A typed 2-bit authority set.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Authorities(u8);

impl Authorities {
    pub const NONE: Self = Self(0);
    pub const MINT: Self = Self(0b01);
    pub const MELT: Self = Self(0b10);
    pub const ALL: Self = Self(0b11);

    /// Build from raw bits, rejecting anything outside `ALL`.
    pub fn from_bits(bits: u8) -> Option<Self> {
        (bits & !Self::ALL.0 == 0).then_some(Self(bits))
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Authorities {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for Authorities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mint = if self.contains(Self::MINT) { "M" } else { "-" };
        let melt = if self.contains(Self::MELT) { "B" } else { "-" };
        write!(f, "Authorities({mint}{melt})")
    }
}

/// Signed per-bit authority counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorityDelta {
    pub mint: i32,
    pub melt: i32,
}

impl AuthorityDelta {
    pub const ZERO: Self = Self { mint: 0, melt: 0 };

    /// One unit (positive or negative) on every bit present in `authorities`.
    pub fn from_authorities(authorities: Authorities, sign: i32) -> Self {
        Self {
            mint: if authorities.contains(Authorities::MINT) { sign } else { 0 },
            melt: if authorities.contains(Authorities::MELT) { sign } else { 0 },
        }
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            mint: self.mint.saturating_add(other.mint),
            melt: self.melt.saturating_add(other.melt),
        }
    }

    pub fn negate(self) -> Self {
        Self {
            mint: self.mint.saturating_neg(),
            melt: self.melt.saturating_neg(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.mint == 0 && self.melt == 0
    }

    /// Whether any bit lost an authority. Aggregates must then be recomputed
    /// from the UTXO set, since another UTXO may still grant the same bit.
    pub fn has_negative(&self) -> bool {
        self.mint < 0 || self.melt < 0
    }

    /// The bits with a positive count.
    pub fn present(&self) -> Authorities {
        let mut bits = 0;
        if self.mint > 0 {
            bits |= Authorities::MINT.0;
        }
        if self.melt > 0 {
            bits |= Authorities::MELT.0;
        }
        Authorities(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bits_rejects_unknown_flags() {
        assert_eq!(Authorities::from_bits(0b11), Some(Authorities::ALL));
        assert_eq!(Authorities::from_bits(0b100), None);
    }

    #[test]
    fn bitor_unions() {
        assert_eq!(Authorities::MINT | Authorities::MELT, Authorities::ALL);
    }

    #[test]
    fn delta_counts_per_bit() {
        let received = AuthorityDelta::from_authorities(Authorities::ALL, 1);
        let spent = AuthorityDelta::from_authorities(Authorities::MINT, -1);
        let net = received.merge(spent);
        assert_eq!(net, AuthorityDelta { mint: 0, melt: 1 });
        assert_eq!(net.present(), Authorities::MELT);
        assert!(!net.has_negative());
        assert!(spent.has_negative());
    }
}
