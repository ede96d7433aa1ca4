//! Balance arithmetic model.
//!
//! A [`Balance`] is the contribution of some set of inputs and outputs to one
//! token of one address (or wallet). Balances form a commutative monoid under
//! [`Balance::merge`] with [`Balance::ZERO`] as identity, so a transaction's
//! inputs and outputs can be folded in any order. [`Balance::negate`] produces
//! the delta that undoes a merge, which is how voided transactions are reversed.
//!
//! Components stay within `-i64::MAX..=i64::MAX`. A merge that would leave
//! that range fails with [`TypesError::Overflow`] rather than wrapping.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::authority::AuthorityDelta;
use crate::event::OutputValue;
use crate::{Timestamp, TokenId, TypesError};

/// Per-token balance contribution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Sum of plain amounts received through outputs.
    pub total_received: i64,
    pub unlocked_amount: i64,
    pub locked_amount: i64,
    /// Soonest time-based unlock among the locked contributions.
    pub lock_expires: Option<Timestamp>,
    pub unlocked_authorities: AuthorityDelta,
    pub locked_authorities: AuthorityDelta,
}

impl Balance {
    pub const ZERO: Self = Self {
        total_received: 0,
        unlocked_amount: 0,
        locked_amount: 0,
        lock_expires: None,
        unlocked_authorities: AuthorityDelta::ZERO,
        locked_authorities: AuthorityDelta::ZERO,
    };

    /// Contribution of an output. `locked` is the resolved lock state at
    /// ingestion time; `timelock` only feeds `lock_expires` when locked.
    pub fn from_output(
        value: OutputValue,
        locked: bool,
        timelock: Option<Timestamp>,
    ) -> Result<Self, TypesError> {
        let mut balance = Self::ZERO;
        match value {
            OutputValue::Amount(_) => {
                let amount = value.signed_amount()?;
                balance.total_received = amount;
                if locked {
                    balance.locked_amount = amount;
                } else {
                    balance.unlocked_amount = amount;
                }
            }
            OutputValue::Authority(authorities) => {
                let delta = AuthorityDelta::from_authorities(authorities, 1);
                if locked {
                    balance.locked_authorities = delta;
                } else {
                    balance.unlocked_authorities = delta;
                }
            }
        }
        if locked {
            balance.lock_expires = timelock;
        }
        Ok(balance)
    }

    /// Contribution of an input: an unlocked, negative amount (or authority).
    pub fn from_input(value: OutputValue) -> Result<Self, TypesError> {
        let mut balance = Self::ZERO;
        match value {
            OutputValue::Amount(_) => balance.unlocked_amount = -value.signed_amount()?,
            OutputValue::Authority(authorities) => {
                balance.unlocked_authorities = AuthorityDelta::from_authorities(authorities, -1);
            }
        }
        Ok(balance)
    }

    /// Moving a UTXO from the locked to the unlocked track.
    pub fn unlock_transfer(value: OutputValue) -> Result<Self, TypesError> {
        let mut balance = Self::ZERO;
        match value {
            OutputValue::Amount(_) => {
                let amount = value.signed_amount()?;
                balance.locked_amount = -amount;
                balance.unlocked_amount = amount;
            }
            OutputValue::Authority(authorities) => {
                balance.locked_authorities = AuthorityDelta::from_authorities(authorities, -1);
                balance.unlocked_authorities = AuthorityDelta::from_authorities(authorities, 1);
            }
        }
        Ok(balance)
    }

    /// Moving a UTXO back from the unlocked to the locked track.
    pub fn relock_transfer(value: OutputValue) -> Result<Self, TypesError> {
        Ok(Self::unlock_transfer(value)?.negate())
    }

    /// Pointwise sum. Fails with [`TypesError::Overflow`] instead of wrapping.
    pub fn merge(&self, other: &Self) -> Result<Self, TypesError> {
        Ok(Self {
            total_received: checked_sum(self.total_received, other.total_received)?,
            unlocked_amount: checked_sum(self.unlocked_amount, other.unlocked_amount)?,
            locked_amount: checked_sum(self.locked_amount, other.locked_amount)?,
            lock_expires: earliest(self.lock_expires, other.lock_expires),
            unlocked_authorities: self.unlocked_authorities.merge(other.unlocked_authorities),
            locked_authorities: self.locked_authorities.merge(other.locked_authorities),
        })
    }

    pub fn merge_in(&mut self, other: &Self) -> Result<(), TypesError> {
        *self = self.merge(other)?;
        Ok(())
    }

    /// The delta that undoes merging `self`.
    pub fn negate(&self) -> Self {
        Self {
            total_received: self.total_received.saturating_neg(),
            unlocked_amount: self.unlocked_amount.saturating_neg(),
            locked_amount: self.locked_amount.saturating_neg(),
            lock_expires: self.lock_expires,
            unlocked_authorities: self.unlocked_authorities.negate(),
            locked_authorities: self.locked_authorities.negate(),
        }
    }

    /// Unlocked plus locked.
    pub fn total(&self) -> i64 {
        self.unlocked_amount.saturating_add(self.locked_amount)
    }

    /// Whether anything is still waiting on a lock.
    pub fn has_locked(&self) -> bool {
        self.locked_amount != 0 || !self.locked_authorities.is_zero()
    }

    /// Whether some authority counter went negative in this delta.
    pub fn loses_authority(&self) -> bool {
        self.unlocked_authorities.has_negative() || self.locked_authorities.has_negative()
    }
}

/// Sum of two balance components, kept within `-i64::MAX..=i64::MAX` so that
/// every balance stays negatable.
pub fn checked_sum(a: i64, b: i64) -> Result<i64, TypesError> {
    a.checked_add(b)
        .filter(|sum| *sum != i64::MIN)
        .ok_or(TypesError::Overflow)
}

/// The soonest of two optional expiries.
pub fn earliest(a: Option<Timestamp>, b: Option<Timestamp>) -> Option<Timestamp> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

/// Token id to balance, for one address or wallet within one unit of work.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalanceMap(BTreeMap<TokenId, Balance>);

impl TokenBalanceMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn single(token: TokenId, balance: Balance) -> Self {
        Self(BTreeMap::from([(token, balance)]))
    }

    /// Build a map, merging entries that share a token.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (TokenId, Balance)>,
    ) -> Result<Self, TypesError> {
        let mut map = Self::new();
        for (token, balance) in entries {
            map.add(token, &balance)?;
        }
        Ok(map)
    }

    /// Merge `balance` into the entry for `token`.
    pub fn add(&mut self, token: TokenId, balance: &Balance) -> Result<(), TypesError> {
        self.0.entry(token).or_insert(Balance::ZERO).merge_in(balance)
    }

    /// Pointwise merge.
    pub fn merge(&self, other: &Self) -> Result<Self, TypesError> {
        let mut out = self.clone();
        out.merge_in(other)?;
        Ok(out)
    }

    pub fn merge_in(&mut self, other: &Self) -> Result<(), TypesError> {
        for (token, balance) in &other.0 {
            self.add(token.clone(), balance)?;
        }
        Ok(())
    }

    pub fn negate(&self) -> Self {
        Self(self.0.iter().map(|(t, b)| (t.clone(), b.negate())).collect())
    }

    pub fn get(&self, token: &TokenId) -> Option<&Balance> {
        self.0.get(token)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TokenId, &Balance)> {
        self.0.iter()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &TokenId> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Authorities;

    fn amount(value: u64) -> OutputValue {
        OutputValue::Amount(value)
    }

    #[test]
    fn locked_output_goes_to_locked_track() {
        let b = Balance::from_output(amount(50), true, Some(Timestamp::new(9))).unwrap();
        assert_eq!(b.locked_amount, 50);
        assert_eq!(b.unlocked_amount, 0);
        assert_eq!(b.total_received, 50);
        assert_eq!(b.lock_expires, Some(Timestamp::new(9)));
    }

    #[test]
    fn unlocked_output_ignores_timelock() {
        let b = Balance::from_output(amount(50), false, Some(Timestamp::new(9))).unwrap();
        assert_eq!(b.unlocked_amount, 50);
        assert_eq!(b.lock_expires, None);
    }

    #[test]
    fn authority_output_has_no_amount() {
        let b = Balance::from_output(OutputValue::Authority(Authorities::MINT), false, None).unwrap();
        assert_eq!(b.total(), 0);
        assert_eq!(b.total_received, 0);
        assert_eq!(b.unlocked_authorities.present(), Authorities::MINT);
    }

    #[test]
    fn input_is_negative_unlocked() {
        let b = Balance::from_input(amount(7)).unwrap();
        assert_eq!(b.unlocked_amount, -7);
        assert_eq!(b.total_received, 0);
        let a = Balance::from_input(OutputValue::Authority(Authorities::MELT)).unwrap();
        assert!(a.loses_authority());
    }

    #[test]
    fn merge_keeps_soonest_expiry() {
        let a = Balance::from_output(amount(1), true, Some(Timestamp::new(30))).unwrap();
        let b = Balance::from_output(amount(1), true, Some(Timestamp::new(20))).unwrap();
        assert_eq!(a.merge(&b).unwrap().lock_expires, Some(Timestamp::new(20)));
        assert_eq!(a.merge(&Balance::ZERO).unwrap().lock_expires, Some(Timestamp::new(30)));
    }

    #[test]
    fn unlock_transfer_preserves_total() {
        let locked = Balance::from_output(amount(6400), true, None).unwrap();
        let after = locked.merge(&Balance::unlock_transfer(amount(6400)).unwrap()).unwrap();
        assert_eq!(after.unlocked_amount, 6400);
        assert_eq!(after.locked_amount, 0);
        assert_eq!(after.total(), locked.total());
        let back = after.merge(&Balance::relock_transfer(amount(6400)).unwrap()).unwrap();
        assert_eq!((back.unlocked_amount, back.locked_amount), (0, 6400));
    }

    #[test]
    fn amounts_past_the_signed_range_are_refused() {
        assert!(matches!(
            Balance::from_output(amount(u64::MAX), false, None),
            Err(TypesError::InvalidAmount(_))
        ));
        assert!(Balance::from_input(amount(i64::MAX as u64 + 1)).is_err());
        assert_eq!(
            Balance::from_input(amount(i64::MAX as u64)).unwrap().unlocked_amount,
            -i64::MAX
        );
    }

    #[test]
    fn merge_overflow_is_an_error() {
        let half = Balance::from_output(amount(1 << 62), false, None).unwrap();
        assert!(matches!(half.merge(&half), Err(TypesError::Overflow)));

        let spent = Balance::from_input(amount(i64::MAX as u64)).unwrap();
        let one = Balance::from_input(amount(1)).unwrap();
        assert!(matches!(spent.merge(&one), Err(TypesError::Overflow)));

        let mut map = TokenBalanceMap::single(TokenId::native(), half);
        assert!(map.add(TokenId::native(), &half).is_err());
    }

    #[test]
    fn token_map_merges_pointwise() {
        let t1 = TokenId::new("t1");
        let t2 = TokenId::new("t2");
        let a = TokenBalanceMap::single(t1.clone(), Balance::from_output(amount(5), false, None).unwrap());
        let b = TokenBalanceMap::from_entries([
            (t1.clone(), Balance::from_input(amount(2)).unwrap()),
            (t2.clone(), Balance::from_input(amount(3)).unwrap()),
        ])
        .unwrap();
        let m = a.merge(&b).unwrap();
        assert_eq!(m.get(&t1).unwrap().total(), 3);
        assert_eq!(m.get(&t2).unwrap().total(), -3);
        assert_eq!(m.merge(&m.negate()).unwrap().get(&t1).unwrap().total(), 0);
    }
}
