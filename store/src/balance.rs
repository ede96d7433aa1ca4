//! Aggregate balance storage trait (per address and per wallet).

use crate::utxo::Utxo;
use crate::StoreError;
use serde::{Deserialize, Serialize};
use windex_types::balance::{checked_sum, earliest};
use windex_types::{Address, Authorities, Balance, Timestamp, TokenId, TypesError, WalletId};

/// Running aggregate for one `(address | wallet, token)` key.
///
/// Entirely derived from the UTXO set and transaction history; a full replay
/// must reproduce it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub unlocked_amount: i64,
    pub locked_amount: i64,
    pub unlocked_authorities: Authorities,
    pub locked_authorities: Authorities,
    /// Soonest pending time-based unlock among the key's locked UTXOs.
    pub lock_expires: Option<Timestamp>,
    pub total_received: i64,
    /// Distinct non-voided transactions touching this key.
    pub transactions: u64,
}

impl TokenBalance {
    /// Fold a transaction delta into the aggregate.
    ///
    /// Authority bits that gain a positive count are OR'd in. Lost bits are
    /// not cleared here: the caller recomputes authorities from the UTXO set
    /// when [`Balance::loses_authority`] holds. On overflow the row is left
    /// untouched.
    pub fn apply(&mut self, delta: &Balance, transactions_delta: i64) -> Result<(), TypesError> {
        let unlocked_amount = checked_sum(self.unlocked_amount, delta.unlocked_amount)?;
        let locked_amount = checked_sum(self.locked_amount, delta.locked_amount)?;
        let total_received = checked_sum(self.total_received, delta.total_received)?;
        self.unlocked_amount = unlocked_amount;
        self.locked_amount = locked_amount;
        self.total_received = total_received;
        self.unlocked_authorities =
            self.unlocked_authorities | delta.unlocked_authorities.present();
        self.locked_authorities = self.locked_authorities | delta.locked_authorities.present();
        self.lock_expires = earliest(self.lock_expires, delta.lock_expires);
        self.transactions = self.transactions.saturating_add_signed(transactions_delta);
        Ok(())
    }

    /// Add another aggregate's amounts (not its authorities, expiry or
    /// transaction count) into this one.
    pub fn add_amounts(&mut self, other: &TokenBalance) -> Result<(), TypesError> {
        let delta = Balance {
            total_received: other.total_received,
            unlocked_amount: other.unlocked_amount,
            locked_amount: other.locked_amount,
            ..Balance::ZERO
        };
        self.apply(&delta, 0)
    }

    pub fn total(&self) -> i64 {
        self.unlocked_amount.saturating_add(self.locked_amount)
    }

    /// Nothing left: no amounts, authorities or transactions.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrite the UTXO-derived fields (authority bitsets, `lock_expires`)
    /// with what `utxos` actually hold. Amounts are left alone.
    pub fn refresh_from(&mut self, utxos: &[Utxo]) {
        let mut unlocked = Authorities::NONE;
        let mut locked = Authorities::NONE;
        let mut expires = None;
        for utxo in utxos.iter().filter(|u| u.is_live()) {
            if utxo.locked {
                locked = locked | utxo.value.authorities();
                expires = earliest(expires, utxo.timelock);
            } else {
                unlocked = unlocked | utxo.value.authorities();
            }
        }
        self.unlocked_authorities = unlocked;
        self.locked_authorities = locked;
        self.lock_expires = expires;
    }
}

/// Trait for the two aggregate tables.
pub trait BalanceStore {
    fn get_address_balance(
        &self,
        address: &Address,
        token: &TokenId,
    ) -> Result<Option<TokenBalance>, StoreError>;

    fn put_address_balance(
        &mut self,
        address: &Address,
        token: &TokenId,
        balance: &TokenBalance,
    ) -> Result<(), StoreError>;

    /// All tokens held by an address.
    fn address_balances(&self, address: &Address) -> Result<Vec<(TokenId, TokenBalance)>, StoreError>;

    fn get_wallet_balance(
        &self,
        wallet_id: &WalletId,
        token: &TokenId,
    ) -> Result<Option<TokenBalance>, StoreError>;

    fn put_wallet_balance(
        &mut self,
        wallet_id: &WalletId,
        token: &TokenId,
        balance: &TokenBalance,
    ) -> Result<(), StoreError>;

    /// All tokens held by a wallet.
    fn wallet_balances(&self, wallet_id: &WalletId) -> Result<Vec<(TokenId, TokenBalance)>, StoreError>;

    /// Merge a delta into an address aggregate inside the current write
    /// transaction, inserting the row if missing.
    fn merge_address_balance(
        &mut self,
        address: &Address,
        token: &TokenId,
        delta: &Balance,
        transactions_delta: i64,
    ) -> Result<TokenBalance, StoreError> {
        let mut row = self.get_address_balance(address, token)?.unwrap_or_default();
        row.apply(delta, transactions_delta)?;
        self.put_address_balance(address, token, &row)?;
        Ok(row)
    }

    /// Wallet counterpart of [`BalanceStore::merge_address_balance`].
    fn merge_wallet_balance(
        &mut self,
        wallet_id: &WalletId,
        token: &TokenId,
        delta: &Balance,
        transactions_delta: i64,
    ) -> Result<TokenBalance, StoreError> {
        let mut row = self.get_wallet_balance(wallet_id, token)?.unwrap_or_default();
        row.apply(delta, transactions_delta)?;
        self.put_wallet_balance(wallet_id, token, &row)?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windex_types::OutputValue;

    #[test]
    fn apply_sums_amounts_and_ors_authorities() {
        let mut row = TokenBalance::default();
        row.apply(&Balance::from_output(OutputValue::Amount(10), false, None).unwrap(), 1)
            .unwrap();
        row.apply(
            &Balance::from_output(OutputValue::Authority(Authorities::MINT), true, Some(Timestamp::new(50)))
                .unwrap(),
            1,
        )
        .unwrap();
        assert_eq!(row.unlocked_amount, 10);
        assert_eq!(row.total_received, 10);
        assert_eq!(row.locked_authorities, Authorities::MINT);
        assert_eq!(row.lock_expires, Some(Timestamp::new(50)));
        assert_eq!(row.transactions, 2);
    }

    #[test]
    fn refresh_drops_spent_authorities_and_recomputes_expiry() {
        use windex_types::{TxId, OutputValue::Authority};
        let utxo = |i: u32, value, locked, timelock: Option<u32>, spent: bool| Utxo {
            tx_id: TxId::new([i as u8; 32]),
            index: i,
            token_id: TokenId::new("01"),
            address: Address::new("A"),
            value,
            timelock: timelock.map(Timestamp::new),
            heightlock: None,
            locked,
            spent_by: spent.then(|| TxId::new([0xff; 32])),
            tx_proposal: None,
            voided: false,
        };
        let mut row = TokenBalance {
            unlocked_authorities: Authorities::ALL,
            lock_expires: Some(Timestamp::new(5)),
            ..TokenBalance::default()
        };
        row.refresh_from(&[
            utxo(1, Authority(Authorities::MINT), false, None, false),
            utxo(2, Authority(Authorities::MELT), false, None, true),
            utxo(3, OutputValue::Amount(4), true, Some(90), false),
            utxo(4, OutputValue::Amount(4), true, Some(40), false),
        ]);
        assert_eq!(row.unlocked_authorities, Authorities::MINT);
        assert_eq!(row.locked_authorities, Authorities::NONE);
        assert_eq!(row.lock_expires, Some(Timestamp::new(40)));
    }

    #[test]
    fn negative_transactions_delta_saturates() {
        let mut row = TokenBalance::default();
        row.apply(&Balance::ZERO, -1).unwrap();
        assert_eq!(row.transactions, 0);
    }

    #[test]
    fn overflowing_apply_leaves_row_unchanged() {
        let big = Balance::from_output(OutputValue::Amount(1 << 62), false, None).unwrap();
        let mut row = TokenBalance::default();
        row.apply(&big, 1).unwrap();
        let before = row;
        assert!(matches!(row.apply(&big, 1), Err(TypesError::Overflow)));
        assert_eq!(row, before);
        assert!(row.add_amounts(&before).is_err());
        assert_eq!(row, before);
    }
}
