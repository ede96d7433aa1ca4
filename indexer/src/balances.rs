//! Address and wallet balance deltas for one transaction.
//!
//! Every input and output is turned into a [`Balance`] and merged into its
//! owner's [`TokenBalanceMap`]. Merge is commutative, so neither the order of
//! inputs and outputs nor the order in which addresses are visited matters.

use std::collections::BTreeMap;

use windex_store::Utxo;
use windex_types::{
    Address, Balance, Height, Timestamp, TokenBalanceMap, TokenId, TxInput, TxOutput, TypesError,
    WalletId,
};

use crate::locks::is_locked;

/// Net effect of one transaction per address.
pub type AddressDeltas = BTreeMap<Address, TokenBalanceMap>;

/// Net effect of one transaction per wallet.
pub type WalletDeltas = BTreeMap<WalletId, TokenBalanceMap>;

fn add(
    deltas: &mut AddressDeltas,
    address: &Address,
    token: &TokenId,
    balance: &Balance,
) -> Result<(), TypesError> {
    deltas
        .entry(address.clone())
        .or_default()
        .add(token.clone(), balance)
}

fn add_inputs(deltas: &mut AddressDeltas, inputs: &[TxInput]) -> Result<(), TypesError> {
    for input in inputs {
        add(deltas, &input.address, &input.token_id, &Balance::from_input(input.value)?)?;
    }
    Ok(())
}

/// Deltas of a transaction as it is ingested.
///
/// Each output's lock is resolved against `now` and `best_height`;
/// `heightlock` applies to every output (block rewards). Fails with
/// [`TypesError::Overflow`] if some address or token sum leaves the signed
/// range.
pub fn address_balance_deltas(
    inputs: &[TxInput],
    outputs: &[TxOutput],
    heightlock: Option<Height>,
    now: Timestamp,
    best_height: Height,
) -> Result<AddressDeltas, TypesError> {
    let mut deltas = AddressDeltas::new();
    for output in outputs {
        let locked = is_locked(output.timelock, heightlock, now, best_height);
        let balance = Balance::from_output(output.value, locked, output.timelock)?;
        add(&mut deltas, &output.address, &output.token_id, &balance)?;
    }
    add_inputs(&mut deltas, inputs)?;
    Ok(deltas)
}

/// Deltas of an already stored transaction, with each output taken at the
/// lock state its row has now. Negated, this is what reverses it.
pub fn stored_balance_deltas(inputs: &[TxInput], outputs: &[Utxo]) -> Result<AddressDeltas, TypesError> {
    let mut deltas = AddressDeltas::new();
    for row in outputs {
        let balance = Balance::from_output(row.value, row.locked, row.timelock)?;
        add(&mut deltas, &row.address, &row.token_id, &balance)?;
    }
    add_inputs(&mut deltas, inputs)?;
    Ok(deltas)
}

/// Re-key address deltas by wallet. Addresses owned by no wallet are dropped.
pub fn wallet_balance_deltas(
    address_wallets: &BTreeMap<Address, WalletId>,
    deltas: &AddressDeltas,
) -> Result<WalletDeltas, TypesError> {
    let mut wallets = WalletDeltas::new();
    for (address, map) in deltas {
        if let Some(wallet_id) = address_wallets.get(address) {
            wallets.entry(wallet_id.clone()).or_default().merge_in(map)?;
        }
    }
    Ok(wallets)
}

/// Negate every map.
pub fn negate<K: Ord + Clone>(deltas: &BTreeMap<K, TokenBalanceMap>) -> BTreeMap<K, TokenBalanceMap> {
    deltas.iter().map(|(k, m)| (k.clone(), m.negate())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use windex_types::{Authorities, OutputValue, TxId};

    fn input(value: u64, token: &str, address: &str) -> TxInput {
        TxInput {
            tx_id: TxId::new([value as u8; 32]),
            index: 0,
            value: OutputValue::Amount(value),
            token_id: TokenId::new(token),
            address: Address::from(address),
            timelock: None,
        }
    }

    fn output(value: u64, token: &str, address: &str, timelock: Option<u32>) -> TxOutput {
        TxOutput {
            value: OutputValue::Amount(value),
            token_id: TokenId::new(token),
            address: Address::from(address),
            timelock: timelock.map(Timestamp::new),
        }
    }

    fn received_and_total(deltas: &AddressDeltas, address: &str, token: &str) -> (i64, i64) {
        let b = deltas[&Address::from(address)]
            .get(&TokenId::new(token))
            .copied()
            .unwrap_or_default();
        (b.total_received, b.total())
    }

    #[test]
    fn mixed_transaction_nets_per_address_and_token() {
        let inputs = [
            input(10, "t1", "a1"),
            input(5, "t1", "a1"),
            input(7, "t2", "a1"),
            input(3, "t1", "a2"),
        ];
        let outputs = [
            output(5, "t1", "a1", None),
            output(2, "t3", "a1", None),
            output(11, "t1", "a2", None),
        ];
        let deltas = address_balance_deltas(&inputs, &outputs, None, Timestamp::new(20_000), 0).unwrap();

        assert_eq!(received_and_total(&deltas, "a1", "t1"), (5, -10));
        assert_eq!(received_and_total(&deltas, "a1", "t2"), (0, -7));
        assert_eq!(received_and_total(&deltas, "a1", "t3"), (2, 2));
        assert_eq!(received_and_total(&deltas, "a2", "t1"), (11, 8));
    }

    #[test]
    fn order_does_not_matter() {
        let inputs = [input(10, "t1", "a1"), input(3, "t1", "a2")];
        let outputs = [output(4, "t1", "a2", Some(50)), output(9, "t1", "a1", None)];
        let mut rev_inputs = inputs.clone();
        rev_inputs.reverse();
        let mut rev_outputs = outputs.clone();
        rev_outputs.reverse();
        let now = Timestamp::new(10);
        assert_eq!(
            address_balance_deltas(&inputs, &outputs, None, now, 0).unwrap(),
            address_balance_deltas(&rev_inputs, &rev_outputs, None, now, 0).unwrap()
        );
    }

    #[test]
    fn heightlock_locks_every_output() {
        let outputs = [output(6400, "00", "miner", None)];
        let deltas = address_balance_deltas(&[], &outputs, Some(2), Timestamp::new(1), 1).unwrap();
        let b = deltas[&Address::from("miner")].get(&TokenId::native()).copied().unwrap();
        assert_eq!((b.unlocked_amount, b.locked_amount), (0, 6400));
    }

    #[test]
    fn authority_outputs_carry_no_amount() {
        let outputs = [TxOutput {
            value: OutputValue::Authority(Authorities::ALL),
            token_id: TokenId::new("t1"),
            address: Address::from("a1"),
            timelock: None,
        }];
        let deltas = address_balance_deltas(&[], &outputs, None, Timestamp::new(1), 0).unwrap();
        let b = deltas[&Address::from("a1")].get(&TokenId::new("t1")).copied().unwrap();
        assert_eq!(b.total(), 0);
        assert_eq!(b.unlocked_authorities.present(), Authorities::ALL);
    }

    #[test]
    fn wallet_deltas_merge_addresses_and_drop_unowned() {
        let inputs = [input(3, "t1", "a2")];
        let outputs = [output(5, "t1", "a1", None), output(1, "t1", "stranger", None)];
        let deltas = address_balance_deltas(&inputs, &outputs, None, Timestamp::new(1), 0).unwrap();
        let owners: BTreeMap<Address, WalletId> = [
            (Address::from("a1"), WalletId::new("w")),
            (Address::from("a2"), WalletId::new("w")),
        ]
        .into_iter()
        .collect();

        let wallets = wallet_balance_deltas(&owners, &deltas).unwrap();
        assert_eq!(wallets.len(), 1);
        let b = wallets[&WalletId::new("w")].get(&TokenId::new("t1")).copied().unwrap();
        assert_eq!(b.total(), 2);
        assert_eq!(b.total_received, 5);
    }

    #[test]
    fn outputs_summing_past_the_signed_range_fail() {
        let half = 1u64 << 62;
        let outputs = [output(half, "t1", "a1", None), output(half, "t1", "a1", None)];
        assert!(matches!(
            address_balance_deltas(&[], &outputs, None, Timestamp::new(1), 0),
            Err(TypesError::Overflow)
        ));

        // The same amounts on different addresses are fine.
        let outputs = [output(half, "t1", "a1", None), output(half, "t1", "a2", None)];
        assert!(address_balance_deltas(&[], &outputs, None, Timestamp::new(1), 0).is_ok());
    }
}
