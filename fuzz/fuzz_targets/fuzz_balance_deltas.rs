#![no_main]

use libfuzzer_sys::fuzz_target;
use windex_indexer::balances::{address_balance_deltas, negate};
use windex_types::{Address, Authorities, OutputValue, Timestamp, TokenId, TxId, TxInput, TxOutput};

fuzz_target!(|data: &[u8]| {
    // Each 4-byte chunk is one input or output. Merging the deltas with
    // their negation must cancel out on every address and token.
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    for chunk in data.chunks_exact(4) {
        let token = TokenId::new(format!("{:02x}", chunk[2] % 3));
        let address = Address::new(format!("A{}", chunk[3] % 4));
        let value = if chunk[2] & 0x80 != 0 && !token.is_native() {
            OutputValue::Authority(Authorities::ALL)
        } else {
            OutputValue::Amount(u64::from(u16::from_le_bytes([chunk[0], chunk[1]])))
        };
        if chunk[3] & 0x80 != 0 {
            inputs.push(TxInput {
                tx_id: TxId::new([chunk[0]; 32]),
                index: u32::from(chunk[1]),
                value,
                token_id: token,
                address,
                timelock: None,
            });
        } else {
            outputs.push(TxOutput {
                value,
                token_id: token,
                address,
                timelock: Some(Timestamp::new(u32::from(chunk[1]))),
            });
        }
    }

    let Ok(deltas) = address_balance_deltas(&inputs, &outputs, None, Timestamp::new(128), 0) else {
        return;
    };
    let negated = negate(&deltas);
    for (address, map) in &deltas {
        let cancelled = map.merge(&negated[address]).expect("negation stays in range");
        for (_, balance) in cancelled.iter() {
            assert_eq!(balance.total(), 0);
            assert_eq!(balance.total_received, 0);
            assert!(balance.unlocked_authorities.is_zero());
        }
    }
});
