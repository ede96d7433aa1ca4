#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Stored rows are bincode; a corrupt page must surface as an error.
    let _ = bincode::deserialize::<windex_store::Utxo>(data);
    let _ = bincode::deserialize::<windex_store::TxRecord>(data);
    let _ = bincode::deserialize::<windex_store::TokenBalance>(data);
    let _ = bincode::deserialize::<windex_store::Wallet>(data);
    let _ = bincode::deserialize::<windex_types::TxId>(data);
});
