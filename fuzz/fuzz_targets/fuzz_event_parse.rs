#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Events come straight off the wire: parsing and validation must reject
    // garbage without panicking.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = windex_types::TxEvent::from_json(s);
        let _ = serde_json::from_str::<windex_indexer::WalletEvent>(s);
    }
});
