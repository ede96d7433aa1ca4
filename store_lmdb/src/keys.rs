//! Composite key encoding.
//!
//! Variable-length string components (addresses, wallet ids, token ids,
//! proposal ids) are terminated with a zero byte, which never occurs in their
//! hex or base58 text, so prefix scans cannot bleed into a longer key.
//! Numeric components are big-endian so LMDB's byte order is numeric order.

use windex_store::UtxoRef;
use windex_types::TxId;

pub(crate) const SEP: u8 = 0;

/// `tx_id ++ index`
pub(crate) fn outpoint_key(outpoint: &UtxoRef) -> Vec<u8> {
    let mut key = Vec::with_capacity(36);
    key.extend_from_slice(outpoint.tx_id.as_bytes());
    key.extend_from_slice(&outpoint.index.to_be_bytes());
    key
}

/// Parse the trailing 36 bytes of an index key back into an outpoint.
pub(crate) fn outpoint_suffix(key: &[u8]) -> Option<UtxoRef> {
    let start = key.len().checked_sub(36)?;
    let tx: [u8; 32] = key[start..start + 32].try_into().ok()?;
    let index: [u8; 4] = key[start + 32..].try_into().ok()?;
    Some(UtxoRef::new(TxId::new(tx), u32::from_be_bytes(index)))
}

/// `text ++ 0`
pub(crate) fn text_prefix(text: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(text.len() + 1);
    key.extend_from_slice(text.as_bytes());
    key.push(SEP);
    key
}

/// `text ++ 0 ++ rest`
pub(crate) fn text_key(text: &str, rest: &[u8]) -> Vec<u8> {
    let mut key = text_prefix(text);
    key.extend_from_slice(rest);
    key
}

/// `number ++ tx_id ++ index`
pub(crate) fn numbered_outpoint_key(number: u32, outpoint: &UtxoRef) -> Vec<u8> {
    let mut key = number.to_be_bytes().to_vec();
    key.extend_from_slice(&outpoint_key(outpoint));
    key
}

/// Increment a byte prefix to get the exclusive upper bound for a range scan.
pub(crate) fn increment_prefix(prefix: &mut Vec<u8>) {
    while let Some(last) = prefix.last_mut() {
        if *last < 0xFF {
            *last += 1;
            return;
        }
        prefix.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outpoint_suffix_roundtrips() {
        let outpoint = UtxoRef::new(TxId::new([7; 32]), 300);
        let key = text_key("HAddr", &outpoint_key(&outpoint));
        assert_eq!(outpoint_suffix(&key), Some(outpoint));
    }

    #[test]
    fn increment_prefix_carries() {
        let mut p = vec![1, 0xFF];
        increment_prefix(&mut p);
        assert_eq!(p, vec![2]);
    }

    #[test]
    fn text_prefix_does_not_match_longer_text() {
        let a = text_prefix("A1");
        let b = text_key("A10", b"x");
        assert!(!b.starts_with(&a));
    }
}
