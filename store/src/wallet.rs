//! Wallet storage trait.

use crate::StoreError;
use serde::{Deserialize, Serialize};
use windex_types::{Timestamp, WalletId, WalletStatus};

/// A wallet registered by its extended public key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub xpubkey: String,
    pub auth_xpubkey: Option<String>,
    pub status: WalletStatus,
    pub max_gap: u16,
    /// Highest address index with a transaction; -1 when none.
    pub highest_used_index: i32,
    /// Highest address index generated so far; -1 before loading.
    pub last_generated_index: i32,
    pub retry_count: u32,
    pub created_at: Timestamp,
    pub ready_at: Option<Timestamp>,
}

/// Trait for wallet storage.
pub trait WalletStore {
    fn get_wallet(&self, id: &WalletId) -> Result<Option<Wallet>, StoreError>;

    fn put_wallet(&mut self, wallet: &Wallet) -> Result<(), StoreError>;
}
