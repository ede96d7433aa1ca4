//! Token metadata storage trait.

use crate::StoreError;
use serde::{Deserialize, Serialize};
use windex_types::TokenId;

/// Name and symbol of a custom token, from its creation transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub id: TokenId,
    pub name: String,
    pub symbol: String,
}

/// Trait for token metadata.
pub trait TokenStore {
    fn get_token(&self, id: &TokenId) -> Result<Option<TokenInfo>, StoreError>;

    fn put_token(&mut self, info: &TokenInfo) -> Result<(), StoreError>;
}
