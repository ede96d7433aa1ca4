//! Fundamental types for the windex wallet indexer.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! identifiers, timestamps, the authority bitset, the balance arithmetic model,
//! and the typed transaction events consumed by the ingestion pipeline.

pub mod authority;
pub mod balance;
pub mod error;
pub mod event;
pub mod ids;
pub mod network;
pub mod state;
pub mod time;

pub use authority::{AuthorityDelta, Authorities, TOKEN_AUTHORITY_MASK, TOKEN_INDEX_MASK};
pub use balance::{Balance, TokenBalanceMap};
pub use error::TypesError;
pub use event::{OutputValue, TxEvent, TxInput, TxOutput, TxVersion};
pub use ids::{Address, TokenId, TxId, WalletId};
pub use network::Network;
pub use state::{ProposalStatus, WalletStatus};
pub use time::{Height, Timestamp};
