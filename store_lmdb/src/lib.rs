//! LMDB storage backend for the wallet indexer.
//!
//! Implements all storage traits from `windex-store` using the `heed` LMDB
//! bindings. Each logical store maps to one or more LMDB databases within a
//! single environment; every unit of work is one LMDB write transaction.

pub mod environment;
pub mod error;
mod keys;
mod txn;

mod address;
mod balance;
mod history;
mod meta;
mod records;
mod utxo;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use txn::LmdbTxn;
