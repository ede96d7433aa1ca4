//! LMDB implementations of the single-keyed record stores: wallets,
//! transactions, tokens and proposals.

use windex_store::{
    ProposalId, ProposalStore, StoreError, TokenInfo, TokenStore, TransactionStore, TxProposal,
    TxRecord, Wallet, WalletStore,
};
use windex_types::{ProposalStatus, Timestamp, TokenId, TxId, WalletId};

use crate::txn::LmdbTxn;

impl WalletStore for LmdbTxn<'_> {
    fn get_wallet(&self, id: &WalletId) -> Result<Option<Wallet>, StoreError> {
        self.get_value(self.env.wallets_db, id.as_str().as_bytes())
    }

    fn put_wallet(&mut self, wallet: &Wallet) -> Result<(), StoreError> {
        self.put_value(self.env.wallets_db, wallet.id.as_str().as_bytes(), wallet)
    }
}

impl TransactionStore for LmdbTxn<'_> {
    fn get_tx(&self, tx_id: &TxId) -> Result<Option<TxRecord>, StoreError> {
        self.get_value(self.env.txs_db, tx_id.as_bytes())
    }

    fn put_tx(&mut self, record: &TxRecord) -> Result<(), StoreError> {
        self.put_value(self.env.txs_db, record.tx_id().as_bytes(), record)
    }
}

impl TokenStore for LmdbTxn<'_> {
    fn get_token(&self, id: &TokenId) -> Result<Option<TokenInfo>, StoreError> {
        self.get_value(self.env.tokens_db, id.as_str().as_bytes())
    }

    fn put_token(&mut self, info: &TokenInfo) -> Result<(), StoreError> {
        self.put_value(self.env.tokens_db, info.id.as_str().as_bytes(), info)
    }
}

impl ProposalStore for LmdbTxn<'_> {
    fn get_proposal(&self, id: &ProposalId) -> Result<Option<TxProposal>, StoreError> {
        self.get_value(self.env.proposals_db, id.as_str().as_bytes())
    }

    fn put_proposal(&mut self, proposal: &TxProposal) -> Result<(), StoreError> {
        self.put_value(self.env.proposals_db, proposal.id.as_str().as_bytes(), proposal)
    }

    fn open_proposals_updated_before(&self, cutoff: Timestamp) -> Result<Vec<TxProposal>, StoreError> {
        let all: Vec<TxProposal> = self.values_with_prefix(self.env.proposals_db, &[])?;
        Ok(all
            .into_iter()
            .filter(|p| p.status == ProposalStatus::Open && p.updated_at < cutoff)
            .collect())
    }
}
