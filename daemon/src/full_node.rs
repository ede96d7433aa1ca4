//! Blocking HTTP client for the full node's public API.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use windex_indexer::{FullNode, IndexerError};
use windex_types::{Height, TxId};

/// Talks to a full node over HTTP.
///
/// Blocking by design: the indexer calls it from inside a unit of work,
/// which the daemon always runs on a blocking thread.
pub struct HttpFullNode {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl HttpFullNode {
    /// Create a client targeting the given base URL (e.g. `http://localhost:8080`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, IndexerError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| IndexerError::FullNode(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, IndexerError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .map_err(|e| IndexerError::FullNode(format!("request to {url} failed: {e}")))?;
        if !response.status().is_success() {
            return Err(IndexerError::FullNode(format!(
                "{url} returned HTTP {}",
                response.status()
            )));
        }
        response
            .json()
            .map_err(|e| IndexerError::FullNode(format!("invalid JSON from {url}: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct TransactionResponse {
    meta: TransactionMeta,
}

#[derive(Debug, Deserialize)]
struct TransactionMeta {
    #[serde(default)]
    voided_by: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    dag: DagStatus,
}

#[derive(Debug, Deserialize)]
struct DagStatus {
    best_block: BestBlock,
}

#[derive(Debug, Deserialize)]
struct BestBlock {
    height: Height,
}

impl FullNode for HttpFullNode {
    fn is_voided(&self, tx_id: &TxId) -> Result<bool, IndexerError> {
        let tx: TransactionResponse = self.get("/v1a/transaction", &[("id", tx_id.to_hex())])?;
        Ok(!tx.meta.voided_by.is_empty())
    }

    fn best_height(&self) -> Result<Height, IndexerError> {
        let status: StatusResponse = self.get("/v1a/status", &[])?;
        Ok(status.dag.best_block.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voided_by_defaults_to_empty() {
        let tx: TransactionResponse =
            serde_json::from_str(r#"{"success":true,"meta":{"hash":"ab"}}"#).unwrap();
        assert!(tx.meta.voided_by.is_empty());
        let tx: TransactionResponse =
            serde_json::from_str(r#"{"meta":{"voided_by":["ab"]}}"#).unwrap();
        assert_eq!(tx.meta.voided_by.len(), 1);
    }

    #[test]
    fn status_reads_best_block_height() {
        let status: StatusResponse =
            serde_json::from_str(r#"{"dag":{"best_block":{"hash":"cd","height":4200}}}"#).unwrap();
        assert_eq!(status.dag.best_block.height, 4200);
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let node = HttpFullNode::new("http://localhost:8080/").unwrap();
        assert_eq!(node.base_url, "http://localhost:8080");
    }
}
