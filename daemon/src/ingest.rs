//! Event ingestion loop and background sweeps.
//!
//! Events are read as newline-delimited JSON, one transaction per line. A
//! line of the form `{"voided": "<tx id>"}` asks for a void instead. Lines
//! are applied strictly in order; every call into the indexer runs on a
//! blocking thread.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use windex_indexer::{Indexer, IndexerError, ProcessResult, VoidResult};
use windex_store_lmdb::LmdbEnvironment;
use windex_types::{Timestamp, TxId};
use windex_utils::format_duration;

type SharedIndexer = Arc<Indexer<LmdbEnvironment>>;

const MAX_ATTEMPTS: u32 = 5;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VoidNotice {
    voided: TxId,
}

#[derive(Debug, Default)]
struct IngestStats {
    applied: u64,
    duplicates: u64,
    rejected: u64,
    voided: u64,
    failed: u64,
}

/// Ingest events from `events` (stdin when `None`) until end of input or
/// Ctrl-C, sweeping locks and stale proposals in the background.
pub async fn run(indexer: SharedIndexer, events: Option<PathBuf>) -> anyhow::Result<()> {
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &events {
        Some(path) => Box::new(BufReader::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening event stream {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let sweepers = [
        spawn_time_sweeper(indexer.clone()),
        spawn_proposal_sweeper(indexer.clone()),
    ];

    let started = Instant::now();
    let mut stats = IngestStats::default();
    let mut lines = reader.lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("reading event stream")? {
                    Some(line) => handle_line(&indexer, line, &mut stats).await?,
                    None => {
                        info!("event stream ended");
                        break;
                    }
                }
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping ingestion");
                break;
            }
        }
    }

    for sweeper in sweepers {
        sweeper.abort();
    }
    info!(
        applied = stats.applied,
        duplicates = stats.duplicates,
        rejected = stats.rejected,
        voided = stats.voided,
        failed = stats.failed,
        elapsed = %format_duration(started.elapsed().as_secs()),
        "ingestion finished"
    );
    Ok(())
}

async fn handle_line(indexer: &SharedIndexer, line: String, stats: &mut IngestStats) -> anyhow::Result<()> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }

    if let Ok(notice) = serde_json::from_str::<VoidNotice>(line) {
        let tx_id = notice.voided;
        match with_retries(indexer, move |ix| ix.handle_voided(&tx_id)).await? {
            Some(VoidResult::Voided) => stats.voided += 1,
            Some(other) => debug!(tx = %tx_id, result = ?other, "void had no effect"),
            None => stats.failed += 1,
        }
        return Ok(());
    }

    let json: Arc<str> = Arc::from(line);
    match with_retries(indexer, move |ix| ix.process_json(&json)).await? {
        Some(ProcessResult::Applied) => stats.applied += 1,
        Some(ProcessResult::Duplicate) => stats.duplicates += 1,
        Some(ProcessResult::Rejected(_)) => stats.rejected += 1,
        None => stats.failed += 1,
    }
    Ok(())
}

/// Run `op` on a blocking thread, retrying transient failures with a
/// linear backoff. Returns `None` once the event is given up on.
async fn with_retries<T, F>(indexer: &SharedIndexer, op: F) -> anyhow::Result<Option<T>>
where
    T: Send + 'static,
    F: Fn(&Indexer<LmdbEnvironment>) -> Result<T, IndexerError> + Clone + Send + 'static,
{
    for attempt in 1..=MAX_ATTEMPTS {
        let ix = indexer.clone();
        let op = op.clone();
        let result = tokio::task::spawn_blocking(move || op(&ix))
            .await
            .context("indexer task panicked")?;
        match result {
            Ok(value) => return Ok(Some(value)),
            Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                warn!(attempt, error = %e, "transient failure, retrying");
                tokio::time::sleep(RETRY_BASE_DELAY * attempt).await;
            }
            Err(e) => {
                error!(attempt, error = %e, "giving up on event");
                return Ok(None);
            }
        }
    }
    Ok(None)
}

fn spawn_time_sweeper(indexer: SharedIndexer) -> tokio::task::JoinHandle<()> {
    let period = Duration::from_secs(indexer.config().time_sweep_interval_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let ix = indexer.clone();
            match tokio::task::spawn_blocking(move || ix.sweep_time_locks(Timestamp::now())).await {
                Ok(Ok(0)) => {}
                Ok(Ok(unlocked)) => debug!(unlocked, "time-lock sweep"),
                Ok(Err(e)) => warn!(error = %e, "time-lock sweep failed"),
                Err(e) => error!(error = %e, "time-lock sweep panicked"),
            }
        }
    })
}

fn spawn_proposal_sweeper(indexer: SharedIndexer) -> tokio::task::JoinHandle<()> {
    let period = Duration::from_secs(indexer.config().proposal_sweep_interval_secs.max(1));
    let ttl = indexer.config().proposal_ttl_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let ix = indexer.clone();
            match tokio::task::spawn_blocking(move || ix.sweep_stale_proposals(Timestamp::now(), ttl)).await {
                Ok(Ok(0)) => {}
                Ok(Ok(cancelled)) => debug!(cancelled, "proposal sweep"),
                Ok(Err(e)) => warn!(error = %e, "proposal sweep failed"),
                Err(e) => error!(error = %e, "proposal sweep panicked"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn void_notice_is_recognised() {
        let line = format!(r#"{{"voided":"{}"}}"#, "ab".repeat(32));
        let notice: VoidNotice = serde_json::from_str(&line).unwrap();
        assert_eq!(notice.voided, TxId::new([0xab; 32]));
    }

    #[test]
    fn transaction_is_not_a_void_notice() {
        let line = format!(
            r#"{{"tx_id":"{}","timestamp":1,"version":1,"voided":"{}"}}"#,
            "ab".repeat(32),
            "cd".repeat(32)
        );
        assert!(serde_json::from_str::<VoidNotice>(&line).is_err());
    }
}
