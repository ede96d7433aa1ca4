//! windex daemon: entry point for running the wallet indexer.

mod full_node;
mod ingest;
mod notifier;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use windex_indexer::{init_logging, Indexer, IndexerConfig, LogFormat, VoidResult};
use windex_store_lmdb::LmdbEnvironment;
use windex_types::{Network, Timestamp, TokenId, TxId, WalletId};
use windex_utils::{format_amount, init_tracing};

use crate::full_node::HttpFullNode;
use crate::notifier::LogNotifier;

#[derive(Parser)]
#[command(name = "windex-daemon", about = "Wallet indexer for a UTXO ledger")]
struct Cli {
    /// Network addresses are derived for: "mainnet", "testnet" or "privatenet".
    /// When a config file is provided, defaults to the file's network value.
    #[arg(long, env = "WINDEX_NETWORK")]
    network: Option<String>,

    /// Data directory for the LMDB environment.
    #[arg(long, env = "WINDEX_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Base URL of the full node's HTTP API.
    #[arg(long, env = "WINDEX_FULL_NODE_URL")]
    full_node_url: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "WINDEX_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format for `run`: "human" or "json".
    #[arg(long, env = "WINDEX_LOG_FORMAT")]
    log_format: Option<String>,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Ingest newline-delimited JSON events and run the background sweeps.
    Run {
        /// Event file; reads stdin when absent.
        #[arg(long)]
        events: Option<PathBuf>,
    },
    /// Register a wallet and load its addresses.
    CreateWallet {
        #[arg(long)]
        xpubkey: String,
        #[arg(long)]
        auth_xpubkey: Option<String>,
        /// Address gap; defaults to the configured one.
        #[arg(long)]
        max_gap: Option<u16>,
    },
    /// Retry loading a wallet stuck in `Creating`.
    LoadWallet {
        #[arg(long)]
        wallet: String,
    },
    /// Print a wallet's balances.
    Balance {
        #[arg(long)]
        wallet: String,
        #[arg(long)]
        token: Option<String>,
    },
    /// Print a wallet's history, newest first.
    History {
        #[arg(long)]
        wallet: String,
        #[arg(long)]
        token: Option<String>,
        #[arg(long, default_value_t = 0)]
        skip: usize,
        #[arg(long, default_value_t = 20)]
        count: usize,
    },
    /// Print the wallet's unused addresses.
    NewAddresses {
        #[arg(long)]
        wallet: String,
    },
    /// Reverse a transaction the full node reports as voided.
    Void {
        #[arg(long)]
        tx: String,
    },
    /// Release expired time locks and stale proposals once.
    Sweep,
    /// Compare the indexed height with the full node's.
    Status,
}

fn parse_network(s: &str) -> anyhow::Result<Network> {
    match s.to_lowercase().as_str() {
        "mainnet" => Ok(Network::Mainnet),
        "testnet" => Ok(Network::Testnet),
        "privatenet" => Ok(Network::Privatenet),
        other => anyhow::bail!("unknown network '{other}'"),
    }
}

/// File settings (or defaults), overridden by CLI flags and env vars.
fn load_config(cli: &Cli) -> anyhow::Result<IndexerConfig> {
    let mut config = match &cli.config {
        Some(path) => IndexerConfig::from_toml_file(&path.to_string_lossy())
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => IndexerConfig::default(),
    };
    if let Some(network) = &cli.network {
        config.network = parse_network(network)?;
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(url) = &cli.full_node_url {
        config.full_node_url = url.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.log_format = format.clone();
    }
    Ok(config)
}

fn open_indexer(config: &IndexerConfig) -> anyhow::Result<Indexer<LmdbEnvironment>> {
    let env = LmdbEnvironment::open(&config.data_dir, 0, config.map_size)
        .with_context(|| format!("opening store at {}", config.data_dir.display()))?;
    let full_node = HttpFullNode::new(config.full_node_url.clone())?;
    Ok(Indexer::new(
        Arc::new(env),
        Arc::new(full_node),
        Arc::new(LogNotifier),
        config.clone(),
    ))
}

fn token_filter(token: Option<String>) -> Option<TokenId> {
    token.map(TokenId::new)
}

// The full node client is blocking, so the async runtime only exists for
// `run` and the indexer is dropped outside of it.
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    if matches!(cli.command, Command::Run { .. }) {
        let format: LogFormat = config.log_format.parse()?;
        init_logging(format, &config.log_level);
    } else {
        init_tracing();
    }

    let indexer = Arc::new(open_indexer(&config)?);
    let now = Timestamp::now();

    match cli.command {
        Command::Run { events } => {
            tracing::info!(
                "Starting windex on {} (data: {}, full node: {})",
                config.network.as_str(),
                config.data_dir.display(),
                config.full_node_url,
            );
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("building async runtime")?;
            runtime.block_on(ingest::run(indexer.clone(), events))?;
            drop(runtime);
            tracing::info!("windex daemon exited cleanly");
        }
        Command::CreateWallet {
            xpubkey,
            auth_xpubkey,
            max_gap,
        } => {
            let wallet = indexer.create_wallet(&xpubkey, auth_xpubkey.as_deref(), max_gap, now)?;
            let wallet = indexer.load_wallet(&wallet.id, now)?;
            println!("wallet {} is {:?}", wallet.id, wallet.status);
            for address in indexer.get_new_addresses(&wallet.id)? {
                println!("{:>6}  {}", address.index.unwrap_or_default(), address.address);
            }
        }
        Command::LoadWallet { wallet } => {
            let wallet = indexer.load_wallet(&WalletId::new(wallet), now)?;
            println!("wallet {} is {:?}", wallet.id, wallet.status);
        }
        Command::Balance { wallet, token } => {
            let token = token_filter(token);
            for (token, balance) in indexer.wallet_balances(&WalletId::new(wallet), token.as_ref(), now)? {
                println!(
                    "{token}  unlocked {}  locked {}  txs {}",
                    format_amount(balance.unlocked_amount),
                    format_amount(balance.locked_amount),
                    balance.transactions,
                );
            }
        }
        Command::History {
            wallet,
            token,
            skip,
            count,
        } => {
            let token = token_filter(token);
            for entry in indexer.wallet_history(&WalletId::new(wallet), token.as_ref(), skip, count)? {
                println!(
                    "{}  {}  {:>14}  {}{}",
                    entry.timestamp,
                    entry.tx_id,
                    format_amount(entry.balance),
                    entry.token_id,
                    if entry.voided { "  (voided)" } else { "" },
                );
            }
        }
        Command::NewAddresses { wallet } => {
            for address in indexer.get_new_addresses(&WalletId::new(wallet))? {
                println!("{:>6}  {}", address.index.unwrap_or_default(), address.address);
            }
        }
        Command::Void { tx } => {
            let tx_id = TxId::from_hex(&tx)?;
            match indexer.handle_voided(&tx_id)? {
                VoidResult::Voided => println!("voided {tx_id}"),
                VoidResult::AlreadyVoided => println!("{tx_id} was already voided"),
                VoidResult::Unknown => println!("{tx_id} is not indexed"),
            }
        }
        Command::Sweep => {
            let unlocked = indexer.sweep_time_locks(now)?;
            let cancelled = indexer.sweep_stale_proposals(now, config.proposal_ttl_secs)?;
            println!("unlocked {unlocked} utxos, cancelled {cancelled} proposals");
        }
        Command::Status => {
            let local = indexer.best_height()?;
            println!("indexed height {local}");
            match indexer.full_node_height() {
                Ok(remote) => println!("full node height {remote} ({} behind)", remote.saturating_sub(local)),
                Err(e) => println!("full node unreachable: {e}"),
            }
        }
    }

    Ok(())
}
