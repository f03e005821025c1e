//! chainvote daemon: runs the Store service or drives a vote from a wallet.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chainvote_ledger::{HttpLedger, LedgerClient, LedgerClientConfig};
use chainvote_node::{init_logging, NodeConfig, StoreNode};
use chainvote_types::{CandidateId, ElectionId, SystemClock, VerifyStatus};
use chainvote_wallet::{
    FileJournal, LocalSigner, OrchestratorConfig, Session, StoreClient, VoteAttempt,
    VoteOrchestrator,
};
use clap::Parser;

#[derive(Parser)]
#[command(name = "chainvote", about = "Vote submission and verification pipeline")]
struct Cli {
    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the Store service.
    Serve(ServeArgs),

    /// Create a new encrypted wallet keystore.
    Keygen {
        /// Where to write the keystore JSON.
        #[arg(long)]
        out: PathBuf,

        /// Keystore password.
        #[arg(long, env = "CHAINVOTE_KEY_PASSWORD")]
        password: String,
    },

    /// Cast a vote and follow it until the Store has recorded it.
    Vote {
        #[command(flatten)]
        wallet: WalletArgs,

        /// Election to vote in.
        #[arg(long)]
        election: u64,

        /// Candidate to vote for.
        #[arg(long)]
        candidate: u64,
    },

    /// Resume attempts left in the journal by an earlier run.
    Resume {
        #[command(flatten)]
        wallet: WalletArgs,
    },

    /// Show the Store's view of a vote and the current results.
    Status {
        /// Store API base URL.
        #[arg(long, default_value = "http://127.0.0.1:7080", env = "CHAINVOTE_STORE_URL")]
        store_url: String,

        /// Session token.
        #[arg(long, env = "CHAINVOTE_TOKEN")]
        token: String,

        /// Election to inspect; all elections when omitted.
        #[arg(long)]
        election: Option<u64>,
    },
}

#[derive(clap::Args)]
struct ServeArgs {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "CHAINVOTE_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP API port.
    #[arg(long, env = "CHAINVOTE_PORT")]
    port: Option<u16>,

    /// Data directory for LMDB storage.
    #[arg(long, env = "CHAINVOTE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Ledger JSON-RPC endpoint.
    #[arg(long, env = "CHAINVOTE_LEDGER_URL")]
    ledger_url: Option<String>,

    /// Blocks before a vote counts as final.
    #[arg(long, env = "CHAINVOTE_MIN_CONFIRMATIONS")]
    min_confirmations: Option<u64>,

    /// Elections to mirror from the ledger on startup (comma-separated ids).
    #[arg(long, env = "CHAINVOTE_WATCH_ELECTIONS", value_delimiter = ',')]
    watch: Vec<u64>,

    /// Log format: "human" or "json".
    #[arg(long, env = "CHAINVOTE_LOG_FORMAT")]
    log_format: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "CHAINVOTE_LOG_LEVEL")]
    log_level: Option<String>,
}

#[derive(clap::Args)]
struct WalletArgs {
    /// Store API base URL.
    #[arg(long, default_value = "http://127.0.0.1:7080", env = "CHAINVOTE_STORE_URL")]
    store_url: String,

    /// Session token.
    #[arg(long, env = "CHAINVOTE_TOKEN")]
    token: String,

    /// Ledger JSON-RPC endpoint.
    #[arg(long, default_value = "http://127.0.0.1:8545", env = "CHAINVOTE_LEDGER_URL")]
    ledger_url: String,

    /// Blocks before a vote counts as final.
    #[arg(long, default_value_t = 2, env = "CHAINVOTE_MIN_CONFIRMATIONS")]
    min_confirmations: u64,

    /// Encrypted keystore file.
    #[arg(long, env = "CHAINVOTE_KEYSTORE")]
    keystore: PathBuf,

    /// Keystore password.
    #[arg(long, env = "CHAINVOTE_KEY_PASSWORD")]
    password: String,

    /// Directory of the attempt journal.
    #[arg(long, default_value = "./chainvote_wallet", env = "CHAINVOTE_JOURNAL_DIR")]
    journal_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Keygen { out, password } => {
            chainvote_utils::init_tracing();
            let signer = LocalSigner::generate()?;
            let keystore = signer.export_keystore(&password)?;
            chainvote_wallet::save_keystore(&keystore, &out)?;
            println!("{} written to {}", signer.address(), out.display());
            Ok(())
        }
        Command::Vote {
            wallet,
            election,
            candidate,
        } => {
            chainvote_utils::init_tracing();
            let ctx = WalletContext::open(&wallet).await?;
            let election = ctx
                .client
                .election(ElectionId(election))
                .await
                .context("loading election")?;
            let attempt = ctx
                .orchestrator
                .begin_vote(&ctx.session, &election, CandidateId(candidate))
                .await?;
            follow(attempt).await
        }
        Command::Resume { wallet } => {
            chainvote_utils::init_tracing();
            let ctx = WalletContext::open(&wallet).await?;
            let attempts = ctx.orchestrator.resume_pending(&ctx.session)?;
            if attempts.is_empty() {
                println!("nothing to resume");
            }
            for attempt in attempts {
                if let Err(e) = follow(attempt).await {
                    eprintln!("{e:#}");
                }
            }
            Ok(())
        }
        Command::Status {
            store_url,
            token,
            election,
        } => {
            chainvote_utils::init_tracing();
            let client = StoreClient::new(store_url, token);
            if let Some(id) = election {
                let status = client.vote_status(ElectionId(id)).await?;
                match status.record {
                    Some(record) => println!(
                        "election {id}: voted for candidate {} in tx {} (block {})",
                        record.candidate_id.as_u64(),
                        record.transaction_hash,
                        record.block_number
                    ),
                    None => println!("election {id}: not voted"),
                }
            }
            for results in client.results(election.map(ElectionId)).await? {
                println!(
                    "{} [{}] {} votes{}",
                    results.election_id,
                    results.title,
                    results.total_votes,
                    if results.closed { ", closed" } else { "" }
                );
                for candidate in results.candidates {
                    println!("  {:>6}  {}", candidate.vote_count, candidate.name);
                }
            }
            Ok(())
        }
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let base = match &args.config {
        Some(path) => {
            let path = path.to_string_lossy();
            NodeConfig::from_toml_file(&path).with_context(|| format!("loading {path}"))?
        }
        None => NodeConfig::default(),
    };

    let config = NodeConfig {
        port: args.port.unwrap_or(base.port),
        data_dir: args.data_dir.unwrap_or_else(|| base.data_dir.clone()),
        ledger_rpc_url: args
            .ledger_url
            .unwrap_or_else(|| base.ledger_rpc_url.clone()),
        min_confirmations: args.min_confirmations.unwrap_or(base.min_confirmations),
        watch_elections: if args.watch.is_empty() {
            base.watch_elections.clone()
        } else {
            args.watch
        },
        log_format: args
            .log_format
            .unwrap_or_else(|| base.log_format.clone()),
        log_level: args.log_level.unwrap_or_else(|| base.log_level.clone()),
        ..base
    };
    config.validate()?;

    init_logging(config.log_format()?, &config.log_level);
    tracing::info!(
        port = config.port,
        data_dir = %config.data_dir.display(),
        ledger = %config.ledger_rpc_url,
        "starting chainvote store node"
    );

    let mut node = StoreNode::new(config)?;
    node.start().await?;

    tracing::info!("shutdown signal received, stopping node");
    node.stop().await?;

    tracing::info!("chainvote daemon exited cleanly");
    Ok(())
}

/// A wallet session against one Store and one ledger endpoint.
struct WalletContext {
    client: Arc<StoreClient>,
    orchestrator: Arc<VoteOrchestrator>,
    session: Session,
}

impl WalletContext {
    async fn open(args: &WalletArgs) -> anyhow::Result<Self> {
        let client = Arc::new(StoreClient::new(args.store_url.clone(), args.token.clone()));
        let user = client.me().await.context("resolving session")?;
        let history = client.vote_history().await.context("loading vote history")?;
        let session = Session::new(user, args.token.clone())
            .with_voted(history.iter().map(|record| record.election_id));

        let signer = LocalSigner::from_keystore(&args.keystore, &args.password)
            .context("unlocking keystore")?;
        let ledger = LedgerClient::new(
            Arc::new(HttpLedger::new(args.ledger_url.clone())),
            LedgerClientConfig {
                min_confirmations: args.min_confirmations,
                ..LedgerClientConfig::default()
            },
        );
        let journal = FileJournal::open(args.journal_dir.clone())?;

        let orchestrator = VoteOrchestrator::new(
            ledger,
            Arc::new(signer),
            client.clone(),
            Arc::new(journal),
            Arc::new(SystemClock),
            OrchestratorConfig::default(),
        );

        Ok(Self {
            client,
            orchestrator,
            session,
        })
    }
}

/// Print every state change of `attempt` until it settles.
async fn follow(mut attempt: VoteAttempt) -> anyhow::Result<()> {
    let election = attempt.key().election;
    let mut states = attempt.subscribe();
    loop {
        let state = states.borrow_and_update().clone();
        match state.tx_hash() {
            Some(hash) => println!("election {election}: {} ({hash})", state.name()),
            None => println!("election {election}: {}", state.name()),
        }
        if state.is_settled() || states.changed().await.is_err() {
            break;
        }
    }

    match attempt.outcome().await? {
        VerifyStatus::Recorded => println!("election {election}: vote recorded"),
        VerifyStatus::Duplicate => println!("election {election}: vote was already recorded"),
    }
    Ok(())
}
