use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use txnstatus::{PeerRegistry, StatusConfig, StatusNode, Transaction, TransactionName};

#[derive(Parser, Debug)]
#[command(about = "Inspect and write transaction status records")]
struct Args {
    /// JSON node configuration; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the commit record of a local transaction.
    Commit {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        commit_ts: u64,
        /// Names of every local piece; defaults to the transaction itself.
        #[arg(long = "participant")]
        participants: Vec<String>,
    },
    /// Report whether a commit record exists for NAME.
    Committed { name: String },
    /// Print the commit record stored for NAME.
    Show { name: String },
    /// Resolve whether a row written by TID on HOST is visible to a reader.
    Check {
        #[arg(long)]
        host: String,
        #[arg(long)]
        tid: u64,
        #[arg(long)]
        reader: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => StatusConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => StatusConfig::default(),
    };
    info!("opening status node with config {:?}", config);

    let node = StatusNode::open(config, Arc::new(PeerRegistry::new())).await?;

    match args.command {
        Command::Commit {
            id,
            commit_ts,
            participants,
        } => {
            let mut txn = Transaction::new(node.host_and_port(), id);
            txn.mark_committed(commit_ts)?;
            let participants = if participants.is_empty() {
                vec![txn.name()]
            } else {
                participants
                    .iter()
                    .map(|raw| parse_name(raw))
                    .collect::<Result<Vec<_>>>()?
            };
            node.commit(&mut txn, &participants).await?;
            println!("{}", txn.name());
        }
        Command::Committed { name } => {
            let name = parse_name(&name)?;
            println!("{}", node.validate_local(&name).await?);
        }
        Command::Show { name } => {
            let name = parse_name(&name)?;
            match node.table().record(&name).await? {
                Some(record) => {
                    let participants: Vec<String> =
                        record.participants.iter().map(|p| p.to_string()).collect();
                    println!("commit_ts: {}", record.commit_timestamp);
                    println!("participants: {}", participants.join(", "));
                }
                None => println!("no commit record for {name}"),
            }
        }
        Command::Check { host, tid, reader } => {
            let reader = Transaction::new(node.host_and_port(), reader);
            let resolution = node.resolve(&host, tid).await?;
            println!(
                "{:?} (visible: {})",
                resolution,
                resolution.visible_to(&reader)
            );
        }
    }

    Ok(())
}

fn parse_name(raw: &str) -> Result<TransactionName> {
    raw.parse()
        .with_context(|| format!("invalid transaction name `{raw}`"))
}

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
