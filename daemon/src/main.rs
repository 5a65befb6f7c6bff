//! Vote party daemon — entry point for running the tally from the command line.

mod host;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use voteparty_engine::{
    init_logging, AdminAck, Collaborators, ConfigHandle, IngestionQueue, LogFormat,
    ShutdownController, VotePartyConfig, VotePartyService,
};
use voteparty_store_lmdb::LmdbTallyStore;
use voteparty_types::{SystemClock, VoteNotification};

use crate::host::{ConsoleExecutor, StaticAudience};

/// How often `run` checks the config file for changes.
const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "voteparty-daemon", about = "Persistent vote tally with vote party rewards")]
struct Cli {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(long, env = "VOTEPARTY_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for the tally database. Overrides the config file.
    #[arg(long, env = "VOTEPARTY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "VOTEPARTY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "VOTEPARTY_LOG_FORMAT")]
    log_format: Option<String>,

    /// Recipients considered online (comma-separated).
    #[arg(long, env = "VOTEPARTY_ONLINE", value_delimiter = ',')]
    online: Vec<String>,

    /// Execute reward commands through `sh -c` instead of printing them.
    #[arg(long)]
    shell: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Read subject ids from stdin, one vote per line, until EOF or a signal.
    ///
    /// Lines starting with '/' are admin commands: /status, /reset, /reload,
    /// /query <identifier>, /quit.
    Run {
        /// Pending notifications held before stdin reads block.
        #[arg(long, default_value_t = 256)]
        queue_capacity: usize,
    },
    /// Record one vote for each subject, in order.
    Vote {
        #[arg(required = true)]
        subjects: Vec<String>,
    },
    /// Print the current count, threshold and remaining votes.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Answer a stat query: current_votes, total_votes_needed or votes_remaining.
    Query { identifier: String },
    /// Reset the vote count to zero.
    Reset,
    /// Write a default configuration file to the --config path, or stdout.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Command::InitConfig { force } = cli.command {
        return init_config(cli.config, force);
    }

    let config = load_config(&cli)?;
    let snapshot = config.snapshot();
    let format: LogFormat = cli
        .log_format
        .as_deref()
        .unwrap_or(&snapshot.log_format)
        .parse()
        .map_err(anyhow::Error::msg)?;
    init_logging(format, cli.log_level.as_deref().unwrap_or(&snapshot.log_level));

    let service = VotePartyService::start(
        Arc::clone(&config),
        Collaborators {
            store: Arc::new(LmdbTallyStore::new()),
            console: Arc::new(ConsoleExecutor::new(cli.shell)),
            audience: Arc::new(StaticAudience::new(cli.online)),
            clock: Arc::new(SystemClock),
        },
    )
    .with_context(|| format!("failed to open tally at {}", snapshot.data_dir.display()))?;
    let service = Arc::new(service);

    let result = match cli.command {
        Command::Run { queue_capacity } => run(Arc::clone(&service), queue_capacity).await,
        Command::Vote { subjects } => vote(&service, &subjects),
        Command::Status { json } => print_status(&service, json),
        Command::Query { identifier } => query(&service, &identifier),
        Command::Reset => report(service.reset()),
        Command::InitConfig { .. } => Ok(()),
    };

    service.shutdown();
    result
}

fn load_config(cli: &Cli) -> anyhow::Result<Arc<ConfigHandle>> {
    let handle = match &cli.config {
        Some(path) => ConfigHandle::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ConfigHandle::new(VotePartyConfig::default()),
    };

    let handle = match cli.data_dir.clone() {
        Some(data_dir) => handle.with_overrides(move |config| config.data_dir = data_dir.clone()),
        None => handle,
    };

    Ok(Arc::new(handle))
}

fn init_config(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let rendered = VotePartyConfig::default().to_toml_string()?;
    match path {
        Some(path) => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            std::fs::write(&path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {}", path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

async fn run(service: Arc<VotePartyService>, queue_capacity: usize) -> anyhow::Result<()> {
    let shutdown = Arc::new(ShutdownController::new());
    let (queue, worker) = IngestionQueue::spawn(
        Arc::clone(service.ingestion()),
        queue_capacity,
        shutdown.subscribe(),
    );

    let signals = {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move { shutdown.wait_for_signal().await })
    };

    let config_watch = service.config().source().map(|path| {
        tracing::info!(path = %path.display(), "watching config file for changes");
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CONFIG_POLL_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Some(ack) = service.reload_if_stale() {
                    print_ack(&ack);
                }
            }
        })
    });

    tracing::info!(queue_capacity, "reading vote notifications from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stop = shutdown.subscribe();
    loop {
        let line = tokio::select! {
            _ = stop.recv() => break,
            line = lines.next_line() => line.context("failed to read stdin")?,
        };
        let Some(line) = line else { break };
        let line = line.trim();

        match line.split_once(' ').unwrap_or((line, "")) {
            ("", _) => continue,
            ("/quit", _) => break,
            ("/status", _) => print_status(&service, false)?,
            ("/reset", _) => print_ack(&service.reset()),
            ("/reload", _) => print_ack(&service.reload()),
            ("/query", identifier) => {
                if let Err(e) = query(&service, identifier.trim()) {
                    eprintln!("{e}");
                }
            }
            (command, _) if command.starts_with('/') => eprintln!("unknown command '{command}'"),
            _ => {
                if queue
                    .submit(VoteNotification::received_now(line))
                    .await
                    .is_err()
                {
                    tracing::warn!("ingestion queue closed, stopping");
                    break;
                }
            }
        }
    }

    shutdown.shutdown();
    drop(queue);
    let processed = worker.await.context("ingestion worker failed")?;
    signals.abort();
    if let Some(watch) = config_watch {
        watch.abort();
    }

    tracing::info!(processed, "daemon stopped");
    Ok(())
}

fn vote(service: &VotePartyService, subjects: &[String]) -> anyhow::Result<()> {
    for subject in subjects {
        match service.ingest(&VoteNotification::received_now(subject.as_str()))? {
            Some(outcome) if outcome.party_triggered => {
                println!("{}: vote party! ({} votes)", outcome.subject_id, outcome.reached)
            }
            Some(outcome) => println!(
                "{}: {}/{}",
                outcome.subject_id,
                outcome.count_after(),
                outcome.threshold
            ),
            None => eprintln!("ignored vote for '{subject}'"),
        }
    }
    Ok(())
}

fn print_status(service: &VotePartyService, json: bool) -> anyhow::Result<()> {
    let status = service.status();
    if json {
        let mut out = std::io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, &status)?;
        writeln!(out)?;
    } else {
        println!(
            "votes: {}/{} ({} remaining), parties: {}",
            status.current, status.needed, status.remaining, status.counters.parties_triggered
        );
    }
    Ok(())
}

fn query(service: &VotePartyService, identifier: &str) -> anyhow::Result<()> {
    match service.stats_cache().query(identifier) {
        Some(value) => {
            println!("{value}");
            Ok(())
        }
        None => bail!("unknown stat '{identifier}'"),
    }
}

fn print_ack(ack: &AdminAck) {
    if ack.success {
        println!("{}", ack.message);
    } else {
        eprintln!("{}", ack.message);
    }
}

fn report(ack: AdminAck) -> anyhow::Result<()> {
    print_ack(&ack);
    if !ack.success {
        bail!("command failed");
    }
    Ok(())
}
