use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use replaykit::capture::{KeyCaptureAggregator, KeyDirection, KeyHook};
use replaykit::executor::SequenceLibrary;
use replaykit::model::{self, SequenceFile};

/// Replaykit CLI
#[derive(Debug, Parser)]
#[command(
    name = replaykit::PKG_NAME,
    version = replaykit::PKG_VERSION,
    about = "Record and replay desktop input sequences"
)]
struct Args {
    /// Set log level (e.g., trace, debug, info, warn, error). Overrides RUST_LOG.
    #[arg(long = "log-level")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay a sequence from a JSON file
    Run {
        /// Path to the JSON sequence file
        file: PathBuf,

        /// Sequence to run (defaults to the first sequence in the file)
        #[arg(short, long)]
        sequence: Option<String>,

        /// Enable dry-run mode (log actions instead of simulating input)
        #[arg(long = "dry-run")]
        dry_run: bool,
    },

    /// Record keyboard input into a new sequence file; Escape stops
    Record {
        /// Output path for the recorded JSON file
        output: PathBuf,

        /// Name to store the recorded sequence under
        #[arg(long, default_value = "recorded")]
        name: String,

        /// Quiet interval that closes a text run, in milliseconds
        #[arg(long = "quiet-ms", default_value_t = 800)]
        quiet_ms: u64,
    },

    /// Print the JSON Schema for the sequence file format and exit
    Schema,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Honor --log-level by initializing tracing before anything else logs.
    if let Some(level) = &args.log_level {
        let level = match level.to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "info" => tracing::Level::INFO,
            "warn" | "warning" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => tracing::Level::INFO,
        };
        let _ = tracing_subscriber::fmt().with_max_level(level).try_init();
    }
    if args.log_level.is_none() {
        replaykit::init_tracing();
    }

    match args.command {
        Command::Run {
            file,
            sequence,
            dry_run,
        } => run(file, sequence, dry_run).await,
        Command::Record {
            output,
            name,
            quiet_ms,
        } => record(output, name, quiet_ms).await,
        Command::Schema => {
            let schema = model::generate_schema();
            let json = serde_json::to_string_pretty(&schema)?;
            println!("{json}");
            Ok(())
        }
    }
}

async fn run(file: PathBuf, sequence: Option<String>, dry_run: bool) -> anyhow::Result<()> {
    let loaded = model::load_from_path_async(&file).await?;
    let name = match sequence.or_else(|| loaded.first_sequence_name().map(str::to_string)) {
        Some(name) => name,
        None => anyhow::bail!("Sequence file contains no sequences"),
    };

    info!(
        version = replaykit::PKG_VERSION,
        file = %file.display(),
        sequence = %name,
        dry_run,
        "Starting replay"
    );

    // The engine runs blocking on a worker; Ctrl+C flips the shared token
    // and the engine notices at its next cancellation check.
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, cancelling");
            signal_token.cancel();
        }
    });

    let worker_name = name.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut library = SequenceLibrary::new(loaded, dry_run, cancel);
        library.run(&worker_name, &BTreeMap::new())
    })
    .await?;

    match result {
        Ok(()) => {
            info!("Replay finished");
            Ok(())
        }
        Err(err) if err.is_cancelled() => {
            warn!("Replay cancelled");
            Ok(())
        }
        Err(err) => Err(anyhow::Error::new(err).context(format!("Sequence '{name}' failed"))),
    }
}

async fn record(output: PathBuf, name: String, quiet_ms: u64) -> anyhow::Result<()> {
    info!("Recording keyboard input; press Escape to stop");

    let actions = tokio::task::spawn_blocking(move || {
        let hook = KeyHook::spawn();
        hook.start();
        let mut aggregator =
            KeyCaptureAggregator::new(Duration::from_millis(quiet_ms), Instant::now());
        let mut actions = Vec::new();

        loop {
            match hook.rx.recv_timeout(Duration::from_millis(50)) {
                Ok(event) => {
                    if event.key == rdev::Key::Escape && event.direction == KeyDirection::Down {
                        break;
                    }
                    actions.extend(aggregator.handle(event));
                }
                Err(RecvTimeoutError::Timeout) => {
                    actions.extend(aggregator.poll_timeout(Instant::now()));
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        hook.stop();
        actions.extend(aggregator.finish());
        actions
    })
    .await?;

    info!(actions = actions.len(), "Recording stopped");
    let mut file = SequenceFile::default();
    file.sequences.insert(name, actions);
    model::save_to_path(&file, &output)?;
    info!(output = %output.display(), "Recording saved");
    Ok(())
}
