//! callsync trace replay binary.
//!
//! # Usage
//!
//! ```bash
//! # Replay a capture with the default `call` command namespace
//! callsync-replay --trace capture.jsonl
//!
//! # Video-namespace capture, with per-notice output
//! callsync-replay --trace capture.jsonl --namespace video --log-level debug
//! ```

use std::{fs::File, io::BufReader, path::PathBuf};

use callsync_client::SessionConfig;
use callsync_replay::Replay;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Replay a signaling trace through a call session
#[derive(Parser, Debug)]
#[command(name = "callsync-replay")]
#[command(about = "Replay a JSON-lines signaling trace through a call session")]
#[command(version)]
struct Args {
    /// Path to the JSON-lines trace
    #[arg(short, long)]
    trace: PathBuf,

    /// Namespace for bare command verbs
    #[arg(short, long, default_value = "call")]
    namespace: String,

    /// Extra list-valued payload keys to convert element-wise
    #[arg(long = "convertible-key")]
    convertible_keys: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!(trace = %args.trace.display(), "replaying");

    let config = SessionConfig {
        command_namespace: args.namespace,
        extra_convertible_keys: args.convertible_keys,
        ..Default::default()
    };

    let reader = BufReader::new(File::open(&args.trace)?);
    let mut replay = Replay::new(config);
    let result = replay.run(reader).await;
    replay.log_summary();
    result?;

    Ok(())
}
