//! Session server: boots a grocery store simulation from a JSON config
//! and streams snapshots as JSON lines, either to a single TCP observer
//! (which may send runtime commands back) or to stdout.
//!
//! Exit status is zero on a clean shutdown and non-zero when the
//! configuration fails to load or validate.

mod transport;

use std::net::TcpListener;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use store_analytics::export_run;
use store_core::scenario::SessionConfig;
use store_core::session::{command_channel, Session};
use store_core::telemetry::AnalyticsBundle;
use transport::{spawn_tcp_reader, JsonLinesSink};

#[derive(Debug, Parser)]
#[command(
    name = "store_server",
    about = "Runs a grocery store simulation session and streams snapshots"
)]
struct Args {
    /// Bind address for the TCP observer.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Listen on this port for one observer. Without a port, snapshots go
    /// to stdout and no commands are accepted.
    #[arg(long)]
    port: Option<u16>,
    /// Session configuration file (JSON). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write post-run analytics tables into this directory.
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<SessionConfig> {
    let Some(path) = path else {
        return Ok(SessionConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: SessionConfig =
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

fn serve(args: &Args, config: &SessionConfig) -> anyhow::Result<AnalyticsBundle> {
    let bundle = match args.port {
        Some(port) => {
            let listener = TcpListener::bind((args.host.as_str(), port))
                .with_context(|| format!("binding {}:{port}", args.host))?;
            tracing::info!(host = %args.host, port, "waiting for an observer");
            let (stream, peer) = listener
                .accept()
                .context("accepting observer connection")?;
            tracing::info!(%peer, "observer connected");

            let (sender, receiver) = command_channel();
            let reader = stream
                .try_clone()
                .context("cloning the observer stream for commands")?;
            spawn_tcp_reader(reader, sender);

            let mut session = Session::new(config)?;
            let mut sink = JsonLinesSink::new(stream);
            session.run(&receiver, &mut sink)
        }
        None => {
            let mut session = Session::new(config)?;
            let (_sender, receiver) = command_channel();
            let mut sink = JsonLinesSink::new(std::io::stdout());
            session.run(&receiver, &mut sink)
        }
    };
    Ok(bundle)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;
    config
        .validate()
        .context("invalid session configuration")?;

    let bundle = serve(&args, &config)?;

    if let Some(out_dir) = &args.out_dir {
        let summary = export_run(&bundle, out_dir).context("writing analytics")?;
        tracing::info!(
            completed = summary.completed,
            total = summary.total_shoppers,
            dir = %out_dir.display(),
            "analytics written"
        );
    }
    Ok(())
}
