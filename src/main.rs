//! # PID Twiddle Entry Point
//!
//! Serves the driving simulator over a websocket on port 4567 (by default).
//! Every telemetry frame yields one steering/throttle command; in training
//! mode the steering gains are retuned after every run and the simulator is
//! told to restart the episode.
//!
//! ## Usage
//! - `pid_twiddle`: drive with the default gains.
//! - `pid_twiddle 0.15 0.006 4.0`: drive with the given gains.
//! - `pid_twiddle 0.15 0.006 4.0 0.01 0.0005 0.5`: tune from those gains and step sizes.
//! - `pid_twiddle --config tune.toml --diagnostics data/runs.csv`
//!
//! Logging via `RUST_LOG` (e.g. `RUST_LOG=info`).

use anyhow::Context;
use clap::Parser;
use log::info;
use parking_lot::Mutex;
use std::sync::Arc;

use pid_twiddle::{
    cli::CommonArgs,
    driver::session::Session,
    transport::server::serve,
    utils::diagnostics::DiagnosticsSink,
};

#[derive(Debug, Parser)]
#[command(version, about = "PID steering controller with twiddle tuning for the driving simulator")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Address to bind, overrides the config file.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overrides the config file.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    info!("=== PID TWIDDLE START ===");

    let args = Args::parse();
    let mut config = args.common.load_config().context("invalid configuration")?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let diagnostics = match &config.diagnostics.path {
        Some(path) => {
            info!("[Main] Run diagnostics -> {:?}", path);
            // writer flushes every row; the handle is not joined because open
            // websocket tasks may outlive the server future
            DiagnosticsSink::spawn(path.clone()).0
        }
        None => DiagnosticsSink::disabled(),
    };

    let session = Session::new(&config, diagnostics).context("invalid configuration")?;
    let session = Arc::new(Mutex::new(session));

    serve(&config.bind_address(), session.clone())
        .await
        .with_context(|| format!("websocket server on {} failed", config.bind_address()))?;

    let guard = session.lock();
    if let Some(best) = guard.tuner().and_then(|t| t.best()) {
        info!(
            "[Main] Best after {} runs: cost={:.6} gains={:?} steps={:?}",
            guard.runs(),
            best.cost,
            best.gains.to_array(),
            best.steps
        );
    }

    info!("=== PID TWIDDLE FINISHED ===");
    Ok(())
}
