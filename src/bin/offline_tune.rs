//! Offline tuning against the built-in kinematic vehicle (offline_tune binary).
//!
//! Same session, same tuner, same cost as the websocket server, but the
//! telemetry comes from `sim::vehicle` instead of the external simulator, so a
//! tuning sweep runs in seconds and is reproducible from its seed.
//!
//! Prints a JSON summary (best cost, best gains, runs, frames) on stdout.

use anyhow::Context;
use clap::Parser;
use log::info;

use pid_twiddle::{
    cli::CommonArgs,
    control::tuner::TuningConfig,
    driver::session::Session,
    sim::{
        train,
        vehicle::{Vehicle, VehicleConfig},
    },
    utils::diagnostics::DiagnosticsSink,
};

#[derive(Debug, Parser)]
#[command(version, about = "Tune the steering PID offline against a simulated vehicle")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Stop after this many scored runs.
    #[arg(long, default_value_t = 50)]
    runs: u64,

    /// Hard cap on telemetry frames across all runs.
    #[arg(long, default_value_t = 10_000_000)]
    max_frames: u64,

    /// Stop once a run lowers the best cost by less than this.
    #[arg(long)]
    tolerance: Option<f64>,

    /// Uniform cte noise half-width, metres.
    #[arg(long, default_value_t = 0.0)]
    cte_noise: f64,

    /// Noise seed.
    #[arg(long, default_value_t = 7)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    info!("=== OFFLINE TUNING START ===");

    let args = Args::parse();
    let mut config = args.common.load_config().context("invalid configuration")?;
    // offline runs exist to tune
    config.tuning.get_or_insert_with(TuningConfig::default);

    let (diagnostics, writer) = match &config.diagnostics.path {
        Some(path) => {
            let (sink, handle) = DiagnosticsSink::spawn(path.clone());
            (sink, Some(handle))
        }
        None => (DiagnosticsSink::disabled(), None),
    };

    let mut session = Session::new(&config, diagnostics).context("invalid configuration")?;
    let mut vehicle = Vehicle::new(VehicleConfig {
        cte_noise: args.cte_noise,
        seed: args.seed,
        ..Default::default()
    });

    let summary = train(&mut session, &mut vehicle, args.runs, args.max_frames, args.tolerance);

    // dropping the session closes the diagnostics channel so the writer can finish
    drop(session);
    if let Some(handle) = writer {
        if handle.join().is_err() {
            log::error!("[Main] Diagnostics writer panicked");
        }
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    info!("=== OFFLINE TUNING FINISHED ===");
    Ok(())
}
