//! Offline plant for tuning without the external simulator.
//!
//! `train` plays the role of the transport: it feeds the session one telemetry
//! sample per frame, applies the returned command to the vehicle, and restarts
//! the vehicle whenever the session closes a run.

pub mod vehicle;

use log::{error, info};
use serde::Serialize;

use crate::control::pid::Gains;
use crate::driver::session::{Reply, Session};
use vehicle::Vehicle;

/// Where an offline training session ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrainingSummary {
    pub runs: u64,
    pub frames: u64,
    pub best_cost: Option<f64>,
    pub best_gains: Option<Gains>,
    /// Whether the improvement tolerance ended training before `max_runs`.
    pub converged: bool,
}

/// Drives `session` against `vehicle` until `max_runs` runs have been scored,
/// or until a run lowers the best cost by less than `tolerance`.
///
/// Without a tuner in the session there are no run boundaries; the loop then
/// stops after `max_frames`.
pub fn train(
    session: &mut Session,
    vehicle: &mut Vehicle,
    max_runs: u64,
    max_frames: u64,
    tolerance: Option<f64>,
) -> TrainingSummary {
    let mut frames = 0u64;
    let mut converged = false;

    while session.runs() < max_runs && frames < max_frames {
        let telemetry = vehicle.telemetry();
        frames += 1;
        let best_before = best_cost(session);

        match session.on_telemetry(&telemetry) {
            Ok(Reply::Command(command)) => vehicle.step(&command),
            Ok(Reply::Reset) => {
                vehicle.reset();
                // only a run that lowered a finite best cost is judged; failed probes say nothing
                let delta = best_before - best_cost(session);
                if let Some(tol) = tolerance {
                    if delta.is_finite() && delta > 0.0 && delta < tol {
                        info!("[Train] improvement {delta:.3e} below tolerance {tol:.3e}, stopping");
                        converged = true;
                        break;
                    }
                }
            }
            Err(e) => {
                error!("[Train] {e}; repeating the trial");
                session.restart_run();
                vehicle.reset();
            }
        }
    }

    let best = session.tuner().and_then(|t| t.best());
    TrainingSummary {
        runs: session.runs(),
        frames,
        best_cost: best.map(|b| b.cost),
        best_gains: best.map(|b| b.gains),
        converged,
    }
}

fn best_cost(session: &Session) -> f64 {
    session.tuner().map_or(f64::INFINITY, |t| t.best_cost())
}
