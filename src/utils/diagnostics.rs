//! Run diagnostics: one `RunReport` per finished run, persisted off the control path.
//!
//! The session publishes with a non-blocking `try_send` into a bounded channel;
//! a background thread drains it into an append-only CSV (header written once,
//! on the first write to a new file). A full channel drops the report rather
//! than stalling a control step.

use crossbeam::channel::{bounded, Sender, TrySendError};
use log::{error, info, warn};
use serde::Serialize;
use std::{
    fs::OpenOptions,
    path::PathBuf,
    thread,
};

use crate::control::tuner::{BestPoint, Phase, TrialOutcome};

const REPORT_CHANNEL_CAPACITY: usize = 256;

/// Flat CSV row describing one finished run and where the search went next.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run: u64,
    pub cost: f64,
    pub mean_speed: Option<f64>,
    pub outcome: &'static str,
    pub dimension: Option<usize>,
    pub best_cost: f64,
    pub best_kp: f64,
    pub best_ki: f64,
    pub best_kd: f64,
    pub best_step_kp: f64,
    pub best_step_ki: f64,
    pub best_step_kd: f64,
    pub next_kp: f64,
    pub next_ki: f64,
    pub next_kd: f64,
    pub phase: Phase,
}

impl RunReport {
    pub fn new(
        run: u64,
        outcome: &TrialOutcome,
        mean_speed: Option<f64>,
        best: &BestPoint,
        next: [f64; 3],
        phase: Phase,
    ) -> Self {
        Self {
            run,
            cost: outcome.cost(),
            mean_speed,
            outcome: outcome.label(),
            dimension: outcome.dimension(),
            best_cost: best.cost,
            best_kp: best.gains.kp,
            best_ki: best.gains.ki,
            best_kd: best.gains.kd,
            best_step_kp: best.steps[0],
            best_step_ki: best.steps[1],
            best_step_kd: best.steps[2],
            next_kp: next[0],
            next_ki: next[1],
            next_kd: next[2],
            phase,
        }
    }
}

/// Producer side of the diagnostics pipeline. Cheap to clone.
#[derive(Clone, Default)]
pub struct DiagnosticsSink {
    tx: Option<Sender<RunReport>>,
}

impl DiagnosticsSink {
    /// Sink that discards every report.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Spawns the CSV writer. The thread exits once every clone of the sink is dropped.
    pub fn spawn(path: PathBuf) -> (Self, thread::JoinHandle<()>) {
        let (tx, rx) = bounded::<RunReport>(REPORT_CHANNEL_CAPACITY);

        let handle = thread::spawn(move || {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    error!("[Diagnostics] Failed to create {:?}: {}", parent, e);
                    return;
                }
            }

            let file_exists = path.metadata().map(|m| m.len() > 0).unwrap_or(false);
            let file = match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(f) => f,
                Err(e) => {
                    error!("[Diagnostics] Failed to open {:?}: {}", path, e);
                    return;
                }
            };

            let mut writer = csv::WriterBuilder::new()
                .has_headers(!file_exists)
                .from_writer(file);

            let mut written = 0u64;
            while let Ok(report) = rx.recv() {
                if let Err(e) = writer.serialize(&report) {
                    error!("[Diagnostics] Failed to write run {}: {}", report.run, e);
                    continue;
                }
                if let Err(e) = writer.flush() {
                    error!("[Diagnostics] Failed to flush {:?}: {}", path, e);
                }
                written += 1;
            }

            info!("[Diagnostics] {} run reports written to {:?}", written, path);
        });

        (Self { tx: Some(tx) }, handle)
    }

    /// Non-blocking publish; dropped if the writer is behind or gone.
    /// Returns whether the report was queued.
    pub fn publish(&self, report: RunReport) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(report) {
            Ok(()) => true,
            Err(TrySendError::Full(report)) => {
                warn!("[Diagnostics] Writer behind, dropped report for run {}", report.run);
                false
            }
            Err(TrySendError::Disconnected(report)) => {
                warn!("[Diagnostics] Writer gone, dropped report for run {}", report.run);
                false
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::pid::Gains;

    fn report(run: u64) -> RunReport {
        let best = BestPoint {
            cost: 0.5,
            gains: Gains::new(0.15, 0.006, 4.0),
            steps: [0.01, 0.0005, 0.5],
        };
        RunReport::new(
            run,
            &TrialOutcome::ProbeDown { dimension: 2, cost: 0.75 },
            Some(42.0),
            &best,
            [0.15, 0.006, 3.0],
            Phase::Decreased,
        )
    }

    #[test]
    fn report_flattens_outcome() {
        let r = report(3);
        assert_eq!(r.outcome, "probe_down");
        assert_eq!(r.dimension, Some(2));
        assert_eq!(r.cost, 0.75);
        assert_eq!(r.best_kd, 4.0);
        assert_eq!(r.next_kd, 3.0);
    }

    #[test]
    fn writes_header_once_across_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("runs.csv");

        for run in 0..2 {
            let (sink, handle) = DiagnosticsSink::spawn(path.clone());
            sink.publish(report(run));
            drop(sink);
            handle.join().unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("run,cost,mean_speed,outcome,dimension,best_cost"));
        assert!(lines[1].starts_with("0,0.75,42.0,probe_down,2,0.5"));
        assert!(lines[2].ends_with(",decreased"));
    }

    #[test]
    fn disabled_sink_drops_reports() {
        let sink = DiagnosticsSink::disabled();
        assert!(!sink.is_enabled());
        assert!(!sink.publish(report(0)));
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (tx, rx) = bounded(1);
        let sink = DiagnosticsSink { tx: Some(tx) };

        assert!(sink.publish(report(1)));
        assert!(!sink.publish(report(2)));
        assert_eq!(rx.try_recv().map(|r| r.run), Ok(1));
        assert!(rx.try_recv().is_err());

        drop(rx);
        assert!(!sink.publish(report(3)));
    }
}
