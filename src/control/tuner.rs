//! tuner.rs
//! Coordinate-descent ("twiddle") search over a controller's gain triple.
//!
//! One `advance` per finished run. Each dimension is probed upward, then
//! downward if the upward probe did not beat the best cost, then left at its
//! starting value with a contracted step if both probes failed. Every decision
//! ends by moving to the next dimension and probing it upward, so the search
//! never stalls. Successful steps grow by `STEP_GROWTH`, doubly failed ones
//! shrink by `STEP_SHRINK`.
//!
//! The tuner never owns the controller: the owner hands it in on every call,
//! which keeps the pair a single unit under whatever lock guards the owner.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::control::pid::{Gains, PidController};
use crate::error::{ConfigError, ControlError};

pub const STEP_GROWTH: f64 = 1.1;
pub const STEP_SHRINK: f64 = 0.9;
pub const DIMENSIONS: usize = 3;

/// Initial step sizes and run length of a tuning session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    pub steps: [f64; DIMENSIONS],
    pub run_length: usize,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            steps: [0.01, 0.0005, 0.5],
            run_length: 1000,
        }
    }
}

impl TuningConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run_length == 0 {
            return Err(ConfigError::ZeroRunLength);
        }
        for (index, &value) in self.steps.iter().enumerate() {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidStepSize { index, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No run has been scored yet.
    Initial,
    /// The active dimension was just probed upward.
    Increased,
    /// The active dimension was just probed downward.
    Decreased,
}

/// What one `advance` decided, for the driver's log and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrialOutcome {
    /// First scored run became the baseline.
    Baseline { cost: f64 },
    /// The probe on `dimension` beat the best cost.
    Improved { dimension: usize, cost: f64 },
    /// Upward probe failed; `dimension` is now probed downward.
    ProbeDown { dimension: usize, cost: f64 },
    /// Both probes failed; `dimension` was restored and its step contracted.
    Contracted { dimension: usize, cost: f64 },
}

impl TrialOutcome {
    pub fn cost(&self) -> f64 {
        match *self {
            TrialOutcome::Baseline { cost }
            | TrialOutcome::Improved { cost, .. }
            | TrialOutcome::ProbeDown { cost, .. }
            | TrialOutcome::Contracted { cost, .. } => cost,
        }
    }

    /// Probed dimension, `None` for the baseline.
    pub fn dimension(&self) -> Option<usize> {
        match *self {
            TrialOutcome::Baseline { .. } => None,
            TrialOutcome::Improved { dimension, .. }
            | TrialOutcome::ProbeDown { dimension, .. }
            | TrialOutcome::Contracted { dimension, .. } => Some(dimension),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrialOutcome::Baseline { .. } => "baseline",
            TrialOutcome::Improved { .. } => "improved",
            TrialOutcome::ProbeDown { .. } => "probe_down",
            TrialOutcome::Contracted { .. } => "contracted",
        }
    }
}

/// Best point found so far.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BestPoint {
    pub cost: f64,
    pub gains: Gains,
    pub steps: [f64; DIMENSIONS],
}

#[derive(Debug, Clone)]
pub struct Tuner {
    candidate: [f64; DIMENSIONS],
    steps: [f64; DIMENSIONS],
    best: Option<BestPoint>,
    previous_best_cost: Option<f64>,
    active_dimension: usize,
    phase: Phase,
    run_length: usize,
    trials: u64,
}

impl Tuner {
    /// Validates `config`, then writes the controller's current gains and the
    /// run length back into it so the first run starts clean.
    pub fn bind(config: TuningConfig, controller: &mut PidController) -> Result<Self, ConfigError> {
        config.validate()?;
        let gains = controller.gains();
        gains.validate()?;

        let tuner = Self {
            candidate: gains.to_array(),
            steps: config.steps,
            best: None,
            previous_best_cost: None,
            active_dimension: 0,
            phase: Phase::Initial,
            run_length: config.run_length,
            trials: 0,
        };
        tuner.apply(controller);

        info!(
            "[Tuner] bound: gains={:?} steps={:?} run_length={}",
            gains.to_array(),
            tuner.steps,
            tuner.run_length
        );
        Ok(tuner)
    }

    /// Scores the finished run and moves the controller to the next candidate.
    ///
    /// A degenerate run is returned as an error before anything changes.
    pub fn advance(&mut self, controller: &mut PidController) -> Result<TrialOutcome, ControlError> {
        let cost = controller.mean_cost()?;
        let a = self.active_dimension;

        let outcome = match self.phase {
            Phase::Initial => {
                self.record_best(cost);
                self.active_dimension = 0;
                self.probe_up();
                self.phase = Phase::Increased;
                TrialOutcome::Baseline { cost }
            }
            Phase::Increased | Phase::Decreased if self.beats_best(cost) => {
                self.record_best(cost);
                self.steps[a] *= STEP_GROWTH;
                self.next_dimension();
                self.probe_up();
                self.phase = Phase::Increased;
                TrialOutcome::Improved { dimension: a, cost }
            }
            Phase::Increased => {
                self.candidate[a] -= 2.0 * self.steps[a];
                self.phase = Phase::Decreased;
                TrialOutcome::ProbeDown { dimension: a, cost }
            }
            Phase::Decreased => {
                self.candidate[a] += self.steps[a];
                self.steps[a] *= STEP_SHRINK;
                self.next_dimension();
                self.probe_up();
                self.phase = Phase::Increased;
                TrialOutcome::Contracted { dimension: a, cost }
            }
        };

        self.trials += 1;
        self.apply(controller);

        debug!(
            "[Tuner] trial {}: {:?} -> candidate={:?} steps={:?}",
            self.trials, outcome, self.candidate, self.steps
        );
        Ok(outcome)
    }

    fn beats_best(&self, cost: f64) -> bool {
        self.best.is_none_or(|best| cost < best.cost)
    }

    fn record_best(&mut self, cost: f64) {
        self.previous_best_cost = self.best.map(|best| best.cost);
        self.best = Some(BestPoint {
            cost,
            gains: Gains::from_array(self.candidate),
            steps: self.steps,
        });
    }

    fn next_dimension(&mut self) {
        self.active_dimension = (self.active_dimension + 1) % DIMENSIONS;
    }

    fn probe_up(&mut self) {
        let a = self.active_dimension;
        self.candidate[a] += self.steps[a];
    }

    fn apply(&self, controller: &mut PidController) {
        controller.initialize(Gains::from_array(self.candidate));
        controller.set_run_length(self.run_length);
    }

    pub fn candidate(&self) -> Gains {
        Gains::from_array(self.candidate)
    }

    pub fn steps(&self) -> [f64; DIMENSIONS] {
        self.steps
    }

    pub fn best(&self) -> Option<BestPoint> {
        self.best
    }

    /// Best cost so far, `+inf` before the first scored run.
    pub fn best_cost(&self) -> f64 {
        self.best.map_or(f64::INFINITY, |best| best.cost)
    }

    /// Drop in best cost at the most recent improvement, `None` until there have been two.
    pub fn improvement(&self) -> Option<f64> {
        Some(self.previous_best_cost? - self.best?.cost)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn active_dimension(&self) -> usize {
        self.active_dimension
    }

    pub fn run_length(&self) -> usize {
        self.run_length
    }

    pub fn trials(&self) -> u64 {
        self.trials
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::cost::CostConfig;

    const EPS: f64 = 1e-12;

    /// Feeds one sample whose squared error is `cost`, so `mean_cost() == cost`.
    fn finish_run(controller: &mut PidController, cost: f64) {
        controller.update(cost.sqrt(), 30.0, 0.0);
    }

    fn setup(gains: [f64; 3], steps: [f64; 3]) -> (PidController, Tuner) {
        let mut controller =
            PidController::new(Gains::from_array(gains), CostConfig::default()).unwrap();
        let tuner = Tuner::bind(TuningConfig { steps, run_length: 1 }, &mut controller)
            .expect("valid tuning config");
        (controller, tuner)
    }

    fn assert_close(actual: [f64; 3], expected: [f64; 3]) {
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < EPS, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn first_advance_records_baseline_and_probes_kp() {
        let (mut pid, mut tuner) = setup([1.0, 1.0, 1.0], [0.5, 0.5, 0.5]);
        finish_run(&mut pid, 4.0);

        let outcome = tuner.advance(&mut pid).unwrap();

        assert_eq!(outcome, TrialOutcome::Baseline { cost: 4.0 });
        assert_eq!(tuner.best_cost(), 4.0);
        assert_eq!(tuner.best().unwrap().gains, Gains::new(1.0, 1.0, 1.0));
        assert_eq!(tuner.candidate(), Gains::new(1.5, 1.0, 1.0));
        assert_eq!(pid.gains(), Gains::new(1.5, 1.0, 1.0));
        assert_eq!(tuner.phase(), Phase::Increased);
        assert_eq!(pid.sample_index(), 0);
        assert_eq!(pid.run_length(), Some(1));
    }

    #[test]
    fn success_grows_step_and_moves_on() {
        let (mut pid, mut tuner) = setup([1.0, 1.0, 1.0], [0.5, 0.5, 0.5]);
        finish_run(&mut pid, 4.0);
        tuner.advance(&mut pid).unwrap();

        finish_run(&mut pid, 1.0);
        let outcome = tuner.advance(&mut pid).unwrap();

        assert_eq!(outcome, TrialOutcome::Improved { dimension: 0, cost: 1.0 });
        assert!((tuner.steps()[0] - 0.5 * 1.1).abs() < EPS);
        assert_eq!(tuner.active_dimension(), 1);
        assert_close(tuner.candidate().to_array(), [1.5, 1.5, 1.0]);
        assert_eq!(tuner.phase(), Phase::Increased);

        let best = tuner.best().unwrap();
        assert_eq!(best.gains, Gains::new(1.5, 1.0, 1.0));
        assert_eq!(best.steps, [0.5, 0.5, 0.5]);
        assert_eq!(tuner.improvement(), Some(3.0));
    }

    #[test]
    fn double_failure_restores_and_contracts() {
        let (mut pid, mut tuner) = setup([1.0, 1.0, 1.0], [0.5, 0.5, 0.5]);
        finish_run(&mut pid, 1.0);
        tuner.advance(&mut pid).unwrap();

        finish_run(&mut pid, 4.0);
        let outcome = tuner.advance(&mut pid).unwrap();
        assert_eq!(outcome, TrialOutcome::ProbeDown { dimension: 0, cost: 4.0 });
        assert_close(tuner.candidate().to_array(), [0.5, 1.0, 1.0]);
        assert_eq!(tuner.phase(), Phase::Decreased);

        finish_run(&mut pid, 4.0);
        let outcome = tuner.advance(&mut pid).unwrap();
        assert_eq!(outcome, TrialOutcome::Contracted { dimension: 0, cost: 4.0 });
        assert!((tuner.steps()[0] - 0.5 * 0.9).abs() < EPS);
        assert_close(tuner.candidate().to_array(), [1.0, 1.5, 1.0]);
        assert_eq!(tuner.active_dimension(), 1);
        assert_eq!(tuner.phase(), Phase::Increased);
        assert_eq!(tuner.best_cost(), 1.0);
    }

    #[test]
    fn downward_success_returns_to_increased() {
        let (mut pid, mut tuner) = setup([1.0, 1.0, 1.0], [0.5, 0.5, 0.5]);
        for cost in [1.0, 4.0] {
            finish_run(&mut pid, cost);
            tuner.advance(&mut pid).unwrap();
        }

        finish_run(&mut pid, 0.25);
        let outcome = tuner.advance(&mut pid).unwrap();

        assert_eq!(outcome, TrialOutcome::Improved { dimension: 0, cost: 0.25 });
        assert_eq!(tuner.best().unwrap().gains, Gains::new(0.5, 1.0, 1.0));
        assert!((tuner.steps()[0] - 0.55).abs() < EPS);
        assert_close(tuner.candidate().to_array(), [0.5, 1.5, 1.0]);
        assert_eq!(tuner.phase(), Phase::Increased);
    }

    #[test]
    fn dimension_wraps_after_derivative() {
        let (mut pid, mut tuner) = setup([1.0, 1.0, 1.0], [0.5, 0.5, 0.5]);
        let mut cost = 10.0;
        finish_run(&mut pid, cost);
        tuner.advance(&mut pid).unwrap();
        for expected_next in [1, 2, 0, 1] {
            cost /= 2.0;
            finish_run(&mut pid, cost);
            tuner.advance(&mut pid).unwrap();
            assert_eq!(tuner.active_dimension(), expected_next);
        }
    }

    #[test]
    fn equal_cost_is_not_an_improvement() {
        let (mut pid, mut tuner) = setup([1.0, 1.0, 1.0], [0.5, 0.5, 0.5]);
        finish_run(&mut pid, 1.0);
        tuner.advance(&mut pid).unwrap();
        finish_run(&mut pid, 1.0);
        assert!(matches!(
            tuner.advance(&mut pid).unwrap(),
            TrialOutcome::ProbeDown { .. }
        ));
    }

    #[test]
    fn best_cost_never_regresses() {
        let (mut pid, mut tuner) = setup([0.2, 0.004, 3.0], [0.05, 0.001, 0.5]);
        let costs = [4.0, 9.0, 2.25, 6.25, 16.0, 1.0, 1.0, 12.25, 0.5625, 6.25, 4.0, 0.25, 0.49];
        let mut last = f64::INFINITY;
        for cost in costs {
            finish_run(&mut pid, cost);
            tuner.advance(&mut pid).unwrap();
            assert!(tuner.best_cost() <= last);
            last = tuner.best_cost();
            assert!(tuner.steps().iter().all(|&s| s > 0.0));
        }
        assert_eq!(tuner.best_cost(), 0.25);
        assert_eq!(tuner.trials(), costs.len() as u64);
    }

    #[test]
    fn degenerate_run_leaves_state_untouched() {
        let (mut pid, mut tuner) = setup([1.0, 1.0, 1.0], [0.5, 0.5, 0.5]);
        let before = (tuner.candidate(), tuner.steps(), tuner.phase());

        let err = tuner.advance(&mut pid).unwrap_err();

        assert_eq!(err, ControlError::DegenerateRun { samples: 0 });
        assert_eq!((tuner.candidate(), tuner.steps(), tuner.phase()), before);
        assert_eq!(tuner.trials(), 0);
        assert_eq!(tuner.best(), None);
    }

    #[test]
    fn bind_rejects_invalid_config() {
        let mut pid =
            PidController::new(Gains::new(1.0, 0.0, 0.0), CostConfig::default()).unwrap();
        let zero = TuningConfig { run_length: 0, ..Default::default() };
        assert!(matches!(Tuner::bind(zero, &mut pid), Err(ConfigError::ZeroRunLength)));

        let negative = TuningConfig { steps: [0.1, -0.1, 0.1], run_length: 10 };
        assert!(matches!(
            Tuner::bind(negative, &mut pid),
            Err(ConfigError::InvalidStepSize { index: 1, .. })
        ));
    }
}
