//! pid.rs
//! Discrete PID filter with per-run cost accumulation.
//!
//! One `update` per telemetry sample: error in, correction out. Alongside the
//! correction the controller accumulates the run's cost (`error²` plus optional
//! penalties) over the samples the window policy admits; the tuner reads the
//! mean of that cost once the run is over.

use serde::{Deserialize, Serialize};

use crate::control::cost::CostConfig;
use crate::error::{ConfigError, ControlError};

/// Gain triple, indexed 0 = proportional, 1 = integral, 2 = derivative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Gains {
    pub const fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }

    #[inline]
    pub fn to_array(self) -> [f64; 3] {
        [self.kp, self.ki, self.kd]
    }

    #[inline]
    pub fn from_array(values: [f64; 3]) -> Self {
        Self::new(values[0], values[1], values[2])
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("kp", self.kp), ("ki", self.ki), ("kd", self.kd)] {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteGain { name, value });
            }
        }
        Ok(())
    }
}

impl From<[f64; 3]> for Gains {
    fn from(values: [f64; 3]) -> Self {
        Self::from_array(values)
    }
}

/// PID controller state for one role (steering or throttle).
#[derive(Debug, Clone)]
pub struct PidController {
    gains: Gains,
    config: CostConfig,
    previous_error: f64,
    error_sum: f64,
    is_first_sample: bool,
    sample_index: usize,
    run_length: Option<usize>,
    cost_sum: f64,
    cost_samples: usize,
    speed_sum: f64,
}

impl PidController {
    /// Fails if either the gains or the cost config would not survive `validate`.
    pub fn new(gains: Gains, config: CostConfig) -> Result<Self, ConfigError> {
        gains.validate()?;
        config.validate()?;

        let mut controller = Self {
            gains,
            config,
            previous_error: 0.0,
            error_sum: 0.0,
            is_first_sample: true,
            sample_index: 0,
            run_length: None,
            cost_sum: 0.0,
            cost_samples: 0,
            speed_sum: 0.0,
        };
        controller.initialize(gains);
        Ok(controller)
    }

    /// Installs `gains` and clears every per-run accumulator. The run length is kept.
    pub fn initialize(&mut self, gains: Gains) {
        self.gains = gains;
        self.previous_error = 0.0;
        self.error_sum = 0.0;
        self.is_first_sample = true;
        self.sample_index = 0;
        self.cost_sum = 0.0;
        self.cost_samples = 0;
        self.speed_sum = 0.0;
    }

    pub fn set_run_length(&mut self, run_length: usize) {
        self.run_length = Some(run_length);
    }

    /// Computes the correction for one sample and folds it into the run's cost.
    ///
    /// `speed` and `heading` never change the sign or size of the correction
    /// unless time scaling is enabled; otherwise they only feed the cost.
    pub fn update(&mut self, error: f64, speed: f64, heading: f64) -> f64 {
        let dt = self.config.time_scaling.factor(speed);

        let proportional = self.gains.kp * error;

        let derivative = if self.is_first_sample {
            self.is_first_sample = false;
            0.0
        } else {
            self.gains.kd * (error - self.previous_error) / dt
        };

        self.previous_error = error;
        self.error_sum += error;
        let integral = self.gains.ki * self.error_sum * dt;

        if self.config.window.admits(self.sample_index, self.run_length) {
            self.cost_sum += error * error + self.config.penalty(speed, heading);
            self.cost_samples += 1;
            self.speed_sum += speed;
        }

        self.sample_index += 1;
        -(proportional + integral + derivative)
    }

    /// Mean cost over the qualifying samples of the current run.
    pub fn mean_cost(&self) -> Result<f64, ControlError> {
        if self.cost_samples == 0 {
            return Err(ControlError::DegenerateRun {
                samples: self.sample_index,
            });
        }
        Ok(self.cost_sum / self.cost_samples as f64)
    }

    /// Mean speed over the qualifying samples, `None` before any qualified.
    pub fn mean_speed(&self) -> Option<f64> {
        (self.cost_samples > 0).then(|| self.speed_sum / self.cost_samples as f64)
    }

    #[inline]
    pub fn gains(&self) -> Gains {
        self.gains
    }

    #[inline]
    pub fn config(&self) -> &CostConfig {
        &self.config
    }

    #[inline]
    pub fn sample_index(&self) -> usize {
        self.sample_index
    }

    #[inline]
    pub fn run_length(&self) -> Option<usize> {
        self.run_length
    }

    #[inline]
    pub fn error_sum(&self) -> f64 {
        self.error_sum
    }

    #[inline]
    pub fn cost_samples(&self) -> usize {
        self.cost_samples
    }
}
