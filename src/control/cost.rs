//! cost.rs
//! Runtime cost policy for one controller: which samples count toward the run's
//! mean cost, which auxiliary penalties are added to `error²`, and whether the
//! integral/derivative terms are scaled by a speed-derived time factor.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Floor applied to |speed| before it is inverted into a time factor.
pub const SPEED_FLOOR: f64 = 0.1;

/// Decides which samples of a run contribute to the mean cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WindowPolicy {
    /// Every sample counts.
    #[default]
    Unwindowed,
    /// Samples before `floor(run_length * fraction)` are transients and are skipped.
    Settle { fraction: f64 },
}

impl WindowPolicy {
    /// Whether the sample at `sample_index` counts. Without a run length every sample counts.
    #[inline]
    pub fn admits(&self, sample_index: usize, run_length: Option<usize>) -> bool {
        match (self, run_length) {
            (WindowPolicy::Unwindowed, _) | (_, None) => true,
            (WindowPolicy::Settle { fraction }, Some(len)) => {
                let threshold = (len as f64 * fraction).floor() as usize;
                sample_index >= threshold
            }
        }
    }
}

/// Speed-dependent sample spacing: `dt = reference_speed / max(|speed|, SPEED_FLOOR)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeScaling {
    #[default]
    Off,
    SpeedProportional { reference_speed: f64 },
}

impl TimeScaling {
    /// Factor dividing the derivative term and multiplying the integral term.
    #[inline]
    pub fn factor(&self, speed: f64) -> f64 {
        match self {
            TimeScaling::Off => 1.0,
            TimeScaling::SpeedProportional { reference_speed } => {
                reference_speed / speed.abs().max(SPEED_FLOOR)
            }
        }
    }
}

/// Cost and scaling options, selected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    pub use_speed_penalty: bool,
    pub use_heading_penalty: bool,
    pub window: WindowPolicy,
    pub time_scaling: TimeScaling,
    /// Speed at which the speed penalty has decayed to 1/e.
    pub speed_scale: f64,
    /// Heading magnitude at which the heading penalty reaches e - 1.
    pub heading_scale: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            use_speed_penalty: false,
            use_heading_penalty: false,
            window: WindowPolicy::Unwindowed,
            time_scaling: TimeScaling::Off,
            speed_scale: 50.0,
            heading_scale: 25.0,
        }
    }
}

impl CostConfig {
    /// Rejects fractions outside `[0, 1)` and non-positive scales.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let WindowPolicy::Settle { fraction } = self.window {
            if !(0.0..1.0).contains(&fraction) {
                return Err(ConfigError::InvalidWindowFraction(fraction));
            }
        }
        if let TimeScaling::SpeedProportional { reference_speed } = self.time_scaling {
            ensure_positive("reference_speed", reference_speed)?;
        }
        ensure_positive("speed_scale", self.speed_scale)?;
        ensure_positive("heading_scale", self.heading_scale)?;
        Ok(())
    }

    /// Sum of the enabled auxiliary penalties for one sample. Never enters the correction.
    #[inline]
    pub fn penalty(&self, speed: f64, heading: f64) -> f64 {
        let mut total = 0.0;
        if self.use_speed_penalty {
            total += speed_penalty(speed, self.speed_scale);
        }
        if self.use_heading_penalty {
            total += heading_penalty(heading, self.heading_scale);
        }
        total
    }
}

/// Exponential decay in |speed|: slow runs cost more.
#[inline]
pub fn speed_penalty(speed: f64, scale: f64) -> f64 {
    (-speed.abs() / scale).exp()
}

/// Exponential rise in |heading|, zero when driving straight.
#[inline]
pub fn heading_penalty(heading: f64, scale: f64) -> f64 {
    (heading.abs() / scale).exp() - 1.0
}

pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositiveParameter { name, value })
    }
}
