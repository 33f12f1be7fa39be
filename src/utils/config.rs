//! Application configuration: TOML file with defaults for every field.
//!
//! ```toml
//! [server]
//! port = 4567
//!
//! [steering.gains]
//! kp = 0.15
//! ki = 0.006
//! kd = 4.0
//!
//! [cost]
//! use_speed_penalty = true
//! window = { kind = "settle", fraction = 0.5 }
//!
//! [tuning]            # present => training mode
//! steps = [0.01, 0.0005, 0.5]
//! run_length = 1000
//!
//! [diagnostics]
//! path = "data/runs.csv"
//! ```

use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};

use crate::control::{
    cost::{ensure_positive, CostConfig},
    pid::Gains,
    tuner::TuningConfig,
};
use crate::error::ConfigError;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 4567;
pub const DEFAULT_STEERING_GAINS: Gains = Gains::new(0.15, 0.006, 4.0);
/// Very stiff proportional-only loop: effectively bang-bang around the target speed.
pub const DEFAULT_THROTTLE_GAINS: Gains = Gains::new(9999.0, 0.0, 0.0);
pub const CRUISE_SPEED: f64 = 50.0;
pub const TRAINING_SPEED: f64 = 75.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    pub gains: Gains,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self { gains: DEFAULT_STEERING_GAINS }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub gains: Gains,
    /// Speed held while driving with fixed gains.
    pub target_speed: f64,
    /// Speed held while tuning.
    pub training_speed: f64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            gains: DEFAULT_THROTTLE_GAINS,
            target_speed: CRUISE_SPEED,
            training_speed: TRAINING_SPEED,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub steering: SteeringConfig,
    pub throttle: ThrottleConfig,
    pub cost: CostConfig,
    pub tuning: Option<TuningConfig>,
    pub diagnostics: DiagnosticsConfig,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        self.steering.gains.validate()?;
        self.throttle.gains.validate()?;
        ensure_positive("target_speed", self.throttle.target_speed)?;
        ensure_positive("training_speed", self.throttle.training_speed)?;
        self.cost.validate()?;
        if let Some(tuning) = &self.tuning {
            tuning.validate()?;
        }
        Ok(())
    }

    pub fn is_training(&self) -> bool {
        self.tuning.is_some()
    }

    /// Speed the throttle loop holds in the current mode.
    pub fn target_speed(&self) -> f64 {
        if self.is_training() {
            self.throttle.training_speed
        } else {
            self.throttle.target_speed
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::cost::WindowPolicy;

    #[test]
    fn empty_file_yields_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.steering.gains, DEFAULT_STEERING_GAINS);
        assert_eq!(config.bind_address(), "127.0.0.1:4567");
        assert!(!config.is_training());
        assert_eq!(config.target_speed(), CRUISE_SPEED);
    }

    #[test]
    fn parses_training_setup() {
        let config = AppConfig::from_toml(
            r#"
            [steering.gains]
            kp = 0.2
            ki = 0.004
            kd = 3.0

            [cost]
            use_heading_penalty = true
            window = { kind = "settle", fraction = 0.5 }

            [tuning]
            steps = [0.05, 0.001, 0.5]
            run_length = 600

            [diagnostics]
            path = "data/runs.csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.steering.gains, Gains::new(0.2, 0.004, 3.0));
        assert_eq!(config.cost.window, WindowPolicy::Settle { fraction: 0.5 });
        assert!(config.cost.use_heading_penalty);
        assert_eq!(config.tuning.unwrap().run_length, 600);
        assert_eq!(config.target_speed(), TRAINING_SPEED);
        assert_eq!(config.diagnostics.path, Some(PathBuf::from("data/runs.csv")));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            AppConfig::from_toml("[tuning]\nrun_length = 0\n"),
            Err(ConfigError::ZeroRunLength)
        ));
        assert!(matches!(
            AppConfig::from_toml("[tuning]\nsteps = [0.1, 0.0, 0.1]\n"),
            Err(ConfigError::InvalidStepSize { index: 1, .. })
        ));
        assert!(matches!(
            AppConfig::from_toml("[server]\nhost = \" \"\n"),
            Err(ConfigError::EmptyHost)
        ));
        assert!(matches!(
            AppConfig::from_toml("[throttle]\ntarget_speed = -1.0\n"),
            Err(ConfigError::NonPositiveParameter { name: "target_speed", .. })
        ));
        assert!(matches!(
            AppConfig::from_toml("[server]\nport = \"x\"\n"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = AppConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
