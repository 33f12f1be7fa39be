//! Command-line arguments shared by both binaries.
//!
//! Positional numbers: `kp ki kd` sets the initial steering gains,
//! `kp ki kd dp di dd` additionally sets the step sizes and switches on training.

use clap::Args;
use std::path::PathBuf;

use crate::control::{pid::Gains, tuner::TuningConfig};
use crate::error::ConfigError;
use crate::utils::config::AppConfig;

#[derive(Debug, Clone, Default, Args)]
pub struct CommonArgs {
    /// TOML configuration file; defaults apply to anything it leaves out.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Tune the steering gains between runs.
    #[arg(long)]
    pub train: bool,

    /// Samples per evaluation run (implies --train).
    #[arg(long, value_name = "SAMPLES")]
    pub run_length: Option<usize>,

    /// Append one CSV row per finished run to this file.
    #[arg(long, value_name = "FILE")]
    pub diagnostics: Option<PathBuf>,

    /// `kp ki kd [dp di dd]`
    #[arg(value_name = "PARAM", allow_negative_numbers = true)]
    pub params: Vec<f64>,
}

impl CommonArgs {
    /// Config file (or defaults) with the command-line overrides applied, validated.
    pub fn load_config(&self) -> Result<AppConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::default(),
        };

        match self.params.as_slice() {
            [] => {}
            &[kp, ki, kd] => config.steering.gains = Gains::new(kp, ki, kd),
            &[kp, ki, kd, dp, di, dd] => {
                config.steering.gains = Gains::new(kp, ki, kd);
                config.tuning.get_or_insert_with(TuningConfig::default).steps = [dp, di, dd];
            }
            other => return Err(ConfigError::ParamCount(other.len())),
        }

        if self.train {
            config.tuning.get_or_insert_with(TuningConfig::default);
        }
        if let Some(run_length) = self.run_length {
            config.tuning.get_or_insert_with(TuningConfig::default).run_length = run_length;
        }
        if let Some(path) = &self.diagnostics {
            config.diagnostics.path = Some(path.clone());
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(params: &[f64]) -> CommonArgs {
        CommonArgs { params: params.to_vec(), ..Default::default() }
    }

    #[test]
    fn no_arguments_means_default_driving() {
        let config = args(&[]).load_config().unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn three_numbers_set_gains_only() {
        let config = args(&[0.2, 0.001, 3.5]).load_config().unwrap();
        assert_eq!(config.steering.gains, Gains::new(0.2, 0.001, 3.5));
        assert!(!config.is_training());
    }

    #[test]
    fn six_numbers_enable_training() {
        let config = args(&[0.15, 0.006, 4.0, 0.01, 0.0005, 0.5]).load_config().unwrap();
        let tuning = config.tuning.unwrap();
        assert_eq!(tuning.steps, [0.01, 0.0005, 0.5]);
        assert_eq!(tuning.run_length, 1000);
    }

    #[test]
    fn run_length_implies_training() {
        let cli = CommonArgs { run_length: Some(400), ..Default::default() };
        assert_eq!(cli.load_config().unwrap().tuning.unwrap().run_length, 400);
    }

    #[test]
    fn rejects_wrong_count_and_bad_steps() {
        assert!(matches!(args(&[1.0, 2.0]).load_config(), Err(ConfigError::ParamCount(2))));
        assert!(matches!(
            args(&[0.1, 0.0, 1.0, 0.1, -0.1, 0.1]).load_config(),
            Err(ConfigError::InvalidStepSize { index: 1, .. })
        ));
    }
}
