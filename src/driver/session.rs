//! session.rs
//! Per-simulator driving session: steering + throttle controllers and the optional tuner.
//!
//! Every telemetry frame is handled to completion: either it produces one
//! bounded command, or (in training mode, once the steering controller has
//! consumed a full run) it closes the run, advances the tuner and answers with
//! a reset so the simulator restarts the episode under the new gains.

use log::{debug, error, info, warn};

use crate::control::{
    cost::CostConfig,
    pid::{Gains, PidController},
    tuner::Tuner,
};
use crate::driver::telemetry::{parse_frame, Command, Frame, Telemetry, MANUAL_FRAME, RESET_FRAME};
use crate::error::{ConfigError, ControlError};
use crate::utils::{
    config::AppConfig,
    diagnostics::{DiagnosticsSink, RunReport},
};

/// What the session wants sent back for one telemetry sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reply {
    Command(Command),
    /// The run just ended; restart the episode.
    Reset,
}

pub struct Session {
    steering: PidController,
    throttle: PidController,
    tuner: Option<Tuner>,
    target_speed: f64,
    diagnostics: DiagnosticsSink,
    runs: u64,
}

impl Session {
    pub fn new(config: &AppConfig, diagnostics: DiagnosticsSink) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut steering = PidController::new(config.steering.gains, config.cost)?;
        // throttle is never tuned; its cost is irrelevant
        let throttle = PidController::new(config.throttle.gains, CostConfig::default())?;
        let tuner = config
            .tuning
            .map(|tuning| Tuner::bind(tuning, &mut steering))
            .transpose()?;

        info!(
            "[Session] mode={} steering={:?} target_speed={}",
            if tuner.is_some() { "training" } else { "driving" },
            config.steering.gains,
            config.target_speed()
        );

        Ok(Self {
            steering,
            throttle,
            tuner,
            target_speed: config.target_speed(),
            diagnostics,
            runs: 0,
        })
    }

    /// Handles one raw frame and returns the frame to send back, if any.
    pub fn handle_frame(&mut self, raw: &str) -> Option<String> {
        match parse_frame(raw) {
            Ok(Some(Frame::Telemetry(telemetry))) => match self.on_telemetry(&telemetry) {
                Ok(Reply::Command(command)) => Some(command.to_frame()),
                Ok(Reply::Reset) => Some(RESET_FRAME.to_string()),
                Err(e) => {
                    error!("[Session] {e}; repeating the trial");
                    self.restart_run();
                    Some(RESET_FRAME.to_string())
                }
            },
            Ok(Some(Frame::Manual)) => Some(MANUAL_FRAME.to_string()),
            Ok(Some(Frame::Event(event))) => {
                debug!("[Session] ignoring event '{event}'");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("[Session] rejected frame: {e}");
                None
            }
        }
    }

    /// One control step, or the run boundary if the current run is complete.
    pub fn on_telemetry(&mut self, telemetry: &Telemetry) -> Result<Reply, ControlError> {
        if self.run_complete() {
            self.finish_run()?;
            return Ok(Reply::Reset);
        }

        let steering = self
            .steering
            .update(telemetry.cte, telemetry.speed, telemetry.steering_angle);
        let throttle = self.throttle.update(
            telemetry.speed - self.target_speed,
            telemetry.speed,
            telemetry.steering_angle,
        );
        let command = Command::clamped(steering, throttle);

        debug!(
            "[Session] cte={:.4} speed={:.2} -> steer={:.4} throttle={:.2}",
            telemetry.cte, telemetry.speed, command.steering_angle, command.throttle
        );
        Ok(Reply::Command(command))
    }

    fn run_complete(&self) -> bool {
        self.tuner
            .as_ref()
            .is_some_and(|tuner| self.steering.sample_index() >= tuner.run_length())
    }

    fn finish_run(&mut self) -> Result<(), ControlError> {
        let Some(tuner) = self.tuner.as_mut() else {
            return Ok(());
        };

        let mean_speed = self.steering.mean_speed();
        let outcome = tuner.advance(&mut self.steering)?;
        self.throttle.initialize(self.throttle.gains());
        self.runs += 1;

        let best = tuner.best();
        info!(
            "[Session] run {} {} cost={:.6} speed={:.1} best={:.6} next={:?}",
            self.runs,
            outcome.label(),
            outcome.cost(),
            mean_speed.unwrap_or(0.0),
            tuner.best_cost(),
            tuner.candidate().to_array()
        );

        if let Some(best) = best {
            self.diagnostics.publish(RunReport::new(
                self.runs,
                &outcome,
                mean_speed,
                &best,
                tuner.candidate().to_array(),
                tuner.phase(),
            ));
        }
        Ok(())
    }

    /// Replays the current candidate from scratch without scoring the run.
    pub fn restart_run(&mut self) {
        self.steering.initialize(self.steering.gains());
        self.throttle.initialize(self.throttle.gains());
    }

    pub fn steering(&self) -> &PidController {
        &self.steering
    }

    pub fn throttle(&self) -> &PidController {
        &self.throttle
    }

    pub fn tuner(&self) -> Option<&Tuner> {
        self.tuner.as_ref()
    }

    pub fn steering_gains(&self) -> Gains {
        self.steering.gains()
    }

    pub fn runs(&self) -> u64 {
        self.runs
    }

    pub fn target_speed(&self) -> f64 {
        self.target_speed
    }
}
