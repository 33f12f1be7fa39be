//! vehicle.rs
//! Kinematic bicycle model following a sinusoidal lane centre.
//!
//! Stands in for the external driving simulator: emits the same three
//! telemetry signals (cte, speed in mph, wheel angle in degrees) and consumes
//! the same bounded commands. Sensor noise is uniform and seeded, so a given
//! seed replays the exact same episode.

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::driver::telemetry::{Command, Telemetry};

const MPH_TO_MPS: f64 = 0.44704;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    /// Seconds between telemetry frames.
    pub dt: f64,
    /// Metres between axles.
    pub wheelbase: f64,
    /// Wheel angle at full steering command.
    pub max_steer_deg: f64,
    /// Acceleration at full throttle, mph/s.
    pub accel: f64,
    /// Linear drag coefficient, 1/s.
    pub drag: f64,
    /// Lane centre amplitude and wavelength, metres.
    pub amplitude: f64,
    pub wavelength: f64,
    /// Lateral offset at the start of every episode, metres.
    pub initial_offset: f64,
    /// Half-widths of the uniform noise added to cte and speed.
    pub cte_noise: f64,
    pub speed_noise: f64,
    pub seed: u64,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            dt: 0.05,
            wheelbase: 2.67,
            max_steer_deg: 25.0,
            accel: 20.0,
            drag: 0.25,
            amplitude: 3.0,
            wavelength: 250.0,
            initial_offset: 1.0,
            cte_noise: 0.0,
            speed_noise: 0.0,
            seed: 7,
        }
    }
}

pub struct Vehicle {
    config: VehicleConfig,
    rng: StdRng,
    x: f64,
    y: f64,
    heading: f64,
    speed_mph: f64,
    wheel_angle: f64,
    frames: u64,
}

impl Vehicle {
    pub fn new(config: VehicleConfig) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(config.seed),
            x: 0.0,
            y: config.initial_offset,
            heading: 0.0,
            speed_mph: 0.0,
            wheel_angle: 0.0,
            frames: 0,
        }
    }

    /// Puts the car back at the start line. Noise keeps its stream, like a real restart.
    pub fn reset(&mut self) {
        self.x = 0.0;
        self.y = self.config.initial_offset;
        self.heading = 0.0;
        self.speed_mph = 0.0;
        self.wheel_angle = 0.0;
        self.frames = 0;
    }

    fn lane_centre(&self, x: f64) -> f64 {
        let k = std::f64::consts::TAU / self.config.wavelength;
        self.config.amplitude * (k * x).sin()
    }

    /// Lateral deviation from the lane centre, positive to the left.
    pub fn cross_track_error(&self) -> f64 {
        self.y - self.lane_centre(self.x)
    }

    pub fn telemetry(&mut self) -> Telemetry {
        let cte_noise = noise(&mut self.rng, self.config.cte_noise);
        let speed_noise = noise(&mut self.rng, self.config.speed_noise);
        Telemetry {
            cte: self.cross_track_error() + cte_noise,
            speed: (self.speed_mph + speed_noise).max(0.0),
            steering_angle: self.wheel_angle.to_degrees(),
        }
    }

    /// The current telemetry as the simulator would send it: every number as a string.
    pub fn telemetry_frame(&mut self) -> String {
        let t = self.telemetry();
        let data = json!({
            "cte": format!("{:.4}", t.cte),
            "speed": format!("{:.4}", t.speed),
            "steering_angle": format!("{:.4}", t.steering_angle),
        });
        format!("42{}", json!(["telemetry", data]))
    }

    /// Applies one command and integrates the model over `dt`.
    pub fn step(&mut self, command: &Command) {
        let dt = self.config.dt;
        self.wheel_angle = command.steering_angle * self.config.max_steer_deg.to_radians();

        let v = self.speed_mph * MPH_TO_MPS;
        self.x += v * self.heading.cos() * dt;
        self.y += v * self.heading.sin() * dt;
        self.heading += v / self.config.wheelbase * self.wheel_angle.tan() * dt;

        self.speed_mph += (command.throttle * self.config.accel - self.config.drag * self.speed_mph) * dt;
        self.speed_mph = self.speed_mph.max(0.0);
        self.frames += 1;
    }

    pub fn speed_mph(&self) -> f64 {
        self.speed_mph
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn distance(&self) -> f64 {
        self.x
    }
}

fn noise(rng: &mut StdRng, half_width: f64) -> f64 {
    if half_width > 0.0 {
        rng.random_range(-half_width..=half_width)
    } else {
        0.0
    }
}
