//! telemetry.rs
//! Socket.io-style frame codec for the driving simulator.
//!
//! Incoming: `42["telemetry",{"cte":"0.76","speed":"21.3","steering_angle":"-1.2",...}]`.
//! Numbers arrive as strings; plain JSON numbers are accepted too. A `null`
//! data object (no telemetry attached) switches the simulator to manual.
//! Outgoing: `42["steer",{...}]`, `42["reset",{}]`, `42["manual",{}]`.

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::TelemetryError;

pub const STEERING_LIMIT: f64 = 1.0;
/// Throttle ceiling, kept below full throttle.
pub const THROTTLE_MAX: f64 = 0.8;

/// Event prefix: `4` = websocket message, `2` = socket.io event.
const EVENT_PREFIX: &str = "42";

pub const RESET_FRAME: &str = r#"42["reset",{}]"#;
pub const MANUAL_FRAME: &str = r#"42["manual",{}]"#;

/// One simulator step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Telemetry {
    pub cte: f64,
    pub speed: f64,
    pub steering_angle: f64,
}

/// Bounded command for one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Command {
    pub steering_angle: f64,
    pub throttle: f64,
}

impl Command {
    /// Clamps steering to `[-1, 1]` and throttle to `[0, THROTTLE_MAX]`.
    pub fn clamped(steering_angle: f64, throttle: f64) -> Self {
        Self {
            steering_angle: steering_angle.clamp(-STEERING_LIMIT, STEERING_LIMIT),
            throttle: throttle.clamp(0.0, THROTTLE_MAX),
        }
    }

    pub fn to_frame(&self) -> String {
        format!("{EVENT_PREFIX}{}", json!(["steer", self]))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Telemetry(Telemetry),
    /// No data attached: hand control back to the user.
    Manual,
    /// Any other named event, ignored by the controller.
    Event(String),
}

/// Parses one text frame. `Ok(None)` for frames that are not socket.io events.
pub fn parse_frame(raw: &str) -> Result<Option<Frame>, TelemetryError> {
    if raw.len() <= EVENT_PREFIX.len() || !raw.starts_with(EVENT_PREFIX) {
        return Ok(None);
    }
    let payload = match (raw.find('['), raw.rfind(']')) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => return Ok(Some(Frame::Manual)),
    };

    let value: Value = serde_json::from_str(payload)?;
    let items = value.as_array().ok_or(TelemetryError::NotAnEvent)?;
    let event = items
        .first()
        .and_then(Value::as_str)
        .ok_or(TelemetryError::NotAnEvent)?;

    if event != "telemetry" {
        return Ok(Some(Frame::Event(event.to_owned())));
    }

    let data = match items.get(1) {
        None => return Err(TelemetryError::MissingField("data")),
        Some(Value::Null) => return Ok(Some(Frame::Manual)),
        Some(data) => data,
    };
    Ok(Some(Frame::Telemetry(Telemetry {
        cte: numeric_field(data, "cte")?,
        speed: numeric_field(data, "speed")?,
        steering_angle: numeric_field(data, "steering_angle")?,
    })))
}

fn numeric_field(data: &Value, field: &'static str) -> Result<f64, TelemetryError> {
    let raw = match data.get(field) {
        None => return Err(TelemetryError::MissingField(field)),
        Some(Value::String(s)) => s.trim().to_owned(),
        Some(other) => other.to_string(),
    };
    // "NaN" and "inf" parse as f64 but would poison the integral term
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(TelemetryError::NotNumeric { field, raw }),
    }
}
