//! # pid_twiddle
//!
//! Closed-loop steering/throttle control for a driving simulator, with online
//! coordinate-descent ("twiddle") tuning of the steering gains between runs.
//!
//! ## Layout
//! - **control:** PID filter with per-run cost, cost policy, twiddle tuner. No I/O.
//! - **driver:** telemetry frame codec and the per-simulator `Session`.
//! - **transport:** axum websocket server sharing one locked `Session`.
//! - **sim:** kinematic vehicle for offline tuning.
//! - **utils:** TOML configuration and CSV run diagnostics.

pub mod cli;
pub mod control;
pub mod driver;
pub mod error;
pub mod sim;
pub mod transport;
pub mod utils;
