//driver: everything between the simulator's frames and the controller core
//Parses telemetry, runs the per-step control, detects run boundaries and drives the tuner.
pub mod session;
pub mod telemetry;
