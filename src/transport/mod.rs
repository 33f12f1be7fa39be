//transport: websocket plumbing between the simulator and the session
pub mod server;
