//control: the algorithmic core
//PID filter with per-run cost accumulation, plus the twiddle search that retunes it between runs.
pub mod cost;
pub mod pid;
pub mod tuner;
