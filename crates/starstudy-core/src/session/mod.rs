//! Study sessions: the countdown state machine and the task that drives it.

mod runner;
mod timer;

pub use runner::SessionRunner;
pub use timer::{format_clock, SessionState, SessionTimer};
