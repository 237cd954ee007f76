//! Supervisor module: readiness handshake, durable run log, and the
//! orchestrating run loop.

mod log;
mod readiness;
mod runner;

pub use log::*;
pub use readiness::*;
pub use runner::*;
