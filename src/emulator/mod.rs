//! Emulator-driven smoke check for the lint build job.
//!
//! Runs the real job definition under `act` and requires a clean exit, logs
//! free of known failure signatures, and at least one exported artifact.

pub mod invocation;
pub mod smoke;

pub use invocation::EmulatorInvocation;
pub use smoke::{evaluate_run, run_smoke_check, SmokeMode, SmokeOutcome, SmokeReport};
