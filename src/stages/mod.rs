//! External collaborator invocations.
//!
//! Each stage wraps one black-box tool behind the same contract: blocking
//! call, explicit timeout (timeout failures are distinct from non-zero
//! exits), and a checkpoint artifact on disk whose existence is the resume
//! signal. Binaries are resolved from `AUDIOPIPE_*_BIN` environment
//! variables with sensible defaults, which also makes the orchestrator
//! drivable with stub executables in tests.

pub mod diarize;
pub mod separate;
pub mod transcribe;
