//! Agent implementations.
//!
//! The pipeline core talks to agents only through
//! [`crate::domain::ports::PipelineAgent`]. This module carries the
//! deterministic scripted agent used for dry runs and tests; real backends
//! plug in the same trait from outside the crate.

pub mod scripted;

pub use scripted::{plan_from_task, ScriptedAgent};
