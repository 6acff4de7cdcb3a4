//! Gate, generate and persist: the "maybe generate" workflow behind map
//! viewport changes.

pub mod config;
pub mod gate;
pub mod orchestrator;

pub use config::{build_orchestrator_from_env, PipelineConfig};
pub use gate::{GatePolicy, GateVerdict, RejectReason};
pub use orchestrator::{GenerationOrchestrator, PipelineError};

pub const CRATE_NAME: &str = "evgen-pipeline";
