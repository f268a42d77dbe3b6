//! Per-model orchestration: sources in, processor, output out.

pub mod model;
pub mod output;
pub mod processing;
pub mod sources;

pub use model::{ModelManager, RunOptions, RunOutcome};
pub use output::OutputManager;
pub use processing::ProcessingManager;
pub use sources::SourcesManager;
