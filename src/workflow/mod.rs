//! Layer execution: model ordering and the per-layer batch runner.

pub mod builder;
pub mod order;

pub use builder::{LayerBuilder, LayerReport, run_workflow};
pub use order::ModelOrder;
