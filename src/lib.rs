//! Versioned, configuration-driven batch pipeline for sports schedule data.
//!
//! Sources are read past their last recorded watermark, run through a named
//! processor, merged into the model's output under its data-quality
//! constraints, and persisted together with the new watermarks.

pub mod config;
pub mod content;
pub mod enforce;
pub mod error;
pub mod logging;
pub mod managers;
pub mod processors;
pub mod spec;
pub mod store;
pub mod versioning;
pub mod workflow;

pub use error::{PipelineError, Result};
