//! Watermarks: how "new data" is recognized in a source, and what was consumed last time.

pub mod source_versions;
pub mod strategy;

pub use source_versions::{RecordedVersion, SourceVersion, SourceVersions};
pub use strategy::{VersionMode, VersioningStrategy};
