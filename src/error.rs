//! Error taxonomy shared by every pipeline component.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or invalid spec fields, unknown constraint kinds, unknown processors.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Content with the wrong shape, null or unparseable version values, missing columns.
    #[error("data validation error: {0}")]
    DataValidation(String),

    #[error("source '{0}' already has a recorded version")]
    DuplicateKey(String),

    #[error("overwrite of {} was not confirmed", .0.display())]
    WriteCancelled(PathBuf),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("json error in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("yaml error in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::DataValidation(msg.into())
    }

    /// Adapter for `map_err` on `std::io` calls.
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv(path: &Path) -> impl FnOnce(csv::Error) -> Self + '_ {
        move |source| Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json(path: &Path) -> impl FnOnce(serde_json::Error) -> Self + '_ {
        move |source| Self::Json {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn yaml(path: &Path) -> impl FnOnce(serde_yaml::Error) -> Self + '_ {
        move |source| Self::Yaml {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
