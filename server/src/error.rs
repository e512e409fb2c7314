//! Errors raised while loading static data at room start.
//!
//! Game actions never fail loudly: an invalid action is dropped without any
//! state change. Only corrupt reference data or map imports surface as errors,
//! and they abort startup.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid {kind} `{id}`: {reason}")]
    InvalidEntry {
        kind: &'static str,
        id: String,
        reason: String,
    },

    #[error("duplicate {kind} id `{id}`")]
    Duplicate { kind: &'static str, id: String },

    #[error("map is {width}x{height}, only square maps are supported")]
    NotSquare { width: usize, height: usize },

    #[error("layer {index} holds {actual} tiles, expected {expected}")]
    LayerSize {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("invalid config: {0}")]
    Config(String),
}

impl LoadError {
    pub(crate) fn invalid(kind: &'static str, id: &str, reason: impl Into<String>) -> Self {
        LoadError::InvalidEntry {
            kind,
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

pub(crate) fn read_file(path: &std::path::Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}
