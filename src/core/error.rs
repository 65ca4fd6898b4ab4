//! GL-010: Error taxonomy for parsing, resolution and execution.
//!
//! Parser and resolver errors propagate to the caller. Step-level errors are
//! captured by the runner into `StepResult::error` and never escape
//! `runner::execute`.

use std::path::{Path, PathBuf};

/// Crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Malformed recipe: missing fields, duplicate ids, bad step types.
    #[error("invalid recipe: {0}")]
    Structural(String),

    #[error("invalid condition '{expr}': {reason}")]
    Condition { expr: String, reason: String },

    #[error("invalid agent reference '{0}': expected namespace:name using [A-Za-z0-9_-]")]
    InvalidReference(String),

    #[error("agent reference '{reference}' not found (searched: {})", join_paths(.attempted))]
    ReferenceNotFound {
        reference: String,
        attempted: Vec<PathBuf>,
    },

    #[error("{} escapes search path {}", path.display(), base.display())]
    PathEscape { path: PathBuf, base: PathBuf },

    #[error("adapter '{adapter}' is not available: {reason}")]
    Unavailable { adapter: String, reason: String },

    #[error("adapter '{adapter}': {message}")]
    Adapter { adapter: String, message: String },

    #[error("exit code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Attach a path to an I/O error.
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural(message.into())
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
