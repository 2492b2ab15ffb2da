//! Error taxonomy for scanning, measuring and deleting

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the scanning engine and the deleter.
///
/// Per-child failures during a scan never produce one of these; they are
/// recovered locally by omitting the child.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// Empty or relative path handed to an API that needs an absolute one.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The root of a scan could not be listed.
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every sizing strategy failed. Callers must not read this as zero.
    #[error("unable to measure {}", .0.display())]
    MeasurementUnavailable(PathBuf),

    #[error("failed to delete {}: {reason}", path.display())]
    DeleteFailed { path: PathBuf, reason: String },

    /// An external accelerator failed (timeout, missing binary, bad output).
    #[error("{tool}: {reason}")]
    Tool { tool: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, AnalyzeError>;

impl AnalyzeError {
    pub fn tool(tool: &'static str, reason: impl Into<String>) -> Self {
        AnalyzeError::Tool {
            tool,
            reason: reason.into(),
        }
    }
}

// Shared scan results hand the same error to every waiting caller.
impl Clone for AnalyzeError {
    fn clone(&self) -> Self {
        match self {
            AnalyzeError::InvalidInput(msg) => AnalyzeError::InvalidInput(msg.clone()),
            AnalyzeError::Unreadable { path, source } => AnalyzeError::Unreadable {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            AnalyzeError::MeasurementUnavailable(path) => {
                AnalyzeError::MeasurementUnavailable(path.clone())
            }
            AnalyzeError::DeleteFailed { path, reason } => AnalyzeError::DeleteFailed {
                path: path.clone(),
                reason: reason.clone(),
            },
            AnalyzeError::Tool { tool, reason } => AnalyzeError::Tool {
                tool: *tool,
                reason: reason.clone(),
            },
        }
    }
}
