//! Error types for the render pipeline.
//!
//! Every failure is fatal for the run; nothing here is retried.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the synthesis engine or its wrapper.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not be created or configured.
    #[error("failed to initialize synthesis engine: {0}")]
    Init(String),
    /// The instrument bank could not be loaded.
    #[error("failed to load bank {}: {reason}", .path.display())]
    Bank { path: PathBuf, reason: String },
    /// The source sequence could not be loaded.
    #[error("failed to load sequence {}: {reason}", .path.display())]
    Source { path: PathBuf, reason: String },
    /// A render call failed.
    #[error("render failed: {0}")]
    Render(String),
    /// An operation was issued in the wrong lifecycle state.
    #[error("engine operation `{op}` is not allowed while {state}")]
    OutOfOrder { op: &'static str, state: &'static str },
}

/// Top-level error for a render run.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Invalid options; raised before any resource is touched.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// A required input or output location is unusable.
    #[error("unusable resource {}: {reason}", .path.display())]
    Resource { path: PathBuf, reason: String },
    /// Write or seek failure on the output container.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The engine failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl RenderError {
    pub(crate) fn resource(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        RenderError::Resource {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;
