//! Error types for the tilepress editing and export engine.
//!
//! Errors are organized by stage: configuration, session orchestration, and
//! raster export each get their own enum, with a top-level `TilepressError`
//! that callers can match on at the boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for tilepress operations.
#[derive(Error, Debug)]
pub enum TilepressError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Session orchestration errors.
///
/// Preparation failures never surface here: the resolver falls back to the
/// raw source and finally to a placeholder rather than failing the session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The requested photo index is outside the session's collection.
    #[error("No photo at index {index} (collection has {len})")]
    OutOfRange { index: usize, len: usize },

    /// An operation was invoked in a state that does not allow it.
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// A filter id that is not part of the built-in catalog.
    #[error("Unknown filter '{id}'")]
    UnknownFilter { id: String },

    /// The synchronous preview export failed during commit.
    #[error("Failed to process photo {id}: {source}")]
    Commit {
        id: String,
        #[source]
        source: ExportError,
    },

    /// The record store rejected an update patch.
    #[error("Record update failed for photo {id}: {message}")]
    Store { id: String, message: String },
}

/// Raster export errors (decode, crop, resize, encode).
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("Failed to encode {path}: {message}")]
    Encode { path: PathBuf, message: String },

    /// A crop rectangle that does not fit the source it targets.
    #[error("Crop {width}x{height}+{x}+{y} does not fit {source_width}x{source_height} source")]
    InvalidCrop {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        source_width: u32,
        source_height: u32,
    },

    #[error("IO error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A blocking raster task could not be joined.
    #[error("Task join error: {0}")]
    Join(String),
}

/// Result type alias for tilepress operations.
pub type Result<T> = std::result::Result<T, TilepressError>;

/// Result type alias for export-stage operations.
pub type ExportResult<T> = std::result::Result<T, ExportError>;
