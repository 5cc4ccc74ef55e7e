//! Error types for capture, synchronization and persistence.
//!
//! Per-frame failures never cross a processing cycle: the stream processors
//! log them and degrade to a dropped frame. Only stream start-up and
//! configuration errors reach the caller.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for capture-side operations
pub type Result<T> = std::result::Result<T, CaptureError>;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to open {stream} stream: {reason}")]
    StreamOpen { stream: &'static str, reason: String },

    #[error("stream not started")]
    NotStarted,

    #[error("no frame available")]
    NoFrame,

    #[error("invalid frame data: {0}")]
    InvalidFrame(String),

    #[error("frame texture unavailable: {0}")]
    Texture(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("malformed record in {path} line {line}: {reason}")]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("unsupported bitmap: {0}")]
    UnsupportedBitmap(String),

    #[error("invalid depth raster: {0}")]
    InvalidRaster(String),

    #[error("buffer holds {actual:?} pixels, expected {expected:?}")]
    FormatMismatch {
        expected: crate::capture::PixelFormat,
        actual: crate::capture::PixelFormat,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
