//! Error taxonomy shared by the compiler and the runtime loader.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::ConfigError;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced by the sprite pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bad command-line arguments or an input that cannot be compiled as requested.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Failure opening, reading or writing a file.
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A fixed-size table would overflow its addressable range.
    #[error("capacity exceeded: {what} (limit {limit})")]
    CapacityExceeded { what: &'static str, limit: usize },

    /// On-disk data does not have the expected shape.
    #[error("validation failed for '{}': {message}", .path.display())]
    Validation { path: PathBuf, message: String },

    /// An operation was called out of its lifecycle order.
    #[error("lifecycle misuse: {0}")]
    ConcurrencyMisuse(&'static str),

    /// The source image could not be decoded as an indexed bitmap.
    #[error("could not decode '{}': {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: png::DecodingError,
    },

    /// Configuration file problem.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Wrap an I/O error together with the path it concerns.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::Io { path: path.as_ref().to_path_buf(), source }
    }

    pub fn validation(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Error::Validation { path: path.as_ref().to_path_buf(), message: message.into() }
    }

    /// Short machine-readable category name.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MalformedInput(_) => "malformed_input",
            Error::Io { .. } => "io_error",
            Error::CapacityExceeded { .. } => "capacity_exceeded",
            Error::Validation { .. } => "validation_error",
            Error::ConcurrencyMisuse(_) => "concurrency_misuse",
            Error::Decode { .. } => "decode_error",
            Error::Config(_) => "config_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mentions_path() {
        let err = Error::io("sheet.png", io::Error::new(io::ErrorKind::NotFound, "gone"));
        let msg = err.to_string();
        assert!(msg.contains("sheet.png"));
        assert!(msg.contains("gone"));
        assert_eq!(err.kind(), "io_error");
    }

    #[test]
    fn test_capacity_message() {
        let err = Error::CapacityExceeded { what: "tile store", limit: 65536 };
        assert_eq!(err.to_string(), "capacity exceeded: tile store (limit 65536)");
    }
}
