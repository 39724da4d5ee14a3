//! Error types for pedalmap.

use thiserror::Error;

/// Result type alias for pedalmap operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading configuration or running devices.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration line failed to parse or validate.
    ///
    /// Carries the `file:line:` location so the diagnostic points at the
    /// offending line. Configuration errors are fatal at load; a partial
    /// config is never accepted.
    #[error("{file}:{line}: {message}")]
    Config {
        /// Path of the configuration file.
        file: String,
        /// 1-based line number.
        line: u32,
        /// What went wrong.
        message: String,
    },

    /// Opening or grabbing an input device failed.
    #[error("device {path}: {source}")]
    Device {
        /// Device node path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration binds no devices, leaving nothing to read.
    #[error("{file}: no devices configured; add lines like: dev: /dev/input/event7 [256,257,258]")]
    NoDevices {
        /// Path of the configuration file.
        file: String,
    },

    /// All device readers have stopped (EOF/EIO on every device).
    #[error("all devices lost")]
    DevicesLost,

    /// Other I/O errors (reading the configuration file).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a [`Error::Config`] for the given location.
    pub fn config(file: &str, line: u32, message: impl Into<String>) -> Self {
        Error::Config {
            file: file.to_string(),
            line,
            message: message.into(),
        }
    }
}
