//! Error types.
//!
//! Device failures after a successful open are fatal ([`DeviceError`]): the
//! output is assumed wedged and nothing is retried. Failures while opening are
//! reported as [`InitError`] so a caller can fall back to another device.

use thiserror::Error;

/// Unrecoverable failure of an opened output device.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Handing a filled buffer to the device failed
    #[error("{device}: submitting buffer failed ({reason})")]
    Submit { device: String, reason: String },

    /// Querying the play position failed
    #[error("{device}: querying play cursor failed ({reason})")]
    Cursor { device: String, reason: String },

    /// The device's stream reported an error asynchronously
    #[error("{device}: output stream failed ({reason})")]
    Stream { device: String, reason: String },
}

/// Failure to bring up a device. Non-fatal: try another device.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    /// The device refused to open
    #[error("{device}: opening device failed ({reason})")]
    Open { device: String, reason: String },

    /// The device can't play the requested format
    #[error("{device}: unsupported format {format}")]
    UnsupportedFormat { device: String, format: String },

    /// Mixer configuration is unusable
    #[error("invalid mixer configuration: {0}")]
    InvalidConfig(String),

    /// No output device available
    #[error("no output device available")]
    NoDevice,
}

/// Main error type for the mixer
#[derive(Error, Debug)]
pub enum Error {
    #[error("initialization error: {0}")]
    Init(#[from] InitError),

    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// A thread panicked while holding the mixer lock
    #[error("mixer state lock poisoned")]
    Poisoned,

    /// The mixing thread could not be spawned or joined
    #[error("mixer thread error: {0}")]
    Thread(String),

    /// The driver has already been shut down
    #[error("mixer is not running")]
    NotRunning,
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Error::Poisoned
    }
}

/// Convenience Result type using the mixer [`Error`]
pub type Result<T> = std::result::Result<T, Error>;
