//! # Error Types
//!
//! Custom error types for Joystick Link using `thiserror`.

use thiserror::Error;

/// Main error type for Joystick Link
#[derive(Debug, Error)]
pub enum JoystickLinkError {
    /// Serial endpoint could not be exclusively acquired (absent, busy,
    /// or permission denied). Reported to the caller, never retried
    /// automatically.
    #[error("serial port unavailable: {0}")]
    PortUnavailable(String),

    /// Write attempted while the transport is closed
    #[error("serial transport is not open")]
    NotOpen,

    /// Command attempted with no open transport; caller must reconnect
    #[error("not connected to a device")]
    NotConnected,

    /// A correlated request is already outstanding on this channel
    #[error("another awaited request is still pending")]
    CorrelationBusy,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Joystick Link
pub type Result<T> = std::result::Result<T, JoystickLinkError>;
