/*!
 * Error types for Fusion
 */

use fusion_connect::ConnectError;
use std::fmt;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FusionError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Error, Debug)]
pub enum FusionError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Local cache could not be written or cleared
    #[error("Cache error: {0}")]
    Cache(String),

    /// Backend call failed
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for FusionError {
    fn from(err: toml::de::Error) -> Self {
        FusionError::Config(format!("Invalid TOML: {}", err))
    }
}

impl FusionError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        if self.is_fatal() {
            EXIT_FATAL
        } else {
            EXIT_PARTIAL
        }
    }

    /// Check if this error is fatal (should not retry)
    pub fn is_fatal(&self) -> bool {
        match self {
            FusionError::Config(_) => true,
            FusionError::Connect(err) => !err.is_transient(),
            FusionError::Io(_)
            | FusionError::Cache(_)
            | FusionError::Serialization(_)
            | FusionError::Other(_) => false,
        }
    }

    /// Check if this error is transient (temporary, worth retrying)
    pub fn is_transient(&self) -> bool {
        match self {
            FusionError::Connect(err) => err.is_transient(),
            FusionError::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            FusionError::Config(_) => ErrorCategory::Configuration,
            FusionError::Io(_) => ErrorCategory::IoError,
            FusionError::Cache(_) => ErrorCategory::Cache,
            FusionError::Connect(ConnectError::Busy)
            | FusionError::Connect(ConnectError::CooldownActive { .. }) => ErrorCategory::Admin,
            FusionError::Connect(_) => ErrorCategory::Network,
            FusionError::Serialization(_) => ErrorCategory::Codec,
            FusionError::Other(_) => ErrorCategory::Unknown,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Configuration errors
    Configuration,
    /// I/O operation errors
    IoError,
    /// Local cache errors
    Cache,
    /// Network/protocol errors
    Network,
    /// Admin lock or cooldown refusals
    Admin,
    /// Encoding/decoding errors
    Codec,
    /// Uncategorized errors
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Cache => write!(f, "cache"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Admin => write!(f, "admin"),
            ErrorCategory::Codec => write!(f, "codec"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}
