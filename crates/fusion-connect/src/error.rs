//! Error types for the fusion-connect crate

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} from {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Admin operation busy, try again")]
    Busy,

    #[error("Cooldown active, try again in {remaining_secs}s")]
    CooldownActive { remaining_secs: u64 },

    #[error("Other error: {0}")]
    Other(String),
}

impl ConnectError {
    /// HTTP status code when the server answered with a non-success status
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ConnectError::Status { status, .. } => Some(*status),
            ConnectError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether retrying the same request later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ConnectError::Transport(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            ConnectError::Status { status, .. } => *status >= 500 || *status == 429,
            ConnectError::Busy | ConnectError::CooldownActive { .. } => true,
            ConnectError::Decode { .. } | ConnectError::InvalidUrl(_) | ConnectError::Other(_) => {
                false
            }
        }
    }
}

pub type ConnectResult<T> = Result<T, ConnectError>;
