use thiserror::Error;

/// Result type for chapter-live operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for chapter-live
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// API error response
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Inbound frame could not be interpreted
    #[error("Malformed frame: {0}")]
    Frame(String),

    /// WebSocket connection error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// A frame was sent while the connection was not open
    #[error("WebSocket not connected")]
    NotConnected,

    /// Reconnection failed after multiple attempts
    #[error("Reconnection failed after {attempts} attempts: {last_error}")]
    ReconnectFailed { attempts: u32, last_error: String },

    /// A background reconciliation task was aborted before finishing
    #[error("Background task failed: {0}")]
    TaskJoin(String),
}

impl Error {
    /// Whether this error came from the remote API (network failure or non-2xx)
    pub fn is_remote(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Api { .. })
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(err.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::TaskJoin(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = Error::Api {
            status: 404,
            message: "RSVP not found".to_string(),
        };
        assert_eq!(err.to_string(), "API error (status 404): RSVP not found");

        let err = Error::ReconnectFailed {
            attempts: 5,
            last_error: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Reconnection failed after 5 attempts: connection refused"
        );
    }

    #[test]
    fn test_is_remote() {
        assert!(Error::Api {
            status: 500,
            message: String::new()
        }
        .is_remote());
        assert!(!Error::NotConnected.is_remote());
        assert!(!Error::Frame("bad".into()).is_remote());
    }
}
