//! Error types for examdash.

use thiserror::Error;

/// Result type alias using examdash's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for examdash operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Initial or refresh list load failed
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Remote confirmation of an optimistic mutation failed
    #[error("Mutation error: {0}")]
    Mutation(String),

    /// Push channel transport failed (connect, read, handshake)
    #[error("Transport error: {0}")]
    Transport(String),

    /// A push frame or response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// A push frame carried an event type nobody understands
    #[error("Unknown event type: {0}")]
    UnknownEvent(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Authentication/authorization failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.status() == Some(reqwest::StatusCode::UNAUTHORIZED) {
            return Error::Unauthorized(e.to_string());
        }
        if e.is_decode() {
            return Error::Decode(e.to_string());
        }
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_fetch() {
        let err = Error::Fetch("503 from /notifications".to_string());
        assert_eq!(err.to_string(), "Fetch error: 503 from /notifications");
    }

    #[test]
    fn test_error_display_mutation() {
        let err = Error::Mutation("mark read rejected".to_string());
        assert_eq!(err.to_string(), "Mutation error: mark read rejected");
    }

    #[test]
    fn test_error_display_transport() {
        let err = Error::Transport("connection reset".to_string());
        assert_eq!(err.to_string(), "Transport error: connection reset");
    }

    #[test]
    fn test_error_display_unknown_event() {
        let err = Error::UnknownEvent("exam.deleted".to_string());
        assert_eq!(err.to_string(), "Unknown event type: exam.deleted");
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("unknown role".to_string());
        assert_eq!(err.to_string(), "Configuration error: unknown role");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Decode(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Decode error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn test_error_debug_format() {
        let err = Error::InvalidInput("channel_url must use ws or wss".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("InvalidInput"));
    }
}
