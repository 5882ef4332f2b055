use thiserror::Error;

/// Custom Result type for this crate.
pub type Result<T> = std::result::Result<T, TrackerError>;

/// The Error type for tracker operations.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Configuration validation error: {0}")]
    ConfigValidationError(String),

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization/Deserialization error: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("HTTP request error: {source}")]
    RequestError {
        #[from]
        source: reqwest::Error,
    },

    #[error("Upload rejected with status {status}: {body}")]
    UploadRejected { status: u16, body: String },

    #[error("Document '{0}' is not tracked")]
    UnknownDocument(String),

    #[error("Update channel is closed")]
    ChannelClosed,

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

// tungstenite's error is large and carries the HTTP response on handshake
// failures; only its message is kept.
impl From<tokio_tungstenite::tungstenite::Error> for TrackerError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        TrackerError::WebSocketError(err.to_string())
    }
}
