/// Top-level error type for the public client API.
///
/// Failures that happen while a stream is being read never surface here; they
/// are delivered in-band as `AgentEvent::StreamError`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration (base URL, HTTP client setup).
    #[error("config error: {0}")]
    Config(String),
    /// Invalid caller input, rejected before any request is sent.
    #[error("validation error: {0}")]
    Validation(String),
    /// The request could not be sent or the response could not be read.
    #[error("transport error: {0}")]
    Transport(String),
    /// The backend answered with a non-success HTTP status.
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    /// A non-streaming response body did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// The stream was cancelled through its `AbortHandle`.
    #[error("cancelled")]
    Cancelled,
    /// Internal invariant violation (for example a lost read task).
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    pub(crate) fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub(crate) fn status(status: reqwest::StatusCode) -> Self {
        Self::Status {
            status: status.as_u16(),
            message: status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_string(),
        }
    }

    /// Text used for the `StreamError` event when this error ends a stream.
    pub(crate) fn stream_message(&self) -> String {
        match self {
            Self::Status { status, message } => format!("HTTP error {status}: {message}"),
            Self::Transport(message) => format!("connection failed: {message}"),
            other => other.to_string(),
        }
    }
}
