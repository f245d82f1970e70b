use crate::slots::CaptureMode;
use thiserror::Error;

/// Result type for panel operations
pub type PanelResult<T> = Result<T, PanelError>;

/// Text shown when the capture service cannot be reached or answers garbage
pub const TRANSPORT_FAILURE_MESSAGE: &str = "Capture service unavailable";

/// Errors that can occur while driving the capture service
#[derive(Debug, Error)]
pub enum PanelError {
    /// Backend unreachable or response malformed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Structured `success: false` answer from the backend
    #[error("Backend rejected request: {0}")]
    Rejected(String),

    #[error("Device is not connected")]
    NotConnected,

    #[error("Device is already connected")]
    AlreadyConnected,

    #[error("Another capture is still in progress")]
    CaptureInProgress,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// More results than display slots for the capture mode
    #[error("No slot for index {index} in {mode} mode")]
    SlotOverflow { mode: CaptureMode, index: usize },

    /// The session was torn down while the operation was in flight
    #[error("Device disconnected during operation")]
    Disconnected,

    #[error("Push channel protocol error: {0}")]
    Protocol(String),

    #[error("Nothing to save: {0}")]
    NothingToSave(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PanelError {
    /// Text for the transient notification shown to the operator.
    pub fn user_message(&self) -> String {
        match self {
            PanelError::Transport(_) => TRANSPORT_FAILURE_MESSAGE.to_string(),
            PanelError::Rejected(message) => message.clone(),
            other => other.to_string(),
        }
    }

    /// Failures that came back from (or on the way to) the backend.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, PanelError::Transport(_) | PanelError::Rejected(_))
    }
}

impl From<reqwest::Error> for PanelError {
    fn from(err: reqwest::Error) -> Self {
        PanelError::Transport(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for PanelError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        PanelError::Transport(err.to_string())
    }
}
