//! Error types for the kiosk voice ordering engine.

/// Top-level error type for the voice ordering system.
#[derive(Debug, thiserror::Error)]
pub enum KioskError {
    /// Speech capture device or permission error.
    #[error("speech capture error: {0}")]
    SpeechCapture(String),

    /// The remote intent classifier did not answer within the timeout.
    #[error("classifier timeout after {0} ms")]
    ClassifierTimeout(u64),

    /// The remote intent classifier rejected the request for rate reasons.
    #[error("classifier rate limited")]
    ClassifierRateLimited,

    /// The remote classifier replied but the body could not be understood.
    #[error("malformed classifier response: {0}")]
    ClassifierMalformed(String),

    /// Network-level failure talking to a remote collaborator.
    #[error("transport error: {0}")]
    Transport(String),

    /// An ordered menu item does not exist in the current menu.
    #[error("menu item not found: {0}")]
    MenuItemNotFound(String),

    /// The order backend refused or failed the submission.
    #[error("order submission failed: {0}")]
    OrderSubmission(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, KioskError>;
