#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AdsHeaderError {
    #[error("Unexpected length: expected {expected} bytes, got {got} bytes")]
    UnexpectedLength { expected: usize, got: usize },

    #[error("ADS header declares {declared} body bytes but {got} are present")]
    BodyLengthMismatch { declared: usize, got: usize },
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AdsCommandError {
    #[error("Unexpected length: expected {expected} bytes, got {got}")]
    UnexpectedLength { expected: usize, got: usize },
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StateFlagError {
    #[error("Unexpected length: expected {expected} bytes, got {got}")]
    UnexpectedLength { expected: usize, got: usize },
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AdsStateError {
    #[error("Unexpected length: expected {expected} bytes, got {got}")]
    UnexpectedLength { expected: usize, got: usize },
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum NotificationHandleError {
    #[error("Unexpected length: expected {expected} bytes, got {got}")]
    UnexpectedLength { expected: usize, got: usize },
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TransModeError {
    #[error("Unexpected length: expected {expected} bytes, got {got}")]
    UnexpectedLength { expected: usize, got: usize },
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum FileTimeError {
    #[error("Unexpected length: expected {expected} bytes, got {got}")]
    UnexpectedLength { expected: usize, got: usize },
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AdsStringError {
    #[error("Buffer too small for string field: expected {expected}, found {found}")]
    BufferTooSmall { expected: usize, found: usize },

    #[error("Encoded string does not fit field: capacity {capacity}, got {got}")]
    TooLong { capacity: usize, got: usize },
}

/// Errors from the ADS header and primitive layer.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AdsError {
    #[error("Unexpected data length: expected {expected} bytes, got {got}")]
    UnexpectedDataLength { expected: usize, got: usize },

    #[error("ADS header error: {0}")]
    Header(#[from] AdsHeaderError),

    #[error("Invalid ADS command: {0}")]
    Command(#[from] AdsCommandError),

    #[error("Invalid state flags: {0}")]
    StateFlag(#[from] StateFlagError),

    #[error("Invalid ADS state: {0}")]
    State(#[from] AdsStateError),

    #[error("Invalid notification handle: {0}")]
    NotificationHandle(#[from] NotificationHandleError),

    #[error("Invalid transmission mode: {0}")]
    TransMode(#[from] TransModeError),

    #[error("Invalid timestamp: {0}")]
    FileTime(#[from] FileTimeError),

    #[error("Invalid string field: {0}")]
    String(#[from] AdsStringError),
}
