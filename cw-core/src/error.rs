use thiserror::Error;

/// Error raised by the lifecycle entry points.
///
/// Variants are semantic rather than source-tagged: the dispatcher only
/// needs [`LifecycleError::status_code`] to answer a request, and async
/// failure paths (handler, deletion, watcher) report through the status
/// controller or the event bus instead of through this type.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("handler failed: {0}")]
    HandlerFailure(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Internal(String),
}

impl LifecycleError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Maps the error onto the numeric code reported to the controller.
    ///
    /// `ENOENT` surfaces as 404 wherever it bubbles up from; a conflicting
    /// re-creation is a malformed request, not its own code.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::Conflict(_) => 400,
            Self::NotFound(_) => 404,
            Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound => 404,
            Self::Io(_) | Self::HandlerFailure(_) | Self::Internal(_) => 500,
        }
    }
}

impl From<anyhow::Error> for LifecycleError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<std::io::Error>() {
            Ok(io) => Self::Io(io),
            Err(other) => Self::Internal(other.to_string()),
        }
    }
}
