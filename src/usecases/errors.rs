use thiserror::Error;

/// Failure of a single call against the chat service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("credential rejected by chat service")]
    Unauthorized,
    #[error("resource no longer visible")]
    NotFound,
    #[error("chat service temporarily unavailable: {0}")]
    Transient(String),
    #[error("chat service returned malformed data: {0}")]
    InvalidData(String),
    #[error("operation not supported by chat service")]
    Unsupported,
}

impl TransportError {
    /// Failures the poller swallows and retries on its next tick.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::InvalidData(_))
    }
}

/// Rejected before any request is issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message body is empty")]
    EmptyBody,
    #[error("message body exceeds {max} characters")]
    BodyTooLong { max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("re-authentication required")]
    Unauthorized,
    #[error("conversation is no longer available")]
    NotFound,
    #[error("chat service temporarily unavailable")]
    TemporarilyUnavailable,
    #[error("operation is not supported by the chat service")]
    Unsupported,
    #[error("no conversation is selected")]
    NoActiveConversation,
    #[error("message is not known to this session")]
    UnknownMessage,
    #[error("message cannot be resent")]
    ResendUnavailable,
    #[error("another change to this message is still in progress")]
    OperationInProgress,
}

impl ChatError {
    pub fn from_transport(error: TransportError) -> Self {
        match error {
            TransportError::Unauthorized => Self::Unauthorized,
            TransportError::NotFound => Self::NotFound,
            TransportError::Transient(_) | TransportError::InvalidData(_) => {
                Self::TemporarilyUnavailable
            }
            TransportError::Unsupported => Self::Unsupported,
        }
    }
}
