use crate::domain::{conversation::Conversation, message::Message, role::Role};

use super::errors::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// `None` lets the service open a new conversation (first customer message).
    pub conversation_id: Option<i64>,
    pub receiver_id: Option<i64>,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadSummary {
    pub conversation_id: i64,
    pub unread_count: u32,
}

/// Optional server operations; the UI offers an affordance only when set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransportCapabilities {
    pub archive: bool,
    pub edit: bool,
    pub recall: bool,
    pub delete: bool,
}

/// Request layer over the conversation/message service.
pub trait ChatTransport: Send + Sync {
    fn list_conversations(&self, role: Role, page: Page)
        -> Result<Vec<Conversation>, TransportError>;

    fn list_messages(&self, conversation_id: i64, page: Page)
        -> Result<Vec<Message>, TransportError>;

    /// Returns the server-confirmed message with its real id and timestamp.
    fn send(&self, message: &OutgoingMessage) -> Result<Message, TransportError>;

    fn mark_read(&self, conversation_id: i64) -> Result<ReadSummary, TransportError>;

    fn capabilities(&self) -> TransportCapabilities {
        TransportCapabilities::default()
    }

    fn archive_conversation(&self, _conversation_id: i64) -> Result<(), TransportError> {
        Err(TransportError::Unsupported)
    }

    fn edit_message(
        &self,
        _conversation_id: i64,
        _message_id: i64,
        _body: &str,
    ) -> Result<(), TransportError> {
        Err(TransportError::Unsupported)
    }

    fn recall_message(&self, _conversation_id: i64, _message_id: i64) -> Result<(), TransportError> {
        Err(TransportError::Unsupported)
    }

    fn delete_message(&self, _conversation_id: i64, _message_id: i64) -> Result<(), TransportError> {
        Err(TransportError::Unsupported)
    }
}

/// External owner of the bearer credential and of re-authentication.
pub trait AuthCollaborator: Send + Sync {
    fn bearer_token(&self) -> Option<String>;

    /// Called once per rejected credential; the chat core never retries these.
    fn on_unauthorized(&self);
}

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}
