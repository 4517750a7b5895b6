use std::fmt;

use super::role::Role;

/// Client-generated identifier of a message the server has not confirmed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub u64);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageId {
    Server(i64),
    Pending(LocalId),
}

impl MessageId {
    pub fn server_id(self) -> Option<i64> {
        match self {
            Self::Server(id) => Some(id),
            Self::Pending(_) => None,
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(id) => write!(f, "{id}"),
            Self::Pending(local) => write!(f, "{local}"),
        }
    }
}

/// Delivery and overlay state of a message as seen by this client.
///
/// Every `Pending*` variant stands for a server operation that is still
/// outstanding; the UI must not present it as done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageLifecycle {
    /// Optimistic entry, send request in flight.
    Sending,
    /// Send acknowledged by the server, not yet seen in a snapshot.
    Sent,
    /// Present in the latest server snapshot.
    Confirmed,
    PendingEdit { body: String },
    PendingRecall,
    PendingDelete,
    /// Send failed; one manual resend may be offered.
    Failed { resend_available: bool },
}

impl MessageLifecycle {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Confirmed => "confirmed",
            Self::PendingEdit { .. } => "editing",
            Self::PendingRecall => "recalling",
            Self::PendingDelete => "deleting",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Client-local overlay on a confirmed message while its server
/// operation is outstanding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOverlay {
    Edit { body: String },
    Recall,
    Delete,
}

impl MessageOverlay {
    pub fn lifecycle(&self) -> MessageLifecycle {
        match self {
            Self::Edit { body } => MessageLifecycle::PendingEdit { body: body.clone() },
            Self::Recall => MessageLifecycle::PendingRecall,
            Self::Delete => MessageLifecycle::PendingDelete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: i64,
    pub sender_role: Role,
    pub body: String,
    pub created_at_ms: i64,
    /// Read marker for the recipient role; `None` means unread.
    pub read_at_ms: Option<i64>,
    pub lifecycle: MessageLifecycle,
}

impl Message {
    pub fn is_unread_for(&self, viewer: Role) -> bool {
        self.sender_role == viewer.opposite() && self.read_at_ms.is_none()
    }
}
