use crate::domain::{conversation_index::ConversationIndex, message::Message, role::Role};

use super::{contracts::ChatTransport, errors::TransportError};

const MARK_READ_FAILED: &str = "MARK_READ_FAILED";

/// Commits read state for the viewer's role.
///
/// Only the unread badge is cleared optimistically; per-message read markers
/// are left to the next server snapshot.
#[derive(Debug, Clone)]
pub struct ReadTracker {
    viewer: Role,
}

impl ReadTracker {
    pub fn new(viewer: Role) -> Self {
        Self { viewer }
    }

    pub fn viewer(&self) -> Role {
        self.viewer
    }

    /// Marks a conversation read when it becomes active. A failure leaves the
    /// badge untouched; the next list poll showing unread triggers a retry.
    pub fn on_opened(
        &self,
        transport: &dyn ChatTransport,
        index: &mut ConversationIndex,
        conversation_id: i64,
    ) -> Result<(), TransportError> {
        match transport.mark_read(conversation_id) {
            Ok(summary) => {
                index.zero_unread(conversation_id);
                tracing::debug!(
                    conversation_id,
                    viewer = self.viewer.as_label(),
                    server_unread = summary.unread_count,
                    "conversation marked read"
                );
                Ok(())
            }
            Err(error) => {
                tracing::warn!(
                    code = MARK_READ_FAILED,
                    conversation_id,
                    error = %error,
                    "mark read failed; badge kept until next poll"
                );
                Err(error)
            }
        }
    }

    /// Re-issues mark-read when the active conversation still reports unread.
    pub fn retry_stale(
        &self,
        transport: &dyn ChatTransport,
        index: &mut ConversationIndex,
        active: Option<i64>,
    ) -> Option<Result<(), TransportError>> {
        let conversation_id = active?;
        let unread = index.get(conversation_id)?.unread_count;
        if unread == 0 {
            return None;
        }

        Some(self.on_opened(transport, index, conversation_id))
    }

    /// Unread messages for the viewer derived from a message list.
    pub fn count_unread(&self, messages: &[Message]) -> u32 {
        let count = messages
            .iter()
            .filter(|message| message.is_unread_for(self.viewer))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}
