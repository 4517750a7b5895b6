use crate::domain::message::Message;

use super::{
    contracts::{ChatTransport, Page},
    errors::TransportError,
    list_conversations::normalized_limit,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadMessagesQuery {
    pub conversation_id: i64,
    pub limit: usize,
    pub offset: usize,
}

impl LoadMessagesQuery {
    pub fn new(conversation_id: i64, limit: usize) -> Self {
        Self {
            conversation_id,
            limit,
            offset: 0,
        }
    }

    fn page(&self) -> Page {
        Page {
            limit: normalized_limit(self.limit),
            offset: self.offset,
        }
    }
}

pub fn load_messages(
    source: &dyn ChatTransport,
    query: &LoadMessagesQuery,
) -> Result<Vec<Message>, TransportError> {
    source.list_messages(query.conversation_id, query.page())
}
