use crate::domain::{conversation::Conversation, role::Role};

use super::{
    contracts::{ChatTransport, Page},
    errors::TransportError,
};

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListConversationsQuery {
    pub role: Role,
    pub limit: usize,
    pub offset: usize,
}

impl ListConversationsQuery {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub(crate) fn page(&self) -> Page {
        Page {
            limit: normalized_limit(self.limit),
            offset: self.offset,
        }
    }
}

pub(crate) fn normalized_limit(limit: usize) -> usize {
    match limit {
        0 => DEFAULT_PAGE_SIZE,
        value if value > MAX_PAGE_SIZE => MAX_PAGE_SIZE,
        value => value,
    }
}

pub fn list_conversations(
    source: &dyn ChatTransport,
    query: &ListConversationsQuery,
) -> Result<Vec<Conversation>, TransportError> {
    let page = query.page();
    let conversations = source.list_conversations(query.role, page)?;

    tracing::debug!(
        role = query.role.as_label(),
        limit = page.limit,
        offset = page.offset,
        count = conversations.len(),
        "conversation list fetched"
    );

    Ok(conversations)
}
