use std::collections::HashMap;

use super::{
    conversation::Conversation,
    reconcile::{reconcile_conversations, ConversationMerge},
    role::Role,
};

/// Conversations visible to one role, most recent activity first.
///
/// Locally hidden conversations stay in the index (so reconciliation keeps
/// tracking them) but are filtered from [`ConversationIndex::conversations`]
/// until the server reports newer activity than was known when hiding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationIndex {
    role: Role,
    conversations: Vec<Conversation>,
    hidden: HashMap<i64, Option<i64>>,
}

impl ConversationIndex {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            conversations: Vec::new(),
            hidden: HashMap::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn conversations(&self) -> Vec<&Conversation> {
        self.conversations
            .iter()
            .filter(|conversation| !self.hidden.contains_key(&conversation.id))
            .collect()
    }

    pub fn get(&self, id: i64) -> Option<&Conversation> {
        self.conversations
            .iter()
            .find(|conversation| conversation.id == id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.get(id).is_some()
    }

    pub fn is_hidden(&self, id: i64) -> bool {
        self.hidden.contains_key(&id)
    }

    pub fn total_unread(&self) -> u32 {
        self.conversations()
            .iter()
            .map(|conversation| conversation.unread_count)
            .sum()
    }

    pub fn reconcile(&mut self, snapshot: Vec<Conversation>) -> ConversationMerge {
        let merge = reconcile_conversations(snapshot, &self.conversations);
        self.conversations = merge.conversations.clone();

        let conversations = &self.conversations;
        self.hidden.retain(|id, hidden_at| {
            conversations
                .iter()
                .find(|conversation| conversation.id == *id)
                .is_some_and(|conversation| !has_newer_activity(conversation, *hidden_at))
        });

        merge
    }

    /// Optimistically clears the unread badge after a successful mark-read.
    pub fn zero_unread(&mut self, id: i64) -> bool {
        match self
            .conversations
            .iter_mut()
            .find(|conversation| conversation.id == id)
        {
            Some(conversation) => {
                conversation.unread_count = 0;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: i64) -> bool {
        self.hidden.remove(&id);
        let before = self.conversations.len();
        self.conversations.retain(|conversation| conversation.id != id);
        self.conversations.len() != before
    }

    /// Hides a conversation until it shows activity newer than what is known now.
    pub fn hide(&mut self, id: i64) -> bool {
        let Some(last_activity) = self.get(id).map(|conversation| conversation.last_message_at_ms)
        else {
            return false;
        };

        self.hidden.insert(id, last_activity);
        true
    }
}

fn has_newer_activity(conversation: &Conversation, hidden_at: Option<i64>) -> bool {
    match (conversation.last_message_at_ms, hidden_at) {
        (Some(current), Some(known)) => current > known,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
