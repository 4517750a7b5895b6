use std::collections::BTreeMap;

use super::{
    message::{LocalId, Message, MessageId, MessageLifecycle, MessageOverlay},
    reconcile::{reconcile_messages, DEFAULT_MATCH_WINDOW_MS},
    role::Role,
};

/// Optimistic send that no snapshot has confirmed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub local_id: LocalId,
    pub conversation_id: i64,
    pub sender_role: Role,
    pub body: String,
    pub issued_at_ms: i64,
    /// Server id returned by the send call, if it already returned.
    pub acknowledged_id: Option<i64>,
    pub resend_used: bool,
    pub lifecycle: MessageLifecycle,
}

impl PendingEntry {
    fn to_message(&self) -> Message {
        Message {
            id: MessageId::Pending(self.local_id),
            conversation_id: self.conversation_id,
            sender_role: self.sender_role,
            body: self.body.clone(),
            created_at_ms: self.issued_at_ms,
            read_at_ms: None,
            lifecycle: self.lifecycle.clone(),
        }
    }
}

/// Reconciled state of one conversation's messages.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageLog {
    /// Snapshot-authoritative messages, ascending by `created_at_ms`.
    pub confirmed: Vec<Message>,
    /// Unconfirmed sends in enqueue order.
    pub pending: Vec<PendingEntry>,
    pub overlays: BTreeMap<i64, MessageOverlay>,
}

impl MessageLog {
    /// Render order: confirmed messages by time, then pending sends by enqueue order.
    pub fn merged(&self) -> Vec<Message> {
        let confirmed = self.confirmed.iter().map(|message| {
            let mut message = message.clone();
            if let Some(overlay) = message
                .id
                .server_id()
                .and_then(|id| self.overlays.get(&id))
            {
                message.lifecycle = overlay.lifecycle();
            }
            message
        });

        confirmed
            .chain(self.pending.iter().map(PendingEntry::to_message))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResendRejection {
    UnknownMessage,
    NotFailed,
    AlreadyResent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageStore {
    conversation_id: Option<i64>,
    log: MessageLog,
    next_local_id: u64,
    match_window_ms: i64,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new(None, DEFAULT_MATCH_WINDOW_MS)
    }
}

impl MessageStore {
    pub fn new(conversation_id: Option<i64>, match_window_ms: i64) -> Self {
        Self {
            conversation_id,
            log: MessageLog::default(),
            next_local_id: 1,
            match_window_ms,
        }
    }

    pub fn conversation_id(&self) -> Option<i64> {
        self.conversation_id
    }

    /// Attaches a store created before its conversation existed.
    pub fn bind(&mut self, conversation_id: i64) {
        self.conversation_id = Some(conversation_id);
        for entry in &mut self.log.pending {
            entry.conversation_id = conversation_id;
        }
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn messages(&self) -> Vec<Message> {
        self.log.merged()
    }

    pub fn pending_count(&self) -> usize {
        self.log.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.confirmed.is_empty() && self.log.pending.is_empty()
    }

    pub fn pending(&self, local_id: LocalId) -> Option<&PendingEntry> {
        self.log
            .pending
            .iter()
            .find(|entry| entry.local_id == local_id)
    }

    pub fn confirmed(&self, server_id: i64) -> Option<&Message> {
        self.log
            .confirmed
            .iter()
            .find(|message| message.id == MessageId::Server(server_id))
    }

    pub fn enqueue_pending(&mut self, sender_role: Role, body: &str, now_ms: i64) -> LocalId {
        let local_id = LocalId(self.next_local_id);
        self.next_local_id += 1;

        self.log.pending.push(PendingEntry {
            local_id,
            conversation_id: self.conversation_id.unwrap_or_default(),
            sender_role,
            body: body.to_owned(),
            issued_at_ms: now_ms,
            acknowledged_id: None,
            resend_used: false,
            lifecycle: MessageLifecycle::Sending,
        });

        local_id
    }

    /// Records the server id of a send; the entry stays until a snapshot shows it.
    pub fn acknowledge(&mut self, local_id: LocalId, server_id: i64) -> bool {
        let Some(entry) = self.pending_mut(local_id) else {
            return false;
        };

        entry.acknowledged_id = Some(server_id);
        entry.lifecycle = MessageLifecycle::Sent;
        true
    }

    pub fn mark_failed(&mut self, local_id: LocalId) -> bool {
        let Some(entry) = self.pending_mut(local_id) else {
            return false;
        };

        entry.lifecycle = MessageLifecycle::Failed {
            resend_available: !entry.resend_used,
        };
        true
    }

    /// Moves a failed entry back to `Sending` for its single manual resend.
    pub fn take_for_resend(
        &mut self,
        local_id: LocalId,
        now_ms: i64,
    ) -> Result<PendingEntry, ResendRejection> {
        let entry = self
            .pending_mut(local_id)
            .ok_or(ResendRejection::UnknownMessage)?;

        match entry.lifecycle {
            MessageLifecycle::Failed {
                resend_available: true,
            } => {}
            MessageLifecycle::Failed {
                resend_available: false,
            } => return Err(ResendRejection::AlreadyResent),
            _ => return Err(ResendRejection::NotFailed),
        }

        entry.resend_used = true;
        entry.issued_at_ms = now_ms;
        entry.lifecycle = MessageLifecycle::Sending;
        Ok(entry.clone())
    }

    pub fn discard_failed(&mut self, local_id: LocalId) -> bool {
        let before = self.log.pending.len();
        self.log
            .pending
            .retain(|entry| !(entry.local_id == local_id && entry.lifecycle.is_failed()));
        self.log.pending.len() != before
    }

    /// Starts an edit/recall/delete overlay; refuses unknown or already overlaid messages.
    pub fn begin_overlay(&mut self, server_id: i64, overlay: MessageOverlay) -> bool {
        if self.confirmed(server_id).is_none() || self.log.overlays.contains_key(&server_id) {
            return false;
        }

        self.log.overlays.insert(server_id, overlay);
        true
    }

    pub fn clear_overlay(&mut self, server_id: i64) {
        self.log.overlays.remove(&server_id);
    }

    pub fn clear_overlays(&mut self) {
        self.log.overlays.clear();
    }

    /// Merges an authoritative snapshot and returns the pending sends it confirmed.
    pub fn reconcile(&mut self, snapshot: Vec<Message>) -> Vec<LocalId> {
        let Some(conversation_id) = self.conversation_id else {
            return Vec::new();
        };

        let total = snapshot.len();
        let snapshot: Vec<Message> = snapshot
            .into_iter()
            .filter(|message| message.conversation_id == conversation_id)
            .collect();
        if snapshot.len() != total {
            tracing::warn!(
                code = "MESSAGE_SNAPSHOT_FOREIGN_ROWS",
                conversation_id,
                dropped = total - snapshot.len(),
                "message snapshot contained rows of another conversation"
            );
        }

        let merge = reconcile_messages(snapshot, &self.log, self.match_window_ms);
        self.log = merge.log;
        merge.absorbed
    }

    fn pending_mut(&mut self, local_id: LocalId) -> Option<&mut PendingEntry> {
        self.log
            .pending
            .iter_mut()
            .find(|entry| entry.local_id == local_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = 1_700_000_000_000;

    fn server_message(id: i64, sender_role: Role, body: &str, created_at_ms: i64) -> Message {
        Message {
            id: MessageId::Server(id),
            conversation_id: 1,
            sender_role,
            body: body.to_owned(),
            created_at_ms,
            read_at_ms: None,
            lifecycle: MessageLifecycle::Confirmed,
        }
    }

    fn store() -> MessageStore {
        MessageStore::new(Some(1), DEFAULT_MATCH_WINDOW_MS)
    }

    #[test]
    fn optimistic_send_is_visible_immediately() {
        let mut store = store();

        let local_id = store.enqueue_pending(Role::Customer, "hi", T);
        let messages = store.messages();

        assert_eq!(local_id, LocalId(1));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, MessageId::Pending(local_id));
        assert_eq!(messages[0].lifecycle, MessageLifecycle::Sending);
    }

    #[test]
    fn pending_send_collapses_into_confirmed_message() {
        let mut store = store();
        let local_id = store.enqueue_pending(Role::Customer, "hi", T);

        let absorbed = store.reconcile(vec![server_message(501, Role::Customer, "hi", T + 1_000)]);
        let messages = store.messages();

        assert_eq!(absorbed, vec![local_id]);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, MessageId::Server(501));
    }

    #[test]
    fn acknowledged_send_waits_for_snapshot() {
        let mut store = store();
        let local_id = store.enqueue_pending(Role::Employee, "on it", T);

        assert!(store.acknowledge(local_id, 77));
        store.reconcile(vec![]);

        assert_eq!(
            store.pending(local_id).map(|entry| entry.lifecycle.clone()),
            Some(MessageLifecycle::Sent)
        );

        store.reconcile(vec![server_message(77, Role::Employee, "on it", T + 9_000)]);
        assert_eq!(store.pending_count(), 0);
        assert!(store.confirmed(77).is_some());
    }

    #[test]
    fn failed_send_offers_exactly_one_resend() {
        let mut store = store();
        let local_id = store.enqueue_pending(Role::Customer, "hello?", T);

        store.mark_failed(local_id);
        assert_eq!(
            store.pending(local_id).map(|entry| entry.lifecycle.clone()),
            Some(MessageLifecycle::Failed {
                resend_available: true
            })
        );

        let entry = store
            .take_for_resend(local_id, T + 5_000)
            .expect("first resend must be allowed");
        assert_eq!(entry.issued_at_ms, T + 5_000);

        store.mark_failed(local_id);
        assert_eq!(
            store.take_for_resend(local_id, T + 9_000),
            Err(ResendRejection::AlreadyResent)
        );
    }

    #[test]
    fn resend_is_rejected_for_in_flight_and_unknown_entries() {
        let mut store = store();
        let local_id = store.enqueue_pending(Role::Customer, "hello?", T);

        assert_eq!(
            store.take_for_resend(local_id, T),
            Err(ResendRejection::NotFailed)
        );
        assert_eq!(
            store.take_for_resend(LocalId(99), T),
            Err(ResendRejection::UnknownMessage)
        );
    }

    #[test]
    fn discard_only_removes_failed_entries() {
        let mut store = store();
        let in_flight = store.enqueue_pending(Role::Customer, "a", T);
        let failed = store.enqueue_pending(Role::Customer, "b", T);
        store.mark_failed(failed);

        assert!(!store.discard_failed(in_flight));
        assert!(store.discard_failed(failed));
        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn overlays_require_a_confirmed_target() {
        let mut store = store();
        store.reconcile(vec![server_message(5, Role::Employee, "typo", T)]);

        assert!(!store.begin_overlay(6, MessageOverlay::Recall));
        assert!(store.begin_overlay(5, MessageOverlay::Recall));
        assert!(!store.begin_overlay(5, MessageOverlay::Delete));
        assert_eq!(store.messages()[0].lifecycle, MessageLifecycle::PendingRecall);

        store.clear_overlays();
        assert_eq!(store.messages()[0].lifecycle, MessageLifecycle::Confirmed);
    }

    #[test]
    fn rows_of_other_conversations_are_ignored() {
        let mut store = store();
        let mut foreign = server_message(9, Role::Customer, "wrong room", T);
        foreign.conversation_id = 2;

        store.reconcile(vec![foreign, server_message(1, Role::Customer, "right", T)]);

        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].body, "right");
    }

    #[test]
    fn unbound_store_ignores_snapshots_until_bound() {
        let mut store = MessageStore::default();
        let local_id = store.enqueue_pending(Role::Customer, "first message", T);

        assert!(store.reconcile(vec![server_message(1, Role::Customer, "x", T)]).is_empty());

        store.bind(1);
        assert_eq!(store.pending(local_id).map(|e| e.conversation_id), Some(1));
        let absorbed = store.reconcile(vec![server_message(1, Role::Customer, "first message", T)]);
        assert_eq!(absorbed, vec![local_id]);
    }
}
