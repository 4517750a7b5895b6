//! Merge rules between authoritative server snapshots and client-local state.
//!
//! Both entry points are pure: they take the snapshot and the current local
//! state by reference and return the next local state. Applying the same
//! snapshot twice yields the same result.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    hash::Hash,
};

use super::{
    conversation::Conversation,
    message::{LocalId, Message, MessageLifecycle},
    message_store::{MessageLog, PendingEntry},
};

/// Default tolerance for matching an optimistic send to its confirmed twin.
pub const DEFAULT_MATCH_WINDOW_MS: i64 = 3_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMerge {
    pub conversations: Vec<Conversation>,
    pub inserted: Vec<i64>,
    pub removed: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMerge {
    pub log: MessageLog,
    /// Pending entries that the snapshot confirmed and that were dropped.
    pub absorbed: Vec<LocalId>,
}

pub fn reconcile_conversations(
    snapshot: Vec<Conversation>,
    local: &[Conversation],
) -> ConversationMerge {
    let snapshot = dedupe_last_wins(snapshot, |conversation| conversation.id);
    let snapshot_ids: HashSet<i64> = snapshot.iter().map(|conversation| conversation.id).collect();
    let local_ids: HashSet<i64> = local.iter().map(|conversation| conversation.id).collect();

    let inserted = snapshot
        .iter()
        .map(|conversation| conversation.id)
        .filter(|id| !local_ids.contains(id))
        .collect();
    let removed = local
        .iter()
        .map(|conversation| conversation.id)
        .filter(|id| !snapshot_ids.contains(id))
        .collect();

    // Unread counts come from the snapshot as-is; nothing local is carried over.
    let mut conversations = snapshot;
    sort_by_activity(&mut conversations);

    ConversationMerge {
        conversations,
        inserted,
        removed,
    }
}

/// Most recent activity first; conversations without activity last; ties by id.
pub fn sort_by_activity(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| {
        let by_activity = match (a.last_message_at_ms, b.last_message_at_ms) {
            (Some(left), Some(right)) => right.cmp(&left),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_activity.then_with(|| a.id.cmp(&b.id))
    });
}

pub fn reconcile_messages(snapshot: Vec<Message>, local: &MessageLog, window_ms: i64) -> MessageMerge {
    let mut confirmed: Vec<Message> = snapshot
        .into_iter()
        .filter(|message| message.id.server_id().is_some())
        .map(|mut message| {
            message.lifecycle = MessageLifecycle::Confirmed;
            message
        })
        .collect();
    confirmed = dedupe_last_wins(confirmed, |message| message.id);
    confirmed.sort_by(|a, b| {
        a.created_at_ms
            .cmp(&b.created_at_ms)
            .then_with(|| a.id.server_id().cmp(&b.id.server_id()))
    });

    let previously_known: HashSet<i64> = local
        .confirmed
        .iter()
        .filter_map(|message| message.id.server_id())
        .collect();
    let index_by_id: HashMap<i64, usize> = confirmed
        .iter()
        .enumerate()
        .filter_map(|(index, message)| message.id.server_id().map(|id| (id, index)))
        .collect();

    let mut claimed = vec![false; confirmed.len()];
    let mut absorbed_flags = vec![false; local.pending.len()];

    // Acknowledged sends carry their server id; match those exactly first.
    for (slot, entry) in local.pending.iter().enumerate() {
        let Some(server_id) = entry.acknowledged_id else {
            continue;
        };
        if let Some(&index) = index_by_id.get(&server_id) {
            claimed[index] = true;
            absorbed_flags[slot] = true;
        }
    }

    for (slot, entry) in local.pending.iter().enumerate() {
        if absorbed_flags[slot] {
            continue;
        }

        let twin = confirmed.iter().enumerate().position(|(index, message)| {
            !claimed[index]
                && message
                    .id
                    .server_id()
                    .is_some_and(|id| !previously_known.contains(&id))
                && is_confirmed_twin(entry, message, window_ms)
        });

        if let Some(index) = twin {
            claimed[index] = true;
            absorbed_flags[slot] = true;
        }
    }

    let mut pending = Vec::new();
    let mut absorbed = Vec::new();
    for (entry, was_absorbed) in local.pending.iter().zip(absorbed_flags) {
        if was_absorbed {
            absorbed.push(entry.local_id);
        } else {
            pending.push(entry.clone());
        }
    }
    pending.sort_by_key(|entry| entry.local_id);

    let live_ids: HashSet<i64> = index_by_id.keys().copied().collect();
    let overlays = local
        .overlays
        .iter()
        .filter(|(id, _)| live_ids.contains(id))
        .map(|(id, overlay)| (*id, overlay.clone()))
        .collect();

    MessageMerge {
        log: MessageLog {
            confirmed,
            pending,
            overlays,
        },
        absorbed,
    }
}

fn is_confirmed_twin(entry: &PendingEntry, message: &Message, window_ms: i64) -> bool {
    message.sender_role == entry.sender_role
        && message.body == entry.body
        && (message.created_at_ms - entry.issued_at_ms).abs() <= window_ms
}

/// Drops repeated keys, keeping the position of the first and the value of the last.
fn dedupe_last_wins<T, K, F>(items: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut positions: HashMap<K, usize> = HashMap::new();
    let mut out: Vec<T> = Vec::with_capacity(items.len());

    for item in items {
        match positions.get(&key(&item)) {
            Some(&index) => out[index] = item,
            None => {
                positions.insert(key(&item), out.len());
                out.push(item);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        message::{MessageId, MessageOverlay},
        role::Role,
    };

    const T: i64 = 1_700_000_000_000;

    fn conversation(id: i64, unread_count: u32, last_message_at_ms: Option<i64>) -> Conversation {
        Conversation {
            id,
            counterparty_id: id * 10,
            counterparty_display_name: format!("customer-{id}"),
            last_message_preview: Some("hi".to_owned()),
            last_message_at_ms,
            unread_count,
        }
    }

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

    fn pending(local: u64, sender_role: Role, body: &str, issued_at_ms: i64) -> PendingEntry {
        PendingEntry {
            local_id: LocalId(local),
            conversation_id: 1,
            sender_role,
            body: body.to_owned(),
            issued_at_ms,
            acknowledged_id: None,
            resend_used: false,
            lifecycle: MessageLifecycle::Sending,
        }
    }

    fn log_with_pending(entries: Vec<PendingEntry>) -> MessageLog {
        MessageLog {
            pending: entries,
            ..MessageLog::default()
        }
    }

    #[test]
    fn repeated_conversation_snapshot_keeps_single_entry() {
        let snapshot = vec![conversation(1, 2, Some(T))];

        let first = reconcile_conversations(snapshot.clone(), &[]);
        let second = reconcile_conversations(snapshot, &first.conversations);

        assert_eq!(second.conversations.len(), 1);
        assert_eq!(second.conversations[0].unread_count, 2);
        assert_eq!(first.inserted, vec![1]);
        assert!(second.inserted.is_empty());
    }

    #[test]
    fn conversations_missing_from_snapshot_are_removed() {
        let local = vec![conversation(1, 0, Some(T)), conversation(2, 0, Some(T))];

        let merge = reconcile_conversations(vec![conversation(2, 0, Some(T))], &local);

        assert_eq!(merge.removed, vec![1]);
        assert_eq!(merge.conversations.len(), 1);
    }

    #[test]
    fn unread_count_is_taken_from_snapshot_not_local_state() {
        let local = vec![conversation(1, 0, Some(T))];

        let merge = reconcile_conversations(vec![conversation(1, 5, Some(T))], &local);

        assert_eq!(merge.conversations[0].unread_count, 5);
    }

    #[test]
    fn conversations_are_sorted_by_latest_activity() {
        let snapshot = vec![
            conversation(1, 0, Some(T)),
            conversation(2, 0, None),
            conversation(3, 0, Some(T + 10)),
            conversation(4, 0, Some(T)),
        ];

        let ids: Vec<_> = reconcile_conversations(snapshot, &[])
            .conversations
            .iter()
            .map(|item| item.id)
            .collect();

        assert_eq!(ids, vec![3, 1, 4, 2]);
    }

    #[test]
    fn duplicate_conversation_rows_collapse_to_latest_record() {
        let snapshot = vec![conversation(1, 1, Some(T)), conversation(1, 4, Some(T + 5))];

        let merge = reconcile_conversations(snapshot, &[]);

        assert_eq!(merge.conversations.len(), 1);
        assert_eq!(merge.conversations[0].unread_count, 4);
    }

    #[test]
    fn pending_send_is_replaced_by_confirmed_twin() {
        let local = log_with_pending(vec![pending(9, Role::Customer, "hi", T)]);
        let snapshot = vec![server_message(501, Role::Customer, "hi", T + 1_000)];

        let merge = reconcile_messages(snapshot, &local, DEFAULT_MATCH_WINDOW_MS);

        assert_eq!(merge.log.confirmed.len(), 1);
        assert!(merge.log.pending.is_empty());
        assert_eq!(merge.log.confirmed[0].id, MessageId::Server(501));
        assert_eq!(merge.absorbed, vec![LocalId(9)]);
    }

    #[test]
    fn pending_outside_window_is_kept() {
        let local = log_with_pending(vec![pending(9, Role::Customer, "hi", T)]);
        let snapshot = vec![server_message(501, Role::Customer, "hi", T + 60_000)];

        let merge = reconcile_messages(snapshot, &local, DEFAULT_MATCH_WINDOW_MS);

        assert_eq!(merge.log.confirmed.len(), 1);
        assert_eq!(merge.log.pending.len(), 1);
    }

    #[test]
    fn pending_with_different_sender_or_body_is_kept() {
        let local = log_with_pending(vec![
            pending(1, Role::Customer, "hi", T),
            pending(2, Role::Customer, "hello", T),
        ]);
        let snapshot = vec![
            server_message(501, Role::Employee, "hi", T),
            server_message(502, Role::Customer, "hello there", T),
        ];

        let merge = reconcile_messages(snapshot, &local, DEFAULT_MATCH_WINDOW_MS);

        assert_eq!(merge.log.pending.len(), 2);
        assert!(merge.absorbed.is_empty());
    }

    #[test]
    fn each_confirmed_message_absorbs_at_most_one_pending_entry() {
        let local = log_with_pending(vec![
            pending(1, Role::Customer, "ok", T),
            pending(2, Role::Customer, "ok", T + 10),
        ]);
        let snapshot = vec![server_message(501, Role::Customer, "ok", T + 500)];

        let merge = reconcile_messages(snapshot, &local, DEFAULT_MATCH_WINDOW_MS);

        assert_eq!(merge.absorbed, vec![LocalId(1)]);
        assert_eq!(merge.log.pending.len(), 1);
        assert_eq!(merge.log.pending[0].local_id, LocalId(2));
    }

    #[test]
    fn acknowledged_send_matches_by_server_id_first() {
        let mut acked = pending(2, Role::Customer, "ok", T + 10);
        acked.acknowledged_id = Some(502);
        acked.lifecycle = MessageLifecycle::Sent;
        let local = log_with_pending(vec![pending(1, Role::Customer, "ok", T), acked]);
        let snapshot = vec![server_message(502, Role::Customer, "ok", T + 20)];

        let merge = reconcile_messages(snapshot, &local, DEFAULT_MATCH_WINDOW_MS);

        assert_eq!(merge.absorbed, vec![LocalId(2)]);
        assert_eq!(merge.log.pending[0].local_id, LocalId(1));
    }

    #[test]
    fn previously_known_message_does_not_absorb_a_new_identical_send() {
        let first = reconcile_messages(
            vec![server_message(501, Role::Customer, "ok", T)],
            &MessageLog::default(),
            DEFAULT_MATCH_WINDOW_MS,
        );
        let mut local = first.log;
        local.pending.push(pending(3, Role::Customer, "ok", T + 1_000));

        let merge = reconcile_messages(
            vec![server_message(501, Role::Customer, "ok", T)],
            &local,
            DEFAULT_MATCH_WINDOW_MS,
        );

        assert_eq!(merge.log.pending.len(), 1);
        assert!(merge.absorbed.is_empty());
    }

    #[test]
    fn reconciling_twice_is_idempotent() {
        let local = log_with_pending(vec![
            pending(1, Role::Customer, "hi", T),
            pending(2, Role::Customer, "still there?", T + 100_000),
        ]);
        let snapshot = vec![
            server_message(502, Role::Employee, "hello!", T + 2_000),
            server_message(501, Role::Customer, "hi", T + 500),
        ];

        let once = reconcile_messages(snapshot.clone(), &local, DEFAULT_MATCH_WINDOW_MS);
        let twice = reconcile_messages(snapshot, &once.log, DEFAULT_MATCH_WINDOW_MS);

        assert_eq!(once.log, twice.log);
        assert!(twice.absorbed.is_empty());
    }

    #[test]
    fn merged_messages_are_ordered_confirmed_then_pending() {
        let local = log_with_pending(vec![
            pending(4, Role::Customer, "second", T - 50_000),
            pending(3, Role::Customer, "first", T - 40_000),
        ]);
        let snapshot = vec![
            server_message(20, Role::Employee, "b", T + 5),
            server_message(10, Role::Customer, "a", T),
            server_message(11, Role::Customer, "a2", T),
        ];

        let merge = reconcile_messages(snapshot, &local, DEFAULT_MATCH_WINDOW_MS);
        let ids: Vec<_> = merge
            .log
            .merged()
            .iter()
            .map(|message| message.id.to_string())
            .collect();

        assert_eq!(ids, vec!["10", "11", "20", "local-3", "local-4"]);
    }

    #[test]
    fn duplicate_server_rows_produce_a_single_confirmed_entry() {
        let snapshot = vec![
            server_message(501, Role::Customer, "hi", T),
            server_message(501, Role::Customer, "hi", T),
        ];
        let local = log_with_pending(vec![
            pending(1, Role::Customer, "hi", T),
            pending(2, Role::Customer, "hi", T),
        ]);

        let merge = reconcile_messages(snapshot, &local, DEFAULT_MATCH_WINDOW_MS);
        let with_id = merge
            .log
            .merged()
            .iter()
            .filter(|message| message.id == MessageId::Server(501))
            .count();

        assert_eq!(with_id, 1);
    }

    #[test]
    fn snapshot_replaces_confirmed_and_drops_orphaned_overlays() {
        let mut local = reconcile_messages(
            vec![
                server_message(1, Role::Customer, "a", T),
                server_message(2, Role::Customer, "b", T + 1),
            ],
            &MessageLog::default(),
            DEFAULT_MATCH_WINDOW_MS,
        )
        .log;
        local.overlays.insert(1, MessageOverlay::Recall);
        local.overlays.insert(2, MessageOverlay::Delete);

        let merge = reconcile_messages(
            vec![server_message(1, Role::Customer, "a (edited)", T)],
            &local,
            DEFAULT_MATCH_WINDOW_MS,
        );

        assert_eq!(merge.log.confirmed.len(), 1);
        assert_eq!(merge.log.confirmed[0].body, "a (edited)");
        assert_eq!(merge.log.overlays.len(), 1);
        assert_eq!(
            merge.log.merged()[0].lifecycle,
            MessageLifecycle::PendingRecall
        );
    }
}
