//! Plain-text rendering of session state for the command line.

use chrono::DateTime;

use crate::{
    domain::{
        conversation::Conversation,
        message::{Message, MessageLifecycle},
        notifications::{Notification, NotificationLevel},
        role::Role,
        scope_state::ScopeUiState,
        sync_health::SyncStatus,
    },
    usecases::{poller::PollSlot, session::ChatSessionController},
};

pub fn timestamp(ms: Option<i64>) -> String {
    ms.and_then(DateTime::from_timestamp_millis)
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_owned())
}

pub fn conversation_line(conversation: &Conversation, active: bool) -> String {
    let marker = if active { '>' } else { ' ' };
    let badge = if conversation.unread_count > 0 {
        format!(" [{}]", conversation.unread_count)
    } else {
        String::new()
    };

    format!(
        "{marker} #{} {}{} {} {}",
        conversation.id,
        conversation.counterparty_display_name,
        badge,
        timestamp(conversation.last_message_at_ms),
        conversation.preview_line()
    )
    .trim_end()
    .to_owned()
}

pub fn message_line(message: &Message, viewer: Role) -> String {
    let author = if message.sender_role == viewer {
        "you"
    } else {
        message.sender_role.as_label()
    };
    let state = match &message.lifecycle {
        MessageLifecycle::Confirmed => String::new(),
        MessageLifecycle::Failed {
            resend_available: true,
        } => format!(" ({} failed, `resend {}`)", message.id, message.id),
        MessageLifecycle::PendingEdit { body } => format!(" (editing to: {body})"),
        other => format!(" ({})", other.as_label()),
    };

    format!(
        "  {} {author}: {}{state}",
        timestamp(Some(message.created_at_ms)),
        message.body
    )
}

fn scope_label(state: ScopeUiState) -> &'static str {
    match state {
        ScopeUiState::Idle => "idle",
        ScopeUiState::Loading => "loading",
        ScopeUiState::Ready => "ready",
        ScopeUiState::Empty => "empty",
        ScopeUiState::Error => "error",
    }
}

pub fn sync_line(slot_label: &str, status: SyncStatus) -> Option<String> {
    match status {
        SyncStatus::Healthy => None,
        SyncStatus::Retrying {
            since_last_success_ms: Some(elapsed),
            ..
        } => Some(format!(
            "{slot_label}: last updated {} seconds ago, retrying",
            elapsed / 1_000
        )),
        SyncStatus::Retrying { failures, .. } => {
            Some(format!("{slot_label}: not loaded yet, retrying ({failures} failures)"))
        }
    }
}

fn notification_line(notification: &Notification) -> String {
    let level = match notification.level {
        NotificationLevel::Info => "info",
        NotificationLevel::Warning => "warn",
        NotificationLevel::Error => "error",
    };

    format!("! [{level} #{}] {}", notification.id, notification.text)
}

/// Full screen of the session; printed again whenever it changes.
pub fn snapshot(session: &ChatSessionController) -> String {
    let mut lines = Vec::new();
    let active = session.active_conversation_id();

    if session.role() == Role::Employee {
        lines.push(format!(
            "== conversations ({}) ==",
            scope_label(session.list_state().ui_state())
        ));
        lines.extend(
            session
                .conversations()
                .into_iter()
                .map(|conversation| conversation_line(conversation, Some(conversation.id) == active)),
        );
    }

    let title = match (session.active_conversation(), active) {
        (Some(conversation), _) => format!(
            "#{} {}",
            conversation.id, conversation.counterparty_display_name
        ),
        (None, Some(id)) => format!("conversation #{id}"),
        (None, None) => "no conversation".to_owned(),
    };
    let unread = match session.unread_total() {
        0 => String::new(),
        count => format!(" [{count} unread]"),
    };
    lines.push(format!(
        "== {title}{unread} ({}) ==",
        scope_label(session.messages_state().ui_state())
    ));
    lines.extend(
        session
            .messages()
            .iter()
            .map(|message| message_line(message, session.role())),
    );

    lines.extend(sync_line("list", session.sync_health(PollSlot::ConversationList)));
    lines.extend(sync_line("messages", session.sync_health(PollSlot::ActiveMessages)));
    lines.extend(session.notifications().iter().map(notification_line));

    lines.join("\n")
}
