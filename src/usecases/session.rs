//! Chat session orchestration for one UI role.
//!
//! The controller is a plain state owner: every network call goes through
//! the injected [`ChatTransport`], and polling results re-enter through
//! [`ChatSessionController::apply`], which drops results whose timer was
//! stopped or replaced in the meantime. Callers that want fetches to run
//! outside a lock use the split `begin_*`/`run`/`apply`/`finish_*` forms;
//! the one-shot helpers ([`ChatSessionController::run_due`],
//! [`ChatSessionController::send`]) run them inline.

use std::{collections::HashMap, sync::Arc};

use crate::domain::{
    conversation::Conversation,
    conversation_index::ConversationIndex,
    message::{LocalId, Message, MessageOverlay},
    message_store::{MessageStore, ResendRejection},
    notifications::{Notification, NotificationLevel, NotificationQueue},
    reconcile::DEFAULT_MATCH_WINDOW_MS,
    role::Role,
    scope_state::ScopeStatus,
    sync_health::{SyncHealth, SyncStatus},
};

use super::{
    contracts::{AuthCollaborator, ChatTransport, Clock, OutgoingMessage, TransportCapabilities},
    errors::{ChatError, TransportError},
    list_conversations::{list_conversations, ListConversationsQuery, DEFAULT_PAGE_SIZE},
    load_messages::{load_messages, LoadMessagesQuery},
    open_signal::{OpenSignal, WidgetRequest},
    poller::{PollScope, PollSlot, Poller, TickTicket, DEFAULT_POLL_INTERVAL_MS},
    read_tracker::ReadTracker,
    send_message::{send_message, validate_body, DEFAULT_MAX_BODY_CHARS},
};

const AUTH_REQUIRED: &str = "CHAT_AUTH_REQUIRED";
const POLL_FAILED: &str = "CHAT_POLL_FAILED";
const POLL_RESULT_DISCARDED: &str = "CHAT_POLL_RESULT_DISCARDED";
const SEND_FAILED: &str = "CHAT_SEND_FAILED";
const SYNC_DEGRADED: &str = "CHAT_SYNC_DEGRADED";
const MESSAGE_OPERATION_FAILED: &str = "CHAT_MESSAGE_OPERATION_FAILED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub poll_interval_ms: i64,
    pub match_window_ms: i64,
    pub failure_threshold: u32,
    pub max_body_chars: usize,
    pub page_size: usize,
    pub notification_ttl_ms: i64,
    pub max_notifications: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            match_window_ms: DEFAULT_MATCH_WINDOW_MS,
            failure_threshold: crate::domain::sync_health::DEFAULT_FAILURE_THRESHOLD,
            max_body_chars: DEFAULT_MAX_BODY_CHARS,
            page_size: DEFAULT_PAGE_SIZE,
            notification_ttl_ms: crate::domain::notifications::DEFAULT_NOTIFICATION_TTL_MS,
            max_notifications: crate::domain::notifications::DEFAULT_MAX_VISIBLE,
        }
    }
}

/// How a conversation removal was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HideOutcome {
    /// The service archived it; it will not come back.
    Archived,
    /// Hidden on this client only; it reappears when new activity arrives.
    HiddenUntilNewActivity,
}

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Conversations(Result<Vec<Conversation>, TransportError>),
    Messages(Result<Vec<Message>, TransportError>),
}

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub ticket: TickTicket,
    pub outcome: FetchOutcome,
}

/// One poll request, detached from the controller so it can run unlocked.
pub struct PendingFetch {
    ticket: TickTicket,
    role: Role,
    page_size: usize,
    transport: Arc<dyn ChatTransport>,
}

impl PendingFetch {
    pub fn ticket(&self) -> TickTicket {
        self.ticket
    }

    pub fn run(self) -> FetchResult {
        let source = self.transport.as_ref();
        let outcome = match self.ticket.scope {
            PollScope::ConversationList => FetchOutcome::Conversations(list_conversations(
                source,
                &ListConversationsQuery::new(self.role).with_limit(self.page_size),
            )),
            PollScope::Messages(conversation_id) => FetchOutcome::Messages(load_messages(
                source,
                &LoadMessagesQuery::new(conversation_id, self.page_size),
            )),
        };

        FetchResult {
            ticket: self.ticket,
            outcome,
        }
    }
}

/// Where an optimistic entry lives: a known conversation, or the customer's
/// draft store before the first send created the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreKey {
    Conversation(i64),
    Draft,
}

pub struct OutgoingSend {
    key: StoreKey,
    local_id: LocalId,
    message: OutgoingMessage,
    transport: Arc<dyn ChatTransport>,
}

impl OutgoingSend {
    pub fn local_id(&self) -> LocalId {
        self.local_id
    }

    pub fn run(self) -> SendResult {
        let result = send_message(self.transport.as_ref(), &self.message);
        SendResult {
            key: self.key,
            local_id: self.local_id,
            result,
        }
    }
}

pub struct SendResult {
    key: StoreKey,
    local_id: LocalId,
    result: Result<Message, TransportError>,
}

pub struct ChatSessionController {
    role: Role,
    transport: Arc<dyn ChatTransport>,
    auth: Arc<dyn AuthCollaborator>,
    clock: Arc<dyn Clock>,
    settings: SessionSettings,
    poller: Poller,
    index: ConversationIndex,
    stores: HashMap<i64, MessageStore>,
    draft: MessageStore,
    draft_bound_to: Option<i64>,
    active: Option<i64>,
    list_state: ScopeStatus,
    messages_state: ScopeStatus,
    list_health: SyncHealth,
    messages_health: SyncHealth,
    read_tracker: ReadTracker,
    notifications: NotificationQueue,
    open: bool,
    open_signal: Option<OpenSignal>,
}

impl ChatSessionController {
    /// Support console: conversation list plus one active conversation.
    pub fn employee_console(
        transport: Arc<dyn ChatTransport>,
        auth: Arc<dyn AuthCollaborator>,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
    ) -> Self {
        Self::new(Role::Employee, transport, auth, clock, settings, None)
    }

    /// Storefront widget: one implicit conversation, opened through `open_signal`.
    pub fn customer_widget(
        transport: Arc<dyn ChatTransport>,
        auth: Arc<dyn AuthCollaborator>,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
        open_signal: Option<OpenSignal>,
    ) -> Self {
        Self::new(Role::Customer, transport, auth, clock, settings, open_signal)
    }

    fn new(
        role: Role,
        transport: Arc<dyn ChatTransport>,
        auth: Arc<dyn AuthCollaborator>,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
        open_signal: Option<OpenSignal>,
    ) -> Self {
        Self {
            role,
            transport,
            auth,
            clock,
            poller: Poller::new(settings.poll_interval_ms),
            index: ConversationIndex::new(role),
            stores: HashMap::new(),
            draft: MessageStore::new(None, settings.match_window_ms),
            draft_bound_to: None,
            active: None,
            list_state: ScopeStatus::default(),
            messages_state: ScopeStatus::default(),
            list_health: SyncHealth::new(settings.failure_threshold),
            messages_health: SyncHealth::new(settings.failure_threshold),
            read_tracker: ReadTracker::new(role),
            notifications: NotificationQueue::new(
                settings.notification_ttl_ms,
                settings.max_notifications,
            ),
            open: false,
            open_signal,
            settings,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn capabilities(&self) -> TransportCapabilities {
        self.transport.capabilities()
    }

    pub fn active_conversation_id(&self) -> Option<i64> {
        self.active
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.active.and_then(|id| self.index.get(id))
    }

    pub fn conversations(&self) -> Vec<&Conversation> {
        self.index.conversations()
    }

    /// Messages of the active conversation in render order.
    pub fn messages(&self) -> Vec<Message> {
        match self.active {
            Some(id) => self
                .stores
                .get(&id)
                .map(MessageStore::messages)
                .unwrap_or_default(),
            None => self.draft.messages(),
        }
    }

    pub fn unread_total(&self) -> u32 {
        match self.role {
            Role::Employee => self.index.total_unread(),
            Role::Customer => self.read_tracker.count_unread(&self.messages()),
        }
    }

    pub fn list_state(&self) -> &ScopeStatus {
        &self.list_state
    }

    pub fn messages_state(&self) -> &ScopeStatus {
        &self.messages_state
    }

    pub fn sync_health(&self, slot: PollSlot) -> SyncStatus {
        let now = self.now();
        match slot {
            PollSlot::ConversationList => self.list_health.status(now),
            PollSlot::ActiveMessages => self.messages_health.status(now),
        }
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.visible(self.now())
    }

    pub fn dismiss_notification(&mut self, id: u64) {
        self.notifications.dismiss(id);
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    /// Starts polling and performs the first fetch without waiting for a tick.
    pub fn open(&mut self) -> Result<(), ChatError> {
        if self.open {
            return Ok(());
        }
        self.open = true;

        if self.role == Role::Customer {
            if let Some(conversation_id) = self.active {
                return self.activate(conversation_id);
            }
        }

        let now = self.now();
        self.poller.start(PollScope::ConversationList, now);
        self.list_state.begin_load();
        self.fetch_now(PollSlot::ConversationList)?;

        // A reopened console resumes the conversation it still shows.
        match self.active {
            Some(conversation_id) if self.role == Role::Employee => self.activate(conversation_id),
            _ => Ok(()),
        }
    }

    /// Stops every poller; results still in flight are discarded on arrival.
    pub fn close(&mut self) {
        self.poller.stop_all();
        self.open = false;
        self.list_state.settle();
        self.messages_state.settle();
        for store in self.stores.values_mut() {
            store.clear_overlays();
        }

        tracing::debug!(role = self.role.as_label(), "chat session closed");
    }

    /// Applies the latest open/close request from the host page, if any.
    pub fn poll_open_requests(&mut self) -> Result<(), ChatError> {
        let Some(request) = self.open_signal.as_ref().and_then(OpenSignal::latest) else {
            return Ok(());
        };

        match request {
            WidgetRequest::Open => self.open(),
            WidgetRequest::Close => {
                self.close();
                Ok(())
            }
        }
    }

    pub fn select_conversation(&mut self, conversation_id: i64) -> Result<(), ChatError> {
        if self.role != Role::Employee {
            return Err(ChatError::Unsupported);
        }

        if !self.index.contains(conversation_id) {
            return Err(ChatError::NotFound);
        }

        let already_polling =
            self.poller.scope(PollSlot::ActiveMessages) == Some(PollScope::Messages(conversation_id));
        if self.active == Some(conversation_id) && already_polling {
            return Ok(());
        }

        self.activate(conversation_id)
    }

    /// One scheduler pass with fetches run inline.
    pub fn run_due(&mut self) -> Result<(), ChatError> {
        self.poll_open_requests()?;

        for fetch in self.begin_due() {
            let result = fetch.run();
            self.apply(result)?;
        }

        Ok(())
    }

    /// Hands out the fetches whose timers are due.
    pub fn begin_due(&mut self) -> Vec<PendingFetch> {
        let now = self.now();
        self.notifications.expire(now);

        self.poller
            .due(now)
            .into_iter()
            .map(|ticket| {
                self.scope_status_mut(ticket.scope.slot()).begin_load();
                self.pending_fetch(ticket)
            })
            .collect()
    }

    pub fn apply(&mut self, result: FetchResult) -> Result<(), ChatError> {
        if !self.poller.complete(&result.ticket) {
            tracing::debug!(
                code = POLL_RESULT_DISCARDED,
                scope = ?result.ticket.scope,
                "discarding result of a stopped or replaced poll"
            );
            return Ok(());
        }

        match (result.ticket.scope, result.outcome) {
            (PollScope::ConversationList, FetchOutcome::Conversations(Ok(snapshot))) => {
                self.apply_conversations(snapshot)
            }
            (PollScope::Messages(conversation_id), FetchOutcome::Messages(Ok(snapshot))) => {
                self.apply_messages(conversation_id, snapshot)
            }
            (scope, FetchOutcome::Conversations(Err(error)) | FetchOutcome::Messages(Err(error))) => {
                self.handle_fetch_failure(scope, error)
            }
            (scope, _) => {
                tracing::warn!(scope = ?scope, "poll result does not match its scope; ignored");
                Ok(())
            }
        }
    }

    /// Validates, inserts the optimistic entry, and returns the request to run.
    pub fn begin_send(&mut self, body: &str) -> Result<OutgoingSend, ChatError> {
        let body = validate_body(body, self.settings.max_body_chars)?;

        let key = match (self.role, self.active) {
            (_, Some(conversation_id)) => StoreKey::Conversation(conversation_id),
            (Role::Customer, None) => StoreKey::Draft,
            (Role::Employee, None) => return Err(ChatError::NoActiveConversation),
        };
        let conversation_id = self.active;
        let receiver_id = conversation_id
            .and_then(|id| self.index.get(id))
            .map(|conversation| conversation.counterparty_id);

        let now = self.now();
        let role = self.role;
        let local_id = self.store_mut(key).enqueue_pending(role, &body, now);

        Ok(OutgoingSend {
            key,
            local_id,
            message: OutgoingMessage {
                conversation_id,
                receiver_id,
                body,
            },
            transport: Arc::clone(&self.transport),
        })
    }

    pub fn finish_send(&mut self, sent: SendResult) -> Result<LocalId, ChatError> {
        let SendResult {
            key,
            local_id,
            result,
        } = sent;

        match result {
            Ok(confirmed) => {
                let bound_now = key == StoreKey::Draft && self.draft_bound_to.is_none();
                if bound_now {
                    self.bind_draft(confirmed.conversation_id);
                }

                match confirmed.id.server_id() {
                    Some(server_id) => {
                        if !self.store_mut(key).acknowledge(local_id, server_id) {
                            tracing::debug!(
                                local_id = %local_id,
                                server_id,
                                "send acknowledged after snapshot already confirmed it"
                            );
                        }
                    }
                    None => tracing::warn!(
                        local_id = %local_id,
                        "chat service returned a message without server id"
                    ),
                }

                if bound_now && self.open {
                    self.activate(confirmed.conversation_id)?;
                }

                Ok(local_id)
            }
            Err(error) => {
                self.store_mut(key).mark_failed(local_id);
                tracing::warn!(
                    code = SEND_FAILED,
                    local_id = %local_id,
                    error = %error,
                    "message send failed; kept for manual resend"
                );

                if error == TransportError::Unauthorized {
                    return Err(self.handle_unauthorized());
                }

                let now = self.now();
                self.notifications
                    .push(NotificationLevel::Error, "Message could not be sent", now);
                Err(ChatError::from_transport(error))
            }
        }
    }

    /// Optimistic send; the poll timer is left untouched.
    pub fn send(&mut self, body: &str) -> Result<LocalId, ChatError> {
        let outgoing = self.begin_send(body)?;
        let result = outgoing.run();
        self.finish_send(result)
    }

    /// The single manual retry offered for a failed send.
    pub fn resend(&mut self, local_id: LocalId) -> Result<LocalId, ChatError> {
        let key = self.active_key();
        let now = self.now();
        let entry = self
            .store_mut(key)
            .take_for_resend(local_id, now)
            .map_err(|rejection| match rejection {
                ResendRejection::UnknownMessage => ChatError::UnknownMessage,
                ResendRejection::NotFailed | ResendRejection::AlreadyResent => {
                    ChatError::ResendUnavailable
                }
            })?;

        let outgoing = OutgoingSend {
            key,
            local_id,
            message: OutgoingMessage {
                conversation_id: self.active,
                receiver_id: self
                    .active
                    .and_then(|id| self.index.get(id))
                    .map(|conversation| conversation.counterparty_id),
                body: entry.body,
            },
            transport: Arc::clone(&self.transport),
        };

        let result = outgoing.run();
        self.finish_send(result)
    }

    pub fn discard_failed(&mut self, local_id: LocalId) -> Result<(), ChatError> {
        let key = self.active_key();
        if self.store_mut(key).discard_failed(local_id) {
            Ok(())
        } else {
            Err(ChatError::UnknownMessage)
        }
    }

    pub fn edit_message(&mut self, message_id: i64, body: &str) -> Result<(), ChatError> {
        if !self.capabilities().edit {
            return Err(ChatError::Unsupported);
        }

        let body = validate_body(body, self.settings.max_body_chars)?;
        self.run_message_operation(message_id, MessageOverlay::Edit { body })
    }

    pub fn recall_message(&mut self, message_id: i64) -> Result<(), ChatError> {
        if !self.capabilities().recall {
            return Err(ChatError::Unsupported);
        }

        self.run_message_operation(message_id, MessageOverlay::Recall)
    }

    pub fn delete_message(&mut self, message_id: i64) -> Result<(), ChatError> {
        if !self.capabilities().delete {
            return Err(ChatError::Unsupported);
        }

        self.run_message_operation(message_id, MessageOverlay::Delete)
    }

    /// Archives through the service when it can; otherwise hides locally.
    pub fn hide_conversation(&mut self, conversation_id: i64) -> Result<HideOutcome, ChatError> {
        if !self.index.contains(conversation_id) {
            return Err(ChatError::NotFound);
        }

        if self.capabilities().archive {
            return match self.transport.archive_conversation(conversation_id) {
                Ok(()) | Err(TransportError::NotFound) => {
                    self.forget_conversation(conversation_id);
                    Ok(HideOutcome::Archived)
                }
                Err(TransportError::Unauthorized) => Err(self.handle_unauthorized()),
                Err(error) => Err(ChatError::from_transport(error)),
            };
        }

        self.index.hide(conversation_id);
        if self.active == Some(conversation_id) {
            self.deactivate();
        }

        let now = self.now();
        self.notifications.push(
            NotificationLevel::Info,
            "Conversation hidden on this device; it reappears when the customer writes again",
            now,
        );
        Ok(HideOutcome::HiddenUntilNewActivity)
    }

    fn now(&self) -> i64 {
        self.clock.now_ms()
    }

    fn active_key(&self) -> StoreKey {
        match self.active {
            Some(conversation_id) => StoreKey::Conversation(conversation_id),
            None => StoreKey::Draft,
        }
    }

    fn store_mut(&mut self, key: StoreKey) -> &mut MessageStore {
        let conversation_id = match key {
            StoreKey::Conversation(conversation_id) => Some(conversation_id),
            StoreKey::Draft => self.draft_bound_to,
        };
        let match_window_ms = self.settings.match_window_ms;

        match conversation_id {
            Some(conversation_id) => self
                .stores
                .entry(conversation_id)
                .or_insert_with(|| MessageStore::new(Some(conversation_id), match_window_ms)),
            None => &mut self.draft,
        }
    }

    fn scope_status_mut(&mut self, slot: PollSlot) -> &mut ScopeStatus {
        match slot {
            PollSlot::ConversationList => &mut self.list_state,
            PollSlot::ActiveMessages => &mut self.messages_state,
        }
    }

    fn pending_fetch(&self, ticket: TickTicket) -> PendingFetch {
        PendingFetch {
            ticket,
            role: self.role,
            page_size: self.settings.page_size,
            transport: Arc::clone(&self.transport),
        }
    }

    fn fetch_now(&mut self, slot: PollSlot) -> Result<(), ChatError> {
        let Some(ticket) = self.poller.trigger_now(slot) else {
            return Ok(());
        };

        let result = self.pending_fetch(ticket).run();
        self.apply(result)
    }

    /// Makes `conversation_id` the polled conversation and fetches it at once.
    fn activate(&mut self, conversation_id: i64) -> Result<(), ChatError> {
        if let Some(previous) = self.active.filter(|previous| *previous != conversation_id) {
            if let Some(store) = self.stores.get_mut(&previous) {
                store.clear_overlays();
            }
            self.messages_state.reset();
            self.messages_health.reset();
        }

        let now = self.now();
        self.active = Some(conversation_id);
        self.store_mut(StoreKey::Conversation(conversation_id));
        self.poller.start(PollScope::Messages(conversation_id), now);
        self.messages_state.begin_load();

        self.mark_opened(conversation_id)?;
        self.fetch_now(PollSlot::ActiveMessages)
    }

    fn deactivate(&mut self) {
        self.poller.stop(PollSlot::ActiveMessages);
        if let Some(previous) = self.active.take() {
            if let Some(store) = self.stores.get_mut(&previous) {
                store.clear_overlays();
            }
        }
        self.messages_state.reset();
        self.messages_health.reset();
    }

    fn forget_conversation(&mut self, conversation_id: i64) {
        self.index.remove(conversation_id);
        self.release_store(conversation_id);
        if self.active == Some(conversation_id) {
            self.deactivate();
        }
    }

    /// Drops a conversation's log; a customer's next send starts a fresh draft.
    fn release_store(&mut self, conversation_id: i64) {
        self.stores.remove(&conversation_id);
        if self.draft_bound_to == Some(conversation_id) {
            self.draft_bound_to = None;
        }
    }

    fn bind_draft(&mut self, conversation_id: i64) {
        let mut draft = std::mem::replace(
            &mut self.draft,
            MessageStore::new(None, self.settings.match_window_ms),
        );
        draft.bind(conversation_id);
        self.stores.insert(conversation_id, draft);
        self.draft_bound_to = Some(conversation_id);

        if !self.open {
            self.active = Some(conversation_id);
        }

        tracing::info!(conversation_id, "first message opened a new conversation");
    }

    fn mark_opened(&mut self, conversation_id: i64) -> Result<(), ChatError> {
        let outcome =
            self.read_tracker
                .on_opened(self.transport.as_ref(), &mut self.index, conversation_id);
        self.handle_read_outcome(conversation_id, outcome)
    }

    fn handle_read_outcome(
        &mut self,
        conversation_id: i64,
        outcome: Result<(), TransportError>,
    ) -> Result<(), ChatError> {
        match outcome {
            Ok(()) => Ok(()),
            Err(TransportError::Unauthorized) => Err(self.handle_unauthorized()),
            Err(TransportError::NotFound) => {
                self.forget_conversation(conversation_id);
                Err(ChatError::NotFound)
            }
            // Retried implicitly by the next poll that still shows unread.
            Err(_) => Ok(()),
        }
    }

    fn apply_conversations(&mut self, snapshot: Vec<Conversation>) -> Result<(), ChatError> {
        let now = self.now();
        self.list_health.record_success(now);

        let merge = self.index.reconcile(snapshot);
        for removed in &merge.removed {
            self.release_store(*removed);
        }
        if self.active.is_some_and(|active| merge.removed.contains(&active)) {
            tracing::info!(conversation_id = ?self.active, "active conversation disappeared from server list");
            self.deactivate();
        }
        self.list_state.set_loaded(self.index.conversations().is_empty());

        tracing::debug!(
            role = self.role.as_label(),
            inserted = merge.inserted.len(),
            removed = merge.removed.len(),
            total = merge.conversations.len(),
            "conversation list reconciled"
        );

        match self.role {
            Role::Employee => {
                let Some(active) = self.active else {
                    return Ok(());
                };
                match self
                    .read_tracker
                    .retry_stale(self.transport.as_ref(), &mut self.index, Some(active))
                {
                    Some(outcome) => self.handle_read_outcome(active, outcome),
                    None => Ok(()),
                }
            }
            Role::Customer => {
                // The widget only needs the list to find its single conversation.
                self.poller.stop(PollSlot::ConversationList);
                if self.active.is_some() {
                    return Ok(());
                }

                match self.index.conversations().first().map(|conversation| conversation.id) {
                    Some(conversation_id) => self.activate(conversation_id),
                    None => {
                        self.messages_state.set_loaded(true);
                        Ok(())
                    }
                }
            }
        }
    }

    fn apply_messages(&mut self, conversation_id: i64, snapshot: Vec<Message>) -> Result<(), ChatError> {
        if self.active != Some(conversation_id) {
            tracing::debug!(
                code = POLL_RESULT_DISCARDED,
                conversation_id,
                "message snapshot for inactive conversation ignored"
            );
            return Ok(());
        }

        let now = self.now();
        self.messages_health.record_success(now);

        let store = self.store_mut(StoreKey::Conversation(conversation_id));
        let absorbed = store.reconcile(snapshot);
        let messages = store.messages();
        self.messages_state.set_loaded(messages.is_empty());

        if !absorbed.is_empty() {
            tracing::debug!(
                conversation_id,
                confirmed = absorbed.len(),
                "pending sends confirmed by snapshot"
            );
        }

        if self.role == Role::Customer && self.read_tracker.count_unread(&messages) > 0 {
            return self.mark_opened(conversation_id);
        }

        Ok(())
    }

    fn handle_fetch_failure(&mut self, scope: PollScope, error: TransportError) -> Result<(), ChatError> {
        match (scope, &error) {
            (_, TransportError::Unauthorized) => return Err(self.handle_unauthorized()),
            (PollScope::Messages(conversation_id), TransportError::NotFound) => {
                tracing::info!(conversation_id, "conversation no longer visible; removed");
                self.forget_conversation(conversation_id);
                return Ok(());
            }
            _ => {}
        }

        let now = self.now();
        let slot = scope.slot();
        self.scope_status_mut(slot).set_refresh_failed();
        let crossed = match slot {
            PollSlot::ConversationList => self.list_health.record_failure(),
            PollSlot::ActiveMessages => self.messages_health.record_failure(),
        };

        tracing::debug!(
            code = POLL_FAILED,
            scope = ?scope,
            error = %error,
            retryable = error.is_retryable(),
            "poll failed; retrying on next tick"
        );

        if crossed {
            tracing::warn!(
                code = SYNC_DEGRADED,
                scope = ?scope,
                threshold = self.settings.failure_threshold,
                "consecutive poll failures exceeded threshold"
            );
            self.notifications.push(
                NotificationLevel::Warning,
                "Connection problems; showing last received messages and retrying",
                now,
            );
        }

        Ok(())
    }

    fn handle_unauthorized(&mut self) -> ChatError {
        tracing::warn!(
            code = AUTH_REQUIRED,
            role = self.role.as_label(),
            "credential rejected; handing over to auth collaborator"
        );

        self.poller.stop_all();
        self.open = false;
        self.list_state.set_error();
        self.messages_state.set_error();
        self.auth.on_unauthorized();

        ChatError::Unauthorized
    }

    fn run_message_operation(&mut self, message_id: i64, overlay: MessageOverlay) -> Result<(), ChatError> {
        let conversation_id = self.active.ok_or(ChatError::NoActiveConversation)?;
        let role = self.role;
        let store = self.store_mut(StoreKey::Conversation(conversation_id));

        let own_message = store
            .confirmed(message_id)
            .map(|message| message.sender_role == role)
            .ok_or(ChatError::UnknownMessage)?;
        if !own_message && !matches!(overlay, MessageOverlay::Delete) {
            return Err(ChatError::Unsupported);
        }
        if !store.begin_overlay(message_id, overlay.clone()) {
            return Err(ChatError::OperationInProgress);
        }

        let result = match &overlay {
            MessageOverlay::Edit { body } => {
                self.transport.edit_message(conversation_id, message_id, body)
            }
            MessageOverlay::Recall => self.transport.recall_message(conversation_id, message_id),
            MessageOverlay::Delete => self.transport.delete_message(conversation_id, message_id),
        };
        self.store_mut(StoreKey::Conversation(conversation_id))
            .clear_overlay(message_id);

        match result {
            // The next snapshot carries the effect; fetch it now instead of waiting a tick.
            Ok(()) => self.fetch_now(PollSlot::ActiveMessages),
            Err(TransportError::Unauthorized) => Err(self.handle_unauthorized()),
            Err(error) => {
                tracing::warn!(
                    code = MESSAGE_OPERATION_FAILED,
                    conversation_id,
                    message_id,
                    operation = overlay.lifecycle().as_label(),
                    error = %error,
                    "message operation failed; overlay rolled back"
                );
                let now = self.now();
                self.notifications.push(
                    NotificationLevel::Error,
                    "The change could not be applied",
                    now,
                );
                Err(ChatError::from_transport(error))
            }
        }
    }
}
