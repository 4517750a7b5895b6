use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicI64, AtomicUsize, Ordering},
        Mutex, MutexGuard,
    },
};

use crate::{
    domain::{
        conversation::Conversation,
        message::{Message, MessageId, MessageLifecycle},
        role::Role,
    },
    usecases::{
        contracts::{
            AuthCollaborator, ChatTransport, Clock, OutgoingMessage, Page, ReadSummary,
            TransportCapabilities,
        },
        errors::TransportError,
    },
};

static ENV_LOCK: Mutex<()> = Mutex::new(());

pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().expect("env lock should not be poisoned")
}

/// Conversation id the fake assigns when a send opens a new conversation.
pub const NEW_CONVERSATION_ID: i64 = 99;

#[derive(Default)]
struct FakeState {
    conversations: Vec<Conversation>,
    conversations_error: Option<TransportError>,
    messages: HashMap<i64, Result<Vec<Message>, TransportError>>,
    send_results: VecDeque<Result<Message, TransportError>>,
    mark_read_results: VecDeque<Result<ReadSummary, TransportError>>,
    operation_results: VecDeque<Result<(), TransportError>>,
    capabilities: TransportCapabilities,
    calls: Vec<String>,
    sent: Vec<OutgoingMessage>,
    last_page: Option<Page>,
    next_server_id: i64,
}

/// Scriptable in-memory chat service.
#[derive(Default)]
pub struct FakeTransport {
    state: Mutex<FakeState>,
}

impl FakeTransport {
    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake transport lock should not be poisoned")
    }

    pub fn set_conversations(&self, conversations: Vec<Conversation>) {
        let mut state = self.state();
        state.conversations = conversations;
        state.conversations_error = None;
    }

    pub fn fail_conversations(&self, error: TransportError) {
        self.state().conversations_error = Some(error);
    }

    pub fn set_messages(&self, conversation_id: i64, messages: Vec<Message>) {
        self.state().messages.insert(conversation_id, Ok(messages));
    }

    pub fn fail_messages(&self, conversation_id: i64, error: TransportError) {
        self.state().messages.insert(conversation_id, Err(error));
    }

    pub fn push_send_result(&self, result: Result<Message, TransportError>) {
        self.state().send_results.push_back(result);
    }

    pub fn push_mark_read_result(&self, result: Result<ReadSummary, TransportError>) {
        self.state().mark_read_results.push_back(result);
    }

    pub fn push_operation_result(&self, result: Result<(), TransportError>) {
        self.state().operation_results.push_back(result);
    }

    pub fn set_capabilities(&self, capabilities: TransportCapabilities) {
        self.state().capabilities = capabilities;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.state().sent.clone()
    }

    pub fn last_page(&self) -> Option<Page> {
        self.state().last_page
    }

    fn next_operation(&self, call: String) -> Result<(), TransportError> {
        let mut state = self.state();
        state.calls.push(call);
        state.operation_results.pop_front().unwrap_or(Ok(()))
    }
}

impl ChatTransport for FakeTransport {
    fn list_conversations(
        &self,
        role: Role,
        page: Page,
    ) -> Result<Vec<Conversation>, TransportError> {
        let mut state = self.state();
        state.calls.push(format!("list_conversations:{}", role.as_label()));
        state.last_page = Some(page);
        match &state.conversations_error {
            Some(error) => Err(error.clone()),
            None => Ok(state.conversations.clone()),
        }
    }

    fn list_messages(
        &self,
        conversation_id: i64,
        page: Page,
    ) -> Result<Vec<Message>, TransportError> {
        let mut state = self.state();
        state.calls.push(format!("list_messages:{conversation_id}"));
        state.last_page = Some(page);
        state
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn send(&self, message: &OutgoingMessage) -> Result<Message, TransportError> {
        let mut state = self.state();
        state.calls.push(format!(
            "send:{}",
            message
                .conversation_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "new".to_owned())
        ));
        state.sent.push(message.clone());

        if let Some(result) = state.send_results.pop_front() {
            return result;
        }

        state.next_server_id += 1;
        Ok(Message {
            id: MessageId::Server(1_000 + state.next_server_id),
            conversation_id: message.conversation_id.unwrap_or(NEW_CONVERSATION_ID),
            sender_role: Role::Customer,
            body: message.body.clone(),
            created_at_ms: 0,
            read_at_ms: None,
            lifecycle: MessageLifecycle::Confirmed,
        })
    }

    fn mark_read(&self, conversation_id: i64) -> Result<ReadSummary, TransportError> {
        let mut state = self.state();
        state.calls.push(format!("mark_read:{conversation_id}"));
        state
            .mark_read_results
            .pop_front()
            .unwrap_or(Ok(ReadSummary {
                conversation_id,
                unread_count: 0,
            }))
    }

    fn capabilities(&self) -> TransportCapabilities {
        self.state().capabilities
    }

    fn archive_conversation(&self, conversation_id: i64) -> Result<(), TransportError> {
        self.next_operation(format!("archive:{conversation_id}"))
    }

    fn edit_message(
        &self,
        conversation_id: i64,
        message_id: i64,
        body: &str,
    ) -> Result<(), TransportError> {
        self.next_operation(format!("edit:{conversation_id}:{message_id}:{body}"))
    }

    fn recall_message(&self, conversation_id: i64, message_id: i64) -> Result<(), TransportError> {
        self.next_operation(format!("recall:{conversation_id}:{message_id}"))
    }

    fn delete_message(&self, conversation_id: i64, message_id: i64) -> Result<(), TransportError> {
        self.next_operation(format!("delete:{conversation_id}:{message_id}"))
    }
}

/// Clock the test moves by hand.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn at(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct StubAuth {
    unauthorized_calls: AtomicUsize,
}

impl StubAuth {
    pub fn unauthorized_calls(&self) -> usize {
        self.unauthorized_calls.load(Ordering::SeqCst)
    }
}

impl AuthCollaborator for StubAuth {
    fn bearer_token(&self) -> Option<String> {
        Some("test-token".to_owned())
    }

    fn on_unauthorized(&self) {
        self.unauthorized_calls.fetch_add(1, Ordering::SeqCst);
    }
}
