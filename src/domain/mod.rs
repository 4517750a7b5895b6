//! Domain layer: chat entities, merge rules, and render state.

pub mod conversation;
pub mod conversation_index;
pub mod message;
pub mod message_store;
pub mod notifications;
pub mod reconcile;
pub mod role;
pub mod scope_state;
pub mod sync_health;

/// Returns the domain module name for smoke checks.
pub fn module_name() -> &'static str {
    "domain"
}
