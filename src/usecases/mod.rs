//! Use case layer: application workflows and orchestration.

pub mod bootstrap;
pub mod context;
pub mod contracts;
pub mod errors;
pub mod list_conversations;
pub mod load_messages;
pub mod open_signal;
pub mod poller;
pub mod read_tracker;
pub mod send_message;
pub mod session;

/// Returns the usecases module name for smoke checks.
pub fn module_name() -> &'static str {
    "usecases"
}
