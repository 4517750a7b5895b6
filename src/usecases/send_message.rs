//! Validation and dispatch of outgoing chat messages.
//!
//! Validation runs before anything touches the transport, so an empty or
//! oversized body never produces a request or an optimistic entry.

use crate::domain::message::Message;

use super::{
    contracts::{ChatTransport, OutgoingMessage},
    errors::{TransportError, ValidationError},
};

pub const DEFAULT_MAX_BODY_CHARS: usize = 2_000;

/// Returns the body as it will be sent: trimmed, non-empty, within `max_chars`.
pub fn validate_body(body: &str, max_chars: usize) -> Result<String, ValidationError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ValidationError::EmptyBody);
    }

    if body.chars().count() > max_chars {
        return Err(ValidationError::BodyTooLong { max: max_chars });
    }

    Ok(body.to_owned())
}

/// Sends an already validated message.
pub fn send_message(
    sender: &dyn ChatTransport,
    message: &OutgoingMessage,
) -> Result<Message, TransportError> {
    let confirmed = sender.send(message)?;

    tracing::debug!(
        conversation_id = confirmed.conversation_id,
        message_id = %confirmed.id,
        "message accepted by chat service"
    );

    Ok(confirmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeTransport;

    #[test]
    fn rejects_empty_message_text() {
        assert_eq!(validate_body("", 10), Err(ValidationError::EmptyBody));
    }

    #[test]
    fn rejects_whitespace_only_message() {
        assert_eq!(
            validate_body("   \n\t  ", 10),
            Err(ValidationError::EmptyBody)
        );
    }

    #[test]
    fn trims_whitespace_before_sending() {
        assert_eq!(
            validate_body("  hello world  ", 100),
            Ok("hello world".to_owned())
        );
    }

    #[test]
    fn counts_characters_not_bytes() {
        assert_eq!(validate_body("ñññ", 3), Ok("ñññ".to_owned()));
        assert_eq!(
            validate_body("ññññ", 3),
            Err(ValidationError::BodyTooLong { max: 3 })
        );
    }

    #[test]
    fn passes_message_to_sender() {
        let sender = FakeTransport::default();
        let outgoing = OutgoingMessage {
            conversation_id: Some(123),
            receiver_id: Some(9),
            body: "test".to_owned(),
        };

        let confirmed = send_message(&sender, &outgoing).expect("send should succeed");

        assert_eq!(confirmed.conversation_id, 123);
        assert_eq!(sender.sent(), vec![outgoing]);
    }

    #[test]
    fn maps_unavailable_error() {
        let sender = FakeTransport::default();
        sender.push_send_result(Err(TransportError::Transient("502".to_owned())));

        let result = send_message(
            &sender,
            &OutgoingMessage {
                conversation_id: Some(1),
                receiver_id: None,
                body: "hello".to_owned(),
            },
        );

        assert_eq!(result, Err(TransportError::Transient("502".to_owned())));
    }
}
