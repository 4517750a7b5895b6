//! JSON shapes of the chat service and their conversion into domain types.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        conversation::Conversation,
        message::{Message, MessageId, MessageLifecycle},
        role::Role,
    },
    usecases::{
        contracts::{OutgoingMessage, ReadSummary},
        errors::TransportError,
    },
};

const MESSAGE_TYPE_TEXT: &str = "text";

/// Either epoch milliseconds or an RFC 3339 / naive ISO-8601 string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireTimestamp {
    Millis(i64),
    Text(String),
}

impl WireTimestamp {
    pub(crate) fn to_millis(&self) -> Result<i64, TransportError> {
        match self {
            Self::Millis(value) => Ok(*value),
            Self::Text(raw) => parse_timestamp(raw),
        }
    }
}

fn parse_timestamp(raw: &str) -> Result<i64, TransportError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.timestamp_millis());
    }

    // Zone-less timestamps are taken as UTC.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc().timestamp_millis())
        .map_err(|_| TransportError::InvalidData(format!("unrecognized timestamp `{raw}`")))
}

/// List endpoints answer with a bare array or with `{ "data": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListEnvelope<T> {
    Bare(Vec<T>),
    Wrapped { data: Vec<T> },
}

impl<T> ListEnvelope<T> {
    pub(crate) fn into_items(self) -> Vec<T> {
        match self {
            Self::Bare(items) | Self::Wrapped { data: items } => items,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireConversation {
    pub id: i64,
    pub counterparty_id: i64,
    #[serde(default)]
    pub counterparty_display_name: Option<String>,
    #[serde(default)]
    pub last_message_preview: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<WireTimestamp>,
    #[serde(default)]
    pub unread_count: Option<i64>,
}

impl WireConversation {
    pub(crate) fn into_domain(self) -> Result<Conversation, TransportError> {
        let last_message_at_ms = self
            .last_message_at
            .as_ref()
            .map(WireTimestamp::to_millis)
            .transpose()?;

        Ok(Conversation {
            id: self.id,
            counterparty_id: self.counterparty_id,
            counterparty_display_name: self
                .counterparty_display_name
                .unwrap_or_else(|| format!("#{}", self.counterparty_id)),
            last_message_preview: self.last_message_preview,
            last_message_at_ms,
            unread_count: clamp_count(self.unread_count),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_role: Role,
    pub body: String,
    pub created_at: WireTimestamp,
    #[serde(default)]
    pub read_at: Option<WireTimestamp>,
}

impl WireMessage {
    pub(crate) fn into_domain(self) -> Result<Message, TransportError> {
        Ok(Message {
            id: MessageId::Server(self.id),
            conversation_id: self.conversation_id,
            sender_role: self.sender_role,
            body: self.body,
            created_at_ms: self.created_at.to_millis()?,
            read_at_ms: self
                .read_at
                .as_ref()
                .map(WireTimestamp::to_millis)
                .transpose()?,
            lifecycle: MessageLifecycle::Confirmed,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireSendRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<i64>,
    pub body: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl<'a> From<&'a OutgoingMessage> for WireSendRequest<'a> {
    fn from(message: &'a OutgoingMessage) -> Self {
        Self {
            conversation_id: message.conversation_id,
            receiver_id: message.receiver_id,
            body: &message.body,
            kind: MESSAGE_TYPE_TEXT,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireReadSummary {
    #[serde(default)]
    pub conversation_id: Option<i64>,
    #[serde(default)]
    pub unread_count: Option<i64>,
}

impl WireReadSummary {
    pub(crate) fn into_domain(self, requested_id: i64) -> ReadSummary {
        ReadSummary {
            conversation_id: self.conversation_id.unwrap_or(requested_id),
            unread_count: clamp_count(self.unread_count),
        }
    }
}

/// Negative or missing counts from the service read as zero.
fn clamp_count(raw: Option<i64>) -> u32 {
    raw.map(|count| u32::try_from(count.max(0)).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

pub(crate) fn decode_list<W, T>(
    bytes: &[u8],
    convert: impl Fn(W) -> Result<T, TransportError>,
) -> Result<Vec<T>, TransportError>
where
    W: for<'de> Deserialize<'de>,
{
    let envelope: ListEnvelope<W> = serde_json::from_slice(bytes)
        .map_err(|error| TransportError::InvalidData(error.to_string()))?;

    envelope.into_items().into_iter().map(convert).collect()
}

pub(crate) fn decode_message(bytes: &[u8]) -> Result<Message, TransportError> {
    serde_json::from_slice::<WireMessage>(bytes)
        .map_err(|error| TransportError::InvalidData(error.to_string()))?
        .into_domain()
}

/// An empty body (204) counts as "everything read".
pub(crate) fn decode_read_summary(bytes: &[u8], requested_id: i64) -> Result<ReadSummary, TransportError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(WireReadSummary::default().into_domain(requested_id));
    }

    serde_json::from_slice::<WireReadSummary>(bytes)
        .map(|summary| summary.into_domain(requested_id))
        .map_err(|error| TransportError::InvalidData(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_and_epoch_timestamps_to_the_same_instant() {
        let text = WireTimestamp::Text("2024-03-01T10:00:00Z".to_owned());
        let offset = WireTimestamp::Text("2024-03-01T12:00:00+02:00".to_owned());
        let millis = WireTimestamp::Millis(1_709_287_200_000);

        assert_eq!(text.to_millis(), Ok(1_709_287_200_000));
        assert_eq!(offset.to_millis(), Ok(1_709_287_200_000));
        assert_eq!(millis.to_millis(), Ok(1_709_287_200_000));
    }

    #[test]
    fn zone_less_timestamps_are_read_as_utc() {
        let naive = WireTimestamp::Text("2024-03-01T10:00:00.250".to_owned());

        assert_eq!(naive.to_millis(), Ok(1_709_287_200_250));
    }

    #[test]
    fn rejects_garbage_timestamp() {
        let result = WireTimestamp::Text("yesterday".to_owned()).to_millis();

        assert!(matches!(result, Err(TransportError::InvalidData(_))));
    }

    #[test]
    fn decodes_bare_and_wrapped_conversation_lists() {
        let bare = br#"[{"id":1,"counterpartyId":7,"counterpartyDisplayName":"Ana",
            "lastMessagePreview":"hi","lastMessageAt":"2024-03-01T10:00:00Z","unreadCount":2}]"#;
        let wrapped = br#"{"data":[{"id":1,"counterpartyId":7,"counterpartyDisplayName":"Ana",
            "lastMessagePreview":"hi","lastMessageAt":1709287200000,"unreadCount":2}]}"#;

        let from_bare = decode_list(bare, WireConversation::into_domain).expect("bare list");
        let from_wrapped = decode_list(wrapped, WireConversation::into_domain).expect("wrapped list");

        assert_eq!(from_bare, from_wrapped);
        assert_eq!(from_bare[0].unread_count, 2);
        assert_eq!(from_bare[0].last_message_at_ms, Some(1_709_287_200_000));
    }

    #[test]
    fn missing_optional_conversation_fields_get_defaults() {
        let raw = br#"[{"id":3,"counterpartyId":12,"unreadCount":-4}]"#;

        let conversations = decode_list(raw, WireConversation::into_domain).expect("list");

        assert_eq!(conversations[0].counterparty_display_name, "#12");
        assert_eq!(conversations[0].last_message_at_ms, None);
        assert_eq!(conversations[0].unread_count, 0);
    }

    #[test]
    fn decodes_message_with_role_and_read_marker() {
        let raw = br#"{"id":501,"conversationId":1,"senderRole":"customer","body":"hi",
            "createdAt":"2024-03-01T10:00:01Z","readAt":null}"#;

        let message = decode_message(raw).expect("message");

        assert_eq!(message.id, MessageId::Server(501));
        assert_eq!(message.sender_role, Role::Customer);
        assert_eq!(message.created_at_ms, 1_709_287_201_000);
        assert_eq!(message.read_at_ms, None);
        assert_eq!(message.lifecycle, MessageLifecycle::Confirmed);
    }

    #[test]
    fn unknown_role_is_invalid_data() {
        let raw = br#"{"id":1,"conversationId":1,"senderRole":"robot","body":"hi","createdAt":0}"#;

        assert!(matches!(decode_message(raw), Err(TransportError::InvalidData(_))));
    }

    #[test]
    fn send_request_uses_service_field_names() {
        let outgoing = OutgoingMessage {
            conversation_id: Some(4),
            receiver_id: Some(9),
            body: "hello".to_owned(),
        };

        let json = serde_json::to_value(WireSendRequest::from(&outgoing)).expect("serialize");

        assert_eq!(
            json,
            serde_json::json!({"conversationId": 4, "receiverId": 9, "body": "hello", "type": "text"})
        );
    }

    #[test]
    fn first_customer_message_omits_conversation_id() {
        let outgoing = OutgoingMessage {
            conversation_id: None,
            receiver_id: None,
            body: "hello".to_owned(),
        };

        let json = serde_json::to_value(WireSendRequest::from(&outgoing)).expect("serialize");

        assert_eq!(json, serde_json::json!({"body": "hello", "type": "text"}));
    }

    #[test]
    fn empty_read_response_means_nothing_unread() {
        assert_eq!(
            decode_read_summary(b"", 8),
            Ok(ReadSummary {
                conversation_id: 8,
                unread_count: 0
            })
        );
        assert_eq!(
            decode_read_summary(br#"{"unreadCount":1}"#, 8),
            Ok(ReadSummary {
                conversation_id: 8,
                unread_count: 1
            })
        );
    }
}
