use std::{sync::Arc, time::Duration};

use reqwest::{Method, StatusCode};
use tokio::runtime::{Builder, Runtime};
use url::Url;

use crate::{
    domain::{conversation::Conversation, message::Message, role::Role},
    infra::{config::ServiceConfig, error::AppError},
    usecases::{
        contracts::{AuthCollaborator, ChatTransport, OutgoingMessage, Page, ReadSummary},
        errors::TransportError,
    },
};

use super::wire::{
    decode_list, decode_message, decode_read_summary, WireConversation, WireMessage,
    WireSendRequest,
};

const HTTP_REQUEST_FAILED: &str = "HTTP_REQUEST_FAILED";
const HTTP_UNEXPECTED_STATUS: &str = "HTTP_UNEXPECTED_STATUS";

/// Blocking facade over the chat REST service.
///
/// Owns a current-thread runtime; every call is a `block_on` so the session
/// layer stays synchronous.
pub struct HttpTransport {
    runtime: Runtime,
    http: reqwest::Client,
    base_url: Url,
    auth: Arc<dyn AuthCollaborator>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    pub fn new(config: &ServiceConfig, auth: Arc<dyn AuthCollaborator>) -> Result<Self, AppError> {
        let base_url = parse_base_url(&config.base_url)?;

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(AppError::Runtime)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(AppError::HttpClient)?;

        Ok(Self {
            runtime,
            http,
            base_url,
            auth,
        })
    }

    fn endpoint(&self, path: &str, page: Option<Page>) -> Result<Url, TransportError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|error| TransportError::InvalidData(format!("bad endpoint `{path}`: {error}")))?;

        if let Some(page) = page {
            url.query_pairs_mut()
                .append_pair("limit", &page.limit.to_string())
                .append_pair("offset", &page.offset.to_string());
        }

        Ok(url)
    }

    fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<Vec<u8>, TransportError> {
        let mut request = self.http.request(method.clone(), url.clone());
        if let Some(token) = self.auth.bearer_token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        self.runtime.block_on(async move {
            let response = request.send().await.map_err(|error| {
                tracing::debug!(
                    code = HTTP_REQUEST_FAILED,
                    method = %method,
                    path = url.path(),
                    error = %error,
                    "chat service request failed"
                );
                map_request_error(&error)
            })?;

            let status = response.status();
            if let Some(error) = map_status(status) {
                tracing::debug!(
                    code = HTTP_UNEXPECTED_STATUS,
                    method = %method,
                    path = url.path(),
                    status = status.as_u16(),
                    "chat service answered with an error status"
                );
                return Err(error);
            }

            response
                .bytes()
                .await
                .map(|bytes| bytes.to_vec())
                .map_err(|error| map_request_error(&error))
        })
    }
}

impl ChatTransport for HttpTransport {
    fn list_conversations(
        &self,
        role: Role,
        page: Page,
    ) -> Result<Vec<Conversation>, TransportError> {
        // The credential scopes the list; the role only labels the request.
        tracing::trace!(role = role.as_label(), "listing conversations");
        let url = self.endpoint("conversations", Some(page))?;
        let bytes = self.execute(Method::GET, url, None)?;
        decode_list(&bytes, WireConversation::into_domain)
    }

    fn list_messages(
        &self,
        conversation_id: i64,
        page: Page,
    ) -> Result<Vec<Message>, TransportError> {
        let url = self.endpoint(&format!("messages/{conversation_id}"), Some(page))?;
        let bytes = self.execute(Method::GET, url, None)?;
        decode_list(&bytes, WireMessage::into_domain)
    }

    fn send(&self, message: &OutgoingMessage) -> Result<Message, TransportError> {
        let url = self.endpoint("messages", None)?;
        let body = serde_json::to_value(WireSendRequest::from(message))
            .map_err(|error| TransportError::InvalidData(error.to_string()))?;
        let bytes = self.execute(Method::POST, url, Some(body))?;
        decode_message(&bytes)
    }

    fn mark_read(&self, conversation_id: i64) -> Result<ReadSummary, TransportError> {
        let url = self.endpoint(&format!("messages/read/{conversation_id}"), None)?;
        let bytes = self.execute(Method::PUT, url, None)?;
        decode_read_summary(&bytes, conversation_id)
    }
}

/// Relative endpoint joins need a trailing slash on the base path.
fn parse_base_url(raw: &str) -> Result<Url, AppError> {
    let normalized = if raw.ends_with('/') {
        raw.to_owned()
    } else {
        format!("{raw}/")
    };

    Url::parse(&normalized).map_err(|source| AppError::InvalidBaseUrl {
        url: raw.to_owned(),
        source,
    })
}

fn map_status(status: StatusCode) -> Option<TransportError> {
    if status.is_success() {
        return None;
    }

    let error = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransportError::Unauthorized,
        StatusCode::NOT_FOUND | StatusCode::GONE => TransportError::NotFound,
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            TransportError::Transient(format!("HTTP {}", status.as_u16()))
        }
        status if status.is_server_error() => {
            TransportError::Transient(format!("HTTP {}", status.as_u16()))
        }
        status => TransportError::InvalidData(format!("unexpected HTTP {}", status.as_u16())),
    };

    Some(error)
}

fn map_request_error(error: &reqwest::Error) -> TransportError {
    if error.is_decode() || error.is_body() {
        return TransportError::InvalidData(error.to_string());
    }

    // Timeouts, refused connections and resets all clear up on their own.
    TransportError::Transient(error.to_string())
}
