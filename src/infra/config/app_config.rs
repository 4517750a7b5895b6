use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppConfig {
    pub logging: LogConfig,
    pub service: ServiceConfig,
    pub polling: PollingConfig,
    pub messages: MessagesConfig,
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    /// Log to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            file: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub request_timeout_ms: u64,
    pub page_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/".to_owned(),
            token: None,
            request_timeout_ms: 10_000,
            page_size: 50,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("page_size", &self.page_size)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollingConfig {
    pub interval_ms: u64,
    /// How often the background driver wakes to check for due timers.
    pub driver_resolution_ms: u64,
    pub failure_threshold: u32,
    pub match_window_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 3_000,
            driver_resolution_ms: 250,
            failure_threshold: 3,
            match_window_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagesConfig {
    pub max_body_chars: usize,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            max_body_chars: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationsConfig {
    pub ttl_ms: u64,
    pub max_visible: usize,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 5_000,
            max_visible: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_never_shows_token() {
        let config = ServiceConfig {
            token: Some("eyJhbGciOi.secret".to_owned()),
            ..ServiceConfig::default()
        };

        let rendered = format!("{config:?}");

        assert!(!rendered.contains("eyJhbGciOi"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
