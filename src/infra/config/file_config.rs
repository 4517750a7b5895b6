use std::path::PathBuf;

use serde::Deserialize;

use crate::infra::config::{
    AppConfig, LogConfig, MessagesConfig, NotificationsConfig, PollingConfig, ServiceConfig,
};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub service: Option<FileServiceConfig>,
    pub polling: Option<FilePollingConfig>,
    pub messages: Option<FileMessagesConfig>,
    pub notifications: Option<FileNotificationsConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut AppConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(service) = self.service {
            service.merge_into(&mut config.service);
        }

        if let Some(polling) = self.polling {
            polling.merge_into(&mut config.polling);
        }

        if let Some(messages) = self.messages {
            messages.merge_into(&mut config.messages);
        }

        if let Some(notifications) = self.notifications {
            notifications.merge_into(&mut config.notifications);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }

        if let Some(file) = self.file {
            config.file = Some(file);
        }
    }
}

#[derive(Deserialize, Default)]
pub struct FileServiceConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub page_size: Option<usize>,
}

impl std::fmt::Debug for FileServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileServiceConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl FileServiceConfig {
    fn merge_into(self, config: &mut ServiceConfig) {
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }

        if let Some(token) = self.token {
            config.token = Some(token);
        }

        if let Some(timeout_ms) = self.request_timeout_ms {
            config.request_timeout_ms = timeout_ms;
        }

        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FilePollingConfig {
    pub interval_ms: Option<u64>,
    pub driver_resolution_ms: Option<u64>,
    pub failure_threshold: Option<u32>,
    pub match_window_ms: Option<u64>,
}

impl FilePollingConfig {
    fn merge_into(self, config: &mut PollingConfig) {
        if let Some(interval_ms) = self.interval_ms {
            config.interval_ms = interval_ms;
        }

        if let Some(resolution_ms) = self.driver_resolution_ms {
            config.driver_resolution_ms = resolution_ms;
        }

        if let Some(threshold) = self.failure_threshold {
            config.failure_threshold = threshold;
        }

        if let Some(window_ms) = self.match_window_ms {
            config.match_window_ms = window_ms;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileMessagesConfig {
    pub max_body_chars: Option<usize>,
}

impl FileMessagesConfig {
    fn merge_into(self, config: &mut MessagesConfig) {
        if let Some(max_body_chars) = self.max_body_chars {
            config.max_body_chars = max_body_chars;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileNotificationsConfig {
    pub ttl_ms: Option<u64>,
    pub max_visible: Option<usize>,
}

impl FileNotificationsConfig {
    fn merge_into(self, config: &mut NotificationsConfig) {
        if let Some(ttl_ms) = self.ttl_ms {
            config.ttl_ms = ttl_ms;
        }

        if let Some(max_visible) = self.max_visible {
            config.max_visible = max_visible;
        }
    }
}
