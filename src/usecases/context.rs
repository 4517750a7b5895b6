use std::sync::Arc;

use tracing_appender::non_blocking::WorkerGuard;

use crate::{
    infra::{auth::StaticTokenAuth, clock::SystemClock, config::AppConfig},
    transport::HttpTransport,
};

pub struct AppContext {
    pub config: AppConfig,
    pub auth: Arc<StaticTokenAuth>,
    pub transport: Arc<HttpTransport>,
    pub clock: Arc<SystemClock>,
    /// Keeps the file log sink flushing until the context is dropped.
    pub log_guard: Option<WorkerGuard>,
}

impl AppContext {
    pub fn new(config: AppConfig, auth: Arc<StaticTokenAuth>, transport: Arc<HttpTransport>) -> Self {
        Self {
            config,
            auth,
            transport,
            clock: Arc::new(SystemClock),
            log_guard: None,
        }
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("config", &self.config)
            .field("auth", &self.auth)
            .field("transport", &self.transport)
            .field("file_logging", &self.log_guard.is_some())
            .finish()
    }
}
