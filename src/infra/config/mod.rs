mod app_config;
mod file_config;
mod loader;

pub use app_config::{
    AppConfig, LogConfig, MessagesConfig, NotificationsConfig, PollingConfig, ServiceConfig,
};
pub use loader::{load, TOKEN_ENV_VAR};
