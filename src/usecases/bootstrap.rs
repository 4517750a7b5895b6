use std::{path::Path, sync::Arc};

use crate::{
    infra::{self, auth::StaticTokenAuth, config::AppConfig, error::AppError},
    transport::HttpTransport,
    usecases::{
        context::AppContext,
        open_signal::OpenSignal,
        session::{ChatSessionController, SessionSettings},
    },
};

pub fn bootstrap(config_path: Option<&Path>) -> Result<AppContext, AppError> {
    let config = infra::config::load(config_path)?;
    let log_guard = infra::logging::init(&config.logging)?;

    let mut context = build_context(config)?;
    context.log_guard = log_guard;

    if !context.auth.has_token() {
        tracing::warn!(
            env_var = infra::config::TOKEN_ENV_VAR,
            "no service token configured; requests go out unauthenticated"
        );
    }

    Ok(context)
}

fn build_context(config: AppConfig) -> Result<AppContext, AppError> {
    let auth = Arc::new(StaticTokenAuth::new(config.service.token.clone()));
    let transport = Arc::new(HttpTransport::new(&config.service, auth.clone())?);

    Ok(AppContext::new(config, auth, transport))
}

pub fn session_settings(config: &AppConfig) -> SessionSettings {
    SessionSettings {
        poll_interval_ms: millis(config.polling.interval_ms),
        match_window_ms: millis(config.polling.match_window_ms),
        failure_threshold: config.polling.failure_threshold,
        max_body_chars: config.messages.max_body_chars,
        page_size: config.service.page_size,
        notification_ttl_ms: millis(config.notifications.ttl_ms),
        max_notifications: config.notifications.max_visible,
    }
}

pub fn compose_console(context: &AppContext) -> ChatSessionController {
    ChatSessionController::employee_console(
        context.transport.clone(),
        context.auth.clone(),
        context.clock.clone(),
        session_settings(&context.config),
    )
}

pub fn compose_widget(context: &AppContext, open_signal: Option<OpenSignal>) -> ChatSessionController {
    ChatSessionController::customer_widget(
        context.transport.clone(),
        context.auth.clone(),
        context.clock.clone(),
        session_settings(&context.config),
        open_signal,
    )
}

fn millis(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
