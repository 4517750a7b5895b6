use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::infra::{
    config::{file_config::FileConfig, AppConfig},
    error::AppError,
    storage_layout::StorageLayout,
};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Overrides `[service] token` so credentials can stay out of the file.
pub const TOKEN_ENV_VAR: &str = "SUPPORT_CHAT_TOKEN";

pub fn load(path: Option<&Path>) -> Result<AppConfig, AppError> {
    load_with_token_override(path, env::var(TOKEN_ENV_VAR).ok())
}

pub(crate) fn load_with_token_override(
    path: Option<&Path>,
    token_override: Option<String>,
) -> Result<AppConfig, AppError> {
    let mut config = AppConfig::default();

    if let Some(config_path) = resolve_path(path) {
        let raw = fs::read_to_string(&config_path).map_err(|source| AppError::ConfigRead {
            path: config_path.clone(),
            source,
        })?;

        let file_config: FileConfig =
            toml::from_str(&raw).map_err(|source| AppError::ConfigParse {
                path: config_path.clone(),
                source,
            })?;

        file_config.merge_into(&mut config);
        tracing::debug!(path = %config_path.display(), "config file merged over defaults");
    }

    if let Some(token) = token_override.filter(|token| !token.trim().is_empty()) {
        config.service.token = Some(token);
    }

    validate(&config)?;
    Ok(config)
}

/// Explicit path, then `./config.toml`, then the per-user config file.
fn resolve_path(path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = path {
        return path.exists().then(|| path.to_path_buf());
    }

    let local = PathBuf::from(DEFAULT_CONFIG_PATH);
    if local.exists() {
        return Some(local);
    }

    StorageLayout::resolve()
        .map(|layout| layout.config_file())
        .filter(|candidate| candidate.exists())
}

fn validate(config: &AppConfig) -> Result<(), AppError> {
    if config.service.base_url.trim().is_empty() {
        return Err(AppError::ConfigInvalid {
            field: "service.base_url",
            details: "must not be empty".to_owned(),
        });
    }

    if config.polling.interval_ms == 0 {
        return Err(AppError::ConfigInvalid {
            field: "polling.interval_ms",
            details: "must be greater than zero".to_owned(),
        });
    }

    if config.messages.max_body_chars == 0 {
        return Err(AppError::ConfigInvalid {
            field: "messages.max_body_chars",
            details: "must be greater than zero".to_owned(),
        });
    }

    Ok(())
}
