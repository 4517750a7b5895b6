use std::{fs, path::Path};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::infra::{config::LogConfig, error::AppError};

const DEFAULT_LOG_FILE_NAME: &str = "support-chat.log";

/// Installs the global subscriber. The returned guard flushes the file sink
/// on drop and must live as long as the process logs.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>, AppError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.file.as_deref() {
        Some(path) => {
            let (directory, file_name) = split_log_path(path);
            fs::create_dir_all(directory).map_err(|source| AppError::LogDirCreate {
                path: directory.to_path_buf(),
                source,
            })?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(false)
                .with_writer(writer)
                .try_init()
                .map_err(AppError::LoggingInit)?;

            Ok(Some(guard))
        }
        None => {
            // stdout carries command output.
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(AppError::LoggingInit)?;

            Ok(None)
        }
    }
}

fn split_log_path(path: &Path) -> (&Path, &std::ffi::OsStr) {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new(DEFAULT_LOG_FILE_NAME));

    (directory, file_name)
}
