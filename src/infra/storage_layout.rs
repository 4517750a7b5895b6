use std::path::PathBuf;

const APP_DIR_NAME: &str = "support-chat";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Per-user locations used when no explicit path is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub config_dir: PathBuf,
}

impl StorageLayout {
    /// `None` when the platform has no per-user config directory.
    pub fn resolve() -> Option<Self> {
        dirs::config_dir().map(|base| Self {
            config_dir: base.join(APP_DIR_NAME),
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }
}
