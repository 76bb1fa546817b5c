use super::schema::LabelgrabConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./labelgrab.yaml
    /// 2. ~/.labelgrab/config.yaml
    /// 3. Default configuration
    pub async fn load_default() -> Result<LabelgrabConfig, ConfigError> {
        let local_config = PathBuf::from("./labelgrab.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".labelgrab").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        Ok(LabelgrabConfig::default())
    }

    pub async fn load_from(path: &Path) -> Result<LabelgrabConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: LabelgrabConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load an explicit file when given, else the default locations, then
    /// apply environment overrides.
    pub async fn load(explicit: Option<&Path>) -> Result<LabelgrabConfig, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load_from(path).await?,
            None => Self::load_default().await?,
        };
        apply_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }
}

/// Overlay environment-provided settings onto a loaded config.
pub fn apply_overrides<F>(config: &mut LabelgrabConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(email) = non_empty("LABELGRAB_EMAIL") {
        config.credentials.email = Some(email);
    }
    if let Some(password) = non_empty("LABELGRAB_PASSWORD") {
        config.credentials.password = Some(password);
    }
    if let Some(value) = non_empty("LABELGRAB_FILTER_VALUE") {
        config.workflow.filter_value = Some(value);
    }
    if let Some(root) = non_empty("LABELGRAB_DOWNLOAD_ROOT") {
        config.paths.download_root = PathBuf::from(root);
    }
    if let Some(file) = non_empty("LABELGRAB_SESSION_FILE") {
        config.session.file = PathBuf::from(file);
    }
    if let Some(bin) = non_empty("CHROME_BIN") {
        config.browser.chrome_bin = Some(PathBuf::from(bin));
    }
    if let Some(dir) = non_empty("LABELGRAB_USER_DATA_DIR") {
        config.browser.user_data_dir = Some(PathBuf::from(dir));
    }
}
