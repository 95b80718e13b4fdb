//! Configuration file loader for lamabridge.
//!
//! Reads the TOML file (default `./lamabridge.toml`) into [`AppConfig`] and
//! validates it. Unlike a missing optional file, a missing config is an
//! error here: an example is written in its place so the operator has
//! something to edit.

use std::path::{Path, PathBuf};

use lamabridge_types::config::AppConfig;
use lamabridge_types::error::ConfigError;

/// Config file used when neither `--config` nor `LAMABRIDGE_CONFIG` is set.
pub const DEFAULT_CONFIG_FILE: &str = "lamabridge.toml";

/// Errors from loading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("no config file at {}; an example was written there, edit it and run again", path.display())]
    Created { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigError),
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Load and validate the configuration at `path`.
///
/// - If the file does not exist, writes the example config there and
///   returns [`ConfigLoadError::Created`].
/// - If the file fails to parse or validate, returns the error; no value is
///   silently replaced by a default.
pub async fn load_config(path: &Path) -> Result<AppConfig, ConfigLoadError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("No config found at {}, writing an example", path.display());
            write_example_config(path, false)
                .await
                .map_err(|source| ConfigLoadError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
            return Err(ConfigLoadError::Created {
                path: path.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(ConfigLoadError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let config: AppConfig = toml::from_str(&content).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;

    tracing::debug!(
        path = %path.display(),
        default_model = %config.models.default_model,
        models = config.models.entries.len(),
        "config loaded"
    );
    Ok(config)
}

/// Write the example configuration to `path`.
///
/// Returns `false` without touching the file when it exists and
/// `overwrite` is not set.
pub async fn write_example_config(path: &Path, overwrite: bool) -> std::io::Result<bool> {
    if !overwrite && tokio::fs::try_exists(path).await? {
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, AppConfig::example_toml()).await?;
    Ok(true)
}
