//! Configuration loading for tabrun.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! explicit config file -> environment -> CLI overrides. The user config
//! lives at `~/.config/tabrun/config.toml` (platform equivalent).

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::ConfigError;
use crate::logging::DEFAULT_FILE_SINK;
use crate::run::DEFAULT_ROOT;

/// Prefix of environment variables read by [`load_layered`].
pub const ENV_PREFIX: &str = "TABRUN_";

/// Where runs are allocated and how the run log is bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    /// Root directory holding all run directories.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
    /// Run label; empty derives the name from the current time.
    #[serde(default)]
    pub tag: String,
    /// Sink rebound into the run's `logs/` directory.
    #[serde(default = "default_log_sink")]
    pub log_sink: String,
    /// File name of the run log inside `logs/`.
    #[serde(default = "default_log_file_name")]
    pub log_file_name: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            tag: String::new(),
            log_sink: default_log_sink(),
            log_file_name: default_log_file_name(),
        }
    }
}

fn default_root_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ROOT)
}

fn default_log_sink() -> String {
    DEFAULT_FILE_SINK.to_string()
}

fn default_log_file_name() -> String {
    "run.log".to_string()
}

/// Path of the user-level config file, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "tabrun", "tabrun")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load a configuration value from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (only the keys present in `overrides`)
/// 2. Environment variables (`TABRUN_SEARCH__CV=10`, ...)
/// 3. The explicit config file (`.toml` or `.json`)
/// 4. The user config file
/// 5. `T::default()`
pub fn load_layered<T>(
    config_file: Option<&Path>,
    overrides: Option<&serde_json::Value>,
) -> Result<T, ConfigError>
where
    T: Serialize + DeserializeOwned + Default,
{
    let mut figment = Figment::from(Serialized::defaults(T::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.is_file() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(path) = config_file {
        figment = merge_file(figment, path)?;
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    Ok(figment.extract().map_err(Box::new)?)
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Ok(figment.merge(Toml::file(path))),
        Some("json") => Ok(figment.merge(Json::file(path))),
        _ => Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Wrapper {
        #[serde(default)]
        run: RunSettings,
    }

    #[test]
    fn test_run_settings_defaults() {
        let settings = RunSettings::default();
        assert_eq!(settings.root_dir, PathBuf::from("runs"));
        assert_eq!(settings.tag, "");
        assert_eq!(settings.log_sink, "file");
        assert_eq!(settings.log_file_name, "run.log");
    }

    #[test]
    fn test_file_layer_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tabrun.toml");
        std::fs::write(&path, "[run]\ntag = \"rf\"\n").unwrap();

        let loaded: Wrapper = load_layered(Some(&path), None).unwrap();
        assert_eq!(loaded.run.tag, "rf");
        assert_eq!(loaded.run.log_file_name, "run.log");
    }

    #[test]
    fn test_overrides_win_over_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tabrun.json");
        std::fs::write(&path, r#"{"run": {"tag": "from-file", "root_dir": "x"}}"#).unwrap();

        let overrides = serde_json::json!({"run": {"tag": "from-cli"}});
        let loaded: Wrapper = load_layered(Some(&path), Some(&overrides)).unwrap();
        assert_eq!(loaded.run.tag, "from-cli");
        assert_eq!(loaded.run.root_dir, PathBuf::from("x"));
    }

    #[test]
    fn test_missing_config_file() {
        let err = load_layered::<Wrapper>(Some(Path::new("/nonexistent/tabrun.toml")), None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }
}
