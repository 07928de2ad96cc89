// src/config/loader.rs
//! Layered configuration loader with validation and hot reload
//!
//! Files are merged in order (later files override earlier ones) on top of
//! the built-in defaults, then `VITALS_` environment variables are applied.
//! Nested keys use a double underscore: `VITALS_ESCALATION__COUNTDOWN_SECS=5`.

use crate::config::{constants::paths, SystemConfig};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{info, warn};

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Configuration validation errors: {}", .0.join("; "))]
    ValidationError(Vec<String>),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("File watcher error: {0}")]
    WatcherError(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Configuration loader with hot reload capabilities
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    env_prefix: String,
    current_config: Arc<RwLock<SystemConfig>>,
    change_notifier: Option<mpsc::Sender<SystemConfig>>,
    _file_watcher: Option<notify::RecommendedWatcher>,
}

impl ConfigLoader {
    /// Loader over the standard system, user and local locations
    pub fn new() -> Self {
        Self::with_paths(Self::discover_config_paths())
    }

    /// Create loader with custom paths
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths: paths,
            env_prefix: paths::ENV_PREFIX.to_string(),
            current_config: Arc::new(RwLock::new(SystemConfig::default())),
            change_notifier: None,
            _file_watcher: None,
        }
    }

    /// Use a different environment variable prefix
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    pub fn config_paths(&self) -> &[PathBuf] {
        &self.config_paths
    }

    /// Load system configuration with validation
    pub fn load_system_config(&mut self) -> Result<SystemConfig, ConfigError> {
        let config = self.load_and_merge_configs()?;
        *self.current_config.write() = config.clone();
        Ok(config)
    }

    pub fn get_current_config(&self) -> SystemConfig {
        self.current_config.read().clone()
    }

    /// Watch the configuration files and invoke `callback` with every valid reload
    ///
    /// Invalid edits are logged and ignored; the last good configuration stays current.
    pub fn enable_hot_reload(&mut self, callback: impl Fn(SystemConfig) + Send + 'static) -> Result<(), ConfigError> {
        let (tx, rx) = mpsc::channel::<SystemConfig>();
        self.change_notifier = Some(tx.clone());

        let config_ref = self.current_config.clone();
        thread::spawn(move || {
            while let Ok(new_config) = rx.recv() {
                *config_ref.write() = new_config.clone();
                callback(new_config);
            }
        });

        self.setup_file_watcher(tx)
    }

    /// Reload configuration manually
    pub fn reload(&mut self) -> Result<SystemConfig, ConfigError> {
        let config = self.load_and_merge_configs()?;
        *self.current_config.write() = config.clone();

        if let Some(ref notifier) = self.change_notifier {
            let _ = notifier.send(config.clone());
        }

        Ok(config)
    }

    /// Parse and validate a single file on top of the defaults
    pub fn validate_config_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let mut merged = Self::default_value()?;
        Self::merge_toml_values(&mut merged, Self::load_config_file(path)?);
        Self::finish(merged).map(|_| ())
    }

    /// Export current configuration to file
    pub fn export_config<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let config = self.get_current_config();
        let toml_content = toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Get configuration file modification times
    pub fn get_config_timestamps(&self) -> Vec<(PathBuf, Option<SystemTime>)> {
        self.config_paths
            .iter()
            .map(|path| {
                let timestamp = std::fs::metadata(path).and_then(|meta| meta.modified()).ok();
                (path.clone(), timestamp)
            })
            .collect()
    }

    fn load_and_merge_configs(&self) -> Result<SystemConfig, ConfigError> {
        let mut merged = Self::default_value()?;

        for config_path in &self.config_paths {
            match Self::load_config_file(config_path) {
                Ok(file_config) => Self::merge_toml_values(&mut merged, file_config),
                // Missing layers are optional
                Err(ConfigError::FileNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        self.apply_environment_overrides(&mut merged);
        Self::finish(merged)
    }

    fn default_value() -> Result<toml::Value, ConfigError> {
        toml::Value::try_from(SystemConfig::default()).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn finish(merged: toml::Value) -> Result<SystemConfig, ConfigError> {
        let config: SystemConfig = merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError(format!("Failed to deserialize config: {}", e)))?;
        config.validate_consistency().map_err(ConfigError::ValidationError)?;
        Ok(config)
    }

    fn load_config_file<P: AsRef<Path>>(path: P) -> Result<toml::Value, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let config: toml::Value = toml::from_str(&content)?;
        Ok(config)
    }

    fn merge_toml_values(base: &mut toml::Value, overlay: toml::Value) {
        match (base, overlay) {
            (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
                for (key, value) in overlay_table {
                    match base_table.get_mut(&key) {
                        Some(base_value) => Self::merge_toml_values(base_value, value),
                        None => {
                            base_table.insert(key, value);
                        }
                    }
                }
            }
            (base_value, overlay_value) => *base_value = overlay_value,
        }
    }

    fn apply_environment_overrides(&self, config: &mut toml::Value) {
        for (key, value) in std::env::vars() {
            let Some(stripped) = key.strip_prefix(&self.env_prefix) else {
                continue;
            };
            let config_key = stripped.to_lowercase().replace("__", ".");
            info!(key = %config_key, "configuration override from environment");
            Self::set_nested_value(config, &config_key, Self::parse_env_value(&value));
        }
    }

    fn parse_env_value(value: &str) -> toml::Value {
        if let Ok(int_val) = value.parse::<i64>() {
            toml::Value::Integer(int_val)
        } else if let Ok(float_val) = value.parse::<f64>() {
            toml::Value::Float(float_val)
        } else if let Ok(bool_val) = value.parse::<bool>() {
            toml::Value::Boolean(bool_val)
        } else {
            toml::Value::String(value.to_string())
        }
    }

    fn set_nested_value(config: &mut toml::Value, path: &str, value: toml::Value) {
        let parts: Vec<&str> = path.split('.').collect();
        let Some((last, parents)) = parts.split_last() else {
            return;
        };

        let mut current = config;
        for part in parents {
            let toml::Value::Table(table) = current else {
                return;
            };
            current = table
                .entry(part.to_string())
                .or_insert_with(|| toml::Value::Table(toml::value::Table::new()));
        }

        if let toml::Value::Table(table) = current {
            // Float fields given as integers keep their float type
            let value = match (table.get(*last), value) {
                (Some(toml::Value::Float(_)), toml::Value::Integer(i)) => toml::Value::Float(i as f64),
                (_, value) => value,
            };
            table.insert(last.to_string(), value);
        }
    }

    fn setup_file_watcher(&mut self, tx: mpsc::Sender<SystemConfig>) -> Result<(), ConfigError> {
        use notify::{DebouncedEvent, RecursiveMode, Watcher};

        let (watch_tx, watch_rx) = mpsc::channel();
        let mut watcher =
            notify::watcher(watch_tx, Duration::from_millis(500)).map_err(|e| ConfigError::WatcherError(e.to_string()))?;

        let mut watched_paths = std::collections::HashSet::new();
        for path in &self.config_paths {
            if let Some(parent) = path.parent() {
                if parent.exists() && watched_paths.insert(parent.to_path_buf()) {
                    watcher
                        .watch(parent, RecursiveMode::NonRecursive)
                        .map_err(|e| ConfigError::WatcherError(e.to_string()))?;
                }
            }
        }

        let config_paths = self.config_paths.clone();
        let env_prefix = self.env_prefix.clone();

        thread::spawn(move || {
            while let Ok(event) = watch_rx.recv() {
                let path = match event {
                    DebouncedEvent::Write(path) | DebouncedEvent::Create(path) => path,
                    _ => continue,
                };
                if !config_paths.iter().any(|p| p == &path) {
                    continue;
                }

                let loader = ConfigLoader::with_paths(config_paths.clone()).with_env_prefix(&env_prefix);
                match loader.load_and_merge_configs() {
                    Ok(new_config) => {
                        info!(path = %path.display(), "configuration reloaded");
                        if tx.send(new_config).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "rejected configuration reload"),
                }
            }
        });

        self._file_watcher = Some(watcher);
        Ok(())
    }

    fn discover_config_paths() -> Vec<PathBuf> {
        let mut config_paths = vec![PathBuf::from(paths::SYSTEM_CONFIG_PATH)];

        if let Some(home_dir) = dirs::home_dir() {
            config_paths.push(home_dir.join(paths::USER_CONFIG_DIR).join("config.toml"));
        }

        // Local configurations in order of precedence
        config_paths.push(PathBuf::from(paths::DEFAULT_CONFIG_FILE));
        config_paths.push(PathBuf::from(paths::LOCAL_CONFIG_FILE));

        config_paths
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var_os("USERPROFILE").map(PathBuf::from)
        }
        #[cfg(not(target_os = "windows"))]
        {
            std::env::var_os("HOME").map(PathBuf::from)
        }
    }
}
