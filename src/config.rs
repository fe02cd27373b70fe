use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};

use lotes_core::{LocalStore, SyncSettings};

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

fn mask_token<S: Serializer>(token: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    match token {
        Some(t) => s.serialize_some(&masked(t)),
        None => s.serialize_none(),
    }
}

/// First characters of a secret, enough to recognize it.
pub fn masked(token: &str) -> String {
    let shown: String = token.chars().take(4).collect();
    format!("{}...", shown)
}

/// Remote sync configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncConfig {
    /// Repository as `owner/name`
    pub repo: Option<String>,
    /// Access token for the content API
    #[serde(serialize_with = "mask_token")]
    pub token: Option<String>,
    /// Preferred branch (default: main)
    pub branch: Option<String>,
    /// Path of the ledger file inside the repository
    pub file_path: Option<String>,
    /// API base URL (default: https://api.github.com)
    pub api_base: Option<String>,
    /// Push automatically after writes (default: false)
    #[serde(default)]
    pub auto_sync: bool,
}

impl SyncConfig {
    /// Returns true if sync is configured (has both repo and token)
    pub fn is_configured(&self) -> bool {
        self.repo.is_some() && self.token.is_some()
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory holding the ledger, sync meta and backups
    pub data_dir: ConfigValue<PathBuf>,
    /// Name recorded in remote commits
    pub user: ConfigValue<Option<String>>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    /// Sync configuration
    pub sync: SyncConfig,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    user: Option<String>,
    sync: Option<SyncConfig>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut user = ConfigValue::new(None, ConfigSource::Default);
        let mut config_file = None;
        let mut sync = SyncConfig::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(dir) = file_config.data_dir {
                // Resolve relative paths against config file's directory
                let resolved = if dir.is_relative() {
                    path.parent().map(|p| p.join(&dir)).unwrap_or(dir)
                } else {
                    dir
                };
                data_dir = ConfigValue::new(resolved, ConfigSource::File);
            }
            if let Some(name) = file_config.user {
                user = ConfigValue::new(Some(name), ConfigSource::File);
            }
            if let Some(sync_config) = file_config.sync {
                sync = sync_config;
            }
        }

        if let Ok(dir) = std::env::var("LOTES_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(name) = std::env::var("LOTES_USER") {
            user = ConfigValue::new(Some(name), ConfigSource::Environment);
        }
        if let Ok(repo) = std::env::var("LOTES_REPO") {
            sync.repo = Some(repo);
        }
        if let Ok(token) = std::env::var("LOTES_TOKEN") {
            sync.token = Some(token);
        }
        if let Ok(branch) = std::env::var("LOTES_BRANCH") {
            sync.branch = Some(branch);
        }

        Ok(Self {
            data_dir,
            user,
            config_file,
            sync,
        })
    }

    /// Local file layout rooted at the data directory.
    pub fn store(&self) -> LocalStore {
        LocalStore::new(self.data_dir.value.clone())
    }

    /// Settings value handed to the sync engine.
    pub fn sync_settings(&self) -> SyncSettings {
        let defaults = SyncSettings::default();
        SyncSettings {
            repo: self.sync.repo.clone(),
            token: self.sync.token.clone(),
            user: self.user.value.clone(),
            branch: self.sync.branch.clone().unwrap_or(defaults.branch),
            file_path: self.sync.file_path.clone().unwrap_or(defaults.file_path),
            api_base: self.sync.api_base.clone().unwrap_or(defaults.api_base),
        }
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/lotes/
    /// - macOS: ~/Library/Application Support/lotes/
    /// - Windows: %APPDATA%/lotes/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lotes")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/lotes/
    /// - macOS: ~/Library/Application Support/lotes/
    /// - Windows: %APPDATA%/lotes/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lotes")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

/// Collapses whitespace and capitalizes each word: `"jUAN  pablo"` -> `"Juan Pablo"`.
pub fn normalize_user(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Sets `user` in the config file, keeping every other key.
pub fn save_user(path: &Path, user: &str) -> Result<(), ConfigError> {
    let mut doc = if path.exists() {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e))?
    } else {
        serde_yaml::Value::Null
    };

    if !doc.is_mapping() {
        doc = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
    }
    if let serde_yaml::Value::Mapping(map) = &mut doc {
        map.insert("user".into(), user.into());
    }

    let contents = serde_yaml::to_string(&doc)
        .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::WriteError(path.to_path_buf(), e))?;
    }
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteError(path.to_path_buf(), e))
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    WriteError(PathBuf, std::io::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::WriteError(path, e) => {
                write!(f, "Failed to write config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load(Some(config_path)).unwrap();
        assert!(config.data_dir.value.ends_with("lotes"));
        assert_eq!(config.data_dir.source, ConfigSource::Default);
        assert_eq!(config.user.source, ConfigSource::Default);
        assert!(config.config_file.is_none());
        assert!(!config.sync.auto_sync);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "data_dir: /srv/lotes").unwrap();
        writeln!(file, "user: Ana").unwrap();
        writeln!(file, "sync:").unwrap();
        writeln!(file, "  repo: acme/lotes").unwrap();
        writeln!(file, "  token: ghp_secret").unwrap();
        writeln!(file, "  branch: develop").unwrap();
        writeln!(file, "  auto_sync: true").unwrap();

        let config = Config::load(Some(config_path.clone())).unwrap();
        assert_eq!(config.data_dir.value, PathBuf::from("/srv/lotes"));
        assert_eq!(config.data_dir.source, ConfigSource::File);
        assert_eq!(config.user.value.as_deref(), Some("Ana"));
        assert_eq!(config.config_file, Some(config_path));
        assert!(config.sync.is_configured());
        assert!(config.sync.auto_sync);

        let settings = config.sync_settings();
        assert_eq!(settings.branch, "develop");
        assert_eq!(settings.file_path, "lotes_template.csv");
        assert_eq!(settings.user.as_deref(), Some("Ana"));
    }

    #[test]
    fn test_relative_data_dir_resolves_against_config_dir() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "data_dir: datos\n").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.data_dir.value, temp_dir.path().join("datos"));
    }

    #[test]
    #[ignore] // Run with --ignored; env vars can pollute parallel tests
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "user: fromfile\n").unwrap();

        std::env::set_var("LOTES_USER", "fromenv");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.user.value.as_deref(), Some("fromenv"));
        assert_eq!(config.user.source, ConfigSource::Environment);

        std::env::remove_var("LOTES_USER");
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "invalid: yaml: content: [\n").unwrap();

        let err = Config::load(Some(config_path)).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_token_is_masked_in_json() {
        let sync = SyncConfig {
            token: Some("ghp_abcdef123456".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&sync).unwrap();
        assert!(json.contains("ghp_..."));
        assert!(!json.contains("abcdef"));
    }

    #[test]
    fn test_normalize_user() {
        assert_eq!(normalize_user("jUAN  pablo"), "Juan Pablo");
        assert_eq!(normalize_user("  ana "), "Ana");
        assert_eq!(normalize_user("ÁLVARO núñez"), "Álvaro Núñez");
        assert_eq!(normalize_user("   "), "");
    }

    #[test]
    fn test_save_user_keeps_other_keys() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "user: old\nsync:\n  repo: acme/lotes\n").unwrap();

        save_user(&config_path, "Juan Pablo").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.user.value.as_deref(), Some("Juan Pablo"));
        assert_eq!(config.sync.repo.as_deref(), Some("acme/lotes"));
    }

    #[test]
    fn test_save_user_creates_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.yaml");

        save_user(&config_path, "Ana").unwrap();
        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.user.value.as_deref(), Some("Ana"));
    }
}
