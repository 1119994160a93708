// Configuration provider: a JSON file next to the executable, merged with
// built-in defaults and per-invocation command line overrides.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Effective client settings for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub python_version: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Keys this client does not know about, kept so a save does not drop them.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            python_version: None,
            timeout: DEFAULT_TIMEOUT_SECS,
            extra: serde_json::Map::new(),
        }
    }
}

impl Configuration {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Base URL without a trailing slash, ready for endpoint concatenation.
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Apply command line overrides on top of the loaded values.
    pub fn with_overrides(mut self, overrides: &Overrides) -> Self {
        if let Some(url) = &overrides.base_url {
            self.base_url = url.clone();
        }
        if let Some(timeout) = overrides.timeout {
            self.timeout = timeout;
        }
        self
    }

    /// A request must not be built from a configuration that fails here.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::validation("base_url must not be empty"));
        }
        reqwest::Url::parse(&self.base_url).map_err(|e| {
            Error::validation(format!("invalid base_url '{}': {}", self.base_url, e))
        })?;
        if self.timeout == 0 {
            return Err(Error::validation("timeout must be a positive number of seconds"));
        }
        Ok(())
    }
}

/// Values supplied on the command line for this invocation only.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub timeout: Option<u64>,
}

/// Reads and writes the configuration file at an explicit path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the given path, or at `default_config_path()` when absent.
    pub fn resolve(path: Option<PathBuf>) -> Self {
        Self::new(path.unwrap_or_else(default_config_path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file, filling missing keys from defaults. A missing file
    /// yields the defaults; an unreadable one is reported and ignored.
    pub fn load(&self) -> Configuration {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no config file at {}, using defaults", self.path.display());
                return Configuration::default();
            }
            Err(e) => {
                warn!("failed to read config file {} ({}), using defaults", self.path.display(), e);
                return Configuration::default();
            }
        };

        let mut map = match serde_json::from_str::<serde_json::Map<String, Value>>(&content) {
            Ok(map) => map,
            Err(e) => {
                warn!("failed to parse config file {} ({}), using defaults", self.path.display(), e);
                return Configuration::default();
            }
        };

        // A bad value only resets its own key.
        for key in invalid_keys(&map) {
            warn!(
                "invalid '{}' in config file {}, using default",
                key,
                self.path.display()
            );
            map.remove(key);
        }

        match serde_json::from_value::<Configuration>(Value::Object(map)) {
            Ok(config) => config,
            Err(e) => {
                warn!("failed to parse config file {} ({}), using defaults", self.path.display(), e);
                Configuration::default()
            }
        }
    }

    pub fn save(&self, config: &Configuration) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(config).map_err(std::io::Error::from)?;
        fs::write(&self.path, content)?;
        debug!("saved config to {}", self.path.display());
        Ok(())
    }
}

/// Known keys whose values cannot be used.
fn invalid_keys(map: &serde_json::Map<String, Value>) -> Vec<&'static str> {
    let mut invalid = Vec::new();
    if map.get("base_url").is_some_and(|v| !v.is_string()) {
        invalid.push("base_url");
    }
    if map
        .get("python_version")
        .is_some_and(|v| !(v.is_null() || v.is_string()))
    {
        invalid.push("python_version");
    }
    if map
        .get("timeout")
        .is_some_and(|v| !v.as_u64().is_some_and(|secs| secs > 0))
    {
        invalid.push("timeout");
    }
    invalid
}

/// `config.json` beside the running executable, falling back to a file in
/// the user's home directory when the executable path is unknown.
pub fn default_config_path() -> PathBuf {
    match std::env::current_exe() {
        Ok(exe) => match exe.parent() {
            Some(dir) => dir.join(CONFIG_FILE_NAME),
            None => home_config_path(),
        },
        Err(_) => home_config_path(),
    }
}

fn home_config_path() -> PathBuf {
    let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.join(".pyencrypt").join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_with(content: &str) -> (tempfile::TempDir, ConfigStore) {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, content).unwrap();
        (dir, ConfigStore::new(path))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("absent.json"));
        assert_eq!(store.load(), Configuration::default());
    }

    #[test]
    fn missing_keys_are_filled_and_present_keys_kept() {
        let cases = [
            (r#"{}"#, DEFAULT_BASE_URL, None, DEFAULT_TIMEOUT_SECS),
            (r#"{"base_url": "http://enc:5050"}"#, "http://enc:5050", None, DEFAULT_TIMEOUT_SECS),
            (r#"{"python_version": "3.11"}"#, DEFAULT_BASE_URL, Some("3.11"), DEFAULT_TIMEOUT_SECS),
            (r#"{"timeout": 60}"#, DEFAULT_BASE_URL, None, 60),
            (
                r#"{"base_url": "http://enc:5050", "timeout": 10}"#,
                "http://enc:5050",
                None,
                10,
            ),
        ];

        for (content, base_url, python_version, timeout) in cases {
            let (_dir, store) = store_with(content);
            let config = store.load();
            assert_eq!(config.base_url, base_url, "{}", content);
            assert_eq!(config.python_version.as_deref(), python_version, "{}", content);
            assert_eq!(config.timeout, timeout, "{}", content);
        }
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let (_dir, store) = store_with("{ not json");
        assert_eq!(store.load(), Configuration::default());
    }

    #[test]
    fn bad_value_resets_only_its_own_key() {
        let cases = [
            r#"{"base_url": "http://enc:5050", "python_version": "3.11", "timeout": null}"#,
            r#"{"base_url": "http://enc:5050", "python_version": "3.11", "timeout": -5}"#,
            r#"{"base_url": "http://enc:5050", "python_version": "3.11", "timeout": 0}"#,
        ];
        for content in cases {
            let (_dir, store) = store_with(content);
            let config = store.load();
            assert_eq!(config.base_url, "http://enc:5050", "{}", content);
            assert_eq!(config.python_version.as_deref(), Some("3.11"), "{}", content);
            assert_eq!(config.timeout, DEFAULT_TIMEOUT_SECS, "{}", content);
        }

        let (_dir, store) = store_with(r#"{"base_url": 42, "python_version": 3.11, "timeout": 60}"#);
        let config = store.load();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.python_version, None);
        assert_eq!(config.timeout, 60);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nested").join(CONFIG_FILE_NAME));
        let mut config = Configuration {
            base_url: "https://encrypt.example.com".into(),
            python_version: Some("3.9".into()),
            timeout: 45,
            extra: serde_json::Map::new(),
        };
        config
            .extra
            .insert("team".into(), serde_json::Value::String("build".into()));

        store.save(&config).unwrap();
        assert_eq!(store.load(), config);
    }

    #[test]
    fn save_keeps_null_python_version_key() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join(CONFIG_FILE_NAME));
        store.save(&Configuration::default()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        let object = raw.as_object().unwrap();
        assert!(object.contains_key("python_version"));
        assert_eq!(object["timeout"], 300);
        assert_eq!(object["base_url"], DEFAULT_BASE_URL);
    }

    #[test]
    fn overrides_replace_only_given_values() {
        let config = Configuration {
            python_version: Some("3.9".into()),
            ..Default::default()
        }
        .with_overrides(&Overrides {
            base_url: Some("http://other:8080/".into()),
            timeout: None,
        });

        assert_eq!(config.base_url(), "http://other:8080");
        assert_eq!(config.timeout(), Duration::from_secs(300));
        assert_eq!(config.python_version.as_deref(), Some("3.9"));
    }

    #[test]
    fn validate_rejects_empty_url_and_zero_timeout() {
        let empty = Configuration {
            base_url: " ".into(),
            ..Default::default()
        };
        assert!(matches!(empty.validate(), Err(Error::Validation(_))));

        let zero = Configuration {
            timeout: 0,
            ..Default::default()
        };
        assert!(matches!(zero.validate(), Err(Error::Validation(_))));

        assert!(Configuration::default().validate().is_ok());
    }
}
