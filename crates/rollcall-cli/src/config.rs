use rollcall_core::Timing;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root URL of the face backend (default: http://localhost:5000).
    pub server_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Delay before moving to the next enrollment slot after a success.
    pub advance_delay_ms: u64,
    /// Delay before showing results after the last enrollment image.
    pub complete_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".to_string(),
            request_timeout_secs: 30,
            advance_delay_ms: 1000,
            complete_delay_ms: 1500,
        }
    }
}

/// On-disk TOML layout. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    server_url: Option<String>,
    request_timeout_secs: Option<u64>,
    advance_delay_ms: Option<u64>,
    complete_delay_ms: Option<u64>,
}

impl Config {
    /// Defaults, then the TOML file named by `ROLLCALL_CONFIG` (if set),
    /// then `ROLLCALL_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("ROLLCALL_CONFIG") {
            config.merge_file(Path::new(&path))?;
        }
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn merge_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");

        if let Some(v) = file.server_url {
            self.server_url = v;
        }
        if let Some(v) = file.request_timeout_secs {
            self.request_timeout_secs = v;
        }
        if let Some(v) = file.advance_delay_ms {
            self.advance_delay_ms = v;
        }
        if let Some(v) = file.complete_delay_ms {
            self.complete_delay_ms = v;
        }
        Ok(())
    }

    /// Apply `ROLLCALL_*` overrides; unparseable numbers keep the current value.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("ROLLCALL_SERVER_URL") {
            self.server_url = url;
        }
        self.request_timeout_secs = env_u64(&lookup, "ROLLCALL_REQUEST_TIMEOUT_SECS", self.request_timeout_secs);
        self.advance_delay_ms = env_u64(&lookup, "ROLLCALL_ADVANCE_DELAY_MS", self.advance_delay_ms);
        self.complete_delay_ms = env_u64(&lookup, "ROLLCALL_COMPLETE_DELAY_MS", self.complete_delay_ms);
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn timing(&self) -> Timing {
        Timing {
            advance_delay: Duration::from_millis(self.advance_delay_ms),
            complete_delay: Duration::from_millis(self.complete_delay_ms),
        }
    }
}

fn env_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server_url, "http://localhost:5000");
        assert_eq!(config.timing(), Timing::default());
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("ROLLCALL_SERVER_URL", "http://faces.local:8080"),
            ("ROLLCALL_ADVANCE_DELAY_MS", "250"),
            ("ROLLCALL_COMPLETE_DELAY_MS", "not-a-number"),
        ]));
        assert_eq!(config.server_url, "http://faces.local:8080");
        assert_eq!(config.advance_delay_ms, 250);
        assert_eq!(config.complete_delay_ms, 1500);
    }

    #[test]
    fn test_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollcall.toml");
        std::fs::write(
            &path,
            "server_url = \"http://school:5000\"\nrequest_timeout_secs = 5\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.merge_file(&path).unwrap();
        assert_eq!(config.server_url, "http://school:5000");
        assert_eq!(config.request_timeout_secs, 5);

        config.apply_env(env(&[("ROLLCALL_REQUEST_TIMEOUT_SECS", "12")]));
        assert_eq!(config.server_url, "http://school:5000");
        assert_eq!(config.request_timeout_secs, 12);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollcall.toml");
        std::fs::write(&path, "sever_url = \"typo\"\n").unwrap();

        let err = Config::default().merge_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::default()
            .merge_file(&dir.path().join("absent.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
