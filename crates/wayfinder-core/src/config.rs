//! Background service configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the settings database
    pub database_path: PathBuf,
    /// Upper bound on a one-shot backend query
    pub backend_timeout_ms: u64,
    /// Simulated backend: delay before a one-shot answer
    pub response_delay_ms: u64,
    /// Simulated backend: pause between streamed words
    pub chunk_delay_ms: u64,
    /// How long a tab gets to answer an action
    pub action_timeout_ms: u64,
    /// Page opened on first install, relative to the extension root
    pub welcome_page: String,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("wayfinder.db"),
            backend_timeout_ms: 30_000,
            response_delay_ms: 1_000,
            chunk_delay_ms: 100,
            action_timeout_ms: 10_000,
            welcome_page: "docs/welcome.html".to_string(),
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("Wayfinder"))
            .unwrap_or_else(|| PathBuf::from(".wayfinder"))
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    pub fn response_delay(&self) -> Duration {
        Duration::from_millis(self.response_delay_ms)
    }

    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = Config::new(PathBuf::from("/tmp/wf"));
        assert_eq!(config.database_path, PathBuf::from("/tmp/wf/wayfinder.db"));
        assert_eq!(config.backend_timeout(), Duration::from_secs(30));
        assert_eq!(config.chunk_delay(), Duration::from_millis(100));
        assert_eq!(config.welcome_page, "docs/welcome.html");
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = serde_json::from_value(json!({ "chunk_delay_ms": 5 })).unwrap();
        assert_eq!(config.chunk_delay_ms, 5);
        assert_eq!(config.action_timeout_ms, 10_000);
    }
}
