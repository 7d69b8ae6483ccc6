//! Daemon configuration

use arena_core::LaunchConfig;
use arena_core::error::ConfigError;
use arena_core::kube::KubeConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Configuration for the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Path to Unix socket
    pub socket_path: PathBuf,

    /// Replay upload URL, `{match_id}` is substituted per launch
    pub upload_url_template: String,

    /// Static launch configuration
    pub launch: LaunchConfig,

    /// API server connection
    pub kube: KubeConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let mut launch = LaunchConfig::default();
        if let Some(namespace) = arena_core::kube::in_cluster_namespace() {
            launch.namespace = namespace;
        }
        Self {
            socket_path: arena_core::config::default_socket_path(),
            upload_url_template: "http://replays/{match_id}".into(),
            launch,
            kube: KubeConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load from `$ARENA_CONFIG` if set, defaults otherwise
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os("ARENA_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw, arena_core::kube::in_cluster_namespace()).map_err(|source| {
            ConfigError::Parse {
                path: path.display().to_string(),
                source,
            }
        })
    }

    /// Parse a config document; a missing `launch.namespace` falls back to `detected`
    fn parse(raw: &str, detected: Option<String>) -> Result<Self, serde_json::Error> {
        let document: Value = serde_json::from_str(raw)?;
        let explicit = document
            .get("launch")
            .and_then(|launch| launch.get("namespace"))
            .is_some();
        let mut config: Self = serde_json::from_value(document)?;
        if let (false, Some(namespace)) = (explicit, detected) {
            config.launch.namespace = namespace;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_overrides_only_given_fields() {
        let path = std::env::temp_dir().join(format!("arena-daemon-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"upload_url_template":"https://s3/{match_id}","launch":{"namespace":"matches"}}"#,
        )
        .unwrap();

        let config = DaemonConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.upload_url_template, "https://s3/{match_id}");
        assert_eq!(config.launch.namespace, "matches");
        assert_eq!(config.launch.bot_uid, 2000);
    }

    #[test]
    fn detected_namespace_fills_partial_launch_section() {
        let raw = r#"{"launch":{"bot_uid":3000}}"#;
        let config = DaemonConfig::parse(raw, Some("matches".into())).unwrap();
        assert_eq!(config.launch.namespace, "matches");
        assert_eq!(config.launch.bot_uid, 3000);

        let config = DaemonConfig::parse("{}", Some("matches".into())).unwrap();
        assert_eq!(config.launch.namespace, "matches");

        let config = DaemonConfig::parse("{}", None).unwrap();
        assert_eq!(config.launch.namespace, "default");
    }

    #[test]
    fn explicit_namespace_wins_over_detected() {
        let raw = r#"{"launch":{"namespace":"default"}}"#;
        let config = DaemonConfig::parse(raw, Some("matches".into())).unwrap();
        assert_eq!(config.launch.namespace, "default");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = DaemonConfig::from_file(Path::new("/nonexistent/arena.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
