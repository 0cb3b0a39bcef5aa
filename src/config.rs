//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CALLDESK_CONFIG_PATH";
/// Default listen port when neither the environment nor the file names one.
const DEFAULT_PORT: u16 = 4000;

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// TCP port the HTTP/WebSocket server listens on.
    pub port: u16,
    /// Minimum dwell between consecutive public call-outs.
    pub announcement_dwell: Duration,
    /// How often the liveness sweeper checks sessions.
    pub heartbeat_interval: Duration,
    /// Silence threshold after which a session is force-disconnected.
    pub heartbeat_timeout: Duration,
    /// Debounce window between an in-memory mutation and its durable write.
    pub persist_debounce: Duration,
    /// Location of the persisted queue snapshot.
    pub snapshot_path: PathBuf,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    ///
    /// `PORT` (or `SERVER_PORT`) in the environment wins over the file for
    /// the listen port, matching how the companion UI process is pointed at
    /// the backend.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration");
                    raw.into()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        if let Some(port) = port_from_env() {
            config.port = port;
        }
        config
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            announcement_dwell: Duration::from_secs(6),
            heartbeat_interval: Duration::from_secs(10),
            heartbeat_timeout: Duration::from_secs(45),
            persist_debounce: Duration::from_millis(2_000),
            snapshot_path: PathBuf::from("data/queue-state.json"),
        }
    }
}

/// JSON representation of the configuration file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    port: Option<u16>,
    announcement_dwell_secs: Option<u64>,
    heartbeat_interval_secs: Option<u64>,
    heartbeat_timeout_secs: Option<u64>,
    persist_debounce_ms: Option<u64>,
    snapshot_path: Option<PathBuf>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            port: raw.port.unwrap_or(defaults.port),
            announcement_dwell: raw
                .announcement_dwell_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.announcement_dwell),
            heartbeat_interval: raw
                .heartbeat_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.heartbeat_interval),
            heartbeat_timeout: raw
                .heartbeat_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.heartbeat_timeout),
            persist_debounce: raw
                .persist_debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.persist_debounce),
            snapshot_path: raw.snapshot_path.unwrap_or(defaults.snapshot_path),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn port_from_env() -> Option<u16> {
    env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_knobs() {
        let config = AppConfig::default();
        assert_eq!(config.port, 4000);
        assert_eq!(config.announcement_dwell, Duration::from_secs(6));
        assert!(config.heartbeat_timeout > config.heartbeat_interval);
    }

    #[test]
    fn partial_files_keep_defaults_for_missing_knobs() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"port": 4100, "announcement_dwell_secs": 3}"#).unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.port, 4100);
        assert_eq!(config.announcement_dwell, Duration::from_secs(3));
        assert_eq!(config.persist_debounce, Duration::from_millis(2_000));
    }
}
