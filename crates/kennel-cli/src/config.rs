//! Configuration vault – reads/writes `~/.kennel/config.toml`.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use kennel_runtime::EdgeServiceConfig;

/// Where gesture classifications come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierMode {
    /// POST frames to the remote vision service at `classifier_url`.
    #[default]
    Remote,
    /// A canned classifier for dry runs with no vision service around.
    Scripted,
}

impl std::fmt::Display for ClassifierMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifierMode::Remote => write!(f, "remote"),
            ClassifierMode::Scripted => write!(f, "scripted"),
        }
    }
}

/// Console log rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    /// Newline-delimited JSON for log aggregators.
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Compact => write!(f, "compact"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Persisted configuration stored in `~/.kennel/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the WebSocket gateway binds for robot connections.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Bus topic carrying inbound camera uploads.
    #[serde(default = "default_upload_topic")]
    pub upload_topic: String,

    /// Bus topic the controller publishes control envelopes on.
    #[serde(default = "default_control_topic")]
    pub control_topic: String,

    /// Fail-safe window length, in ticks.
    #[serde(default = "default_window_ticks")]
    pub watchdog_window_ticks: u32,

    /// Length of one fail-safe tick, in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub watchdog_tick_ms: u64,

    /// Chosen classifier backend.
    #[serde(default)]
    pub classifier_mode: ClassifierMode,

    /// Base URL of the vision service.
    #[serde(default = "default_classifier_url")]
    pub classifier_url: String,

    /// Bearer token for the vision service (stored as plain text – users
    /// should restrict file permissions on `~/.kennel/config.toml`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub classifier_auth_token: String,

    /// Console log rendering.
    #[serde(default)]
    pub log_format: LogFormat,

    /// OTLP collector base URL; empty disables span export.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub otlp_endpoint: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr)
            .field("upload_topic", &self.upload_topic)
            .field("control_topic", &self.control_topic)
            .field("watchdog_window_ticks", &self.watchdog_window_ticks)
            .field("watchdog_tick_ms", &self.watchdog_tick_ms)
            .field("classifier_mode", &self.classifier_mode)
            .field("classifier_url", &self.classifier_url)
            .field(
                "classifier_auth_token",
                if self.classifier_auth_token.is_empty() {
                    &"<not set>"
                } else {
                    &"<redacted>"
                },
            )
            .field("log_format", &self.log_format)
            .field("otlp_endpoint", &self.otlp_endpoint)
            .finish()
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8765".to_string()
}
fn default_upload_topic() -> String {
    "robot_upload".to_string()
}
fn default_control_topic() -> String {
    "control".to_string()
}
fn default_window_ticks() -> u32 {
    4
}
fn default_tick_ms() -> u64 {
    1_000
}
fn default_classifier_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            upload_topic: default_upload_topic(),
            control_topic: default_control_topic(),
            watchdog_window_ticks: default_window_ticks(),
            watchdog_tick_ms: default_tick_ms(),
            classifier_mode: ClassifierMode::default(),
            classifier_url: default_classifier_url(),
            classifier_auth_token: String::new(),
            log_format: LogFormat::default(),
            otlp_endpoint: String::new(),
        }
    }
}

impl Config {
    /// Map the persisted settings onto an [`EdgeServiceConfig`].
    pub fn edge_config(&self) -> EdgeServiceConfig {
        EdgeServiceConfig {
            upload_topic: self.upload_topic.clone(),
            control_topic: self.control_topic.clone(),
            // The registry requires at least one tick per window, and a
            // zero-length tick would spin.
            watchdog_window_ticks: self.watchdog_window_ticks.max(1),
            watchdog_tick: Duration::from_millis(self.watchdog_tick_ms.max(1)),
        }
    }
}

/// Return the path to `~/.kennel/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".kennel").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `KENNEL_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `KENNEL_LISTEN_ADDR` | `listen_addr` |
/// | `KENNEL_CLASSIFIER_URL` | `classifier_url` |
/// | `KENNEL_CLASSIFIER_TOKEN` | `classifier_auth_token` |
/// | `KENNEL_CLASSIFIER_MODE` | `classifier_mode` (`remote` / `scripted`) |
/// | `KENNEL_WATCHDOG_WINDOW_TICKS` | `watchdog_window_ticks` |
/// | `KENNEL_WATCHDOG_TICK_MS` | `watchdog_tick_ms` |
/// | `KENNEL_LOG_FORMAT` | `log_format` (`compact` / `json`) |
/// | `KENNEL_OTLP_ENDPOINT` | `otlp_endpoint` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("KENNEL_LISTEN_ADDR") {
        cfg.listen_addr = v;
    }
    if let Ok(v) = std::env::var("KENNEL_CLASSIFIER_URL") {
        cfg.classifier_url = v;
    }
    if let Ok(v) = std::env::var("KENNEL_CLASSIFIER_TOKEN") {
        cfg.classifier_auth_token = v;
    }
    if let Ok(v) = std::env::var("KENNEL_CLASSIFIER_MODE") {
        match v.to_lowercase().as_str() {
            "remote" => cfg.classifier_mode = ClassifierMode::Remote,
            "scripted" => cfg.classifier_mode = ClassifierMode::Scripted,
            _ => {}
        }
    }
    if let Ok(v) = std::env::var("KENNEL_WATCHDOG_WINDOW_TICKS")
        && let Ok(ticks) = v.parse::<u32>() {
            cfg.watchdog_window_ticks = ticks;
        }
    if let Ok(v) = std::env::var("KENNEL_WATCHDOG_TICK_MS")
        && let Ok(ms) = v.parse::<u64>() {
            cfg.watchdog_tick_ms = ms;
        }
    if let Ok(v) = std::env::var("KENNEL_LOG_FORMAT") {
        match v.to_lowercase().as_str() {
            "compact" => cfg.log_format = LogFormat::Compact,
            "json" => cfg.log_format = LogFormat::Json,
            _ => {}
        }
    }
    if let Ok(v) = std::env::var("KENNEL_OTLP_ENDPOINT") {
        cfg.otlp_endpoint = v;
    }
}

/// Save the config to disk, creating `~/.kennel/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Restrict the config directory to the owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    // Write the file with owner-only read/write (rw-------) on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_debug_redacts_the_auth_token() {
        let mut cfg = Config::default();
        cfg.classifier_auth_token = "kn-super-secret".to_string();
        let debug_str = format!("{:?}", cfg);
        assert!(
            !debug_str.contains("kn-super-secret"),
            "auth token must not appear in debug output"
        );
        assert!(
            debug_str.contains("<redacted>"),
            "debug output must show <redacted> for a set token"
        );
    }

    #[test]
    fn config_debug_shows_not_set_for_an_empty_token() {
        let cfg = Config::default();
        let debug_str = format!("{:?}", cfg);
        assert!(
            debug_str.contains("<not set>"),
            "empty auth token must show <not set> in debug output"
        );
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config::default();
        save_to(&cfg, &path).expect("save");

        let file_meta = std::fs::metadata(&path).expect("file metadata");
        let file_mode = file_meta.permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600, "config file must have 0o600 permissions");

        let dir_meta = std::fs::metadata(path.parent().unwrap()).expect("dir metadata");
        let dir_mode = dir_meta.permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700, "config directory must have 0o700 permissions");
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config::default();
        save_to(&cfg, &path).expect("save");

        // Assert on fields no env-override test touches, so parallel test
        // threads cannot interfere through the process environment.
        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.upload_topic, "robot_upload");
        assert_eq!(loaded.control_topic, "control");
        assert!(loaded.classifier_auth_token.is_empty());
        assert!(loaded.otlp_endpoint.is_empty());
    }

    #[test]
    fn config_path_points_to_kennel_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".kennel"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        let result = load_from(&path).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn edge_config_maps_the_watchdog_settings() {
        let mut cfg = Config::default();
        cfg.watchdog_window_ticks = 6;
        cfg.watchdog_tick_ms = 250;
        let edge = cfg.edge_config();
        assert_eq!(edge.upload_topic, "robot_upload");
        assert_eq!(edge.control_topic, "control");
        assert_eq!(edge.watchdog_window_ticks, 6);
        assert_eq!(edge.watchdog_tick, Duration::from_millis(250));
    }

    #[test]
    fn edge_config_never_yields_a_zero_window() {
        let mut cfg = Config::default();
        cfg.watchdog_window_ticks = 0;
        cfg.watchdog_tick_ms = 0;
        let edge = cfg.edge_config();
        assert_eq!(edge.watchdog_window_ticks, 1);
        assert_eq!(edge.watchdog_tick, Duration::from_millis(1));
    }

    #[test]
    fn apply_env_overrides_changes_classifier_url() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("KENNEL_CLASSIFIER_URL", "http://vision-host:8000") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.classifier_url, "http://vision-host:8000");
        unsafe { std::env::remove_var("KENNEL_CLASSIFIER_URL") };
    }

    #[test]
    fn apply_env_overrides_changes_classifier_mode() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("KENNEL_CLASSIFIER_MODE", "scripted") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.classifier_mode, ClassifierMode::Scripted);
        unsafe { std::env::remove_var("KENNEL_CLASSIFIER_MODE") };
    }

    #[test]
    fn apply_env_overrides_changes_window_ticks() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("KENNEL_WATCHDOG_WINDOW_TICKS", "8") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.watchdog_window_ticks, 8);
        unsafe { std::env::remove_var("KENNEL_WATCHDOG_WINDOW_TICKS") };
    }

    #[test]
    fn apply_env_overrides_ignores_an_invalid_tick() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("KENNEL_WATCHDOG_TICK_MS", "soon") };
        let mut cfg = Config::default();
        let original = cfg.watchdog_tick_ms;
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.watchdog_tick_ms, original);
        unsafe { std::env::remove_var("KENNEL_WATCHDOG_TICK_MS") };
    }

    #[test]
    fn apply_env_overrides_changes_listen_addr() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("KENNEL_LISTEN_ADDR", "127.0.0.1:9900") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.listen_addr, "127.0.0.1:9900");
        unsafe { std::env::remove_var("KENNEL_LISTEN_ADDR") };
    }

    #[test]
    fn apply_env_overrides_changes_log_format() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("KENNEL_LOG_FORMAT", "json") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.log_format, LogFormat::Json);
        unsafe { std::env::remove_var("KENNEL_LOG_FORMAT") };
    }
}
