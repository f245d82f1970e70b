use crate::types::FingerType;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "http://localhost:8080/api/fingerprint";
const DEFAULT_PREVIEW_URL: &str = "ws://localhost:8080/ws-fingerprint/websocket";
const DEFAULT_PREVIEW_TOPIC: &str = "/topic/fingerprint";

/// Panel configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// Base URL of the capture service REST API
    pub api_base: String,
    /// WebSocket endpoint carrying the STOMP preview subscription
    pub preview_url: String,
    /// Topic the preview frames are published on
    pub preview_topic: String,
    /// Period of the device status check while connected
    pub status_poll_interval: Duration,
    /// Per-request HTTP timeout (multi-finger captures block on the operator)
    pub request_timeout: Duration,
    /// How long notifications stay visible
    pub notification_ttl: Duration,
    /// Finger condition filter a new session starts with
    pub default_finger_type: FingerType,
    /// File the generated templates are persisted to
    pub template_store_path: PathBuf,
    /// Directory saved captures are written to
    pub capture_export_dir: PathBuf,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            preview_url: DEFAULT_PREVIEW_URL.to_string(),
            preview_topic: DEFAULT_PREVIEW_TOPIC.to_string(),
            status_poll_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(60),
            notification_ttl: Duration::from_secs(5),
            default_finger_type: FingerType::Normal,
            template_store_path: default_template_store_path(),
            capture_export_dir: PathBuf::from("."),
        }
    }
}

impl PanelConfig {
    /// Load configuration from environment variables (and `.env` if present)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let default_finger_type = match lookup("DEFAULT_FINGER_TYPE") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(format!("DEFAULT_FINGER_TYPE={}", value)))?,
            None => defaults.default_finger_type,
        };

        Ok(Self {
            api_base: lookup("FINGERPRINT_API_BASE")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            preview_url: lookup("FINGERPRINT_PREVIEW_URL").unwrap_or(defaults.preview_url),
            preview_topic: lookup("FINGERPRINT_PREVIEW_TOPIC").unwrap_or(defaults.preview_topic),
            status_poll_interval: seconds(&lookup, "STATUS_POLL_INTERVAL_SECS")?
                .unwrap_or(defaults.status_poll_interval),
            request_timeout: seconds(&lookup, "REQUEST_TIMEOUT_SECS")?
                .unwrap_or(defaults.request_timeout),
            notification_ttl: seconds(&lookup, "NOTIFICATION_TTL_SECS")?
                .unwrap_or(defaults.notification_ttl),
            default_finger_type,
            template_store_path: lookup("TEMPLATE_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.template_store_path),
            capture_export_dir: lookup("CAPTURE_EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.capture_export_dir),
        })
    }
}

fn seconds<F>(lookup: &F, key: &str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };

    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(format!("{}={}", key, raw)))?;

    if secs == 0 {
        return Err(ConfigError::InvalidValue(format!("{} must be positive", key)));
    }

    Ok(Some(Duration::from_secs(secs)))
}

fn default_template_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fingerprint-panel")
        .join("templates.json")
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
