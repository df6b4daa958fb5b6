//! Configuration – reads/writes `~/.rbcam/config.toml`.
//!
//! Precedence, lowest first: built-in defaults, the TOML file,
//! `RBCAM_*` environment variables, command-line arguments.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use rbcam_bridge::{Endpoint, WireCodec};
use rbcam_runtime::{SessionConfig, SupervisorConfig};
use rbcam_types::{DEFAULT_FRAME_ID, DEFAULT_IMAGE_TOPIC, DEFAULT_STATUS_TOPIC, RbError};
use serde::{Deserialize, Serialize};

/// Where frames come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CameraSource {
    /// Built-in moving test pattern.
    Sim,
    /// OpenCV `VideoCapture` (needs the `opencv-capture` feature).
    Opencv,
}

impl Default for CameraSource {
    fn default() -> Self {
        if cfg!(feature = "opencv-capture") {
            CameraSource::Opencv
        } else {
            CameraSource::Sim
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub source: CameraSource,
    /// Capture device index for the OpenCV source.
    pub index: i32,
    /// Show captured frames in a window (OpenCV source only).
    pub preview: bool,
    pub sim_width: u32,
    pub sim_height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: CameraSource::default(),
            index: 0,
            preview: true,
            sim_width: 640,
            sim_height: 480,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub image_topic: String,
    pub status_topic: String,
    pub frame_id: String,
    pub frame_count: u32,
    pub frame_interval_ms: u64,
    pub settle_delay_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            image_topic: DEFAULT_IMAGE_TOPIC.to_string(),
            status_topic: DEFAULT_STATUS_TOPIC.to_string(),
            frame_id: DEFAULT_FRAME_ID.to_string(),
            frame_count: 300,
            frame_interval_ms: 50,
            settle_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub retry_delay_ms: u64,
    pub connect_timeout_ms: u64,
    /// Unlimited when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            retry_delay_ms: 5000,
            connect_timeout_ms: 5000,
            max_attempts: None,
        }
    }
}

/// Persisted configuration stored in `~/.rbcam/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// rosbridge server host for the raw TCP transport.
    #[serde(default = "default_host")]
    pub host: String,

    /// rosbridge server port for the raw TCP transport.
    #[serde(default = "default_port")]
    pub port: u16,

    /// WebSocket URL; when set it replaces `host`/`port`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_url: Option<String>,

    #[serde(default)]
    pub codec: WireCodec,

    #[serde(default)]
    pub camera: CameraConfig,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ws_url: None,
            codec: WireCodec::default(),
            camera: CameraConfig::default(),
            session: SessionSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl Config {
    pub fn endpoint(&self) -> Result<Endpoint, RbError> {
        match &self.ws_url {
            Some(url) => Endpoint::parse(url),
            None => Ok(Endpoint::tcp(self.host.clone(), self.port)),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            image_topic: self.session.image_topic.clone(),
            status_topic: self.session.status_topic.clone(),
            frame_id: self.session.frame_id.clone(),
            frame_count: self.session.frame_count,
            frame_interval: Duration::from_millis(self.session.frame_interval_ms),
            settle_delay: Duration::from_millis(self.session.settle_delay_ms),
        }
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            retry_delay: Duration::from_millis(self.retry.retry_delay_ms),
            max_attempts: self.retry.max_attempts,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.retry.connect_timeout_ms)
    }
}

/// Return the path to `~/.rbcam/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rbcam").join("config.toml")
}

/// Load the config from `path`.  Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, RbError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| RbError::Config(format!("failed to read {}: {e}", path.display())))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| RbError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `RBCAM_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `RBCAM_HOST` | `host` |
/// | `RBCAM_PORT` | `port` |
/// | `RBCAM_WS_URL` | `ws_url` |
/// | `RBCAM_CODEC` | `codec` |
/// | `RBCAM_FRAMES` | `session.frame_count` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides_from(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides_from(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("RBCAM_HOST") {
        cfg.host = v;
    }
    if let Some(v) = lookup("RBCAM_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.port = port;
    }
    if let Some(v) = lookup("RBCAM_WS_URL") {
        cfg.ws_url = Some(v);
    }
    if let Some(v) = lookup("RBCAM_CODEC")
        && let Ok(codec) = v.parse::<WireCodec>()
    {
        cfg.codec = codec;
    }
    if let Some(v) = lookup("RBCAM_FRAMES")
        && let Ok(frames) = v.parse::<u32>()
    {
        cfg.session.frame_count = frames;
    }
}

/// Save the config to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), RbError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| RbError::Config(format!("failed to create {}: {e}", parent.display())))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| RbError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw).map_err(|e| RbError::Config(format!("failed to write {}: {e}", path.display())))
}
