//! Deployment settings – reads/writes `~/.turtle-move/config.toml`.
//!
//! Only the wiring is configurable (backend, endpoint, topic names, run
//! mode).  The control law constants live in `turtle-runtime` and are fixed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use turtle_middleware::RosbridgeTopics;
use turtle_runtime::{SampleGate, SequenceMode};
use turtle_types::MotionError;

/// Where velocity commands go and poses come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process unicycle simulation.
    #[default]
    Sim,
    /// A rosbridge v2 WebSocket server.
    Rosbridge,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Sim => write!(f, "sim"),
            Backend::Rosbridge => write!(f, "rosbridge"),
        }
    }
}

/// Persisted settings stored in `~/.turtle-move/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: Backend,

    /// rosbridge server, only used with [`Backend::Rosbridge`].
    #[serde(default = "default_rosbridge_url")]
    pub rosbridge_url: String,

    #[serde(default = "default_cmd_vel_topic")]
    pub cmd_vel_topic: String,

    #[serde(default = "default_pose_topic")]
    pub pose_topic: String,

    #[serde(default)]
    pub sequence: SequenceMode,

    #[serde(default)]
    pub sample_gate: SampleGate,
}

fn default_rosbridge_url() -> String {
    "ws://localhost:9090".to_string()
}
fn default_cmd_vel_topic() -> String {
    RosbridgeTopics::default().cmd_vel
}
fn default_pose_topic() -> String {
    RosbridgeTopics::default().pose
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            rosbridge_url: default_rosbridge_url(),
            cmd_vel_topic: default_cmd_vel_topic(),
            pose_topic: default_pose_topic(),
            sequence: SequenceMode::default(),
            sample_gate: SampleGate::default(),
        }
    }
}

impl Config {
    pub fn topics(&self) -> RosbridgeTopics {
        RosbridgeTopics {
            cmd_vel: self.cmd_vel_topic.clone(),
            pose: self.pose_topic.clone(),
        }
    }
}

/// Return the path to `~/.turtle-move/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".turtle-move").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, MotionError> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, MotionError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| MotionError::Config(format!("read {}: {e}", path.display())))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| MotionError::Config(format!("parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `TURTLE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TURTLE_BACKEND` | `backend` |
/// | `TURTLE_ROSBRIDGE_URL` | `rosbridge_url` |
/// | `TURTLE_CMD_VEL_TOPIC` | `cmd_vel_topic` |
/// | `TURTLE_POSE_TOPIC` | `pose_topic` |
/// | `TURTLE_SEQUENCE` | `sequence` |
/// | `TURTLE_SAMPLE_GATE` | `sample_gate` |
///
/// Unrecognised values for the enum fields are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("TURTLE_BACKEND")
        && let Some(backend) = parse_choice(&v)
    {
        cfg.backend = backend;
    }
    if let Ok(v) = std::env::var("TURTLE_ROSBRIDGE_URL") {
        cfg.rosbridge_url = v;
    }
    if let Ok(v) = std::env::var("TURTLE_CMD_VEL_TOPIC") {
        cfg.cmd_vel_topic = v;
    }
    if let Ok(v) = std::env::var("TURTLE_POSE_TOPIC") {
        cfg.pose_topic = v;
    }
    if let Ok(v) = std::env::var("TURTLE_SEQUENCE")
        && let Some(mode) = parse_choice(&v)
    {
        cfg.sequence = mode;
    }
    if let Ok(v) = std::env::var("TURTLE_SAMPLE_GATE")
        && let Some(gate) = parse_choice(&v)
    {
        cfg.sample_gate = gate;
    }
}

/// Parse a unit enum variant by its serde name.
fn parse_choice<T: DeserializeOwned>(value: &str) -> Option<T> {
    T::deserialize(toml::Value::String(value.trim().to_string())).ok()
}

/// Save the config to disk, creating `~/.turtle-move/` if necessary.
pub fn save(cfg: &Config) -> Result<(), MotionError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), MotionError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| MotionError::Config(format!("create {}: {e}", parent.display())))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| MotionError::Config(format!("serialize: {e}")))?;
    fs::write(path, raw)
        .map_err(|e| MotionError::Config(format!("write {}: {e}", path.display())))?;
    Ok(())
}
