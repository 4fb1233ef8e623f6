use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Planar pose of the controlled vehicle in its world frame.
///
/// Only the latest sample is ever kept; a new sample overwrites the old one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    /// Heading in radians.
    pub theta: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }
}

/// Differential-drive velocity command (`geometry_msgs/Twist` reduced to the
/// two axes a planar vehicle uses).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VelocityCommand {
    /// Forward speed along the body x axis.
    pub linear_x: f64,
    /// Yaw rate about the body z axis, radians per second.
    pub angular_z: f64,
}

impl VelocityCommand {
    /// The all-zero command.
    pub const STOP: Self = Self {
        linear_x: 0.0,
        angular_z: 0.0,
    };

    pub fn new(linear_x: f64, angular_z: f64) -> Self {
        Self {
            linear_x,
            angular_z,
        }
    }

    /// `true` when both axes are exactly zero.
    pub fn is_stop(&self) -> bool {
        self.linear_x == 0.0 && self.angular_z == 0.0
    }
}

/// Unified event wrapper for the internal event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "turtle-middleware::rosbridge/pose"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` in a freshly stamped envelope.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the internal event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// A pose sample delivered by the vehicle or simulator.
    PoseSample(Pose),
    /// A velocity command on its way to the vehicle.
    VelocityCommand(VelocityCommand),
}

/// Errors raised by the collaborator layer (bus, wire codec, transport,
/// configuration). Motion primitives themselves never fail.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum MotionError {
    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Parsing Error: {0}")]
    Parsing(String),

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}
