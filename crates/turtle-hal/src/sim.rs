//! In-process turtle simulation for CI/CD testing without a ROS graph.
//!
//! [`SimTurtle`] is a lockstep unicycle model.  It stores the most recent
//! command it was handed and, each time the feed is polled, integrates that
//! command over one fixed step and reports the resulting pose.  This makes a
//! run fully deterministic: one poll is one simulated tick regardless of how
//! fast the host executes the control loop.
//!
//! # Example
//!
//! ```rust
//! use turtle_hal::sim::SimTurtle;
//! use turtle_middleware::{PoseFeed, VelocitySink};
//! use turtle_types::VelocityCommand;
//!
//! let mut turtle = SimTurtle::new();
//! turtle.publish_velocity(&VelocityCommand::new(2.0, 0.0));
//! let pose = turtle.poll_pose().expect("the simulator always reports");
//! assert!(pose.x > 5.544445);
//! ```

use std::f64::consts::TAU;
use std::time::Duration;

use tracing::trace;
use turtle_middleware::{Pacer, PoseFeed, VelocitySink};
use turtle_types::{Pose, VelocityCommand};

/// Where turtlesim spawns `turtle1`.
pub const TURTLESIM_SPAWN: Pose = Pose {
    x: 5.544445,
    y: 5.544445,
    theta: 0.0,
};

/// Default integration step: one control tick at 1 kHz.
pub const DEFAULT_STEP: Duration = Duration::from_millis(1);

// ────────────────────────────────────────────────────────────────────────────
// SimTurtle
// ────────────────────────────────────────────────────────────────────────────

/// A simulated differential-drive vehicle.
///
/// Heading is kept in `[0, 2π)`.
pub struct SimTurtle {
    pose: Pose,
    command: VelocityCommand,
    step_secs: f64,
    ticks: u64,
    history: Option<Vec<VelocityCommand>>,
}

impl Default for SimTurtle {
    fn default() -> Self {
        Self::new()
    }
}

impl SimTurtle {
    /// Create a turtle at [`TURTLESIM_SPAWN`], standing still.
    pub fn new() -> Self {
        Self {
            pose: TURTLESIM_SPAWN,
            command: VelocityCommand::STOP,
            step_secs: DEFAULT_STEP.as_secs_f64(),
            ticks: 0,
            history: None,
        }
    }

    /// Start from `pose` instead of the turtlesim spawn point.
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = Pose {
            theta: pose.theta.rem_euclid(TAU),
            ..pose
        };
        self
    }

    /// Integrate over `step` per poll instead of [`DEFAULT_STEP`].
    pub fn with_step(mut self, step: Duration) -> Self {
        self.step_secs = step.as_secs_f64();
        self
    }

    /// Keep every published command so tests can assert on the stream.
    pub fn with_recording(mut self) -> Self {
        self.history = Some(Vec::new());
        self
    }

    /// Current simulated pose.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Command currently applied to the wheels.
    pub fn command(&self) -> VelocityCommand {
        self.command
    }

    /// Number of integration steps taken so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Every command published so far, when recording is enabled.
    pub fn commands(&self) -> &[VelocityCommand] {
        self.history.as_deref().unwrap_or(&[])
    }

    /// Advance the model by one step under the current command.
    pub fn step(&mut self) {
        let dt = self.step_secs;
        let VelocityCommand {
            linear_x: v,
            angular_z: w,
        } = self.command;
        self.pose.x += v * self.pose.theta.cos() * dt;
        self.pose.y += v * self.pose.theta.sin() * dt;
        self.pose.theta = (self.pose.theta + w * dt).rem_euclid(TAU);
        self.ticks += 1;
    }
}

impl VelocitySink for SimTurtle {
    fn publish_velocity(&mut self, command: &VelocityCommand) {
        if *command != self.command {
            trace!(linear_x = command.linear_x, angular_z = command.angular_z, "sim command changed");
        }
        self.command = *command;
        if let Some(history) = self.history.as_mut() {
            history.push(*command);
        }
    }
}

impl PoseFeed for SimTurtle {
    fn poll_pose(&mut self) -> Option<Pose> {
        self.step();
        Some(self.pose)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimClock
// ────────────────────────────────────────────────────────────────────────────

/// A [`Pacer`] that only accounts for time instead of sleeping.
#[derive(Debug, Default)]
pub struct SimClock {
    elapsed: Duration,
    sleeps: u64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total virtual time slept.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Number of calls to [`Pacer::sleep`].
    pub fn sleeps(&self) -> u64 {
        self.sleeps
    }
}

impl Pacer for SimClock {
    fn sleep(&mut self, period: Duration) {
        self.elapsed += period;
        self.sleeps += 1;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const EPS: f64 = 1e-9;

    /// A fresh turtle sits at the turtlesim spawn point, stopped.
    #[test]
    fn spawns_at_turtlesim_default() {
        let turtle = SimTurtle::new();
        assert_eq!(turtle.pose(), TURTLESIM_SPAWN);
        assert!(turtle.command().is_stop());
    }

    /// Polling without a command advances ticks but not the pose.
    #[test]
    fn standing_still_keeps_pose() {
        let mut turtle = SimTurtle::new();
        for _ in 0..10 {
            assert_eq!(turtle.poll_pose(), Some(TURTLESIM_SPAWN));
        }
        assert_eq!(turtle.ticks(), 10);
    }

    /// Linear velocity moves the turtle along its heading.
    #[test]
    fn straight_line_along_heading() {
        let mut turtle = SimTurtle::new().with_pose(Pose::new(1.0, 1.0, PI / 2.0));
        turtle.publish_velocity(&VelocityCommand::new(2.0, 0.0));
        for _ in 0..500 {
            turtle.poll_pose();
        }
        // 2 m/s for 0.5 s straight up the y axis.
        let pose = turtle.pose();
        assert!((pose.x - 1.0).abs() < 1e-9);
        assert!((pose.y - 2.0).abs() < 1e-9);
    }

    /// Heading crossing 2π wraps back to just above zero.
    #[test]
    fn heading_wraps_into_full_turn() {
        let mut turtle = SimTurtle::new().with_pose(Pose::new(1.0, 1.0, TAU - 0.0005));
        turtle.publish_velocity(&VelocityCommand::new(0.0, 1.0));
        let pose = turtle.poll_pose().unwrap();
        assert!((pose.theta - 0.0005).abs() < EPS);
    }

    #[test]
    fn with_pose_normalises_heading() {
        let turtle = SimTurtle::new().with_pose(Pose::new(0.0, 0.0, -PI / 2.0));
        assert!((turtle.pose().theta - 1.5 * PI).abs() < EPS);
    }

    /// A full turn at unit linear and yaw rate closes the circle.
    #[test]
    fn full_circle_returns_near_start() {
        let mut turtle = SimTurtle::new().with_step(Duration::from_micros(100));
        turtle.publish_velocity(&VelocityCommand::new(1.0, 1.0));
        let steps = (TAU / 1e-4).round() as usize;
        for _ in 0..steps {
            turtle.poll_pose();
        }
        let pose = turtle.pose();
        assert!((pose.x - TURTLESIM_SPAWN.x).abs() < 1e-3);
        assert!((pose.y - TURTLESIM_SPAWN.y).abs() < 1e-3);
    }

    /// Commands are only kept once recording is enabled.
    #[test]
    fn recording_is_opt_in() {
        let mut quiet = SimTurtle::new();
        quiet.publish_velocity(&VelocityCommand::new(1.0, 0.0));
        assert!(quiet.commands().is_empty());

        let mut recorded = SimTurtle::new().with_recording();
        recorded.publish_velocity(&VelocityCommand::new(1.0, 0.0));
        recorded.publish_velocity(&VelocityCommand::STOP);
        assert_eq!(
            recorded.commands(),
            &[VelocityCommand::new(1.0, 0.0), VelocityCommand::STOP]
        );
    }

    /// `SimClock` adds up virtual time without blocking the thread.
    #[test]
    fn sim_clock_accumulates_without_sleeping() {
        let mut clock = SimClock::new();
        let started = std::time::Instant::now();
        for _ in 0..1_000 {
            clock.sleep(Duration::from_millis(1));
        }
        assert_eq!(clock.elapsed(), Duration::from_secs(1));
        assert_eq!(clock.sleeps(), 1_000);
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
