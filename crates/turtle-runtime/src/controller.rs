//! [`MotionController`] – sampled open-loop motion primitives.
//!
//! Three blocking primitives share one control pattern: set a velocity
//! command, publish it, poll the latest pose, compute a scalar progress
//! metric, and repeat at a fixed tick rate until a threshold is crossed.  A
//! zero-velocity command is then published once.
//!
//! | Primitive | Command | Progress metric | Exit |
//! |---|---|---|---|
//! | [`move_distance`][MotionController::move_distance] | `linear_x = speed` | displacement from origin | `|d| >= distance` |
//! | [`rotate`][MotionController::rotate] | `angular_z = 1.0` | heading error | `|target - θ| <= 0.01` |
//! | [`trace_arc`][MotionController::trace_arc] | `angular_z = 1.0`, `linear_x = |r|` | heading error | `|target - θ| <= 0.01` |
//!
//! # Failure model
//!
//! Primitives never return an error.  They converge, or they block forever
//! when the feed never satisfies the exit condition: there is no timeout, no
//! cancellation and no watchdog.  Faults in the transport are the business of
//! the [`VelocitySink`] / [`PoseFeed`] implementation, not of this module.
//!
//! # Example
//!
//! ```rust
//! use turtle_hal::{SimClock, SimTurtle};
//! use turtle_runtime::controller::MotionController;
//!
//! let mut controller = MotionController::new(SimTurtle::new(), SimClock::new());
//! let report = controller.move_distance(0.5);
//! assert!(report.ticks > 0);
//! assert!(controller.command().is_stop());
//! ```

use std::f64::consts::TAU;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use turtle_middleware::{Pacer, PoseFeed, VelocitySink};
use turtle_types::{Pose, VelocityCommand};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Poll/publish cadence of every control loop.
pub const TICK_RATE_HZ: u32 = 1000;

/// Duration of one control tick, derived from [`TICK_RATE_HZ`].
pub const TICK_PERIOD: Duration = Duration::from_micros(1_000_000 / TICK_RATE_HZ as u64);

/// Heading error under which rotation and arc primitives stop.
pub const ANGULAR_TOLERANCE_RAD: f64 = 0.01;

/// Modulus used to wrap target headings.
pub const FULL_TURN_RAD: f64 = TAU;

/// Forward speed used by [`MotionController::move_distance`].
pub const DEFAULT_MOVE_SPEED: f64 = 2.0;

/// Yaw rate of rotation and arc primitives.  Always positive: the vehicle
/// only ever turns counter-clockwise, whatever the sign of the request.
pub const ROTATION_SPEED: f64 = 1.0;

/// Synchronisation polls after which a still-closed gate is reported.
const SYNC_WARN_POLLS: u64 = 1_000_000;

// ─────────────────────────────────────────────────────────────────────────────
// Sample gate
// ─────────────────────────────────────────────────────────────────────────────

/// Condition that ends the synchronisation wait at the start of a move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleGate {
    /// Open once any pose sample has been delivered.
    #[default]
    FirstSample,
    /// Open once the latest `x` and `y` are both non-zero.
    ///
    /// Never opens while the vehicle sits exactly on either axis.
    NonZeroCoordinates,
}

impl SampleGate {
    fn is_open(self, pose: &Pose, has_received_first_sample: bool) -> bool {
        match self {
            SampleGate::FirstSample => has_received_first_sample,
            SampleGate::NonZeroCoordinates => pose.x != 0.0 && pose.y != 0.0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────────────────────────

/// Which primitive produced a [`MotionReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Move,
    Rotate,
    TraceArc,
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Move => write!(f, "move"),
            Primitive::Rotate => write!(f, "rotate"),
            Primitive::TraceArc => write!(f, "trace_arc"),
        }
    }
}

/// Outcome of a completed primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionReport {
    pub primitive: Primitive,
    /// Control ticks executed before the stop command, each one a publish,
    /// a poll and a sleep.
    pub ticks: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Pure helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Absolute heading to reach after turning `relative_angle` from `theta`.
///
/// The sum is reduced modulo `2π` only when it is strictly greater than `2π`.
/// Exactly `2π` and negative sums are returned unchanged.
pub fn wrap_target(theta: f64, relative_angle: f64) -> f64 {
    let target = theta + relative_angle;
    if target > FULL_TURN_RAD {
        target % FULL_TURN_RAD
    } else {
        target
    }
}

/// Distance travelled from `origin` to `current`.
///
/// A zero delta on one axis short-circuits to the signed delta on the other
/// axis; only when both deltas are non-zero is the Euclidean norm used.
/// Callers compare the absolute value.
pub fn displacement(origin: &Pose, current: &Pose) -> f64 {
    let dx = current.x - origin.x;
    let dy = current.y - origin.y;
    if dx == 0.0 {
        dy
    } else if dy == 0.0 {
        dx
    } else {
        dx.hypot(dy)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MotionController
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the pose/command state and drives one vehicle link.
///
/// `L` is both the command sink and the pose feed of the vehicle; `P` paces
/// the control loops.  Primitives run strictly one at a time on the calling
/// thread.
pub struct MotionController<L, P> {
    link: L,
    pacer: P,
    pose: Pose,
    command: VelocityCommand,
    has_received_first_sample: bool,
    gate: SampleGate,
}

impl<L, P> MotionController<L, P>
where
    L: VelocitySink + PoseFeed,
    P: Pacer,
{
    /// Create a controller with a zero pose and a stop command.
    pub fn new(link: L, pacer: P) -> Self {
        Self {
            link,
            pacer,
            pose: Pose::default(),
            command: VelocityCommand::STOP,
            has_received_first_sample: false,
            gate: SampleGate::default(),
        }
    }

    /// Replace the synchronisation condition used by
    /// [`move_distance`][Self::move_distance].
    pub fn with_sample_gate(mut self, gate: SampleGate) -> Self {
        self.gate = gate;
        self
    }

    /// Latest pose applied from the feed.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Command as it was last published.
    pub fn command(&self) -> VelocityCommand {
        self.command
    }

    pub fn has_received_first_sample(&self) -> bool {
        self.has_received_first_sample
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn pacer(&self) -> &P {
        &self.pacer
    }

    /// Give the feed one chance to deliver a sample and apply it.
    ///
    /// Returns `true` when a new sample overwrote the pose.
    pub fn service_feed(&mut self) -> bool {
        match self.link.poll_pose() {
            Some(sample) => {
                self.pose = sample;
                self.has_received_first_sample = true;
                true
            }
            None => false,
        }
    }

    /// Zero both axes and publish once.
    pub fn stop(&mut self) {
        self.command = VelocityCommand::STOP;
        self.publish();
    }

    /// Drive straight at [`DEFAULT_MOVE_SPEED`] until `distance` is covered.
    pub fn move_distance(&mut self, distance: f64) -> MotionReport {
        self.move_distance_at(distance, DEFAULT_MOVE_SPEED)
    }

    /// Drive straight at `target_speed` until the displacement from the
    /// starting point reaches `distance`.
    ///
    /// Busy-polls the feed until the [`SampleGate`] opens before recording the
    /// origin.  For `distance <= 0` one tick is still executed.
    #[instrument(skip(self), fields(gate = ?self.gate))]
    pub fn move_distance_at(&mut self, distance: f64, target_speed: f64) -> MotionReport {
        self.wait_for_sample();
        let origin = self.pose;
        debug!(x0 = origin.x, y0 = origin.y, "move origin recorded");

        self.command.linear_x = target_speed;
        self.command.angular_z = 0.0;

        let mut ticks = 0;
        loop {
            self.publish();
            self.service_feed();
            let travelled = displacement(&origin, &self.pose);
            trace!(tick = ticks, travelled, "move tick");
            self.pacer.sleep(TICK_PERIOD);
            ticks += 1;
            if travelled.abs() >= distance {
                break;
            }
        }

        self.command.linear_x = 0.0;
        self.publish();

        info!(ticks, x = self.pose.x, y = self.pose.y, "move complete");
        MotionReport {
            primitive: Primitive::Move,
            ticks,
        }
    }

    /// Spin in place by `relative_angle` radians.
    ///
    /// The turn is always counter-clockwise; the sign of `relative_angle` only
    /// moves the target.  A target that wraps below zero is never reached by
    /// a feed reporting headings in `[0, 2π)`.
    #[instrument(skip(self))]
    pub fn rotate(&mut self, relative_angle: f64) -> MotionReport {
        self.command.angular_z = ROTATION_SPEED;
        let target = wrap_target(self.pose.theta, relative_angle);

        let ticks = self.converge_heading(target);

        self.command.angular_z = 0.0;
        self.publish();

        info!(ticks, target, theta = self.pose.theta, "rotate complete");
        MotionReport {
            primitive: Primitive::Rotate,
            ticks,
        }
    }

    /// Drive an arc of `radius` until the heading has swept `sweep_angle`.
    ///
    /// Linear speed is `|radius * ROTATION_SPEED|`, so a negative radius
    /// traces the same arc as its absolute value.
    #[instrument(skip(self))]
    pub fn trace_arc(&mut self, radius: f64, sweep_angle: f64) -> MotionReport {
        self.command.angular_z = ROTATION_SPEED;
        self.command.linear_x = (radius * self.command.angular_z).abs();
        let target = wrap_target(self.pose.theta, sweep_angle);

        let ticks = self.converge_heading(target);

        self.command.angular_z = 0.0;
        self.command.linear_x = 0.0;
        self.publish();

        info!(ticks, target, x = self.pose.x, y = self.pose.y, theta = self.pose.theta, "arc complete");
        MotionReport {
            primitive: Primitive::TraceArc,
            ticks,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn publish(&mut self) {
        self.link.publish_velocity(&self.command);
    }

    /// Busy-poll (no sleep) until the gate opens.  The feed is serviced at
    /// least once.
    fn wait_for_sample(&mut self) {
        let mut polls: u64 = 0;
        loop {
            self.service_feed();
            polls += 1;
            if self.gate.is_open(&self.pose, self.has_received_first_sample) {
                break;
            }
            if polls == SYNC_WARN_POLLS {
                warn!(polls, gate = ?self.gate, "still waiting for a usable pose sample");
            }
        }
        debug!(polls, "pose feed synchronised");
    }

    /// Publish/poll/sleep until the heading is within tolerance of `target`.
    fn converge_heading(&mut self, target: f64) -> u64 {
        let mut ticks = 0;
        loop {
            self.publish();
            self.service_feed();
            let error = (target - self.pose.theta).abs();
            trace!(tick = ticks, error, "heading tick");
            self.pacer.sleep(TICK_PERIOD);
            ticks += 1;
            if error <= ANGULAR_TOLERANCE_RAD {
                break ticks;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
