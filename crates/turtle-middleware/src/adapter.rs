//! Collaborator seams of the motion controller.
//!
//! The controller drives a vehicle through exactly three capabilities, each
//! modelled as a trait so the core can run against a live robot, an
//! in-process simulator, or a scripted test double.
//!
//! # Contract
//!
//! * [`VelocitySink::publish_velocity`] – fire-and-forget.  No
//!   acknowledgement reaches the controller.  An adapter that fails to
//!   deliver a command logs the failure itself.
//!
//! * [`PoseFeed::poll_pose`] – services buffered updates once and returns the
//!   newest sample, if any arrived since the previous call.  Must never block.
//!
//! * [`Pacer::sleep`] – waits out one control period.

use std::time::Duration;

use turtle_types::{Pose, VelocityCommand};

/// Outbound half of a vehicle link.
pub trait VelocitySink {
    /// Send `command` to the vehicle.
    fn publish_velocity(&mut self, command: &VelocityCommand);
}

/// Inbound half of a vehicle link.
pub trait PoseFeed {
    /// Apply any buffered pose updates and return the newest one.
    ///
    /// Returns `None` when nothing new arrived since the last poll.
    fn poll_pose(&mut self) -> Option<Pose>;
}

/// Fixed-interval pacing primitive used by every control loop.
pub trait Pacer {
    /// Wait until the end of the current `period`.
    fn sleep(&mut self, period: Duration);
}

impl<T: VelocitySink + ?Sized> VelocitySink for &mut T {
    fn publish_velocity(&mut self, command: &VelocityCommand) {
        (**self).publish_velocity(command)
    }
}

impl<T: PoseFeed + ?Sized> PoseFeed for &mut T {
    fn poll_pose(&mut self) -> Option<Pose> {
        (**self).poll_pose()
    }
}

impl<T: Pacer + ?Sized> Pacer for &mut T {
    fn sleep(&mut self, period: Duration) {
        (**self).sleep(period)
    }
}
