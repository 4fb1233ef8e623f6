//! [`BusLink`] – the controller's view of a vehicle reachable over the
//! [`EventBus`].
//!
//! Outbound commands are wrapped in [`EventPayload::VelocityCommand`] events
//! and published on [`Topic::CmdVel`].  Inbound pose samples are drained from
//! a [`Topic::Pose`] subscription with non-blocking `try_recv`, so the
//! controller decides when the feed is serviced.

use std::sync::Arc;

use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, warn};
use turtle_types::{Event, EventPayload, Pose, VelocityCommand};

use crate::adapter::{PoseFeed, VelocitySink};
use crate::bus::{EventBus, Topic, TopicReceiver};

const SOURCE: &str = "turtle-middleware::link/cmd_vel";

/// Bus-backed [`VelocitySink`] + [`PoseFeed`].
pub struct BusLink {
    bus: Arc<EventBus>,
    pose_rx: TopicReceiver,
    /// Set after the first undeliverable command so a missing transport is
    /// reported once instead of once per tick.
    reported_unrouted: bool,
}

impl BusLink {
    /// Subscribe to [`Topic::Pose`] on `bus`.
    ///
    /// Only samples published after this call are seen.
    pub fn new(bus: Arc<EventBus>) -> Self {
        let pose_rx = bus.subscribe_to(Topic::Pose);
        Self {
            bus,
            pose_rx,
            reported_unrouted: false,
        }
    }
}

impl VelocitySink for BusLink {
    fn publish_velocity(&mut self, command: &VelocityCommand) {
        let event = Event::new(SOURCE, EventPayload::VelocityCommand(*command));
        match self.bus.publish_to(Topic::CmdVel, event) {
            Ok(_) => self.reported_unrouted = false,
            Err(e) if !self.reported_unrouted => {
                warn!(error = %e, "velocity command dropped; no transport is listening");
                self.reported_unrouted = true;
            }
            Err(e) => debug!(error = %e, "velocity command dropped"),
        }
    }
}

impl PoseFeed for BusLink {
    fn poll_pose(&mut self) -> Option<Pose> {
        let mut latest = None;
        loop {
            match self.pose_rx.try_recv() {
                Ok(event) => {
                    if let EventPayload::PoseSample(pose) = event.payload {
                        latest = Some(pose);
                    }
                }
                Err(TryRecvError::Lagged(n)) => {
                    debug!(lagged_by = n, "pose feed lagged; older samples dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        latest
    }
}
