//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.  Receivers can be drained either asynchronously
//! ([`TopicReceiver::recv`]) from transport tasks, or without blocking
//! ([`TopicReceiver::try_recv`]) from the single-threaded control loop.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Pose`] | Pose samples from the vehicle or simulator |
//! | [`Topic::CmdVel`] | Velocity commands on their way to the vehicle |

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use turtle_types::{Event, MotionError};

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Enumeration of all routing topics on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Inbound pose samples.
    Pose,
    /// Outbound velocity commands.
    CmdVel,
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    pose: broadcast::Sender<Event>,
    cmd_vel: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (pose, _) = broadcast::channel(capacity);
        let (cmd_vel, _) = broadcast::channel(capacity);
        Self { pose, cmd_vel }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event, or
    /// [`MotionError::Channel`] when nobody is listening on the topic.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, MotionError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| MotionError::Channel(format!("No subscribers for topic {topic:?}")))
    }

    /// Subscribe to a specific [`Topic`] channel.
    ///
    /// The receiver only sees events published after this call.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Pose => &self.pose,
            Topic::CmdVel => &self.cmd_vel,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// A receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(RecvError::Lagged(n))` – the subscriber fell behind and `n`
    ///   messages were dropped.  The caller decides whether to continue.
    /// * `Err(RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, RecvError> {
        self.receiver.recv().await
    }

    /// Take the next buffered event without waiting.
    ///
    /// Returns `Err(TryRecvError::Empty)` when nothing is buffered.
    pub fn try_recv(&mut self) -> Result<Event, TryRecvError> {
        self.receiver.try_recv()
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turtle_types::{EventPayload, Pose, VelocityCommand};

    fn pose_event(x: f64) -> Event {
        Event::new("test::pose", EventPayload::PoseSample(Pose::new(x, 1.0, 0.0)))
    }

    #[test]
    fn publish_no_subscribers_returns_error() {
        let bus = EventBus::default();
        let result = bus.publish_to(Topic::CmdVel, pose_event(0.0));
        assert!(matches!(result, Err(MotionError::Channel(_))));
    }

    #[tokio::test]
    async fn topic_multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut subscriber1 = bus.subscribe_to(Topic::Pose);
        let mut subscriber2 = bus.subscribe_to(Topic::Pose);

        let event = pose_event(3.0);
        assert_eq!(bus.publish_to(Topic::Pose, event.clone())?, 2);

        assert_eq!(subscriber1.recv().await?.id, event.id);
        assert_eq!(subscriber2.recv().await?.id, event.id);
        Ok(())
    }

    /// A subscriber on `CmdVel` must not receive events published to `Pose`.
    #[tokio::test]
    async fn topic_subscriber_does_not_receive_other_topic_events() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut cmd_sub = bus.subscribe_to(Topic::CmdVel);
        let _pose_sub = bus.subscribe_to(Topic::Pose);

        bus.publish_to(Topic::Pose, pose_event(1.0))?;

        let result = tokio::time::timeout(std::time::Duration::from_millis(50), cmd_sub.recv()).await;
        assert!(result.is_err(), "CmdVel subscriber must not receive a Pose event");
        Ok(())
    }

    #[test]
    fn try_recv_drains_in_order_then_reports_empty() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::CmdVel);
        assert_eq!(rx.topic(), Topic::CmdVel);

        for v in [1.0, 2.0] {
            let event = Event::new(
                "test::cmd_vel",
                EventPayload::VelocityCommand(VelocityCommand::new(v, 0.0)),
            );
            bus.publish_to(Topic::CmdVel, event).unwrap();
        }

        let speeds: Vec<f64> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter_map(|e| match e.payload {
                EventPayload::VelocityCommand(cmd) => Some(cmd.linear_x),
                _ => None,
            })
            .collect();
        assert_eq!(speeds, vec![1.0, 2.0]);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    /// Flooding a low-capacity channel while a subscriber sleeps must produce
    /// a `Lagged` error rather than panicking or blocking.
    #[tokio::test]
    async fn topic_channel_lag_on_slow_subscriber() {
        const CAPACITY: usize = 64;
        let bus = EventBus::new(CAPACITY);
        let mut slow_sub = bus.subscribe_to(Topic::Pose);

        for i in 0..1_000 {
            let _ = bus.publish_to(Topic::Pose, pose_event(i as f64));
        }

        let result = slow_sub.recv().await;
        assert!(
            matches!(result, Err(RecvError::Lagged(_))),
            "expected Lagged error, got: {result:?}"
        );
    }
}
