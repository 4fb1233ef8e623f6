//! `turtle-middleware` – the plumbing between the controller and the vehicle.
//!
//! The motion controller never speaks to a transport directly.  It sees three
//! narrow seams and nothing else.
//!
//! # Modules
//!
//! - [`adapter`] – the [`VelocitySink`], [`PoseFeed`] and [`Pacer`] traits.
//! - [`bus`] – headless, topic-based publish/subscribe event bus built on
//!   Tokio broadcast channels.
//! - [`link`] – [`BusLink`], the bus-backed implementation of the sink and
//!   feed seams used by the single-threaded controller.
//! - [`rosbridge`] – rosbridge v2 JSON frames and the WebSocket client that
//!   moves Twist commands out and turtlesim poses in.

pub mod adapter;
pub mod bus;
pub mod link;
pub mod rosbridge;

pub use adapter::{Pacer, PoseFeed, VelocitySink};
pub use bus::{EventBus, Topic, TopicReceiver};
pub use link::BusLink;
pub use rosbridge::{RosbridgeClient, RosbridgeTopics};
