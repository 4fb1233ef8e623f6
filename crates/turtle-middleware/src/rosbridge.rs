//! rosbridge v2 transport.
//!
//! [`RosbridgeClient`] connects to a `rosbridge_server` WebSocket and bridges
//! it to the internal [`EventBus`]:
//!
//! * **Outbound** – every [`EventPayload::VelocityCommand`] on
//!   [`Topic::CmdVel`] becomes a `geometry_msgs/Twist` publish frame.
//!
//! * **Inbound** – every `turtlesim/Pose` publish frame on the configured pose
//!   topic becomes an [`EventPayload::PoseSample`] on [`Topic::Pose`].
//!
//! The frame builders and the pose parser are plain functions so they can be
//! exercised without a socket.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use turtle_types::{Event, EventPayload, MotionError, Pose, VelocityCommand};

use crate::bus::{EventBus, Topic};

/// ROS message type published on the command topic.
pub const TWIST_TYPE: &str = "geometry_msgs/Twist";

/// ROS message type subscribed on the pose topic.
pub const POSE_TYPE: &str = "turtlesim/Pose";

const SOURCE: &str = "turtle-middleware::rosbridge/pose";

/// Topic names used on the ROS side of the bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct RosbridgeTopics {
    pub cmd_vel: String,
    pub pose: String,
}

impl Default for RosbridgeTopics {
    fn default() -> Self {
        Self {
            cmd_vel: "/icart_mini/cmd_vel".to_string(),
            pose: "/turtle1/pose".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Frames
// ─────────────────────────────────────────────────────────────────────────────

/// Build the `advertise` frame announcing the Twist publisher.
pub fn advertise_frame(topic: &str) -> String {
    json!({ "op": "advertise", "topic": topic, "type": TWIST_TYPE }).to_string()
}

/// Build the `subscribe` frame requesting pose samples.
pub fn subscribe_frame(topic: &str) -> String {
    json!({ "op": "subscribe", "topic": topic, "type": POSE_TYPE }).to_string()
}

/// Build a `publish` frame carrying `command` as a `geometry_msgs/Twist`.
pub fn twist_frame(topic: &str, command: &VelocityCommand) -> String {
    json!({
        "op": "publish",
        "topic": topic,
        "msg": {
            "linear":  { "x": command.linear_x, "y": 0.0, "z": 0.0 },
            "angular": { "x": 0.0, "y": 0.0, "z": command.angular_z }
        }
    })
    .to_string()
}

/// Parse an inbound rosbridge frame.
///
/// Returns `Ok(None)` for frames that are not a `publish` on `pose_topic`.
///
/// # Errors
///
/// Returns [`MotionError::Parsing`] when the text is not JSON, or when a pose
/// publish lacks a numeric `x`, `y` or `theta`.  Values are not range-checked.
pub fn parse_pose_frame(text: &str, pose_topic: &str) -> Result<Option<Pose>, MotionError> {
    let frame: Value = serde_json::from_str(text)
        .map_err(|e| MotionError::Parsing(format!("invalid rosbridge frame: {e}")))?;

    if frame.get("op").and_then(Value::as_str) != Some("publish")
        || frame.get("topic").and_then(Value::as_str) != Some(pose_topic)
    {
        return Ok(None);
    }

    let msg = &frame["msg"];
    let field = |name: &str| {
        msg.get(name).and_then(Value::as_f64).ok_or_else(|| {
            MotionError::Parsing(format!("pose frame on {pose_topic} lacks numeric `{name}`"))
        })
    };
    Ok(Some(Pose::new(field("x")?, field("y")?, field("theta")?)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// WebSocket client bridging a `rosbridge_server` and the internal bus.
#[derive(Clone)]
pub struct RosbridgeClient {
    bus: Arc<EventBus>,
    topics: RosbridgeTopics,
}

impl RosbridgeClient {
    /// Create a new client backed by `bus`.
    pub fn new(bus: Arc<EventBus>, topics: RosbridgeTopics) -> Self {
        Self { bus, topics }
    }

    /// Publish `pose` on [`Topic::Pose`].
    ///
    /// Having no controller listening is not an error worth surfacing; the
    /// sample is simply dropped.
    pub fn ingest_pose(&self, pose: Pose) {
        let event = Event::new(SOURCE, EventPayload::PoseSample(pose));
        if let Err(e) = self.bus.publish_to(Topic::Pose, event) {
            debug!(error = %e, "pose sample dropped");
        }
    }

    /// Connect to `url` and bridge traffic until either side closes.
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::Transport`] when the connection cannot be
    /// established or a frame cannot be written.
    pub async fn run(self, url: String) -> Result<(), MotionError> {
        // Subscribe before connecting so no command issued during the
        // handshake is lost.
        let mut cmd_rx = self.bus.subscribe_to(Topic::CmdVel);

        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| MotionError::Transport(format!("connect to {url}: {e}")))?;
        info!(url = %url, cmd_vel = %self.topics.cmd_vel, pose = %self.topics.pose, "connected to rosbridge");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        for frame in [
            advertise_frame(&self.topics.cmd_vel),
            subscribe_frame(&self.topics.pose),
        ] {
            ws_tx
                .send(Message::Text(frame.into()))
                .await
                .map_err(|e| MotionError::Transport(format!("handshake frame: {e}")))?;
        }

        loop {
            tokio::select! {
                result = cmd_rx.recv() => {
                    match result {
                        Ok(event) => {
                            let EventPayload::VelocityCommand(command) = event.payload else {
                                continue;
                            };
                            let frame = twist_frame(&self.topics.cmd_vel, &command);
                            ws_tx
                                .send(Message::Text(frame.into()))
                                .await
                                .map_err(|e| MotionError::Transport(format!("send twist: {e}")))?;
                        }
                        Err(RecvError::Lagged(n)) => {
                            warn!(lagged_by = n, "rosbridge client lagged behind the command stream");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_incoming(text.as_str()),
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(MotionError::Transport(format!("receive: {e}")));
                        }
                    }
                }
            }
        }

        info!(url = %url, "rosbridge connection closed");
        Ok(())
    }

    fn handle_incoming(&self, text: &str) {
        match parse_pose_frame(text, &self.topics.pose) {
            Ok(Some(pose)) => self.ingest_pose(pose),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "ignoring malformed rosbridge frame"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    const POSE_FRAME: &str = r#"{"op":"publish","topic":"/turtle1/pose","msg":{"x":5.544445,"y":5.544445,"theta":0.25,"linear_velocity":0.0,"angular_velocity":0.0}}"#;

    #[test]
    fn twist_frame_carries_both_axes() {
        let frame = twist_frame("/icart_mini/cmd_vel", &VelocityCommand::new(1.0, 1.0));
        let json: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["op"], "publish");
        assert_eq!(json["topic"], "/icart_mini/cmd_vel");
        assert_eq!(json["msg"]["linear"]["x"], 1.0);
        assert_eq!(json["msg"]["linear"]["y"], 0.0);
        assert_eq!(json["msg"]["angular"]["z"], 1.0);
    }

    #[test]
    fn handshake_frames_name_message_types() {
        let adv: Value = serde_json::from_str(&advertise_frame("/cmd")).unwrap();
        assert_eq!(adv["op"], "advertise");
        assert_eq!(adv["type"], TWIST_TYPE);

        let sub: Value = serde_json::from_str(&subscribe_frame("/pose")).unwrap();
        assert_eq!(sub["op"], "subscribe");
        assert_eq!(sub["topic"], "/pose");
        assert_eq!(sub["type"], POSE_TYPE);
    }

    #[test]
    fn parse_pose_frame_extracts_pose() {
        let pose = parse_pose_frame(POSE_FRAME, "/turtle1/pose").unwrap();
        assert_eq!(pose, Some(Pose::new(5.544445, 5.544445, 0.25)));
    }

    #[test]
    fn parse_pose_frame_ignores_other_topics_and_ops() {
        assert_eq!(parse_pose_frame(POSE_FRAME, "/turtle2/pose").unwrap(), None);
        let status = r#"{"op":"status","level":"info","msg":"ok"}"#;
        assert_eq!(parse_pose_frame(status, "/turtle1/pose").unwrap(), None);
    }

    #[test]
    fn parse_pose_frame_rejects_missing_fields_and_garbage() {
        let missing = r#"{"op":"publish","topic":"/turtle1/pose","msg":{"x":1.0,"y":2.0}}"#;
        assert!(matches!(
            parse_pose_frame(missing, "/turtle1/pose"),
            Err(MotionError::Parsing(msg)) if msg.contains("theta")
        ));
        assert!(matches!(
            parse_pose_frame("not json", "/turtle1/pose"),
            Err(MotionError::Parsing(_))
        ));
    }

    #[tokio::test]
    async fn run_fails_when_nothing_listens() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = RosbridgeClient::new(Arc::new(EventBus::default()), RosbridgeTopics::default());
        let result = client.run(format!("ws://{addr}")).await;
        assert!(matches!(result, Err(MotionError::Transport(_))));
    }

    #[tokio::test]
    async fn client_bridges_pose_in_and_twist_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Minimal rosbridge_server stand-in: record the handshake, push one
        // pose, wait for one Twist, then hang up.
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let mut ops = Vec::new();
            while ops.len() < 2 {
                if let Some(Ok(Message::Text(text))) = ws.next().await {
                    let frame: Value = serde_json::from_str(text.as_str()).unwrap();
                    ops.push(frame["op"].as_str().unwrap().to_string());
                }
            }
            ws.send(Message::Text(POSE_FRAME.to_string().into())).await.unwrap();
            let twist = loop {
                if let Some(Ok(Message::Text(text))) = ws.next().await {
                    break serde_json::from_str::<Value>(text.as_str()).unwrap();
                }
            };
            ws.close(None).await.ok();
            (ops, twist)
        });

        let bus = Arc::new(EventBus::default());
        let mut pose_rx = bus.subscribe_to(Topic::Pose);
        let client = RosbridgeClient::new(Arc::clone(&bus), RosbridgeTopics::default());
        let client_task = tokio::spawn(client.run(format!("ws://{addr}")));

        let event = tokio::time::timeout(Duration::from_secs(5), pose_rx.recv())
            .await
            .expect("pose should arrive")
            .unwrap();
        assert!(matches!(
            event.payload,
            EventPayload::PoseSample(p) if p == Pose::new(5.544445, 5.544445, 0.25)
        ));

        bus.publish_to(
            Topic::CmdVel,
            Event::new("test", EventPayload::VelocityCommand(VelocityCommand::new(2.0, 0.0))),
        )
        .unwrap();

        let (ops, twist) = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server should finish")
            .unwrap();
        assert_eq!(ops, vec!["advertise", "subscribe"]);
        assert_eq!(twist["topic"], "/icart_mini/cmd_vel");
        assert_eq!(twist["msg"]["linear"]["x"], 2.0);
        assert_eq!(twist["msg"]["angular"]["z"], 0.0);

        let outcome = tokio::time::timeout(Duration::from_secs(5), client_task)
            .await
            .expect("client should stop after the server hangs up")
            .unwrap();
        assert!(outcome.is_ok());
    }
}
