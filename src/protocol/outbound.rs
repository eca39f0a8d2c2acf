use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{DecodeError, ObjectTag};
use crate::config::Topics;

pub const CHECKING_IN: &str = "checking in";
pub const GOT_MESSAGE: &str = "got message";

/// A user interaction on one object, or between two objects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    #[serde(rename = "object")]
    pub subject: String,
    #[serde(rename = "object_two", default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_two: Option<[f32; 3]>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotObject {
    pub name: String,
    pub tag: ObjectTag,
    pub position: [f32; 3],
    pub scale: [f32; 3],
    pub draggable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

/// Full keyframe: the background name and every other live object in creation order.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub background: Option<String>,
    pub objects: Vec<SnapshotObject>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OutboundEvent {
    Action(InteractionRecord),
    SceneSnapshot(SceneSnapshot),
    Message(String),
    /// The sidekick finished saying its current utterance.
    AudioDone,
}

fn publish(topic: &str, msg: Value) -> String {
    json!({ "op": "publish", "topic": topic, "msg": msg }).to_string()
}

pub fn advertise(topic: &str, message_type: &str) -> String {
    json!({ "op": "advertise", "topic": topic, "type": message_type }).to_string()
}

pub fn subscribe(topic: &str, message_type: &str) -> String {
    json!({ "op": "subscribe", "topic": topic, "type": message_type }).to_string()
}

/// Frames sent once per connection: advertise our log topic, subscribe to the
/// command topic, then check in.
pub fn handshake(topics: &Topics) -> [String; 3] {
    [
        advertise(&topics.log, &topics.log_type),
        subscribe(&topics.command, &topics.command_type),
        encode(&OutboundEvent::Message(CHECKING_IN.to_string()), topics),
    ]
}

/// Every event maps to exactly one rosbridge publish frame.
pub fn encode(event: &OutboundEvent, topics: &Topics) -> String {
    match event {
        OutboundEvent::Message(text) => publish(&topics.log, json!({ "data": text })),
        OutboundEvent::Action(record) => publish(&topics.action, json!(record)),
        OutboundEvent::SceneSnapshot(snapshot) => publish(&topics.scene, json!(snapshot)),
        OutboundEvent::AudioDone => publish(&topics.audio, json!({ "data": true })),
    }
}

/// Reads a snapshot back out of a publish frame produced by [`encode`].
pub fn decode_snapshot(frame: &str) -> Result<SceneSnapshot, DecodeError> {
    let mut value: Value = serde_json::from_str(frame)?;
    let msg = value
        .get_mut("msg")
        .map(Value::take)
        .ok_or(DecodeError::NotAnEnvelope)?;
    Ok(serde_json::from_value(msg)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_advertises_subscribes_then_checks_in() {
        let topics = Topics::default();
        let frames = handshake(&topics);
        let parsed: Vec<Value> = frames
            .iter()
            .map(|f| serde_json::from_str(f).expect("valid json"))
            .collect();
        assert_eq!(parsed[0]["op"], "advertise");
        assert_eq!(parsed[0]["topic"], "/opal_tablet");
        assert_eq!(parsed[1]["op"], "subscribe");
        assert_eq!(parsed[1]["topic"], "/opal_tablet_command");
        assert_eq!(parsed[2]["op"], "publish");
        assert_eq!(parsed[2]["msg"]["data"], CHECKING_IN);
    }

    #[test]
    fn action_record_omits_absent_secondary_fields() {
        let topics = Topics::default();
        let frame = encode(
            &OutboundEvent::Action(InteractionRecord {
                subject: "ball".to_string(),
                secondary: None,
                action_type: "tap".to_string(),
                position: Some([1.0, 2.0, 0.0]),
                position_two: None,
            }),
            &topics,
        );
        let value: Value = serde_json::from_str(&frame).expect("valid json");
        assert_eq!(value["topic"], "/opal_tablet_action");
        assert_eq!(value["msg"]["object"], "ball");
        assert_eq!(value["msg"]["action_type"], "tap");
        assert_eq!(value["msg"]["position"], json!([1.0, 2.0, 0.0]));
        assert!(value["msg"].get("object_two").is_none());
        assert!(value["msg"].get("position_two").is_none());
    }

    #[test]
    fn audio_done_is_a_true_bool_on_the_audio_topic() {
        let mut topics = Topics::default();
        let frame = encode(&OutboundEvent::AudioDone, &topics);
        let value: Value = serde_json::from_str(&frame).expect("valid json");
        assert_eq!(value["op"], "publish");
        assert_eq!(value["topic"], "/opal_tablet_audio");
        assert_eq!(value["msg"], json!({ "data": true }));

        topics.audio = "/robot_audio".to_string();
        let value: Value = serde_json::from_str(&encode(&OutboundEvent::AudioDone, &topics))
            .expect("valid json");
        assert_eq!(value["topic"], "/robot_audio");
    }

    #[test]
    fn snapshot_frame_decodes_back() {
        let topics = Topics::default();
        let snapshot = SceneSnapshot {
            background: Some("playground".to_string()),
            objects: vec![SnapshotObject {
                name: "ball".to_string(),
                tag: ObjectTag::PlayObject,
                position: [10.0, 20.0, 0.0],
                scale: [1.0, 1.0, 1.0],
                draggable: true,
                audio: Some("audio/chimes.wav".to_string()),
            }],
        };
        let frame = encode(&OutboundEvent::SceneSnapshot(snapshot.clone()), &topics);
        assert_eq!(decode_snapshot(&frame).expect("decode snapshot"), snapshot);
        assert!(decode_snapshot("{}").is_err());
    }
}
