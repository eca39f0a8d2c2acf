use std::sync::Arc;

use bevy::prelude::*;

use crate::config::Topics;
use crate::link::Transport;
use crate::protocol::{encode, ObjectTag, OutboundEvent, SceneSnapshot, SnapshotObject};
use crate::scene::{AssetRef, SceneRegistry};

/// Best-effort outbound events. A failed send is logged and the event dropped.
#[derive(Resource, Clone)]
pub struct TelemetryEmitter {
    transport: Arc<dyn Transport>,
    topics: Topics,
}

impl TelemetryEmitter {
    pub fn new(transport: Arc<dyn Transport>, topics: Topics) -> Self {
        Self { transport, topics }
    }

    pub fn emit(&self, event: OutboundEvent) {
        let frame = encode(&event, &self.topics);
        if let Err(err) = self.transport.send(frame) {
            let kind = match event {
                OutboundEvent::Action(_) => "action",
                OutboundEvent::SceneSnapshot(_) => "keyframe",
                OutboundEvent::Message(_) => "message",
                OutboundEvent::AudioDone => "audio done",
            };
            warn!("[Stage telemetry] Dropping {kind}: {err}");
        }
    }
}

pub fn capture_snapshot(registry: &SceneRegistry) -> SceneSnapshot {
    SceneSnapshot {
        background: registry.background().map(|bg| bg.name().to_string()),
        objects: registry
            .snapshot()
            .into_iter()
            .filter(|obj| obj.tag() != ObjectTag::Background)
            .map(|obj| SnapshotObject {
                name: obj.name().to_string(),
                tag: obj.tag(),
                position: obj.position().to_array(),
                scale: obj.scale.to_array(),
                draggable: obj.draggable,
                audio: obj.audio.as_ref().map(AssetRef::path).map(str::to_string),
            })
            .collect(),
    }
}
