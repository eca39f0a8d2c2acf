use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::dispatch::SharedFlags;
use crate::protocol::{InteractionRecord, ObjectTag, OutboundEvent};
use crate::runtime::{HeadlessMode, StageSet};
use crate::scene::{AssetRef, SceneRegistry, StageCamera, OBJECT_SIZE};
use crate::telemetry::TelemetryEmitter;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GestureKind {
    Tap,
    Drag,
    Release,
    Collide,
}

impl GestureKind {
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Tap => "tap",
            Self::Drag => "drag",
            Self::Release => "release",
            Self::Collide => "collide",
        }
    }
}

/// A gesture on a scene object, as reported by whatever detects gestures.
#[derive(Event, Clone, Debug, PartialEq)]
pub struct InteractionEvent {
    pub object: String,
    pub other: Option<String>,
    pub kind: GestureKind,
    pub position: Option<Vec3>,
    pub other_position: Option<Vec3>,
}

impl InteractionEvent {
    pub fn tap(object: impl Into<String>, position: Vec3) -> Self {
        Self {
            object: object.into(),
            other: None,
            kind: GestureKind::Tap,
            position: Some(position),
            other_position: None,
        }
    }

    pub fn collide(object: impl Into<String>, other: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            other: Some(other.into()),
            kind: GestureKind::Collide,
            position: None,
            other_position: None,
        }
    }

    fn record(&self) -> InteractionRecord {
        InteractionRecord {
            subject: self.object.clone(),
            secondary: self.other.clone(),
            action_type: self.kind.wire_name().to_string(),
            position: self.position.map(|p| p.to_array()),
            position_two: self.other_position.map(|p| p.to_array()),
        }
    }
}

/// Object sounds waiting for the audio system.
#[derive(Resource, Default, Debug)]
pub struct PendingObjectAudio(pub Vec<AssetRef>);

/// Forwards gestures as action telemetry. Gestures are dropped while touch is
/// off globally or on an object that is not touchable.
pub(crate) fn report_interactions(
    mut events: EventReader<InteractionEvent>,
    flags: Res<SharedFlags>,
    registry: Res<SceneRegistry>,
    emitter: Res<TelemetryEmitter>,
    headless: Res<HeadlessMode>,
    mut audio: ResMut<PendingObjectAudio>,
) {
    for event in events.read() {
        if !flags.0.touch_enabled() {
            debug!("[Stage touch] Touch is off, dropping {:?} on '{}'", event.kind, event.object);
            continue;
        }
        let Some(object) = registry.find(&event.object) else {
            debug!("[Stage touch] No object '{}', dropping {:?}", event.object, event.kind);
            continue;
        };
        if !object.touchable {
            continue;
        }
        emitter.emit(OutboundEvent::Action(event.record()));

        if event.kind == GestureKind::Tap && !headless.0 {
            if let Some(sound) = &object.audio {
                audio.0.push(sound.clone());
            }
        }
    }
}

#[derive(Clone, Copy)]
struct Aabb {
    center: Vec2,
    half: Vec2,
}

impl Aabb {
    fn contains(self, point: Vec2) -> bool {
        let d = (point - self.center).abs();
        d.x <= self.half.x && d.y <= self.half.y
    }
}

/// Reports a tap on the frontmost object under a left click.
fn pointer_taps(
    buttons: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Camera, &GlobalTransform), With<StageCamera>>,
    registry: Res<SceneRegistry>,
    mut taps: EventWriter<InteractionEvent>,
) {
    if !buttons.just_pressed(MouseButton::Left) {
        return;
    }
    let Ok(window) = windows.get_single() else {
        return;
    };
    let Some(cursor) = window.cursor_position() else {
        return;
    };
    let Ok((camera, camera_transform)) = cameras.get_single() else {
        return;
    };
    let Ok(point) = camera.viewport_to_world_2d(camera_transform, cursor) else {
        return;
    };

    let hit = registry
        .snapshot()
        .into_iter()
        .filter(|obj| obj.tag() != ObjectTag::Background)
        .filter(|obj| {
            Aabb {
                center: obj.position().truncate(),
                half: obj.scale.truncate() * OBJECT_SIZE / 2.0,
            }
            .contains(point)
        })
        // Lower z is nearer the viewer.
        .min_by(|a, b| a.position().z.total_cmp(&b.position().z));

    if let Some(obj) = hit {
        taps.send(InteractionEvent::tap(obj.name(), obj.position()));
    }
}

fn play_object_audio(
    mut commands: Commands,
    mut pending: ResMut<PendingObjectAudio>,
    asset_server: Res<AssetServer>,
) {
    for sound in pending.0.drain(..) {
        commands.spawn((
            AudioPlayer::<AudioSource>::new(asset_server.load(sound.path().to_string())),
            PlaybackSettings::DESPAWN,
        ));
    }
}

/// Mouse taps and object sounds. Windowed mode only.
pub struct PointerPlugin;

impl Plugin for PointerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (
                pointer_taps.before(StageSet::Effects),
                play_object_audio.in_set(StageSet::Present),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_carries_both_objects_when_present() {
        let tap = InteractionEvent::tap("ball", Vec3::new(1.0, 2.0, 0.0)).record();
        assert_eq!(tap.subject, "ball");
        assert_eq!(tap.secondary, None);
        assert_eq!(tap.action_type, "tap");
        assert_eq!(tap.position, Some([1.0, 2.0, 0.0]));

        let hit = InteractionEvent::collide("ball", "slot1").record();
        assert_eq!(hit.secondary.as_deref(), Some("slot1"));
        assert_eq!(hit.action_type, "collide");
        assert_eq!(hit.position, None);
    }

    #[test]
    fn aabb_edges_are_inclusive() {
        let aabb = Aabb {
            center: Vec2::new(10.0, 10.0),
            half: Vec2::new(5.0, 5.0),
        };
        assert!(aabb.contains(Vec2::new(15.0, 5.0)));
        assert!(!aabb.contains(Vec2::new(15.1, 10.0)));
    }
}
