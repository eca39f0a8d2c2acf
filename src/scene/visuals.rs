use bevy::prelude::*;

use super::registry::{SceneObject, SceneRegistry};
use crate::protocol::ObjectTag;
use crate::runtime::StageSet;

/// Side of the square drawn for an object at scale 1 when it has no sprite.
/// Also the hit box for taps.
pub const OBJECT_SIZE: f32 = 100.0;

#[derive(Component)]
pub struct StageCamera;

#[derive(Component)]
struct ObjectVisual;

fn placeholder_color(tag: ObjectTag) -> Color {
    match tag {
        ObjectTag::Background => Color::srgb(0.15, 0.2, 0.25),
        ObjectTag::PlayObject => Color::srgb(0.85, 0.45, 0.2),
        ObjectTag::AnswerSlot => Color::srgb(0.3, 0.7, 0.4),
        ObjectTag::SceneSlot => Color::srgb(0.5, 0.5, 0.6),
    }
}

/// Scene depth grows away from the viewer; Bevy's grows toward it.
fn transform_for(object: &SceneObject) -> Transform {
    let p = object.position();
    Transform::from_xyz(p.x, p.y, -p.z).with_scale(object.scale)
}

fn spawn_camera(mut commands: Commands) {
    commands.spawn((StageCamera, Camera2d, Transform::from_xyz(0.0, 0.0, 100.0)));
}

fn spawn_object_visuals(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    mut registry: ResMut<SceneRegistry>,
) {
    for object in registry.objects_mut().filter(|obj| obj.visual.is_none()) {
        let sprite = match &object.sprite {
            Some(image) => Sprite::from_image(asset_server.load(image.path().to_string())),
            None => Sprite::from_color(placeholder_color(object.tag()), Vec2::splat(OBJECT_SIZE)),
        };
        let entity = commands
            .spawn((
                ObjectVisual,
                Name::new(object.name().to_string()),
                sprite,
                transform_for(object),
            ))
            .id();
        object.visual = Some(entity);
    }
}

fn despawn_released_visuals(mut commands: Commands, mut registry: ResMut<SceneRegistry>) {
    for entity in registry.take_released() {
        if let Some(mut visual) = commands.get_entity(entity) {
            visual.despawn();
        }
    }
}

fn sync_object_transforms(
    registry: Res<SceneRegistry>,
    mut visuals: Query<&mut Transform, With<ObjectVisual>>,
) {
    for object in registry.snapshot() {
        let Some(entity) = object.visual else {
            continue;
        };
        if let Ok(mut transform) = visuals.get_mut(entity) {
            *transform = transform_for(object);
        }
    }
}

/// Draws scene objects as sprites. Windowed mode only.
pub struct SceneVisualPlugin;

impl Plugin for SceneVisualPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_camera).add_systems(
            Update,
            (
                despawn_released_visuals,
                spawn_object_visuals,
                sync_object_transforms,
            )
                .chain()
                .in_set(StageSet::Present),
        );
    }
}
