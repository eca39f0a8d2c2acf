mod assets;
mod registry;
mod visuals;

use bevy::prelude::*;

pub use assets::{AssetCatalog, AssetError, AssetKind, AssetRef};
pub use registry::{SceneError, SceneRegistry, Z_FEEDBACK};
#[cfg(test)]
pub use registry::{MOVE_DURATION, Z_BACKGROUND};
pub use visuals::{SceneVisualPlugin, StageCamera, OBJECT_SIZE};

pub(crate) fn advance_motion(time: Res<Time>, mut registry: ResMut<SceneRegistry>) {
    if registry.any_moving() {
        registry.advance(time.delta_secs());
    }
}
