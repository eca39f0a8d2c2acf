use bevy::prelude::*;

use crate::scene::{SceneRegistry, Z_FEEDBACK};

/// The single highlight marker. Hidden until an object is highlighted.
#[derive(Resource, Default, Debug)]
pub struct Highlight {
    target: Option<String>,
    position: Vec3,
    visible: bool,
}

impl Highlight {
    /// Puts the marker just in front of `position`.
    pub fn show_at(&mut self, target: &str, position: Vec3) {
        self.target = Some(target.to_string());
        self.position = Vec3::new(position.x, position.y, position.z - 1.0);
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.target = None;
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }
}

#[derive(Component)]
pub(crate) struct HighlightMarker;

const MARKER_COLOR: Color = Color::srgba(1.0, 0.9, 0.2, 0.45);
const MARKER_SIZE: f32 = 140.0;

fn spawn_marker(mut commands: Commands) {
    commands.spawn((
        HighlightMarker,
        Sprite::from_color(MARKER_COLOR, Vec2::splat(MARKER_SIZE)),
        Transform::from_xyz(0.0, 0.0, -Z_FEEDBACK),
        Visibility::Hidden,
    ));
}

/// Keeps the marker sprite on its target while the target moves.
fn sync_marker(
    mut highlight: ResMut<Highlight>,
    registry: Res<SceneRegistry>,
    mut markers: Query<(&mut Transform, &mut Visibility), With<HighlightMarker>>,
) {
    let followed = highlight
        .target()
        .and_then(|name| registry.find(name))
        .map(|obj| obj.position());
    if let (Some(position), Some(name)) = (followed, highlight.target.clone()) {
        if position.truncate() != highlight.position.truncate() {
            highlight.show_at(&name, position);
        }
    }

    for (mut transform, mut visibility) in &mut markers {
        transform.translation = Vec3::new(
            highlight.position.x,
            highlight.position.y,
            -highlight.position.z,
        );
        *visibility = if highlight.visible {
            Visibility::Visible
        } else {
            Visibility::Hidden
        };
    }
}

/// Draws the highlight marker. Windowed mode only.
pub struct HighlightVisualPlugin;

impl Plugin for HighlightVisualPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_marker).add_systems(
            Update,
            sync_marker.in_set(crate::runtime::StageSet::Present),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_sits_in_front_of_target() {
        let mut highlight = Highlight::default();
        assert!(!highlight.is_visible());

        highlight.show_at("ball", Vec3::new(4.0, 5.0, 0.0));
        assert!(highlight.is_visible());
        assert_eq!(highlight.target(), Some("ball"));
        assert_eq!(highlight.position(), Vec3::new(4.0, 5.0, -1.0));

        highlight.hide();
        assert!(!highlight.is_visible());
        assert_eq!(highlight.target(), None);
    }
}
