use std::collections::{BTreeSet, HashMap};

use bevy::prelude::*;
use rand::Rng;
use thiserror::Error;

use super::assets::{AssetCatalog, AssetKind, AssetRef};
use crate::protocol::{ObjectDescriptor, ObjectTag};

pub const Z_BACKGROUND: f32 = 3.0;
pub const Z_PLAY_OBJECT: f32 = 0.0;
pub const Z_SLOT: f32 = 1.0;
pub const Z_COLLIDE_SLOT: f32 = 2.0;
pub const Z_FEEDBACK: f32 = -1.0;

/// Seconds a `MOVE_OBJECT` takes to reach its destination.
pub const MOVE_DURATION: f32 = 0.5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("an object named '{0}' already exists")]
    DuplicateName(String),
    #[error("no object named '{0}'")]
    UnknownObject(String),
}

/// Registry-assigned identity. Never reused, even after the object is destroyed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct ObjectId(u64);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Layer {
    Moveable,
    Static,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SlotPlacement {
    /// 1-indexed.
    pub index: u32,
    pub answer: bool,
}

#[derive(Clone, Copy, Debug)]
struct Motion {
    from: Vec3,
    to: Vec3,
    elapsed: f32,
}

#[derive(Clone, Debug)]
pub struct SceneObject {
    id: ObjectId,
    name: String,
    tag: ObjectTag,
    initial_position: Option<Vec3>,
    position: Vec3,
    motion: Option<Motion>,
    pub scale: Vec3,
    pub draggable: bool,
    pub layer: Layer,
    pub touchable: bool,
    pub sprite: Option<AssetRef>,
    pub audio: Option<AssetRef>,
    pub slot: Option<SlotPlacement>,
    /// 0-indexed.
    pub correct_slot: Option<u32>,
    pub is_correct: bool,
    pub is_incorrect: bool,
    pub(crate) visual: Option<Entity>,
}

impl SceneObject {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> ObjectTag {
        self.tag
    }

    /// Placement requested at creation; the reset target.
    pub fn initial_position(&self) -> Option<Vec3> {
        self.initial_position
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn is_moving(&self) -> bool {
        self.motion.is_some()
    }
}

/// Only the allowed play-object depths are kept; anything else sits on the play plane.
fn play_depth(z: f32) -> f32 {
    if [Z_PLAY_OBJECT, Z_SLOT, Z_COLLIDE_SLOT, Z_FEEDBACK].contains(&z) {
        z
    } else {
        Z_PLAY_OBJECT
    }
}

/// Live scene objects, indexed by name and by tag. Owned by the presentation loop.
#[derive(Resource)]
pub struct SceneRegistry {
    objects: HashMap<ObjectId, SceneObject>,
    by_name: HashMap<String, ObjectId>,
    by_tag: HashMap<ObjectTag, BTreeSet<ObjectId>>,
    next_id: u64,
    touch_enabled: bool,
    released: Vec<Entity>,
}

impl Default for SceneRegistry {
    fn default() -> Self {
        Self {
            objects: HashMap::new(),
            by_name: HashMap::new(),
            by_tag: HashMap::new(),
            next_id: 1,
            touch_enabled: true,
            released: Vec::new(),
        }
    }
}

impl SceneRegistry {
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn find(&self, name: &str) -> Option<&SceneObject> {
        self.by_name.get(name).and_then(|id| self.objects.get(id))
    }

    pub fn background(&self) -> Option<&SceneObject> {
        self.with_tag(ObjectTag::Background).next()
    }

    pub fn with_tag(&self, tag: ObjectTag) -> impl Iterator<Item = &SceneObject> + '_ {
        let objects = &self.objects;
        self.by_tag
            .get(&tag)
            .into_iter()
            .flatten()
            .filter_map(move |id| objects.get(id))
    }

    /// Every live object in creation order.
    pub fn snapshot(&self) -> Vec<&SceneObject> {
        let mut all: Vec<&SceneObject> = self.objects.values().collect();
        all.sort_by_key(|obj| obj.id);
        all
    }

    fn generate_name(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let candidate = format!("object-{:08x}", rng.gen::<u32>());
            if !self.by_name.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Creates an object from a descriptor. A new background replaces the
    /// previous one, but only once its name is known to be free. Missing
    /// sprite or audio assets are logged and left off; the object is still
    /// created.
    pub fn create(
        &mut self,
        descriptor: &ObjectDescriptor,
        catalog: &AssetCatalog,
    ) -> Result<&SceneObject, SceneError> {
        let replaces_background = descriptor.tag == ObjectTag::Background;
        let name = match descriptor.name.trim() {
            "" => self.generate_name(),
            name => name.to_string(),
        };
        // The outgoing background's own name is free for its replacement.
        if let Some(existing) = self.find(&name) {
            if !(replaces_background && existing.tag == ObjectTag::Background) {
                return Err(SceneError::DuplicateName(name));
            }
        }
        if replaces_background {
            self.destroy_by_tag(ObjectTag::Background);
        }

        let (position, initial_position) = match (descriptor.tag, descriptor.init_position) {
            (ObjectTag::Background, requested) => {
                let p = requested.unwrap_or(Vec3::ZERO);
                let z = if p.z <= 0.0 { Z_BACKGROUND } else { p.z };
                let placed = Vec3::new(p.x, p.y, z);
                (placed, Some(placed))
            }
            (_, Some(p)) => {
                let placed = Vec3::new(p.x, p.y, play_depth(p.z));
                (placed, Some(placed))
            }
            (_, None) => (Vec3::new(0.0, 0.0, Z_PLAY_OBJECT), None),
        };

        let scale = descriptor
            .scale
            .filter(|s| s.x > 0.0 && s.y > 0.0 && s.z > 0.0)
            .unwrap_or(Vec3::ONE);

        let sprite = match catalog.resolve(AssetKind::Sprite, &name) {
            Ok(sprite) => Some(sprite),
            Err(err) => {
                warn!("[Stage scene] Creating '{name}' without a sprite: {err}");
                None
            }
        };
        let audio = match descriptor.audio_file.as_deref() {
            Some(file) => match catalog.resolve(AssetKind::Audio, file) {
                Ok(audio) => Some(audio),
                Err(err) => {
                    warn!("[Stage scene] Creating '{name}' without audio: {err}");
                    None
                }
            },
            None => None,
        };

        let draggable = descriptor.draggable && descriptor.tag != ObjectTag::Background;
        let id = ObjectId(self.next_id);
        self.next_id += 1;

        let object = SceneObject {
            id,
            name: name.clone(),
            tag: descriptor.tag,
            initial_position,
            position,
            motion: None,
            scale,
            draggable,
            layer: if draggable { Layer::Moveable } else { Layer::Static },
            touchable: self.touch_enabled,
            sprite,
            audio,
            slot: descriptor
                .slot
                .filter(|s| *s > 0)
                .and_then(|index| u32::try_from(index).ok())
                .map(|index| SlotPlacement {
                    index,
                    answer: descriptor.answer_slot,
                }),
            correct_slot: descriptor
                .correct_slot
                .filter(|s| *s > 0)
                .and_then(|s| u32::try_from(s - 1).ok()),
            is_correct: descriptor.is_correct,
            is_incorrect: descriptor.is_incorrect,
            visual: None,
        };

        info!(
            "[Stage scene] Created {:?} '{}' at {}",
            object.tag, object.name, object.position
        );
        self.by_name.insert(name, id);
        self.by_tag.entry(descriptor.tag).or_default().insert(id);
        let object = self.objects.entry(id).or_insert(object);
        Ok(&*object)
    }

    fn remove(&mut self, id: ObjectId) -> Option<SceneObject> {
        let object = self.objects.remove(&id)?;
        self.by_name.remove(&object.name);
        if let Some(ids) = self.by_tag.get_mut(&object.tag) {
            ids.remove(&id);
        }
        if let Some(entity) = object.visual {
            self.released.push(entity);
        }
        Some(object)
    }

    /// Destroys every object with `tag`. Returns how many were destroyed.
    pub fn destroy_by_tag(&mut self, tag: ObjectTag) -> usize {
        let ids: Vec<ObjectId> = self.by_tag.get(&tag).into_iter().flatten().copied().collect();
        let mut destroyed = 0;
        for id in ids {
            if let Some(object) = self.remove(id) {
                debug!("[Stage scene] Destroyed '{}'", object.name);
                destroyed += 1;
            }
        }
        destroyed
    }

    /// Destroys the named object if it exists.
    pub fn destroy_by_name(&mut self, name: &str) -> bool {
        match self.by_name.get(name).copied() {
            Some(id) => self.remove(id).is_some(),
            None => false,
        }
    }

    /// Returns every object with `tag` to its initial position, cancelling
    /// any move in flight. Objects created without one are skipped.
    pub fn reset_by_tag(&mut self, tag: ObjectTag) -> usize {
        let Some(ids) = self.by_tag.get(&tag) else {
            return 0;
        };
        let mut reset = 0;
        for id in ids {
            let Some(object) = self.objects.get_mut(id) else {
                continue;
            };
            match object.initial_position {
                Some(initial) => {
                    object.position = initial;
                    object.motion = None;
                    reset += 1;
                }
                None => warn!(
                    "[Stage scene] '{}' has no initial position, not resetting it",
                    object.name
                ),
            }
        }
        reset
    }

    /// Starts animating `name` toward `destination` from wherever it is now.
    pub fn start_move(&mut self, name: &str, destination: Vec3) -> Result<(), SceneError> {
        let object = self
            .by_name
            .get(name)
            .and_then(|id| self.objects.get_mut(id))
            .ok_or_else(|| SceneError::UnknownObject(name.to_string()))?;
        object.motion = Some(Motion {
            from: object.position,
            to: destination,
            elapsed: 0.0,
        });
        Ok(())
    }

    /// Advances in-flight moves by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        for object in self.objects.values_mut() {
            let Some(motion) = object.motion.as_mut() else {
                continue;
            };
            motion.elapsed += dt;
            let t = (motion.elapsed / MOVE_DURATION).clamp(0.0, 1.0);
            object.position = motion.from.lerp(motion.to, t);
            if t >= 1.0 {
                object.motion = None;
            }
        }
    }

    pub fn any_moving(&self) -> bool {
        self.objects.values().any(SceneObject::is_moving)
    }

    /// Sets the touchable flag on every live object; new objects inherit it.
    pub fn set_touchable(&mut self, enabled: bool) {
        self.touch_enabled = enabled;
        for object in self.objects.values_mut() {
            object.touchable = enabled;
        }
    }

    pub(crate) fn objects_mut(&mut self) -> impl Iterator<Item = &mut SceneObject> + '_ {
        self.objects.values_mut()
    }

    /// Visual entities of destroyed objects, for the renderer to despawn.
    pub(crate) fn take_released(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> AssetCatalog {
        AssetCatalog::from_manifest([
            "graphics/base-images/ball.png",
            "graphics/base-images/playground.png",
            "audio/chimes.wav",
        ])
    }

    fn play_object(name: &str, x: f32, y: f32) -> ObjectDescriptor {
        ObjectDescriptor::new(name, ObjectTag::PlayObject).at(Vec3::new(x, y, 0.0))
    }

    #[test]
    fn reset_returns_moved_object_to_initial_position() {
        let mut registry = SceneRegistry::default();
        registry
            .create(&play_object("ball", 10.0, 20.0), &catalog())
            .expect("create ball");

        registry
            .start_move("ball", Vec3::new(99.0, 99.0, 0.0))
            .expect("move ball");
        registry.advance(MOVE_DURATION);
        assert_eq!(registry.find("ball").unwrap().position(), Vec3::new(99.0, 99.0, 0.0));

        assert_eq!(registry.reset_by_tag(ObjectTag::PlayObject), 1);
        assert_eq!(registry.find("ball").unwrap().position(), Vec3::new(10.0, 20.0, 0.0));
        assert_eq!(
            registry.find("ball").unwrap().initial_position(),
            Some(Vec3::new(10.0, 20.0, 0.0))
        );
    }

    #[test]
    fn reset_cancels_move_in_flight_and_is_idempotent() {
        let mut registry = SceneRegistry::default();
        registry.create(&play_object("ball", 10.0, 20.0), &catalog()).unwrap();
        registry.start_move("ball", Vec3::new(50.0, 20.0, 0.0)).unwrap();
        registry.advance(MOVE_DURATION / 2.0);
        assert_eq!(registry.find("ball").unwrap().position(), Vec3::new(30.0, 20.0, 0.0));

        registry.reset_by_tag(ObjectTag::PlayObject);
        let once = registry.find("ball").unwrap().position();
        registry.reset_by_tag(ObjectTag::PlayObject);
        registry.advance(MOVE_DURATION);
        assert_eq!(registry.find("ball").unwrap().position(), once);
        assert!(!registry.any_moving());
    }

    #[test]
    fn loading_backgrounds_keeps_only_the_latest() {
        let mut registry = SceneRegistry::default();
        for name in ["playground", "zoo", "playground", "park"] {
            registry
                .create(&ObjectDescriptor::new(name, ObjectTag::Background), &catalog())
                .expect("create background");
            assert_eq!(registry.with_tag(ObjectTag::Background).count(), 1);
            assert_eq!(registry.background().unwrap().name(), name);
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn background_named_like_a_live_object_keeps_the_old_background() {
        let mut registry = SceneRegistry::default();
        registry
            .create(&ObjectDescriptor::new("playground", ObjectTag::Background), &catalog())
            .unwrap();
        registry.create(&play_object("park", 0.0, 0.0), &catalog()).unwrap();

        let clash = registry
            .create(&ObjectDescriptor::new("park", ObjectTag::Background), &catalog())
            .map(|o| o.id());
        assert_eq!(clash, Err(SceneError::DuplicateName("park".to_string())));
        assert_eq!(registry.background().unwrap().name(), "playground");
        assert_eq!(registry.find("park").unwrap().tag(), ObjectTag::PlayObject);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn out_of_range_slots_are_left_unset() {
        let mut registry = SceneRegistry::default();
        let mut desc = play_object("ball", 0.0, 0.0);
        desc.slot = Some(i64::from(u32::MAX) + 5);
        desc.correct_slot = Some(i64::from(u32::MAX) + 2);
        let obj = registry.create(&desc, &catalog()).unwrap();
        assert_eq!(obj.slot, None);
        assert_eq!(obj.correct_slot, None);

        let mut desc = play_object("top", 0.0, 0.0);
        desc.slot = Some(i64::from(u32::MAX));
        desc.correct_slot = Some(i64::from(u32::MAX) + 1);
        let obj = registry.create(&desc, &catalog()).unwrap();
        assert_eq!(obj.slot.map(|s| s.index), Some(u32::MAX));
        assert_eq!(obj.correct_slot, Some(u32::MAX));
    }

    #[test]
    fn background_depth_defaults_when_non_positive() {
        let mut registry = SceneRegistry::default();
        let bg = registry
            .create(
                &ObjectDescriptor::new("playground", ObjectTag::Background)
                    .at(Vec3::new(5.0, 6.0, -2.0)),
                &catalog(),
            )
            .unwrap();
        assert_eq!(bg.position(), Vec3::new(5.0, 6.0, Z_BACKGROUND));
        assert!(!bg.draggable);
        assert_eq!(bg.layer, Layer::Static);
    }

    #[test]
    fn play_object_placement_rules() {
        let mut registry = SceneRegistry::default();
        let mut desc = ObjectDescriptor::new("ball", ObjectTag::PlayObject)
            .at(Vec3::new(1.0, 2.0, 7.0));
        desc.scale = Some(Vec3::new(2.0, 0.0, 1.0));
        desc.slot = Some(0);
        desc.correct_slot = Some(3);
        desc.draggable = false;
        let obj = registry.create(&desc, &catalog()).unwrap();
        assert_eq!(obj.position(), Vec3::new(1.0, 2.0, Z_PLAY_OBJECT));
        assert_eq!(obj.scale, Vec3::ONE);
        assert_eq!(obj.slot, None);
        assert_eq!(obj.correct_slot, Some(2));
        assert_eq!(obj.layer, Layer::Static);

        let mut slot = ObjectDescriptor::new("slot1", ObjectTag::AnswerSlot)
            .at(Vec3::new(0.0, 0.0, Z_SLOT));
        slot.slot = Some(2);
        slot.answer_slot = true;
        let obj = registry.create(&slot, &catalog()).unwrap();
        assert_eq!(obj.position().z, Z_SLOT);
        assert_eq!(obj.slot, Some(SlotPlacement { index: 2, answer: true }));
        assert_eq!(obj.layer, Layer::Moveable);
    }

    #[test]
    fn duplicate_names_are_rejected_and_empty_names_generated() {
        let mut registry = SceneRegistry::default();
        registry.create(&play_object("ball", 0.0, 0.0), &catalog()).unwrap();
        assert_eq!(
            registry
                .create(&play_object("ball", 1.0, 1.0), &catalog())
                .map(|o| o.id()),
            Err(SceneError::DuplicateName("ball".to_string()))
        );
        assert_eq!(registry.find("ball").unwrap().position(), Vec3::ZERO);

        let first = registry
            .create(&play_object("", 0.0, 0.0), &catalog())
            .unwrap()
            .name()
            .to_string();
        let second = registry
            .create(&play_object("  ", 0.0, 0.0), &catalog())
            .unwrap()
            .name()
            .to_string();
        assert!(first.starts_with("object-"));
        assert_ne!(first, second);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn ids_are_not_reused_after_destroy() {
        let mut registry = SceneRegistry::default();
        let first = registry.create(&play_object("ball", 0.0, 0.0), &catalog()).unwrap().id();
        assert!(registry.destroy_by_name("ball"));
        let second = registry.create(&play_object("ball", 0.0, 0.0), &catalog()).unwrap().id();
        assert!(second > first);
    }

    #[test]
    fn destroying_missing_objects_is_a_no_op() {
        let mut registry = SceneRegistry::default();
        assert!(!registry.destroy_by_name("ghost"));
        assert_eq!(registry.destroy_by_tag(ObjectTag::AnswerSlot), 0);
        assert_eq!(registry.reset_by_tag(ObjectTag::PlayObject), 0);
    }

    #[test]
    fn missing_assets_degrade_to_object_without_them() {
        let mut registry = SceneRegistry::default();
        let mut desc = play_object("ghost", 0.0, 0.0);
        desc.audio_file = Some("nothing".to_string());
        let obj = registry.create(&desc, &catalog()).unwrap();
        assert_eq!(obj.sprite, None);
        assert_eq!(obj.audio, None);

        let mut desc = play_object("ball", 0.0, 0.0);
        desc.audio_file = Some("chimes".to_string());
        let obj = registry.create(&desc, &catalog()).unwrap();
        assert_eq!(obj.sprite.as_ref().map(AssetRef::path), Some("graphics/base-images/ball.png"));
        assert_eq!(obj.audio.as_ref().map(AssetRef::path), Some("audio/chimes.wav"));
    }

    #[test]
    fn reset_skips_objects_without_initial_position() {
        let mut registry = SceneRegistry::default();
        registry
            .create(&ObjectDescriptor::new("floating", ObjectTag::PlayObject), &catalog())
            .unwrap();
        registry.create(&play_object("ball", 3.0, 4.0), &catalog()).unwrap();
        registry.start_move("floating", Vec3::new(8.0, 8.0, 0.0)).unwrap();
        registry.advance(MOVE_DURATION);

        assert_eq!(registry.reset_by_tag(ObjectTag::PlayObject), 1);
        assert_eq!(registry.find("floating").unwrap().position(), Vec3::new(8.0, 8.0, 0.0));
    }

    #[test]
    fn snapshot_is_in_creation_order_and_touch_is_inherited() {
        let mut registry = SceneRegistry::default();
        for name in ["c", "a", "b"] {
            registry.create(&play_object(name, 0.0, 0.0), &catalog()).unwrap();
        }
        registry.set_touchable(false);
        registry.create(&play_object("d", 0.0, 0.0), &catalog()).unwrap();

        let names: Vec<&str> = registry.snapshot().iter().map(|o| o.name()).collect();
        assert_eq!(names, vec!["c", "a", "b", "d"]);
        assert!(registry.snapshot().iter().all(|o| !o.touchable));
    }

    #[test]
    fn destroy_releases_visual_entities() {
        let mut registry = SceneRegistry::default();
        registry.create(&play_object("ball", 0.0, 0.0), &catalog()).unwrap();
        let entity = Entity::from_raw(42);
        for obj in registry.objects_mut() {
            obj.visual = Some(entity);
        }
        registry.destroy_by_tag(ObjectTag::PlayObject);
        assert_eq!(registry.take_released(), vec![entity]);
        assert!(registry.take_released().is_empty());
    }
}
