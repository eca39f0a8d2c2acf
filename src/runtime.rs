
use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use thiserror::Error;

use crate::dispatch::SharedFlags;
use crate::highlight::Highlight;
use crate::interaction::{report_interactions, InteractionEvent, PendingObjectAudio};
use crate::protocol::{ObjectTag, OutboundEvent};
use crate::queue::{ActionReceiver, StageAction};
use crate::scene::{advance_motion, AssetCatalog, SceneError, SceneRegistry};
use crate::sidekick::{tick_sidekick, Sidekick, SidekickError};
use crate::telemetry::{capture_snapshot, TelemetryEmitter};

/// Set when running without a window; nothing visual or audible is spawned.
#[derive(Resource, Clone, Copy, Debug, Default)]
pub struct HeadlessMode(pub bool);

/// Per-frame order: queued commands first, then their knock-on effects, then
/// whatever draws them.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum StageSet {
    Drain,
    Effects,
    Present,
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Sidekick(#[from] SidekickError),
}

#[derive(SystemParam)]
pub(crate) struct StageRuntimeCtx<'w> {
    receiver: Res<'w, ActionReceiver>,
    registry: ResMut<'w, SceneRegistry>,
    catalog: Res<'w, AssetCatalog>,
    sidekick: ResMut<'w, Sidekick>,
    highlight: ResMut<'w, Highlight>,
    emitter: Res<'w, TelemetryEmitter>,
}

pub(crate) fn process_stage_actions(ctx: StageRuntimeCtx<'_>) {
    let StageRuntimeCtx {
        receiver,
        mut registry,
        catalog,
        mut sidekick,
        mut highlight,
        emitter,
    } = ctx;

    if receiver.pending() == 0 {
        return;
    }
    receiver.drain_all(|action| -> Result<(), ActionError> {
        match action {
            StageAction::ResetScene => {
                let reset = registry.reset_by_tag(ObjectTag::PlayObject);
                highlight.hide();
                info!("[Stage runtime] Reset {reset} objects");
            }
            StageAction::ClearScene => {
                let cleared: usize = ObjectTag::ALL
                    .into_iter()
                    .map(|tag| registry.destroy_by_tag(tag))
                    .sum();
                highlight.hide();
                info!("[Stage runtime] Cleared {cleared} objects");
            }
            StageAction::LoadObject(descriptor) => {
                registry.create(&descriptor, &catalog)?;
            }
            StageAction::MoveObject { name, destination } => {
                registry.start_move(&name, destination)?;
            }
            StageAction::ApplyTouch(enabled) => registry.set_touchable(enabled),
            StageAction::SidekickSay(utterance) => sidekick.say(&utterance, &catalog)?,
            StageAction::SidekickDo(animation) => sidekick.perform(animation)?,
            StageAction::Highlight(name) => {
                let position = registry
                    .find(&name)
                    .map(|obj| obj.position())
                    .ok_or(SceneError::UnknownObject(name.clone()))?;
                highlight.show_at(&name, position);
            }
            StageAction::CaptureKeyframe => {
                emitter.emit(OutboundEvent::SceneSnapshot(capture_snapshot(&registry)));
            }
            StageAction::Report(text) => emitter.emit(OutboundEvent::Message(text)),
        }
        Ok(())
    });
}

/// Registers the presentation side of the stage: queue consumer, scene,
/// sidekick, highlight and interaction telemetry.
pub fn install(
    app: &mut App,
    receiver: ActionReceiver,
    flags: SharedFlags,
    emitter: TelemetryEmitter,
    catalog: AssetCatalog,
    sidekick_enabled: bool,
) {
    if !sidekick_enabled {
        info!("[Stage runtime] Sidekick disabled");
    }
    app.init_resource::<Time>()
        .init_resource::<HeadlessMode>()
        .insert_resource(receiver)
        .insert_resource(flags)
        .insert_resource(emitter)
        .insert_resource(catalog)
        .insert_resource(SceneRegistry::default())
        .insert_resource(Sidekick::new(sidekick_enabled))
        .init_resource::<Highlight>()
        .init_resource::<PendingObjectAudio>()
        .add_event::<InteractionEvent>()
        .configure_sets(
            Update,
            (StageSet::Drain, StageSet::Effects, StageSet::Present).chain(),
        )
        .add_systems(Update, process_stage_actions.in_set(StageSet::Drain))
        .add_systems(
            Update,
            (advance_motion, tick_sidekick, report_interactions).in_set(StageSet::Effects),
        );
}
