use bevy::prelude::*;
use crossbeam_channel::{Receiver, Sender};

use crate::protocol::ObjectDescriptor;
use crate::sidekick::SidekickAnimation;

/// Deferred scene work produced on the receive thread and applied on the
/// presentation loop. Arguments are already validated by the dispatcher.
#[derive(Clone, Debug, PartialEq)]
pub enum StageAction {
    ResetScene,
    ClearScene,
    LoadObject(ObjectDescriptor),
    MoveObject { name: String, destination: Vec3 },
    ApplyTouch(bool),
    SidekickSay(String),
    SidekickDo(SidekickAnimation),
    Highlight(String),
    CaptureKeyframe,
    Report(String),
}

impl StageAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ResetScene => "reset",
            Self::ClearScene => "clear",
            Self::LoadObject(_) => "load object",
            Self::MoveObject { .. } => "move object",
            Self::ApplyTouch(_) => "apply touch",
            Self::SidekickSay(_) => "sidekick say",
            Self::SidekickDo(_) => "sidekick do",
            Self::Highlight(_) => "highlight",
            Self::CaptureKeyframe => "capture keyframe",
            Self::Report(_) => "report",
        }
    }
}

/// Producer half. Cloneable and never blocks.
#[derive(Clone)]
pub struct ActionSender(Sender<StageAction>);

impl ActionSender {
    pub fn enqueue(&self, action: StageAction) {
        if let Err(err) = self.0.send(action) {
            warn!(
                "[Stage queue] Presentation loop is gone, dropping {}",
                err.0.label()
            );
        }
    }
}

/// Consumer half, owned by the presentation loop.
#[derive(Resource)]
pub struct ActionReceiver(Receiver<StageAction>);

impl ActionReceiver {
    pub fn pending(&self) -> usize {
        self.0.len()
    }

    /// Runs every action queued before the call, in FIFO order. Actions that
    /// arrive mid-drain wait for the next call. A failing action is logged
    /// and the rest still run. Returns how many actions ran.
    pub fn drain_all<E, F>(&self, mut apply: F) -> usize
    where
        E: std::fmt::Display,
        F: FnMut(StageAction) -> Result<(), E>,
    {
        let queued = self.0.len();
        let mut ran = 0;
        for action in self.0.try_iter().take(queued) {
            let label = action.label();
            if let Err(err) = apply(action) {
                warn!("[Stage queue] {label} failed: {err}");
            }
            ran += 1;
        }
        ran
    }
}

/// Unbounded: a runaway sender grows memory rather than blocking the receive thread.
pub fn action_queue() -> (ActionSender, ActionReceiver) {
    let (tx, rx) = crossbeam_channel::unbounded::<StageAction>();
    (ActionSender(tx), ActionReceiver(rx))
}
