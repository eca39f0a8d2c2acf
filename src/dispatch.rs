use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bevy::prelude::*;

use crate::protocol::{Command, MoveRequest};
use crate::queue::{ActionSender, StageAction};
use crate::sidekick::SidekickAnimation;

/// The only state the dispatcher carries between commands. Both flags are
/// written on the receive thread and read anywhere.
#[derive(Debug)]
pub struct StageFlags {
    touch_enabled: AtomicBool,
    connected: AtomicBool,
}

impl Default for StageFlags {
    fn default() -> Self {
        Self {
            touch_enabled: AtomicBool::new(true),
            connected: AtomicBool::new(false),
        }
    }
}

impl StageFlags {
    pub fn touch_enabled(&self) -> bool {
        self.touch_enabled.load(Ordering::Acquire)
    }

    pub fn set_touch_enabled(&self, enabled: bool) {
        self.touch_enabled.store(enabled, Ordering::Release);
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }
}

#[derive(Resource, Clone, Default, Debug)]
pub struct SharedFlags(pub Arc<StageFlags>);

/// Turns decoded commands into queued stage actions. Runs on the receive
/// thread and never touches the scene directly.
#[derive(Clone)]
pub struct CommandDispatcher {
    queue: ActionSender,
    flags: Arc<StageFlags>,
}

impl CommandDispatcher {
    pub fn new(queue: ActionSender, flags: Arc<StageFlags>) -> Self {
        Self { queue, flags }
    }

    pub fn flags(&self) -> &Arc<StageFlags> {
        &self.flags
    }

    pub(crate) fn queue(&self) -> &ActionSender {
        &self.queue
    }

    pub fn dispatch(&self, command: Command) {
        match command {
            Command::Reset => self.queue.enqueue(StageAction::ResetScene),
            Command::Clear => self.queue.enqueue(StageAction::ClearScene),
            Command::DisableTouch => self.set_touch(false),
            Command::EnableTouch => self.set_touch(true),
            Command::LoadObject(descriptor) => {
                self.queue.enqueue(StageAction::LoadObject(descriptor));
            }
            Command::MoveObject(MoveRequest { name, destination }) => {
                if name.trim().is_empty() {
                    warn!("[Stage dispatch] MOVE_OBJECT without an object name, ignoring");
                    return;
                }
                self.queue.enqueue(StageAction::MoveObject { name, destination });
            }
            Command::SidekickSay(utterance) => {
                if utterance.trim().is_empty() {
                    warn!("[Stage dispatch] SIDEKICK_SAY with nothing to say, ignoring");
                    return;
                }
                self.queue.enqueue(StageAction::SidekickSay(utterance));
            }
            Command::SidekickDo(action) => match SidekickAnimation::from_name(&action) {
                Some(animation) => self.queue.enqueue(StageAction::SidekickDo(animation)),
                None if action.trim().is_empty() => {
                    warn!("[Stage dispatch] SIDEKICK_DO with no action, ignoring");
                }
                None => warn!("[Stage dispatch] Sidekick can't do '{action}', ignoring"),
            },
            Command::HighlightObject(name) => {
                if name.trim().is_empty() {
                    warn!("[Stage dispatch] HIGHLIGHT_OBJECT without an object name, ignoring");
                    return;
                }
                self.queue.enqueue(StageAction::Highlight(name));
            }
            Command::RequestKeyframe => self.queue.enqueue(StageAction::CaptureKeyframe),
            Command::Unrecognized(id) => {
                warn!("[Stage dispatch] Unrecognized command {id}, ignoring");
            }
        }
    }

    fn set_touch(&self, enabled: bool) {
        self.flags.set_touch_enabled(enabled);
        self.queue.enqueue(StageAction::ApplyTouch(enabled));
    }
}
