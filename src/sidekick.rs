use bevy::prelude::*;
use thiserror::Error;

use crate::protocol::OutboundEvent;
use crate::scene::{AssetCatalog, AssetError, AssetKind, AssetRef};
use crate::telemetry::TelemetryEmitter;

/// How long a one-shot sidekick animation holds its flag.
pub const ANIMATION_SECS: f32 = 1.0;

/// Animations the sidekick character knows, by clip name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SidekickAnimation {
    Speak,
    Fly,
    FlyBeakOpen,
}

impl SidekickAnimation {
    pub const ALL: [SidekickAnimation; 3] = [Self::Speak, Self::Fly, Self::FlyBeakOpen];

    pub fn clip(self) -> &'static str {
        match self {
            Self::Speak => "BeakOpenClose",
            Self::Fly => "FlapWings",
            Self::FlyBeakOpen => "FlapBeakOpen",
        }
    }

    /// Animator flag held while the clip plays.
    pub fn flag(self) -> &'static str {
        match self {
            Self::Speak => "Speak",
            Self::Fly => "Fly",
            Self::FlyBeakOpen => "FlyBeakOpen",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|anim| {
            anim.clip().eq_ignore_ascii_case(name) || anim.flag().eq_ignore_ascii_case(name)
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SidekickError {
    #[error("sidekick is disabled")]
    Disabled,
    #[error("sidekick is still saying '{0}'")]
    Busy(String),
    #[error(transparent)]
    Voice(#[from] AssetError),
}

#[derive(Debug)]
struct Speech {
    utterance: String,
    frames: u32,
}

/// Marks the one-shot audio entity playing the sidekick's current utterance.
#[derive(Component)]
pub struct SidekickVoice;

#[derive(Resource, Debug)]
pub struct Sidekick {
    enabled: bool,
    speech: Option<Speech>,
    animation: Option<(SidekickAnimation, f32)>,
    pending_voice: Option<AssetRef>,
}

impl Sidekick {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            speech: None,
            animation: None,
            pending_voice: None,
        }
    }

    pub fn say(&mut self, utterance: &str, catalog: &AssetCatalog) -> Result<(), SidekickError> {
        if !self.enabled {
            return Err(SidekickError::Disabled);
        }
        if let Some(speech) = &self.speech {
            return Err(SidekickError::Busy(speech.utterance.clone()));
        }
        let voice = catalog.resolve(AssetKind::Audio, utterance)?;
        info!("[Stage sidekick] Saying '{utterance}'");
        self.speech = Some(Speech {
            utterance: utterance.to_string(),
            frames: 0,
        });
        self.pending_voice = Some(voice);
        Ok(())
    }

    pub fn perform(&mut self, animation: SidekickAnimation) -> Result<(), SidekickError> {
        if !self.enabled {
            return Err(SidekickError::Disabled);
        }
        info!("[Stage sidekick] Playing {}", animation.clip());
        self.animation = Some((animation, ANIMATION_SECS));
        Ok(())
    }

    pub fn is_speaking(&self) -> bool {
        self.speech.is_some()
    }

    pub fn current_animation(&self) -> Option<SidekickAnimation> {
        self.animation.map(|(anim, _)| anim)
    }

    pub fn flag_set(&self, flag: &str) -> bool {
        (self.speech.is_some() && flag == SidekickAnimation::Speak.flag())
            || self.current_animation().is_some_and(|anim| anim.flag() == flag)
    }

    pub(crate) fn take_pending_voice(&mut self) -> Option<AssetRef> {
        self.pending_voice.take()
    }

    /// Speech ends once a frame has passed with no voice playing; animations
    /// end after [`ANIMATION_SECS`]. Returns true on the tick speech ends.
    pub fn tick(&mut self, dt: f32, voice_playing: bool) -> bool {
        let mut speech_finished = false;
        if let Some(speech) = self.speech.as_mut() {
            speech.frames += 1;
            if speech.frames > 1 && !voice_playing {
                info!("[Stage sidekick] Done saying '{}'", speech.utterance);
                self.speech = None;
                self.pending_voice = None;
                speech_finished = true;
            }
        }
        if let Some((anim, remaining)) = self.animation.as_mut() {
            *remaining -= dt;
            if *remaining <= 0.0 {
                debug!("[Stage sidekick] Done playing {}", anim.clip());
                self.animation = None;
            }
        }
        speech_finished
    }
}

pub(crate) fn tick_sidekick(
    time: Res<Time>,
    mut sidekick: ResMut<Sidekick>,
    voices: Query<(), With<SidekickVoice>>,
    emitter: Res<TelemetryEmitter>,
) {
    if sidekick.tick(time.delta_secs(), !voices.is_empty()) {
        emitter.emit(OutboundEvent::AudioDone);
    }
}

fn play_sidekick_voice(
    mut commands: Commands,
    mut sidekick: ResMut<Sidekick>,
    asset_server: Res<AssetServer>,
) {
    let Some(voice) = sidekick.take_pending_voice() else {
        return;
    };
    commands.spawn((
        SidekickVoice,
        AudioPlayer::<AudioSource>::new(asset_server.load(voice.path().to_string())),
        PlaybackSettings::DESPAWN,
    ));
}

/// Plays sidekick speech through the audio device. Windowed mode only.
pub struct SidekickVoicePlugin;

impl Plugin for SidekickVoicePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            play_sidekick_voice.in_set(crate::runtime::StageSet::Present),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> AssetCatalog {
        AssetCatalog::from_manifest(["audio/ImAToucan.wav", "audio/ImFromSpain.wav"])
    }

    #[test]
    fn animation_names_resolve_by_clip_or_flag() {
        assert_eq!(
            SidekickAnimation::from_name("FlapWings"),
            Some(SidekickAnimation::Fly)
        );
        assert_eq!(
            SidekickAnimation::from_name("flybeakopen"),
            Some(SidekickAnimation::FlyBeakOpen)
        );
        assert_eq!(SidekickAnimation::from_name("Dance"), None);
        assert_eq!(SidekickAnimation::from_name(""), None);
    }

    #[test]
    fn speech_holds_flag_until_voice_finishes() {
        let mut sidekick = Sidekick::new(true);
        sidekick.say("ImAToucan", &catalog()).expect("say");
        assert!(sidekick.flag_set("Speak"));
        assert_eq!(
            sidekick.take_pending_voice(),
            Some(AssetRef("audio/ImAToucan.wav".to_string()))
        );

        assert_eq!(
            sidekick.say("ImFromSpain", &catalog()),
            Err(SidekickError::Busy("ImAToucan".to_string()))
        );

        assert!(!sidekick.tick(0.016, true));
        assert!(!sidekick.tick(0.016, true));
        assert!(sidekick.is_speaking());
        assert!(sidekick.tick(0.016, false));
        assert!(!sidekick.is_speaking());
        assert!(!sidekick.tick(0.016, false));
        assert!(!sidekick.flag_set("Speak"));
    }

    #[test]
    fn missing_voice_is_rejected_without_state_change() {
        let mut sidekick = Sidekick::new(true);
        assert!(matches!(
            sidekick.say("Nope", &catalog()),
            Err(SidekickError::Voice(AssetError::NotFound { .. }))
        ));
        assert!(!sidekick.is_speaking());
        assert_eq!(sidekick.take_pending_voice(), None);
    }

    #[test]
    fn animation_flag_clears_after_clip_length() {
        let mut sidekick = Sidekick::new(true);
        sidekick.perform(SidekickAnimation::Fly).unwrap();
        assert!(sidekick.flag_set("Fly"));
        assert!(!sidekick.flag_set("Speak"));
        assert!(!sidekick.tick(ANIMATION_SECS / 2.0, false));
        assert_eq!(sidekick.current_animation(), Some(SidekickAnimation::Fly));
        assert!(!sidekick.tick(ANIMATION_SECS, false));
        assert_eq!(sidekick.current_animation(), None);
    }

    #[test]
    fn disabled_sidekick_refuses_everything() {
        let mut sidekick = Sidekick::new(false);
        assert_eq!(sidekick.say("ImAToucan", &catalog()), Err(SidekickError::Disabled));
        assert_eq!(
            sidekick.perform(SidekickAnimation::Speak),
            Err(SidekickError::Disabled)
        );
    }
}
