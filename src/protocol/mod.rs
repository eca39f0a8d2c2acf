mod codec;
mod lenient;
mod outbound;

use std::fmt;

use bevy::math::Vec3;
use serde::{Deserialize, Serialize};

pub use codec::{decode, DecodeError};
pub use outbound::{
    advertise, decode_snapshot, encode, handshake, subscribe, InteractionRecord, OutboundEvent,
    SceneSnapshot, SnapshotObject, CHECKING_IN, GOT_MESSAGE,
};

/// The fixed command vocabulary. Discriminants are the wire ids.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CommandKind {
    Reset = 0,
    DisableTouch = 1,
    EnableTouch = 2,
    SidekickDo = 3,
    SidekickSay = 4,
    LoadObject = 5,
    Clear = 6,
    MoveObject = 7,
    HighlightObject = 8,
    RequestKeyframe = 9,
}

impl CommandKind {
    pub const ALL: [CommandKind; 10] = [
        CommandKind::Reset,
        CommandKind::DisableTouch,
        CommandKind::EnableTouch,
        CommandKind::SidekickDo,
        CommandKind::SidekickSay,
        CommandKind::LoadObject,
        CommandKind::Clear,
        CommandKind::MoveObject,
        CommandKind::HighlightObject,
        CommandKind::RequestKeyframe,
    ];

    pub fn id(self) -> i64 {
        self as i64
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Reset => "RESET",
            Self::DisableTouch => "DISABLE_TOUCH",
            Self::EnableTouch => "ENABLE_TOUCH",
            Self::SidekickDo => "SIDEKICK_DO",
            Self::SidekickSay => "SIDEKICK_SAY",
            Self::LoadObject => "LOAD_OBJECT",
            Self::Clear => "CLEAR",
            Self::MoveObject => "MOVE_OBJECT",
            Self::HighlightObject => "HIGHLIGHT_OBJECT",
            Self::RequestKeyframe => "REQUEST_KEYFRAME",
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A command identifier outside the known vocabulary, kept for logging.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawCommandId {
    Number(i64),
    Name(String),
}

impl fmt::Display for RawCommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(id) => write!(f, "{id}"),
            Self::Name(name) => write!(f, "'{name}'"),
        }
    }
}

/// Role of a scene object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectTag {
    Background,
    PlayObject,
    AnswerSlot,
    SceneSlot,
}

impl ObjectTag {
    pub const ALL: [ObjectTag; 4] = [
        ObjectTag::Background,
        ObjectTag::PlayObject,
        ObjectTag::AnswerSlot,
        ObjectTag::SceneSlot,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "background" => Some(Self::Background),
            "playobject" | "play" => Some(Self::PlayObject),
            "answerslot" => Some(Self::AnswerSlot),
            "sceneslot" => Some(Self::SceneSlot),
            _ => None,
        }
    }
}

/// Everything needed to create one scene object, as decoded from `LOAD_OBJECT`.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectDescriptor {
    pub name: String,
    pub tag: ObjectTag,
    pub draggable: bool,
    pub audio_file: Option<String>,
    pub init_position: Option<Vec3>,
    pub scale: Option<Vec3>,
    /// 1-indexed slot as sent; non-positive means none.
    pub slot: Option<i64>,
    pub answer_slot: bool,
    /// 1-indexed correct slot as sent; non-positive means none.
    pub correct_slot: Option<i64>,
    pub is_correct: bool,
    pub is_incorrect: bool,
}

impl ObjectDescriptor {
    pub fn new(name: impl Into<String>, tag: ObjectTag) -> Self {
        Self {
            name: name.into(),
            tag,
            draggable: true,
            audio_file: None,
            init_position: None,
            scale: None,
            slot: None,
            answer_slot: false,
            correct_slot: None,
            is_correct: false,
            is_incorrect: false,
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.init_position = Some(position);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MoveRequest {
    pub name: String,
    pub destination: Vec3,
}

/// One decoded instruction from the controller.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Reset,
    DisableTouch,
    EnableTouch,
    SidekickDo(String),
    SidekickSay(String),
    LoadObject(ObjectDescriptor),
    Clear,
    MoveObject(MoveRequest),
    HighlightObject(String),
    RequestKeyframe,
    Unrecognized(RawCommandId),
}

impl Command {
    pub fn kind(&self) -> Option<CommandKind> {
        Some(match self {
            Self::Reset => CommandKind::Reset,
            Self::DisableTouch => CommandKind::DisableTouch,
            Self::EnableTouch => CommandKind::EnableTouch,
            Self::SidekickDo(_) => CommandKind::SidekickDo,
            Self::SidekickSay(_) => CommandKind::SidekickSay,
            Self::LoadObject(_) => CommandKind::LoadObject,
            Self::Clear => CommandKind::Clear,
            Self::MoveObject(_) => CommandKind::MoveObject,
            Self::HighlightObject(_) => CommandKind::HighlightObject,
            Self::RequestKeyframe => CommandKind::RequestKeyframe,
            Self::Unrecognized(_) => return None,
        })
    }
}
