use bevy::math::Vec3;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::lenient;
use super::{Command, CommandKind, MoveRequest, ObjectDescriptor, ObjectTag, RawCommandId};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame is not a command envelope")]
    NotAnEnvelope,
    #[error("unexpected rosbridge op '{0}'")]
    UnexpectedOp(String),
    #[error("envelope has no command identifier")]
    MissingCommand,
    #[error("command identifier {0} is neither an integer nor a string")]
    InvalidCommandId(Value),
    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload { kind: CommandKind, reason: String },
}

enum CommandId {
    Known(CommandKind),
    Unknown(RawCommandId),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDescriptor {
    #[serde(default, deserialize_with = "lenient::string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    tag: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    draggable: Option<bool>,
    #[serde(default, deserialize_with = "lenient::string")]
    audio_file: Option<String>,
    #[serde(default, deserialize_with = "lenient::point")]
    init_position: Option<Vec3>,
    #[serde(default, deserialize_with = "lenient::point")]
    scale: Option<Vec3>,
    #[serde(default, deserialize_with = "lenient::integer")]
    slot: Option<i64>,
    #[serde(default, deserialize_with = "lenient::flag")]
    answer_slot: Option<bool>,
    #[serde(default, deserialize_with = "lenient::integer")]
    correct_slot: Option<i64>,
    #[serde(default, deserialize_with = "lenient::flag")]
    is_correct: Option<bool>,
    #[serde(default, deserialize_with = "lenient::flag")]
    is_incorrect: Option<bool>,
}

#[derive(Deserialize)]
struct WireMove {
    #[serde(default, deserialize_with = "lenient::string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient::point")]
    destination: Option<Vec3>,
}

/// Decodes one inbound frame. Unknown command ids decode to
/// [`Command::Unrecognized`]; only frames that are not a command envelope at
/// all, or whose payload cannot be read for a known command, are errors.
pub fn decode(frame: &str) -> Result<Command, DecodeError> {
    let value: Value = serde_json::from_str(frame)?;
    let envelope = unwrap_publish(value)?;
    let Value::Object(envelope) = envelope else {
        return Err(DecodeError::NotAnEnvelope);
    };
    let id = envelope.get("command").ok_or(DecodeError::MissingCommand)?;
    let kind = match command_id(id)? {
        CommandId::Known(kind) => kind,
        CommandId::Unknown(raw) => return Ok(Command::Unrecognized(raw)),
    };
    let properties = envelope.get("properties").filter(|p| !p.is_null());

    Ok(match kind {
        CommandKind::Reset => Command::Reset,
        CommandKind::DisableTouch => Command::DisableTouch,
        CommandKind::EnableTouch => Command::EnableTouch,
        CommandKind::Clear => Command::Clear,
        CommandKind::RequestKeyframe => Command::RequestKeyframe,
        CommandKind::SidekickDo => Command::SidekickDo(text_payload(kind, properties)?),
        CommandKind::SidekickSay => Command::SidekickSay(text_payload(kind, properties)?),
        CommandKind::HighlightObject => {
            Command::HighlightObject(text_payload(kind, properties)?)
        }
        CommandKind::LoadObject => {
            let wire: WireDescriptor = object_payload(kind, properties)?;
            Command::LoadObject(descriptor_from_wire(wire)?)
        }
        CommandKind::MoveObject => {
            let wire: WireMove = object_payload(kind, properties)?;
            let name = wire.name.ok_or_else(|| invalid(kind, "missing object name"))?;
            let destination = wire
                .destination
                .ok_or_else(|| invalid(kind, "missing destination"))?;
            Command::MoveObject(MoveRequest { name, destination })
        }
    })
}

/// Accepts either a bare `{command, properties}` envelope or a rosbridge
/// `publish` op wrapping one in `msg`.
fn unwrap_publish(value: Value) -> Result<Value, DecodeError> {
    let Value::Object(mut map) = value else {
        return Err(DecodeError::NotAnEnvelope);
    };
    let Some(op) = map.get("op") else {
        return Ok(Value::Object(map));
    };
    match op.as_str() {
        Some("publish") => match map.remove("msg") {
            Some(Value::String(inner)) => Ok(serde_json::from_str(&inner)?),
            Some(msg) => Ok(msg),
            None => Err(DecodeError::NotAnEnvelope),
        },
        Some(other) => Err(DecodeError::UnexpectedOp(other.to_string())),
        None => Err(DecodeError::UnexpectedOp(op.to_string())),
    }
}

fn command_id(id: &Value) -> Result<CommandId, DecodeError> {
    match id {
        Value::Number(n) => match n.as_i64() {
            Some(id) => Ok(CommandKind::from_id(id)
                .map(CommandId::Known)
                .unwrap_or(CommandId::Unknown(RawCommandId::Number(id)))),
            None => Err(DecodeError::InvalidCommandId(id.clone())),
        },
        Value::String(s) => {
            let s = s.trim();
            if let Ok(id) = s.parse::<i64>() {
                return Ok(CommandKind::from_id(id)
                    .map(CommandId::Known)
                    .unwrap_or(CommandId::Unknown(RawCommandId::Number(id))));
            }
            Ok(CommandKind::from_name(s)
                .map(CommandId::Known)
                .unwrap_or_else(|| CommandId::Unknown(RawCommandId::Name(s.to_string()))))
        }
        other => Err(DecodeError::InvalidCommandId(other.clone())),
    }
}

fn invalid(kind: CommandKind, reason: impl Into<String>) -> DecodeError {
    DecodeError::InvalidPayload {
        kind,
        reason: reason.into(),
    }
}

/// Plain-string payloads. A missing payload decodes to an empty string so the
/// dispatcher can reject it with a warning.
fn text_payload(kind: CommandKind, properties: Option<&Value>) -> Result<String, DecodeError> {
    match properties {
        None => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(other) => Err(invalid(kind, format!("expected a string, got {other}"))),
    }
}

/// Object payloads, sent either inline or as a JSON-encoded string.
fn object_payload<T>(kind: CommandKind, properties: Option<&Value>) -> Result<T, DecodeError>
where
    T: for<'de> Deserialize<'de>,
{
    let map: Map<String, Value> = match properties {
        None => return Err(invalid(kind, "missing payload")),
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => map,
            Ok(other) => return Err(invalid(kind, format!("expected an object, got {other}"))),
            Err(e) => return Err(invalid(kind, e.to_string())),
        },
        Some(other) => return Err(invalid(kind, format!("expected an object, got {other}"))),
    };
    serde_json::from_value(Value::Object(map)).map_err(|e| invalid(kind, e.to_string()))
}

fn descriptor_from_wire(wire: WireDescriptor) -> Result<ObjectDescriptor, DecodeError> {
    let kind = CommandKind::LoadObject;
    let tag = match wire.tag.as_deref() {
        None => ObjectTag::PlayObject,
        Some(raw) => {
            ObjectTag::parse(raw).ok_or_else(|| invalid(kind, format!("unknown tag '{raw}'")))?
        }
    };
    Ok(ObjectDescriptor {
        name: wire.name.unwrap_or_default(),
        tag,
        draggable: wire.draggable.unwrap_or(true),
        audio_file: wire.audio_file,
        init_position: wire.init_position,
        scale: wire.scale,
        slot: wire.slot,
        answer_slot: wire.answer_slot.unwrap_or(false),
        correct_slot: wire.correct_slot,
        is_correct: wire.is_correct.unwrap_or(false),
        is_incorrect: wire.is_incorrect.unwrap_or(false),
    })
}
