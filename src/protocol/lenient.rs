//! Field deserializers that accept the loose scalar encodings controllers send:
//! booleans and numbers as strings, `"null"` and `""` meaning absent.

use bevy::math::Vec3;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn is_absent(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s.eq_ignore_ascii_case("null")
}

pub(super) fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

pub(super) fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) if is_absent(&s) => Ok(None),
        Value::String(s) => Ok(Some(s.trim().to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(D::Error::custom(format!("expected a string, got {other}"))),
    }
}

pub(super) fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(b)),
        Value::Number(n) => Ok(Some(n.as_f64().is_some_and(|v| v != 0.0))),
        Value::String(s) if is_absent(&s) => Ok(None),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            _ => Err(D::Error::custom(format!("expected a boolean, got '{s}'"))),
        },
        other => Err(D::Error::custom(format!("expected a boolean, got {other}"))),
    }
}

pub(super) fn integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) if is_absent(&s) => Ok(None),
        other => match number(&other) {
            Some(v) if v.fract() == 0.0 => Ok(Some(v as i64)),
            _ => Err(D::Error::custom(format!("expected an integer, got {other}"))),
        },
    }
}

/// `{x, y, z?}` or `[x, y, z?]`, components as numbers or numeric strings.
pub(super) fn point<'de, D>(deserializer: D) -> Result<Option<Vec3>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Null => Ok(None),
        Value::String(s) if is_absent(s) => Ok(None),
        _ => point_from_value(&value)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected a position, got {value}"))),
    }
}

pub(super) fn point_from_value(value: &Value) -> Option<Vec3> {
    match value {
        Value::Object(map) => {
            let x = number(map.get("x")?)?;
            let y = number(map.get("y")?)?;
            let z = match map.get("z") {
                Some(z) => number(z)?,
                None => 0.0,
            };
            finite(Vec3::new(x as f32, y as f32, z as f32))
        }
        Value::Array(items) if items.len() == 2 || items.len() == 3 => {
            let x = number(&items[0])?;
            let y = number(&items[1])?;
            let z = match items.get(2) {
                Some(z) => number(z)?,
                None => 0.0,
            };
            finite(Vec3::new(x as f32, y as f32, z as f32))
        }
        Value::String(s) => serde_json::from_str::<Value>(s)
            .ok()
            .filter(|v| !v.is_string())
            .and_then(|v| point_from_value(&v)),
        _ => None,
    }
}

/// Rejects components that overflowed on the way down to `f32`.
fn finite(point: Vec3) -> Option<Vec3> {
    point.is_finite().then_some(point)
}
