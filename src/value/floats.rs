//! JSON form of float buffers that may hold non-finite values
//!
//! JSON has no NaN or infinity, and `serde_json` silently writes them as
//! `null`. Float elements are therefore written as numbers when finite and
//! as the strings `"NaN"`, `"inf"` and `"-inf"` otherwise. `null` still
//! reads back as NaN for payloads produced by other tools.
//!
//! Used through `#[serde(with = "floats")]` on float buffers and by the
//! split-oriented tabular codec.

use serde::de::Error as _;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;

/// Float element stored through this module.
pub(crate) trait Float: Copy {
    fn widen(self) -> f64;
    fn narrow(value: f64) -> Self;
}

impl Float for f64 {
    fn widen(self) -> f64 {
        self
    }

    fn narrow(value: f64) -> Self {
        value
    }
}

impl Float for f32 {
    fn widen(self) -> f64 {
        f64::from(self)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn narrow(value: f64) -> Self {
        // exact for every value that was widened from f32
        value as Self
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Cell {
    Number(Option<f64>),
    Text(String),
}

const NAN: &str = "NaN";
const INF: &str = "inf";
const NEG_INF: &str = "-inf";

fn label(value: f64) -> &'static str {
    if value.is_nan() {
        NAN
    } else if value > 0.0 {
        INF
    } else {
        NEG_INF
    }
}

fn parse(text: &str) -> Option<f64> {
    match text {
        "NaN" | "nan" => Some(f64::NAN),
        "inf" | "Infinity" => Some(f64::INFINITY),
        "-inf" | "-Infinity" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

impl Cell {
    fn new(value: f64) -> Self {
        if value.is_finite() {
            Self::Number(Some(value))
        } else {
            Self::Text(label(value).to_string())
        }
    }

    fn value(self) -> Result<f64, String> {
        match self {
            Self::Number(v) => Ok(v.unwrap_or(f64::NAN)),
            Self::Text(text) => parse(&text).ok_or_else(|| format!("`{text}` is not a float")),
        }
    }
}

pub(crate) fn serialize<T, S>(values: &[T], serializer: S) -> Result<S::Ok, S::Error>
where
    T: Float,
    S: Serializer,
{
    let mut seq = serializer.serialize_seq(Some(values.len()))?;
    for v in values {
        seq.serialize_element(&Cell::new(v.widen()))?;
    }
    seq.end()
}

pub(crate) fn deserialize<'de, T, D>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    T: Float,
    D: Deserializer<'de>,
{
    Vec::<Cell>::deserialize(deserializer)?
        .into_iter()
        .map(|cell| cell.value().map(T::narrow).map_err(D::Error::custom))
        .collect()
}

/// JSON cell for one float.
pub(crate) fn to_json(value: f64) -> Json {
    serde_json::Number::from_f64(value).map_or_else(|| Json::from(label(value)), Json::Number)
}

/// Inverse of [`to_json`]; `null` is NaN.
pub(crate) fn from_json(cell: &Json) -> Option<f64> {
    match cell {
        Json::Null => Some(f64::NAN),
        Json::String(text) => parse(text),
        other => other.as_f64(),
    }
}
