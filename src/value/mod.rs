//! Typed payloads held by parameters and results
//!
//! `Value` is the tagged union the storage codec dispatches on. Classification
//! happens once, through [`Value::kind`]; everything downstream matches on the
//! variant.

mod floats;
mod ndarray;
mod table;

pub use ndarray::{ArrayData, AxisSlice, DType, NdArray, SlicePlan};
pub use table::{Column, Frame, Series};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage kind of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Scalars and JSON-structured data
    Scalar,
    /// Homogeneous numeric array
    NdArray,
    /// Labeled 1-D series
    Series,
    /// Labeled 2-D table
    Frame,
}

impl ValueKind {
    /// Tag written to the `kind` attribute.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::NdArray => "ndarray",
            Self::Series => "series",
            Self::Frame => "frame",
        }
    }

    /// Parse a `kind` attribute.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "scalar" => Some(Self::Scalar),
            "ndarray" => Some(Self::NdArray),
            "series" => Some(Self::Series),
            "frame" => Some(Self::Frame),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameter or result payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Value {
    /// Scalar or structured JSON data
    Scalar(serde_json::Value),
    /// Numeric array
    #[serde(rename = "ndarray")]
    Array(NdArray),
    /// Labeled series
    Series(Series),
    /// Labeled table
    Frame(Frame),
}

impl Value {
    /// Storage kind of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Scalar(_) => ValueKind::Scalar,
            Self::Array(_) => ValueKind::NdArray,
            Self::Series(_) => ValueKind::Series,
            Self::Frame(_) => ValueKind::Frame,
        }
    }

    /// Integer scalar, if this is one.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Scalar(v) => v.as_i64(),
            _ => None,
        }
    }

    /// Numeric scalar as `f64`, if this is one.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => v.as_f64(),
            _ => None,
        }
    }

    /// String scalar, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(v) => v.as_str(),
            _ => None,
        }
    }

    /// Boolean scalar, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Scalar(v) => v.as_bool(),
            _ => None,
        }
    }

    /// Raw JSON scalar, if this is one.
    #[must_use]
    pub const fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// Array payload, if this is one.
    #[must_use]
    pub const fn as_array(&self) -> Option<&NdArray> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Series payload, if this is one.
    #[must_use]
    pub const fn as_series(&self) -> Option<&Series> {
        match self {
            Self::Series(s) => Some(s),
            _ => None,
        }
    }

    /// Frame payload, if this is one.
    #[must_use]
    pub const fn as_frame(&self) -> Option<&Frame> {
        match self {
            Self::Frame(f) => Some(f),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Scalar(v)
    }
}

macro_rules! scalar_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::Scalar(serde_json::Value::from(v))
            }
        })*
    };
}

scalar_from!(bool, i32, i64, u32, u64, f64, String, &str);

impl From<NdArray> for Value {
    fn from(a: NdArray) -> Self {
        Self::Array(a)
    }
}

impl From<Series> for Value {
    fn from(s: Series) -> Self {
        Self::Series(s)
    }
}

impl From<Frame> for Value {
    fn from(f: Frame) -> Self {
        Self::Frame(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(Value::from(3).kind(), ValueKind::Scalar);
        assert_eq!(Value::from(NdArray::from_f64(vec![1.0])).kind(), ValueKind::NdArray);
        let series = Series::with_default_index(None, Column::Int64(vec![1]));
        assert_eq!(Value::from(series).kind(), ValueKind::Series);
        let frame = Frame::new(vec![("a".into(), Column::Bool(vec![true]))]).unwrap();
        assert_eq!(Value::from(frame).kind(), ValueKind::Frame);
    }

    #[test]
    fn test_kind_tags_roundtrip() {
        for kind in [ValueKind::Scalar, ValueKind::NdArray, ValueKind::Series, ValueKind::Frame] {
            assert_eq!(ValueKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ValueKind::parse("json"), None);
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_string(&Value::from(7)).unwrap();
        assert_eq!(json, r#"{"kind":"scalar","value":7}"#);
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_i64(), Some(7));
    }
}
