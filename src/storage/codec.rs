//! Value codec: one encode and one decode per value kind
//!
//! | kind      | payload                                               |
//! |-----------|-------------------------------------------------------|
//! | `scalar`  | `value` = JSON text                                   |
//! | `ndarray` | binary dataset (`data.bin`), shape/dtype in its header |
//! | `series`  | `value` = split-oriented JSON, `dtype` = element dtype |
//! | `frame`   | `value` = split-oriented JSON, `dtypes` = JSON map     |

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};
use std::collections::BTreeMap;

use crate::trajectory::Snapshot;
use crate::value::{Column, Frame, NdArray, Series, Value, ValueKind};
use crate::{Error, Result};

/// Attributes of a parameter/result node (`attrs.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAttrs {
    /// Kind tag
    pub kind: String,
    /// JSON text payload (`scalar`, `series`, `frame`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Element dtype (`series`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<String>,
    /// JSON text of the column → dtype map (`frame`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtypes: Option<String>,
    /// Free-text comment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl NodeAttrs {
    /// Parsed kind tag.
    ///
    /// # Errors
    /// Returns `Error::Storage` for unknown tags
    pub fn kind(&self) -> Result<ValueKind> {
        ValueKind::parse(&self.kind)
            .ok_or_else(|| Error::Storage(format!("unknown node kind `{}`", self.kind)))
    }
}

/// Attributes of a run node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAttrs {
    /// JSON text of the parameter snapshot
    pub params: String,
    /// ISO-8601 UTC timestamp
    pub timestamp: String,
}

/// Encoded node: attributes plus the array to write as a dataset, if any.
pub(crate) struct Encoded<'v> {
    pub attrs: NodeAttrs,
    pub dataset: Option<&'v NdArray>,
}

/// Encode a value, classifying it once by kind.
pub(crate) fn encode<'a>(value: &'a Value, comment: Option<&'a str>) -> Result<Encoded<'a>> {
    let mut encoded = match value {
        Value::Scalar(v) => Encoded {
            attrs: encode_scalar(v)?,
            dataset: None,
        },
        Value::Array(a) => Encoded {
            attrs: NodeAttrs {
                kind: ValueKind::NdArray.as_str().to_string(),
                ..NodeAttrs::default()
            },
            dataset: Some(a),
        },
        Value::Series(s) => Encoded {
            attrs: encode_series(s)?,
            dataset: None,
        },
        Value::Frame(f) => Encoded {
            attrs: encode_frame(f)?,
            dataset: None,
        },
    };
    encoded.attrs.comment = comment.map(str::to_string);
    Ok(encoded)
}

/// Decode a non-array node. Arrays are read from their dataset by the caller.
pub(crate) fn decode(attrs: &NodeAttrs) -> Result<Value> {
    match attrs.kind()? {
        ValueKind::Scalar => decode_scalar(attrs),
        ValueKind::Series => decode_series(attrs).map(Value::Series),
        ValueKind::Frame => decode_frame(attrs).map(Value::Frame),
        ValueKind::NdArray => Err(Error::Storage(
            "ndarray nodes are decoded from their dataset".to_string(),
        )),
    }
}

fn encode_scalar(value: &Json) -> Result<NodeAttrs> {
    Ok(NodeAttrs {
        kind: ValueKind::Scalar.as_str().to_string(),
        value: Some(to_text(value)?),
        ..NodeAttrs::default()
    })
}

fn decode_scalar(attrs: &NodeAttrs) -> Result<Value> {
    let raw = payload(attrs)?;
    // text that is not valid JSON is kept as a plain string
    Ok(Value::Scalar(
        serde_json::from_str(raw).unwrap_or_else(|_| Json::String(raw.to_string())),
    ))
}

fn encode_series(series: &Series) -> Result<NodeAttrs> {
    let data: Vec<Json> = (0..series.len()).map(|i| series.data().json_at(i)).collect();
    let split = json!({
        "name": series.name(),
        "index": series.index(),
        "data": data,
    });
    Ok(NodeAttrs {
        kind: ValueKind::Series.as_str().to_string(),
        value: Some(to_text(&split)?),
        dtype: Some(series.data().dtype().to_string()),
        ..NodeAttrs::default()
    })
}

fn decode_series(attrs: &NodeAttrs) -> Result<Series> {
    let split: Json = from_text(payload(attrs)?, "series payload")?;
    let name = split
        .get("name")
        .and_then(Json::as_str)
        .map(str::to_string);
    let index = array_field(&split, "index")?.to_vec();
    let data = Column::from_json(array_field(&split, "data")?, attrs.dtype.as_deref())?;
    Series::new(name, index, data).map_err(|e| Error::Storage(e.to_string()))
}

fn encode_frame(frame: &Frame) -> Result<NodeAttrs> {
    let names: Vec<&str> = frame.columns().iter().map(|(n, _)| n.as_str()).collect();
    let rows: Vec<Vec<Json>> = (0..frame.num_rows())
        .map(|r| frame.columns().iter().map(|(_, c)| c.json_at(r)).collect())
        .collect();
    let split = json!({
        "columns": names,
        "index": frame.index(),
        "data": rows,
    });
    let dtypes: Map<String, Json> = frame
        .columns()
        .iter()
        .map(|(n, c)| (n.clone(), Json::from(c.dtype())))
        .collect();
    Ok(NodeAttrs {
        kind: ValueKind::Frame.as_str().to_string(),
        value: Some(to_text(&split)?),
        dtypes: Some(to_text(&dtypes)?),
        ..NodeAttrs::default()
    })
}

fn decode_frame(attrs: &NodeAttrs) -> Result<Frame> {
    let split: Json = from_text(payload(attrs)?, "frame payload")?;
    let dtypes: BTreeMap<String, String> = match attrs.dtypes.as_deref() {
        Some(text) => from_text(text, "frame dtypes")?,
        None => BTreeMap::new(),
    };
    let index = array_field(&split, "index")?.to_vec();
    let rows = array_field(&split, "data")?;
    let mut columns = Vec::new();
    for (j, name) in array_field(&split, "columns")?.iter().enumerate() {
        let name = name
            .as_str()
            .map_or_else(|| name.to_string(), str::to_string);
        let cells: Vec<Json> = rows
            .iter()
            .map(|row| row.get(j).cloned().unwrap_or(Json::Null))
            .collect();
        let column = Column::from_json(&cells, dtypes.get(&name).map(String::as_str))?;
        columns.push((name, column));
    }
    Frame::with_index(index, columns).map_err(|e| Error::Storage(e.to_string()))
}

/// Serialize a parameter snapshot for a run node.
pub(crate) fn encode_snapshot(params: &Snapshot) -> Result<String> {
    to_text(params)
}

/// Inverse of [`encode_snapshot`].
pub(crate) fn decode_snapshot(text: &str) -> Result<Snapshot> {
    from_text(text, "run parameters")
}

fn to_text<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::Storage(format!("Failed to encode node: {e}")))
}

fn from_text<T: DeserializeOwned>(text: &str, what: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| Error::Storage(format!("Malformed {what}: {e}")))
}

fn payload(attrs: &NodeAttrs) -> Result<&str> {
    attrs
        .value
        .as_deref()
        .ok_or_else(|| Error::Storage(format!("{} node has no value attribute", attrs.kind)))
}

fn array_field<'j>(split: &'j Json, field: &str) -> Result<&'j [Json]> {
    split
        .get(field)
        .and_then(Json::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| Error::Storage(format!("tabular payload is missing `{field}`")))
}
