//! Labeled 1-D series and 2-D tables
//!
//! Index labels are arbitrary JSON scalars (strings or integers in practice).
//! Each column carries a single dtype so it survives a JSON round trip where
//! `10.0` and `10` would otherwise be indistinguishable.

use super::floats;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::ops::Range;

/// Typed column of a [`Series`] or [`Frame`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values", rename_all = "lowercase")]
pub enum Column {
    /// `bool`
    Bool(Vec<bool>),
    /// `int64`
    Int64(Vec<i64>),
    /// `float64`; non-finite values are stored as `"NaN"`, `"inf"` or `"-inf"`
    Float64(#[serde(with = "super::floats")] Vec<f64>),
    /// `object` (strings)
    Str(Vec<String>),
}

impl Column {
    /// Dtype string stored next to the JSON payload.
    #[must_use]
    pub const fn dtype(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int64(_) => "int64",
            Self::Float64(_) => "float64",
            Self::Str(_) => "object",
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Str(v) => v.len(),
        }
    }

    /// True when the column has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// JSON representation of row `i`.
    #[must_use]
    pub fn json_at(&self, i: usize) -> Json {
        match self {
            Self::Bool(v) => Json::from(v[i]),
            Self::Int64(v) => Json::from(v[i]),
            Self::Float64(v) => floats::to_json(v[i]),
            Self::Str(v) => Json::from(v[i].clone()),
        }
    }

    /// Rebuild a column from JSON cells, coercing to `dtype`.
    ///
    /// Without a dtype the column type is inferred from the cells.
    ///
    /// # Errors
    /// Returns `Error::Storage` if a cell cannot be represented in `dtype`
    pub fn from_json(cells: &[Json], dtype: Option<&str>) -> Result<Self> {
        let dtype = dtype.map_or_else(|| infer_dtype(cells), str::to_string);
        let bad = |cell: &Json| Error::Storage(format!("cannot restore {cell} as {dtype}"));
        match dtype.as_str() {
            "bool" => cells
                .iter()
                .map(|c| c.as_bool().ok_or_else(|| bad(c)))
                .collect::<Result<_>>()
                .map(Self::Bool),
            "int64" => cells
                .iter()
                .map(|c| {
                    c.as_i64()
                        .or_else(|| c.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                        .ok_or_else(|| bad(c))
                })
                .collect::<Result<_>>()
                .map(Self::Int64),
            "float64" => cells
                .iter()
                .map(|c| floats::from_json(c).ok_or_else(|| bad(c)))
                .collect::<Result<_>>()
                .map(Self::Float64),
            "object" => Ok(Self::Str(
                cells
                    .iter()
                    .map(|c| c.as_str().map_or_else(|| c.to_string(), str::to_string))
                    .collect(),
            )),
            other => Err(Error::Storage(format!("unsupported column dtype `{other}`"))),
        }
    }

    fn take(&self, rows: Range<usize>) -> Self {
        match self {
            Self::Bool(v) => Self::Bool(v[rows].to_vec()),
            Self::Int64(v) => Self::Int64(v[rows].to_vec()),
            Self::Float64(v) => Self::Float64(v[rows].to_vec()),
            Self::Str(v) => Self::Str(v[rows].to_vec()),
        }
    }
}

fn infer_dtype(cells: &[Json]) -> String {
    let dtype = if cells.iter().all(Json::is_boolean) {
        "bool"
    } else if cells.iter().all(|c| c.is_i64() || c.is_u64()) {
        "int64"
    } else if cells.iter().all(|c| c.is_number() || c.is_null()) {
        "float64"
    } else {
        "object"
    };
    dtype.to_string()
}

/// Labeled one-dimensional series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    name: Option<String>,
    index: Vec<Json>,
    data: Column,
}

impl Series {
    /// Create a series; `index` must have one label per row.
    ///
    /// # Errors
    /// Returns `Error::Configuration` on length mismatch
    pub fn new(name: Option<String>, index: Vec<Json>, data: Column) -> Result<Self> {
        if index.len() != data.len() {
            return Err(Error::Configuration(format!(
                "series index has {} labels for {} values",
                index.len(),
                data.len()
            )));
        }
        Ok(Self { name, index, data })
    }

    /// Series with a default `0..n` integer index.
    #[must_use]
    pub fn with_default_index(name: Option<String>, data: Column) -> Self {
        let index = (0..data.len()).map(Json::from).collect();
        Self { name, index, data }
    }

    /// Series name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Index labels.
    #[must_use]
    pub fn index(&self) -> &[Json] {
        &self.index
    }

    /// Values.
    #[must_use]
    pub const fn data(&self) -> &Column {
        &self.data
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Labeled two-dimensional table of named, typed columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    index: Vec<Json>,
    columns: Vec<(String, Column)>,
}

impl Frame {
    /// Create a frame with a default `0..n` integer index.
    ///
    /// # Errors
    /// Returns `Error::Configuration` if columns differ in length or names repeat
    pub fn new(columns: Vec<(String, Column)>) -> Result<Self> {
        let rows = columns.first().map_or(0, |(_, c)| c.len());
        let index = (0..rows).map(Json::from).collect();
        Self::with_index(index, columns)
    }

    /// Create a frame with explicit row labels.
    ///
    /// # Errors
    /// Returns `Error::Configuration` if lengths disagree or names repeat
    pub fn with_index(index: Vec<Json>, columns: Vec<(String, Column)>) -> Result<Self> {
        for (i, (name, col)) in columns.iter().enumerate() {
            if col.len() != index.len() {
                return Err(Error::Configuration(format!(
                    "column `{name}` has {} rows, index has {}",
                    col.len(),
                    index.len()
                )));
            }
            if columns[..i].iter().any(|(other, _)| other == name) {
                return Err(Error::Configuration(format!("duplicate column `{name}`")));
            }
        }
        Ok(Self { index, columns })
    }

    /// Row labels.
    #[must_use]
    pub fn index(&self) -> &[Json] {
        &self.index
    }

    /// Columns in order.
    #[must_use]
    pub fn columns(&self) -> &[(String, Column)] {
        &self.columns
    }

    /// Column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.index.len()
    }

    /// Positional row range and optional named column subset.
    ///
    /// `rows` is clamped to the frame length. Columns keep the requested order.
    ///
    /// # Errors
    /// Returns a lookup failure for unknown column names
    pub fn select(&self, rows: Range<usize>, cols: Option<&[&str]>) -> Result<Self> {
        let end = rows.end.min(self.num_rows());
        let start = rows.start.min(end);
        let rows = start..end;
        let picked: Vec<(String, Column)> = match cols {
            None => self
                .columns
                .iter()
                .map(|(n, c)| (n.clone(), c.take(rows.clone())))
                .collect(),
            Some(names) => names
                .iter()
                .map(|name| {
                    self.column(name)
                        .map(|c| ((*name).to_string(), c.take(rows.clone())))
                        .ok_or_else(|| Error::lookup("column", *name))
                })
                .collect::<Result<_>>()?,
        };
        Ok(Self {
            index: self.index[rows].to_vec(),
            columns: picked,
        })
    }
}
