//! Homogeneous numeric n-dimensional arrays
//!
//! Row-major (C order) storage with an explicit shape. Slicing resolves an
//! `AxisSlice` per dimension into a `SlicePlan`, which is shared by the
//! in-memory path here and the seek-based dataset reader in storage so both
//! produce identical sub-arrays.

use std::borrow::Cow;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Element type of an [`NdArray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// `bool`, one byte per element
    Bool,
    /// `i32`
    Int32,
    /// `i64`
    Int64,
    /// `f32`
    Float32,
    /// `f64`
    Float64,
}

impl DType {
    /// Stable dtype name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    /// Parse a dtype name.
    ///
    /// # Errors
    /// Returns `Error::Storage` for unknown names
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "bool" => Ok(Self::Bool),
            "int32" => Ok(Self::Int32),
            "int64" => Ok(Self::Int64),
            "float32" => Ok(Self::Float32),
            "float64" => Ok(Self::Float64),
            other => Err(Error::Storage(format!("unknown array dtype `{other}`"))),
        }
    }

    /// Size of one element in bytes.
    #[must_use]
    pub const fn item_size(self) -> usize {
        match self {
            Self::Bool => 1,
            Self::Int32 | Self::Float32 => 4,
            Self::Int64 | Self::Float64 => 8,
        }
    }

    /// Numeric code used in the binary dataset header.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Bool => 0,
            Self::Int32 => 1,
            Self::Int64 => 2,
            Self::Float32 => 3,
            Self::Float64 => 4,
        }
    }

    /// Inverse of [`DType::code`].
    ///
    /// # Errors
    /// Returns `Error::Storage` for unknown codes
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::Bool),
            1 => Ok(Self::Int32),
            2 => Ok(Self::Int64),
            3 => Ok(Self::Float32),
            4 => Ok(Self::Float64),
            other => Err(Error::Storage(format!("unknown dtype code {other}"))),
        }
    }
}

/// Flat element buffer of an [`NdArray`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values", rename_all = "lowercase")]
pub enum ArrayData {
    /// Booleans
    Bool(Vec<bool>),
    /// 32-bit integers
    Int32(Vec<i32>),
    /// 64-bit integers
    Int64(Vec<i64>),
    /// 32-bit floats
    Float32(#[serde(with = "crate::value::floats")] Vec<f32>),
    /// 64-bit floats
    Float64(#[serde(with = "crate::value::floats")] Vec<f64>),
}

macro_rules! with_data {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ArrayData::Bool($v) => $body,
            ArrayData::Int32($v) => $body,
            ArrayData::Int64($v) => $body,
            ArrayData::Float32($v) => $body,
            ArrayData::Float64($v) => $body,
        }
    };
}

impl ArrayData {
    /// Element type.
    #[must_use]
    pub const fn dtype(&self) -> DType {
        match self {
            Self::Bool(_) => DType::Bool,
            Self::Int32(_) => DType::Int32,
            Self::Int64(_) => DType::Int64,
            Self::Float32(_) => DType::Float32,
            Self::Float64(_) => DType::Float64,
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        with_data!(self, v => v.len())
    }

    /// True when there are no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element bytes in dataset order (little-endian).
    ///
    /// Numeric buffers are borrowed as-is; booleans take one byte each.
    #[must_use]
    pub fn as_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            Self::Bool(v) => Cow::Owned(v.iter().map(|b| u8::from(*b)).collect()),
            Self::Int32(v) => Cow::Borrowed(bytemuck::cast_slice(v.as_slice())),
            Self::Int64(v) => Cow::Borrowed(bytemuck::cast_slice(v.as_slice())),
            Self::Float32(v) => Cow::Borrowed(bytemuck::cast_slice(v.as_slice())),
            Self::Float64(v) => Cow::Borrowed(bytemuck::cast_slice(v.as_slice())),
        }
    }

    /// Decode element bytes of the given dtype.
    ///
    /// # Errors
    /// Returns `Error::Storage` if the byte count is not a multiple of the item size
    pub fn from_bytes(dtype: DType, bytes: &[u8]) -> Result<Self> {
        let size = dtype.item_size();
        if bytes.len() % size != 0 {
            return Err(Error::Storage(format!(
                "dataset payload of {} bytes is not a multiple of {size}",
                bytes.len()
            )));
        }
        Ok(match dtype {
            DType::Bool => Self::Bool(bytes.iter().map(|b| *b != 0).collect()),
            DType::Int32 => Self::Int32(bytemuck::pod_collect_to_vec(bytes)),
            DType::Int64 => Self::Int64(bytemuck::pod_collect_to_vec(bytes)),
            DType::Float32 => Self::Float32(bytemuck::pod_collect_to_vec(bytes)),
            DType::Float64 => Self::Float64(bytemuck::pod_collect_to_vec(bytes)),
        })
    }

    /// Gather elements at the given flat positions.
    fn gather(&self, positions: &[usize]) -> Self {
        match self {
            Self::Bool(v) => Self::Bool(positions.iter().map(|&i| v[i]).collect()),
            Self::Int32(v) => Self::Int32(positions.iter().map(|&i| v[i]).collect()),
            Self::Int64(v) => Self::Int64(positions.iter().map(|&i| v[i]).collect()),
            Self::Float32(v) => Self::Float32(positions.iter().map(|&i| v[i]).collect()),
            Self::Float64(v) => Self::Float64(positions.iter().map(|&i| v[i]).collect()),
        }
    }
}

/// Index applied to one axis when slicing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisSlice {
    /// Keep the whole axis
    Full,
    /// Select a single position and drop the axis
    Index(usize),
    /// Half-open range `start..end`
    Range {
        /// First position
        start: usize,
        /// One past the last position
        end: usize,
    },
}

impl From<std::ops::Range<usize>> for AxisSlice {
    fn from(r: std::ops::Range<usize>) -> Self {
        Self::Range {
            start: r.start,
            end: r.end,
        }
    }
}

impl From<usize> for AxisSlice {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

/// Resolved slice over a concrete shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlicePlan {
    /// `(start, len, keep_axis)` per source axis
    axes: Vec<(usize, usize, bool)>,
    /// Row-major strides of the source array, in elements
    strides: Vec<usize>,
}

impl SlicePlan {
    /// Resolve `index` against `shape`. Missing trailing axes are `Full`.
    ///
    /// # Errors
    /// Returns `Error::Configuration` for too many axes or out-of-bounds indices
    pub fn resolve(shape: &[usize], index: &[AxisSlice]) -> Result<Self> {
        if index.len() > shape.len() {
            return Err(Error::Configuration(format!(
                "slice has {} axes but array has {}",
                index.len(),
                shape.len()
            )));
        }
        let mut axes = Vec::with_capacity(shape.len());
        for (axis, &dim) in shape.iter().enumerate() {
            let entry = match index.get(axis).copied().unwrap_or(AxisSlice::Full) {
                AxisSlice::Full => (0, dim, true),
                AxisSlice::Index(i) => {
                    if i >= dim {
                        return Err(Error::Configuration(format!(
                            "index {i} out of bounds for axis {axis} with size {dim}"
                        )));
                    }
                    (i, 1, false)
                }
                AxisSlice::Range { start, end } => {
                    if start > end || end > dim {
                        return Err(Error::Configuration(format!(
                            "range {start}..{end} out of bounds for axis {axis} with size {dim}"
                        )));
                    }
                    (start, end - start, true)
                }
            };
            axes.push(entry);
        }
        let mut strides = vec![1usize; shape.len()];
        for axis in (0..shape.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * shape[axis + 1];
        }
        Ok(Self { axes, strides })
    }

    /// Shape of the resulting sub-array.
    #[must_use]
    pub fn output_shape(&self) -> Vec<usize> {
        self.axes
            .iter()
            .filter(|(_, _, keep)| *keep)
            .map(|(_, len, _)| *len)
            .collect()
    }

    /// Number of elements selected.
    #[must_use]
    pub fn output_len(&self) -> usize {
        self.axes.iter().map(|(_, len, _)| *len).product()
    }

    /// Contiguous runs `(flat_offset, len)` in row-major output order.
    ///
    /// Each run covers the selected span of the last axis for one position of
    /// the outer axes, so a reader can fetch it with a single seek.
    #[must_use]
    pub fn runs(&self) -> Vec<(usize, usize)> {
        if self.axes.is_empty() {
            return vec![(0, 1)];
        }
        if self.output_len() == 0 {
            return Vec::new();
        }
        let last = self.axes.len() - 1;
        let (last_start, last_len, _) = self.axes[last];
        let outer = &self.axes[..last];
        let mut counters = vec![0usize; outer.len()];
        let mut runs = Vec::new();
        loop {
            let base: usize = outer
                .iter()
                .zip(&counters)
                .zip(&self.strides)
                .map(|(((start, _, _), c), stride)| (start + c) * stride)
                .sum();
            runs.push((base + last_start, last_len));

            // odometer increment, last outer axis fastest
            let mut axis = outer.len();
            loop {
                if axis == 0 {
                    return runs;
                }
                axis -= 1;
                counters[axis] += 1;
                if counters[axis] < outer[axis].1 {
                    break;
                }
                counters[axis] = 0;
            }
        }
    }
}

/// Row-major n-dimensional numeric array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NdArray {
    shape: Vec<usize>,
    data: ArrayData,
}

impl NdArray {
    /// Create an array, validating that the shape matches the element count.
    ///
    /// # Errors
    /// Returns `Error::Configuration` if `product(shape) != data.len()`
    pub fn new(shape: Vec<usize>, data: ArrayData) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(Error::Configuration(format!(
                "shape {shape:?} needs {expected} elements, got {}",
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// One-dimensional `f64` array.
    #[must_use]
    pub fn from_f64(values: Vec<f64>) -> Self {
        Self {
            shape: vec![values.len()],
            data: ArrayData::Float64(values),
        }
    }

    /// One-dimensional `i64` array.
    #[must_use]
    pub fn from_i64(values: Vec<i64>) -> Self {
        Self {
            shape: vec![values.len()],
            data: ArrayData::Int64(values),
        }
    }

    /// `0..n` as `i64` reshaped to `shape` (like `arange(n).reshape(shape)`).
    ///
    /// # Errors
    /// Returns `Error::Configuration` if the shape is empty-product mismatched
    pub fn arange(shape: Vec<usize>) -> Result<Self> {
        let n: usize = shape.iter().product();
        let values = (0..n)
            .map(|i| i64::try_from(i).map_err(|e| Error::Configuration(e.to_string())))
            .collect::<Result<Vec<_>>>()?;
        Self::new(shape, ArrayData::Int64(values))
    }

    /// Array shape.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Element type.
    #[must_use]
    pub const fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Flat element buffer.
    #[must_use]
    pub const fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the array holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sub-array selected by `index`.
    ///
    /// # Errors
    /// Returns `Error::Configuration` if the index does not fit the shape
    pub fn slice(&self, index: &[AxisSlice]) -> Result<Self> {
        let plan = SlicePlan::resolve(&self.shape, index)?;
        let positions: Vec<usize> = plan
            .runs()
            .into_iter()
            .flat_map(|(offset, len)| offset..offset + len)
            .collect();
        Self::new(plan.output_shape(), self.data.gather(&positions))
    }
}
