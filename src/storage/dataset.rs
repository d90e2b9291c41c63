//! Self-describing binary array datasets
//!
//! ```text
//! offset  size      field
//! 0       4         magic "PSDS"
//! 4       1         dtype code
//! 5       1         ndim
//! 6       2         reserved (zero)
//! 8       8 * ndim  dims, u64 little-endian
//! ..      n * item  payload, row-major, little-endian
//! ```
//!
//! Slices are read with one seek per contiguous run of the last axis, so a
//! sub-region never materializes the full array. Payload bytes are the
//! in-memory element layout, which is why only little-endian hosts are
//! supported.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::value::{ArrayData, AxisSlice, DType, NdArray, SlicePlan};
use crate::{Error, Result};

#[cfg(target_endian = "big")]
compile_error!("binary datasets are stored little-endian; big-endian targets are not supported");

const MAGIC: &[u8; 4] = b"PSDS";

struct Header {
    dtype: DType,
    shape: Vec<usize>,
    payload_offset: u64,
}

/// Write `array` to `path` atomically (temp file + rename).
pub(crate) fn write(path: &Path, array: &NdArray) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Storage(format!("dataset path {} has no parent", path.display())))?;
    let tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| Error::Storage(format!("Failed to create dataset file: {e}")))?;
    let ndim = u8::try_from(array.shape().len())
        .map_err(|_| Error::Storage("arrays above 255 dimensions are not supported".into()))?;
    let dims: Vec<u64> = array.shape().iter().map(|&d| d as u64).collect();
    {
        let mut out = BufWriter::new(tmp.as_file());
        out.write_all(MAGIC)
            .and_then(|()| out.write_all(&[array.dtype().code(), ndim, 0, 0]))
            .and_then(|()| out.write_all(bytemuck::cast_slice::<u64, u8>(&dims)))
            .and_then(|()| out.write_all(&array.data().as_bytes()))
            .and_then(|()| out.flush())
            .map_err(|e| Error::Storage(format!("Failed to write dataset {}: {e}", path.display())))?;
    }
    tmp.persist(path)
        .map_err(|e| Error::Storage(format!("Failed to persist dataset: {e}")))?;
    Ok(())
}

fn read_header(reader: &mut impl Read, path: &Path) -> Result<Header> {
    let truncated =
        |e: std::io::Error| Error::Storage(format!("dataset {} is truncated: {e}", path.display()));
    let mut fixed = [0u8; 8];
    reader.read_exact(&mut fixed).map_err(truncated)?;
    if &fixed[..4] != MAGIC {
        return Err(Error::Storage("dataset has a bad magic number".to_string()));
    }
    let dtype = DType::from_code(fixed[4])?;
    let ndim = usize::from(fixed[5]);
    let mut dims = vec![0u8; 8 * ndim];
    reader.read_exact(&mut dims).map_err(truncated)?;
    let shape = bytemuck::pod_collect_to_vec::<u8, u64>(&dims)
        .into_iter()
        .map(|dim| {
            usize::try_from(dim)
                .map_err(|_| Error::Storage("dataset dimension overflows usize".to_string()))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Header {
        dtype,
        shape,
        payload_offset: 8 + 8 * ndim as u64,
    })
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| Error::Storage(format!("Failed to open dataset {}: {e}", path.display())))
}

/// Read a whole dataset.
pub(crate) fn read(path: &Path) -> Result<NdArray> {
    let mut reader = open(path)?;
    let header = read_header(&mut reader, path)?;
    let mut payload = Vec::new();
    reader.read_to_end(&mut payload).map_err(|e| {
        Error::Storage(format!("Failed to read dataset {}: {e}", path.display()))
    })?;
    let data = ArrayData::from_bytes(header.dtype, &payload)?;
    NdArray::new(header.shape, data).map_err(|e| Error::Storage(e.to_string()))
}

/// Read the sub-array selected by `index` without loading the rest.
pub(crate) fn read_slice(path: &Path, index: &[AxisSlice]) -> Result<NdArray> {
    let mut reader = open(path)?;
    let header = read_header(&mut reader, path)?;
    let plan = SlicePlan::resolve(&header.shape, index)?;
    let item = header.dtype.item_size();

    let mut payload = Vec::with_capacity(plan.output_len() * item);
    let mut chunk = Vec::new();
    for (offset, len) in plan.runs() {
        let byte_offset = header.payload_offset + (offset * item) as u64;
        chunk.resize(len * item, 0);
        reader
            .seek(SeekFrom::Start(byte_offset))
            .and_then(|_| reader.read_exact(&mut chunk))
            .map_err(|e| {
                Error::Storage(format!("dataset {} is truncated: {e}", path.display()))
            })?;
        payload.extend_from_slice(&chunk);
    }
    let data = ArrayData::from_bytes(header.dtype, &payload)?;
    NdArray::new(plan.output_shape(), data).map_err(|e| Error::Storage(e.to_string()))
}
