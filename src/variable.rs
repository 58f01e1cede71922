//! The variable data engine: reassembly of records across VVR/CVVR segments
//! via the VXR tree, sparse-record synthesis, majority transpose, and the
//! write-side segmentation dual.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use std::io;

use tracing::{debug, warn};

use crate::compress;
use crate::decode::Decoder;
use crate::error::{CdfError, Result};
use crate::record::collection::get_record_vec;
use crate::record::cvvr::CompressedVariableValuesRecord;
use crate::record::vdr::{VariableDescriptorRecord, VariableKind};
use crate::record::vvr::VariableValuesRecord;
use crate::record::vxr::{VariableIndexRecord, VxrEntry};
use crate::record::{self, ParseRecord, RecordKind};
use crate::repr::Sparseness;
use crate::types::{CdfDataType, CdfInt8, CdfValues};

const MAX_VXR_DEPTH: usize = 32;

/// Metadata describing one variable, as returned by
/// [`Cdf::varinq`](crate::cdf::Cdf::varinq).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct VarInquiry {
    /// Variable name.
    pub name: String,
    /// Variable number, dense within its kind.
    pub num: i32,
    /// rVariable or zVariable.
    pub kind: VariableKind,
    /// Data type of the variable's values.
    pub data_type: CdfDataType,
    /// Character length for string variables, 1 otherwise.
    pub num_elements: i32,
    /// Dimension sizes.
    pub dim_sizes: Vec<i32>,
    /// Per-dimension variance.
    pub dim_varys: Vec<bool>,
    /// Whether records vary from one another.
    pub rec_vary: bool,
    /// Sparse-record policy.
    pub sparseness: Sparseness,
    /// GZIP level when the variable's segments are compressed.
    pub compression: Option<u32>,
    /// Records per data segment.
    pub blocking_factor: i32,
    /// Last written record number, -1 when none.
    pub last_rec: i64,
    /// The pad value, when the variable declares one.
    pub pad_value: Option<CdfValues>,
}

/// One variable read result, as returned by
/// [`Cdf::varget`](crate::cdf::Cdf::varget).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct VarData {
    /// Number of dimensions of one record (varying dimensions only).
    pub rec_ndim: usize,
    /// Shape of one record (varying dimensions only).
    pub rec_shape: Vec<i32>,
    /// Total records written to the variable.
    pub num_records: i64,
    /// Records in this result.
    pub records_returned: i64,
    /// Data type of the values.
    pub data_type: CdfDataType,
    /// The values, one record after another.
    pub data: CdfValues,
    /// Record numbers physically present in the file, within the returned
    /// range. Synthesized sparse records are not listed.
    pub real_records: Vec<i64>,
}

/// Collect the leaf entries of a variable's VXR tree in record order. Leaves
/// target VVRs or CVVRs; interior entries target child VXRs, to any depth.
pub(crate) fn collect_segments<R>(decoder: &mut Decoder<R>, head: i64) -> Result<Vec<VxrEntry>>
where
    R: io::Read + io::Seek,
{
    let mut leaves = Vec::new();
    walk_vxr_level(decoder, head, 0, &mut leaves)?;
    leaves.sort_by_key(|entry| entry.first);
    Ok(leaves)
}

fn walk_vxr_level<R>(
    decoder: &mut Decoder<R>,
    head: i64,
    depth: usize,
    leaves: &mut Vec<VxrEntry>,
) -> Result<()>
where
    R: io::Read + io::Seek,
{
    if depth >= MAX_VXR_DEPTH {
        return Err(CdfError::Malformed(format!(
            "variable index tree exceeds depth {MAX_VXR_DEPTH}"
        )));
    }
    let vxrs: Vec<VariableIndexRecord> = get_record_vec(decoder, CdfInt8::from(head))?;
    for vxr in vxrs {
        for entry in vxr.entries {
            match record::kind_at(decoder, u64::try_from(entry.offset)?)? {
                RecordKind::Vxr => walk_vxr_level(decoder, entry.offset, depth + 1, leaves)?,
                RecordKind::Vvr | RecordKind::Cvvr => leaves.push(entry),
                other => {
                    return Err(CdfError::Malformed(format!(
                        "variable index entry targets a {other:?} record"
                    )))
                }
            }
        }
    }
    Ok(())
}

/// Load and, if needed, inflate the data segment behind one leaf entry.
/// Raw segments may carry trailing slack; only the advertised records are
/// returned.
pub(crate) fn segment_bytes<R>(
    decoder: &mut Decoder<R>,
    entry: &VxrEntry,
    rec_len: usize,
) -> Result<Vec<u8>>
where
    R: io::Read + io::Seek,
{
    let offset = u64::try_from(entry.offset)?;
    let expected = usize::try_from(entry.last - entry.first + 1)? * rec_len;
    match record::kind_at(decoder, offset)? {
        RecordKind::Vvr => {
            let vvr = VariableValuesRecord::parse(decoder)?;
            if vvr.data.len() < expected {
                return Err(CdfError::Malformed(format!(
                    "data segment at {offset:#x} holds {} bytes, {expected} advertised",
                    vvr.data.len()
                )));
            }
            let mut data = vvr.data;
            data.truncate(expected);
            Ok(data)
        }
        RecordKind::Cvvr => {
            let cvvr = CompressedVariableValuesRecord::parse(decoder)?;
            compress::inflate(&cvvr.data, Some(expected), offset)
        }
        other => Err(CdfError::Malformed(format!(
            "expected a data segment at {offset:#x}, found {other:?}"
        ))),
    }
}

/// One pad record's bytes: the variable's pad value, or the type default,
/// repeated across the record's values.
pub(crate) fn pad_record_bytes(
    vdr: &VariableDescriptorRecord,
    endianness: crate::repr::Endian,
) -> Result<Vec<u8>> {
    let one_value = match &vdr.pad_value {
        Some(bytes) => bytes.clone(),
        None => {
            let elements = usize::try_from(*vdr.num_elements)?.max(1);
            vdr.data_type
                .default_pad(elements)
                .to_bytes(elements, endianness)?
        }
    };
    let mut record_bytes = Vec::with_capacity(one_value.len() * vdr.values_per_record());
    for _ in 0..vdr.values_per_record() {
        record_bytes.extend_from_slice(&one_value);
    }
    Ok(record_bytes)
}

/// Assemble the raw bytes of records `[first, last]` of a variable, gap
/// records synthesized per the sparse policy. Returns the bytes and the
/// physically-present record numbers.
pub(crate) fn read_records<R>(
    decoder: &mut Decoder<R>,
    vdr: &VariableDescriptorRecord,
    first: i64,
    last: i64,
) -> Result<(Vec<u8>, Vec<i64>)>
where
    R: io::Read + io::Seek,
{
    let rec_len = vdr.record_byte_len();
    let count = usize::try_from(last - first + 1)?;
    let endianness = decoder.context.endianness()?;

    let segments = match vdr.vxr_head {
        Some(head) => collect_segments(decoder, i64::from(head))?,
        None => Vec::new(),
    };
    let pad = pad_record_bytes(vdr, endianness)?;

    let mut out = Vec::with_capacity(count * rec_len);
    let mut real_records = Vec::new();

    // For previous-value fill, track the closest physical record at or
    // before the read cursor, including ones before the requested range.
    let mut prev: Option<Vec<u8>> = None;
    if vdr.sparseness == Sparseness::Previous {
        if let Some(entry) = segments.iter().take_while(|s| s.first < first).last() {
            let bytes = segment_bytes(decoder, entry, rec_len)?;
            let in_seg = usize::try_from(entry.last.min(first - 1) - entry.first)?;
            prev = Some(bytes[in_seg * rec_len..(in_seg + 1) * rec_len].to_vec());
        }
    }

    let mut seg_iter = segments.iter().peekable();
    let mut cached: Option<(VxrEntry, Vec<u8>)> = None;
    for rec in first..=last {
        // Advance past segments that end before this record.
        while seg_iter.peek().is_some_and(|s| s.last < rec) {
            seg_iter.next();
        }
        let holder = seg_iter.peek().filter(|s| s.first <= rec).copied();
        match holder {
            Some(entry) => {
                if cached.as_ref().map(|(e, _)| e) != Some(entry) {
                    cached = Some((*entry, segment_bytes(decoder, entry, rec_len)?));
                }
                let (_, bytes) = cached.as_ref().ok_or_else(|| {
                    CdfError::Malformed("segment cache emptied mid-read".to_string())
                })?;
                let in_seg = usize::try_from(rec - entry.first)?;
                let slice = &bytes[in_seg * rec_len..(in_seg + 1) * rec_len];
                out.extend_from_slice(slice);
                prev = Some(slice.to_vec());
                real_records.push(rec);
            }
            None => {
                if vdr.sparseness == Sparseness::None {
                    warn!(
                        "variable {} record {rec} is missing from a non-sparse variable; \
                         synthesizing its pad value",
                        vdr.name
                    );
                }
                match (&prev, vdr.sparseness) {
                    (Some(previous), Sparseness::Previous) => out.extend_from_slice(previous),
                    _ => out.extend_from_slice(&pad),
                }
            }
        }
    }

    Ok((out, real_records))
}

/// Reorder each record between row- and column-major across the varying
/// dimensions. `cell` is the byte width of one value. A no-op for records of
/// fewer than two dimensions; string transposes are handled by the caller as
/// no-ops.
pub(crate) fn transpose_records(
    data: &[u8],
    shape: &[usize],
    cell: usize,
    row_to_column: bool,
) -> Vec<u8> {
    if shape.len() < 2 {
        return data.to_vec();
    }
    let values: usize = shape.iter().product();
    let rec_len = values * cell;
    if rec_len == 0 {
        return data.to_vec();
    }
    let mut out = vec![0u8; data.len()];
    let mut index = vec![0usize; shape.len()];
    for record_idx in 0..data.len() / rec_len {
        let base = record_idx * rec_len;
        index.iter_mut().for_each(|i| *i = 0);
        for row_flat in 0..values {
            let mut col_flat = 0;
            let mut stride = 1;
            for (axis, size) in shape.iter().enumerate() {
                col_flat += index[axis] * stride;
                stride *= size;
            }
            let (src, dst) = if row_to_column {
                (row_flat, col_flat)
            } else {
                (col_flat, row_flat)
            };
            out[base + dst * cell..base + (dst + 1) * cell]
                .copy_from_slice(&data[base + src * cell..base + (src + 1) * cell]);
            // Row-major order: the last axis varies fastest.
            for axis in (0..shape.len()).rev() {
                index[axis] += 1;
                if index[axis] < shape[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }
    }
    out
}

/// One write-side data segment, covering records `[first, last]`.
#[derive(Debug)]
pub(crate) struct Segment {
    pub first: i64,
    pub last: i64,
    pub payload: SegmentPayload,
}

#[derive(Debug)]
pub(crate) enum SegmentPayload {
    /// An uncompressed VVR payload.
    Raw(Vec<u8>),
    /// A GZIP CVVR payload.
    Compressed(Vec<u8>),
}

impl Segment {
    /// Encoded size of the record this segment becomes.
    pub(crate) fn encoded_size(&self) -> i64 {
        match &self.payload {
            SegmentPayload::Raw(data) => 12 + data.len() as i64,
            SegmentPayload::Compressed(data) => 12 + 4 + 8 + data.len() as i64,
        }
    }
}

/// Chunk physical records into data segments: runs of consecutive record
/// numbers, split at the blocking factor, each GZIP-compressed when the
/// variable asks for it and compression actually wins.
///
/// `indices` are the absolute record numbers of the rows in `data`, sorted
/// and unique. Under a sparse policy, rows that equal the value the gap
/// machinery would synthesize anyway (the pad value, or the preceding kept
/// row) are coalesced into gaps instead of being stored.
pub(crate) fn build_segments(
    indices: &[i64],
    data: &[u8],
    rec_len: usize,
    sparseness: Sparseness,
    pad_record: &[u8],
    blocking_factor: usize,
    gzip: Option<u32>,
) -> Result<Vec<Segment>> {
    if rec_len == 0 || data.len() != indices.len() * rec_len {
        return Err(CdfError::OutOfRange(format!(
            "{} bytes of record data for {} records of {rec_len} bytes",
            data.len(),
            indices.len()
        )));
    }
    for pair in indices.windows(2) {
        if pair[1] <= pair[0] {
            return Err(CdfError::OutOfRange(
                "sparse record numbers must be sorted and unique".to_string(),
            ));
        }
    }
    if indices.first().is_some_and(|first| *first < 0) {
        return Err(CdfError::OutOfRange(
            "record numbers start at zero".to_string(),
        ));
    }

    // Coalesce rows the sparse policies can synthesize.
    let mut kept: Vec<(i64, &[u8])> = Vec::with_capacity(indices.len());
    for (slot, rec) in indices.iter().enumerate() {
        let row = &data[slot * rec_len..(slot + 1) * rec_len];
        let synthesized = match sparseness {
            Sparseness::None => false,
            Sparseness::Pad => row == pad_record,
            Sparseness::Previous => kept
                .last()
                .map_or(row == pad_record, |(_, previous)| row == *previous),
        };
        if !synthesized {
            kept.push((*rec, row));
        }
    }

    let block = blocking_factor.max(1);
    let mut segments = Vec::new();
    let mut run: Vec<(i64, &[u8])> = Vec::new();
    for (rec, row) in kept {
        let contiguous = run.last().is_none_or(|(last, _)| rec == last + 1);
        if !contiguous || run.len() == block {
            flush_run(&mut segments, &mut run, rec_len, gzip)?;
        }
        run.push((rec, row));
    }
    flush_run(&mut segments, &mut run, rec_len, gzip)?;
    Ok(segments)
}

fn flush_run(
    segments: &mut Vec<Segment>,
    run: &mut Vec<(i64, &[u8])>,
    rec_len: usize,
    gzip: Option<u32>,
) -> Result<()> {
    if run.is_empty() {
        return Ok(());
    }
    let first = run[0].0;
    let last = run[run.len() - 1].0;
    let mut raw = Vec::with_capacity(run.len() * rec_len);
    for (_, row) in run.iter() {
        raw.extend_from_slice(row);
    }
    run.clear();

    let payload = match gzip {
        Some(level) => {
            let compressed = compress::deflate(&raw, level)?;
            if compressed.len() < raw.len() {
                debug!(
                    "records [{first}, {last}]: {} bytes -> {} compressed",
                    raw.len(),
                    compressed.len()
                );
                SegmentPayload::Compressed(compressed)
            } else {
                debug!(
                    "records [{first}, {last}]: compression would grow {} bytes, keeping raw",
                    raw.len()
                );
                SegmentPayload::Raw(raw)
            }
        }
        None => SegmentPayload::Raw(raw),
    };
    segments.push(Segment {
        first,
        last,
        payload,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::Endian;

    #[test]
    fn transpose_round_trips() {
        // One record of shape [2, 3], i32 cells, row-major 0..6.
        let data: Vec<u8> = (0..6i32).flat_map(|v| v.to_be_bytes()).collect();
        let transposed = transpose_records(&data, &[2, 3], 4, true);
        let as_ints: Vec<i32> = transposed
            .chunks_exact(4)
            .map(|c| i32::from_be_bytes(c.try_into().unwrap()))
            .collect();
        // Column-major: first axis varies fastest.
        assert_eq!(as_ints, vec![0, 3, 1, 4, 2, 5]);
        let back = transpose_records(&transposed, &[2, 3], 4, false);
        assert_eq!(back, data);
    }

    #[test]
    fn one_dimensional_transpose_is_identity() {
        let data = vec![1u8, 2, 3, 4];
        assert_eq!(transpose_records(&data, &[4], 1, true), data);
    }

    #[test]
    fn segments_split_runs_and_blocks() -> Result<()> {
        let rec_len = 4;
        let indices = [0i64, 1, 2, 3, 10, 11];
        let data: Vec<u8> = (0..24u8).collect();
        let segments = build_segments(
            &indices,
            &data,
            rec_len,
            Sparseness::None,
            &[0; 4],
            3,
            None,
        )?;
        let ranges: Vec<(i64, i64)> = segments.iter().map(|s| (s.first, s.last)).collect();
        assert_eq!(ranges, vec![(0, 2), (3, 3), (10, 11)]);
        Ok(())
    }

    #[test]
    fn pad_equal_rows_coalesce_under_pad_sparseness() -> Result<()> {
        let pad = [0xEEu8; 2];
        let indices = [0i64, 1, 2];
        let mut data = vec![1, 2];
        data.extend_from_slice(&pad);
        data.extend_from_slice(&[3, 4]);
        let segments =
            build_segments(&indices, &data, 2, Sparseness::Pad, &pad, 100, None)?;
        let ranges: Vec<(i64, i64)> = segments.iter().map(|s| (s.first, s.last)).collect();
        assert_eq!(ranges, vec![(0, 0), (2, 2)]);
        Ok(())
    }

    #[test]
    fn repeated_rows_coalesce_under_previous_sparseness() -> Result<()> {
        let indices = [0i64, 1, 2];
        let data = vec![7u8, 7, 9];
        let segments = build_segments(
            &indices,
            &data,
            1,
            Sparseness::Previous,
            &[0],
            100,
            None,
        )?;
        let ranges: Vec<(i64, i64)> = segments.iter().map(|s| (s.first, s.last)).collect();
        assert_eq!(ranges, vec![(0, 0), (2, 2)]);
        Ok(())
    }

    #[test]
    fn compression_kept_only_when_smaller() -> Result<()> {
        let indices: Vec<i64> = (0..64).collect();
        let data = vec![0u8; 64 * 16];
        let segments = build_segments(
            &indices,
            &data,
            16,
            Sparseness::None,
            &[0; 16],
            1000,
            Some(6),
        )?;
        assert_eq!(segments.len(), 1);
        assert!(matches!(segments[0].payload, SegmentPayload::Compressed(_)));

        // Two bytes of incompressible data stay raw.
        let segments = build_segments(
            &[0],
            &[0xA5, 0x5A],
            2,
            Sparseness::None,
            &[0; 2],
            1000,
            Some(9),
        )?;
        assert!(matches!(segments[0].payload, SegmentPayload::Raw(_)));
        Ok(())
    }

    #[test]
    fn unsorted_sparse_indices_are_rejected() {
        let err = build_segments(&[3, 1], &[0u8; 4], 2, Sparseness::None, &[0; 2], 10, None);
        assert!(matches!(err, Err(CdfError::OutOfRange(_))));
    }

    #[test]
    fn default_pad_values_exist_for_every_type() -> Result<()> {
        for data_type in [
            CdfDataType::Int1,
            CdfDataType::Uint2,
            CdfDataType::Real8,
            CdfDataType::Epoch16,
            CdfDataType::TimeTt2000,
            CdfDataType::Char,
        ] {
            let pad = data_type.default_pad(4);
            let bytes = pad.to_bytes(4, Endian::Little)?;
            assert!(!bytes.is_empty());
        }
        Ok(())
    }
}
