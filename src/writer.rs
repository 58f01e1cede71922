//! The write-side orchestrator: collects variables and attributes, then lays
//! out and emits the whole record graph at close.
//!
//! Emission is a single forward pass. All record sizes are computable before
//! any byte is written, so a layout pass assigns every offset first and the
//! emit pass writes each chain link directly; nothing is patched after the
//! fact. The file only reaches disk in `close`.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::attribute::{AttrScope, AttrValue};
use crate::cdf::{MAGIC_COMPRESSED, MAGIC_UNCOMPRESSED, MAGIC_V3};
use crate::checksum;
use crate::compress;
use crate::encode::Encoder;
use crate::epoch::leapsec;
use crate::error::{CdfError, Result};
use crate::record::adr::AttributeDescriptorRecord;
use crate::record::aedr::{AttributeEntryDescriptorRecord, EntryKind};
use crate::record::ccr::CompressedCdfRecord;
use crate::record::cdr::{CdfDescriptorRecord, CdrFlags};
use crate::record::cpr::CompressedParametersRecord;
use crate::record::cvvr::CompressedVariableValuesRecord;
use crate::record::gdr::GlobalDescriptorRecord;
use crate::record::vdr::{VariableDescriptorRecord, VariableKind, VdrFlags};
use crate::record::vvr::VariableValuesRecord;
use crate::record::vxr::{VariableIndexRecord, VxrEntry, VXR_ENTRIES, VXR_LEVEL_ENTRIES};
use crate::repr::{CdfEncoding, CdfVersion, Endian, Majority, Sparseness};
use crate::types::{CdfDataType, CdfInt4, CdfInt8, CdfString, CdfValues};
use crate::variable::{self, Segment, SegmentPayload};

const WRITER_VERSION: CdfVersion = CdfVersion {
    major: 3,
    minor: 8,
    patch: 1,
};

const COPYRIGHT: &str = "\nCommon Data Format (CDF)\nhttps://cdf.gsfc.nasa.gov\nSpace Physics Data Facility\nNASA/Goddard Space Flight Center\n";

/// Records per segment when a variable does not pick a blocking factor,
/// sized so a segment stays around 64 KiB.
const DEFAULT_SEGMENT_BYTES: usize = 65_536;

/// File-wide options for a CDF being created.
#[derive(Debug, Clone)]
pub struct CdfSpec {
    /// Storage order of multi-dimensional records.
    pub majority: Majority,
    /// Data encoding; defaults to the host's.
    pub encoding: CdfEncoding,
    /// Whether to append the MD5 trailer.
    pub checksum: bool,
    /// GZIP level for file-level compression of everything after the CDR.
    pub compression: Option<u32>,
    /// Dimension sizes shared by every rVariable.
    pub r_dim_sizes: Vec<i32>,
    /// Whether a pre-existing file at the path is truncated. Creation fails
    /// otherwise.
    pub delete: bool,
}

impl Default for CdfSpec {
    fn default() -> Self {
        CdfSpec {
            majority: Majority::Row,
            encoding: CdfEncoding::host(),
            checksum: false,
            compression: None,
            r_dim_sizes: Vec::new(),
            delete: false,
        }
    }
}

/// Specification of one variable to write.
#[derive(Debug, Clone)]
pub struct VarSpec {
    /// Variable name, unique within its kind.
    pub name: String,
    /// rVariable or zVariable.
    pub kind: VariableKind,
    /// Data type of the variable's values.
    pub data_type: CdfDataType,
    /// Character length for string variables; must be 1 otherwise.
    pub num_elements: i32,
    /// Dimension sizes. rVariables leave this empty and inherit the
    /// file-wide sizes.
    pub dim_sizes: Vec<i32>,
    /// Per-dimension variance; empty means every dimension varies.
    pub dim_varys: Vec<bool>,
    /// Whether records vary from one another.
    pub rec_vary: bool,
    /// Sparse-record policy.
    pub sparseness: Sparseness,
    /// GZIP level for this variable's data segments.
    pub compression: Option<u32>,
    /// Records per data segment; 0 picks a default.
    pub blocking_factor: i32,
    /// Pad value, one value's worth; the type default when absent.
    pub pad_value: Option<CdfValues>,
}

impl Default for VarSpec {
    fn default() -> Self {
        VarSpec {
            name: String::new(),
            kind: VariableKind::Z,
            data_type: CdfDataType::Real8,
            num_elements: 1,
            dim_sizes: Vec::new(),
            dim_varys: Vec::new(),
            rec_vary: true,
            sparseness: Sparseness::None,
            compression: None,
            blocking_factor: 0,
            pad_value: None,
        }
    }
}

/// Record data handed to [`CdfWriter::write_var`].
#[derive(Debug, Clone)]
pub enum VarRecords {
    /// Records 0..n, packed one after another.
    Full(CdfValues),
    /// Sparse records: the sorted physical record numbers and their values.
    Sparse {
        /// Absolute record numbers, sorted and unique.
        records: Vec<i64>,
        /// One record's values per listed number.
        values: CdfValues,
    },
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum WriterState {
    Open,
    Dirty,
    Closed,
    Poisoned,
}

struct PendingVariable {
    spec: VarSpec,
    num: i32,
    last_rec: i64,
    pad_bytes: Vec<u8>,
    segments: Vec<Segment>,
}

struct AttrBlock {
    name: String,
    scope: AttrScope,
    gr: Vec<(i64, AttrValue)>,
    z: Vec<(i64, AttrValue)>,
}

/// Writes a new CDF file. Variables and attributes accumulate in memory;
/// `close` lays out the record graph, optionally wraps it in a file-level
/// CCR, appends the MD5 trailer, and flushes once.
pub struct CdfWriter {
    path: PathBuf,
    spec: CdfSpec,
    endianness: Endian,
    state: WriterState,
    global_attrs: Vec<(String, Vec<(i64, AttrValue)>)>,
    var_attrs: Vec<(String, Vec<(String, AttrValue)>)>,
    vars: Vec<PendingVariable>,
    uses_tt2000: bool,
}

impl CdfWriter {
    /// Create a writer for `path`. The file is not touched until `close`,
    /// except that a pre-existing file fails creation unless `spec.delete`
    /// asks for truncation.
    pub fn create(path: impl AsRef<Path>, spec: CdfSpec) -> Result<CdfWriter> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            if spec.delete {
                fs::remove_file(&path)?;
            } else {
                return Err(CdfError::Io(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} exists and delete was not requested", path.display()),
                )));
            }
        }
        let endianness = spec.encoding.endianness()?;
        Ok(CdfWriter {
            path,
            spec,
            endianness,
            state: WriterState::Open,
            global_attrs: Vec::new(),
            var_attrs: Vec::new(),
            vars: Vec::new(),
            uses_tt2000: false,
        })
    }

    /// Write global attributes: attribute name to entries keyed by entry
    /// number. Repeated names merge their entries.
    pub fn write_globalattrs(
        &mut self,
        attrs: &BTreeMap<String, BTreeMap<i64, CdfValues>>,
    ) -> Result<()> {
        self.mutate(|writer| {
            for (name, entries) in attrs {
                if writer.var_attrs.iter().any(|(n, _)| n == name) {
                    return Err(CdfError::OutOfRange(format!(
                        "attribute {name} already written with variable scope"
                    )));
                }
                let slot = match writer.global_attrs.iter().position(|(n, _)| n == name) {
                    Some(found) => found,
                    None => {
                        writer.global_attrs.push((name.clone(), Vec::new()));
                        writer.global_attrs.len() - 1
                    }
                };
                for (entry_num, values) in entries {
                    if *entry_num < 0 {
                        return Err(CdfError::OutOfRange(format!(
                            "entry number {entry_num} of attribute {name}"
                        )));
                    }
                    if values.data_type() == CdfDataType::TimeTt2000 {
                        writer.uses_tt2000 = true;
                    }
                    let value = AttrValue::from_values(values, writer.endianness)?;
                    writer.global_attrs[slot].push_entry(*entry_num, value);
                }
            }
            Ok(())
        })
    }

    /// Write variable attributes: attribute name to values keyed by
    /// variable name. Variables are resolved at close, so attributes may be
    /// written before their variables.
    pub fn write_variableattrs(
        &mut self,
        attrs: &BTreeMap<String, BTreeMap<String, CdfValues>>,
    ) -> Result<()> {
        self.mutate(|writer| {
            for (name, entries) in attrs {
                if writer.global_attrs.iter().any(|(n, _)| n == name) {
                    return Err(CdfError::OutOfRange(format!(
                        "attribute {name} already written with global scope"
                    )));
                }
                let slot = match writer.var_attrs.iter().position(|(n, _)| n == name) {
                    Some(found) => found,
                    None => {
                        writer.var_attrs.push((name.clone(), Vec::new()));
                        writer.var_attrs.len() - 1
                    }
                };
                for (var_name, values) in entries {
                    if values.data_type() == CdfDataType::TimeTt2000 {
                        writer.uses_tt2000 = true;
                    }
                    let value = AttrValue::from_values(values, writer.endianness)?;
                    writer.var_attrs[slot].1.push((var_name.clone(), value));
                }
            }
            Ok(())
        })
    }

    /// Write one variable: its specification, its variable-scope attributes,
    /// and optionally its records.
    pub fn write_var(
        &mut self,
        spec: VarSpec,
        attrs: &BTreeMap<String, CdfValues>,
        data: Option<VarRecords>,
    ) -> Result<()> {
        self.mutate(|writer| {
            let spec = writer.validate_spec(spec)?;
            let num = writer
                .vars
                .iter()
                .filter(|v| v.spec.kind == spec.kind)
                .count() as i32;

            let elements = usize::try_from(spec.num_elements)?.max(1);
            let values_per_record = record_values(&spec, &writer.spec);
            let rec_len = values_per_record * elements * spec.data_type.element_size();

            let pad_one = match &spec.pad_value {
                Some(values) => {
                    if !values.matches(spec.data_type) || values.len() != 1 {
                        return Err(CdfError::OutOfRange(format!(
                            "pad value of variable {} must be one {:?} value",
                            spec.name, spec.data_type
                        )));
                    }
                    values.to_bytes(elements, writer.endianness)?
                }
                None => spec
                    .data_type
                    .default_pad(elements)
                    .to_bytes(elements, writer.endianness)?,
            };
            let mut pad_record = Vec::with_capacity(rec_len);
            for _ in 0..values_per_record {
                pad_record.extend_from_slice(&pad_one);
            }

            let (indices, bytes) = match data {
                None => (Vec::new(), Vec::new()),
                Some(VarRecords::Full(values)) => {
                    let rows = writer.row_count(&spec, &values, values_per_record)?;
                    let bytes = values.to_bytes(elements, writer.endianness)?;
                    ((0..rows as i64).collect(), bytes)
                }
                Some(VarRecords::Sparse { records, values }) => {
                    if spec.sparseness == Sparseness::None {
                        return Err(CdfError::OutOfRange(format!(
                            "sparse records for variable {}, which is not sparse",
                            spec.name
                        )));
                    }
                    let rows = writer.row_count(&spec, &values, values_per_record)?;
                    if rows != records.len() {
                        return Err(CdfError::OutOfRange(format!(
                            "{} record numbers for {rows} records of data",
                            records.len()
                        )));
                    }
                    let bytes = values.to_bytes(elements, writer.endianness)?;
                    (records, bytes)
                }
            };

            let blocking = if spec.blocking_factor > 0 {
                spec.blocking_factor as usize
            } else {
                (DEFAULT_SEGMENT_BYTES / rec_len.max(1)).max(1)
            };
            let segments = variable::build_segments(
                &indices,
                &bytes,
                rec_len,
                spec.sparseness,
                &pad_record,
                blocking,
                spec.compression,
            )?;
            let last_rec = indices.last().copied().unwrap_or(-1);

            if spec.data_type == CdfDataType::TimeTt2000 {
                writer.uses_tt2000 = true;
            }
            for (attr_name, values) in attrs {
                if writer.global_attrs.iter().any(|(n, _)| n == attr_name) {
                    return Err(CdfError::OutOfRange(format!(
                        "attribute {attr_name} already written with global scope"
                    )));
                }
                let value = AttrValue::from_values(values, writer.endianness)?;
                let slot = match writer.var_attrs.iter().position(|(n, _)| n == attr_name) {
                    Some(found) => found,
                    None => {
                        writer.var_attrs.push((attr_name.clone(), Vec::new()));
                        writer.var_attrs.len() - 1
                    }
                };
                writer.var_attrs[slot].1.push((spec.name.clone(), value));
            }

            debug!(
                "variable {}: {} records in {} segments",
                spec.name,
                last_rec + 1,
                segments.len()
            );
            writer.vars.push(PendingVariable {
                spec,
                num,
                last_rec,
                pad_bytes: pad_one,
                segments,
            });
            Ok(())
        })
    }

    /// Finalize the file and flush it to disk. Idempotent; a poisoned writer
    /// aborts without flushing.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            WriterState::Closed => return Ok(()),
            WriterState::Poisoned => {
                warn!(
                    "writer for {} was poisoned; closing without writing",
                    self.path.display()
                );
                self.state = WriterState::Closed;
                return Ok(());
            }
            WriterState::Open | WriterState::Dirty => {}
        }
        match self.emit_file() {
            Ok(()) => {
                self.state = WriterState::Closed;
                Ok(())
            }
            Err(error) => {
                self.state = WriterState::Poisoned;
                Err(error)
            }
        }
    }

    /// Run one mutation under the writer state machine: legal only while
    /// Open or Dirty, and any failure poisons the writer.
    fn mutate(&mut self, operation: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        match self.state {
            WriterState::Closed => return Err(CdfError::Closed),
            WriterState::Poisoned => return Err(CdfError::Poisoned),
            WriterState::Open | WriterState::Dirty => {}
        }
        self.state = WriterState::Dirty;
        let outcome = operation(self);
        if outcome.is_err() {
            self.state = WriterState::Poisoned;
        }
        outcome
    }

    fn validate_spec(&self, mut spec: VarSpec) -> Result<VarSpec> {
        if spec.name.is_empty() {
            return Err(CdfError::OutOfRange("variable name is empty".to_string()));
        }
        if self
            .vars
            .iter()
            .any(|v| v.spec.kind == spec.kind && v.spec.name == spec.name)
        {
            return Err(CdfError::OutOfRange(format!(
                "variable {} already written",
                spec.name
            )));
        }
        if spec.data_type.is_string() {
            if spec.num_elements < 1 {
                return Err(CdfError::OutOfRange(format!(
                    "string variable {} needs a positive character length",
                    spec.name
                )));
            }
        } else if spec.num_elements != 1 {
            return Err(CdfError::OutOfRange(format!(
                "variable {}: non-string variables carry one element per value",
                spec.name
            )));
        }
        if spec.kind == VariableKind::R {
            if !spec.dim_sizes.is_empty() && spec.dim_sizes != self.spec.r_dim_sizes {
                return Err(CdfError::OutOfRange(format!(
                    "rVariable {} dimensions differ from the file's",
                    spec.name
                )));
            }
            spec.dim_sizes = self.spec.r_dim_sizes.clone();
        }
        if spec.dim_varys.is_empty() {
            spec.dim_varys = vec![true; spec.dim_sizes.len()];
        }
        if spec.dim_varys.len() != spec.dim_sizes.len() {
            return Err(CdfError::OutOfRange(format!(
                "variable {}: {} dimension variances for {} dimensions",
                spec.name,
                spec.dim_varys.len(),
                spec.dim_sizes.len()
            )));
        }
        if spec.dim_sizes.iter().any(|s| *s < 1) {
            return Err(CdfError::OutOfRange(format!(
                "variable {}: dimension sizes must be positive",
                spec.name
            )));
        }
        Ok(spec)
    }

    fn row_count(
        &self,
        spec: &VarSpec,
        values: &CdfValues,
        values_per_record: usize,
    ) -> Result<usize> {
        if !values.matches(spec.data_type) {
            return Err(CdfError::OutOfRange(format!(
                "variable {}: {:?} data for a {:?} variable",
                spec.name,
                values.data_type(),
                spec.data_type
            )));
        }
        if values.len() % values_per_record != 0 {
            return Err(CdfError::OutOfRange(format!(
                "variable {}: {} values do not fill whole records of {values_per_record}",
                spec.name,
                values.len()
            )));
        }
        let rows = values.len() / values_per_record;
        if !spec.rec_vary && rows > 1 {
            return Err(CdfError::OutOfRange(format!(
                "variable {} does not vary by record but {rows} records were supplied",
                spec.name
            )));
        }
        Ok(rows)
    }

    /// Lay out and emit the whole file.
    fn emit_file(&mut self) -> Result<()> {
        let attr_blocks = self.resolve_attrs()?;

        // Layout pass: assign every record's offset. Offsets only ever point
        // at records laid out in this same pass, so the emit pass below
        // writes final links directly.
        let mut cursor: i64 = 8 + CdfDescriptorRecord::encoded_size();
        let gdr_off = cursor;
        let gdr_size = 12 + 5 * 8 + 8 * 4 + 4 * self.spec.r_dim_sizes.len() as i64;
        cursor += gdr_size;

        struct AttrLayout {
            adr_off: i64,
            gr_offs: Vec<i64>,
            z_offs: Vec<i64>,
        }
        let mut attr_layouts = Vec::with_capacity(attr_blocks.len());
        for block in &attr_blocks {
            let adr_off = cursor;
            cursor += AttributeDescriptorRecord::encoded_size();
            let mut gr_offs = Vec::with_capacity(block.gr.len());
            for (_, value) in &block.gr {
                gr_offs.push(cursor);
                cursor += 12 + 8 + 9 * 4 + value.raw_bytes().len() as i64;
            }
            let mut z_offs = Vec::with_capacity(block.z.len());
            for (_, value) in &block.z {
                z_offs.push(cursor);
                cursor += 12 + 8 + 9 * 4 + value.raw_bytes().len() as i64;
            }
            attr_layouts.push(AttrLayout {
                adr_off,
                gr_offs,
                z_offs,
            });
        }

        struct VarLayout {
            cpr_off: Option<i64>,
            vdr_off: i64,
            inter_offs: Vec<i64>,
            leaf_offs: Vec<i64>,
            seg_offs: Vec<i64>,
        }
        let leaf_size = |slots: usize| 12 + 8 + 2 * 4 + 16 * slots as i64;
        let mut var_layouts = Vec::with_capacity(self.vars.len());
        for var in &self.vars {
            let cpr_off = var.spec.compression.map(|_| {
                let off = cursor;
                cursor += 12 + 3 * 4 + 4;
                off
            });
            let vdr_off = cursor;
            cursor += self.vdr_record(var, cpr_off, None, None, None).encoded_size();

            let nseg = var.segments.len();
            let nleaves = nseg.div_ceil(VXR_ENTRIES);
            let ninter = if nleaves > 1 {
                nleaves.div_ceil(VXR_LEVEL_ENTRIES)
            } else {
                0
            };
            let mut inter_offs = Vec::with_capacity(ninter);
            for _ in 0..ninter {
                inter_offs.push(cursor);
                cursor += leaf_size(VXR_LEVEL_ENTRIES);
            }
            let mut leaf_offs = Vec::with_capacity(nleaves);
            for _ in 0..nleaves {
                leaf_offs.push(cursor);
                cursor += leaf_size(VXR_ENTRIES);
            }
            let mut seg_offs = Vec::with_capacity(nseg);
            for segment in &var.segments {
                seg_offs.push(cursor);
                cursor += segment.encoded_size();
            }
            var_layouts.push(VarLayout {
                cpr_off,
                vdr_off,
                inter_offs,
                leaf_offs,
                seg_offs,
            });
        }
        let eof = cursor;

        // Emit pass.
        let mut encoder = Encoder::new(self.endianness);
        encoder.put_bytes(&MAGIC_V3.to_be_bytes());
        let magic2 = if self.spec.compression.is_some() {
            MAGIC_COMPRESSED
        } else {
            MAGIC_UNCOMPRESSED
        };
        encoder.put_bytes(&magic2.to_be_bytes());

        CdfDescriptorRecord {
            gdr_offset: CdfInt8::from(gdr_off),
            version: WRITER_VERSION,
            encoding: self.spec.encoding,
            flags: CdrFlags {
                majority: self.spec.majority,
                single_file: true,
                has_checksum: self.spec.checksum,
                md5_checksum: self.spec.checksum,
                compressed: self.spec.compression.is_some(),
            },
            identifier: CdfInt4::from(-1),
            copyright: CdfString::from(COPYRIGHT),
        }
        .emit(&mut encoder)?;

        let kind_heads = |kind: VariableKind| {
            self.vars
                .iter()
                .zip(&var_layouts)
                .find(|(v, _)| v.spec.kind == kind)
                .map(|(_, l)| CdfInt8::from(l.vdr_off))
        };
        let r_max_rec = self
            .vars
            .iter()
            .filter(|v| v.spec.kind == VariableKind::R)
            .map(|v| v.last_rec)
            .max()
            .unwrap_or(-1);
        GlobalDescriptorRecord {
            rvdr_head: kind_heads(VariableKind::R),
            zvdr_head: kind_heads(VariableKind::Z),
            adr_head: attr_layouts.first().map(|l| CdfInt8::from(l.adr_off)),
            eof: CdfInt8::from(eof),
            num_rvars: CdfInt4::from(
                self.vars
                    .iter()
                    .filter(|v| v.spec.kind == VariableKind::R)
                    .count() as i32,
            ),
            num_attributes: CdfInt4::from(attr_blocks.len() as i32),
            r_max_rec: CdfInt4::from(r_max_rec as i32),
            num_zvars: CdfInt4::from(
                self.vars
                    .iter()
                    .filter(|v| v.spec.kind == VariableKind::Z)
                    .count() as i32,
            ),
            uir_head: None,
            leapsecond_updated: CdfInt4::from(if self.uses_tt2000 {
                leapsec::LAST_UPDATED
            } else {
                -1
            }),
            r_dim_sizes: self.spec.r_dim_sizes.clone(),
        }
        .emit(&mut encoder)?;

        for (index, (block, layout)) in attr_blocks.iter().zip(&attr_layouts).enumerate() {
            AttributeDescriptorRecord {
                adr_next: attr_layouts
                    .get(index + 1)
                    .map(|l| CdfInt8::from(l.adr_off)),
                agredr_head: layout.gr_offs.first().copied().map(CdfInt8::from),
                azedr_head: layout.z_offs.first().copied().map(CdfInt8::from),
                scope: block.scope,
                num: CdfInt4::from(index as i32),
                num_gr_entries: CdfInt4::from(block.gr.len() as i32),
                max_gr_entry: CdfInt4::from(
                    block.gr.iter().map(|(n, _)| *n as i32).max().unwrap_or(-1),
                ),
                num_z_entries: CdfInt4::from(block.z.len() as i32),
                max_z_entry: CdfInt4::from(
                    block.z.iter().map(|(n, _)| *n as i32).max().unwrap_or(-1),
                ),
                name: CdfString::from(block.name.as_str()),
            }
            .emit(&mut encoder)?;

            for (chain, offs, kind) in [
                (&block.gr, &layout.gr_offs, EntryKind::GrEntry),
                (&block.z, &layout.z_offs, EntryKind::ZEntry),
            ] {
                for (slot, (entry_num, value)) in chain.iter().enumerate() {
                    AttributeEntryDescriptorRecord {
                        kind,
                        aedr_next: offs.get(slot + 1).copied().map(CdfInt8::from),
                        attr_num: CdfInt4::from(index as i32),
                        data_type: value.data_type,
                        num: CdfInt4::from(*entry_num as i32),
                        num_elements: CdfInt4::from(value.num_elements),
                        num_strings: CdfInt4::from(value.num_strings),
                        value: value.raw_bytes().to_vec(),
                    }
                    .emit(&mut encoder)?;
                }
            }
        }

        for (index, (var, layout)) in self.vars.iter().zip(&var_layouts).enumerate() {
            if layout.cpr_off.is_some() {
                CompressedParametersRecord::gzip(var.spec.compression.unwrap_or(6))
                    .emit(&mut encoder);
            }

            let vdr_next = self
                .vars
                .iter()
                .zip(&var_layouts)
                .skip(index + 1)
                .find(|(v, _)| v.spec.kind == var.spec.kind)
                .map(|(_, l)| CdfInt8::from(l.vdr_off));
            let vxr_head = layout
                .inter_offs
                .first()
                .or(layout.leaf_offs.first())
                .copied()
                .map(CdfInt8::from);
            let vxr_tail = layout
                .inter_offs
                .last()
                .or(layout.leaf_offs.last())
                .copied()
                .map(CdfInt8::from);
            self.vdr_record(var, layout.cpr_off, vdr_next, vxr_head, vxr_tail)
                .emit(&mut encoder)?;

            // Second-level VXRs first: their entries point forward at the
            // leaves.
            for (slot, chunk) in layout
                .leaf_offs
                .chunks(VXR_LEVEL_ENTRIES)
                .enumerate()
                .take(layout.inter_offs.len())
            {
                let entries = chunk
                    .iter()
                    .enumerate()
                    .map(|(leaf_idx, leaf_off)| {
                        let seg_base = (slot * VXR_LEVEL_ENTRIES + leaf_idx) * VXR_ENTRIES;
                        let covered =
                            &var.segments[seg_base..var.segments.len().min(seg_base + VXR_ENTRIES)];
                        VxrEntry {
                            first: covered.first().map_or(0, |s| s.first),
                            last: covered.last().map_or(0, |s| s.last),
                            offset: *leaf_off,
                        }
                    })
                    .collect();
                VariableIndexRecord {
                    vxr_next: layout.inter_offs.get(slot + 1).copied().map(CdfInt8::from),
                    n_entries: CdfInt4::from(VXR_LEVEL_ENTRIES as i32),
                    entries,
                }
                .emit(&mut encoder)?;
            }

            let chained = layout.inter_offs.is_empty();
            for (slot, chunk) in var.segments.chunks(VXR_ENTRIES).enumerate() {
                let entries = chunk
                    .iter()
                    .enumerate()
                    .map(|(seg_idx, segment)| VxrEntry {
                        first: segment.first,
                        last: segment.last,
                        offset: layout.seg_offs[slot * VXR_ENTRIES + seg_idx],
                    })
                    .collect();
                VariableIndexRecord {
                    vxr_next: if chained {
                        layout.leaf_offs.get(slot + 1).copied().map(CdfInt8::from)
                    } else {
                        None
                    },
                    n_entries: CdfInt4::from(VXR_ENTRIES as i32),
                    entries,
                }
                .emit(&mut encoder)?;
            }

            for segment in &var.segments {
                match &segment.payload {
                    SegmentPayload::Raw(data) => {
                        VariableValuesRecord { data: data.clone() }.emit(&mut encoder);
                    }
                    SegmentPayload::Compressed(data) => {
                        CompressedVariableValuesRecord { data: data.clone() }.emit(&mut encoder);
                    }
                }
            }
        }

        let mut image = encoder.into_image();
        if image.len() as i64 != eof {
            return Err(CdfError::Malformed(format!(
                "layout predicted {eof} bytes, emitted {}",
                image.len()
            )));
        }

        if let Some(level) = self.spec.compression {
            image = wrap_in_ccr(image, level)?;
        }
        if self.spec.checksum {
            checksum::append_trailer(&mut image);
        }
        fs::write(&self.path, &image)?;
        debug!("wrote {} ({} bytes)", self.path.display(), image.len());
        Ok(())
    }

    /// Build the descriptor record of one pending variable.
    fn vdr_record(
        &self,
        var: &PendingVariable,
        cpr_off: Option<i64>,
        vdr_next: Option<CdfInt8>,
        vxr_head: Option<CdfInt8>,
        vxr_tail: Option<CdfInt8>,
    ) -> VariableDescriptorRecord {
        VariableDescriptorRecord {
            kind: var.spec.kind,
            vdr_next,
            data_type: var.spec.data_type,
            max_rec: CdfInt4::from(var.last_rec as i32),
            vxr_head,
            vxr_tail,
            flags: VdrFlags {
                rec_variance: var.spec.rec_vary,
                has_pad: true,
                compressed: var.spec.compression.is_some(),
            },
            sparseness: var.spec.sparseness,
            num_elements: CdfInt4::from(var.spec.num_elements),
            num: CdfInt4::from(var.num),
            cpr_spr_offset: cpr_off.map(CdfInt8::from),
            blocking_factor: CdfInt4::from(var.spec.blocking_factor),
            name: CdfString::from(var.spec.name.as_str()),
            dim_sizes: var.spec.dim_sizes.clone(),
            dim_varys: var.spec.dim_varys.clone(),
            pad_value: Some(var.pad_bytes.clone()),
        }
    }

    /// Merge global and variable attributes into final blocks, resolving
    /// variable names into numbers.
    fn resolve_attrs(&self) -> Result<Vec<AttrBlock>> {
        let mut blocks = Vec::with_capacity(self.global_attrs.len() + self.var_attrs.len());
        for (name, entries) in &self.global_attrs {
            blocks.push(AttrBlock {
                name: name.clone(),
                scope: AttrScope::Global,
                gr: entries.clone(),
                z: Vec::new(),
            });
        }
        for (name, entries) in &self.var_attrs {
            let mut gr = Vec::new();
            let mut z = Vec::new();
            for (var_name, value) in entries {
                let var = self
                    .vars
                    .iter()
                    .find(|v| &v.spec.name == var_name)
                    .ok_or_else(|| {
                        CdfError::NotFound(format!(
                            "variable {var_name} referenced by attribute {name}"
                        ))
                    })?;
                match var.spec.kind {
                    VariableKind::Z => z.push((i64::from(var.num), value.clone())),
                    VariableKind::R => gr.push((i64::from(var.num), value.clone())),
                }
            }
            gr.sort_by_key(|(num, _)| *num);
            z.sort_by_key(|(num, _)| *num);
            blocks.push(AttrBlock {
                name: name.clone(),
                scope: AttrScope::Variable,
                gr,
                z,
            });
        }
        Ok(blocks)
    }
}

impl Drop for CdfWriter {
    fn drop(&mut self) {
        if matches!(self.state, WriterState::Open | WriterState::Dirty) {
            warn!(
                "writer for {} dropped without close; nothing was written",
                self.path.display()
            );
        }
    }
}

/// Values in one record of a variable, from the varying dimensions.
fn record_values(spec: &VarSpec, file: &CdfSpec) -> usize {
    let sizes: &[i32] = if spec.kind == VariableKind::R {
        &file.r_dim_sizes
    } else {
        &spec.dim_sizes
    };
    sizes
        .iter()
        .zip(&spec.dim_varys)
        .filter(|(_, vary)| **vary)
        .map(|(size, _)| *size as usize)
        .product::<usize>()
        .max(1)
}

/// Wrap everything after the CDR into a single CCR + CPR pair.
fn wrap_in_ccr(mut image: Vec<u8>, level: u32) -> Result<Vec<u8>> {
    let boundary = usize::try_from(8 + CdfDescriptorRecord::encoded_size())?;
    let payload = image.split_off(boundary);
    let compressed = compress::deflate(&payload, level)?;
    let ccr = CompressedCdfRecord {
        cpr_offset: CdfInt8::from(boundary as i64 + 12 + 2 * 8 + 4 + compressed.len() as i64),
        uncompressed_size: CdfInt8::from(payload.len() as i64),
        data: compressed,
    };
    let mut encoder = Encoder::new(Endian::Big);
    encoder.put_bytes(&image);
    ccr.emit(&mut encoder);
    CompressedParametersRecord::gzip(level).emit(&mut encoder);
    Ok(encoder.into_image())
}

trait PushEntry {
    fn push_entry(&mut self, num: i64, value: AttrValue);
}

impl PushEntry for (String, Vec<(i64, AttrValue)>) {
    fn push_entry(&mut self, num: i64, value: AttrValue) {
        match self.1.iter_mut().find(|(n, _)| *n == num) {
            Some(slot) => slot.1 = value,
            None => {
                self.1.push((num, value));
                self.1.sort_by_key(|(n, _)| *n);
            }
        }
    }
}
