//! The read-side orchestrator: opens a file, validates and (if needed)
//! inflates it, materializes the record tables, and routes metadata and data
//! queries.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use tracing::{debug, warn};

use crate::attribute::{AttInquiry, AttrScope, AttrValue};
use crate::checksum;
use crate::compress;
use crate::decode::Decoder;
use crate::epoch;
use crate::error::{CdfError, Result};
use crate::record::adr::AttributeDescriptorRecord;
use crate::record::aedr::AttributeEntryDescriptorRecord;
use crate::record::ccr::CompressedCdfRecord;
use crate::record::cdr::{CdfDescriptorRecord, CDR_OFFSET};
use crate::record::collection::get_record_vec;
use crate::record::cpr::CompressedParametersRecord;
use crate::record::gdr::GlobalDescriptorRecord;
use crate::record::vdr::{VariableDescriptorRecord, VariableKind};
use crate::record::ParseRecord;
use crate::repr::{CdfEncoding, CdfVersion, FileVariant, Majority};
use crate::types::CdfValues;
use crate::variable::{self, VarData, VarInquiry};

/// First magic number of a version 3, large-file-variant CDF.
pub const MAGIC_V3: u32 = 0xCDF3_0001;
/// First magic number of a classic-variant CDF.
pub const MAGIC_CLASSIC: u32 = 0x0000_FFFF;
/// Second magic number of an uncompressed CDF.
pub const MAGIC_UNCOMPRESSED: u32 = 0x0000_FFFF;
/// Second magic number of a file-level compressed CDF.
pub const MAGIC_COMPRESSED: u32 = 0xCCCC_0001;

/// Selects a variable or attribute by name or number.
#[derive(Debug, Clone)]
pub enum Selector {
    /// Select by name.
    Name(String),
    /// Select by number.
    Number(i64),
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        Selector::Name(name.to_string())
    }
}

impl From<String> for Selector {
    fn from(name: String) -> Self {
        Selector::Name(name)
    }
}

impl From<i64> for Selector {
    fn from(num: i64) -> Self {
        Selector::Number(num)
    }
}

impl From<i32> for Selector {
    fn from(num: i32) -> Self {
        Selector::Number(i64::from(num))
    }
}

/// A point on one of the three epoch scales, used for time-range reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EpochValue {
    /// A CDF_EPOCH value.
    Epoch(f64),
    /// A CDF_EPOCH16 value.
    Epoch16((f64, f64)),
    /// A CDF_TIME_TT2000 value.
    Tt2000(i64),
}

/// Options steering [`Cdf::varget`]. An explicit record range wins over a
/// time range.
#[derive(Debug, Clone, Default)]
pub struct VargetOptions {
    /// Inclusive record range to read.
    pub record_range: Option<(i64, i64)>,
    /// Inclusive lower time bound.
    pub start_time: Option<EpochValue>,
    /// Inclusive upper time bound.
    pub end_time: Option<EpochValue>,
    /// Epoch variable resolving the time bounds, overriding the variable's
    /// `DEPEND_0` attribute.
    pub epoch_var: Option<String>,
    /// Majority the caller wants records delivered in; defaults to the
    /// file's own.
    pub majority: Option<Majority>,
}

/// File-level metadata, as returned by [`Cdf::info`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct CdfInfo {
    /// Version of the library that wrote the file.
    pub version: CdfVersion,
    /// Data encoding of the file.
    pub encoding: CdfEncoding,
    /// Storage order of multi-dimensional records.
    pub majority: Majority,
    /// Names of the file's zVariables, by number.
    pub zvariables: Vec<String>,
    /// Names of the file's rVariables, by number.
    pub rvariables: Vec<String>,
    /// Names of the file's attributes, by number.
    pub attributes: Vec<String>,
    /// Dimension sizes shared by the rVariables.
    pub r_dim_sizes: Vec<i32>,
    /// Whether the file carries a checksum trailer.
    pub checksum: bool,
    /// Whether the file was stored under file-level compression.
    pub compressed: bool,
    /// Last leap-second date the file's TT2000 values account for, as
    /// yyyymmdd.
    pub leapsecond_updated: Option<i32>,
}

/// An open CDF file. All metadata is materialized at open; variable data is
/// read on demand through the index trees.
pub struct Cdf {
    decoder: Decoder<Cursor<Vec<u8>>>,
    cdr: CdfDescriptorRecord,
    gdr: GlobalDescriptorRecord,
    attrs: Vec<AttributeDescriptorRecord>,
    gr_entries: Vec<Vec<AttributeEntryDescriptorRecord>>,
    z_entries: Vec<Vec<AttributeEntryDescriptorRecord>>,
    rvars: Vec<VariableDescriptorRecord>,
    zvars: Vec<VariableDescriptorRecord>,
    rvar_gzip: Vec<Option<u32>>,
    zvar_gzip: Vec<Option<u32>>,
    compressed: bool,
    checksum_error: Option<CdfError>,
}

impl Cdf {
    /// Open a CDF file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Cdf> {
        Cdf::from_bytes(fs::read(path)?)
    }

    /// Open a CDF file already held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Cdf> {
        if bytes.len() < 8 {
            return Err(CdfError::Malformed(
                "file too short for the magic numbers".to_string(),
            ));
        }
        let magic1 = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let magic2 = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let variant = match magic1 {
            MAGIC_V3 => FileVariant::LargeFile,
            MAGIC_CLASSIC => FileVariant::Classic,
            other => {
                return Err(CdfError::Malformed(format!(
                    "invalid magic number {other:#010x}"
                )))
            }
        };
        let magic_compressed = match magic2 {
            MAGIC_UNCOMPRESSED => false,
            MAGIC_COMPRESSED => true,
            other => {
                return Err(CdfError::Malformed(format!(
                    "invalid magic number {other:#010x}"
                )))
            }
        };

        let mut decoder = Decoder::new(Cursor::new(bytes));
        decoder.context.variant = variant;
        decoder.seek_to(CDR_OFFSET)?;
        let cdr = CdfDescriptorRecord::parse(&mut decoder)?;

        // The trailer covers the physical bytes, compressed or not.
        let checksum_error = if cdr.flags.has_checksum {
            checksum::verify_trailer(decoder.reader.get_ref()).err()
        } else {
            None
        };
        if checksum_error.is_some() {
            warn!("checksum trailer mismatch; metadata remains readable, the first data read will fail");
        }

        let compressed = cdr.flags.compressed || magic_compressed;
        if compressed {
            decoder = inflate_file(decoder)?;
        }

        decoder.seek_to(u64::try_from(*cdr.gdr_offset)?)?;
        let gdr = GlobalDescriptorRecord::parse(&mut decoder)?;

        let attrs: Vec<AttributeDescriptorRecord> = match gdr.adr_head {
            Some(head) => get_record_vec(&mut decoder, head)?,
            None => Vec::new(),
        };
        let mut gr_entries = Vec::with_capacity(attrs.len());
        let mut z_entries = Vec::with_capacity(attrs.len());
        for adr in &attrs {
            gr_entries.push(match adr.agredr_head {
                Some(head) => get_record_vec(&mut decoder, head)?,
                None => Vec::new(),
            });
            z_entries.push(match adr.azedr_head {
                Some(head) => get_record_vec(&mut decoder, head)?,
                None => Vec::new(),
            });
        }

        let rvars: Vec<VariableDescriptorRecord> = match gdr.rvdr_head {
            Some(head) => get_record_vec(&mut decoder, head)?,
            None => Vec::new(),
        };
        let zvars: Vec<VariableDescriptorRecord> = match gdr.zvdr_head {
            Some(head) => get_record_vec(&mut decoder, head)?,
            None => Vec::new(),
        };
        let rvar_gzip = var_gzip_levels(&mut decoder, &rvars)?;
        let zvar_gzip = var_gzip_levels(&mut decoder, &zvars)?;

        debug!(
            "opened CDF v{}: {} zVariables, {} rVariables, {} attributes",
            cdr.version,
            zvars.len(),
            rvars.len(),
            attrs.len()
        );

        Ok(Cdf {
            decoder,
            cdr,
            gdr,
            attrs,
            gr_entries,
            z_entries,
            rvars,
            zvars,
            rvar_gzip,
            zvar_gzip,
            compressed,
            checksum_error,
        })
    }

    /// File-level metadata. No I/O happens; the record tables were built at
    /// open.
    pub fn info(&self) -> CdfInfo {
        CdfInfo {
            version: self.cdr.version,
            encoding: self.cdr.encoding,
            majority: self.cdr.flags.majority,
            zvariables: self.zvars.iter().map(|v| v.name.to_string()).collect(),
            rvariables: self.rvars.iter().map(|v| v.name.to_string()).collect(),
            attributes: self.attrs.iter().map(|a| a.name.to_string()).collect(),
            r_dim_sizes: self.gdr.r_dim_sizes.clone(),
            checksum: self.cdr.flags.has_checksum,
            compressed: self.compressed,
            leapsecond_updated: (*self.gdr.leapsecond_updated >= 0)
                .then_some(*self.gdr.leapsecond_updated),
        }
    }

    /// Metadata of one variable.
    pub fn varinq(&self, var: impl Into<Selector>) -> Result<VarInquiry> {
        let (kind, index) = self.var_ref(&var.into())?;
        let (vdr, gzip) = match kind {
            VariableKind::Z => (&self.zvars[index], self.zvar_gzip[index]),
            VariableKind::R => (&self.rvars[index], self.rvar_gzip[index]),
        };
        let pad_value = match &vdr.pad_value {
            Some(bytes) => Some(CdfValues::from_bytes(
                bytes,
                vdr.data_type,
                1,
                usize::try_from(*vdr.num_elements)?.max(1),
                self.decoder.context.endianness()?,
            )?),
            None => None,
        };
        Ok(VarInquiry {
            name: vdr.name.to_string(),
            num: *vdr.num,
            kind,
            data_type: vdr.data_type,
            num_elements: *vdr.num_elements,
            dim_sizes: vdr.dim_sizes.clone(),
            dim_varys: vdr.dim_varys.clone(),
            rec_vary: vdr.flags.rec_variance,
            sparseness: vdr.sparseness,
            compression: gzip,
            blocking_factor: *vdr.blocking_factor,
            last_rec: i64::from(*vdr.max_rec),
            pad_value,
        })
    }

    /// Metadata of one attribute.
    pub fn attinq(&self, att: impl Into<Selector>) -> Result<AttInquiry> {
        let index = self.attr_index(&att.into())?;
        let adr = &self.attrs[index];
        Ok(AttInquiry {
            name: adr.name.to_string(),
            num: *adr.num,
            scope: adr.scope,
            num_gr_entries: *adr.num_gr_entries,
            num_z_entries: *adr.num_z_entries,
        })
    }

    /// One attribute entry: by entry number for a global attribute, by
    /// variable (number) for a variable-scope attribute.
    pub fn attget(&self, att: impl Into<Selector>, entry: i64) -> Result<AttrValue> {
        let index = self.attr_index(&att.into())?;
        let adr = &self.attrs[index];
        let chains: [&[AttributeEntryDescriptorRecord]; 2] = match adr.scope {
            AttrScope::Global => [&self.gr_entries[index], &[]],
            AttrScope::Variable => [&self.z_entries[index], &self.gr_entries[index]],
        };
        for aedr in chains.into_iter().flatten() {
            if i64::from(*aedr.num) == entry {
                return Ok(self.entry_value(aedr)?);
            }
        }
        Err(CdfError::NotFound(format!(
            "entry {entry} of attribute {}",
            adr.name
        )))
    }

    /// Every global attribute's entries, keyed by attribute name and entry
    /// number, with types preserved.
    pub fn globalattsget(&self) -> Result<BTreeMap<String, BTreeMap<i64, CdfValues>>> {
        let mut result = BTreeMap::new();
        for (index, adr) in self.attrs.iter().enumerate() {
            if adr.scope != AttrScope::Global {
                continue;
            }
            let mut entries = BTreeMap::new();
            for aedr in &self.gr_entries[index] {
                entries.insert(i64::from(*aedr.num), self.entry_value(aedr)?.materialize()?);
            }
            result.insert(adr.name.to_string(), entries);
        }
        Ok(result)
    }

    /// Every variable-scope attribute entry describing one variable, keyed
    /// by attribute name.
    pub fn varattsget(&self, var: impl Into<Selector>) -> Result<BTreeMap<String, CdfValues>> {
        let (kind, index) = self.var_ref(&var.into())?;
        let var_num = match kind {
            VariableKind::Z => *self.zvars[index].num,
            VariableKind::R => *self.rvars[index].num,
        };
        let mut result = BTreeMap::new();
        for (attr_index, adr) in self.attrs.iter().enumerate() {
            if adr.scope != AttrScope::Variable {
                continue;
            }
            let chain = match kind {
                VariableKind::Z => &self.z_entries[attr_index],
                VariableKind::R => &self.gr_entries[attr_index],
            };
            if let Some(aedr) = chain.iter().find(|aedr| *aedr.num == var_num) {
                result.insert(adr.name.to_string(), self.entry_value(aedr)?.materialize()?);
            }
        }
        Ok(result)
    }

    /// Read records of one variable. With no options the whole written range
    /// is returned. An explicit record range wins over a time range; a time
    /// range is resolved against the variable named by `epoch_var` or, when
    /// absent, its `DEPEND_0` attribute. Out-of-range record bounds clamp to
    /// the written range.
    pub fn varget(&mut self, var: impl Into<Selector>, options: &VargetOptions) -> Result<VarData> {
        let selector = var.into();
        let (kind, index) = self.var_ref(&selector)?;
        if let Some(error) = self.checksum_error.take() {
            return Err(error);
        }

        let (last_rec, rec_vary, data_type, num_elements) = {
            let vdr = self.vdr(kind, index);
            (
                i64::from(*vdr.max_rec),
                vdr.flags.rec_variance,
                vdr.data_type,
                usize::try_from(*vdr.num_elements)?.max(1),
            )
        };
        let endianness = self.decoder.context.endianness()?;

        // Resolve the requested range before touching data.
        let requested = match (options.record_range, !rec_vary) {
            (_, true) => Some((0, 0)),
            (Some(range), _) => Some(range),
            (None, _) => match (&options.start_time, &options.end_time) {
                (None, None) => Some((0, last_rec)),
                _ => self
                    .resolve_time_range(&selector, options)?
                    .map(|(lo, hi)| (lo, hi)),
            },
        };

        let vdr_shape: Vec<i32> = self.vdr(kind, index).record_shape();
        let empty = |num_records: i64| -> Result<VarData> {
            Ok(VarData {
                rec_ndim: vdr_shape.len(),
                rec_shape: vdr_shape.clone(),
                num_records,
                records_returned: 0,
                data_type,
                data: CdfValues::from_bytes(&[], data_type, 0, num_elements, endianness)?,
                real_records: Vec::new(),
            })
        };

        let Some((lo, hi)) = requested else {
            return empty(last_rec + 1);
        };
        if last_rec < 0 {
            return empty(0);
        }
        let (first, last) = (lo.max(0), hi.min(last_rec));
        if (first, last) != (lo, hi) {
            warn!(
                "record range [{lo}, {hi}] clamped to written records [{first}, {last}]"
            );
        }
        if last < first {
            return empty(last_rec + 1);
        }

        let vdr = match kind {
            VariableKind::Z => &self.zvars[index],
            VariableKind::R => &self.rvars[index],
        };
        let (mut bytes, real_records) =
            variable::read_records(&mut self.decoder, vdr, first, last)?;

        // Majority conversion happens only here at the boundary, and only
        // for multi-dimensional non-string records.
        let file_majority = self.cdr.flags.majority;
        let wanted = options.majority.unwrap_or(file_majority);
        if wanted != file_majority && vdr_shape.len() >= 2 && !data_type.is_string() {
            let shape: Vec<usize> = vdr_shape.iter().map(|s| *s as usize).collect();
            let cell = data_type.element_size() * num_elements;
            bytes = variable::transpose_records(
                &bytes,
                &shape,
                cell,
                file_majority == Majority::Row,
            );
        }

        let count = usize::try_from(last - first + 1)?;
        let values_per_record = vdr.values_per_record();
        let data = CdfValues::from_bytes(
            &bytes,
            data_type,
            count * values_per_record,
            num_elements,
            endianness,
        )?;

        Ok(VarData {
            rec_ndim: vdr_shape.len(),
            rec_shape: vdr_shape,
            num_records: last_rec + 1,
            records_returned: count as i64,
            data_type,
            data,
            real_records,
        })
    }

    /// The inclusive record range of an epoch variable whose values fall in
    /// `[start, end]`, or `None` when no records do.
    pub fn epochrange(
        &mut self,
        epoch_var: impl Into<Selector>,
        start: Option<EpochValue>,
        end: Option<EpochValue>,
    ) -> Result<Option<(i64, i64)>> {
        if let Some(error) = self.checksum_error.take() {
            return Err(error);
        }
        self.epoch_range_of(&epoch_var.into(), start, end)
    }

    /// Release the file image. Dropping the handle is equivalent.
    pub fn close(self) {}

    fn vdr(&self, kind: VariableKind, index: usize) -> &VariableDescriptorRecord {
        match kind {
            VariableKind::Z => &self.zvars[index],
            VariableKind::R => &self.rvars[index],
        }
    }

    fn entry_value(&self, aedr: &AttributeEntryDescriptorRecord) -> Result<AttrValue> {
        Ok(AttrValue::new(
            aedr.data_type,
            *aedr.num_elements,
            *aedr.num_strings,
            aedr.value.clone(),
            self.decoder.context.endianness()?,
        ))
    }

    fn attr_index(&self, selector: &Selector) -> Result<usize> {
        let found = match selector {
            Selector::Name(name) => self.attrs.iter().position(|a| a.name.as_ref() == name),
            Selector::Number(num) => self.attrs.iter().position(|a| i64::from(*a.num) == *num),
        };
        found.ok_or_else(|| CdfError::NotFound(format!("attribute {selector:?}")))
    }

    fn var_ref(&self, selector: &Selector) -> Result<(VariableKind, usize)> {
        let find = |vars: &[VariableDescriptorRecord]| match selector {
            Selector::Name(name) => vars.iter().position(|v| v.name.as_ref() == name),
            Selector::Number(num) => vars.iter().position(|v| i64::from(*v.num) == *num),
        };
        if let Some(index) = find(&self.zvars) {
            return Ok((VariableKind::Z, index));
        }
        if let Some(index) = find(&self.rvars) {
            return Ok((VariableKind::R, index));
        }
        Err(CdfError::NotFound(format!("variable {selector:?}")))
    }

    /// Resolve a time range into a record range via the epoch variable.
    fn resolve_time_range(
        &mut self,
        var: &Selector,
        options: &VargetOptions,
    ) -> Result<Option<(i64, i64)>> {
        let epoch_selector = match &options.epoch_var {
            Some(name) => Selector::Name(name.clone()),
            None => {
                let atts = self.varattsget(var.clone())?;
                let depend = atts.get("DEPEND_0").ok_or_else(|| {
                    CdfError::NotFound(
                        "DEPEND_0 attribute needed to resolve a time range".to_string(),
                    )
                })?;
                match depend {
                    CdfValues::String(names) if !names.is_empty() => {
                        Selector::Name(names[0].clone())
                    }
                    _ => {
                        return Err(CdfError::Malformed(
                            "DEPEND_0 does not name an epoch variable".to_string(),
                        ))
                    }
                }
            }
        };
        self.epoch_range_of(&epoch_selector, options.start_time, options.end_time)
    }

    fn epoch_range_of(
        &mut self,
        epoch_var: &Selector,
        start: Option<EpochValue>,
        end: Option<EpochValue>,
    ) -> Result<Option<(i64, i64)>> {
        let values = self
            .varget(epoch_var.clone(), &VargetOptions::default())?
            .data;
        let range = match values {
            CdfValues::Epoch(values) => {
                epoch::find_epoch_range(&values, epoch_bound_f64(start)?, epoch_bound_f64(end)?)
            }
            CdfValues::Epoch16(values) => epoch::find_epoch_range(
                &values,
                epoch_bound_16(start)?,
                epoch_bound_16(end)?,
            ),
            CdfValues::TimeTt2000(values) => epoch::find_epoch_range(
                &values,
                epoch_bound_tt(start)?,
                epoch_bound_tt(end)?,
            ),
            other => {
                return Err(CdfError::Unsupported(format!(
                    "epoch range over a {:?} variable",
                    other.data_type()
                )))
            }
        };
        Ok(range.map(|(lo, hi)| (lo as i64, hi as i64)))
    }
}

fn epoch_bound_f64(bound: Option<EpochValue>) -> Result<Option<f64>> {
    match bound {
        None => Ok(None),
        Some(EpochValue::Epoch(v)) => Ok(Some(v)),
        Some(other) => Err(CdfError::OutOfRange(format!(
            "time bound {other:?} does not match the CDF_EPOCH variable"
        ))),
    }
}

fn epoch_bound_16(bound: Option<EpochValue>) -> Result<Option<(f64, f64)>> {
    match bound {
        None => Ok(None),
        Some(EpochValue::Epoch16(v)) => Ok(Some(v)),
        Some(other) => Err(CdfError::OutOfRange(format!(
            "time bound {other:?} does not match the CDF_EPOCH16 variable"
        ))),
    }
}

fn epoch_bound_tt(bound: Option<EpochValue>) -> Result<Option<i64>> {
    match bound {
        None => Ok(None),
        Some(EpochValue::Tt2000(v)) => Ok(Some(v)),
        Some(other) => Err(CdfError::OutOfRange(format!(
            "time bound {other:?} does not match the CDF_TIME_TT2000 variable"
        ))),
    }
}

/// Inflate a file-level-compressed image: the CCR sits immediately after the
/// CDR, and its payload inflates into everything from the GDR onward. The
/// scratch image downstream code sees is `[magic || CDR || inflated]`.
fn inflate_file(mut decoder: Decoder<Cursor<Vec<u8>>>) -> Result<Decoder<Cursor<Vec<u8>>>> {
    let ccr_offset = decoder.position()?;
    let ccr = CompressedCdfRecord::parse(&mut decoder)?;
    decoder.seek_to(u64::try_from(*ccr.cpr_offset)?)?;
    let cpr = CompressedParametersRecord::parse(&mut decoder)?;
    // Only GZIP payloads can be inflated; gzip_level rejects the rest.
    let _ = cpr.gzip_level()?;
    let inflated = compress::inflate(
        &ccr.data,
        Some(usize::try_from(*ccr.uncompressed_size)?),
        ccr_offset,
    )?;

    let mut scratch = decoder.reader.into_inner();
    scratch.truncate(usize::try_from(ccr_offset)?);
    scratch.extend_from_slice(&inflated);
    debug!(
        "inflated file-level compression: scratch image of {} bytes",
        scratch.len()
    );

    let mut fresh = Decoder::new(Cursor::new(scratch));
    fresh.context = decoder.context.clone();
    Ok(fresh)
}

fn var_gzip_levels(
    decoder: &mut Decoder<Cursor<Vec<u8>>>,
    vars: &[VariableDescriptorRecord],
) -> Result<Vec<Option<u32>>> {
    let mut levels = Vec::with_capacity(vars.len());
    for vdr in vars {
        let level = match (vdr.flags.compressed, vdr.cpr_spr_offset) {
            (true, Some(offset)) => {
                decoder.seek_to(u64::try_from(*offset)?)?;
                let cpr = CompressedParametersRecord::parse(decoder)?;
                Some(cpr.gzip_level()?)
            }
            (true, None) => Some(6),
            _ => None,
        };
        levels.push(level);
    }
    Ok(levels)
}
