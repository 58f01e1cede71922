//! Reader and writer for NASA's Common Data Format (CDF), version 3.
//!
//! A CDF file is a chain of typed, length-prefixed internal records holding
//! multi-dimensional numeric variables, global and per-variable attributes,
//! and high-precision timestamps. This crate implements the format engine
//! (large-file layout, GZIP-compressed variables and files, sparse-record
//! index trees, MD5 trailers), the variable data model (record and dimension
//! variance, hyperslab reads, majority transpose), and the three CDF epoch
//! scales with leap-second-exact TT2000 conversion.
//!
//! Reading:
//!
//! ```no_run
//! use cdf3::{Cdf, VargetOptions};
//!
//! # fn main() -> cdf3::Result<()> {
//! let mut cdf = Cdf::open("mms1_fgm_srvy.cdf")?;
//! let info = cdf.info();
//! let b_field = cdf.varget("B_gse", &VargetOptions::default())?;
//! # Ok(())
//! # }
//! ```
//!
//! Writing:
//!
//! ```no_run
//! use cdf3::{CdfDataType, CdfSpec, CdfValues, CdfWriter, VarRecords, VarSpec};
//! use std::collections::BTreeMap;
//!
//! # fn main() -> cdf3::Result<()> {
//! let mut writer = CdfWriter::create("out.cdf", CdfSpec::default())?;
//! writer.write_var(
//!     VarSpec {
//!         name: "Density".to_string(),
//!         data_type: CdfDataType::Real8,
//!         ..VarSpec::default()
//!     },
//!     &BTreeMap::new(),
//!     Some(VarRecords::Full(CdfValues::Real8(vec![1.0, 2.0, 4.0]))),
//! )?;
//! writer.close()?;
//! # Ok(())
//! # }
//! ```

/// Attribute metadata and dynamically-typed entry values.
pub mod attribute;
/// The read-side orchestrator.
pub mod cdf;
/// MD5 trailer computation and verification.
pub mod checksum;
/// GZIP helpers for CVVR and CCR payloads.
pub mod compress;
/// Decoder plumbing for the internal-record codec.
pub mod decode;
/// Encoder plumbing for the internal-record codec.
pub mod encode;
/// The three CDF epoch scales.
pub mod epoch;
/// Error types.
pub mod error;
/// The internal records that make up a CDF file.
pub mod record;
/// Enumerations describing a file: encodings, majority, sparseness.
pub mod repr;
/// Data-type codes, the bulk value codec, and record scalar newtypes.
pub mod types;
/// The variable data engine.
pub mod variable;
/// The write-side orchestrator.
pub mod writer;

pub use attribute::{AttInquiry, AttrScope, AttrValue};
pub use cdf::{Cdf, CdfInfo, EpochValue, Selector, VargetOptions};
pub use error::{CdfError, Result};
pub use record::vdr::VariableKind;
pub use repr::{CdfEncoding, CdfVersion, Endian, FileVariant, Majority, Sparseness};
pub use types::{CdfDataType, CdfValues};
pub use variable::{VarData, VarInquiry};
pub use writer::{CdfSpec, CdfWriter, VarRecords, VarSpec};
