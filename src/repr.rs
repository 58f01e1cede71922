#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::CdfError;

/// Data encodings used in CDF (from CDF specification Table 5.11).
/// Floating-point representations other than IEEE 754 parse but raise an
/// error when data in them is decoded.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(i32)]
pub enum CdfEncoding {
    /// eXternal Data Representation
    Network = 1,
    /// Sun Representation
    Sun = 2,
    /// VAX Representation
    Vax = 3,
    /// DECStation Representation
    DecStation = 4,
    /// SGi Representation
    Sgi = 5,
    /// Intel Windows, Linux, MacOS Intel, Solaris Intel
    IbmPc = 6,
    /// IBM RS-6000 Representation
    IbmRs = 7,
    /// Macintosh Power PC Representation
    MacPpc = 9,
    /// HP 9000 Series Representation
    Hp = 11,
    /// NeXT Representation
    Next = 12,
    /// DEC Alpha/OSF1 Representation
    AlphaOsf1 = 13,
    /// DEC Alpha/Open VMS Representation (double precision floats in D_FLOAT)
    AlphaVmsD = 14,
    /// DEC Alpha/Open VMS Representation (double precision floats in G_FLOAT)
    AlphaVmsG = 15,
    /// DEC Alpha/Open VMS Representation (floats in IEEE 754)
    AlphaVmsI = 16,
    /// ARM little-endian Representation
    ArmLittle = 17,
    /// ARM big-endian Representation
    ArmBig = 18,
    /// Itanium 64 on OpenVMS Representation (floats in IEEE 754)
    Ia64VmsI = 19,
    /// Itanium 64 on OpenVMS Representation (floats in Digital D_FLOAT)
    Ia64VmsD = 20,
    /// Itanium 64 on OpenVMS Representation (floats in Digital G_FLOAT)
    Ia64VmsG = 21,
}

impl CdfEncoding {
    /// The encoding of the machine this library is running on. This is what
    /// the `HOST` encoding resolves to at create time.
    pub fn host() -> Self {
        if cfg!(target_endian = "big") {
            CdfEncoding::Network
        } else {
            CdfEncoding::IbmPc
        }
    }

    /// Returns the endianness associated with this CDF data encoding.
    /// # Errors
    /// Returns [`CdfError::Unsupported`] for the non-IEEE VMS float
    /// encodings, whose data this library cannot decode.
    pub fn endianness(&self) -> Result<Endian, CdfError> {
        match self {
            CdfEncoding::Network
            | CdfEncoding::Sun
            | CdfEncoding::Next
            | CdfEncoding::MacPpc
            | CdfEncoding::Sgi
            | CdfEncoding::IbmRs
            | CdfEncoding::Hp
            | CdfEncoding::ArmBig => Ok(Endian::Big),

            CdfEncoding::DecStation
            | CdfEncoding::IbmPc
            | CdfEncoding::AlphaOsf1
            | CdfEncoding::AlphaVmsI
            | CdfEncoding::ArmLittle
            | CdfEncoding::Ia64VmsI => Ok(Endian::Little),

            _ => Err(CdfError::Unsupported(format!(
                "data encoding {self:?} uses a non-IEEE float representation"
            ))),
        }
    }
}

impl TryFrom<i32> for CdfEncoding {
    type Error = CdfError;
    fn try_from(value: i32) -> Result<Self, CdfError> {
        match value {
            1 => Ok(CdfEncoding::Network),
            2 => Ok(CdfEncoding::Sun),
            3 => Ok(CdfEncoding::Vax),
            4 => Ok(CdfEncoding::DecStation),
            5 => Ok(CdfEncoding::Sgi),
            6 => Ok(CdfEncoding::IbmPc),
            7 => Ok(CdfEncoding::IbmRs),
            9 => Ok(CdfEncoding::MacPpc),
            11 => Ok(CdfEncoding::Hp),
            12 => Ok(CdfEncoding::Next),
            13 => Ok(CdfEncoding::AlphaOsf1),
            14 => Ok(CdfEncoding::AlphaVmsD),
            15 => Ok(CdfEncoding::AlphaVmsG),
            16 => Ok(CdfEncoding::AlphaVmsI),
            17 => Ok(CdfEncoding::ArmLittle),
            18 => Ok(CdfEncoding::ArmBig),
            19 => Ok(CdfEncoding::Ia64VmsI),
            20 => Ok(CdfEncoding::Ia64VmsD),
            21 => Ok(CdfEncoding::Ia64VmsG),
            v => Err(CdfError::Unsupported(format!("data encoding code {v}"))),
        }
    }
}

/// Byte order of data values within a CDF file. Record control fields are
/// always big-endian regardless of this.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Endian {
    /// Big-Endian
    Big,
    /// Little-Endian
    Little,
}

/// Storage order of multi-dimensional records inside a variable values
/// record.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Majority {
    /// The last dimension varies fastest.
    Row,
    /// The first dimension varies fastest.
    Column,
}

/// Sparse-record policy of a variable.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(i32)]
pub enum Sparseness {
    /// Record indices are contiguous from zero.
    None = 0,
    /// Missing records read back as the variable's pad value.
    Pad = 1,
    /// Missing records read back as the closest preceding physical record.
    Previous = 2,
}

impl TryFrom<i32> for Sparseness {
    type Error = CdfError;
    fn try_from(value: i32) -> Result<Self, CdfError> {
        match value {
            0 => Ok(Sparseness::None),
            1 => Ok(Sparseness::Pad),
            2 => Ok(Sparseness::Previous),
            v => Err(CdfError::Unsupported(format!("sparse-record code {v}"))),
        }
    }
}

/// Width of file offsets and record sizes. Version 3 files written by this
/// library always use the large-file variant; the classic 4-byte variant is
/// accepted on read.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum FileVariant {
    /// 4-byte record sizes and offsets.
    Classic,
    /// 8-byte record sizes and offsets.
    #[default]
    LargeFile,
}

/// Stores the version of the CDF in a simple implementation of semantic
/// versioning.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CdfVersion {
    /// Major version
    pub major: u16,
    /// Minor version
    pub minor: u16,
    /// Patch version
    pub patch: u16,
}

impl CdfVersion {
    /// Create a new instance of this struct using user-defined values.
    pub fn new(major: u16, minor: u16, patch: u16) -> Self {
        CdfVersion {
            major,
            minor,
            patch,
        }
    }
}

impl std::fmt::Display for CdfVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
