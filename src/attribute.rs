//! Attribute metadata and the dynamically-typed entry values they carry.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{CdfError, Result};
use crate::repr::Endian;
use crate::types::{CdfDataType, CdfValues};

/// Scope of an attribute: whether its entries describe the file or one
/// variable each.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(i32)]
pub enum AttrScope {
    /// Entries are values in their own right, keyed by entry number.
    Global = 1,
    /// Entries describe variables, keyed by variable number.
    Variable = 2,
}

impl TryFrom<i32> for AttrScope {
    type Error = CdfError;
    fn try_from(value: i32) -> Result<Self> {
        match value {
            1 => Ok(AttrScope::Global),
            2 => Ok(AttrScope::Variable),
            // The assumed-scope codes written by ancient libraries.
            3 => Ok(AttrScope::Global),
            4 => Ok(AttrScope::Variable),
            v => Err(CdfError::Malformed(format!("attribute scope code {v}"))),
        }
    }
}

/// One attribute entry's value, kept in its on-disk form and materialized on
/// demand. Entry values are dynamically typed on disk; carrying the raw
/// bytes avoids pre-decoding every entry of every attribute at open time.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AttrValue {
    /// Data type of the entry value.
    pub data_type: CdfDataType,
    /// Element count: character length for string entries, value count
    /// otherwise.
    pub num_elements: i32,
    /// String count for multi-string character entries.
    pub num_strings: i32,
    bytes: Vec<u8>,
    endianness: Endian,
}

impl AttrValue {
    /// Wrap raw file-encoded entry bytes.
    pub fn new(
        data_type: CdfDataType,
        num_elements: i32,
        num_strings: i32,
        bytes: Vec<u8>,
        endianness: Endian,
    ) -> Self {
        AttrValue {
            data_type,
            num_elements,
            num_strings,
            bytes,
            endianness,
        }
    }

    /// Build an entry value from caller values, encoding them for a file
    /// with the given byte order.
    ///
    /// Multiple strings are stored joined by `\n`, with `num_strings`
    /// recording the count, the way the format stores multi-string entries.
    pub fn from_values(values: &CdfValues, endianness: Endian) -> Result<Self> {
        let data_type = values.data_type();
        if let CdfValues::String(strings) = values {
            let joined = strings.join("\n");
            let num_elements = i32::try_from(joined.len().max(1))?;
            let bytes = if joined.is_empty() {
                vec![b' ']
            } else {
                joined.into_bytes()
            };
            return Ok(AttrValue {
                data_type,
                num_elements,
                num_strings: i32::try_from(strings.len())?,
                bytes,
                endianness,
            });
        }
        let bytes = values.to_bytes(1, endianness)?;
        Ok(AttrValue {
            data_type,
            num_elements: i32::try_from(values.len())?,
            num_strings: 0,
            bytes,
            endianness,
        })
    }

    /// The raw on-disk bytes of the value.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decode the value into caller types.
    pub fn materialize(&self) -> Result<CdfValues> {
        if self.data_type.is_string() {
            let text = CdfValues::from_bytes(
                &self.bytes,
                self.data_type,
                1,
                self.bytes.len(),
                self.endianness,
            )?;
            let CdfValues::String(mut strings) = text else {
                return Err(CdfError::Malformed("string entry decoded as non-string".into()));
            };
            if self.num_strings > 1 {
                let joined = strings.join("");
                strings = joined.split('\n').map(str::to_string).collect();
            }
            return Ok(CdfValues::String(strings));
        }
        let width = self.data_type.element_size();
        if width == 0 || self.bytes.len() % width != 0 {
            return Err(CdfError::Malformed(format!(
                "entry value of {} bytes is not a whole number of {:?}",
                self.bytes.len(),
                self.data_type
            )));
        }
        CdfValues::from_bytes(
            &self.bytes,
            self.data_type,
            self.bytes.len() / width,
            1,
            self.endianness,
        )
    }
}

/// Metadata describing one attribute, as returned by
/// [`Cdf::attinq`](crate::cdf::Cdf::attinq).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct AttInquiry {
    /// Attribute name.
    pub name: String,
    /// Attribute number, dense within the file.
    pub num: i32,
    /// Global- or variable-scope.
    pub scope: AttrScope,
    /// Number of g/rEntries.
    pub num_gr_entries: i32,
    /// Number of zEntries.
    pub num_z_entries: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_value_materializes() -> Result<()> {
        let values = CdfValues::Real8(vec![4.0, -0.5]);
        let entry = AttrValue::from_values(&values, Endian::Little)?;
        assert_eq!(entry.data_type, CdfDataType::Real8);
        assert_eq!(entry.num_elements, 2);
        assert_eq!(entry.materialize()?, values);
        Ok(())
    }

    #[test]
    fn multi_string_value_splits_back() -> Result<()> {
        let values = CdfValues::String(vec!["GSE".to_string(), "GSM".to_string()]);
        let entry = AttrValue::from_values(&values, Endian::Big)?;
        assert_eq!(entry.num_strings, 2);
        assert_eq!(entry.num_elements, 7);
        assert_eq!(entry.materialize()?, values);
        Ok(())
    }

    #[test]
    fn ragged_numeric_bytes_are_rejected() {
        let entry = AttrValue::new(CdfDataType::Int4, 1, 0, vec![0, 1, 2], Endian::Big);
        assert!(matches!(entry.materialize(), Err(CdfError::Malformed(_))));
    }
}
