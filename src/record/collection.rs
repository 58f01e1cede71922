use std::collections::HashSet;
use std::io;

use crate::decode::Decoder;
use crate::error::{CdfError, Result};
use crate::record::ParseRecord;
use crate::types::CdfInt8;

/// Implemented by record types stored as a linked list, where each record
/// carries the file offset of the next record of the same kind.
pub trait RecordList {
    /// Returns the file offset of the next record in the linked list.
    fn next_record(&self) -> Option<CdfInt8>;
}

/// Unravel a linked list of CDF records into a single `Vec`, starting at
/// `head`. The walk rejects chains that revisit an offset, so damaged files
/// cannot loop the reader.
///
/// # Errors
/// Returns a [`CdfError::Malformed`] if a record fails to parse or the chain
/// cycles.
pub fn get_record_vec<R, T>(decoder: &mut Decoder<R>, head: CdfInt8) -> Result<Vec<T>>
where
    R: io::Read + io::Seek,
    T: ParseRecord + RecordList,
{
    let mut result_vec = vec![];
    let mut seen: HashSet<i64> = HashSet::new();
    let mut next = head;
    loop {
        if !seen.insert(*next) {
            return Err(CdfError::Malformed(format!(
                "record chain revisits offset {:#x}",
                *next
            )));
        }
        decoder.seek_to(u64::try_from(*next)?)?;
        let record = T::parse(decoder)?;
        let link = record.next_record();
        result_vec.push(record);
        match link {
            Some(n) => next = n,
            None => break,
        }
    }
    Ok(result_vec)
}
