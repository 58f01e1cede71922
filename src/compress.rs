//! GZIP helpers shared by per-variable (CVVR) and whole-file (CCR)
//! compression.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, trace};

use crate::error::{CdfError, Result};

/// Inflate a GZIP payload read from the record at `offset`.
///
/// When `expected_len` is known (from a CCR's uncompressed-size field or a
/// VXR entry's record range), a mismatching result is an error rather than a
/// silent truncation.
pub fn inflate(data: &[u8], expected_len: Option<usize>, offset: u64) -> Result<Vec<u8>> {
    trace!("inflating {} bytes at {offset:#x}", data.len());
    let mut decoder = GzDecoder::new(data);
    let mut result = match expected_len {
        Some(len) => Vec::with_capacity(len),
        None => Vec::new(),
    };
    decoder
        .read_to_end(&mut result)
        .map_err(|e| CdfError::CompressionFailed {
            offset,
            reason: e.to_string(),
        })?;
    if let Some(len) = expected_len {
        if result.len() != len {
            return Err(CdfError::CompressionFailed {
                offset,
                reason: format!("payload inflated to {} bytes, {len} expected", result.len()),
            });
        }
    }
    debug!("{} bytes -> {} bytes at {offset:#x}", data.len(), result.len());
    Ok(result)
}

/// Deflate a payload with GZIP at the given level (0-9; out-of-range levels
/// clamp to the default).
pub fn deflate(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let compression = match level {
        0 => Compression::none(),
        1 => Compression::fast(),
        2..=8 => Compression::new(level),
        9 => Compression::best(),
        _ => Compression::default(),
    };
    let mut encoder = GzEncoder::new(Vec::new(), compression);
    encoder
        .write_all(data)
        .map_err(|e| CdfError::CompressionFailed {
            offset: 0,
            reason: e.to_string(),
        })?;
    let compressed = encoder.finish().map_err(|e| CdfError::CompressionFailed {
        offset: 0,
        reason: e.to_string(),
    })?;
    trace!("deflated {} bytes -> {} bytes", data.len(), compressed.len());
    Ok(compressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deflate_inflate_round_trip() -> Result<()> {
        let payload: Vec<u8> = (0..10_000u32).flat_map(|v| v.to_le_bytes()).collect();
        let compressed = deflate(&payload, 6)?;
        assert!(compressed.len() < payload.len());
        let back = inflate(&compressed, Some(payload.len()), 0)?;
        assert_eq!(back, payload);
        Ok(())
    }

    #[test]
    fn garbage_fails_with_offset() {
        let err = inflate(&[0, 1, 2, 3], None, 0x1234);
        match err {
            Err(CdfError::CompressionFailed { offset, .. }) => assert_eq!(offset, 0x1234),
            other => panic!("expected CompressionFailed, got {other:?}"),
        }
    }

    #[test]
    fn wrong_inflated_length_is_an_error() -> Result<()> {
        let compressed = deflate(&[7u8; 100], 1)?;
        assert!(matches!(
            inflate(&compressed, Some(99), 0),
            Err(CdfError::CompressionFailed { .. })
        ));
        Ok(())
    }
}
