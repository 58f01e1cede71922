//! The optional MD5 trailer: 16 raw digest bytes over the file image with
//! the trailer region itself treated as zero.

use crate::error::{CdfError, Result};

/// Byte length of the checksum trailer.
pub const CHECKSUM_LEN: usize = 16;

/// Digest a finished image, treating its trailing [`CHECKSUM_LEN`] bytes as
/// zero. The image must already include room for the trailer.
pub fn file_digest(image: &[u8]) -> [u8; CHECKSUM_LEN] {
    let body_len = image.len().saturating_sub(CHECKSUM_LEN);
    let mut zeroed = image.to_vec();
    zeroed[body_len..].fill(0);
    md5::compute(&zeroed).0
}

/// Verify the trailer of an image whose CDR advertises a checksum.
pub fn verify_trailer(image: &[u8]) -> Result<()> {
    if image.len() < CHECKSUM_LEN {
        return Err(CdfError::Malformed(
            "file too short to hold its checksum trailer".to_string(),
        ));
    }
    let stored = &image[image.len() - CHECKSUM_LEN..];
    let computed = file_digest(image);
    if stored != computed {
        return Err(CdfError::ChecksumMismatch {
            expected: hex::encode(stored),
            computed: hex::encode(computed),
        });
    }
    Ok(())
}

/// Append the MD5 trailer to a finished image.
pub fn append_trailer(image: &mut Vec<u8>) {
    image.extend_from_slice(&[0u8; CHECKSUM_LEN]);
    let digest = file_digest(image);
    let body_len = image.len() - CHECKSUM_LEN;
    image[body_len..].copy_from_slice(&digest);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailer_round_trip() -> Result<()> {
        let mut image = b"not much of a CDF".to_vec();
        append_trailer(&mut image);
        verify_trailer(&image)
    }

    #[test]
    fn corruption_is_detected() {
        let mut image = b"not much of a CDF".to_vec();
        append_trailer(&mut image);
        let tampered = image.len() - 1;
        image[tampered] ^= 0xFF;
        assert!(matches!(
            verify_trailer(&image),
            Err(CdfError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn body_corruption_is_detected() {
        let mut image = b"not much of a CDF".to_vec();
        append_trailer(&mut image);
        image[0] ^= 0xFF;
        assert!(matches!(
            verify_trailer(&image),
            Err(CdfError::ChecksumMismatch { .. })
        ));
    }
}
