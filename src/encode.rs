use crate::repr::{Endian, FileVariant};

/// Trait for encoding a value into a CDF image. The dual of
/// [`Decodable`](crate::decode::Decodable).
pub trait Encodable {
    /// Append this value using big-endian byte order.
    fn encode_be(&self, encoder: &mut Encoder);

    /// Append this value using little-endian byte order.
    fn encode_le(&self, encoder: &mut Encoder);

    /// Append this value as a data payload, in the byte order of the file
    /// being written.
    fn encode_data(&self, encoder: &mut Encoder) {
        match encoder.context.endianness {
            Endian::Big => self.encode_be(encoder),
            Endian::Little => self.encode_le(encoder),
        }
    }
}

/// File-wide facts governing how values are emitted.
#[derive(Clone, Copy)]
pub struct EncodeContext {
    /// Byte order of data payloads. Control fields stay big-endian.
    pub endianness: Endian,
    /// Offset and record-size width. This library always writes the
    /// large-file variant.
    pub variant: FileVariant,
}

/// Accumulates the image of a CDF file being written. Record emission is a
/// single forward pass: the writer lays out every record before emitting, so
/// chain links and head offsets are known up front and no back-patching is
/// needed.
pub struct Encoder {
    /// The bytes emitted so far. The length is the next record's offset.
    pub sink: Vec<u8>,
    /// Context governing data-value byte order and offset width.
    pub context: EncodeContext,
}

impl Encoder {
    /// Create an encoder for a large-file variant image with the given data
    /// byte order.
    pub fn new(endianness: Endian) -> Self {
        Encoder {
            sink: Vec::new(),
            context: EncodeContext {
                endianness,
                variant: FileVariant::LargeFile,
            },
        }
    }

    /// The absolute file offset the next byte will land at.
    pub fn offset(&self) -> u64 {
        self.sink.len() as u64
    }

    /// Append raw bytes.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.sink.extend_from_slice(bytes);
    }

    /// Append a record size or file offset at the width of the file variant.
    pub fn put_offset(&mut self, value: i64) {
        match self.context.variant {
            FileVariant::LargeFile => self.put_bytes(&value.to_be_bytes()),
            FileVariant::Classic => self.put_bytes(&(value as i32).to_be_bytes()),
        }
    }

    /// Consume the encoder, returning the finished image.
    pub fn into_image(self) -> Vec<u8> {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_track_sink_length() {
        let mut encoder = Encoder::new(Endian::Little);
        assert_eq!(encoder.offset(), 0);
        encoder.put_bytes(&[1, 2, 3]);
        assert_eq!(encoder.offset(), 3);
        encoder.put_offset(0x0102_0304_0506_0708);
        assert_eq!(encoder.offset(), 11);
        assert_eq!(&encoder.sink[3..], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
