//! Byte encoding of class images.
//!
//! Layout: 4-byte magic, big-endian `u16` format version, JSON body. Struct
//! fields serialize in declaration order, so encoding is deterministic.

use crate::error::ClassFormatError;
use crate::image::ClassImage;

pub const MAGIC: [u8; 4] = *b"INDY";
pub const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = MAGIC.len() + 2;

pub fn emit(image: &ClassImage) -> Result<Vec<u8>, ClassFormatError> {
    let mut out = Vec::with_capacity(HEADER_LEN + 256 * image.methods.len().max(1));
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
    serde_json::to_writer(&mut out, image).map_err(|e| ClassFormatError::Encode(e.to_string()))?;
    Ok(out)
}

pub fn decode(bytes: &[u8]) -> Result<ClassImage, ClassFormatError> {
    if bytes.len() < HEADER_LEN {
        return Err(ClassFormatError::Truncated(bytes.len()));
    }
    let (magic, rest) = bytes.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(ClassFormatError::BadMagic);
    }
    let version = u16::from_be_bytes([rest[0], rest[1]]);
    if version != FORMAT_VERSION {
        return Err(ClassFormatError::UnsupportedVersion(version));
    }
    serde_json::from_slice(&rest[2..]).map_err(|e| ClassFormatError::Malformed(e.to_string()))
}

#[cfg(test)]
#[path = "../tests/codec_tests.rs"]
mod tests;
