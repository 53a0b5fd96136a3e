//! Incremental UTF-8 decoding
//!
//! Byte-range downloads split the file without regard for character
//! boundaries. A UTF-8 scalar is at most four bytes, so a boundary can strand
//! at most three bytes of an unfinished character at the end of a chunk.

use crate::error::{Error, Result};

/// Maximum number of trailing bytes an unfinished character can occupy.
const MAX_CARRY: usize = 3;

/// Decode as much of `bytes` as forms valid UTF-8, returning the decoded text
/// and the trailing bytes of any character the next chunk must complete.
///
/// Retries with one, two, then three trailing bytes held back. Anything that
/// still fails after that is not a split character but corrupt data, and is
/// reported as a fatal decode error.
pub fn decode_chunk(bytes: &[u8]) -> Result<(&str, &[u8])> {
    for carry in 0..=MAX_CARRY.min(bytes.len()) {
        let split = bytes.len() - carry;
        if let Ok(text) = std::str::from_utf8(&bytes[..split]) {
            return Ok((text, &bytes[split..]));
        }
    }

    Err(Error::chunk_decode(format!(
        "chunk of {} bytes is not valid UTF-8 even with {MAX_CARRY} trailing bytes held back",
        bytes.len()
    )))
}
