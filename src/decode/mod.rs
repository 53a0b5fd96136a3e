//! Chunk decoding module
//!
//! Bulk extract files arrive as raw byte ranges that slice the CSV at
//! arbitrary offsets, so a chunk can end mid-character and mid-row. This
//! module turns those chunks back into whole rows in two layers:
//!
//! - `decode_chunk` recovers valid UTF-8 from a byte chunk, handing back any
//!   trailing bytes of a character the next chunk will complete
//! - `CsvRowParser` accumulates decoded text and yields only complete,
//!   quote-aware CSV rows, holding back the unfinished tail

mod csv;
mod utf8;

pub use csv::CsvRowParser;
pub use utf8::decode_chunk;
