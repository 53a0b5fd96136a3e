//! Streaming rows out of a finished export file
//!
//! The file is downloaded in byte ranges so a dropped connection never
//! forces restarting a multi-gigabyte download. A range may end inside a
//! UTF-8 sequence and inside a CSV line; held-back tail bytes ride into the
//! next range and the row parser carries the unfinished line as raw text.

use crate::client::{BulkAction, MarketoClient, ResourceKind};
use crate::decode::{decode_chunk, CsvRowParser};
use crate::error::{Error, Result};
use crate::types::{Method, Row, StringMap};
use std::collections::VecDeque;
use tracing::debug;

/// Pull-based row stream over a completed export's CSV file
pub struct ExportRowStream<'a> {
    client: &'a dyn MarketoClient,
    kind: ResourceKind,
    export_id: String,
    chunk_size: u64,
    file_size: u64,
    next_byte: u64,
    leftover: Vec<u8>,
    parser: CsvRowParser,
    buffered: VecDeque<Row>,
    finished: bool,
}

impl<'a> ExportRowStream<'a> {
    /// Look up the export's file size and open a stream over it
    pub async fn open(
        client: &'a dyn MarketoClient,
        kind: ResourceKind,
        export_id: &str,
        chunk_size: u64,
    ) -> Result<ExportRowStream<'a>> {
        let status_path = client.bulk_endpoint(kind, BulkAction::Status, Some(export_id));
        let data = client
            .request(Method::GET, &status_path, &StringMap::new())
            .await?;
        let file_size = data["result"][0]["fileSize"]
            .as_u64()
            .ok_or_else(|| Error::api("export_status", "status response carried no fileSize"))?;
        debug!(export_id, file_size, "opening export file");

        Ok(ExportRowStream {
            client,
            kind,
            export_id: export_id.to_string(),
            chunk_size: chunk_size.max(1),
            file_size,
            next_byte: 0,
            leftover: Vec::new(),
            parser: CsvRowParser::new(),
            buffered: VecDeque::new(),
            finished: false,
        })
    }

    /// Next data row, or `None` once the file is exhausted
    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        loop {
            if let Some(row) = self.buffered.pop_front() {
                return Ok(Some(row));
            }
            if self.next_byte >= self.file_size {
                return self.drain();
            }
            self.fetch_chunk().await?;
        }
    }

    async fn fetch_chunk(&mut self) -> Result<()> {
        // Range ends are inclusive; requests tile the file without overlap
        // and the last tile is clipped to the file size.
        let end = (self.next_byte + self.chunk_size).min(self.file_size) - 1;
        let mut headers = StringMap::new();
        headers.insert(
            "Range".to_string(),
            format!("bytes={}-{end}", self.next_byte),
        );

        let path = self
            .client
            .bulk_endpoint(self.kind, BulkAction::File, Some(&self.export_id));
        let bytes = self.client.raw_request(Method::GET, &path, &headers).await?;
        self.next_byte += self.chunk_size;

        let mut combined = std::mem::take(&mut self.leftover);
        combined.extend_from_slice(&bytes);
        let (text, rest) = decode_chunk(&combined)?;
        let rows = self.parser.feed(text)?;
        self.leftover = rest.to_vec();
        self.buffered.extend(rows);
        Ok(())
    }

    /// Flush the final unterminated row once, erroring if the download ended
    /// inside a UTF-8 sequence
    fn drain(&mut self) -> Result<Option<Row>> {
        if self.finished {
            return Ok(None);
        }
        self.finished = true;

        if !self.leftover.is_empty() {
            return Err(Error::chunk_decode(format!(
                "export file ended with {} undecodable trailing bytes",
                self.leftover.len()
            )));
        }
        self.parser.finish()
    }
}
