pub mod irc;
pub mod vod;

use crate::error::SourceError;
use crate::types::{ChatMessage, PipelineStats};
use crate::wire;
use std::io::BufRead;

/// A transport that yields canonical chat messages.
pub trait ChatSource {
    /// Next message, or `Ok(None)` once the stream is exhausted.
    fn next_message(&mut self) -> Result<Option<ChatMessage>, SourceError>;
}

/// Reads the pipe-delimited wire format line by line. Lines that fail to
/// parse are skipped and counted, matching the contract for adapters.
pub struct LineStream<R: BufRead> {
    reader: R,
    stats: PipelineStats,
    line: String,
}

impl<R: BufRead> LineStream<R> {
    pub fn new(reader: R, stats: PipelineStats) -> Self {
        Self {
            reader,
            stats,
            line: String::new(),
        }
    }
}

impl<R: BufRead> ChatSource for LineStream<R> {
    fn next_message(&mut self) -> Result<Option<ChatMessage>, SourceError> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }

            let trimmed = self.line.trim_end_matches(['\r', '\n']);
            match wire::parse_line(trimmed) {
                Some(message) => return Ok(Some(message)),
                None => {
                    self.stats.inc_lines_skipped();
                    tracing::debug!(line = trimmed, "skipping malformed chat line");
                }
            }
        }
    }
}
