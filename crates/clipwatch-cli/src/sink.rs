use clipwatch_core::types::{ClipEvent, PipelineStats};
use clipwatch_core::wire;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Writes one JSON line per clip to stdout and, when configured, to an
/// append-only clips file. Flushes per event so the stream is pipeable.
pub struct ClipSink {
    file: Option<File>,
    stats: PipelineStats,
}

impl ClipSink {
    pub fn new(clips_file: Option<&Path>, stats: PipelineStats) -> io::Result<Self> {
        let file = match clips_file {
            Some(path) => Some(OpenOptions::new().create(true).append(true).open(path)?),
            None => None,
        };
        Ok(Self { file, stats })
    }

    pub fn emit(&mut self, event: &ClipEvent) {
        let line = wire::clip_to_json(event);
        self.stats.inc_clips_emitted();

        let stdout = io::stdout();
        let mut out = stdout.lock();
        // A write error here means downstream closed the pipe; the stream
        // itself keeps flowing into the clips file if one is open.
        let _ = writeln!(out, "{line}").and_then(|_| out.flush());

        if let Some(file) = self.file.as_mut()
            && let Err(err) = writeln!(file, "{line}").and_then(|_| file.flush())
        {
            tracing::warn!(error = %err, "failed to append clip to clips file");
        }
    }
}
