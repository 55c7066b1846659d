use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A single chat message from any source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub timestamp_ms: i64,
    pub username: String,
    pub content: String,
}

/// Coarse label attached to an emitted clip, derived from the keyword
/// family that led the emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipCategory {
    Win,
    Loss,
    Hype,
    Spike,
}

impl ClipCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ClipCategory::Win => "win",
            ClipCategory::Loss => "loss",
            ClipCategory::Hype => "hype",
            ClipCategory::Spike => "spike",
        }
    }

    /// Category for a raw source keyword. Unknown keywords fall back to
    /// the activity-spike category.
    pub fn for_keyword(keyword: &str) -> Self {
        match keyword {
            "W" | "pog" | "clutch" | "insane" => ClipCategory::Win,
            "L" | "ff" | "sad" => ClipCategory::Loss,
            "OMEGALUL" | "KEKW" => ClipCategory::Hype,
            _ => ClipCategory::Spike,
        }
    }
}

/// A detected clip-worthy window of chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipEvent {
    pub start_ms: i64,
    pub end_ms: i64,
    pub score: f64,
    pub keywords: Vec<String>,
    pub category: ClipCategory,
}

/// A named family of keywords with a relative weight.
///
/// The weight is carried through configuration but not consulted by the
/// scoring pipeline yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordCategory {
    pub name: String,
    pub keywords: Vec<String>,
    pub weight: f64,
}

/// Atomic counters for pipeline statistics.
#[derive(Debug, Clone)]
pub struct PipelineStats {
    messages_ingested: Arc<AtomicU64>,
    lines_skipped: Arc<AtomicU64>,
    clips_emitted: Arc<AtomicU64>,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            messages_ingested: Arc::new(AtomicU64::new(0)),
            lines_skipped: Arc::new(AtomicU64::new(0)),
            clips_emitted: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn inc_messages_ingested(&self) {
        self.messages_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_lines_skipped(&self) {
        self.lines_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_clips_emitted(&self) {
        self.clips_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_ingested(&self) -> u64 {
        self.messages_ingested.load(Ordering::Relaxed)
    }

    pub fn lines_skipped(&self) -> u64 {
        self.lines_skipped.load(Ordering::Relaxed)
    }

    pub fn clips_emitted(&self) -> u64 {
        self.clips_emitted.load(Ordering::Relaxed)
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_for_keyword_maps_families() {
        assert_eq!(ClipCategory::for_keyword("W"), ClipCategory::Win);
        assert_eq!(ClipCategory::for_keyword("pog"), ClipCategory::Win);
        assert_eq!(ClipCategory::for_keyword("L"), ClipCategory::Loss);
        assert_eq!(ClipCategory::for_keyword("ff"), ClipCategory::Loss);
        assert_eq!(ClipCategory::for_keyword("KEKW"), ClipCategory::Hype);
        assert_eq!(ClipCategory::for_keyword("OMEGALUL"), ClipCategory::Hype);
    }

    #[test]
    fn category_for_keyword_is_case_sensitive() {
        // Raw source keywords only; "w" is not the win keyword "W".
        assert_eq!(ClipCategory::for_keyword("w"), ClipCategory::Spike);
        assert_eq!(ClipCategory::for_keyword("kekw"), ClipCategory::Spike);
        assert_eq!(ClipCategory::for_keyword("anything"), ClipCategory::Spike);
    }

    #[test]
    fn stats_counters_are_shared_across_clones() {
        let stats = PipelineStats::new();
        let clone = stats.clone();
        clone.inc_messages_ingested();
        clone.inc_lines_skipped();
        clone.inc_clips_emitted();
        assert_eq!(stats.messages_ingested(), 1);
        assert_eq!(stats.lines_skipped(), 1);
        assert_eq!(stats.clips_emitted(), 1);
    }
}
