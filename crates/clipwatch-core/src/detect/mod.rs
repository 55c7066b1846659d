pub mod buffer;
pub mod scoring;
pub mod spike;

use crate::clock::Clock;
use crate::matcher::KeywordMatcher;
use crate::types::{ChatMessage, ClipCategory, ClipEvent};
use buffer::ChatBuffer;
use scoring::ScoringEngine;
use spike::SpikeDetector;
use std::collections::HashMap;
use std::sync::Arc;

/// Trailing window sampled into the spike detector on every message.
const RATE_WINDOW_SECS: u64 = 10;
/// Recent-message window scanned for keywords on every evaluation.
const KEYWORD_LOOKBACK_SECS: u64 = 30;
/// Uniqueness contribution until a per-chatter signal exists.
const UNIQUENESS_SCORE: f64 = 1.0;

/// Callback invoked synchronously for each detected clip. Must not
/// re-enter the detector.
pub type ClipCallback = Box<dyn FnMut(&ClipEvent) + Send>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipDetectorConfig {
    pub clip_duration_secs: u64,
    pub lookback_secs: u64,
    pub cooldown_secs: u64,
    pub min_score: f64,
}

impl Default for ClipDetectorConfig {
    fn default() -> Self {
        Self {
            clip_duration_secs: 60,
            lookback_secs: 30,
            cooldown_secs: 30,
            min_score: 0.7,
        }
    }
}

/// Orchestrates the pipeline per message: buffer the message, sample the
/// rate into the spike detector, scan the lookback window for keywords,
/// score, and emit a clip when the score crosses the trigger threshold
/// outside the cooldown.
pub struct ClipDetector {
    config: ClipDetectorConfig,
    buffer: ChatBuffer,
    spike: SpikeDetector,
    matcher: Arc<KeywordMatcher>,
    scoring: Arc<ScoringEngine>,
    clock: Arc<dyn Clock>,
    clip_callback: Option<ClipCallback>,
    last_clip_time_ms: i64,
    in_cooldown: bool,
}

impl ClipDetector {
    pub fn new(
        config: ClipDetectorConfig,
        matcher: Arc<KeywordMatcher>,
        scoring: Arc<ScoringEngine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            // Retention is intentionally wider than any clip window, so
            // range queries around an emission stay answerable.
            buffer: ChatBuffer::new(buffer::DEFAULT_MAX_DURATION_SECS, Arc::clone(&clock)),
            spike: SpikeDetector::new(spike::DEFAULT_WINDOW_SIZE, spike::DEFAULT_THRESHOLD_SIGMA),
            matcher,
            scoring,
            clock,
            clip_callback: None,
            last_clip_time_ms: 0,
            in_cooldown: false,
        }
    }

    /// Register the clip sink. Replaces any previous callback.
    pub fn on_clip(&mut self, callback: ClipCallback) {
        self.clip_callback = Some(callback);
    }

    pub fn process_message(&mut self, message: ChatMessage) {
        self.buffer.add_message(message);

        let rate = self.buffer.message_rate(RATE_WINDOW_SECS);
        self.spike.add_sample(rate);

        self.evaluate();
    }

    /// Score the current state and emit if it qualifies. Called from
    /// `process_message`; also callable directly to force an evaluation.
    pub fn evaluate(&mut self) {
        if self.check_cooldown() {
            return;
        }

        let spike_score = self.spike.spike_intensity();

        let recent = self.buffer.window(KEYWORD_LOOKBACK_SECS);
        let mut keyword_scores: HashMap<String, f64> = HashMap::new();
        let mut matched_keywords: Vec<String> = Vec::new();
        for message in &recent {
            for hit in self.matcher.matches(&message.content) {
                let entry = keyword_scores.entry(hit.category).or_insert(0.0);
                if hit.score > *entry {
                    *entry = hit.score;
                }
                matched_keywords.push(hit.keyword);
            }
        }

        let score = self
            .scoring
            .calculate_score(spike_score, &keyword_scores, UNIQUENESS_SCORE);
        if !self.scoring.should_trigger_clip(score) {
            return;
        }

        let now_ms = self.clock.now_ms();
        let end_ms = now_ms + (self.config.lookback_secs as i64) * 1_000;
        let start_ms = end_ms - (self.config.clip_duration_secs as i64) * 1_000;
        let category = matched_keywords
            .first()
            .map(|keyword| ClipCategory::for_keyword(keyword))
            .unwrap_or(ClipCategory::Spike);

        let event = ClipEvent {
            start_ms,
            end_ms,
            score,
            keywords: matched_keywords,
            category,
        };

        tracing::debug!(
            score,
            category = event.category.as_str(),
            keywords = event.keywords.len(),
            "clip detected"
        );

        if let Some(callback) = self.clip_callback.as_mut() {
            callback(&event);
        }

        self.last_clip_time_ms = now_ms;
        self.in_cooldown = true;
    }

    /// Whether the refractory period after the last emission is still
    /// running. The latch is only armed by an emission, so before the
    /// first clip this is always false.
    fn check_cooldown(&self) -> bool {
        if !self.in_cooldown {
            return false;
        }
        let elapsed_ms = self.clock.now_ms() - self.last_clip_time_ms;
        elapsed_ms < (self.config.cooldown_secs as i64) * 1_000
    }

    pub fn last_clip_time_ms(&self) -> i64 {
        self.last_clip_time_ms
    }

    /// Read access for auxiliary observers; all queries return snapshots.
    pub fn buffer(&self) -> &ChatBuffer {
        &self.buffer
    }

    /// Drop expired messages, clear spike history, and disarm the
    /// cooldown. Unexpired messages are retained.
    pub fn reset(&mut self) {
        self.buffer.cleanup();
        self.spike.reset();
        self.last_clip_time_ms = 0;
        self.in_cooldown = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::detect::scoring::ScoringConfig;
    use std::sync::Mutex;

    const T0: i64 = 1_700_000_000_000;

    struct Harness {
        clock: Arc<ManualClock>,
        detector: ClipDetector,
        events: Arc<Mutex<Vec<ClipEvent>>>,
    }

    fn harness(min_clip_score: f64) -> Harness {
        let clock = Arc::new(ManualClock::new(T0));
        let matcher = Arc::new(KeywordMatcher::with_default_categories());
        let scoring = Arc::new(ScoringEngine::new(ScoringConfig {
            min_clip_score,
            ..ScoringConfig::default()
        }));
        let mut detector = ClipDetector::new(
            ClipDetectorConfig::default(),
            matcher,
            scoring,
            clock.clone(),
        );

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        detector.on_clip(Box::new(move |event| {
            sink.lock().unwrap().push(event.clone());
        }));

        Harness {
            clock,
            detector,
            events,
        }
    }

    impl Harness {
        /// Set the clock to the message timestamp and process it.
        fn feed(&mut self, offset_ms: i64, content: &str) {
            self.clock.set(T0 + offset_ms);
            self.detector.process_message(ChatMessage {
                timestamp_ms: T0 + offset_ms,
                username: "viewer".to_string(),
                content: content.to_string(),
            });
        }

        fn events(&self) -> Vec<ClipEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    #[test]
    fn keyword_stream_triggers_win_clip() {
        let mut h = harness(0.7);
        for i in 0..10 {
            h.feed(i * 1_000, "W");
        }

        let events = h.events();
        assert_eq!(events.len(), 1, "cooldown should hold after the first clip");

        let event = &events[0];
        assert_eq!(event.category, ClipCategory::Win);
        assert!(event.keywords.iter().any(|kw| kw == "W"));
        assert!(event.score >= 0.7);
        assert_eq!(event.end_ms - event.start_ms, 60_000);
        // end = emission time + lookback
        assert_eq!(event.end_ms, h.detector.last_clip_time_ms() + 30_000);
    }

    #[test]
    fn rate_burst_alone_triggers_spike_clip() {
        // A keyword-free stream tops out at spike*0.4 + uniqueness*0.1,
        // so the trigger threshold sits below that ceiling here.
        let mut h = harness(0.45);

        // 10 msg/s baseline for 30 s, then a 100 msg/s burst.
        for i in 0..300 {
            h.feed(i * 100, "hi");
        }
        for i in 0..100 {
            h.feed(30_000 + i * 10, "hi");
        }

        let events = h.events();
        assert_eq!(events.len(), 1, "one clip per burst inside the cooldown");

        let event = &events[0];
        assert_eq!(event.category, ClipCategory::Spike);
        assert!(event.keywords.is_empty());
        assert!(event.score >= 0.45);
        assert_eq!(event.end_ms - event.start_ms, 60_000);
    }

    #[test]
    fn quiet_keyword_free_stream_never_emits() {
        let mut h = harness(0.7);
        for i in 0..100 {
            h.feed(i * 1_000, "just chatting");
        }
        assert!(h.events().is_empty());
    }

    #[test]
    fn cooldown_suppresses_then_releases() {
        let mut h = harness(0.7);

        // Steady "W" stream: first clip lands a few seconds in.
        for i in 0..41 {
            h.feed(i * 1_000, "W");
        }
        assert_eq!(h.events().len(), 1, "steady stream stays suppressed");
        let first = h.events()[0].clone();

        // A rate burst after the cooldown expired re-triggers.
        for i in 0..20 {
            h.feed(41_000 + i * 100, "W");
        }
        let events = h.events();
        assert_eq!(events.len(), 2);

        let second = &events[1];
        let gap_ms = (second.end_ms - 30_000) - (first.end_ms - 30_000);
        assert!(gap_ms >= 30_000, "emissions {gap_ms} ms apart");
        assert!(second.start_ms >= first.start_ms, "start times non-decreasing");
    }

    #[test]
    fn reset_disarms_cooldown_and_spike_history() {
        let mut h = harness(0.7);
        for i in 0..5 {
            h.feed(i * 1_000, "W");
        }
        assert_eq!(h.events().len(), 1);

        h.detector.reset();
        assert_eq!(h.detector.last_clip_time_ms(), 0);

        // Still well inside the first clip's cooldown window, but the
        // reset detector re-arms from scratch.
        for i in 5..9 {
            h.feed(i * 1_000, "W");
        }
        assert_eq!(h.events().len(), 2);
    }

    #[test]
    fn reset_retains_unexpired_messages() {
        let mut h = harness(0.7);
        h.feed(0, "hello");
        h.feed(1_000, "there");
        h.detector.reset();
        assert_eq!(h.detector.buffer().len(), 2);
    }

    #[test]
    fn emission_works_without_callback() {
        let clock = Arc::new(ManualClock::new(T0));
        let matcher = Arc::new(KeywordMatcher::with_default_categories());
        let scoring = Arc::new(ScoringEngine::default());
        let mut detector = ClipDetector::new(
            ClipDetectorConfig::default(),
            matcher,
            scoring,
            clock.clone(),
        );

        for i in 0..10 {
            clock.set(T0 + i * 1_000);
            detector.process_message(ChatMessage {
                timestamp_ms: T0 + i * 1_000,
                username: "viewer".to_string(),
                content: "W".to_string(),
            });
        }
        assert!(detector.last_clip_time_ms() > 0);
    }

    #[test]
    fn keywords_accumulate_across_lookback_in_buffer_order() {
        let mut h = harness(0.7);
        h.feed(0, "pog");
        h.feed(1_000, "W");
        h.feed(2_000, "W");
        h.feed(3_000, "W");

        let events = h.events();
        assert_eq!(events.len(), 1);
        // Scan order: one hit per matching message, duplicates kept.
        assert_eq!(events[0].keywords, ["pog", "W", "W", "W"]);
        // Category comes from the first matched keyword.
        assert_eq!(events[0].category, ClipCategory::Win);
    }
}
