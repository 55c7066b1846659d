use crate::clock::Clock;
use crate::types::ChatMessage;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const DEFAULT_MAX_DURATION_SECS: u64 = 300;

/// Time-bounded, insertion-ordered store of chat messages.
///
/// Messages are appended as they arrive (never reordered, even when a
/// timestamp lags the tail) and expire once they fall `max_duration`
/// behind the clock. Reads take the guard and return snapshots, so
/// observers can query while the pipeline thread appends.
pub struct ChatBuffer {
    state: Mutex<BufferState>,
    clock: Arc<dyn Clock>,
}

struct BufferState {
    messages: VecDeque<ChatMessage>,
    max_duration_ms: i64,
}

impl ChatBuffer {
    pub fn new(max_duration_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(BufferState {
                messages: VecDeque::new(),
                max_duration_ms: (max_duration_secs as i64) * 1_000,
            }),
            clock,
        }
    }

    /// Append and evict anything that has aged out.
    pub fn add_message(&self, message: ChatMessage) {
        let now_ms = self.clock.now_ms();
        let mut state = self.state.lock().unwrap();
        state.messages.push_back(message);
        evict_expired(&mut state, now_ms);
    }

    /// Drop messages older than the retention bound.
    pub fn cleanup(&self) {
        let now_ms = self.clock.now_ms();
        let mut state = self.state.lock().unwrap();
        evict_expired(&mut state, now_ms);
    }

    /// Messages from the trailing `duration_secs` window, in insertion
    /// order.
    pub fn window(&self, duration_secs: u64) -> Vec<ChatMessage> {
        let now_ms = self.clock.now_ms();
        self.window_range(now_ms - (duration_secs as i64) * 1_000, now_ms)
    }

    /// Messages with `timestamp_ms` in `[start_ms, end_ms]` inclusive, in
    /// insertion order.
    pub fn window_range(&self, start_ms: i64, end_ms: i64) -> Vec<ChatMessage> {
        let state = self.state.lock().unwrap();
        state
            .messages
            .iter()
            .filter(|message| message.timestamp_ms >= start_ms && message.timestamp_ms <= end_ms)
            .cloned()
            .collect()
    }

    /// Messages per second over the trailing window; 0.0 when it is empty.
    pub fn message_rate(&self, window_secs: u64) -> f64 {
        let count = self.window(window_secs).len();
        if count == 0 {
            return 0.0;
        }
        count as f64 / window_secs as f64
    }

    /// Apply a new retention bound and evict immediately.
    pub fn set_max_duration(&self, max_duration_secs: u64) {
        let now_ms = self.clock.now_ms();
        let mut state = self.state.lock().unwrap();
        state.max_duration_ms = (max_duration_secs as i64) * 1_000;
        evict_expired(&mut state, now_ms);
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().messages.is_empty()
    }
}

fn evict_expired(state: &mut BufferState, now_ms: i64) {
    let cutoff = now_ms - state.max_duration_ms;
    while state
        .messages
        .front()
        .is_some_and(|message| message.timestamp_ms < cutoff)
    {
        state.messages.pop_front();
    }
}
