//! Output state classification for the child's terminal stream.
//!
//! A chunk boundary can split a multi-byte character or a marker across two
//! reads. Chunks are classified as they arrive without reassembly, so such a
//! marker is missed until the child redraws it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use super::rules::{self, Effect};
use crate::models::{ButtonConfig, UiMode};

/// Number of decoded characters kept in the rolling buffer.
pub const BUFFER_CAPACITY: usize = 2000;

/// Classifier state, mutated only through `ingest`.
#[derive(Debug)]
pub struct OutputState {
    mode: UiMode,
    model: String,
    prompt: String,
    buffer: VecDeque<char>,
    capacity: usize,
    last_update: SystemTime,
}

/// Point-in-time view of the classifier, as served on `/state`.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub mode: UiMode,
    pub model: String,
    pub prompt: String,
    /// Seconds since the Unix epoch.
    pub last_update: f64,
    pub buffer_size: usize,
    pub button_config: ButtonConfig,
}

impl OutputState {
    pub fn new() -> Self {
        Self::with_capacity(BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            mode: UiMode::Unknown,
            model: "unknown".to_string(),
            prompt: String::new(),
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            last_update: SystemTime::now(),
        }
    }

    /// Decode a raw chunk, append it to the rolling buffer and re-evaluate state.
    pub fn ingest(&mut self, chunk: &[u8]) {
        let text = String::from_utf8_lossy(chunk);

        self.buffer.extend(text.chars());
        if self.buffer.len() > self.capacity {
            let excess = self.buffer.len() - self.capacity;
            self.buffer.drain(..excess);
        }
        self.last_update = SystemTime::now();

        // Mode and model come from this chunk only
        if let Some(rule) = rules::classify(&text) {
            tracing::trace!(rule = rule.name, "chunk classified");
            match rule.effect {
                Effect::SetMode(mode) => self.mode = mode,
                Effect::SetModel(model) => self.model = model.to_string(),
            }
        }

        // The prompt is recomputed from the whole buffer every time
        let buffered: String = self.buffer.iter().collect();
        if let Some(prompt) = extract_prompt(&buffered) {
            self.prompt = prompt;
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let last_update = self
            .last_update
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        StateSnapshot {
            mode: self.mode,
            model: self.model.clone(),
            prompt: self.prompt.clone(),
            last_update,
            buffer_size: self.buffer.len(),
            button_config: ButtonConfig::for_mode(self.mode),
        }
    }
}

impl Default for OutputState {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to the classifier.
///
/// The multiplexer is the only caller of `ingest`; the control surface only
/// takes snapshots. A snapshot may miss a chunk that is being ingested
/// concurrently.
#[derive(Debug, Clone, Default)]
pub struct StateHandle {
    inner: Arc<Mutex<OutputState>>,
}

impl StateHandle {
    pub fn new(state: OutputState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    pub fn ingest(&self, chunk: &[u8]) {
        self.lock().ingest(chunk);
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.lock().snapshot()
    }

    fn lock(&self) -> MutexGuard<'_, OutputState> {
        // A panic mid-ingest leaves the state readable; keep serving it
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Find the most recent prompt line in `buffer`.
///
/// Lines are ANSI-stripped and trimmed; the last non-empty line that contains
/// `>` and does not start with `[` wins.
pub fn extract_prompt(buffer: &str) -> Option<String> {
    let clean = strip_ansi_codes(buffer);
    clean
        .split('\n')
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty() && line.contains('>') && !line.starts_with('['))
        .map(str::to_string)
}

/// Strip ANSI escape sequences from a string for reliable text matching
pub fn strip_ansi_codes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // Skip ESC and the following sequence
            if let Some(&next) = chars.peek() {
                if next == '[' {
                    chars.next(); // consume '['
                    // Parameters and intermediates run until a final byte in 0x40..=0x7e
                    for ch in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&ch) {
                            break;
                        }
                    }
                } else if next == ']' {
                    // OSC sequence - skip until BEL or ST (ESC \)
                    chars.next();
                    while let Some(ch) = chars.next() {
                        if ch == '\x07' {
                            break;
                        }
                        if ch == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}
