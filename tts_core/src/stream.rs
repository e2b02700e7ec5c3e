//! Streaming input helpers.
//!
//! The realtime endpoint expects text to arrive in small pieces with a short
//! gap between sends. [`TextPacing`] holds the slice bound and delay, and
//! [`slice_text`] splits input on character boundaries so no slice exceeds
//! the bound.

use std::time::Duration;

/// Maximum characters per `input_text_buffer.append` message.
pub const DEFAULT_SLICE_CHARS: usize = 80;
/// Delay between consecutive append messages.
pub const DEFAULT_PACING: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPacing {
    pub max_chars: usize,
    pub delay: Duration,
}

impl Default for TextPacing {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_SLICE_CHARS,
            delay: DEFAULT_PACING,
        }
    }
}

impl TextPacing {
    pub fn new(max_chars: usize, delay: Duration) -> Self {
        Self {
            max_chars: max_chars.max(1),
            delay,
        }
    }
}

/// Split `text` into consecutive slices of at most `max_chars` characters.
///
/// Counts Unicode scalar values, so multi-byte characters are never split.
/// An empty input yields no slices.
pub fn slice_text(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut slices = Vec::with_capacity(text.len() / max_chars + 1);
    let mut start = 0usize;
    let mut count = 0usize;

    for (idx, _) in text.char_indices() {
        if count == max_chars {
            slices.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        slices.push(&text[start..]);
    }
    slices
}
