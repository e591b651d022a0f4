// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Frame decoding for the reply stream
//!
//! The server writes one JSON record per frame and separates frames with CRLF.
//! The transport chunks the body independently of those frames, so a frame may
//! arrive split across any number of chunks. `FrameDecoder` keeps a single
//! rolling fragment buffer and retries parsing as more segments arrive.

use serde::{Deserialize, Serialize};

/// Separator between frames on the wire
pub const RECORD_SEPARATOR: &str = "\r\n";

/// Default cap on the size of a buffered, not yet parseable fragment
pub const DEFAULT_MAX_PENDING_BYTES: usize = 16 * 1024 * 1024;

/// One decoded frame of the reply stream.
///
/// Each field is independent: `None` means "no update of that kind in this
/// frame". An event with neither field is valid and changes nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Assistant commentary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Full replacement content for the artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

impl StreamEvent {
    /// Event carrying only assistant commentary
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            artifact: None,
        }
    }

    /// Event carrying only an artifact replacement
    pub fn artifact(content: impl Into<String>) -> Self {
        Self {
            message: None,
            artifact: Some(content.into()),
        }
    }

    /// True when the event carries no update at all
    pub fn is_empty(&self) -> bool {
        self.message.is_none() && self.artifact.is_none()
    }

    /// Encode as a wire frame, separator included
    pub fn to_frame(&self) -> String {
        // Serializing two optional strings cannot fail.
        let mut frame = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        frame.push_str(RECORD_SEPARATOR);
        frame
    }
}

/// Counters describing what the decoder has seen so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Chunks fed to the decoder
    pub chunks: usize,
    /// Frames parsed and emitted
    pub frames_emitted: usize,
    /// Segments that did not complete a frame and were buffered
    pub fragments_buffered: usize,
    /// Fragments discarded without ever parsing (malformed frames)
    pub fragments_dropped: usize,
    /// Total size of discarded fragments
    pub dropped_bytes: usize,
}

/// Incremental decoder turning raw chunks into `StreamEvent`s
#[derive(Debug)]
pub struct FrameDecoder {
    /// Head of a frame whose tail has not arrived yet
    pending: String,
    /// Tail of the last chunk held back: an unfinished UTF-8 sequence, or a
    /// CR that may start a separator
    carry: Vec<u8>,
    /// Skipping the remainder of an oversized frame up to the next separator
    discarding: bool,
    max_pending_bytes: usize,
    stats: DecoderStats,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_pending(DEFAULT_MAX_PENDING_BYTES)
    }

    /// Create a decoder that drops any frame growing beyond `max_pending_bytes`
    pub fn with_max_pending(max_pending_bytes: usize) -> Self {
        Self {
            pending: String::new(),
            carry: Vec::new(),
            discarding: false,
            max_pending_bytes,
            stats: DecoderStats::default(),
        }
    }

    /// The buffered fragment, empty when the last segment completed a frame
    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Feed one chunk and return the events it completed, in wire order.
    ///
    /// Incomplete frames are buffered, never reported as errors. A frame that
    /// grows past the pending cap is dropped along with the rest of its
    /// segment, and decoding resumes after the next separator.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.stats.chunks += 1;
        let text = self.decode_text(chunk);
        let mut events = Vec::new();
        let mut rest = text.as_str();

        loop {
            if self.discarding {
                match rest.find(RECORD_SEPARATOR) {
                    Some(at) => {
                        self.stats.dropped_bytes += at;
                        self.discarding = false;
                        rest = &rest[at + RECORD_SEPARATOR.len()..];
                    }
                    None => {
                        self.stats.dropped_bytes += rest.len();
                        break;
                    }
                }
            }

            match rest.find(RECORD_SEPARATOR) {
                Some(at) => {
                    self.push_segment(&rest[..at], true, &mut events);
                    rest = &rest[at + RECORD_SEPARATOR.len()..];
                }
                None => {
                    self.push_segment(rest, false, &mut events);
                    break;
                }
            }
        }

        events
    }

    fn push_segment(&mut self, segment: &str, terminated: bool, events: &mut Vec<StreamEvent>) {
        if segment.is_empty() {
            return;
        }
        // Whitespace between frames is noise, but inside a pending
        // fragment it may belong to a string value.
        if self.pending.is_empty() && segment.trim().is_empty() {
            return;
        }

        self.pending.push_str(segment);
        // Checked before parsing so the outcome does not depend on where
        // the transport cut the frame.
        if self.pending.len() > self.max_pending_bytes {
            tracing::warn!(
                target: "composer.protocol",
                bytes = self.pending.len(),
                limit = self.max_pending_bytes,
                "frame exceeded pending limit, dropping it"
            );
            self.drop_pending();
            self.discarding = !terminated;
            return;
        }

        match parse_frame(&self.pending) {
            Some(event) => {
                self.pending.clear();
                self.stats.frames_emitted += 1;
                events.push(event);
            }
            None => self.stats.fragments_buffered += 1,
        }
    }

    /// Signal end of stream. Returns the fragment that could not be completed, if any.
    pub fn finish(&mut self) -> Option<String> {
        self.discarding = false;
        if !self.carry.is_empty() {
            let tail = std::mem::take(&mut self.carry);
            if !self.pending.is_empty() {
                self.pending.push_str(&String::from_utf8_lossy(&tail));
            }
        }

        if self.pending.is_empty() {
            return None;
        }

        tracing::debug!(
            target: "composer.protocol",
            bytes = self.pending.len(),
            fragment = %preview(&self.pending),
            "stream ended with incomplete frame, dropping it"
        );
        Some(self.drop_pending())
    }

    /// Decode a complete sequence of chunks in one shot
    pub fn decode_all<'a, I>(chunks: I) -> Vec<StreamEvent>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut decoder = Self::new();
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(decoder.feed(chunk));
        }
        decoder.finish();
        events
    }

    fn drop_pending(&mut self) -> String {
        self.stats.fragments_dropped += 1;
        self.stats.dropped_bytes += self.pending.len();
        std::mem::take(&mut self.pending)
    }

    /// Decode a chunk as text, holding back a trailing CR or an unfinished
    /// UTF-8 sequence until the next chunk completes it
    fn decode_text(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.carry);
        bytes.extend_from_slice(chunk);

        let split = if bytes.last() == Some(&b'\r') {
            bytes.len() - 1
        } else {
            bytes.len() - incomplete_utf8_tail(&bytes)
        };
        self.carry = bytes.split_off(split);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Parse a complete frame. Only JSON objects are frames.
fn parse_frame(text: &str) -> Option<StreamEvent> {
    if !text.trim_start().starts_with('{') {
        return None;
    }
    serde_json::from_str(text).ok()
}

/// Length of a UTF-8 sequence cut off at the end of `bytes`, 0 if none
fn incomplete_utf8_tail(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(3) {
        let byte = bytes[len - back];
        if byte & 0b1100_0000 == 0b1000_0000 {
            continue;
        }
        let needed = if byte & 0b1110_0000 == 0b1100_0000 {
            2
        } else if byte & 0b1111_0000 == 0b1110_0000 {
            3
        } else if byte & 0b1111_1000 == 0b1111_0000 {
            4
        } else {
            1
        };
        return if needed > back { back } else { 0 };
    }
    0
}

fn preview(text: &str) -> String {
    const MAX: usize = 80;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX).collect();
        format!("{}...", head)
    }
}
