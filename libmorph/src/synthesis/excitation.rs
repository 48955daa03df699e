//! Excitation buffers and the looping read cursor

use std::sync::Arc;

/// The part of an excitation buffer that is actually played.
///
/// Reading starts wherever the cursor is; after `len` samples it rewinds to
/// `start`. Positions at or past `buffer_len` wrap to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExcitationSegment {
    pub start: usize,
    pub len: usize,
    pub buffer_len: usize,
}

impl ExcitationSegment {
    /// `ex_percentage` in (0, 1] sizes the segment, `ex_start_pos` in [0, 1] places it.
    pub fn new(buffer_len: usize, ex_percentage: f32, ex_start_pos: f32) -> Self {
        let buffer_len = buffer_len.max(1);
        let start = (ex_start_pos.clamp(0.0, 1.0) * buffer_len as f32) as usize;
        let len = (ex_percentage.clamp(0.0, 1.0) * buffer_len as f32) as usize;
        ExcitationSegment {
            start: start.min(buffer_len - 1),
            len: len.max(1),
            buffer_len,
        }
    }
}

/// Read position plus the number of samples consumed in the current pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExcitationCursor {
    pos: usize,
    consumed: usize,
}

impl ExcitationCursor {
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// jump to `start` and begin a fresh pass
    pub fn reset(&mut self, start: usize) {
        self.pos = start;
        self.consumed = 0;
    }

    #[inline]
    pub fn next_sample(&mut self, buffer: &[f64], segment: &ExcitationSegment) -> f64 {
        let value = buffer[self.pos];
        self.consumed += 1;
        self.pos += 1;
        if self.consumed >= segment.len {
            self.consumed = 0;
            self.pos = segment.start;
        }
        if self.pos >= segment.buffer_len {
            self.pos = 0;
        }
        value
    }
}

/// Named excitation buffers shared read-only by every channel
#[derive(Debug, Clone, Default)]
pub struct ExcitationBank {
    entries: Vec<(String, Arc<[f64]>)>,
}

impl ExcitationBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// append a buffer, returns its index
    pub fn push(&mut self, name: impl Into<String>, samples: impl Into<Arc<[f64]>>) -> usize {
        self.entries.push((name.into(), samples.into()));
        self.entries.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&[f64]> {
        self.entries.get(index).map(|(_, s)| &s[..])
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|(n, _)| n.as_str())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }

    /// shortest buffer in the bank
    pub fn min_len(&self) -> Option<usize> {
        self.entries.iter().map(|(_, s)| s.len()).min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
