//! Fixed-capacity circular sample store
//!
//! Every pointer in the engine that walks a buffer goes through [`RingBuffer`]
//! so wraparound lives in one place.

/// Circular buffer with independent write and read pointers.
///
/// For the input ring only the write side is used (`write`, `peek_behind`,
/// `copy_recent`). The output ring uses the write pointer as the overlap-add
/// deposit offset and the read pointer for `read_and_clear`.
#[derive(Debug, Clone, PartialEq)]
pub struct RingBuffer {
    data: Vec<f64>,
    write_pos: usize,
    read_pos: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be positive");
        RingBuffer {
            data: vec![0.0; capacity],
            write_pos: 0,
            read_pos: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    #[inline]
    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    /// wrap an index that may have run past capacity
    #[inline]
    pub fn wrap(&self, index: usize) -> usize {
        index % self.data.len()
    }

    /// store at the write pointer, then advance it
    #[inline]
    pub fn write(&mut self, value: f64) {
        self.data[self.write_pos] = value;
        self.write_pos = self.wrap(self.write_pos + 1);
    }

    /// value at the read pointer, zeroed after reading
    #[inline]
    pub fn read_and_clear(&mut self) -> f64 {
        let value = std::mem::take(&mut self.data[self.read_pos]);
        self.read_pos = self.wrap(self.read_pos + 1);
        value
    }

    /// The sample written `delay` writes ago (`delay = 1` is the newest).
    #[inline]
    pub fn peek_behind(&self, delay: usize) -> f64 {
        let cap = self.capacity();
        self.data[(self.write_pos + cap - delay % cap) % cap]
    }

    /// add into the slot `offset` past the write pointer
    #[inline]
    pub fn accumulate_ahead(&mut self, offset: usize, value: f64) {
        let idx = self.wrap(self.write_pos + offset % self.capacity());
        self.data[idx] += value;
    }

    #[inline]
    pub fn advance_write(&mut self, count: usize) {
        self.write_pos = self.wrap(self.write_pos + count % self.capacity());
    }

    /// Move the write pointer to `offset` samples past the read pointer.
    pub fn set_write_ahead_of_read(&mut self, offset: usize) {
        self.write_pos = self.wrap(self.read_pos + offset % self.capacity());
    }

    /// Copy the newest `dest.len()` samples, oldest first.
    pub fn copy_recent(&self, dest: &mut [f64]) {
        let cap = self.capacity();
        let len = dest.len().min(cap);
        let start = (self.write_pos + cap - len) % cap;
        for (i, slot) in dest.iter_mut().take(len).enumerate() {
            *slot = self.data[(start + i) % cap];
        }
    }

    /// zero `len` slots starting at absolute index `from`
    pub fn zero_span(&mut self, from: usize, len: usize) {
        let cap = self.capacity();
        for i in 0..len.min(cap) {
            self.data[(from + i) % cap] = 0.0;
        }
    }

    /// zero contents, pointers untouched
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// zero contents and rewind both pointers
    pub fn reset(&mut self) {
        self.clear();
        self.write_pos = 0;
        self.read_pos = 0;
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_wraps() {
        let mut ring = RingBuffer::new(4);
        for i in 0..5 {
            ring.write(i as f64);
        }
        assert_eq!(ring.write_pos(), 1);
        assert_eq!(ring.as_slice(), &[4.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_read_and_clear() {
        let mut ring = RingBuffer::new(3);
        ring.accumulate_ahead(0, 1.5);
        ring.accumulate_ahead(0, 0.5);
        assert_eq!(ring.read_and_clear(), 2.0);
        assert_eq!(ring.as_slice()[0], 0.0);
        assert_eq!(ring.read_pos(), 1);
        ring.read_and_clear();
        ring.read_and_clear();
        assert_eq!(ring.read_pos(), 0);
    }

    #[test]
    fn test_peek_behind() {
        let mut ring = RingBuffer::new(8);
        for i in 1..=10 {
            ring.write(i as f64);
        }
        assert_eq!(ring.peek_behind(1), 10.0);
        assert_eq!(ring.peek_behind(3), 8.0);
        assert_eq!(ring.peek_behind(8), 3.0);
    }

    #[test]
    fn test_copy_recent_is_ordered() {
        let mut ring = RingBuffer::new(5);
        for i in 0..7 {
            ring.write(i as f64);
        }
        let mut frame = [0.0; 4];
        ring.copy_recent(&mut frame);
        assert_eq!(frame, [3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_accumulate_wraps_past_end() {
        let mut ring = RingBuffer::new(4);
        ring.advance_write(3);
        ring.accumulate_ahead(2, 1.0);
        assert_eq!(ring.as_slice(), &[0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_zero_span_wraps() {
        let mut ring = RingBuffer::new(4);
        for _ in 0..4 {
            ring.write(1.0);
        }
        ring.zero_span(3, 2);
        assert_eq!(ring.as_slice(), &[0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_set_write_ahead_of_read() {
        let mut ring = RingBuffer::new(6);
        ring.read_and_clear();
        ring.read_and_clear();
        ring.set_write_ahead_of_read(5);
        assert_eq!(ring.write_pos(), 1);
    }
}
