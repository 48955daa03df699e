//! All-pole synthesis with a circular output history

/// Last `order` synthesized samples.
///
/// `pos` points at the newest value; `values[(pos + k - 1) % order]` is the
/// output `k` samples back. Storage is sized for the largest order so
/// switching order never allocates.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRing {
    values: Vec<f64>,
    pos: usize,
    order: usize,
}

impl HistoryRing {
    pub fn new(max_order: usize, order: usize) -> Self {
        let max_order = max_order.max(1);
        HistoryRing {
            values: vec![0.0; max_order],
            pos: 0,
            order: order.clamp(1, max_order),
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// change the active order, history is cleared
    pub fn set_order(&mut self, order: usize) {
        self.order = order.clamp(1, self.values.len());
        self.reset();
    }

    pub fn reset(&mut self) {
        self.values.fill(0.0);
        self.pos = 0;
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    /// sum(alphas[k] * y[n-k]) for k in 1..=order
    #[inline]
    pub fn feedback(&self, alphas: &[f64]) -> f64 {
        let order = self.order;
        let mut acc = 0.0;
        for k in 1..=order {
            acc += alphas[k] * self.values[(self.pos + k - 1) % order];
        }
        acc
    }

    #[inline]
    pub fn push(&mut self, y: f64) {
        self.pos = (self.pos + self.order - 1) % self.order;
        self.values[self.pos] = y;
    }
}

/// Synthesize one frame through 1/A(z).
///
/// `excitation(n)` supplies the n-th excitation sample, scaled by `gain`.
/// The history is cleared afterwards so every frame starts from rest.
pub fn synthesize_frame<F>(
    alphas: &[f64],
    gain: f64,
    history: &mut HistoryRing,
    out: &mut [f64],
    mut excitation: F,
) where
    F: FnMut(usize) -> f64,
{
    for (n, slot) in out.iter_mut().enumerate() {
        let e = gain * excitation(n);
        let y = e - history.feedback(alphas);
        history.push(y);
        *slot = y;
    }
    history.reset();
}
