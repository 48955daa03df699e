//! Wet/dry mixing, per-block gain ramp and the output guard

/// Linear ramp from the previous block's gain to the current one
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainRamp {
    start: f64,
    step: f64,
}

impl GainRamp {
    pub fn new(previous: f32, current: f32, num_samples: usize) -> Self {
        let start = previous as f64;
        let step = if num_samples == 0 {
            0.0
        } else {
            (current as f64 - start) / num_samples as f64
        };
        GainRamp { start, step }
    }

    /// gain applied to sample `s` of the block
    #[inline]
    pub fn at(&self, s: usize) -> f64 {
        self.start + self.step * s as f64
    }
}

/// `lpc_mix * gain * wet + (1 - lpc_mix) * dry`
#[inline]
pub fn mix(wet: f64, dry: f64, lpc_mix: f64, gain: f64) -> f64 {
    lpc_mix * gain * wet + (1.0 - lpc_mix) * dry
}

/// Keeps the engine from emitting non-finite or runaway samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputGuard {
    limit: bool,
}

impl OutputGuard {
    pub fn new(limit: bool) -> Self {
        OutputGuard { limit }
    }

    /// Returns the sample to emit and whether it had to be altered.
    ///
    /// Non-finite values become 0. With limiting on, anything past full
    /// scale folds to +-0.5.
    #[inline]
    pub fn apply(&self, x: f64) -> (f32, bool) {
        if !x.is_finite() {
            return (0.0, true);
        }
        if self.limit && x.abs() > 1.0 {
            return ((x / (2.0 * x.abs())) as f32, true);
        }
        let y = x as f32;
        if y.is_finite() {
            (y, false)
        } else {
            (0.0, true)
        }
    }
}
