use std::f64::consts::PI;

/// One-pole high-pass, y[n] = a * (y[n-1] + x[n] - x[n-1])
#[derive(Debug, Clone, PartialEq)]
pub struct OnePoleHighpass {
    alpha: f64,
    prev_input: f64,
    prev_output: f64,
}

impl OnePoleHighpass {
    pub fn new(cutoff_hz: f64, sample_rate: u32) -> Self {
        let dt = 1.0 / sample_rate as f64;
        let rc = 1.0 / (2.0 * PI * cutoff_hz);
        OnePoleHighpass {
            alpha: rc / (rc + dt),
            prev_input: 0.0,
            prev_output: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.prev_input = 0.0;
        self.prev_output = 0.0;
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.alpha * (self.prev_output + input - self.prev_input);
        self.prev_input = input;
        self.prev_output = output;
        output
    }

    /// Filter a whole frame from a clean state.
    pub fn process_frame(&mut self, frame: &mut [f64]) {
        self.reset();
        for s in frame.iter_mut() {
            *s = self.process(*s);
        }
    }
}
