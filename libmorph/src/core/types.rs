//! common types for the lpc engine

use serde::{Deserialize, Serialize};

use super::error::{LpcError, LpcResult};

// constants

/// default sample rate
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// lowest predictor order
pub const MIN_ORDER: usize = 1;

/// highest predictor order exposed as a parameter
pub const MAX_ORDER: usize = 32;

/// frame duration range in milliseconds
pub const MIN_FRAME_DURATION_MS: f64 = 1.0;
pub const MAX_FRAME_DURATION_MS: f64 = 10.0;

/// smallest excitation segment, as a fraction of the excitation length
pub const MIN_EX_PERCENTAGE: f32 = 0.001;

/// wet gain range in dB
pub const MIN_WET_GAIN_DB: f32 = -40.0;
pub const MAX_WET_GAIN_DB: f32 = 6.0;

/// default ring buffer capacity
pub const DEFAULT_BUFFER_LEN: usize = 4096;

/// cutoff used when the analysis high-pass is switched on without a value
pub const DEFAULT_HIGHPASS_HZ: f64 = 60.0;

// types

/// where the synthesis gain comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GainMode {
    /// sqrt of the residual prediction energy
    #[default]
    Residual,
    /// unit gain, then rescale the synthesized frame to the input frame's RMS
    MatchInputRms,
}

/// which signal drives the all-pole filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcitationKind {
    /// looping segment of the selected excitation buffer
    Internal,
    /// frame-aligned sidechain samples
    Sidechain,
}

/// Static engine configuration.
///
/// `order` can move at runtime up to `max_order`; everything that sizes a
/// buffer needs [`LpcEngine::set_config`](crate::LpcEngine::set_config).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub channels: usize,
    pub order: usize,
    pub max_order: usize,
    pub frame_len: usize,
    pub hop_size: usize,
    pub buffer_len: usize,
    pub excitation_len: usize,
    pub sample_rate: u32,
    /// one-pole high-pass on the analysis frame, None = off
    pub analysis_highpass_hz: Option<f64>,
    pub gain_mode: GainMode,
    /// fold samples beyond full scale back to +/-0.5
    pub limit_output: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let frame_len = (DEFAULT_SAMPLE_RATE as f64 * MAX_FRAME_DURATION_MS / 1000.0) as usize;
        EngineConfig {
            channels: 2,
            order: MAX_ORDER,
            max_order: MAX_ORDER,
            frame_len,
            hop_size: frame_len / 2,
            buffer_len: DEFAULT_BUFFER_LEN,
            excitation_len: DEFAULT_SAMPLE_RATE as usize / 6,
            sample_rate: DEFAULT_SAMPLE_RATE,
            analysis_highpass_hz: None,
            gain_mode: GainMode::Residual,
            limit_output: true,
        }
    }
}

impl EngineConfig {
    /// minimal config, max_order follows order
    pub fn new(
        channels: usize,
        order: usize,
        frame_len: usize,
        hop_size: usize,
        buffer_len: usize,
        excitation_len: usize,
        sample_rate: u32,
    ) -> Self {
        EngineConfig {
            channels,
            order,
            max_order: order,
            frame_len,
            hop_size,
            buffer_len,
            excitation_len,
            sample_rate,
            ..Default::default()
        }
    }

    /// Derive frame, hop and buffer sizes from a frame duration.
    ///
    /// Hop is half a frame; the ring capacity is the next power of two that
    /// holds two frames plus two hops.
    pub fn from_frame_duration(
        sample_rate: u32,
        frame_ms: f64,
        order: usize,
        channels: usize,
    ) -> LpcResult<Self> {
        if !(MIN_FRAME_DURATION_MS..=MAX_FRAME_DURATION_MS).contains(&frame_ms) {
            return Err(LpcError::InvalidConfig(format!(
                "frame duration {frame_ms} ms outside {MIN_FRAME_DURATION_MS}-{MAX_FRAME_DURATION_MS} ms"
            )));
        }
        let frame_len = (frame_ms * sample_rate as f64 / 1000.0) as usize;
        let hop_size = (frame_len / 2).max(1);
        let config = EngineConfig {
            channels,
            order,
            max_order: order.max(MAX_ORDER.min(frame_len.saturating_sub(1))),
            frame_len,
            hop_size,
            buffer_len: (2 * (frame_len + hop_size)).next_power_of_two(),
            excitation_len: (sample_rate as usize / 6).max(1),
            sample_rate,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self.max_order = self.max_order.max(order);
        self
    }

    pub fn with_max_order(mut self, max_order: usize) -> Self {
        self.max_order = max_order;
        self
    }

    pub fn with_highpass(mut self, cutoff_hz: Option<f64>) -> Self {
        self.analysis_highpass_hz = cutoff_hz;
        self
    }

    pub fn with_gain_mode(mut self, mode: GainMode) -> Self {
        self.gain_mode = mode;
        self
    }

    pub fn with_output_limit(mut self, enabled: bool) -> Self {
        self.limit_output = enabled;
        self
    }

    /// check every static invariant
    pub fn validate(&self) -> LpcResult<()> {
        let fail = |msg: String| Err(LpcError::InvalidConfig(msg));

        if self.channels == 0 {
            return fail("channel count must be at least 1".into());
        }
        if self.sample_rate == 0 {
            return fail("sample rate must be positive".into());
        }
        if self.order < MIN_ORDER {
            return fail(format!("order must be at least {MIN_ORDER}"));
        }
        if self.order > self.max_order {
            return fail(format!(
                "order {} exceeds max order {}",
                self.order, self.max_order
            ));
        }
        if self.max_order >= self.frame_len {
            return fail(format!(
                "max order {} must be below frame length {}",
                self.max_order, self.frame_len
            ));
        }
        if self.hop_size == 0 || self.hop_size > self.frame_len {
            return fail(format!(
                "hop size {} must be in 1..={}",
                self.hop_size, self.frame_len
            ));
        }
        if self.buffer_len <= self.frame_len + self.hop_size {
            return fail(format!(
                "buffer length {} must exceed frame length + hop size ({})",
                self.buffer_len,
                self.frame_len + self.hop_size
            ));
        }
        if self.excitation_len == 0 {
            return fail("excitation length must be at least 1".into());
        }
        if let Some(hz) = self.analysis_highpass_hz {
            if !(hz > 0.0 && hz < self.sample_rate as f64 / 2.0) {
                return fail(format!("high-pass cutoff {hz} Hz outside (0, nyquist)"));
            }
        }
        Ok(())
    }

    /// parse and validate a json config
    pub fn from_json(json: &str) -> LpcResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> LpcResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// frame duration in milliseconds
    pub fn frame_duration_ms(&self) -> f64 {
        self.frame_len as f64 * 1000.0 / self.sample_rate as f64
    }

    /// dry path delay in samples
    pub fn latency(&self) -> usize {
        self.frame_len
    }
}

/// dB to linear gain
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}
