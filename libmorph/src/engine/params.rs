//! Block parameters, runtime reconfiguration and the lock-free parameter store

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::core::{MAX_ORDER, MAX_WET_GAIN_DB, MIN_EX_PERCENTAGE, MIN_ORDER, MIN_WET_GAIN_DB};

/// Values that may change from block to block.
///
/// Read once at the start of `process`; nothing here is held between calls
/// except what the engine itself derives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockParams {
    /// 0 = dry only, 1 = wet only
    pub lpc_mix: f32,
    /// fraction of the excitation buffer that loops
    pub ex_percentage: f32,
    /// where the loop starts, as a fraction of the excitation buffer
    pub ex_start_pos: f32,
    /// linear wet gain at the start of the block
    pub previous_gain: f32,
    /// linear wet gain the block ramps towards
    pub current_gain: f32,
}

impl Default for BlockParams {
    fn default() -> Self {
        BlockParams {
            lpc_mix: 1.0,
            ex_percentage: 1.0,
            ex_start_pos: 0.0,
            previous_gain: 1.0,
            current_gain: 1.0,
        }
    }
}

impl BlockParams {
    /// fully wet at unity gain
    pub fn wet() -> Self {
        Self::default()
    }

    /// fully dry
    pub fn dry() -> Self {
        BlockParams {
            lpc_mix: 0.0,
            ..Self::default()
        }
    }

    pub fn with_mix(mut self, lpc_mix: f32) -> Self {
        self.lpc_mix = lpc_mix;
        self
    }

    pub fn with_gain(mut self, previous: f32, current: f32) -> Self {
        self.previous_gain = previous;
        self.current_gain = current;
        self
    }

    pub fn with_excitation_window(mut self, percentage: f32, start: f32) -> Self {
        self.ex_percentage = percentage;
        self.ex_start_pos = start;
        self
    }

    /// clamp every field into range, non-finite values fall back to defaults
    pub(crate) fn sanitized(&self) -> Self {
        let d = Self::default();
        let pick = |v: f32, fallback: f32| if v.is_finite() { v } else { fallback };
        BlockParams {
            lpc_mix: pick(self.lpc_mix, d.lpc_mix).clamp(0.0, 1.0),
            ex_percentage: pick(self.ex_percentage, d.ex_percentage).clamp(MIN_EX_PERCENTAGE, 1.0),
            ex_start_pos: pick(self.ex_start_pos, d.ex_start_pos).clamp(0.0, 1.0),
            previous_gain: pick(self.previous_gain, 0.0),
            current_gain: pick(self.current_gain, 0.0),
        }
    }
}

/// Runtime changes applied between blocks.
///
/// `None` leaves a setting alone. For `excitation`, `Some(None)` deselects
/// the internal excitation and the engine falls back to pass-through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconfigure {
    pub order: Option<usize>,
    pub hop_size: Option<usize>,
    pub excitation: Option<Option<usize>>,
}

impl Reconfigure {
    pub fn order(order: usize) -> Self {
        Reconfigure {
            order: Some(order),
            ..Default::default()
        }
    }

    pub fn hop_size(hop_size: usize) -> Self {
        Reconfigure {
            hop_size: Some(hop_size),
            ..Default::default()
        }
    }

    pub fn excitation(index: Option<usize>) -> Self {
        Reconfigure {
            excitation: Some(index),
            ..Default::default()
        }
    }

    pub fn with_order(mut self, order: usize) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_hop_size(mut self, hop_size: usize) -> Self {
        self.hop_size = Some(hop_size);
        self
    }

    pub fn with_excitation(mut self, index: Option<usize>) -> Self {
        self.excitation = Some(index);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_none() && self.hop_size.is_none() && self.excitation.is_none()
    }
}

/// f32 stored as its bit pattern
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl Default for AtomicF32 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

const NO_EXCITATION: usize = usize::MAX;

/// Parameters written by a control thread and read by the audio thread.
///
/// Every field is a relaxed atomic; the audio side takes one
/// [`ParamSnapshot`] per block.
#[derive(Debug)]
pub struct SharedParams {
    lpc_mix: AtomicF32,
    ex_percentage: AtomicF32,
    ex_start_pos: AtomicF32,
    wet_gain_db: AtomicF32,
    order: AtomicUsize,
    excitation: AtomicUsize,
}

/// One consistent-enough read of [`SharedParams`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSnapshot {
    pub lpc_mix: f32,
    pub ex_percentage: f32,
    pub ex_start_pos: f32,
    pub wet_gain_db: f32,
    pub order: usize,
    pub excitation: Option<usize>,
}

impl Default for SharedParams {
    fn default() -> Self {
        SharedParams {
            lpc_mix: AtomicF32::new(0.0),
            ex_percentage: AtomicF32::new(1.0),
            ex_start_pos: AtomicF32::new(0.0),
            wet_gain_db: AtomicF32::new(0.0),
            order: AtomicUsize::new(MAX_ORDER),
            excitation: AtomicUsize::new(0),
        }
    }
}

impl SharedParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_lpc_mix(&self, value: f32) {
        self.lpc_mix.store(value.clamp(0.0, 1.0));
    }

    pub fn set_ex_percentage(&self, value: f32) {
        self.ex_percentage.store(value.clamp(MIN_EX_PERCENTAGE, 1.0));
    }

    pub fn set_ex_start_pos(&self, value: f32) {
        self.ex_start_pos.store(value.clamp(0.0, 1.0));
    }

    pub fn set_wet_gain_db(&self, db: f32) {
        self.wet_gain_db.store(db.clamp(MIN_WET_GAIN_DB, MAX_WET_GAIN_DB));
    }

    /// No upper bound here; the processor clamps to its engine's `max_order`.
    pub fn set_order(&self, order: usize) {
        self.order.store(order.max(MIN_ORDER), Ordering::Relaxed);
    }

    pub fn set_excitation(&self, index: Option<usize>) {
        self.excitation
            .store(index.unwrap_or(NO_EXCITATION), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ParamSnapshot {
        let excitation = self.excitation.load(Ordering::Relaxed);
        ParamSnapshot {
            lpc_mix: self.lpc_mix.load(),
            ex_percentage: self.ex_percentage.load(),
            ex_start_pos: self.ex_start_pos.load(),
            wet_gain_db: self.wet_gain_db.load(),
            order: self.order.load(Ordering::Relaxed),
            excitation: (excitation != NO_EXCITATION).then_some(excitation),
        }
    }
}
