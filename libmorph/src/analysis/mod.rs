//! Frame analysis: autocorrelation, Levinson-Durbin, gain
//!
//! The allocation-free entry points (`autocorrelate_into`, `levinson_durbin`,
//! `synthesis_gain`) are what the real-time engine calls every hop. The
//! allocating helpers are for offline use.

pub mod highpass;
pub mod lpc;

pub use highpass::OnePoleHighpass;
pub use lpc::{
    all_pole_filter, analyze_frame, autocorrelate_into, autocorrelation, is_stable,
    levinson_durbin, residual_energy, synthesis_gain, LpcFrame, DEGENERATE_ENERGY_RATIO,
};
