//! Real-time LPC cross-synthesis
//!
//! [`LpcEngine`] owns per-channel state and does the per-sample work;
//! [`LpcProcessor`] feeds it from a lock-free [`SharedParams`] store.
mod channel;
mod params;
mod processor;
mod resynth;
mod types;

pub use channel::ChannelState;
pub use params::{AtomicF32, BlockParams, ParamSnapshot, Reconfigure, SharedParams};
pub use processor::LpcProcessor;
pub use resynth::LpcEngine;
pub use types::BlockReport;

#[cfg(test)]
mod tests;
