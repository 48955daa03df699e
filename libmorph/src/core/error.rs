//! Error types for the LPC engine

use thiserror::Error;

/// Errors raised by configuration, analysis and block processing.
///
/// Analysis conditions (`DegenerateFrame`, `NegativeResidualEnergy`) are
/// recovered inside the engine: the affected hop contributes silence and the
/// condition is counted in the block report.
#[derive(Error, Debug)]
pub enum LpcError {
    /// Static parameters violate an engine invariant
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration JSON could not be parsed
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Silent frame or a prediction error that collapsed to zero
    #[error("Degenerate analysis frame (zero prediction energy)")]
    DegenerateFrame,

    /// Residual energy came out negative for an ill-conditioned frame
    #[error("Negative residual energy: {energy}")]
    NegativeResidualEnergy { energy: f64 },

    /// Channel index past the configured channel count
    #[error("Channel {channel} out of range (engine has {channels} channels)")]
    ChannelOutOfRange { channel: usize, channels: usize },

    /// Input, output and sidechain blocks must have equal length
    #[error("Block length mismatch: input={input}, output={output}")]
    BlockLengthMismatch { input: usize, output: usize },

    /// Excitation buffer shorter than the configured excitation length
    #[error("Excitation buffer too short: {len} samples, need at least {required}")]
    ExcitationTooShort { len: usize, required: usize },

    /// Excitation index not present in the bank
    #[error("Unknown excitation index: {0}")]
    UnknownExcitation(usize),
}

/// Result type for engine operations
pub type LpcResult<T> = Result<T, LpcError>;
