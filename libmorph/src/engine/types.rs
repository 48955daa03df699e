//! Per-block reporting

/// What happened while processing one block on one channel.
///
/// Everything here is a recovered condition; `process` still produced a
/// full block of output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockReport {
    /// hop boundaries crossed
    pub hops: u32,
    /// hops skipped because the analysis frame was silent or perfectly predictable
    pub degenerate_hops: u32,
    /// hops whose residual energy came out negative, synthesized at zero gain
    pub negative_energy_hops: u32,
    /// hops whose synthesized frame blew up and was discarded
    pub unstable_hops: u32,
    /// some output sample was non-finite or past full scale and got altered
    pub output_altered: bool,
    /// no excitation was available, input was copied through
    pub passthrough: bool,
}

impl BlockReport {
    /// fold another channel's report into this one
    pub fn merge(&mut self, other: &BlockReport) {
        self.hops += other.hops;
        self.degenerate_hops += other.degenerate_hops;
        self.negative_energy_hops += other.negative_energy_hops;
        self.unstable_hops += other.unstable_hops;
        self.output_altered |= other.output_altered;
        self.passthrough |= other.passthrough;
    }

    /// Any condition worth surfacing to the host
    pub fn has_warnings(&self) -> bool {
        self.negative_energy_hops > 0 || self.unstable_hops > 0 || self.output_altered
    }
}
