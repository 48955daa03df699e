pub mod excitation;
pub mod filter;
pub mod mixer;

pub use excitation::{ExcitationBank, ExcitationCursor, ExcitationSegment};
pub use filter::{synthesize_frame, HistoryRing};
pub use mixer::{mix, GainRamp, OutputGuard};
