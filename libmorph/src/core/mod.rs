pub mod error;
pub mod ring;
pub mod types;
pub mod window;

pub use error::{LpcError, LpcResult};
pub use ring::RingBuffer;
pub use types::*;
pub use window::{apply_window, hann_window};
