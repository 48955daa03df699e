use crate::core::{EngineConfig, ExcitationKind, RingBuffer};
use crate::synthesis::{ExcitationCursor, HistoryRing};

/// Everything one channel carries from block to block
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelState {
    pub(crate) input: RingBuffer,
    pub(crate) sidechain: RingBuffer,
    pub(crate) output: RingBuffer,
    pub(crate) history: HistoryRing,
    pub(crate) cursor: ExcitationCursor,
    pub(crate) hop_counter: usize,
    /// excitation source used by the previous block
    pub(crate) source: Option<ExcitationKind>,
    /// set by a reconfigure that changed the internal excitation
    pub(crate) excitation_changed: bool,
    /// last accepted analysis
    pub(crate) alphas: Vec<f64>,
    pub(crate) reflections: Vec<f64>,
    pub(crate) gain: f64,
}

impl ChannelState {
    pub fn new(config: &EngineConfig) -> Self {
        let mut state = ChannelState {
            input: RingBuffer::new(config.buffer_len),
            sidechain: RingBuffer::new(config.buffer_len),
            output: RingBuffer::new(config.buffer_len),
            history: HistoryRing::new(config.max_order, config.order),
            cursor: ExcitationCursor::default(),
            hop_counter: 0,
            source: None,
            excitation_changed: false,
            alphas: vec![0.0; config.max_order + 1],
            reflections: vec![0.0; config.max_order],
            gain: 0.0,
        };
        state.reset(config);
        state
    }

    /// Back to the freshly prepared state without reallocating.
    pub fn reset(&mut self, config: &EngineConfig) {
        self.input.reset();
        self.sidechain.reset();
        self.output.reset();
        self.output.set_write_ahead_of_read(config.hop_size);
        self.history.set_order(config.order);
        self.cursor.reset(0);
        self.hop_counter = 0;
        self.source = None;
        self.excitation_changed = false;
        self.clear_analysis();
    }

    /// forget the last analysis, alphas back to identity
    pub(crate) fn clear_analysis(&mut self) {
        self.alphas.fill(0.0);
        self.alphas[0] = 1.0;
        self.reflections.fill(0.0);
        self.gain = 0.0;
    }

    pub fn hop_counter(&self) -> usize {
        self.hop_counter
    }

    pub fn excitation_position(&self) -> usize {
        self.cursor.position()
    }

    pub fn input_write_pos(&self) -> usize {
        self.input.write_pos()
    }

    pub fn output_read_pos(&self) -> usize {
        self.output.read_pos()
    }

    /// where the next overlap-add deposit lands
    pub fn output_write_pos(&self) -> usize {
        self.output.write_pos()
    }

    pub fn history_position(&self) -> usize {
        self.history.position()
    }
}
