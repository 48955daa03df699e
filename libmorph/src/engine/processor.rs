use std::sync::Arc;

use crate::core::{db_to_gain, LpcError, LpcResult};

use super::params::{BlockParams, ParamSnapshot, Reconfigure, SharedParams};
use super::resynth::LpcEngine;
use super::types::BlockReport;

/// Drives an [`LpcEngine`] from a [`SharedParams`] store.
///
/// Once per block it takes a parameter snapshot, turns order and excitation
/// changes into a [`Reconfigure`], converts the wet gain from dB and ramps
/// from the previous block's value.
#[derive(Debug)]
pub struct LpcProcessor {
    engine: LpcEngine,
    params: Arc<SharedParams>,
    previous_gain: f32,
}

impl LpcProcessor {
    pub fn new(engine: LpcEngine, params: Arc<SharedParams>) -> Self {
        let previous_gain = db_to_gain(params.snapshot().wet_gain_db);
        LpcProcessor {
            engine,
            params,
            previous_gain,
        }
    }

    /// handle for the control side
    pub fn params(&self) -> Arc<SharedParams> {
        Arc::clone(&self.params)
    }

    pub fn engine(&self) -> &LpcEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut LpcEngine {
        &mut self.engine
    }

    pub fn prepare(&mut self) -> LpcResult<()> {
        self.engine.prepare();
        self.previous_gain = db_to_gain(self.params.snapshot().wet_gain_db);
        self.sync_structure()
    }

    /// Process one block for every channel in `outputs`.
    ///
    /// `inputs` and `sidechains` (when given) need at least as many channels
    /// as `outputs`.
    pub fn process_block(
        &mut self,
        inputs: &[&[f32]],
        sidechains: Option<&[&[f32]]>,
        outputs: &mut [&mut [f32]],
    ) -> LpcResult<BlockReport> {
        if inputs.len() < outputs.len() {
            return Err(LpcError::ChannelOutOfRange {
                channel: inputs.len(),
                channels: outputs.len(),
            });
        }
        if let Some(sc) = sidechains {
            if sc.len() < outputs.len() {
                return Err(LpcError::ChannelOutOfRange {
                    channel: sc.len(),
                    channels: outputs.len(),
                });
            }
        }

        let snap = self.sync_structure_from(self.params.snapshot())?;
        let current_gain = db_to_gain(snap.wet_gain_db);
        let block = BlockParams {
            lpc_mix: snap.lpc_mix,
            ex_percentage: snap.ex_percentage,
            ex_start_pos: snap.ex_start_pos,
            previous_gain: self.previous_gain,
            current_gain,
        };

        let mut report = BlockReport::default();
        for (ch, out) in outputs.iter_mut().enumerate() {
            let sidechain = sidechains.map(|sc| sc[ch]);
            let r = self.engine.process(ch, inputs[ch], sidechain, out, &block)?;
            report.merge(&r);
        }
        self.previous_gain = current_gain;
        Ok(report)
    }

    fn sync_structure(&mut self) -> LpcResult<()> {
        self.sync_structure_from(self.params.snapshot()).map(|_| ())
    }

    /// push order and excitation changes from a snapshot into the engine
    fn sync_structure_from(&mut self, snap: ParamSnapshot) -> LpcResult<ParamSnapshot> {
        let mut change = Reconfigure::default();
        let order = snap.order.min(self.engine.config().max_order);
        if order != self.engine.order() {
            change.order = Some(order);
        }
        if snap.excitation != self.engine.selected_excitation() {
            change.excitation = Some(snap.excitation);
        }
        if !change.is_empty() {
            self.engine.reconfigure(change)?;
        }
        Ok(snap)
    }
}
