use crate::analysis::{autocorrelate_into, levinson_durbin, synthesis_gain, OnePoleHighpass};
use crate::core::{
    apply_window, hann_window, EngineConfig, ExcitationKind, GainMode, LpcError, LpcResult,
    MIN_ORDER,
};
use crate::synthesis::{
    mix, synthesize_frame, ExcitationBank, ExcitationSegment, GainRamp, OutputGuard,
};

use super::channel::ChannelState;
use super::params::{BlockParams, Reconfigure};
use super::types::BlockReport;

/// Working buffers shared by every channel, sized once per config
#[derive(Debug, Clone)]
struct Scratch {
    frame: Vec<f64>,
    excitation: Vec<f64>,
    synth: Vec<f64>,
    phi: Vec<f64>,
    alphas: Vec<f64>,
    reflections: Vec<f64>,
}

impl Scratch {
    fn new(config: &EngineConfig) -> Self {
        Scratch {
            frame: vec![0.0; config.frame_len],
            excitation: vec![0.0; config.frame_len],
            synth: vec![0.0; config.frame_len],
            phi: vec![0.0; config.max_order + 1],
            alphas: vec![0.0; config.max_order + 1],
            reflections: vec![0.0; config.max_order],
        }
    }
}

/// what drives the filter for one hop
#[derive(Clone, Copy)]
enum HopSource<'a> {
    Internal(&'a [f64], ExcitationSegment),
    Sidechain,
}

/// Frame-based LPC cross-synthesis engine.
///
/// Each hop the newest frame of input is windowed and analysed; its
/// spectral envelope is imposed on the chosen excitation and overlap-added
/// into the output ring. The dry path is the input delayed by one frame.
///
/// `prepare` and `set_config` allocate; `process` and `reconfigure` don't.
#[derive(Debug, Clone)]
pub struct LpcEngine {
    config: EngineConfig,
    window: Vec<f64>,
    highpass: Option<OnePoleHighpass>,
    channels: Vec<ChannelState>,
    bank: ExcitationBank,
    selected: Option<usize>,
    scratch: Scratch,
}

impl LpcEngine {
    pub fn new(config: EngineConfig) -> LpcResult<Self> {
        if let Err(e) = config.validate() {
            log::warn!("engine config rejected: {e}");
            return Err(e);
        }
        log::debug!(
            "LPC engine: {} channels, order {}/{}, frame {}, hop {}, buffer {}",
            config.channels,
            config.order,
            config.max_order,
            config.frame_len,
            config.hop_size,
            config.buffer_len
        );
        Ok(LpcEngine {
            window: hann_window(config.frame_len),
            highpass: highpass_for(&config),
            channels: (0..config.channels)
                .map(|_| ChannelState::new(&config))
                .collect(),
            bank: ExcitationBank::new(),
            selected: None,
            scratch: Scratch::new(&config),
            config,
        })
    }

    /// Reset all runtime state. Calling it twice is the same as calling it once.
    pub fn prepare(&mut self) {
        for state in &mut self.channels {
            state.reset(&self.config);
        }
        if let Some(hp) = self.highpass.as_mut() {
            hp.reset();
        }
        log::debug!("prepared {} channels", self.channels.len());
    }

    /// Swap in a new static configuration and reallocate everything.
    ///
    /// Excitation buffers are kept and must still cover the new excitation length.
    pub fn set_config(&mut self, config: EngineConfig) -> LpcResult<()> {
        let checked = config.validate().and_then(|_| match self.bank.min_len() {
            Some(len) if len < config.excitation_len => Err(LpcError::ExcitationTooShort {
                len,
                required: config.excitation_len,
            }),
            _ => Ok(()),
        });
        if let Err(e) = checked {
            log::warn!("engine config rejected: {e}");
            return Err(e);
        }
        log::debug!(
            "LPC engine reconfigured: frame {} -> {}, buffer {} -> {}",
            self.config.frame_len,
            config.frame_len,
            self.config.buffer_len,
            config.buffer_len
        );
        self.window = hann_window(config.frame_len);
        self.highpass = highpass_for(&config);
        self.channels = (0..config.channels)
            .map(|_| ChannelState::new(&config))
            .collect();
        self.scratch = Scratch::new(&config);
        self.config = config;
        Ok(())
    }

    /// Add an excitation buffer to the bank, returns its index.
    pub fn add_excitation(&mut self, name: &str, samples: Vec<f64>) -> LpcResult<usize> {
        if samples.len() < self.config.excitation_len {
            return Err(LpcError::ExcitationTooShort {
                len: samples.len(),
                required: self.config.excitation_len,
            });
        }
        let index = self.bank.push(name, samples);
        log::debug!("excitation {index} '{name}' added");
        Ok(index)
    }

    pub fn add_excitation_f32(&mut self, name: &str, samples: &[f32]) -> LpcResult<usize> {
        self.add_excitation(name, samples.iter().map(|&s| s as f64).collect())
    }

    /// Apply order, hop or excitation changes between blocks.
    ///
    /// Everything is validated before anything is touched, so an error
    /// leaves the engine as it was.
    pub fn reconfigure(&mut self, change: Reconfigure) -> LpcResult<()> {
        if let Err(e) = self.check_change(&change) {
            log::warn!("reconfigure rejected: {e}");
            return Err(e);
        }

        if let Some(order) = change.order.filter(|&o| o != self.config.order) {
            log::debug!("order {} -> {order}", self.config.order);
            self.config.order = order;
            for state in &mut self.channels {
                state.history.set_order(order);
                state.clear_analysis();
            }
        }

        if let Some(hop) = change.hop_size.filter(|&h| h != self.config.hop_size) {
            log::debug!("hop size {} -> {hop}", self.config.hop_size);
            let old_hop = self.config.hop_size;
            for state in &mut self.channels {
                retime_hop(state, old_hop, hop);
            }
            self.config.hop_size = hop;
        }

        if let Some(selected) = change.excitation.filter(|&e| e != self.selected) {
            log::debug!("excitation {:?} -> {selected:?}", self.selected);
            self.selected = selected;
            for state in &mut self.channels {
                state.excitation_changed = true;
            }
        }

        Ok(())
    }

    fn check_change(&self, change: &Reconfigure) -> LpcResult<()> {
        if let Some(order) = change.order {
            if order < MIN_ORDER || order > self.config.max_order {
                return Err(LpcError::InvalidConfig(format!(
                    "order {order} outside {MIN_ORDER}..={}",
                    self.config.max_order
                )));
            }
        }
        if let Some(hop) = change.hop_size {
            let frame_len = self.config.frame_len;
            if hop == 0 || hop > frame_len || self.config.buffer_len <= frame_len + hop {
                return Err(LpcError::InvalidConfig(format!(
                    "hop size {hop} invalid for frame {frame_len}, buffer {}",
                    self.config.buffer_len
                )));
            }
        }
        if let Some(Some(index)) = change.excitation {
            if self.bank.get(index).is_none() {
                return Err(LpcError::UnknownExcitation(index));
            }
        }
        Ok(())
    }

    /// Process one block for one channel.
    ///
    /// With a sidechain block the sidechain drives the filter, otherwise the
    /// selected internal excitation does. With neither, input is copied
    /// straight to output; the input ring still records it.
    pub fn process(
        &mut self,
        channel: usize,
        input: &[f32],
        sidechain: Option<&[f32]>,
        output: &mut [f32],
        params: &BlockParams,
    ) -> LpcResult<BlockReport> {
        let LpcEngine {
            config,
            window,
            highpass,
            channels,
            bank,
            selected,
            scratch,
        } = self;

        let channel_count = channels.len();
        let state = channels
            .get_mut(channel)
            .ok_or(LpcError::ChannelOutOfRange {
                channel,
                channels: channel_count,
            })?;
        if input.len() != output.len() {
            return Err(LpcError::BlockLengthMismatch {
                input: input.len(),
                output: output.len(),
            });
        }
        if let Some(sc) = sidechain {
            if sc.len() != input.len() {
                return Err(LpcError::BlockLengthMismatch {
                    input: sc.len(),
                    output: output.len(),
                });
            }
        }

        let mut report = BlockReport::default();
        let p = params.sanitized();
        let segment =
            ExcitationSegment::new(config.excitation_len, p.ex_percentage, p.ex_start_pos);

        let (kind, source) = match sidechain {
            Some(_) => (ExcitationKind::Sidechain, HopSource::Sidechain),
            None => match selected.and_then(|i| bank.get(i)) {
                Some(buffer) => (
                    ExcitationKind::Internal,
                    HopSource::Internal(buffer, segment),
                ),
                None => {
                    // keep the analysis history current for when an excitation is selected
                    for &x in input.iter() {
                        state.input.write(x as f64);
                        state.sidechain.write(0.0);
                    }
                    output.copy_from_slice(input);
                    report.passthrough = true;
                    return Ok(report);
                }
            },
        };

        let switched = matches!(state.source, Some(prev) if prev != kind);
        if switched || state.excitation_changed {
            state.cursor.reset(segment.start);
            state.history.rewind();
        }
        state.source = Some(kind);
        state.excitation_changed = false;

        let ramp = GainRamp::new(p.previous_gain, p.current_gain, input.len());
        let guard = OutputGuard::new(config.limit_output);
        let lpc_mix = p.lpc_mix as f64;
        let dry_delay = config.frame_len + 1;

        for (s, (&x, out)) in input.iter().zip(output.iter_mut()).enumerate() {
            state.input.write(x as f64);
            state
                .sidechain
                .write(sidechain.map_or(0.0, |sc| sc[s] as f64));

            let wet = state.output.read_and_clear();
            let dry = state.input.peek_behind(dry_delay);
            let (y, altered) = guard.apply(mix(wet, dry, lpc_mix, ramp.at(s)));
            *out = y;
            report.output_altered |= altered;

            state.hop_counter += 1;
            if state.hop_counter >= config.hop_size {
                state.hop_counter = 0;
                run_hop(config, window, highpass, state, scratch, source, &mut report);
            }
        }

        Ok(report)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn channels(&self) -> usize {
        self.channels.len()
    }

    pub fn order(&self) -> usize {
        self.config.order
    }

    pub fn hop_size(&self) -> usize {
        self.config.hop_size
    }

    /// dry path delay in samples
    pub fn latency(&self) -> usize {
        self.config.latency()
    }

    pub fn selected_excitation(&self) -> Option<usize> {
        self.selected
    }

    pub fn excitation_bank(&self) -> &ExcitationBank {
        &self.bank
    }

    pub fn channel_state(&self, channel: usize) -> Option<&ChannelState> {
        self.channels.get(channel)
    }

    /// predictor polynomial from the last accepted hop, alphas[0] == 1
    pub fn alphas(&self, channel: usize) -> Option<&[f64]> {
        let order = self.config.order;
        self.channels.get(channel).map(|s| &s.alphas[..=order])
    }

    pub fn reflections(&self, channel: usize) -> Option<&[f64]> {
        let order = self.config.order;
        self.channels.get(channel).map(|s| &s.reflections[..order])
    }

    pub fn gain(&self, channel: usize) -> Option<f64> {
        self.channels.get(channel).map(|s| s.gain)
    }

    pub fn excitation_position(&self, channel: usize) -> Option<usize> {
        self.channels.get(channel).map(|s| s.excitation_position())
    }
}

fn highpass_for(config: &EngineConfig) -> Option<OnePoleHighpass> {
    config
        .analysis_highpass_hz
        .map(|hz| OnePoleHighpass::new(hz, config.sample_rate))
}

/// Re-anchor the deposit offset after a hop change.
///
/// The next deposit lands where the new hop boundary will be. When the hop
/// shrinks, whatever sat between the new and old deposit offsets is zeroed.
fn retime_hop(state: &mut ChannelState, old_hop: usize, new_hop: usize) {
    let remaining = new_hop.saturating_sub(state.hop_counter).max(1);
    let old_write = state.output.write_pos();
    state.output.set_write_ahead_of_read(remaining);
    if new_hop < old_hop {
        let new_write = state.output.write_pos();
        let cap = state.output.capacity();
        let stale = (old_write + cap - new_write) % cap;
        state.output.zero_span(new_write, stale);
    }
}

/// Analyse the newest frame and overlap-add its resynthesis.
///
/// The deposit offset advances by one hop even when the frame is skipped.
fn run_hop(
    config: &EngineConfig,
    window: &[f64],
    highpass: &mut Option<OnePoleHighpass>,
    state: &mut ChannelState,
    scratch: &mut Scratch,
    source: HopSource<'_>,
    report: &mut BlockReport,
) {
    let order = config.order;
    let Scratch {
        frame,
        excitation,
        synth,
        phi,
        alphas,
        reflections,
    } = scratch;
    let phi = &mut phi[..=order];
    let alphas = &mut alphas[..=order];
    let reflections = &mut reflections[..order];

    report.hops += 1;

    state.input.copy_recent(frame);
    apply_window(frame, window);
    if let Some(hp) = highpass.as_mut() {
        hp.process_frame(frame);
    }
    autocorrelate_into(frame, phi);

    if levinson_durbin(phi, alphas, reflections).is_err() {
        report.degenerate_hops += 1;
        state.output.advance_write(config.hop_size);
        return;
    }

    let gain = match config.gain_mode {
        GainMode::Residual => synthesis_gain(phi, alphas).unwrap_or_else(|_| {
            report.negative_energy_hops += 1;
            0.0
        }),
        GainMode::MatchInputRms => 1.0,
    };
    state.alphas[..=order].copy_from_slice(alphas);
    state.reflections[..order].copy_from_slice(reflections);
    state.gain = gain;

    match source {
        HopSource::Sidechain => {
            state.sidechain.copy_recent(excitation);
            synthesize_frame(alphas, gain, &mut state.history, synth, |n| excitation[n]);
        }
        HopSource::Internal(buffer, segment) => {
            let cursor = &mut state.cursor;
            synthesize_frame(alphas, gain, &mut state.history, synth, |_| {
                cursor.next_sample(buffer, &segment)
            });
        }
    }

    if config.gain_mode == GainMode::MatchInputRms {
        match_rms(frame, synth);
    }

    if synth.iter().all(|y| y.is_finite()) {
        for (n, &y) in synth.iter().enumerate() {
            state.output.accumulate_ahead(n, y);
        }
    } else {
        report.unstable_hops += 1;
    }
    state.output.advance_write(config.hop_size);
}

fn rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64).sqrt()
}

/// scale `synth` so its RMS equals that of `reference`
fn match_rms(reference: &[f64], synth: &mut [f64]) {
    let target = rms(reference);
    let current = rms(synth);
    if current > 0.0 && current.is_finite() {
        let scale = target / current;
        for y in synth.iter_mut() {
            *y *= scale;
        }
    }
}
