//! remorph - offline harness for the libmorph LPC engine
//!
//! Loads audio, runs it block by block through an [`LpcProcessor`] the way a
//! host would, and writes the result back out. Also carries the small
//! utilities the engine needs around it: excitation loading, noise
//! generation and peak normalization.

pub mod audio;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

pub use audio::{
    deinterleave, interleave, read_audio_file, read_audio_from_bytes, write_wav,
    write_wav_to_bytes, AudioData,
};
pub use libmorph_audio::{BlockReport, EngineConfig, GainMode, LpcEngine, LpcProcessor};

use libmorph_audio::SharedParams;

/// default block size for offline runs
pub const DEFAULT_BLOCK_SIZE: usize = 512;

// ============================================================================
// Sample utilities
// ============================================================================

/// Scale so the largest magnitude equals `peak`; silence is left alone
pub fn normalize_peak(samples: &mut [f32], peak: f32) {
    let max = samples
        .iter()
        .filter(|s| s.is_finite())
        .fold(0.0f32, |m, s| m.max(s.abs()));
    if max <= 0.0 {
        return;
    }
    let scale = peak / max;
    for s in samples.iter_mut() {
        *s *= scale;
    }
}

/// Average interleaved channels into one
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Uniform white noise in [-amplitude, amplitude), reproducible per seed
pub fn white_noise(len: usize, amplitude: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let amplitude = amplitude.abs();
    if amplitude == 0.0 || !amplitude.is_finite() {
        return vec![0.0; len];
    }
    (0..len)
        .map(|_| rng.gen_range(-amplitude..amplitude))
        .collect()
}

/// Read an excitation file as a mono buffer of exactly `len` samples.
///
/// Longer files are truncated, shorter ones are looped. The result is peak
/// normalized to full scale.
pub fn load_excitation(path: &Path, len: usize) -> Result<Vec<f32>> {
    let audio = read_audio_file(path)
        .with_context(|| format!("Failed to load excitation {}", path.display()))?;
    excitation_from_audio(&audio, len)
}

/// Same as [`load_excitation`] for audio already in memory
pub fn excitation_from_audio(audio: &AudioData, len: usize) -> Result<Vec<f32>> {
    let mono = downmix_to_mono(&audio.samples, audio.channels);
    if mono.is_empty() {
        bail!("Excitation audio is empty");
    }
    let mut out: Vec<f32> = mono.iter().copied().cycle().take(len).collect();
    normalize_peak(&mut out, 1.0);
    Ok(out)
}

// ============================================================================
// Processing
// ============================================================================

/// Where the internal excitation comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ExcitationSource {
    /// seeded white noise
    Noise { amplitude: f32, seed: u64 },
    /// mono samples, looped or truncated to the configured length
    Samples(Vec<f32>),
    /// nothing selected; the engine passes input through
    None,
}

impl Default for ExcitationSource {
    fn default() -> Self {
        ExcitationSource::Noise {
            amplitude: 0.5,
            seed: 0,
        }
    }
}

/// Options for an offline run
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub config: EngineConfig,
    pub lpc_mix: f32,
    pub ex_percentage: f32,
    pub ex_start_pos: f32,
    pub wet_gain_db: f32,
    /// runtime order, None keeps `config.order`
    pub order: Option<usize>,
    pub block_size: usize,
    pub excitation: ExcitationSource,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        ProcessOptions {
            config: EngineConfig::default(),
            lpc_mix: 1.0,
            ex_percentage: 1.0,
            ex_start_pos: 0.0,
            wet_gain_db: 0.0,
            order: None,
            block_size: DEFAULT_BLOCK_SIZE,
            excitation: ExcitationSource::default(),
        }
    }
}

impl ProcessOptions {
    pub fn new(config: EngineConfig) -> Self {
        ProcessOptions {
            config,
            ..Default::default()
        }
    }

    pub fn with_mix(mut self, lpc_mix: f32) -> Self {
        self.lpc_mix = lpc_mix;
        self
    }

    pub fn with_excitation_window(mut self, percentage: f32, start: f32) -> Self {
        self.ex_percentage = percentage;
        self.ex_start_pos = start;
        self
    }

    pub fn with_wet_gain_db(mut self, db: f32) -> Self {
        self.wet_gain_db = db;
        self
    }

    pub fn with_order(mut self, order: usize) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_excitation(mut self, excitation: ExcitationSource) -> Self {
        self.excitation = excitation;
        self
    }

    pub fn with_highpass(mut self, cutoff_hz: Option<f64>) -> Self {
        self.config.analysis_highpass_hz = cutoff_hz;
        self
    }

    pub fn with_gain_mode(mut self, mode: GainMode) -> Self {
        self.config.gain_mode = mode;
        self
    }
}

/// Totals over every block of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessSummary {
    pub blocks: usize,
    pub hops: u64,
    pub degenerate_hops: u64,
    pub negative_energy_hops: u64,
    pub unstable_hops: u64,
    /// blocks where the output guard rewrote a sample
    pub altered_blocks: usize,
    pub passthrough_blocks: usize,
    pub latency: usize,
    /// predictor order the engine ran at
    pub order: usize,
    /// RFC 3339 time the run finished
    pub finished_at: String,
}

impl ProcessSummary {
    fn add(&mut self, report: &BlockReport) {
        self.blocks += 1;
        self.hops += report.hops as u64;
        self.degenerate_hops += report.degenerate_hops as u64;
        self.negative_energy_hops += report.negative_energy_hops as u64;
        self.unstable_hops += report.unstable_hops as u64;
        if report.output_altered {
            self.altered_blocks += 1;
        }
        if report.passthrough {
            self.passthrough_blocks += 1;
        }
    }

    /// hops that kept the previous coefficients or dropped their frame
    pub fn skipped_hops(&self) -> u64 {
        self.degenerate_hops + self.negative_energy_hops + self.unstable_hops
    }

    pub fn has_warnings(&self) -> bool {
        self.skipped_hops() > 0 || self.altered_blocks > 0
    }
}

/// Processed audio plus what happened along the way
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// interleaved, same layout as the input
    pub samples: Vec<f32>,
    pub summary: ProcessSummary,
}

/// Run interleaved audio through the engine.
///
/// `sidechain`, when given, must be interleaved with the same channel count
/// and at least as long as `samples`; it replaces the internal excitation.
/// `options.config` channel count and sample rate are taken from the call.
pub fn process_samples(
    samples: &[f32],
    channels: usize,
    sample_rate: u32,
    sidechain: Option<&[f32]>,
    options: &ProcessOptions,
) -> Result<ProcessOutput> {
    if channels == 0 {
        bail!("Channel count must be at least 1");
    }
    if options.block_size == 0 {
        bail!("Block size must be at least 1");
    }
    if let Some(sc) = sidechain {
        if sc.len() < samples.len() {
            bail!(
                "Sidechain is shorter than the input ({} < {} samples)",
                sc.len(),
                samples.len()
            );
        }
    }

    let mut config = options.config.clone();
    config.channels = channels;
    config.sample_rate = sample_rate;
    if let Some(order) = options.order {
        config = config.with_order(order);
    }
    let mut engine = LpcEngine::new(config.clone()).context("Invalid engine config")?;

    let selected = match &options.excitation {
        ExcitationSource::Noise { amplitude, seed } => {
            let noise = white_noise(config.excitation_len, *amplitude, *seed);
            Some(engine.add_excitation_f32("noise", &noise)?)
        }
        ExcitationSource::Samples(samples) => {
            if samples.is_empty() {
                bail!("Excitation buffer is empty");
            }
            let looped: Vec<f32> = samples
                .iter()
                .copied()
                .cycle()
                .take(config.excitation_len)
                .collect();
            Some(engine.add_excitation_f32("file", &looped)?)
        }
        ExcitationSource::None => None,
    };

    let params = Arc::new(SharedParams::new());
    params.set_lpc_mix(options.lpc_mix);
    params.set_ex_percentage(options.ex_percentage);
    params.set_ex_start_pos(options.ex_start_pos);
    params.set_wet_gain_db(options.wet_gain_db);
    params.set_order(config.order);
    params.set_excitation(selected);

    let mut processor = LpcProcessor::new(engine, params);
    processor.prepare()?;

    let inputs = deinterleave(samples, channels);
    let side = sidechain.map(|sc| deinterleave(&sc[..samples.len()], channels));
    let frames = samples.len() / channels;
    let mut outputs = vec![vec![0.0f32; frames]; channels];

    log::debug!(
        "processing {} frames x {} channels, block {}",
        frames,
        channels,
        options.block_size
    );

    let mut summary = ProcessSummary {
        latency: config.latency(),
        ..Default::default()
    };

    let mut start = 0;
    while start < frames {
        let end = (start + options.block_size).min(frames);
        let ins: Vec<&[f32]> = inputs.iter().map(|c| &c[start..end]).collect();
        let scs: Option<Vec<&[f32]>> = side
            .as_ref()
            .map(|s| s.iter().map(|c| &c[start..end]).collect());
        let mut outs: Vec<&mut [f32]> = outputs.iter_mut().map(|c| &mut c[start..end]).collect();

        let report = processor.process_block(&ins, scs.as_deref(), &mut outs)?;
        if report.has_warnings() {
            log::debug!("block at frame {start}: {report:?}");
        }
        summary.add(&report);
        start = end;
    }

    summary.order = processor.engine().order();
    summary.finished_at = chrono::Utc::now().to_rfc3339();
    if summary.has_warnings() {
        log::warn!(
            "{} of {} hops skipped, {} blocks altered by the output guard",
            summary.skipped_hops(),
            summary.hops,
            summary.altered_blocks
        );
    }

    Ok(ProcessOutput {
        samples: interleave(&outputs),
        summary,
    })
}

/// Run decoded audio through the engine
pub fn process_audio(
    audio: &AudioData,
    sidechain: Option<&AudioData>,
    options: &ProcessOptions,
) -> Result<ProcessOutput> {
    let side = match sidechain {
        Some(sc) => Some(match_channels(sc, audio.channels)?),
        None => None,
    };
    process_samples(
        &audio.samples,
        audio.channels,
        audio.sample_rate,
        side.as_deref(),
        options,
    )
}

/// Bring a sidechain to `channels`, duplicating mono or downmixing
fn match_channels(audio: &AudioData, channels: usize) -> Result<Vec<f32>> {
    if audio.channels == channels {
        return Ok(audio.samples.clone());
    }
    if audio.channels == 0 {
        bail!("Sidechain has no channels");
    }
    let mono = downmix_to_mono(&audio.samples, audio.channels);
    Ok(mono
        .iter()
        .flat_map(|&s| std::iter::repeat(s).take(channels))
        .collect())
}

// ============================================================================
// Info
// ============================================================================

/// Summary of an audio file
#[derive(Debug, Clone, Serialize)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: usize,
    pub frames: usize,
    pub duration_secs: f64,
    pub peak: f32,
    pub rms: f32,
    pub source_format: Option<String>,
}

impl AudioInfo {
    pub fn from_audio(audio: &AudioData) -> Self {
        let rms = if audio.samples.is_empty() {
            0.0
        } else {
            let sum: f64 = audio.samples.iter().map(|&s| s as f64 * s as f64).sum();
            (sum / audio.samples.len() as f64).sqrt() as f32
        };
        AudioInfo {
            sample_rate: audio.sample_rate,
            channels: audio.channels,
            frames: audio.frames(),
            duration_secs: audio.duration_secs(),
            peak: audio.peak(),
            rms,
            source_format: audio.source_format.clone(),
        }
    }
}

/// Get information about audio file bytes
pub fn get_audio_info(bytes: &[u8]) -> Result<AudioInfo> {
    let audio = read_audio_from_bytes(bytes)?;
    Ok(AudioInfo::from_audio(&audio))
}
