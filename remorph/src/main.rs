use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use remorph::{
    load_excitation, normalize_peak, process_audio, read_audio_file, white_noise, write_wav,
    AudioInfo, EngineConfig, ExcitationSource, GainMode, ProcessOptions, DEFAULT_BLOCK_SIZE,
};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "remorph")]
#[command(author = "NellowTCS")]
#[command(version)]
#[command(about = "Offline LPC resynthesis with libmorph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum GainArg {
    /// sqrt of the residual prediction energy
    Residual,
    /// rescale each frame to the input frame's RMS
    MatchRms,
}

#[derive(Subcommand)]
enum Commands {
    /// Resynthesize an audio file through the LPC engine
    Process {
        /// Input audio file (wav, flac, mp3, ogg)
        input: PathBuf,
        /// Output WAV file
        output: PathBuf,
        /// Engine config as JSON; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// Excitation audio file (default: white noise)
        #[arg(short, long)]
        excitation: Option<PathBuf>,
        /// Sidechain audio file used as excitation instead
        #[arg(long)]
        sidechain: Option<PathBuf>,
        /// Seed for the noise excitation
        #[arg(long, default_value = "0")]
        seed: u64,
        /// Predictor order
        #[arg(short, long)]
        order: Option<usize>,
        /// Frame duration in milliseconds (1-10)
        #[arg(long)]
        frame_ms: Option<f64>,
        /// Wet/dry mix (0 = dry, 1 = wet)
        #[arg(short, long, default_value = "1.0")]
        mix: f32,
        /// Wet gain in dB
        #[arg(short, long, default_value = "0.0")]
        gain: f32,
        /// Excitation loop length as a fraction of the excitation
        #[arg(long, default_value = "1.0")]
        ex_length: f32,
        /// Excitation loop start as a fraction of the excitation
        #[arg(long, default_value = "0.0")]
        ex_start: f32,
        /// Analysis high-pass cutoff in Hz
        #[arg(long)]
        highpass: Option<f64>,
        /// Synthesis gain mode
        #[arg(long, value_enum)]
        gain_mode: Option<GainArg>,
        /// Block size in samples per channel
        #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: usize,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a white noise excitation file
    Noise {
        /// Output WAV file
        output: PathBuf,
        /// Length in seconds
        #[arg(short, long, default_value = "1.0")]
        seconds: f64,
        /// Sample rate
        #[arg(short, long, default_value = "44100")]
        rate: u32,
        /// Peak amplitude
        #[arg(short, long, default_value = "0.5")]
        amplitude: f32,
        /// RNG seed
        #[arg(long, default_value = "0")]
        seed: u64,
    },
    /// Peak-normalize an audio file
    Normalize {
        /// Input audio file
        input: PathBuf,
        /// Output WAV file
        output: PathBuf,
        /// Target peak (linear)
        #[arg(short, long, default_value = "1.0")]
        peak: f32,
    },
    /// Show information about an audio file
    Info {
        /// Input audio file
        input: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input,
            output,
            config,
            excitation,
            sidechain,
            seed,
            order,
            frame_ms,
            mix,
            gain,
            ex_length,
            ex_start,
            highpass,
            gain_mode,
            block_size,
            json,
        } => {
            process(ProcessArgs {
                input,
                output,
                config,
                excitation,
                sidechain,
                seed,
                order,
                frame_ms,
                mix,
                gain,
                ex_length,
                ex_start,
                highpass,
                gain_mode,
                block_size,
                json,
            })?;
        }
        Commands::Noise {
            output,
            seconds,
            rate,
            amplitude,
            seed,
        } => {
            noise(&output, seconds, rate, amplitude, seed)?;
        }
        Commands::Normalize {
            input,
            output,
            peak,
        } => {
            normalize(&input, &output, peak)?;
        }
        Commands::Info { input, json } => {
            info(&input, json)?;
        }
    }

    Ok(())
}

struct ProcessArgs {
    input: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    excitation: Option<PathBuf>,
    sidechain: Option<PathBuf>,
    seed: u64,
    order: Option<usize>,
    frame_ms: Option<f64>,
    mix: f32,
    gain: f32,
    ex_length: f32,
    ex_start: f32,
    highpass: Option<f64>,
    gain_mode: Option<GainArg>,
    block_size: usize,
    json: bool,
}

fn process(args: ProcessArgs) -> Result<()> {
    println!("Reading {}...", args.input.display());

    let audio = read_audio_file(&args.input).context("Failed to read input file")?;

    println!("  Sample rate: {} Hz", audio.sample_rate);
    println!("  Channels: {}", audio.channels);
    println!("  Duration: {:.2}s", audio.duration_secs());

    // Build the engine config: file, then frame duration, then single flags
    let mut config = match &args.config {
        Some(path) => {
            let json = fs::read_to_string(path).context("Failed to read config file")?;
            EngineConfig::from_json(&json).context("Invalid config file")?
        }
        None => EngineConfig::default(),
    };
    if let Some(ms) = args.frame_ms {
        let order = args.order.unwrap_or(config.order);
        config = EngineConfig::from_frame_duration(audio.sample_rate, ms, order, audio.channels)
            .context("Invalid frame duration")?
            .with_highpass(config.analysis_highpass_hz)
            .with_gain_mode(config.gain_mode)
            .with_output_limit(config.limit_output);
    }
    if args.highpass.is_some() {
        config = config.with_highpass(args.highpass);
    }
    if let Some(mode) = args.gain_mode {
        config = config.with_gain_mode(match mode {
            GainArg::Residual => GainMode::Residual,
            GainArg::MatchRms => GainMode::MatchInputRms,
        });
    }

    let excitation = match &args.excitation {
        Some(path) => {
            println!("Loading excitation {}...", path.display());
            ExcitationSource::Samples(load_excitation(path, config.excitation_len)?)
        }
        None => ExcitationSource::Noise {
            amplitude: 0.5,
            seed: args.seed,
        },
    };

    let sidechain = match &args.sidechain {
        Some(path) => {
            println!("Loading sidechain {}...", path.display());
            let sc = read_audio_file(path).context("Failed to read sidechain file")?;
            if sc.sample_rate != audio.sample_rate {
                bail!(
                    "Sidechain sample rate {} Hz does not match input {} Hz",
                    sc.sample_rate,
                    audio.sample_rate
                );
            }
            Some(sc)
        }
        None => None,
    };

    let mut options = ProcessOptions::new(config)
        .with_mix(args.mix)
        .with_wet_gain_db(args.gain)
        .with_excitation_window(args.ex_length, args.ex_start)
        .with_block_size(args.block_size)
        .with_excitation(excitation);
    if let Some(order) = args.order {
        options = options.with_order(order);
    }

    println!(
        "Processing (order {}, {:.1} ms frames)...",
        options.order.unwrap_or(options.config.order),
        options.config.frame_duration_ms()
    );

    let result = process_audio(&audio, sidechain.as_ref(), &options)?;

    write_wav(&args.output, &result.samples, audio.sample_rate, audio.channels)?;

    let summary = &result.summary;
    if args.json {
        let json_str =
            serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
        println!("{}", json_str);
        return Ok(());
    }

    println!("Done!");
    println!("  Output: {}", args.output.display());
    println!("  Order: {}", summary.order);
    println!("  Latency: {} samples", summary.latency);
    println!("  Hops: {}", summary.hops);
    if summary.has_warnings() {
        println!(
            "  Skipped hops: {} (degenerate {}, negative energy {}, unstable {})",
            summary.skipped_hops(),
            summary.degenerate_hops,
            summary.negative_energy_hops,
            summary.unstable_hops
        );
        println!("  Clipped blocks: {}", summary.altered_blocks);
    }
    if summary.passthrough_blocks > 0 {
        println!("  Pass-through blocks: {}", summary.passthrough_blocks);
    }

    Ok(())
}

fn noise(output: &PathBuf, seconds: f64, rate: u32, amplitude: f32, seed: u64) -> Result<()> {
    if seconds.is_nan() || seconds <= 0.0 || rate == 0 {
        bail!("Length and sample rate must be positive");
    }
    let len = (seconds * rate as f64) as usize;
    println!("Generating {} samples of noise (seed {})...", len, seed);

    let samples = white_noise(len, amplitude, seed);
    write_wav(output, &samples, rate, 1)?;

    println!("Done!");
    println!("  Output: {}", output.display());

    Ok(())
}

fn normalize(input: &PathBuf, output: &PathBuf, peak: f32) -> Result<()> {
    println!("Reading {}...", input.display());

    let mut audio = read_audio_file(input).context("Failed to read input file")?;
    let before = audio.peak();
    normalize_peak(&mut audio.samples, peak);

    write_wav(output, &audio.samples, audio.sample_rate, audio.channels)?;

    println!("Done!");
    println!("  Output: {}", output.display());
    println!("  Peak: {:.4} -> {:.4}", before, audio.peak());

    Ok(())
}

fn info(input: &PathBuf, json: bool) -> Result<()> {
    let audio = read_audio_file(input).context("Failed to read audio file")?;
    let info = AudioInfo::from_audio(&audio);

    if json {
        let json_str = serde_json::to_string_pretty(&info).context("Failed to serialize info")?;
        println!("{}", json_str);
        return Ok(());
    }

    println!("Audio File");
    println!("───────────────────────────────");
    if let Some(ref format) = info.source_format {
        println!("  Format:      {}", format);
    }
    println!("  Sample rate: {} Hz", info.sample_rate);
    println!("  Channels:    {}", info.channels);
    println!("  Duration:    {:.2}s", info.duration_secs);
    println!("  Frames:      {}", info.frames);
    println!("  Peak:        {:.4}", info.peak);
    println!("  RMS:         {:.4}", info.rms);

    Ok(())
}
