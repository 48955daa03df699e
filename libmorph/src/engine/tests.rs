//! Internal engine tests

use super::*;
use crate::core::{hann_window, EngineConfig, GainMode, LpcError};
use approx::assert_abs_diff_eq;

/// order 2, frame 8, hop 4, ring 16, excitation 8
fn small_config() -> EngineConfig {
    EngineConfig::new(1, 2, 8, 4, 16, 8, 44100)
}

fn engine_with_ones(config: EngineConfig) -> LpcEngine {
    let len = config.excitation_len;
    let mut engine = LpcEngine::new(config).unwrap();
    let idx = engine.add_excitation("ones", vec![1.0; len]).unwrap();
    engine.reconfigure(Reconfigure::excitation(Some(idx))).unwrap();
    engine.prepare();
    engine
}

fn noise(len: usize, seed: u64) -> Vec<f32> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as f32 / (1u64 << 31) as f32) - 0.5
        })
        .collect()
}

fn impulse(len: usize, at: usize) -> Vec<f32> {
    let mut x = vec![0.0f32; len];
    x[at] = 1.0;
    x
}

#[test]
fn test_single_impulse_fixture() {
    let mut engine = engine_with_ones(small_config());
    let input = impulse(16, 0);
    let mut out = vec![0.0f32; 16];
    let report = engine
        .process(0, &input, None, &mut out, &BlockParams::wet())
        .unwrap();

    let a = hann_window(8)[4] as f32;
    assert_abs_diff_eq!(a, 0.950_484_43, epsilon = 1e-6);
    for t in 0..4 {
        assert_eq!(out[t], 0.0, "t={t}");
    }
    for t in 4..12 {
        assert_abs_diff_eq!(out[t], a, epsilon = 1e-6);
    }
    for t in 12..16 {
        assert_eq!(out[t], 0.0, "t={t}");
    }

    assert_eq!(report.hops, 4);
    assert_eq!(report.degenerate_hops, 3);
    assert!(!report.has_warnings());
}

#[test]
fn test_overlapping_frames_add() {
    let mut engine = engine_with_ones(small_config());
    let input = impulse(16, 2);
    let mut out = vec![0.0f32; 16];
    engine
        .process(0, &input, None, &mut out, &BlockParams::wet())
        .unwrap();

    // first hop sees the impulse at window index 6, second at index 2
    let w = hann_window(8);
    let first = w[6] as f32;
    let second = w[2] as f32;
    for t in 4..8 {
        assert_abs_diff_eq!(out[t], first, epsilon = 1e-6);
    }
    for t in 8..12 {
        assert_abs_diff_eq!(out[t], first + second, epsilon = 1e-6);
    }
    for t in 12..16 {
        assert_abs_diff_eq!(out[t], second, epsilon = 1e-6);
    }
}

#[test]
fn test_gain_ramp_scales_wet_path() {
    let mut engine = engine_with_ones(small_config());
    let input = impulse(16, 0);
    let mut out = vec![0.0f32; 16];
    let params = BlockParams::wet().with_gain(0.0, 1.0);
    engine.process(0, &input, None, &mut out, &params).unwrap();

    let a = hann_window(8)[4];
    for t in 4..12 {
        assert_abs_diff_eq!(out[t], (a * t as f64 / 16.0) as f32, epsilon = 1e-6);
    }
}

#[test]
fn test_dry_path_is_input_delayed_by_frame() {
    let config = EngineConfig::new(1, 4, 32, 16, 128, 64, 44100);
    let frame_len = config.frame_len;
    let mut engine = engine_with_ones(config);
    let input = noise(400, 3);
    let mut out = vec![0.0f32; input.len()];

    let mut start = 0;
    for block in [1usize, 7, 64, 128, 200] {
        let end = start + block;
        engine
            .process(0, &input[start..end], None, &mut out[start..end], &BlockParams::dry())
            .unwrap();
        start = end;
    }

    assert_eq!(engine.latency(), frame_len);
    for t in 0..frame_len {
        assert_eq!(out[t], 0.0);
    }
    for t in frame_len..input.len() {
        assert_eq!(out[t], input[t - frame_len], "t={t}");
    }
}

#[test]
fn test_block_size_does_not_change_output() {
    let config = EngineConfig::new(1, 8, 64, 32, 256, 256, 44100);
    let input = noise(1024, 11);
    let params = BlockParams::wet().with_mix(0.7).with_gain(0.5, 0.5);

    let mut whole = vec![0.0f32; input.len()];
    let mut engine = engine_with_ones(config.clone());
    engine.process(0, &input, None, &mut whole, &params).unwrap();

    for block in [1usize, 13, 100] {
        let mut engine = engine_with_ones(config.clone());
        let mut split = vec![0.0f32; input.len()];
        for (x, y) in input.chunks(block).zip(split.chunks_mut(block)) {
            engine.process(0, x, None, y, &params).unwrap();
        }
        assert_eq!(split, whole, "block size {block}");
    }
}

#[test]
fn test_passthrough_without_excitation() {
    let mut engine = LpcEngine::new(small_config()).unwrap();
    let input = noise(32, 5);
    let mut out = vec![0.0f32; 32];
    let report = engine
        .process(0, &input, None, &mut out, &BlockParams::wet())
        .unwrap();
    assert!(report.passthrough);
    assert_eq!(out, input);
}

#[test]
fn test_passthrough_keeps_recording_input() {
    let config = small_config();
    let frame_len = config.frame_len;
    let mut engine = LpcEngine::new(config.clone()).unwrap();
    let idx = engine
        .add_excitation("ones", vec![1.0; config.excitation_len])
        .unwrap();
    let input = noise(40, 13);
    let mut out = vec![0.0f32; 40];

    let report = engine
        .process(0, &input[..12], None, &mut out[..12], &BlockParams::dry())
        .unwrap();
    assert!(report.passthrough);
    assert_eq!(
        engine.channel_state(0).unwrap().input_write_pos(),
        12 % config.buffer_len
    );

    // once an excitation is selected the dry path continues from the passed-through samples
    engine.reconfigure(Reconfigure::excitation(Some(idx))).unwrap();
    engine
        .process(0, &input[12..], None, &mut out[12..], &BlockParams::dry())
        .unwrap();
    for t in 12..40 {
        assert_eq!(out[t], input[t - frame_len], "t={t}");
    }
}

#[test]
fn test_prepare_is_idempotent() {
    let config = small_config();
    let mut engine = engine_with_ones(config.clone());
    let input = noise(37, 9);
    let mut out = vec![0.0f32; 37];
    engine
        .process(0, &input, None, &mut out, &BlockParams::wet())
        .unwrap();

    engine.prepare();
    let once = engine.channel_state(0).cloned();
    engine.prepare();
    assert_eq!(engine.channel_state(0).cloned(), once);
    assert_eq!(once, Some(ChannelState::new(&config)));
}

#[test]
fn test_prepare_replays_identically() {
    let mut engine = engine_with_ones(EngineConfig::new(1, 6, 48, 24, 128, 96, 44100));
    let input = noise(300, 21);
    let mut first = vec![0.0f32; 300];
    let mut second = vec![0.0f32; 300];

    engine
        .process(0, &input, None, &mut first, &BlockParams::wet())
        .unwrap();
    engine.prepare();
    engine
        .process(0, &input, None, &mut second, &BlockParams::wet())
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_excitation_cursor_loops_segment() {
    let config = EngineConfig::new(1, 1, 8, 4, 16, 100, 44100);
    let mut engine = LpcEngine::new(config).unwrap();
    let ramp: Vec<f64> = (0..100).map(|i| i as f64 / 100.0).collect();
    engine.add_excitation("ramp", ramp).unwrap();
    // selecting rewinds to the segment start on the next block
    engine.reconfigure(Reconfigure::excitation(Some(0))).unwrap();

    // 10 sample segment starting at 30
    let params = BlockParams::wet().with_excitation_window(0.1, 0.3);
    let input = noise(8, 2);
    let mut out = vec![0.0f32; 8];

    // first hop reads 30..=37
    engine.process(0, &input[..4], None, &mut out[..4], &params).unwrap();
    assert_eq!(engine.excitation_position(0), Some(38));

    // second hop reads 38, 39, then 30..=35
    engine.process(0, &input[4..], None, &mut out[4..], &params).unwrap();
    assert_eq!(engine.excitation_position(0), Some(36));
}

#[test]
fn test_switching_source_rewinds_cursor() {
    let config = EngineConfig::new(1, 2, 8, 4, 16, 100, 44100);
    let mut engine = engine_with_ones(config);
    // 50 sample segment starting at 20
    let params = BlockParams::wet().with_excitation_window(0.5, 0.2);
    let input = noise(4, 4);
    let sidechain = noise(4, 8);
    let mut out = vec![0.0f32; 4];

    // prepared cursor starts at 0, one hop reads 8 samples
    engine.process(0, &input, None, &mut out, &params).unwrap();
    assert_eq!(engine.excitation_position(0), Some(8));

    engine
        .process(0, &input, Some(&sidechain[..]), &mut out, &params)
        .unwrap();
    assert_eq!(engine.excitation_position(0), Some(20));

    // back to internal: rewinds to 20, then one hop of 8 samples
    engine.process(0, &input, None, &mut out, &params).unwrap();
    assert_eq!(engine.excitation_position(0), Some(28));
}

#[test]
fn test_silent_sidechain_gives_silence() {
    let mut engine = engine_with_ones(small_config());
    let input = noise(64, 6);
    let sidechain = vec![0.0f32; 64];
    let mut out = vec![1.0f32; 64];
    engine
        .process(0, &input, Some(&sidechain[..]), &mut out, &BlockParams::wet())
        .unwrap();
    assert!(out.iter().all(|&y| y == 0.0));
}

#[test]
fn test_sidechain_drives_synthesis() {
    let config = EngineConfig::new(1, 4, 32, 16, 128, 64, 44100);
    let input = noise(256, 12);
    let sidechain: Vec<f32> = (0..256).map(|i| (i as f32 * 0.3).sin() * 0.3).collect();

    let run = |sc: &[f32]| {
        let mut engine = engine_with_ones(config.clone());
        let mut out = vec![0.0f32; 256];
        engine
            .process(0, &input, Some(sc), &mut out, &BlockParams::wet())
            .unwrap();
        out
    };
    let a = run(&sidechain[..]);
    let b = run(&sidechain[..]);
    assert_eq!(a, b);
    assert!(a.iter().any(|&y| y != 0.0));
    assert!(a.iter().all(|y| y.is_finite()));
}

#[test]
fn test_order_change_resets_history() {
    let mut engine = engine_with_ones(EngineConfig::new(1, 4, 32, 16, 128, 64, 44100));
    let input = noise(40, 1);
    let mut out = vec![0.0f32; 40];
    engine
        .process(0, &input, None, &mut out, &BlockParams::wet())
        .unwrap();

    engine.reconfigure(Reconfigure::order(2)).unwrap();
    assert_eq!(engine.order(), 2);
    assert_eq!(engine.alphas(0), Some(&[1.0, 0.0, 0.0][..]));
    assert_eq!(engine.channel_state(0).map(|s| s.history_position()), Some(0));

    let err = engine.reconfigure(Reconfigure::order(5));
    assert!(matches!(err, Err(LpcError::InvalidConfig(_))));
    assert_eq!(engine.order(), 2);
}

#[test]
fn test_hop_change_reanchors_deposit() {
    let config = EngineConfig::new(1, 2, 8, 4, 16, 8, 44100);
    let cap = config.buffer_len;
    let mut engine = engine_with_ones(config);
    let input = noise(2, 7);
    let mut out = vec![0.0f32; 2];
    engine
        .process(0, &input, None, &mut out, &BlockParams::wet())
        .unwrap();

    let gap = |e: &LpcEngine| {
        let s = e.channel_state(0).unwrap();
        (s.output_write_pos() + cap - s.output_read_pos()) % cap
    };
    // two samples into a hop of four
    assert_eq!(gap(&engine), 2);

    engine.reconfigure(Reconfigure::hop_size(6)).unwrap();
    assert_eq!(gap(&engine), 4);

    engine.reconfigure(Reconfigure::hop_size(2)).unwrap();
    assert_eq!(gap(&engine), 1);
    assert_eq!(engine.hop_size(), 2);

    // hop past the frame, or too large for the ring
    assert!(engine.reconfigure(Reconfigure::hop_size(9)).is_err());
    assert!(engine.reconfigure(Reconfigure::hop_size(8)).is_err());
    assert!(engine.reconfigure(Reconfigure::hop_size(0)).is_err());
    assert_eq!(engine.hop_size(), 2);
}

#[test]
fn test_shrinking_hop_clears_stale_output() {
    let mut engine = engine_with_ones(small_config());
    // one hop deposits a frame of constant output
    let input = impulse(4, 0);
    let mut out = vec![0.0f32; 4];
    engine
        .process(0, &input, None, &mut out, &BlockParams::wet())
        .unwrap();

    // deposit offset now sits one hop ahead; shrinking to 1 zeros the three
    // samples between the new and old offsets. A silent sidechain keeps the
    // following hops from depositing anything new.
    engine.reconfigure(Reconfigure::hop_size(1)).unwrap();
    let silence = vec![0.0f32; 4];
    let mut tail = vec![0.0f32; 4];
    engine
        .process(0, &silence, Some(&silence[..]), &mut tail, &BlockParams::wet())
        .unwrap();
    let a = hann_window(8)[4] as f32;
    assert_abs_diff_eq!(tail[0], a, epsilon = 1e-6);
    assert_eq!(&tail[1..], &[0.0, 0.0, 0.0]);
}

#[test]
fn test_invalid_reconfigure_changes_nothing() {
    let mut engine = engine_with_ones(small_config());
    let change = Reconfigure::order(1).with_excitation(Some(7));
    assert!(matches!(
        engine.reconfigure(change),
        Err(LpcError::UnknownExcitation(7))
    ));
    assert_eq!(engine.order(), 2);
    assert_eq!(engine.selected_excitation(), Some(0));
}

#[test]
fn test_argument_errors() {
    let mut engine = engine_with_ones(small_config());
    let input = vec![0.0f32; 8];
    let mut out = vec![0.0f32; 8];
    let mut short = vec![0.0f32; 4];
    let p = BlockParams::wet();

    assert!(matches!(
        engine.process(1, &input, None, &mut out, &p),
        Err(LpcError::ChannelOutOfRange { channel: 1, channels: 1 })
    ));
    assert!(matches!(
        engine.process(0, &input, None, &mut short, &p),
        Err(LpcError::BlockLengthMismatch { .. })
    ));
    assert!(matches!(
        engine.process(0, &input, Some(&input[..3]), &mut out, &p),
        Err(LpcError::BlockLengthMismatch { .. })
    ));
    assert!(matches!(
        engine.add_excitation("short", vec![0.0; 3]),
        Err(LpcError::ExcitationTooShort { len: 3, required: 8 })
    ));

    let bigger = EngineConfig::new(1, 2, 8, 4, 16, 64, 44100);
    assert!(matches!(
        engine.set_config(bigger),
        Err(LpcError::ExcitationTooShort { .. })
    ));
}

#[test]
fn test_set_config_resizes_channels() {
    let mut engine = engine_with_ones(small_config());
    let config = EngineConfig::new(3, 4, 16, 8, 64, 8, 48000);
    engine.set_config(config).unwrap();
    assert_eq!(engine.channels(), 3);
    assert_eq!(engine.latency(), 16);
    assert_eq!(engine.selected_excitation(), Some(0));

    let input = noise(50, 13);
    let mut out = vec![0.0f32; 50];
    engine
        .process(2, &input, None, &mut out, &BlockParams::wet())
        .unwrap();
    assert!(out.iter().all(|y| y.is_finite()));
}

#[test]
fn test_output_stays_bounded_and_finite() {
    let config = EngineConfig::new(1, 16, 128, 64, 512, 256, 44100);
    let mut engine = LpcEngine::new(config).unwrap();
    let excitation: Vec<f64> = noise(256, 99).iter().map(|&x| x as f64).collect();
    engine.add_excitation("noise", excitation).unwrap();
    engine.reconfigure(Reconfigure::excitation(Some(0))).unwrap();
    engine.prepare();

    let mut input: Vec<f32> = noise(4096, 17).iter().map(|x| x * 4.0).collect();
    input[1000] = f32::NAN;
    input[2000] = f32::INFINITY;
    let mut out = vec![0.0f32; input.len()];
    let params = BlockParams::wet().with_mix(0.5).with_gain(4.0, 4.0);

    let mut report = BlockReport::default();
    for (x, y) in input.chunks(256).zip(out.chunks_mut(256)) {
        let r = engine.process(0, x, None, y, &params).unwrap();
        report.merge(&r);
    }
    assert!(out.iter().all(|y| y.is_finite() && y.abs() <= 1.0));
    assert!(report.output_altered);
}

#[test]
fn test_reflections_stay_inside_unit_circle() {
    let config = EngineConfig::new(1, 12, 256, 128, 1024, 256, 44100);
    let mut engine = engine_with_ones(config);
    let input: Vec<f32> = (0..2048)
        .map(|i| {
            let t = i as f32 / 44100.0;
            0.4 * (2.0 * std::f32::consts::PI * 220.0 * t).sin()
                + 0.2 * (2.0 * std::f32::consts::PI * 1330.0 * t).sin()
        })
        .collect();
    let mut out = vec![0.0f32; input.len()];
    for (x, y) in input.chunks(128).zip(out.chunks_mut(128)) {
        engine.process(0, x, None, y, &BlockParams::wet()).unwrap();
        if let Some(k) = engine.reflections(0) {
            assert!(k.iter().all(|k| k.abs() < 1.0));
        }
    }
    assert!(engine.gain(0).unwrap() > 0.0);
}

#[test]
fn test_match_input_rms_mode() {
    let config = EngineConfig::new(1, 4, 64, 32, 256, 64, 44100)
        .with_gain_mode(GainMode::MatchInputRms)
        .with_output_limit(false);
    let mut engine = engine_with_ones(config);
    let input = noise(512, 31);
    let mut out = vec![0.0f32; 512];
    let report = engine
        .process(0, &input, None, &mut out, &BlockParams::wet())
        .unwrap();
    assert_eq!(report.negative_energy_hops, 0);
    assert_eq!(engine.gain(0), Some(1.0));
    assert!(out[64..].iter().any(|&y| y != 0.0));
    assert!(out.iter().all(|y| y.is_finite()));
}

#[test]
fn test_highpass_blocks_dc_in_analysis() {
    let config = EngineConfig::new(1, 2, 64, 32, 256, 64, 44100).with_highpass(Some(60.0));
    let mut engine = engine_with_ones(config);
    let input = vec![0.25f32; 512];
    let mut out = vec![0.0f32; 512];
    let report = engine
        .process(0, &input, None, &mut out, &BlockParams::wet())
        .unwrap();
    assert!(report.hops > 0);
    assert!(out.iter().all(|y| y.is_finite()));
}

#[test]
fn test_silence_in_silence_out() {
    let mut engine = engine_with_ones(small_config());
    let input = vec![0.0f32; 64];
    let mut out = vec![1.0f32; 64];
    let report = engine
        .process(0, &input, None, &mut out, &BlockParams::wet())
        .unwrap();
    assert!(out.iter().all(|&y| y == 0.0));
    assert_eq!(report.degenerate_hops, report.hops);
}

#[test]
fn test_pointers_follow_unbounded_model() {
    let config = small_config();
    let (cap, hop) = (config.buffer_len, config.hop_size);
    let mut engine = engine_with_ones(config);
    let input = noise(3 * cap + 5, 8);

    for (t, x) in input.iter().enumerate() {
        let mut y = [0.0f32];
        engine
            .process(0, &[*x], None, &mut y, &BlockParams::wet())
            .unwrap();

        let n = t + 1;
        let state = engine.channel_state(0).unwrap();
        assert_eq!(state.input_write_pos(), n % cap, "n={n}");
        assert_eq!(state.output_read_pos(), n % cap, "n={n}");
        assert_eq!(state.hop_counter(), n % hop, "n={n}");
        assert_eq!(state.output_write_pos(), (hop + hop * (n / hop)) % cap, "n={n}");
    }
}

#[test]
fn test_stationary_sinusoid_converges() {
    let config = EngineConfig::new(1, 4, 64, 32, 256, 64, 44100);
    let mut engine = engine_with_ones(config);
    let period: Vec<f32> = (0..16)
        .map(|i| 0.5 * (2.0 * std::f32::consts::PI * i as f32 / 16.0).sin())
        .collect();
    let input: Vec<f32> = (0..32 * 8).map(|i| period[i % 16]).collect();

    let mut history = Vec::new();
    for block in input.chunks(32) {
        let mut out = vec![0.0f32; 32];
        engine
            .process(0, block, None, &mut out, &BlockParams::wet())
            .unwrap();
        history.push((engine.alphas(0).unwrap().to_vec(), engine.gain(0).unwrap()));
    }

    // once the frame is full of signal every hop sees the same samples
    let last = &history[history.len() - 1];
    for entry in &history[2..] {
        assert_eq!(entry, last);
    }
    assert!(last.1 > 0.0);
}
