#![allow(clippy::needless_range_loop)]

use wasm_bindgen::prelude::*;

pub mod analysis;
pub mod core;
pub mod engine;
pub mod synthesis;

pub use analysis::{
    analyze_frame, autocorrelation, is_stable, levinson_durbin, synthesis_gain, LpcFrame,
    OnePoleHighpass,
};
pub use core::{
    db_to_gain, hann_window, EngineConfig, ExcitationKind, GainMode, LpcError, LpcResult,
    RingBuffer, DEFAULT_HIGHPASS_HZ, DEFAULT_SAMPLE_RATE, MAX_FRAME_DURATION_MS, MAX_ORDER,
    MAX_WET_GAIN_DB, MIN_EX_PERCENTAGE, MIN_FRAME_DURATION_MS, MIN_ORDER, MIN_WET_GAIN_DB,
};
pub use engine::{
    AtomicF32, BlockParams, BlockReport, ChannelState, LpcEngine, LpcProcessor, ParamSnapshot,
    Reconfigure, SharedParams,
};
pub use synthesis::{ExcitationBank, ExcitationCursor, ExcitationSegment};

// result helpers

/// turn an error into js
fn to_js_err(e: LpcError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

// api functions

/// Get library version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Install the panic hook so panics show up in the browser console
#[wasm_bindgen]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

/// LPC engine for the browser
///
/// Holds its own block parameters; setters take effect on the next `process`.
#[wasm_bindgen]
pub struct WasmLpcEngine {
    inner: LpcEngine,
    params: BlockParams,
    wet_gain: f32,
}

#[wasm_bindgen]
impl WasmLpcEngine {
    /// Create an engine from a config object, `undefined` for defaults
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<WasmLpcEngine, JsValue> {
        let config: EngineConfig = if config.is_undefined() || config.is_null() {
            EngineConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?
        };
        Self::build(config)
    }

    /// Create an engine from a JSON config string
    #[wasm_bindgen(js_name = fromJson)]
    pub fn from_json(json: &str) -> Result<WasmLpcEngine, JsValue> {
        Self::build(EngineConfig::from_json(json).map_err(to_js_err)?)
    }

    /// Current config as a plain object
    #[wasm_bindgen]
    pub fn config(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(self.inner.config())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Reset all runtime state
    #[wasm_bindgen]
    pub fn prepare(&mut self) {
        self.inner.prepare();
        self.params.previous_gain = self.wet_gain;
        self.params.current_gain = self.wet_gain;
    }

    /// add an excitation buffer, returns its index
    #[wasm_bindgen]
    pub fn add_excitation(&mut self, name: &str, samples: &[f32]) -> Result<u32, JsValue> {
        self.inner
            .add_excitation_f32(name, samples)
            .map(|i| i as u32)
            .map_err(to_js_err)
    }

    /// select an internal excitation, or none for pass-through
    #[wasm_bindgen]
    pub fn select_excitation(&mut self, index: Option<u32>) -> Result<(), JsValue> {
        self.inner
            .reconfigure(Reconfigure::excitation(index.map(|i| i as usize)))
            .map_err(to_js_err)
    }

    #[wasm_bindgen]
    pub fn set_order(&mut self, order: u32) -> Result<(), JsValue> {
        self.inner
            .reconfigure(Reconfigure::order(order as usize))
            .map_err(to_js_err)
    }

    #[wasm_bindgen]
    pub fn set_hop_size(&mut self, hop_size: u32) -> Result<(), JsValue> {
        self.inner
            .reconfigure(Reconfigure::hop_size(hop_size as usize))
            .map_err(to_js_err)
    }

    #[wasm_bindgen]
    pub fn set_mix(&mut self, lpc_mix: f32) {
        self.params.lpc_mix = lpc_mix.clamp(0.0, 1.0);
    }

    /// excitation loop length and start, both fractions of the buffer
    #[wasm_bindgen]
    pub fn set_excitation_window(&mut self, percentage: f32, start: f32) {
        self.params.ex_percentage = percentage.clamp(MIN_EX_PERCENTAGE, 1.0);
        self.params.ex_start_pos = start.clamp(0.0, 1.0);
    }

    /// wet gain in dB, ramped in over the next block
    #[wasm_bindgen]
    pub fn set_wet_gain_db(&mut self, db: f32) {
        self.wet_gain = db_to_gain(db.clamp(MIN_WET_GAIN_DB, MAX_WET_GAIN_DB));
    }

    /// Process one block of one channel
    ///
    /// Pass a sidechain block of the same length to use it as excitation.
    #[wasm_bindgen]
    pub fn process(
        &mut self,
        channel: u32,
        input: &[f32],
        sidechain: Option<Vec<f32>>,
    ) -> Result<Vec<f32>, JsValue> {
        let mut output = vec![0.0f32; input.len()];
        self.params.current_gain = self.wet_gain;
        self.inner
            .process(
                channel as usize,
                input,
                sidechain.as_deref(),
                &mut output,
                &self.params,
            )
            .map_err(to_js_err)?;
        // the ramp is per channel block; advance it once the last channel is done
        if channel as usize + 1 == self.inner.channels() {
            self.params.previous_gain = self.wet_gain;
        }
        Ok(output)
    }

    /// predictor coefficients from the last analysed frame
    #[wasm_bindgen]
    pub fn alphas(&self, channel: u32) -> Vec<f64> {
        self.inner
            .alphas(channel as usize)
            .map(|a| a.to_vec())
            .unwrap_or_default()
    }

    /// reflection coefficients from the last analysed frame
    #[wasm_bindgen]
    pub fn reflections(&self, channel: u32) -> Vec<f64> {
        self.inner
            .reflections(channel as usize)
            .map(|k| k.to_vec())
            .unwrap_or_default()
    }

    /// dry path delay in samples
    #[wasm_bindgen]
    pub fn latency(&self) -> u32 {
        self.inner.latency() as u32
    }
}

impl WasmLpcEngine {
    fn build(config: EngineConfig) -> Result<WasmLpcEngine, JsValue> {
        Ok(WasmLpcEngine {
            inner: LpcEngine::new(config).map_err(to_js_err)?,
            params: BlockParams::wet(),
            wet_gain: 1.0,
        })
    }
}
