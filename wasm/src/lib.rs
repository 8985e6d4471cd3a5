use clocktone_core::spectrum::MIN_DECIBELS;
use clocktone_core::{Decoder, DecoderObserver, EncodeTimeline, Encoder, FrameOutcome, ModemConfig, ModemError};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{AnalyserNode, AudioContext, GainNode};

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn parse_config(config_json: Option<String>) -> Result<ModemConfig, JsValue> {
    match config_json {
        Some(json) => ModemConfig::from_json(&json).map_err(to_js),
        None => Ok(ModemConfig::default()),
    }
}

/// Split a flat 0/1 array into symbols of `bits_per_symbol` bits
fn unflatten_bits(bits: &[u8], bits_per_symbol: usize) -> Result<Vec<Vec<bool>>, String> {
    if bits_per_symbol == 0 {
        return if bits.is_empty() {
            Ok(Vec::new())
        } else {
            Err("configuration has no data channels".to_string())
        };
    }
    if bits.len() % bits_per_symbol != 0 {
        return Err(format!(
            "{} bits is not a whole number of {}-bit symbols",
            bits.len(),
            bits_per_symbol
        ));
    }
    Ok(bits
        .chunks(bits_per_symbol)
        .map(|chunk| chunk.iter().map(|&b| b != 0).collect())
        .collect())
}

/// Browsers report silent bins as -Infinity; pin them to the analyzer floor
fn sanitize_frame(frame: &mut [f32]) {
    for m in frame.iter_mut() {
        if !m.is_finite() {
            *m = MIN_DECIBELS;
        }
    }
}

/// Copy a caller-supplied frame into the decoder's buffer
///
/// The buffer keeps its configured length; a frame of any other length is
/// rejected and the buffer left as it was.
fn load_frame(buffer: &mut [f32], frame: &[f32]) -> Result<(), ModemError> {
    if frame.len() != buffer.len() {
        return Err(ModemError::InvalidFrameLength {
            expected: buffer.len(),
            actual: frame.len(),
        });
    }
    buffer.copy_from_slice(frame);
    sanitize_frame(buffer);
    Ok(())
}

/// Default config with the sample rate of a live audio context
#[wasm_bindgen(js_name = configForContext)]
pub fn config_for_context(ctx: &AudioContext, config_json: Option<String>) -> Result<String, JsValue> {
    let mut config = parse_config(config_json)?;
    config.sample_rate = ctx.sample_rate() as u32;
    config.validate().map_err(to_js)?;
    config.to_json().map_err(to_js)
}

struct JsSymbolObserver {
    on_symbol: js_sys::Function,
}

impl DecoderObserver for JsSymbolObserver {
    fn on_symbol(&mut self, symbol: &[bool]) {
        let bits = js_sys::Array::new();
        for &bit in symbol {
            bits.push(&JsValue::from_bool(bit));
        }
        // a throwing callback must not take the decoder down with it
        if let Err(e) = self.on_symbol.call1(&JsValue::NULL, &bits) {
            log::warn!("symbol callback threw: {:?}", e);
        }
    }
}

#[wasm_bindgen]
pub struct WasmDecoder {
    inner: Decoder<JsSymbolObserver>,
    frame: Vec<f32>,
    fft_size: u32,
    smoothing: f64,
}

#[wasm_bindgen]
impl WasmDecoder {
    /// `on_symbol` is called with an array of booleans per decoded symbol
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>, on_symbol: js_sys::Function) -> Result<WasmDecoder, JsValue> {
        let config = parse_config(config_json)?;
        let frame = vec![MIN_DECIBELS; config.frame_len()];
        let fft_size = config.transform_block_size as u32;
        let smoothing = config.smoothing as f64;
        Decoder::new(config, JsSymbolObserver { on_symbol })
            .map(|inner| WasmDecoder {
                inner,
                frame,
                fft_size,
                smoothing,
            })
            .map_err(to_js)
    }

    /// Apply the configured FFT size and smoothing to an analyser node
    #[wasm_bindgen(js_name = configureAnalyser)]
    pub fn configure_analyser(&self, analyser: &AnalyserNode) {
        analyser.set_fft_size(self.fft_size);
        analyser.set_smoothing_time_constant(self.smoothing);
    }

    /// Read the analyser's current spectrum and decode it
    ///
    /// Call once per audio processing block. Returns true when a symbol was
    /// emitted.
    #[wasm_bindgen]
    pub fn poll(&mut self, analyser: &AnalyserNode) -> Result<bool, JsValue> {
        analyser.get_float_frequency_data(&mut self.frame);
        sanitize_frame(&mut self.frame);
        let outcome = self.inner.process_frame(&self.frame).map_err(to_js)?;
        Ok(matches!(outcome, FrameOutcome::Symbol(_)))
    }

    /// Decode one frame of dB magnitudes
    #[wasm_bindgen(js_name = processFrame)]
    pub fn process_frame(&mut self, frame: &[f32]) -> Result<bool, JsValue> {
        load_frame(&mut self.frame, frame).map_err(to_js)?;
        let outcome = self.inner.process_frame(&self.frame).map_err(to_js)?;
        Ok(matches!(outcome, FrameOutcome::Symbol(_)))
    }

    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.inner.reset();
    }
}

#[wasm_bindgen]
pub struct WasmEncoder {
    inner: Encoder,
}

#[wasm_bindgen]
impl WasmEncoder {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<WasmEncoder, JsValue> {
        let config = parse_config(config_json)?;
        Encoder::new(config)
            .map(|encoder| WasmEncoder { inner: encoder })
            .map_err(to_js)
    }

    fn timeline(&self, bits: &[u8], start_time: f64) -> Result<EncodeTimeline, JsValue> {
        let symbols = unflatten_bits(bits, self.inner.config().data_channel_count()).map_err(to_js)?;
        self.inner.encode(&symbols, start_time).map_err(to_js)
    }

    /// Gain timeline as JSON; `bits` is a flat 0/1 array, one symbol after another
    #[wasm_bindgen(js_name = timelineJson)]
    pub fn timeline_json(&self, bits: &[u8], start_time: f64) -> Result<String, JsValue> {
        let timeline = self.timeline(bits, start_time)?;
        serde_json::to_string(&timeline).map_err(to_js)
    }

    /// Schedule the transmission on one gain node per channel
    ///
    /// Returns the time at which every channel is silenced.
    #[wasm_bindgen]
    pub fn schedule(&self, gains: js_sys::Array, bits: &[u8], start_time: f64) -> Result<f64, JsValue> {
        let timeline = self.timeline(bits, start_time)?;
        let nodes = gain_nodes(&gains, timeline.channels().len())?;

        for (node, channel) in nodes.iter().zip(timeline.channels()) {
            let param = node.gain();
            for setpoint in channel.setpoints() {
                param.set_value_at_time(setpoint.gain, setpoint.time)?;
            }
        }

        Ok(timeline.stop_time())
    }

    /// Cancel anything scheduled after `at` and silence every channel
    #[wasm_bindgen]
    pub fn abort(&self, gains: js_sys::Array, at: f64) -> Result<(), JsValue> {
        let nodes = gain_nodes(&gains, self.inner.config().channel_count())?;
        for node in nodes {
            let param = node.gain();
            param.cancel_scheduled_values(at)?;
            param.set_value_at_time(0.0, at)?;
        }
        Ok(())
    }
}

fn gain_nodes(gains: &js_sys::Array, expected: usize) -> Result<Vec<GainNode>, JsValue> {
    if gains.length() as usize != expected {
        return Err(JsValue::from_str(&format!(
            "expected {} gain nodes, got {}",
            expected,
            gains.length()
        )));
    }
    gains
        .iter()
        .map(|value| {
            value
                .dyn_into::<GainNode>()
                .map_err(|_| JsValue::from_str("gains must contain GainNode objects"))
        })
        .collect()
}
