//! Clock-synchronized multi-tone acoustic modem
//!
//! One tone carries a clock pulse per symbol, one tone is held low as a noise
//! floor reference, and every other tone carries one amplitude-keyed bit.
//! [`Encoder`] turns symbols into a per-channel gain timeline, [`Decoder`]
//! turns a stream of spectral frames back into symbols.

pub mod bins;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod filter;
pub mod spectrum;
pub mod synth;
pub mod timeline;

pub use bins::BinMapper;
pub use config::{generate_channels, Channel, ModemConfig};
pub use decoder::{
    CallbackObserver, Decoder, DecoderObserver, DecoderState, FrameOutcome, FrameSource,
    SymbolCollector,
};
pub use encoder::Encoder;
pub use error::{ModemError, Result};
pub use filter::BandPass;
pub use spectrum::{SampleFrameSource, SpectrumAnalyzer};
pub use synth::ToneSynth;
pub use timeline::{ChannelTimeline, EncodeTimeline, Setpoint};

/// Symbol as transmitted: one bit per data channel
pub type Symbol = Vec<bool>;

/// Render `symbols` to band-limited audio starting `lead_in` seconds into the buffer
///
/// Runs the whole transmit chain: schedule, tone generation, then the
/// transmit band-pass. `tail` seconds of silence follow the last symbol.
pub fn transmit<S: AsRef<[bool]>>(
    config: &ModemConfig,
    symbols: &[S],
    lead_in: f64,
    tail: f64,
) -> Result<Vec<f32>> {
    let encoder = Encoder::new(config.clone())?;
    let timeline = encoder.encode(symbols, lead_in)?;
    let mut samples = ToneSynth::new(config).render_transmission(&timeline, tail)?;
    BandPass::for_encode(config)?.process(&mut samples);
    Ok(samples)
}

/// Decode every symbol in a recorded buffer
///
/// Runs the receive band-pass and spectral analysis over `samples`, feeding
/// one frame per hop into a fresh decoder.
pub fn receive(config: &ModemConfig, samples: &[f32]) -> Result<Vec<Symbol>> {
    let mut filtered = samples.to_vec();
    BandPass::for_decode(config)?.process(&mut filtered);

    let mut decoder = Decoder::new(config.clone(), SymbolCollector::default())?;
    let mut source = SampleFrameSource::new(&filtered, config)?;
    let frames = decoder.run(&mut source)?;
    if let Some(e) = source.take_error() {
        return Err(e);
    }

    let symbols = decoder.into_observer().symbols;
    log::info!("decoded {} symbols from {} frames", symbols.len(), frames);
    Ok(symbols)
}
