use std::sync::mpsc::Sender;

use crate::config::{ModemConfig, CLOCK_CHANNEL, CONTROL_CHANNELS, REFERENCE_CHANNEL};
use crate::error::{ModemError, Result};

/// Receives decoder notifications
///
/// `on_frame` fires for every frame before it is decoded, `on_symbol` once
/// per decoded symbol with exactly `channel_count - 2` bits.
pub trait DecoderObserver {
    fn on_frame(&mut self, _frame: &[f32]) {}

    fn on_symbol(&mut self, symbol: &[bool]);
}

/// Anything that delivers spectral frames (dB magnitudes indexed by bin)
///
/// Returning `None` detaches the source; the decoder stops pulling.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<&[f32]>;
}

/// Collects decoded symbols in memory
#[derive(Debug, Default, Clone)]
pub struct SymbolCollector {
    pub symbols: Vec<Vec<bool>>,
    pub frames_seen: usize,
}

impl DecoderObserver for SymbolCollector {
    fn on_frame(&mut self, _frame: &[f32]) {
        self.frames_seen += 1;
    }

    fn on_symbol(&mut self, symbol: &[bool]) {
        self.symbols.push(symbol.to_vec());
    }
}

/// Forwards symbols over a channel to another thread
impl DecoderObserver for Sender<Vec<bool>> {
    fn on_symbol(&mut self, symbol: &[bool]) {
        if self.send(symbol.to_vec()).is_err() {
            log::debug!("symbol receiver dropped, discarding symbol");
        }
    }
}

/// Observer built from closures; the frame callback is optional
pub struct CallbackObserver<S, F = fn(&[f32])>
where
    S: FnMut(&[bool]),
    F: FnMut(&[f32]),
{
    on_symbol: S,
    on_frame: Option<F>,
}

impl<S> CallbackObserver<S>
where
    S: FnMut(&[bool]),
{
    pub fn new(on_symbol: S) -> Self {
        Self {
            on_symbol,
            on_frame: None,
        }
    }
}

impl<S, F> CallbackObserver<S, F>
where
    S: FnMut(&[bool]),
    F: FnMut(&[f32]),
{
    pub fn with_frame_callback(on_symbol: S, on_frame: F) -> Self {
        Self {
            on_symbol,
            on_frame: Some(on_frame),
        }
    }
}

impl<S, F> DecoderObserver for CallbackObserver<S, F>
where
    S: FnMut(&[bool]),
    F: FnMut(&[f32]),
{
    fn on_frame(&mut self, frame: &[f32]) {
        if let Some(cb) = self.on_frame.as_mut() {
            cb(frame);
        }
    }

    fn on_symbol(&mut self, symbol: &[bool]) {
        (self.on_symbol)(symbol)
    }
}

/// Mutable per-stream decoder state
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderState {
    /// Clock level seen on the previous frame
    pub clock_level: bool,
    /// Running magnitude sums, one per channel
    pub averages: Vec<f32>,
    /// Frames accumulated since the last rising edge
    pub collected: usize,
}

impl DecoderState {
    fn new(channel_count: usize) -> Self {
        Self {
            clock_level: false,
            averages: vec![0.0; channel_count],
            collected: 0,
        }
    }

    fn restart_window(&mut self) {
        self.averages.iter_mut().for_each(|a| *a = 0.0);
        self.collected = 0;
    }
}

/// What one frame did to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Clock held low
    Idle,
    /// Clock went high, window restarted
    RisingEdge,
    /// Clock held high, frame accumulated
    Collecting,
    /// Clock went low and a symbol was emitted
    Symbol(Vec<bool>),
    /// Clock went low before any frame was collected
    TruncatedWindow,
    /// Clock and reference averaged to the same level, symbol dropped
    DegenerateCalibration,
}

/// Clock-synchronized multi-tone decoder
///
/// Channel 0 carries a clock pulse per symbol, channel 1 is never keyed and
/// serves as the noise floor. While the clock is high every channel's
/// magnitude is summed; on the falling edge each data channel is thresholded
/// halfway between the averaged reference and clock levels, so the decision
/// level is recalibrated on every symbol.
pub struct Decoder<O: DecoderObserver> {
    frame_len: usize,
    decode_threshold: f32,
    /// Bin index of each channel, aligned with `state.averages`
    bins: Vec<usize>,
    state: DecoderState,
    observer: O,
}

impl<O: DecoderObserver> Decoder<O> {
    pub fn new(config: ModemConfig, observer: O) -> Result<Self> {
        config.validate()?;

        let mapper = config.bin_mapper();
        let bins: Vec<usize> = config.channels.iter().map(|c| mapper.bin(c.center)).collect();
        log::debug!(
            "decoder bins {:?} ({} Hz per bin, threshold {} dB)",
            bins,
            mapper.bin_size(),
            config.decode_threshold
        );

        Ok(Self {
            frame_len: config.frame_len(),
            decode_threshold: config.decode_threshold,
            state: DecoderState::new(bins.len()),
            bins,
            observer,
        })
    }

    pub fn state(&self) -> &DecoderState {
        &self.state
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }

    /// Bin index sampled for each channel
    pub fn bins(&self) -> &[usize] {
        &self.bins
    }

    /// Return to clock-low with an empty window
    pub fn reset(&mut self) {
        self.state.clock_level = false;
        self.state.restart_window();
    }

    /// Pull frames until the source detaches; returns the number processed
    pub fn run<S: FrameSource>(&mut self, source: &mut S) -> Result<usize> {
        let mut frames = 0;
        while let Some(frame) = source.next_frame() {
            self.process_frame(frame)?;
            frames += 1;
        }
        Ok(frames)
    }

    /// Advance the state machine by one spectral frame
    pub fn process_frame(&mut self, frame: &[f32]) -> Result<FrameOutcome> {
        if frame.len() != self.frame_len {
            return Err(ModemError::InvalidFrameLength {
                expected: self.frame_len,
                actual: frame.len(),
            });
        }

        self.observer.on_frame(frame);

        let clock = frame[self.bins[CLOCK_CHANNEL]];
        let reference = frame[self.bins[REFERENCE_CHANNEL]];
        let clock_level = clock - reference > self.decode_threshold;

        let outcome = match (self.state.clock_level, clock_level) {
            (false, true) => {
                self.state.clock_level = true;
                self.state.restart_window();
                log::trace!("clock rising edge ({:.1} dB over reference)", clock - reference);
                FrameOutcome::RisingEdge
            }
            (true, false) => {
                self.state.clock_level = false;
                self.finish_window()
            }
            (true, true) => {
                for (sum, &bin) in self.state.averages.iter_mut().zip(&self.bins) {
                    *sum += frame[bin];
                }
                self.state.collected += 1;
                FrameOutcome::Collecting
            }
            (false, false) => FrameOutcome::Idle,
        };

        Ok(outcome)
    }

    fn finish_window(&mut self) -> FrameOutcome {
        let collected = self.state.collected;
        if collected == 0 {
            log::debug!("clock falling edge with no collected frames, ignoring");
            return FrameOutcome::TruncatedWindow;
        }

        let n = collected as f32;
        let bit_high = self.state.averages[CLOCK_CHANNEL] / n;
        let bit_low = self.state.averages[REFERENCE_CHANNEL] / n;
        let span = bit_high - bit_low;
        if span == 0.0 || !span.is_finite() {
            log::warn!(
                "undecodable symbol: clock {} dB vs reference {} dB over {} frames",
                bit_high,
                bit_low,
                collected
            );
            return FrameOutcome::DegenerateCalibration;
        }

        let bits: Vec<bool> = self.state.averages[CONTROL_CHANNELS..]
            .iter()
            .map(|&sum| (sum / n - bit_low) / span > 0.5)
            .collect();

        log::debug!(
            "symbol {:?} from {} frames (clock-reference span {:.1} dB)",
            bits,
            collected,
            span
        );
        self.observer.on_symbol(&bits);
        FrameOutcome::Symbol(bits)
    }
}
