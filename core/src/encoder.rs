use crate::config::{ModemConfig, CLOCK_CHANNEL, CONTROL_CHANNELS, REFERENCE_CHANNEL};
use crate::error::{ModemError, Result};
use crate::timeline::EncodeTimeline;

/// Fraction of the slot at which the clock goes high
const CLOCK_RISE_FRACTION: f64 = 0.25;

/// Fraction of the slot at which the clock goes low again
const CLOCK_FALL_FRACTION: f64 = 0.75;

/// Encoder scheduling symbols as per-channel gain steps
///
/// Each symbol occupies one slot of `symbol_duration + symbol_pause`. Data
/// channels switch to their bit level at the start of the slot and hold it;
/// the clock pulses high over the middle half of the slot so the receiver
/// samples the data while it is stable. The reference channel is held at the
/// low gain for the whole transmission.
///
/// The encoder only computes the schedule; rendering it is up to the caller
/// (see [`crate::ToneSynth`]).
#[derive(Debug, Clone)]
pub struct Encoder {
    config: ModemConfig,
}

impl Encoder {
    pub fn new(config: ModemConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Check every symbol carries one bit per data channel
    pub fn check_symbols<S: AsRef<[bool]>>(&self, symbols: &[S]) -> Result<()> {
        let expected = self.config.data_channel_count();
        for (index, symbol) in symbols.iter().enumerate() {
            let actual = symbol.as_ref().len();
            if actual != expected {
                return Err(ModemError::SymbolLengthMismatch {
                    index,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Schedule `symbols` starting at `start_time` (seconds on the audio clock)
    ///
    /// All symbols are validated before anything is scheduled.
    pub fn encode<S: AsRef<[bool]>>(&self, symbols: &[S], start_time: f64) -> Result<EncodeTimeline> {
        if !start_time.is_finite() {
            return Err(ModemError::InvalidInputRange {
                from: start_time,
                to: start_time,
            });
        }
        self.check_symbols(symbols)?;

        let slot = self.config.slot_seconds();
        let high = self.config.encode_gain_high;
        let low = self.config.encode_gain_low;
        let stop_time = start_time + symbols.len() as f64 * slot;
        let mut timeline = EncodeTimeline::new(self.config.channel_count(), start_time, stop_time);

        timeline.channel_mut(REFERENCE_CHANNEL).set(start_time, low);

        for (i, symbol) in symbols.iter().enumerate() {
            let t = start_time + i as f64 * slot;

            let clock = timeline.channel_mut(CLOCK_CHANNEL);
            clock.set(t + slot * CLOCK_RISE_FRACTION, high);
            clock.set(t + slot * CLOCK_FALL_FRACTION, low);

            for (j, &bit) in symbol.as_ref().iter().enumerate() {
                timeline
                    .channel_mut(j + CONTROL_CHANNELS)
                    .set(t, if bit { high } else { low });
            }
        }

        for channel in 0..self.config.channel_count() {
            timeline.channel_mut(channel).set(stop_time, 0.0);
        }

        log::info!(
            "scheduled {} symbols from {:.3}s to {:.3}s ({:.3}s)",
            symbols.len(),
            start_time,
            stop_time,
            stop_time - start_time
        );

        Ok(timeline)
    }

    /// Silence every channel of `timeline` at `at`, cutting the transmission short
    ///
    /// Setpoints after `at` are dropped.
    pub fn abort(&self, timeline: &EncodeTimeline, at: f64) -> EncodeTimeline {
        let stop_time = if at.is_nan() {
            timeline.start_time()
        } else {
            at.clamp(timeline.start_time(), timeline.stop_time())
        };
        let mut aborted = EncodeTimeline::new(timeline.channels().len(), timeline.start_time(), stop_time);

        for (index, channel) in timeline.channels().iter().enumerate() {
            let target = aborted.channel_mut(index);
            for setpoint in channel.setpoints().iter().filter(|s| s.time < stop_time) {
                target.set(setpoint.time, setpoint.gain);
            }
            target.set(stop_time, 0.0);
        }

        log::info!("transmission aborted at {:.3}s", stop_time);
        aborted
    }
}
