use std::f64::consts::TAU;

use crate::config::{Channel, ModemConfig};
use crate::error::{ModemError, Result};
use crate::timeline::{EncodeTimeline, Setpoint};

/// Length of the sine-squared ramp applied to every gain change
pub const RAMP_SECONDS: f64 = 0.010;

/// Longest range a single render call will produce
pub const MAX_RENDER_SECONDS: f64 = 3600.0;

/// Gain envelope of one channel with each setpoint eased in over
/// [`RAMP_SECONDS`] instead of switched in one sample
///
/// A hard gate leaks into neighbouring bins, enough at shutdown to lift the
/// clock bin over the reference.
struct Envelope<'a> {
    points: &'a [Setpoint],
    next: usize,
    from_gain: f32,
    to_gain: f32,
    ramp_start: f64,
}

impl<'a> Envelope<'a> {
    fn new(points: &'a [Setpoint]) -> Self {
        Self {
            points,
            next: 0,
            from_gain: 0.0,
            to_gain: 0.0,
            ramp_start: f64::NEG_INFINITY,
        }
    }

    fn level(&self, t: f64) -> f32 {
        let elapsed = t - self.ramp_start;
        if elapsed >= RAMP_SECONDS {
            return self.to_gain;
        }
        let progress = (elapsed / RAMP_SECONDS).max(0.0);
        let shape = (std::f64::consts::FRAC_PI_2 * progress).sin().powi(2) as f32;
        self.from_gain + (self.to_gain - self.from_gain) * shape
    }

    /// Gain at `t`; calls must come in non-decreasing time order
    fn gain_at(&mut self, t: f64) -> f32 {
        while self.next < self.points.len() && self.points[self.next].time <= t {
            let point = self.points[self.next];
            self.from_gain = self.level(point.time);
            self.to_gain = point.gain;
            self.ramp_start = point.time;
            self.next += 1;
        }
        self.level(t)
    }
}

/// Tone generator and mixer
///
/// One free-running sine oscillator per channel, each scaled by its
/// channel gain and by the timeline's gain at every sample, summed into a
/// mono buffer. Gain changes are ramped, so a channel reaches its new level
/// [`RAMP_SECONDS`] after the setpoint.
#[derive(Debug, Clone)]
pub struct ToneSynth {
    sample_rate: u32,
    channels: Vec<Channel>,
}

impl ToneSynth {
    pub fn new(config: &ModemConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels.clone(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Render `timeline` over `[from, to)` seconds on the audio clock
    ///
    /// Sample `n` is taken at time `from + n / sample_rate`.
    pub fn render(&self, timeline: &EncodeTimeline, from: f64, to: f64) -> Result<Vec<f32>> {
        if timeline.channels().len() != self.channels.len() {
            return Err(ModemError::InvalidConfig(format!(
                "timeline has {} channels, synth has {}",
                timeline.channels().len(),
                self.channels.len()
            )));
        }
        if !from.is_finite() || !to.is_finite() || to < from || to - from > MAX_RENDER_SECONDS {
            return Err(ModemError::InvalidInputRange { from, to });
        }

        let rate = self.sample_rate as f64;
        let len = ((to - from) * rate).round() as usize;
        let mut out = vec![0.0f32; len];

        for (channel, gains) in self.channels.iter().zip(timeline.channels()) {
            let mut envelope = Envelope::new(gains.setpoints());
            let step = TAU * channel.center as f64 / rate;

            for (n, sample) in out.iter_mut().enumerate() {
                let t = from + n as f64 / rate;
                let gain = envelope.gain_at(t);
                if gain != 0.0 {
                    let phase = (step * (n as f64 + from * rate)) % TAU;
                    *sample += channel.gain * gain * phase.sin() as f32;
                }
            }
        }

        Ok(out)
    }

    /// Render from time zero to the end of the transmission plus `tail` seconds
    pub fn render_transmission(&self, timeline: &EncodeTimeline, tail: f64) -> Result<Vec<f32>> {
        self.render(timeline, 0.0, timeline.stop_time() + tail)
    }
}
