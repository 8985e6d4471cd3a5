use serde::{Deserialize, Serialize};

use crate::bins::BinMapper;
use crate::error::{ModemError, Result};

/// Index of the clock channel
pub const CLOCK_CHANNEL: usize = 0;

/// Index of the reference (always low) channel
pub const REFERENCE_CHANNEL: usize = 1;

/// Number of channels that carry no data (clock + reference)
pub const CONTROL_CHANNELS: usize = 2;

/// One tone of the modem
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Tone frequency in Hz
    pub center: f32,
    /// Oscillator mixing level applied by the tone generator
    pub gain: f32,
}

/// Build an evenly spaced channel layout starting at `freq_start`
pub fn generate_channels(count: usize, freq_start: f32, spacing: f32) -> Vec<Channel> {
    (0..count)
        .map(|i| Channel {
            center: freq_start + i as f32 * spacing,
            gain: 0.1,
        })
        .collect()
}

/// Modem configuration shared by the decoder and encoder
///
/// Fixed for the lifetime of a [`crate::Decoder`] or [`crate::Encoder`]; both
/// take it by value and validate it on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Audio sample rate in Hz
    pub sample_rate: u32,
    /// FFT size of the spectral transform (power of two)
    pub transform_block_size: usize,
    /// Samples between two consecutive spectral frames
    pub frame_hop: usize,
    /// Per-bin exponential smoothing of magnitudes, in [0, 1)
    pub smoothing: f32,
    /// Minimum clock-over-reference level in dB that counts as clock high
    pub decode_threshold: f32,
    pub decode_bandpass_q: f32,
    pub encode_bandpass_q: f32,
    /// Channel 0 is the clock, channel 1 the reference, the rest carry data
    pub channels: Vec<Channel>,
    /// Linear gain of a high tone, in [0, 1]
    pub encode_gain_high: f32,
    /// Linear gain of a low tone, in [0, 1]
    pub encode_gain_low: f32,
    /// Symbol duration in milliseconds
    pub symbol_duration: f32,
    /// Pause after each symbol in milliseconds
    pub symbol_pause: f32,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            transform_block_size: 2048,
            frame_hop: 256,
            smoothing: 0.2,
            decode_threshold: 6.0,
            decode_bandpass_q: 0.8,
            encode_bandpass_q: 0.8,
            channels: generate_channels(6, 2000.0, 200.0),
            encode_gain_high: 1.0,
            encode_gain_low: 0.01,
            symbol_duration: 100.0,
            symbol_pause: 50.0,
        }
    }
}

impl ModemConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Bits carried by one symbol
    pub fn data_channel_count(&self) -> usize {
        self.channels.len().saturating_sub(CONTROL_CHANNELS)
    }

    /// Length of a spectral frame (bins below Nyquist)
    pub fn frame_len(&self) -> usize {
        self.transform_block_size / 2
    }

    pub fn bin_mapper(&self) -> BinMapper {
        BinMapper::new(self.sample_rate, self.transform_block_size)
    }

    /// Length of one symbol slot (duration + pause) in seconds
    pub fn slot_seconds(&self) -> f64 {
        (self.symbol_duration as f64 + self.symbol_pause as f64) * 0.001
    }

    /// Band-pass center: midway between the lowest and highest tone
    pub fn bandpass_center(&self) -> f32 {
        match (self.channels.first(), self.channels.last()) {
            (Some(first), Some(last)) => (first.center + last.center) / 2.0,
            _ => 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate must be positive"));
        }
        if self.transform_block_size < 2 || !self.transform_block_size.is_power_of_two() {
            return Err(invalid(format!(
                "transform_block_size must be a power of two, got {}",
                self.transform_block_size
            )));
        }
        if self.frame_hop == 0 {
            return Err(invalid("frame_hop must be positive"));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(invalid(format!("smoothing must be in [0, 1), got {}", self.smoothing)));
        }
        if !self.decode_threshold.is_finite() {
            return Err(invalid("decode_threshold must be finite"));
        }
        if !(self.decode_bandpass_q > 0.0) || !(self.encode_bandpass_q > 0.0) {
            return Err(invalid("band-pass Q factors must be positive"));
        }
        for (name, gain) in [("encode_gain_high", self.encode_gain_high), ("encode_gain_low", self.encode_gain_low)] {
            if !(0.0..=1.0).contains(&gain) {
                return Err(invalid(format!("{} must be in [0, 1], got {}", name, gain)));
            }
        }
        if self.encode_gain_high <= self.encode_gain_low {
            return Err(invalid("encode_gain_high must be above encode_gain_low"));
        }
        if !(self.symbol_duration >= 0.0) || !(self.symbol_pause >= 0.0) {
            return Err(invalid("symbol_duration and symbol_pause must be non-negative"));
        }
        if !(self.symbol_duration + self.symbol_pause > 0.0) {
            return Err(invalid("symbol slot (duration + pause) must be positive"));
        }

        self.validate_channels()
    }

    fn validate_channels(&self) -> Result<()> {
        if self.channels.len() < CONTROL_CHANNELS {
            return Err(invalid(format!(
                "need at least {} channels (clock + reference), got {}",
                CONTROL_CHANNELS,
                self.channels.len()
            )));
        }

        let nyquist = self.sample_rate as f32 / 2.0;
        let mapper = self.bin_mapper();
        let mut prev: Option<(f32, usize)> = None;

        for (i, channel) in self.channels.iter().enumerate() {
            if !(channel.center > 0.0 && channel.center < nyquist) {
                return Err(invalid(format!(
                    "channel {} frequency {} Hz outside (0, {}) Hz",
                    i, channel.center, nyquist
                )));
            }
            if !(channel.gain >= 0.0) {
                return Err(invalid(format!("channel {} gain must be non-negative", i)));
            }

            let bin = mapper.bin(channel.center);
            if bin >= self.frame_len() {
                return Err(invalid(format!("channel {} maps past the last bin", i)));
            }
            if let Some((prev_freq, prev_bin)) = prev {
                if channel.center <= prev_freq {
                    return Err(invalid(format!(
                        "channel frequencies must increase: {} Hz follows {} Hz",
                        channel.center, prev_freq
                    )));
                }
                if bin == prev_bin {
                    return Err(invalid(format!(
                        "channels {} and {} share bin {} ({} Hz bins)",
                        i - 1,
                        i,
                        bin,
                        mapper.bin_size()
                    )));
                }
            }
            prev = Some((channel.center, bin));
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ModemError {
    ModemError::InvalidConfig(msg.into())
}
