use std::f32::consts::PI;

use crate::config::ModemConfig;
use crate::error::{ModemError, Result};

/// Second-order band-pass (RBJ cookbook, 0 dB peak gain)
///
/// Used on both ends to keep everything outside the modem's tone band out of
/// the signal path. Centered midway between the lowest and highest channel.
#[derive(Debug, Clone)]
pub struct BandPass {
    b0: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BandPass {
    pub fn new(center: f32, q: f32, sample_rate: u32) -> Result<Self> {
        let nyquist = sample_rate as f32 / 2.0;
        if !(center > 0.0 && center < nyquist) || !(q > 0.0) {
            return Err(ModemError::InvalidConfig(format!(
                "band-pass center {} Hz / Q {} invalid at {} Hz",
                center, q, sample_rate
            )));
        }

        let w0 = 2.0 * PI * center / sample_rate as f32;
        let alpha = w0.sin() / (2.0 * q);
        let a0 = 1.0 + alpha;

        Ok(Self {
            b0: alpha / a0,
            b2: -alpha / a0,
            a1: -2.0 * w0.cos() / a0,
            a2: (1.0 - alpha) / a0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        })
    }

    /// Receive-side filter (`decode_bandpass_q`)
    pub fn for_decode(config: &ModemConfig) -> Result<Self> {
        Self::new(config.bandpass_center(), config.decode_bandpass_q, config.sample_rate)
    }

    /// Transmit-side filter (`encode_bandpass_q`)
    pub fn for_encode(config: &ModemConfig) -> Result<Self> {
        Self::new(config.bandpass_center(), config.encode_bandpass_q, config.sample_rate)
    }

    pub fn process_sample(&mut self, x: f32) -> f32 {
        // b1 is zero for a band-pass
        let y = self.b0 * x + self.b2 * self.x2 - self.a1 * self.y1 - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }

    pub fn process(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.process_sample(*s);
        }
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rms_after_filter(filter: &mut BandPass, freq: f32, sample_rate: f32) -> f32 {
        let mut samples: Vec<f32> = (0..8000)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect();
        filter.reset();
        filter.process(&mut samples);
        // skip the transient
        let tail = &samples[4000..];
        (tail.iter().map(|s| s * s).sum::<f32>() / tail.len() as f32).sqrt()
    }

    #[test]
    fn test_passes_center_frequency() {
        let mut filter = BandPass::new(1000.0, 2.0, 16000).unwrap();
        let rms = rms_after_filter(&mut filter, 1000.0, 16000.0);
        assert!((rms - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.02, "rms {}", rms);
    }

    #[test]
    fn test_attenuates_out_of_band() {
        let mut filter = BandPass::new(1000.0, 2.0, 16000).unwrap();
        let center = rms_after_filter(&mut filter, 1000.0, 16000.0);
        let low = rms_after_filter(&mut filter, 100.0, 16000.0);
        let high = rms_after_filter(&mut filter, 6000.0, 16000.0);
        assert!(low < center * 0.1, "low {} center {}", low, center);
        assert!(high < center * 0.15, "high {} center {}", high, center);
    }

    #[test]
    fn test_default_channels_pass_with_little_loss() {
        let config = ModemConfig::default();
        let mut filter = BandPass::for_decode(&config).unwrap();
        let center = rms_after_filter(&mut filter, config.bandpass_center(), 48000.0);
        for channel in &config.channels {
            let rms = rms_after_filter(&mut filter, channel.center, 48000.0);
            assert!(rms > center * 0.9, "{} Hz lost too much: {} vs {}", channel.center, rms, center);
        }
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(BandPass::new(0.0, 1.0, 16000).is_err());
        assert!(BandPass::new(9000.0, 1.0, 16000).is_err());
        assert!(BandPass::new(1000.0, 0.0, 16000).is_err());
    }
}
