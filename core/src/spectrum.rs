//! Spectral transform provider
//!
//! Turns a stream of audio samples into the dB magnitude frames the
//! [`crate::Decoder`] consumes, the same way a browser `AnalyserNode` does:
//! Blackman window over the latest block, real FFT, magnitude scaled by the
//! block size, exponential smoothing per bin, then conversion to decibels.

use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use crate::config::ModemConfig;
use crate::decoder::FrameSource;
use crate::error::{ModemError, Result};

/// Lowest level reported, in dB; keeps silent bins finite
pub const MIN_DECIBELS: f32 = -200.0;

fn blackman_window(len: usize) -> Vec<f32> {
    let n = len as f32;
    (0..len)
        .map(|i| {
            let x = i as f32 / n;
            0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
        })
        .collect()
}

fn to_decibels(magnitude: f32) -> f32 {
    if magnitude > 0.0 {
        (20.0 * magnitude.log10()).max(MIN_DECIBELS)
    } else {
        MIN_DECIBELS
    }
}

/// Sliding-window magnitude spectrum with temporal smoothing
pub struct SpectrumAnalyzer {
    block_size: usize,
    smoothing: f32,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    /// Most recent `block_size` samples, oldest first
    history: VecDeque<f32>,
    input: Vec<f32>,
    output: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    frame: Vec<f32>,
}

impl SpectrumAnalyzer {
    pub fn new(block_size: usize, smoothing: f32) -> Result<Self> {
        if block_size < 2 || !block_size.is_power_of_two() {
            return Err(ModemError::InvalidConfig(format!(
                "transform block size must be a power of two, got {}",
                block_size
            )));
        }
        if !(0.0..1.0).contains(&smoothing) {
            return Err(ModemError::InvalidConfig(format!(
                "smoothing must be in [0, 1), got {}",
                smoothing
            )));
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(block_size);
        let input = fft.make_input_vec();
        let output = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();

        Ok(Self {
            block_size,
            smoothing,
            window: blackman_window(block_size),
            history: std::iter::repeat(0.0).take(block_size).collect(),
            input,
            output,
            scratch,
            smoothed: vec![0.0; block_size / 2],
            frame: vec![MIN_DECIBELS; block_size / 2],
            fft,
        })
    }

    pub fn from_config(config: &ModemConfig) -> Result<Self> {
        Self::new(config.transform_block_size, config.smoothing)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Feed new samples; only the latest `block_size` are kept
    pub fn push_samples(&mut self, samples: &[f32]) {
        let skip = samples.len().saturating_sub(self.block_size);
        for &sample in &samples[skip..] {
            self.history.pop_front();
            self.history.push_back(sample);
        }
    }

    /// Transform the current window and return the dB frame (`block_size / 2` bins)
    pub fn analyze(&mut self) -> Result<&[f32]> {
        for ((dst, &sample), &w) in self.input.iter_mut().zip(&self.history).zip(&self.window) {
            *dst = sample * w;
        }

        self.fft
            .process_with_scratch(&mut self.input, &mut self.output, &mut self.scratch)
            .map_err(|e| ModemError::FftError(e.to_string()))?;

        let scale = 1.0 / self.block_size as f32;
        let tau = self.smoothing;
        for ((smoothed, db), bin) in self
            .smoothed
            .iter_mut()
            .zip(self.frame.iter_mut())
            .zip(&self.output)
        {
            *smoothed = tau * *smoothed + (1.0 - tau) * bin.norm() * scale;
            *db = to_decibels(*smoothed);
        }

        Ok(self.frame.as_slice())
    }

    /// Last frame produced by [`Self::analyze`]
    pub fn frame(&self) -> &[f32] {
        &self.frame
    }

    pub fn reset(&mut self) {
        self.history.iter_mut().for_each(|s| *s = 0.0);
        self.smoothed.iter_mut().for_each(|m| *m = 0.0);
        self.frame.iter_mut().for_each(|m| *m = MIN_DECIBELS);
    }
}

/// Frame source over a recorded sample buffer
///
/// Every `hop` samples the analyzer is advanced and one frame is produced,
/// standing in for the periodic audio-processing callback of a live input.
/// A trailing partial hop is dropped.
pub struct SampleFrameSource<'a> {
    samples: &'a [f32],
    hop: usize,
    pos: usize,
    analyzer: SpectrumAnalyzer,
    error: Option<ModemError>,
}

impl<'a> SampleFrameSource<'a> {
    pub fn new(samples: &'a [f32], config: &ModemConfig) -> Result<Self> {
        if config.frame_hop == 0 {
            return Err(ModemError::InvalidConfig("frame_hop must be positive".into()));
        }
        Ok(Self {
            samples,
            hop: config.frame_hop,
            pos: 0,
            analyzer: SpectrumAnalyzer::from_config(config)?,
            error: None,
        })
    }

    /// Frames this source will yield in total
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.hop
    }

    /// Error that stopped the source early, if any
    pub fn take_error(&mut self) -> Option<ModemError> {
        self.error.take()
    }
}

impl FrameSource for SampleFrameSource<'_> {
    fn next_frame(&mut self) -> Option<&[f32]> {
        if self.error.is_some() || self.pos + self.hop > self.samples.len() {
            return None;
        }
        self.analyzer.push_samples(&self.samples[self.pos..self.pos + self.hop]);
        self.pos += self.hop;

        if let Err(e) = self.analyzer.analyze().map(|_| ()) {
            log::error!("spectrum analysis failed at sample {}: {}", self.pos, e);
            self.error = Some(e);
            return None;
        }
        Some(self.analyzer.frame())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, amplitude: f32, len: usize, sample_rate: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    fn peak_bin(frame: &[f32]) -> usize {
        frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn test_silence_is_floor() {
        let mut analyzer = SpectrumAnalyzer::new(256, 0.0).unwrap();
        analyzer.push_samples(&[0.0; 256]);
        let frame = analyzer.analyze().unwrap();
        assert_eq!(frame.len(), 128);
        assert!(frame.iter().all(|&m| m == MIN_DECIBELS));
    }

    #[test]
    fn test_tone_peaks_at_its_bin() {
        let config = ModemConfig::default();
        let mapper = config.bin_mapper();
        let mut analyzer = SpectrumAnalyzer::new(2048, 0.0).unwrap();
        analyzer.push_samples(&tone(2400.0, 0.5, 2048, 48000.0));
        let frame = analyzer.analyze().unwrap();
        assert_eq!(peak_bin(frame), mapper.bin(2400.0));
    }

    #[test]
    fn test_level_tracks_amplitude() {
        let mut loud = SpectrumAnalyzer::new(1024, 0.0).unwrap();
        let mut quiet = SpectrumAnalyzer::new(1024, 0.0).unwrap();
        loud.push_samples(&tone(1500.0, 1.0, 1024, 16000.0));
        quiet.push_samples(&tone(1500.0, 0.01, 1024, 16000.0));
        let bin = 96; // 1500 Hz at 15.625 Hz per bin
        let loud_db = loud.analyze().unwrap()[bin];
        let quiet_db = quiet.analyze().unwrap()[bin];
        assert!((loud_db - quiet_db - 40.0).abs() < 0.1, "{} vs {}", loud_db, quiet_db);
    }

    #[test]
    fn test_smoothing_lags_level_changes() {
        let mut smoothed = SpectrumAnalyzer::new(512, 0.8).unwrap();
        let mut raw = SpectrumAnalyzer::new(512, 0.0).unwrap();
        let signal = tone(1000.0, 1.0, 512, 8000.0);
        smoothed.push_samples(&signal);
        raw.push_samples(&signal);
        let bin = 64;
        let smoothed_db = smoothed.analyze().unwrap()[bin];
        let raw_db = raw.analyze().unwrap()[bin];
        // first frame reaches 20% of the magnitude: about 14 dB down
        assert!((raw_db - smoothed_db - 13.98).abs() < 0.1);

        for _ in 0..40 {
            smoothed.analyze().unwrap();
        }
        assert!((smoothed.frame()[bin] - raw_db).abs() < 0.1);
    }

    #[test]
    fn test_invalid_block_size() {
        assert!(SpectrumAnalyzer::new(1000, 0.0).is_err());
        assert!(SpectrumAnalyzer::new(1024, 1.0).is_err());
    }

    #[test]
    fn test_sample_source_yields_one_frame_per_hop() {
        let config = ModemConfig::default();
        let samples = vec![0.0; config.frame_hop * 10 + 17];
        let mut source = SampleFrameSource::new(&samples, &config).unwrap();
        assert_eq!(source.frame_count(), 10);
        let mut frames = 0;
        while let Some(frame) = source.next_frame() {
            assert_eq!(frame.len(), config.frame_len());
            frames += 1;
        }
        assert_eq!(frames, 10);
        assert!(source.take_error().is_none());
    }
}
