/// Maps tone frequencies onto spectral bin indices
///
/// The bin width is `sample_rate / transform_block_size`. Frequencies are
/// rounded to the nearest bin: `floor((freq + bin_size/2) / bin_size)`.
/// Range checking is the caller's job (see [`crate::ModemConfig::validate`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinMapper {
    bin_size: f32,
}

impl BinMapper {
    pub fn new(sample_rate: u32, transform_block_size: usize) -> Self {
        Self {
            bin_size: sample_rate as f32 / transform_block_size as f32,
        }
    }

    /// Width of one bin in Hz
    pub fn bin_size(&self) -> f32 {
        self.bin_size
    }

    pub fn bin(&self, freq: f32) -> usize {
        ((freq + self.bin_size * 0.5) / self.bin_size).floor() as usize
    }

    /// Center frequency of a bin
    pub fn freq(&self, bin: usize) -> f32 {
        bin as f32 * self.bin_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_size() {
        let mapper = BinMapper::new(48000, 2048);
        assert!((mapper.bin_size() - 23.4375).abs() < 1e-6);
    }

    #[test]
    fn test_bin_rounds_to_nearest() {
        let mapper = BinMapper::new(48000, 2048);
        assert_eq!(mapper.bin(0.0), 0);
        // 11.7 Hz is just under half a bin
        assert_eq!(mapper.bin(11.7), 0);
        assert_eq!(mapper.bin(11.72), 1);
        assert_eq!(mapper.bin(23.4375), 1);
        assert_eq!(mapper.bin(2000.0), 85);
    }

    #[test]
    fn test_bin_is_monotonic() {
        for &(rate, size) in &[(8000u32, 256usize), (44100, 1024), (48000, 2048), (16000, 4096)] {
            let mapper = BinMapper::new(rate, size);
            let nyquist = rate as f32 / 2.0;
            let mut prev = 0;
            let mut freq = 0.0f32;
            while freq < nyquist {
                let bin = mapper.bin(freq);
                assert!(bin >= prev, "bin decreased at {} Hz ({} < {})", freq, bin, prev);
                prev = bin;
                freq += 0.37;
            }
        }
    }

    #[test]
    fn test_freq_of_bin_maps_back() {
        let mapper = BinMapper::new(44100, 1024);
        for bin in 0..512 {
            assert_eq!(mapper.bin(mapper.freq(bin)), bin);
        }
    }
}
