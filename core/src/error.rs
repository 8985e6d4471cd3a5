use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Symbol {index} has {actual} bits, expected {expected}")]
    SymbolLengthMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Spectral frame has {actual} bins, expected {expected}")]
    InvalidFrameLength { expected: usize, actual: usize },

    #[error("Invalid time range {from}s..{to}s")]
    InvalidInputRange { from: f64, to: f64 },

    #[error("FFT error: {0}")]
    FftError(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ModemError>;
