mod symbols;

use clap::{Parser, Subcommand};
use clocktone_core::{receive, transmit, Encoder, ModemConfig};
use hound::WavSpec;
use std::fs::File;
use std::path::{Path, PathBuf};

use symbols::{format_symbols, parse_symbols};

#[derive(Parser)]
#[command(name = "clocktone")]
#[command(about = "Clock-synchronized multi-tone acoustic modem")]
struct Cli {
    /// Modem configuration (JSON); defaults are used when omitted
    #[arg(short, long, global = true, value_name = "CONFIG.JSON")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a symbol file to a WAV audio file
    Encode {
        /// Symbol file, one symbol per line of 0/1 characters
        #[arg(value_name = "SYMBOLS.TXT")]
        input: PathBuf,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Silence before the first symbol, in seconds
        #[arg(long, default_value = "0.1")]
        lead_in: f64,

        /// Silence after the last symbol, in seconds
        #[arg(long, default_value = "0.2")]
        tail: f64,
    },

    /// Decode a WAV audio file to a symbol file
    Decode {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Output symbol file
        #[arg(value_name = "SYMBOLS.TXT")]
        output: PathBuf,
    },

    /// Print the gain timeline for a symbol file as JSON
    Timeline {
        /// Symbol file, one symbol per line of 0/1 characters
        #[arg(value_name = "SYMBOLS.TXT")]
        input: PathBuf,

        /// Start time on the audio clock, in seconds
        #[arg(long, default_value = "0.0")]
        start: f64,
    },

    /// Print the effective configuration as JSON
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Encode {
            input,
            output,
            lead_in,
            tail,
        } => encode_command(&config, &input, &output, lead_in, tail)?,
        Commands::Decode { input, output } => decode_command(&config, &input, &output)?,
        Commands::Timeline { input, start } => timeline_command(&config, &input, start)?,
        Commands::Config => println!("{}", config.to_json()?),
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ModemConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            let config = ModemConfig::from_json(&json)?;
            log::info!("Loaded config from {}", path.display());
            Ok(config)
        }
        None => Ok(ModemConfig::default()),
    }
}

fn read_symbols(config: &ModemConfig, path: &Path) -> Result<Vec<Vec<bool>>, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let symbols = parse_symbols(&text, config.data_channel_count())?;
    log::info!("Read {} symbols from {}", symbols.len(), path.display());
    Ok(symbols)
}

fn encode_command(
    config: &ModemConfig,
    input_path: &Path,
    output_path: &Path,
    lead_in: f64,
    tail: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    if !lead_in.is_finite() || !tail.is_finite() || lead_in < 0.0 || tail < 0.0 {
        return Err("lead-in and tail must be finite and non-negative".into());
    }

    let symbols = read_symbols(config, input_path)?;
    let samples = transmit(config, &symbols, lead_in, tail)?;
    println!("Encoded to {} audio samples", samples.len());

    // Write WAV file (16-bit PCM)
    let spec = WavSpec {
        channels: 1,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let file = File::create(output_path)?;
    let mut writer = hound::WavWriter::new(file, spec)?;

    for sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * 32767.0) as i16)?;
    }
    writer.finalize()?;

    println!("Wrote {}", output_path.display());
    Ok(())
}

fn decode_command(
    config: &ModemConfig,
    input_path: &Path,
    output_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::open(input_path)?;
    let mut reader = hound::WavReader::new(file)?;

    let spec = reader.spec();
    println!(
        "Read WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );

    if spec.sample_rate != config.sample_rate {
        return Err(format!(
            "WAV sample rate {} Hz does not match configured {} Hz",
            spec.sample_rate, config.sample_rate
        )
        .into());
    }

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => {
            let int_samples: Result<Vec<i16>, _> = reader.samples::<i16>().collect();
            int_samples?.into_iter().map(|s| s as f32 / 32768.0).collect()
        }
        (hound::SampleFormat::Float, 32) => {
            let float_samples: Result<Vec<f32>, _> = reader.samples::<f32>().collect();
            float_samples?
        }
        _ => {
            return Err(format!("Unsupported bit depth: {}", spec.bits_per_sample).into());
        }
    };

    // only the first channel carries the signal
    let samples: Vec<f32> = interleaved
        .into_iter()
        .step_by(spec.channels.max(1) as usize)
        .collect();
    println!("Extracted {} samples", samples.len());

    let symbols = receive(config, &samples)?;
    println!("Decoded {} symbols", symbols.len());

    std::fs::write(output_path, format_symbols(&symbols))?;
    println!("Wrote {}", output_path.display());

    Ok(())
}

fn timeline_command(config: &ModemConfig, input_path: &Path, start: f64) -> Result<(), Box<dyn std::error::Error>> {
    let symbols = read_symbols(config, input_path)?;
    let encoder = Encoder::new(config.clone())?;
    let timeline = encoder.encode(&symbols, start)?;
    println!("{}", serde_json::to_string_pretty(&timeline)?);
    Ok(())
}
