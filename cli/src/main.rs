mod error;
mod wav;

use clap::{Parser, Subcommand};
use error::CliError;
use fsklink_core::{ModemConfig, Packet, Receiver, Transmitter};
use std::path::{Path, PathBuf};
use wav::WavSource;

#[derive(Parser)]
#[command(name = "fsklink")]
#[command(about = "Burst-mode FSK packet modem over complex baseband WAV files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Frame and modulate a binary file into a stereo I/Q WAV file
    Encode {
        /// Link configuration (JSON); defaults apply to missing fields
        #[arg(short, long, value_name = "CONFIG.JSON")]
        config: Option<PathBuf>,

        /// Input binary file
        #[arg(value_name = "INPUT.BIN")]
        input: PathBuf,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,
    },

    /// Receive packets from a stereo I/Q WAV file
    Decode {
        /// Link configuration (JSON); must match the transmitter
        #[arg(short, long, value_name = "CONFIG.JSON")]
        config: Option<PathBuf>,

        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Output binary file (concatenated payloads)
        #[arg(value_name = "OUTPUT.BIN")]
        output: PathBuf,
    },

    /// Print the default link configuration as JSON
    Config,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Encode {
            config,
            input,
            output,
        } => encode_command(config.as_deref(), &input, &output),
        Commands::Decode {
            config,
            input,
            output,
        } => decode_command(config.as_deref(), &input, &output),
        Commands::Config => config_command(),
    };

    if let Err(e) = result {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<ModemConfig, CliError> {
    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str(&text)?
        }
        None => ModemConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn encode_command(
    config: Option<&Path>,
    input_path: &Path,
    output_path: &Path,
) -> Result<(), CliError> {
    let config = load_config(config)?;

    let data = std::fs::read(input_path)?;
    println!("Read {} bytes from {}", data.len(), input_path.display());

    let mut transmitter = Transmitter::new(&config)?;
    let samples = transmitter.encode_data(&data)?;
    let frames = data.len().div_ceil(config.payload_len);
    println!("Encoded {} frame(s) to {} I/Q samples", frames, samples.len());

    wav::write_iq(output_path, &samples, config.sample_rate)?;
    println!("Wrote {}", output_path.display());
    Ok(())
}

fn decode_command(
    config: Option<&Path>,
    input_path: &Path,
    output_path: &Path,
) -> Result<(), CliError> {
    let config = load_config(config)?;

    let mut source = WavSource::open(input_path, config.sample_rate)?;
    println!("Extracted {} I/Q samples", source.sample_count());

    let mut receiver = Receiver::new(&config)?;
    let packets = receiver.run(&mut source)?;
    let data: Vec<u8> = packets.into_iter().flat_map(Packet::into_payload).collect();

    let stats = receiver.stats();
    println!(
        "Bursts: {} detected, {} synchronized",
        stats.bursts_detected, stats.bursts_synchronized
    );
    println!(
        "Packets: {} seen, {} ok, {} CRC failures",
        stats.packets_seen, stats.packets_ok, stats.crc_failures
    );
    if let Some(estimate) = receiver.last_estimate() {
        println!(
            "Last burst: CFO {:.2} Hz, STO {} samples",
            estimate.cfo_hz, estimate.sto
        );
    }

    println!("Decoded {} bytes", data.len());
    std::fs::write(output_path, &data)?;
    println!("Wrote {} bytes to {}", data.len(), output_path.display());
    Ok(())
}

fn config_command() -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(&ModemConfig::default())?);
    Ok(())
}
