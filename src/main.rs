//! ccsds-link - CCSDS-style telemetry over a byte stream
//!
//! Transmits temperature/humidity packets framed with a length prefix and
//! reassembles them on the receiving end.

mod config;
mod display;
mod link;
mod protocol;
mod sensor;

use std::path::PathBuf;

use bytes::BytesMut;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;
use display::ConsoleDisplay;
use link::{Consumer, Producer};
use sensor::{SimulatedSensor, SimulatedSensorConfig};

/// ccsds-link - CCSDS-style telemetry link
#[derive(Parser)]
#[command(name = "ccsds-link")]
#[command(author = "ccsds-link Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Send and receive CCSDS-style telemetry packets", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample the sensor and transmit packets to a receiver
    Transmit {
        /// Receiver address
        #[arg(short, long)]
        address: Option<String>,

        /// Milliseconds between packets
        #[arg(short, long)]
        period_ms: Option<u64>,

        /// Stop after this many packets
        #[arg(short = 'n', long)]
        count: Option<u64>,
    },

    /// Listen for a transmitter and display received packets
    Receive {
        /// Address to listen on
        #[arg(short, long)]
        address: Option<String>,

        /// Stop after this many packets
        #[arg(short = 'n', long)]
        count: Option<u64>,
    },

    /// Run transmitter and receiver in-process
    Loopback {
        /// Number of packets to send
        #[arg(short = 'n', long, default_value_t = 5)]
        count: u64,
    },

    /// Decode hex-encoded frames
    Decode {
        /// Frame bytes as hex, e.g. "0A00 0108 00C0 0300 2909 7C17"
        hex: Vec<String>,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };

    match cli.command {
        Commands::Transmit {
            address,
            period_ms,
            count,
        } => {
            run_transmitter(config, address, period_ms, count).await?;
        }
        Commands::Receive { address, count } => {
            run_receiver(config, address, count).await?;
        }
        Commands::Loopback { count } => {
            run_loopback(config, count).await?;
        }
        Commands::Decode { hex } => {
            decode_frames(&hex.join(""))?;
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config()?;
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

/// Run the transmitting end
async fn run_transmitter(
    mut config: Config,
    address: Option<String>,
    period_ms: Option<u64>,
    count: Option<u64>,
) -> anyhow::Result<()> {
    if let Some(period_ms) = period_ms {
        config.producer.period_ms = period_ms;
    }
    let address = address.unwrap_or(config.link.address.clone());
    let producer_config = config.producer.to_producer_config()?;

    tracing::info!(
        "Transmitting as PID {} every {} ms",
        producer_config.packet_id.process_id(),
        config.producer.period_ms
    );

    let mut stream = link::connect(&address).await?;
    let sensor = SimulatedSensor::new(SimulatedSensorConfig::from(&config.sensor));
    let mut producer = Producer::new(producer_config, sensor);

    tokio::select! {
        result = producer.run(&mut stream, count) => result?,
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    let stats = producer.stats();
    tracing::info!(
        "Transmitter stopped: {} packets, {} bytes, {} skipped cycles",
        stats.packets_sent,
        stats.bytes_sent,
        stats.cycles_skipped
    );

    Ok(())
}

/// Run the receiving end, one session per accepted connection
async fn run_receiver(
    config: Config,
    address: Option<String>,
    count: Option<u64>,
) -> anyhow::Result<()> {
    let address = address.unwrap_or(config.link.address.clone());
    let listener = link::listen(&address).await?;
    let mut consumer = Consumer::new(ConsoleDisplay::stdout());

    println!("Waiting for a transmitter on {}...", address);
    println!("Press Ctrl+C to stop.\n");

    loop {
        let (mut stream, addr) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        };

        tracing::info!("Session started with {}", addr);
        consumer.reset();

        let result = tokio::select! {
            result = consumer.run(&mut stream, count) => result,
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        };

        match result {
            Ok(()) => tracing::info!("Session with {} ended", addr),
            Err(e) => tracing::warn!("Session with {} ended: {}", addr, e),
        }

        if count.is_some_and(|n| consumer.stats().packets_received >= n) {
            break;
        }
    }

    let stats = consumer.stats();
    tracing::info!(
        "Receiver stopped: {} packets, {} framing errors, {} sequence gaps ({} lost)",
        stats.packets_received,
        stats.framing_errors,
        stats.sequence_gaps,
        stats.packets_lost
    );

    Ok(())
}

/// Run producer and consumer over an in-memory stream
async fn run_loopback(config: Config, count: u64) -> anyhow::Result<()> {
    let producer_config = config.producer.to_producer_config()?;
    let sensor = SimulatedSensor::new(SimulatedSensorConfig::from(&config.sensor));
    let (mut tx, mut rx) = tokio::io::duplex(64);

    let transmitter = tokio::spawn(async move {
        let mut producer = Producer::new(producer_config, sensor);
        producer.run(&mut tx, Some(count)).await
    });

    let mut consumer = Consumer::new(ConsoleDisplay::stdout());
    consumer.run(&mut rx, Some(count)).await?;
    transmitter.await??;

    println!(
        "\n{} packets received, {} framing errors",
        consumer.stats().packets_received,
        consumer.stats().framing_errors
    );

    Ok(())
}

/// Decode frames from a hex string and print them
fn decode_frames(hex: &str) -> anyhow::Result<()> {
    let mut buf = BytesMut::from(&parse_hex(hex)?[..]);
    let mut decoder = protocol::Decoder::new();

    loop {
        match decoder.decode(&mut buf) {
            Ok(Some(packet)) => {
                println!("{}", packet.header);
                for line in display::format_lines(&packet.measurement) {
                    println!("  {}", line);
                }
            }
            Ok(None) => break,
            Err(e) => println!("{}", e),
        }
    }

    if !buf.is_empty() || decoder.state() != protocol::DecodeState::AwaitingLength {
        println!("Incomplete frame: {:?}, {} bytes left over", decoder.state(), buf.len());
    }

    Ok(())
}

fn parse_hex(hex: &str) -> anyhow::Result<Vec<u8>> {
    let digits: Vec<u8> = hex.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if let Some(pos) = digits.iter().position(|b| !b.is_ascii_hexdigit()) {
        anyhow::bail!("Invalid hex digit at offset {}", pos);
    }
    if digits.len() % 2 != 0 {
        anyhow::bail!("Odd number of hex digits");
    }

    digits
        .chunks(2)
        .map(|pair| -> anyhow::Result<u8> {
            let pair = std::str::from_utf8(pair)?;
            Ok(u8::from_str_radix(pair, 16)?)
        })
        .collect()
}
