//! Flow Sensor Agent CLI
//!
//! Samples two pressure transducers at a fixed cadence and streams
//! calibrated readings to the selected output sinks.

use clap::{Parser, Subcommand};
use flow_sensor_agent::{
    bus::{FrameSource, SerialFrameSource, SyntheticSource},
    config::{absolute_pressure_profile, differential_flow_profile, AgentConfig, SinkSelection},
    core::{FlowDerivation, SensorChannel},
    scheduler::SampleScheduler,
    sink::{fan_out, IndicatorSink, LogIndicator, OutputSink, TelemetrySink, TextSink},
    VERSION,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Elements on the fallback logging indicator bar.
const INDICATOR_ELEMENTS: usize = 6;

#[derive(Parser)]
#[command(name = "flow-sensor")]
#[command(version = VERSION)]
#[command(about = "Continuous dual-transducer pressure and flow monitor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start sampling and streaming readings
    Run {
        /// Output sinks to enable (text, telemetry, indicator, or all)
        #[arg(long)]
        sinks: Option<String>,

        /// Serial port for the transducer bus
        #[arg(long)]
        port: Option<String>,

        /// Use synthetic transducers instead of the serial bus
        #[arg(long)]
        synthetic: bool,

        /// Telemetry destination host
        #[arg(long)]
        telemetry_host: Option<String>,

        /// Telemetry destination UDP port
        #[arg(long)]
        telemetry_port: Option<u16>,
    },

    /// Show configuration
    Config,
}

fn main() {
    // Diagnostics go to stderr; stdout belongs to the text sink.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            sinks,
            port,
            synthetic,
            telemetry_host,
            telemetry_port,
        } => {
            cmd_run(sinks, port, synthetic, telemetry_host, telemetry_port);
        }
        Commands::Config => {
            cmd_config();
        }
    }
}

fn cmd_run(
    sinks: Option<String>,
    port: Option<String>,
    synthetic: bool,
    telemetry_host: Option<String>,
    telemetry_port: Option<u16>,
) {
    eprintln!("Flow Sensor Agent v{VERSION}");

    let mut config = AgentConfig::load().unwrap_or_default();
    if let Some(s) = sinks {
        config.sinks = SinkSelection::from_csv(&s);
    }
    if let Some(p) = port {
        config.serial_port = p;
    }
    if let Some(h) = telemetry_host {
        config.telemetry_host = h;
    }
    if let Some(p) = telemetry_port {
        config.telemetry_port = p;
    }

    if !config.sinks.any_enabled() {
        eprintln!("Error: at least one sink must be enabled (text, telemetry, indicator)");
        std::process::exit(1);
    }

    let pressure_profile = absolute_pressure_profile();
    let flow_profile = differential_flow_profile();

    // Frame sources: real bus or deterministic synthetic waveforms.
    let (mut pressure_source, mut flow_source): (Box<dyn FrameSource>, Box<dyn FrameSource>) =
        if synthetic {
            eprintln!("  Source: synthetic waveforms");
            (
                Box::new(SyntheticSource::new(1700, 0, 1500, 768)),
                Box::new(SyntheticSource::new(8192, 150, 1500, 768)),
            )
        } else {
            eprintln!("  Source: serial bus on {}", config.serial_port);
            let pressure = SerialFrameSource::open(&config.serial_port, pressure_profile.address)
                .unwrap_or_else(|e| {
                    eprintln!("Error: could not open pressure transducer: {e}");
                    std::process::exit(1);
                });
            let flow = SerialFrameSource::open(&config.serial_port, flow_profile.address)
                .unwrap_or_else(|e| {
                    eprintln!("Error: could not open flow transducer: {e}");
                    std::process::exit(1);
                });
            (Box::new(pressure), Box::new(flow))
        };

    // Device discovery failures are fatal before the loop starts.
    if !pressure_source.is_connected() {
        eprintln!("Error: missing the pressure sensor");
        std::process::exit(1);
    }
    if !flow_source.is_connected() {
        eprintln!("Error: missing the flow pressure sensor");
        std::process::exit(1);
    }

    let mut pressure_channel = SensorChannel::new(pressure_profile).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    let mut flow_channel = SensorChannel::new(flow_profile).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    let mut flow_derivation = flow_channel
        .profile()
        .flow_coefficient
        .map(|k| FlowDerivation::new(k, flow_channel.profile().unit));

    let mut sinks: Vec<Box<dyn OutputSink>> = Vec::new();
    if config.sinks.text {
        sinks.push(Box::new(TextSink::stdout(config.text_every)));
    }
    if config.sinks.telemetry {
        let destination = format!("{}:{}", config.telemetry_host, config.telemetry_port);
        eprintln!("  Telemetry: {destination}");
        sinks.push(Box::new(TelemetrySink::new(
            config.telemetry_every,
            config.telemetry_temperature_every,
            Some(destination),
        )));
    }
    if config.sinks.indicator {
        sinks.push(Box::new(IndicatorSink::new(
            LogIndicator::new(INDICATOR_ELEMENTS),
            config.indicator_every,
        )));
    }

    eprintln!(
        "  Sample period: {} us",
        config.sample_period.as_micros()
    );
    eprintln!(
        "  Session start: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    eprintln!("Press Ctrl+C to stop");

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let mut scheduler = SampleScheduler::new(config.sample_period);
    let session_start = Instant::now();

    while running.load(Ordering::SeqCst) {
        let tick_start = Instant::now();
        let slippage = scheduler.begin_tick(tick_start);

        sample_channel(pressure_source.as_mut(), &mut pressure_channel);
        sample_channel(flow_source.as_mut(), &mut flow_channel);
        let flow_value = flow_derivation
            .as_mut()
            .map(|d| d.update(flow_channel.pressure()));

        let pressure_reading = pressure_channel.reading(None);
        let flow_reading = flow_channel.reading(flow_value);
        fan_out(
            &mut sinks,
            &pressure_reading,
            &flow_reading,
            tick_start.duration_since(session_start),
        );

        let sleep = scheduler.sleep_after(tick_start.elapsed(), slippage);
        thread::sleep(sleep);
    }

    eprintln!();
    eprintln!("Stopping");
}

/// Read one frame into a channel; a failed read leaves the channel's last
/// values in place and never stops the loop.
fn sample_channel(source: &mut dyn FrameSource, channel: &mut SensorChannel) {
    match source.read_frame() {
        Ok(frame) => channel.decode(frame),
        Err(e) => {
            let failures = channel.record_failure();
            warn!(
                "{} channel read failed ({failures} consecutive): {e}",
                channel.profile().label
            );
        }
    }
}

fn cmd_config() {
    let config = AgentConfig::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", AgentConfig::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");
}
