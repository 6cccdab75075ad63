use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use soir_engine::config::Config;
use soir_engine::engine::Engine;
use soir_engine::http_stream::HttpServer;
use soir_engine::midi::MidiInputHandler;
use soir_engine::output::AudioOutput;
use soir_engine::sample::SampleManager;
use soir_engine::signal;

#[derive(Parser)]
#[command(name = "soir-engine", about = "Live-coded audio DSP engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the engine: load the sample packs, open the audio device,
    /// attach MIDI input, and serve the HTTP stream until shutdown.
    Run(RunArgs),

    /// List available MIDI input device names and exit.
    ListMidiDevices,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Path to the TOML config file.
    #[arg(long, default_value = "soir.toml")]
    config: PathBuf,

    /// Override `soir.dsp.sample_directory` from the config.
    #[arg(long)]
    sample_directory: Option<PathBuf>,

    /// Override `soir.http.host` from the config.
    #[arg(long)]
    http_host: Option<String>,

    /// Override `soir.http.port` from the config.
    #[arg(long)]
    http_port: Option<u16>,

    /// MIDI input device name to attach.
    #[arg(long)]
    midi_device: Option<String>,
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::ListMidiDevices => {
            match MidiInputHandler::list_devices() {
                Ok(devices) => {
                    for device in devices {
                        println!("{device}");
                    }
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        Command::Run(args) => run(args),
    };

    if let Err(e) = result {
        tracing::error!("fatal: {e}");
        std::process::exit(1);
    }
}

fn run(args: RunArgs) -> soir_engine::Result<()> {
    let config = Config::from_path(&args.config)?;

    let sample_directory: PathBuf = args
        .sample_directory
        .or_else(|| config.get("soir.dsp.sample_directory").ok())
        .ok_or_else(|| {
            soir_engine::EngineError::InvalidArgument("soir.dsp.sample_directory not set".into())
        })?;
    let http_host: String = args
        .http_host
        .or_else(|| config.get("soir.http.host").ok())
        .unwrap_or_else(|| "0.0.0.0".to_string());
    let http_port: u16 = args
        .http_port
        .or_else(|| config.get("soir.http.port").ok())
        .unwrap_or(7878);

    let sample_manager = SampleManager::init(&sample_directory)?;
    let engine = Arc::new(Engine::new(sample_manager));
    engine.start()?;

    let output = AudioOutput::start(soir_engine::buffer::BLOCK_SIZE)?;
    engine.register_consumer(Arc::new(output));

    let _midi_handler = match &args.midi_device {
        Some(device_name) => {
            let engine = engine.clone();
            Some(MidiInputHandler::connect(device_name, move |bytes| {
                engine.push_midi_events(0, bytes, std::time::Instant::now());
            })?)
        }
        None => None,
    };

    let http_server = HttpServer::start(&http_host, http_port, engine.clone())?;

    tracing::info!(host = %http_host, port = http_port, "soir-engine listening");
    signal::wait_for_exit(true);

    tracing::info!("shutting down");
    http_server.stop();
    engine.stop();
    Ok(())
}
