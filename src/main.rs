use std::io::BufReader;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use assistive_lens::api::ApiServer;
use assistive_lens::config::Overrides;
use assistive_lens::proximity::ProximityReading;
use assistive_lens::speech::{SpeechQueue, renderer};
use assistive_lens::{Command as DeviceCommand, Config, Device, Hardware};

/// Longest a one-shot `say` may take to finish speaking
const SAY_TIMEOUT: Duration = Duration::from_secs(30);

/// Lens - controller for a wearable assistive vision device
#[derive(Parser)]
#[command(name = "lens", version, about)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Port for the remote-control server
    #[arg(long, env = "LENS_WEB_PORT")]
    web_port: Option<u16>,

    /// Disable camera features
    #[arg(long)]
    no_camera: bool,

    /// Disable location services
    #[arg(long)]
    no_location: bool,

    /// Disable the distance sensor and proximity monitor
    #[arg(long)]
    no_distance: bool,

    /// Disable physical buttons
    #[arg(long)]
    no_buttons: bool,

    /// Disable desktop keyboard shortcuts
    #[arg(long)]
    no_keyboard: bool,

    /// Disable voice input
    #[arg(long)]
    no_voice_input: bool,

    /// Use no-op hardware even when GPIO is available
    #[arg(long, env = "LENS_MOCK_HARDWARE")]
    mock_hardware: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Speak text through the speech queue
    Say {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the speech system.")]
        text: String,
    },
    /// Pulse the buzzer
    TestBuzzer {
        /// Pulse length in milliseconds
        #[arg(short, long, default_value = "500")]
        millis: u64,
    },
    /// Print distance sensor readings
    TestDistance {
        /// Number of readings
        #[arg(short, long, default_value = "10")]
        count: u32,
        /// Delay between readings in milliseconds
        #[arg(short, long, default_value = "500")]
        interval: u64,
    },
    /// List the command catalog
    Commands,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,assistive_lens=info",
        1 => "info,assistive_lens=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let overrides = Overrides {
        port: cli.web_port,
        no_camera: cli.no_camera,
        no_location: cli.no_location,
        no_distance: cli.no_distance,
        no_buttons: cli.no_buttons,
        no_keyboard: cli.no_keyboard,
        no_voice_input: cli.no_voice_input,
        mock_hardware: cli.mock_hardware,
    };
    let config = Config::load_with_options(&overrides);

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Say { text } => say(&config, &text),
            Command::TestBuzzer { millis } => test_buzzer(&config, millis),
            Command::TestDistance { count, interval } => test_distance(&config, count, interval),
            Command::Commands => {
                for command in DeviceCommand::ALL {
                    println!("{command}");
                }
                Ok(())
            }
        };
    }

    tracing::info!(
        port = config.server.port,
        camera = config.features.camera,
        location = config.features.location,
        distance = config.features.distance,
        buttons = config.features.buttons,
        voice_input = config.features.voice_input,
        "starting assistive lens"
    );

    serve(config)
}

/// Run the device and the remote-control server until interrupted
///
/// The device and its blocking HTTP clients live outside the async runtime;
/// only the server runs inside it.
fn serve(config: Config) -> anyhow::Result<()> {
    let port = config.server.port;
    let keyboard = config.features.keyboard;
    let device = Device::from_config(config)?;
    if keyboard {
        device.attach_keyboard(BufReader::new(std::io::stdin()));
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let server = ApiServer::new(Arc::clone(&device), port);
    let quit = device.shutdown_requested();
    let result = runtime.block_on(async move {
        let shutdown = async move {
            let requested = tokio::task::spawn_blocking(move || quit.wait());
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("interrupt received"),
                _ = requested => {}
            }
        };
        server.run(shutdown).await
    });

    device.shutdown();
    runtime.shutdown_timeout(Duration::from_secs(1));
    drop(device);

    result?;
    Ok(())
}

fn say(config: &Config, text: &str) -> anyhow::Result<()> {
    let renderer = renderer::select(&config.speech)?;
    let queue = SpeechQueue::start(renderer, SAY_TIMEOUT)?;
    queue.enqueue(text);
    if !queue.shutdown() {
        anyhow::bail!("speech did not finish within {}s", SAY_TIMEOUT.as_secs());
    }
    Ok(())
}

fn test_buzzer(config: &Config, millis: u64) -> anyhow::Result<()> {
    let hardware = Hardware::from_config(config);
    if !hardware.buzzer.is_available() {
        anyhow::bail!("no buzzer available on this host");
    }
    println!("Pulsing buzzer for {millis}ms...");
    hardware.buzzer.pulse(Duration::from_millis(millis));
    println!("Done.");
    Ok(())
}

fn test_distance(config: &Config, count: u32, interval: u64) -> anyhow::Result<()> {
    let hardware = Hardware::from_config(config);
    if !hardware.distance.is_available() {
        anyhow::bail!("no distance sensor available on this host");
    }
    for i in 1..=count {
        match hardware.distance.read() {
            ProximityReading::Valid { distance_cm } => println!("{i:>3}: {distance_cm:.2} cm"),
            ProximityReading::Invalid(reason) => println!("{i:>3}: invalid reading ({reason:?})"),
        }
        std::thread::sleep(Duration::from_millis(interval));
    }
    Ok(())
}
