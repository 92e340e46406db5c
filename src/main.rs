use std::io::Write as _;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use iris_realtime::audio::{InputDevice, MicInput, OutputSink, SpeakerSink};
use iris_realtime::{ClientConfig, RealtimeClient, SessionEvent};

/// Iris - realtime voice and vision client
#[derive(Parser)]
#[command(name = "iris", version, about)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "IRIS_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// WebSocket endpoint
    #[arg(long, env = "IRIS_ENDPOINT")]
    endpoint: Option<String>,

    /// Bearer credential for the upgrade request
    #[arg(long, env = "IRIS_API_KEY")]
    api_key: Option<String>,

    /// Model variant
    #[arg(long, env = "IRIS_MODEL")]
    model: Option<String>,

    /// Synthesized voice name
    #[arg(long)]
    voice: Option<String>,

    /// Session instructions
    #[arg(long)]
    instructions: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,iris_realtime=info",
        1 => "info,iris_realtime=debug",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Command::TestMic { duration }) => test_mic(duration),
        Some(Command::TestSpeaker) => test_speaker(),
        None => converse(cli).await,
    }
}

/// Stream the microphone until Ctrl-C, printing transcripts as they arrive
async fn converse(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_path(path)?,
        None => ClientConfig::default(),
    };
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(api_key) = cli.api_key {
        config.api_key = api_key;
    }
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(voice) = cli.voice {
        config.voice = voice;
    }
    if let Some(instructions) = cli.instructions {
        config.instructions = instructions;
    }
    config.validate()?;

    let (mut client, mut events) = RealtimeClient::new(config);
    client.connect().await?;
    println!("connecting... (Ctrl-C to quit)");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::Ready) => {
                    println!("session ready, speak when ready");
                    client.start_recording()?;
                }
                Some(SessionEvent::SpeechStarted) => println!("[listening]"),
                Some(SessionEvent::SpeechStopped) => println!("[thinking]"),
                Some(SessionEvent::TranscriptDelta(text)) => {
                    print!("{text}");
                    std::io::stdout().flush().ok();
                }
                Some(SessionEvent::TranscriptDone(_)) => println!(),
                Some(SessionEvent::UserTranscript(text)) => println!("you: {text}"),
                Some(SessionEvent::Error(message)) => eprintln!("error: {message}"),
                Some(SessionEvent::Disconnected) | None => {
                    println!("connection closed");
                    break;
                }
                Some(_) => {}
            },
            _ = tokio::signal::ctrl_c() => {
                client.disconnect().await;
                break;
            }
        }
    }
    Ok(())
}

/// Capture for `duration` seconds and report the observed level
fn test_mic(duration: u64) -> anyhow::Result<()> {
    let mut mic = MicInput::new();
    let format = mic.native_format()?;
    println!(
        "capturing {duration}s at {} Hz x{} channels...",
        format.sample_rate, format.channels
    );

    let peak = Arc::new(Mutex::new(0.0f32));
    let peak_writer = Arc::clone(&peak);
    mic.start(Box::new(move |frame| {
        let level = match &frame.data {
            iris_realtime::audio::SampleData::F32(v) => {
                v.iter().fold(0.0f32, |m, s| m.max(s.abs()))
            }
            iris_realtime::audio::SampleData::I16(v) => v
                .iter()
                .fold(0.0f32, |m, &s| m.max(f32::from(s).abs() / 32768.0)),
        };
        let mut peak = peak_writer.lock().unwrap();
        *peak = peak.max(level);
    }))?;

    std::thread::sleep(Duration::from_secs(duration));
    mic.stop();

    let peak = *peak.lock().unwrap();
    println!("peak level: {peak:.3}");
    if peak < 0.01 {
        println!("warning: microphone appears silent");
    }
    Ok(())
}

/// Play one second of A4 through the default output
fn test_speaker() -> anyhow::Result<()> {
    let mut sink = SpeakerSink::new();
    sink.start()?;

    let rate = iris_realtime::config::OUTPUT_SAMPLE_RATE;
    let tone: Vec<i16> = (0..rate)
        .map(|i| {
            let t = i as f32 / rate as f32;
            ((2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.3 * 32767.0) as i16
        })
        .collect();

    println!("playing test tone...");
    sink.enqueue(tone);
    std::thread::sleep(Duration::from_millis(1200));
    sink.stop();
    Ok(())
}
