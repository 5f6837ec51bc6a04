use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jarvis_console::voice::{
    AudioCapture, AudioPlayback, DeviceSpeech, SpeechCoordinator, TextToSpeech, calculate_energy,
    decode_mp3, sine_tone,
};
use jarvis_console::{ChatCompletionsBackend, Config, Console, Orchestrator, Outcome};

/// J.A.R.V.I.S. - voice-enabled conversational assistant
#[derive(Parser)]
#[command(name = "jarvis", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable voice features (text only)
    #[arg(long)]
    disable_voice: bool,

    /// Config file (defaults to the user config directory)
    #[arg(long, env = "JARVIS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Ask one question and print the reply
    Ask {
        /// Question text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Run one quick command (weather, news, music, settings)
    Command {
        /// Command key
        key: String,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Good evening. All systems are operational.")]
        text: String,
    },
}

/// Input for a single non-interactive exchange
enum OneShot {
    Text(String),
    Quick(String),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,jarvis_console=info",
        1 => "info,jarvis_console=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
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
    let config_path = cli.config.as_deref();

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Ask { text } => {
                let config = Config::load(config_path, true)?;
                one_shot(config, OneShot::Text(text.join(" "))).await
            }
            Command::Command { key } => {
                let config = Config::load(config_path, true)?;
                one_shot(config, OneShot::Quick(key)).await
            }
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => {
                let config = Config::load(config_path, false)?;
                test_tts(&config, &text).await
            }
        };
    }

    let config = Config::load(config_path, cli.disable_voice)?;
    tracing::debug!(?config, "loaded configuration");
    tracing::info!(
        model = %config.llm.model,
        voice = config.voice.enabled,
        "starting assistant console"
    );

    let (engine, events) = DeviceSpeech::new(&config.voice);
    let speech = SpeechCoordinator::new(Arc::new(engine));
    let events = speech.is_supported().then_some(events);

    let name = config.assistant.name.clone();
    let backend = ChatCompletionsBackend::new(config.llm, &name);
    let orchestrator = Orchestrator::new(backend, speech, &config.assistant.greeting);

    Console::new(orchestrator, name).run(events).await?;
    Ok(())
}

/// Run one exchange without voice and print the reply
async fn one_shot(config: Config, input: OneShot) -> anyhow::Result<()> {
    let name = config.assistant.name.clone();
    let backend = ChatCompletionsBackend::new(config.llm, &name);
    let mut orchestrator = Orchestrator::new(
        backend,
        SpeechCoordinator::unsupported(),
        &config.assistant.greeting,
    );

    let outcome = match &input {
        OneShot::Text(text) => orchestrator.handle_user_input(text).await,
        OneShot::Quick(key) => orchestrator.handle_quick_command(key).await,
    };

    if outcome == Outcome::Ignored {
        match input {
            OneShot::Text(_) => anyhow::bail!("nothing to ask"),
            OneShot::Quick(key) => anyhow::bail!("unknown quick command: {key}"),
        }
    }

    if let Some(reply) = orchestrator.store().last() {
        println!("{}", reply.content());
    }
    if let Some(track) = orchestrator.now_playing() {
        println!("{}", track.youtube_search_url());
    }

    if outcome == Outcome::BackendFailed {
        anyhow::bail!("generation backend unavailable");
    }
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::open()?;
    capture.start()?;
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.drain();
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let samples = sine_tone(440.0, Duration::from_secs(2), 0.3);
    AudioPlayback::play(samples).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}

/// Test TTS output
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    use secrecy::ExposeSecret;

    println!("Testing TTS with text: \"{text}\"\n");

    let key = config
        .voice
        .api_key
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is not set"))?;
    let tts = TextToSpeech::new(
        key.expose_secret(),
        config.voice.tts_model.clone(),
        config.voice.tts_voice.clone(),
        config.voice.tts_speed,
        config.voice.api_base_url.clone(),
    )?;

    println!("Synthesizing speech...");
    let mp3_data = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    println!("Playing audio...");
    AudioPlayback::play(decode_mp3(&mp3_data)?).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
