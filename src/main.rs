//! langspeak - type text, hear it spoken in its own language
//!
//! Each submitted line is language-detected and read aloud with espeak-ng.

use anyhow::Context;
use clap::{Parser, Subcommand};
use langspeak::config_loader::Settings;
use langspeak::detector;
use langspeak::engine::SpeechEngine;
use langspeak::language::resolve_language;
use langspeak::orchestrator::InputOrchestrator;
use langspeak::playback::PlaybackController;
use langspeak::screen::{Screen, ScreenHandle, TerminalView};
use std::io::BufRead;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "langspeak")]
#[command(author = "StarTuz")]
#[command(version)]
#[command(about = "Detects the language of typed text and speaks it aloud", long_about = None)]
struct Cli {
    /// Extra config file, layered over the defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Language detector: whatlang or service
    #[arg(long)]
    detector: Option<String>,

    /// Language used when detection is inconclusive
    #[arg(long)]
    fallback: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read lines from stdin and speak each one (default)
    Run,

    /// Speak one text and exit when done
    Say {
        /// Text to speak
        text: String,
    },

    /// Print the language that would be used for a text
    Detect {
        /// Text to classify
        text: String,
    },

    /// List installed voices
    Voices,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("langspeak=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::new(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(detector) = cli.detector {
        settings.detector = detector;
    }
    if let Some(fallback) = cli.fallback {
        settings.fallback_language = fallback;
    }
    settings.validate().context("Invalid settings")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let (screen, handle) = build_screen(&settings)?;
            // Plain thread: a blocked stdin read must not hold up runtime shutdown
            let input = handle.clone();
            std::thread::spawn(move || read_input(input));
            tokio::spawn(close_on_ctrl_c(handle));
            screen.run().await;
        }
        Commands::Say { text } => {
            let (screen, handle) = build_screen(&settings)?;
            tokio::spawn(close_on_ctrl_c(handle.clone()));
            handle.submit(text);
            handle.close_when_idle();
            screen.run().await;
        }
        Commands::Detect { text } => {
            let detector = detector::from_settings(&settings)?;
            let outcome = detector.identify(&text).await;
            println!("{}", resolve_language(outcome, &settings.fallback_language));
        }
        Commands::Voices => {
            let engine = langspeak::engine_from_settings(&settings);
            let voices = engine.list_voices().await.context("Failed to list voices")?;
            for voice in voices {
                println!("{:<12} {:<28} {}", voice.id, voice.name, voice.language);
            }
        }
    }

    Ok(())
}

fn build_screen(settings: &Settings) -> anyhow::Result<(Screen<TerminalView>, ScreenHandle)> {
    let detector = detector::from_settings(settings)?;
    let controller = PlaybackController::new(langspeak::engine_from_settings(settings));
    let orchestrator = InputOrchestrator::new(detector, &settings.fallback_language);
    Ok(Screen::new(controller, orchestrator, TerminalView))
}

fn read_input(handle: ScreenHandle) {
    for line in std::io::stdin().lock().lines() {
        match line {
            Ok(line) => {
                if !handle.submit(line) {
                    return;
                }
            }
            Err(e) => {
                tracing::error!("Failed to read input: {}", e);
                break;
            }
        }
    }
    handle.close_when_idle();
}

async fn close_on_ctrl_c(handle: ScreenHandle) {
    if tokio::signal::ctrl_c().await.is_ok() {
        handle.close();
    }
}
