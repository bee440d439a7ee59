use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use podium::engine::simulated::{
    ScriptedEvent, SimulatedRecognitionEngine, SimulatedSynthesisEngine,
};
use podium::{Config, ServiceEngines, SpeechConfig, SpeechService};

/// Podium - speech capability coordination for voice interfaces
#[derive(Parser)]
#[command(name = "podium", version, about)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "PODIUM_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scripted hands-free exchange against the simulated engines
    Demo {
        /// JSON file with utterances for the keyword listener
        #[arg(short, long)]
        script: Option<PathBuf>,
    },
    /// Print the debug snapshot of a freshly initialized stack
    Snapshot,
}

/// One utterance in a demo script file
#[derive(Debug, Deserialize)]
struct DemoUtterance {
    /// Delay before the engine "hears" it, in milliseconds
    delay_ms: u64,
    /// The transcribed text
    transcript: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,podium=info",
        1 => "info,podium=debug",
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
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Some(Command::Demo { script }) => run_demo(config, script).await,
        Some(Command::Snapshot) => run_snapshot(config),
        None => run_demo(config, None).await,
    }
}

/// Build the keyword-listener sessions: from a JSON file, or the built-in
/// exchange exercising both handoff paths
///
/// Each utterance gets its own session, since the keyword listener is
/// stopped and re-armed around every handoff.
fn keyword_sessions(path: Option<&PathBuf>) -> anyhow::Result<Vec<Vec<ScriptedEvent>>> {
    let Some(path) = path else {
        return Ok(vec![
            // Keyword with the command riding along in the same utterance
            vec![ScriptedEvent::final_result(200, "estorm enciende las luces")],
            // Bare keyword: a dedicated command-capture session follows
            vec![ScriptedEvent::final_result(400, "hola")],
        ]);
    };

    let raw = std::fs::read_to_string(path)?;
    let utterances: Vec<DemoUtterance> = serde_json::from_str(&raw)?;
    Ok(utterances
        .into_iter()
        .map(|u| vec![ScriptedEvent::final_result(u.delay_ms, u.transcript)])
        .collect())
}

async fn run_demo(config: Config, script: Option<PathBuf>) -> anyhow::Result<()> {
    let keyword_engine = SimulatedRecognitionEngine::available();
    for session in keyword_sessions(script.as_ref())? {
        keyword_engine.script_queue().push(session);
    }

    let command_engine = SimulatedRecognitionEngine::with_session(vec![
        ScriptedEvent::final_result(300, "abre la consola"),
    ]);
    let synthesis_engine = SimulatedSynthesisEngine::new().with_ms_per_word(40);

    let mut service = SpeechService::new(config);
    let initialized = service.initialize(ServiceEngines {
        dictation: Box::new(SimulatedRecognitionEngine::available()),
        keyword: Box::new(keyword_engine),
        command: Box::new(command_engine),
        synthesis: Box::new(synthesis_engine),
    });
    anyhow::ensure!(initialized, "speech service failed to initialize");

    let (command_tx, mut command_rx) = mpsc::unbounded_channel();
    service.subscribe_commands(move |event| {
        let _ = command_tx.send(event.clone());
    });

    println!("listening for keywords (simulated)...");

    // Drain command events until the exchange goes quiet
    loop {
        match tokio::time::timeout(Duration::from_millis(2_000), command_rx.recv()).await {
            Ok(Some(event)) => {
                println!("command via '{}': {}", event.keyword, event.command);
                let reply = format!("Claro: {}", event.command);
                let id = service.speak(&reply, &SpeechConfig::default())?;
                tracing::debug!(%id, "queued spoken reply");
            }
            Ok(None) | Err(_) => break,
        }
    }

    // Let any queued replies finish playing
    tokio::time::sleep(Duration::from_millis(600)).await;

    println!("\n{}", service.debug_snapshot());
    Ok(())
}

fn run_snapshot(config: Config) -> anyhow::Result<()> {
    let mut service = SpeechService::new(config);
    let initialized = service.initialize(ServiceEngines {
        dictation: Box::new(SimulatedRecognitionEngine::available()),
        keyword: Box::new(SimulatedRecognitionEngine::available()),
        command: Box::new(SimulatedRecognitionEngine::available()),
        synthesis: Box::new(SimulatedSynthesisEngine::new()),
    });
    anyhow::ensure!(initialized, "speech service failed to initialize");
    println!("{}", service.debug_snapshot());
    Ok(())
}
