mod config;
use config::VoiceChatConfig;
use parley_core::{
    select_device, ChatClient, Command, CommandReply, CommandSpeechModel, Control, DeviceRequest,
    Orchestrator, SessionStore, SynthesisPipeline, SystemDetector, TranscriptWriter, VoiceCatalog,
};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};

const SESSION_ID: &str = "default";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging / tracing
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,parley_core=info,voice_chat=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    // Load configuration (defaults + env + optional TOML overlay)
    let cfg = VoiceChatConfig::load();

    let catalog = Arc::new(VoiceCatalog::load_or_empty(&cfg.voices));
    if std::env::args().skip(1).any(|a| a == "--list-voices") {
        println!("{}", CommandReply::Voices(catalog.list().clone()));
        return Ok(());
    }

    info!(
        target = "voice_chat",
        backend = %cfg.chat.base_url,
        voices = catalog.len(),
        "Starting voice chat"
    );

    // Speech output is optional: any failure here leaves the chat text-only.
    let pipeline = build_pipeline(&cfg, Arc::clone(&catalog));

    let chat = Arc::new(ChatClient::new(cfg.chat.clone())?);
    let sessions = Arc::new(SessionStore::from_config(&cfg.session));
    let mut orchestrator = Orchestrator::new(cfg.orchestrator(), sessions, chat, catalog);
    if let Some(p) = pipeline {
        orchestrator = orchestrator.with_synthesis(p);
    }
    if cfg.save_transcripts {
        match TranscriptWriter::new(&cfg.synthesis.output_dir) {
            Ok(w) => orchestrator = orchestrator.with_transcripts(w),
            Err(e) => warn!(target = "voice_chat", error = %e, "Transcripts disabled"),
        }
    }

    match orchestrator.check_connection().await {
        Ok(models) => println!("Connected to chat backend. Models: {}", models.join(", ")),
        Err(e) => {
            error!(target = "voice_chat", error = %e, "Chat backend check failed");
            println!("Cannot reach the chat backend at {}: {e}", cfg.chat.base_url);
            println!("Make sure the server is running and a model is loaded.");
            return Ok(());
        }
    }

    println!(
        "Speech output: {}. Active voice: {}",
        if orchestrator.speech_enabled() { "on" } else { "off" },
        orchestrator.active_voice().await
    );
    println!("Type a message, or /help for commands.");

    run_repl(&orchestrator).await;

    info!(target = "voice_chat", "Shutting down...");
    Ok(())
}

fn build_pipeline(
    cfg: &VoiceChatConfig,
    catalog: Arc<VoiceCatalog>,
) -> Option<Arc<SynthesisPipeline>> {
    let request = cfg.synthesis.device.parse::<DeviceRequest>().unwrap_or_else(|e| {
        warn!(target = "voice_chat", error = %e, "Invalid device; using auto");
        DeviceRequest::Auto
    });
    let device = select_device(request, &SystemDetector);

    let model = match CommandSpeechModel::load(&cfg.synthesis) {
        Ok(m) => m,
        Err(e) => {
            warn!(target = "voice_chat", error = %e, "Speech model unavailable; continuing text-only");
            return None;
        }
    };
    match SynthesisPipeline::new(Arc::new(model), catalog, device, &cfg.synthesis) {
        Ok(p) => Some(Arc::new(p)),
        Err(e) => {
            warn!(target = "voice_chat", error = %e, "Synthesis pipeline unavailable; continuing text-only");
            None
        }
    }
}

async fn run_repl(orchestrator: &Orchestrator) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\nYou: ");
        std::io::stdout().flush().ok();

        let line = tokio::select! {
            _ = signal::ctrl_c() => {
                println!("\nGoodbye!");
                break;
            }
            next = lines.next_line() => match next {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    error!(target = "voice_chat", error = %e, "Failed to read stdin");
                    break;
                }
            }
        };

        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        if let Some(command) = Command::parse(text) {
            let reply = orchestrator.handle_command(SESSION_ID, command).await;
            println!("{reply}");
            if reply.control() == Control::Terminate {
                break;
            }
            continue;
        }

        match orchestrator.turn(SESSION_ID, text).await {
            Ok(outcome) => {
                println!("Assistant: {}", outcome.reply);
                if let Some(path) = outcome.audio_path() {
                    println!("Audio saved: {}", path.display());
                } else if let Some(failure) =
                    outcome.synthesis.as_ref().and_then(|s| s.failure.as_ref())
                {
                    println!("(no audio: {failure})");
                }
                if let Some(path) = &outcome.transcript {
                    println!("Transcript saved: {}", path.display());
                }
            }
            Err(e) => println!("Error: {e}"),
        }
    }
}
