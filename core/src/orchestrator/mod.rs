//! Conversation orchestrator: one user turn end to end.
//!
//! Turn flow:
//! 1. lock the session and append the user turn
//! 2. send the full history to the chat backend
//! 3. on success append the assistant turn and release the session
//! 4. synthesize the reply with the active voice (if speech is enabled)
//! 5. if no audio came out, optionally write a text transcript
//!
//! A backend failure aborts at step 2: the user turn stays in history, no
//! assistant turn is added and synthesis is not attempted.

mod command;

pub use command::{Command, CommandReply, Control, HELP_TEXT};

use crate::chat::{ChatBackend, ChatClientConfig, CompletionOptions};
use crate::session::{Role, SessionConfig, SessionStore};
use crate::synthesis::{SynthesisPipeline, SynthesisResult};
use crate::transcript::TranscriptWriter;
use crate::voice::VoiceCatalog;
use crate::{ParleyError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub system_prompt: String,
    pub completion: CompletionOptions,
    /// Voice active when the orchestrator starts
    pub default_voice: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            system_prompt: SessionConfig::default().system_prompt,
            completion: ChatClientConfig::default().completion_options(),
            default_voice: std::env::var("PARLEY_SPEAKER")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "Emma".to_string()),
        }
    }
}

#[derive(Debug)]
pub struct TurnOutcome {
    pub reply: String,
    /// `None` when speech output is disabled
    pub synthesis: Option<SynthesisResult>,
    pub transcript: Option<PathBuf>,
}

impl TurnOutcome {
    pub fn audio_path(&self) -> Option<&PathBuf> {
        self.synthesis.as_ref().and_then(|s| s.audio_path.as_ref())
    }
}

pub struct Orchestrator {
    cfg: OrchestratorConfig,
    sessions: Arc<SessionStore>,
    chat: Arc<dyn ChatBackend>,
    catalog: Arc<VoiceCatalog>,
    synthesis: Option<Arc<SynthesisPipeline>>,
    transcripts: Option<TranscriptWriter>,
    active_voice: RwLock<String>,
}

impl Orchestrator {
    pub fn new(
        cfg: OrchestratorConfig,
        sessions: Arc<SessionStore>,
        chat: Arc<dyn ChatBackend>,
        catalog: Arc<VoiceCatalog>,
    ) -> Self {
        let active_voice = RwLock::new(cfg.default_voice.clone());
        Self {
            cfg,
            sessions,
            chat,
            catalog,
            synthesis: None,
            transcripts: None,
            active_voice,
        }
    }

    pub fn with_synthesis(mut self, pipeline: Arc<SynthesisPipeline>) -> Self {
        self.synthesis = Some(pipeline);
        self
    }

    pub fn with_transcripts(mut self, writer: TranscriptWriter) -> Self {
        self.transcripts = Some(writer);
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn catalog(&self) -> &Arc<VoiceCatalog> {
        &self.catalog
    }

    pub fn speech_enabled(&self) -> bool {
        self.synthesis.is_some()
    }

    pub async fn active_voice(&self) -> String {
        self.active_voice.read().await.clone()
    }

    /// List backend models; an empty list is `NoModelsLoaded`.
    pub async fn check_connection(&self) -> Result<Vec<String>> {
        let models = self.chat.list_models().await?;
        if models.is_empty() {
            warn!(target = "orchestrator", "Chat backend reachable but no models are loaded");
            return Err(ParleyError::NoModelsLoaded);
        }
        info!(target = "orchestrator", models = %models.join(", "), "Chat backend connected");
        Ok(models)
    }

    pub async fn turn(&self, session_id: &str, user_text: &str) -> Result<TurnOutcome> {
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return Err(ParleyError::InvalidInput("empty message".into()));
        }

        let reply = {
            // Held across the backend call so turns of one session never interleave.
            let mut session = self.sessions.lock(session_id, &self.cfg.system_prompt).await;
            session.append(Role::User, user_text);
            let history = session.snapshot();
            debug!(target = "orchestrator", session_id = %session_id, turns = history.len(), "Sending history to backend");

            let reply = match self.chat.complete(&history, &self.cfg.completion).await {
                Ok(r) => r,
                Err(e) => {
                    error!(target = "orchestrator", session_id = %session_id, error = %e, "Chat completion failed");
                    return Err(e);
                }
            };
            session.append(Role::Assistant, reply.as_str());
            reply
        };

        let synthesis = match &self.synthesis {
            Some(pipeline) => {
                let voice = self.active_voice().await;
                Some(pipeline.synthesize(&reply, Some(voice.as_str())).await)
            }
            None => None,
        };

        let text_only = synthesis.as_ref().map(|s| !s.success()).unwrap_or(true);
        let transcript = match (&self.transcripts, text_only) {
            (Some(writer), true) => match writer.write(user_text, &reply).await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(target = "orchestrator", error = %e, "Failed to write transcript");
                    None
                }
            },
            _ => None,
        };

        Ok(TurnOutcome {
            reply,
            synthesis,
            transcript,
        })
    }

    /// Run an in-band command. Only `/voices` and `/voice` touch the catalog;
    /// no command reaches the network or the synthesis pipeline.
    pub async fn handle_command(&self, session_id: &str, command: Command) -> CommandReply {
        match command {
            Command::Help => CommandReply::Help,
            Command::Voices => CommandReply::Voices(self.catalog.list().clone()),
            Command::Voice(None) => CommandReply::VoiceUsage,
            Command::Voice(Some(name)) => match self.catalog.resolve(&name) {
                Some(preset) => {
                    *self.active_voice.write().await = preset.name.clone();
                    info!(target = "orchestrator", requested = %name, voice = %preset.name, "Active voice changed");
                    CommandReply::VoiceChanged(preset.name.clone())
                }
                None => {
                    let err = ParleyError::VoiceNotFound(name.clone());
                    warn!(target = "orchestrator", error = %err, "Voice change rejected");
                    CommandReply::VoiceRejected(name)
                }
            },
            Command::Clear => {
                match self.sessions.clear(session_id).await {
                    Ok(()) | Err(ParleyError::SessionNotFound(_)) => {}
                    Err(e) => warn!(target = "orchestrator", error = %e, "Failed to clear history"),
                }
                CommandReply::Cleared
            }
            Command::Quit => CommandReply::Quit,
            Command::Unknown(cmd) => CommandReply::Unknown(cmd),
        }
    }
}
