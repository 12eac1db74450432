// Parley Core Library
// Spoken multi-turn chat: sessions, chat backend, voice catalog, synthesis

pub mod chat;
pub mod orchestrator;
pub mod session;
pub mod synthesis;
pub mod transcript;
pub mod voice;

mod util;

// Export core types
pub use chat::{ChatBackend, ChatClient, ChatClientConfig, CompletionOptions};
pub use orchestrator::{
    Command, CommandReply, Control, Orchestrator, OrchestratorConfig, TurnOutcome,
};
pub use session::{ConversationSession, ConversationTurn, Role, SessionConfig, SessionStore};
pub use synthesis::{
    select_device, CommandSpeechModel, DeviceDetector, DeviceRequest, GenerationParams,
    InferenceDevice, ResolvedDevice, SpeechAudio, SpeechModel, SynthesisConfig,
    SynthesisPipeline, SynthesisRequest, SynthesisResult, SystemDetector,
};
pub use transcript::TranscriptWriter;
pub use voice::{Gender, Language, VoiceCatalog, VoiceCatalogConfig, VoiceListing, VoicePreset};

use std::path::PathBuf;

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParleyError {
    #[error("Chat backend unreachable: {0}")]
    BackendUnreachable(String),

    #[error("Chat backend error: status={status} body={body}")]
    BackendBadStatus { status: u16, body: String },

    #[error("Chat backend timed out: {0}")]
    BackendTimeout(String),

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    #[error("Chat backend has no models loaded")]
    NoModelsLoaded,

    #[error("Voice not found: {0}")]
    VoiceNotFound(String),

    #[error("No voice presets available")]
    NoVoiceAvailable,

    #[error("Inference device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Speech model produced no audio")]
    SynthesisEmpty,

    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("Speech model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Voice catalog location missing: {0}")]
    CatalogUnavailable(PathBuf),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ParleyError>;
