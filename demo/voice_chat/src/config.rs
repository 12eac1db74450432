use std::fs;
use std::path::{Path, PathBuf};

use parley_core::{
    ChatClientConfig, OrchestratorConfig, SessionConfig, SynthesisConfig, VoiceCatalogConfig,
};

/// High-level configuration for the voice chat binary
#[derive(Clone, Debug)]
pub struct VoiceChatConfig {
    pub chat: ChatClientConfig,
    pub session: SessionConfig,
    pub voices: VoiceCatalogConfig,
    pub synthesis: SynthesisConfig,
    /// Voice active at startup
    pub speaker: String,
    /// Write a text transcript for turns that produced no audio
    pub save_transcripts: bool,
}

impl Default for VoiceChatConfig {
    fn default() -> Self {
        // Start from component defaults (which already consider env vars)
        Self {
            chat: ChatClientConfig::default(),
            session: SessionConfig::default(),
            voices: VoiceCatalogConfig::default(),
            synthesis: SynthesisConfig::default(),
            speaker: OrchestratorConfig::default().default_voice,
            save_transcripts: std::env::var("PARLEY_SAVE_TRANSCRIPTS")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(true),
        }
    }
}

impl VoiceChatConfig {
    /// Load configuration from a TOML file (path via VOICE_CHAT_CONFIG or ./voice_chat.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let path = std::env::var("VOICE_CHAT_CONFIG").unwrap_or_else(|_| "voice_chat.toml".into());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(p: &Path) -> Self {
        let default = Self::default();
        if !p.exists() {
            tracing::info!(target = "voice_chat", path = %p.display(), "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match toml::from_str::<VoiceChatToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(target = "voice_chat", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target = "voice_chat", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    /// Orchestrator settings derived from the chat and session sections.
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            system_prompt: self.session.system_prompt.clone(),
            completion: self.chat.completion_options(),
            default_voice: self.speaker.clone(),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct VoiceChatToml {
    pub speaker: Option<String>,
    pub save_transcripts: Option<bool>,
    pub chat: Option<ChatToml>,
    pub session: Option<SessionToml>,
    pub voices: Option<VoicesToml>,
    pub synthesis: Option<SynthesisToml>,
}

impl VoiceChatToml {
    fn overlay(self, mut base: VoiceChatConfig) -> VoiceChatConfig {
        if let Some(s) = self.speaker {
            base.speaker = s;
        }
        if let Some(s) = self.save_transcripts {
            base.save_transcripts = s;
        }
        if let Some(c) = self.chat {
            c.apply(&mut base.chat);
        }
        if let Some(s) = self.session {
            s.apply(&mut base.session);
        }
        if let Some(v) = self.voices {
            v.apply(&mut base.voices);
        }
        if let Some(s) = self.synthesis {
            s.apply(&mut base.synthesis);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct ChatToml {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub models_timeout_ms: Option<u64>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}
impl ChatToml {
    fn apply(self, c: &mut ChatClientConfig) {
        if let Some(x) = self.base_url {
            c.base_url = x;
        }
        if let Some(x) = self.model {
            c.model = Some(x).filter(|m| !m.is_empty());
        }
        if let Some(x) = self.api_key {
            c.api_key = Some(x).filter(|k| !k.is_empty());
        }
        if let Some(x) = self.request_timeout_ms {
            c.request_timeout_ms = x;
        }
        if let Some(x) = self.models_timeout_ms {
            c.models_timeout_ms = x;
        }
        if let Some(x) = self.temperature {
            c.temperature = x;
        }
        if let Some(x) = self.max_tokens {
            c.max_tokens = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct SessionToml {
    pub history_limit: Option<usize>,
    pub system_prompt: Option<String>,
}
impl SessionToml {
    fn apply(self, s: &mut SessionConfig) {
        if let Some(x) = self.history_limit {
            s.history_limit = x.max(1);
        }
        if let Some(x) = self.system_prompt {
            s.system_prompt = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct VoicesToml {
    pub dir: Option<PathBuf>,
    pub extension: Option<String>,
}
impl VoicesToml {
    fn apply(self, v: &mut VoiceCatalogConfig) {
        if let Some(x) = self.dir {
            v.voices_dir = x;
        }
        if let Some(x) = self.extension {
            v.extension = x.trim_start_matches('.').to_string();
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct SynthesisToml {
    pub device: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub cfg_scale: Option<f32>,
    pub tts_bin: Option<PathBuf>,
    pub model_path: Option<String>,
    pub temp_dir: Option<PathBuf>,
}
impl SynthesisToml {
    fn apply(self, s: &mut SynthesisConfig) {
        if let Some(x) = self.device {
            s.device = x;
        }
        if let Some(x) = self.output_dir {
            s.output_dir = x;
        }
        if let Some(x) = self.timeout_ms {
            s.timeout_ms = x;
        }
        if let Some(x) = self.cfg_scale {
            s.cfg_scale = x;
        }
        if let Some(x) = self.tts_bin {
            s.tts_bin = Some(x);
        }
        if let Some(x) = self.model_path {
            s.model_path = x;
        }
        if let Some(x) = self.temp_dir {
            s.temp_dir = x;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn missing_file_uses_defaults() {
        std::env::remove_var("PARLEY_SAVE_TRANSCRIPTS");
        let dir = tempfile::tempdir().unwrap();
        let cfg = VoiceChatConfig::load_from(&dir.path().join("absent.toml"));
        assert!(cfg.save_transcripts);
        assert_eq!(cfg.session.history_limit, SessionConfig::default().history_limit);
    }

    #[test]
    #[serial]
    fn toml_overlays_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voice_chat.toml");
        fs::write(
            &path,
            r#"
speaker = "Carter"
save_transcripts = false

[chat]
base_url = "http://lmstudio:1234"
max_tokens = 200

[session]
history_limit = 10

[voices]
dir = "/srv/voices"
extension = ".pt"

[synthesis]
device = "cpu"
cfg_scale = 1.3
"#,
        )
        .unwrap();

        let cfg = VoiceChatConfig::load_from(&path);
        assert_eq!(cfg.speaker, "Carter");
        assert!(!cfg.save_transcripts);
        assert_eq!(cfg.chat.base_url, "http://lmstudio:1234");
        assert_eq!(cfg.chat.max_tokens, 200);
        assert_eq!(cfg.session.history_limit, 10);
        assert_eq!(cfg.voices.voices_dir, PathBuf::from("/srv/voices"));
        assert_eq!(cfg.voices.extension, "pt");
        assert_eq!(cfg.synthesis.device, "cpu");
        assert!((cfg.synthesis.cfg_scale - 1.3).abs() < f32::EPSILON);

        let orch = cfg.orchestrator();
        assert_eq!(orch.default_voice, "Carter");
        assert_eq!(orch.completion.max_tokens, 200);
    }

    #[test]
    #[serial]
    fn invalid_toml_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "speaker = [unclosed").unwrap();
        let cfg = VoiceChatConfig::load_from(&path);
        assert_eq!(cfg.speaker, VoiceChatConfig::default().speaker);
    }

    #[test]
    fn parses_bool_flags() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
