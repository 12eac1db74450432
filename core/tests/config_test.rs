use parley_core::{
    ChatClientConfig, OrchestratorConfig, SessionConfig, SynthesisConfig, VoiceCatalogConfig,
};
use serial_test::serial;
use std::path::PathBuf;

const VARS: &[&str] = &[
    "CHAT_BACKEND_URL",
    "LM_STUDIO_URL",
    "CHAT_MODEL",
    "CHAT_API_KEY",
    "CHAT_TIMEOUT_MS",
    "CHAT_MODELS_TIMEOUT_MS",
    "CHAT_TEMPERATURE",
    "CHAT_MAX_TOKENS",
    "CHAT_HISTORY_LIMIT",
    "CHAT_SYSTEM_PROMPT",
    "PARLEY_VOICES_DIR",
    "PARLEY_VOICE_EXTENSION",
    "PARLEY_DEVICE",
    "PARLEY_OUTPUT_DIR",
    "PARLEY_TTS_TIMEOUT_MS",
    "PARLEY_CFG_SCALE",
    "PARLEY_MODEL_PATH",
    "PARLEY_SPEAKER",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults() {
    clear_env();

    let chat = ChatClientConfig::default();
    assert_eq!(chat.base_url, "http://127.0.0.1:1234");
    assert_eq!(chat.model, None);
    assert_eq!(chat.api_key, None);
    assert_eq!(chat.request_timeout_ms, 30_000);
    assert_eq!(chat.models_timeout_ms, 5_000);
    assert_eq!(chat.max_tokens, 150);
    assert!((chat.temperature - 0.7).abs() < f32::EPSILON);

    let session = SessionConfig::default();
    assert_eq!(session.history_limit, 20);
    assert!(!session.system_prompt.is_empty());

    let voices = VoiceCatalogConfig::default();
    assert_eq!(voices.voices_dir, PathBuf::from("voices/streaming_model"));
    assert_eq!(voices.extension, "pt");

    let synth = SynthesisConfig::default();
    assert_eq!(synth.device, "auto");
    assert_eq!(synth.output_dir, PathBuf::from("chat_outputs"));
    assert_eq!(synth.timeout_ms, 120_000);
    assert!((synth.cfg_scale - 1.5).abs() < f32::EPSILON);
    assert_eq!(synth.model_path, "microsoft/VibeVoice");

    let orch = OrchestratorConfig::default();
    assert_eq!(orch.default_voice, "Emma");
    assert_eq!(orch.system_prompt, session.system_prompt);
    assert_eq!(orch.completion, chat.completion_options());
}

#[test]
#[serial]
fn test_env_overrides() {
    clear_env();
    std::env::set_var("CHAT_BACKEND_URL", "http://lmstudio:1234");
    std::env::set_var("CHAT_MODEL", "qwen2.5-7b-instruct");
    std::env::set_var("CHAT_TIMEOUT_MS", "1000");
    std::env::set_var("CHAT_MAX_TOKENS", "200");
    std::env::set_var("CHAT_HISTORY_LIMIT", "8");
    std::env::set_var("CHAT_SYSTEM_PROMPT", "Be brief.");
    std::env::set_var("PARLEY_VOICE_EXTENSION", ".bin");
    std::env::set_var("PARLEY_DEVICE", "mpx");
    std::env::set_var("PARLEY_SPEAKER", "Carter");

    let chat = ChatClientConfig::default();
    assert_eq!(chat.base_url, "http://lmstudio:1234");
    assert_eq!(chat.model.as_deref(), Some("qwen2.5-7b-instruct"));
    assert_eq!(chat.request_timeout_ms, 1_000);
    assert_eq!(chat.max_tokens, 200);

    let session = SessionConfig::default();
    assert_eq!(session.history_limit, 8);
    assert_eq!(session.system_prompt, "Be brief.");

    assert_eq!(VoiceCatalogConfig::default().extension, "bin");
    assert_eq!(SynthesisConfig::default().device, "mpx");
    assert_eq!(OrchestratorConfig::default().default_voice, "Carter");

    clear_env();
}

#[test]
#[serial]
fn test_legacy_backend_url_and_bad_values() {
    clear_env();
    std::env::set_var("LM_STUDIO_URL", "http://legacy:1234");
    std::env::set_var("CHAT_HISTORY_LIMIT", "0");
    std::env::set_var("CHAT_TEMPERATURE", "warm");

    assert_eq!(ChatClientConfig::default().base_url, "http://legacy:1234");
    // Unparseable or zero values fall back to defaults.
    assert_eq!(SessionConfig::default().history_limit, 20);
    assert!((ChatClientConfig::default().temperature - 0.7).abs() < f32::EPSILON);

    std::env::set_var("CHAT_BACKEND_URL", "http://preferred:1234");
    assert_eq!(ChatClientConfig::default().base_url, "http://preferred:1234");

    clear_env();
}
