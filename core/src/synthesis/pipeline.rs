use super::device::{InferenceDevice, ResolvedDevice};
use super::model::{GenerationParams, SpeechModel, SynthesisRequest};
use crate::util::{create_artifact, get_from_env_or_path};
use crate::voice::{VoiceCatalog, VoicePreset};
use crate::{ParleyError, Result};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task;
use tokio::time::{timeout_at, Duration, Instant};
use tracing::{info, warn};

#[derive(Clone, Debug)]
pub struct SynthesisConfig {
    /// Requested device: auto, cuda, mps (or mpx), cpu
    pub device: String,
    /// Where synthesized WAV files are written
    pub output_dir: PathBuf,
    /// Upper bound on how long a caller waits for one generation
    pub timeout_ms: u64,
    pub cfg_scale: f32,
    /// External synthesis executable; `None` disables speech output
    pub tts_bin: Option<PathBuf>,
    pub model_path: String,
    pub temp_dir: PathBuf,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            device: std::env::var("PARLEY_DEVICE").unwrap_or_else(|_| "auto".to_string()),
            output_dir: std::env::var("PARLEY_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("chat_outputs")),
            timeout_ms: std::env::var("PARLEY_TTS_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(120_000),
            cfg_scale: std::env::var("PARLEY_CFG_SCALE")
                .ok()
                .and_then(|s| s.parse::<f32>().ok())
                .unwrap_or(1.5),
            tts_bin: get_from_env_or_path("PARLEY_TTS_BIN", "parley-tts"),
            model_path: std::env::var("PARLEY_MODEL_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "microsoft/VibeVoice".to_string()),
            temp_dir: std::env::var("PARLEY_TTS_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
        }
    }
}

/// Outcome of one `synthesize` call. Failures are values, not errors:
/// the conversation carries on text-only.
#[derive(Debug)]
pub struct SynthesisResult {
    pub audio_path: Option<PathBuf>,
    /// Canonical name of the preset actually used
    pub voice: Option<String>,
    pub device: InferenceDevice,
    pub failure: Option<ParleyError>,
}

impl SynthesisResult {
    pub fn success(&self) -> bool {
        self.audio_path.is_some() && self.failure.is_none()
    }

    fn failed(device: InferenceDevice, voice: Option<String>, err: ParleyError) -> Self {
        Self {
            audio_path: None,
            voice,
            device,
            failure: Some(err),
        }
    }
}

/// Owns the loaded speech model and its device. One generation runs at a time;
/// further calls queue on the synthesis lock.
pub struct SynthesisPipeline {
    model: Arc<dyn SpeechModel>,
    catalog: Arc<VoiceCatalog>,
    device: ResolvedDevice,
    params: GenerationParams,
    output_dir: PathBuf,
    timeout: Duration,
    lock: Arc<Mutex<()>>,
}

impl SynthesisPipeline {
    pub fn new(
        model: Arc<dyn SpeechModel>,
        catalog: Arc<VoiceCatalog>,
        device: ResolvedDevice,
        cfg: &SynthesisConfig,
    ) -> Result<Self> {
        std::fs::create_dir_all(&cfg.output_dir)?;
        Ok(Self {
            model,
            catalog,
            device,
            params: GenerationParams {
                cfg_scale: cfg.cfg_scale,
                ..GenerationParams::default()
            },
            output_dir: cfg.output_dir.clone(),
            timeout: Duration::from_millis(cfg.timeout_ms),
            lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn device(&self) -> InferenceDevice {
        self.device.device
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn catalog(&self) -> &Arc<VoiceCatalog> {
        &self.catalog
    }

    /// Resolve `name` against the catalog. Unknown names fall back to the first
    /// registered preset; an empty catalog is `NoVoiceAvailable`.
    pub fn resolve_voice(&self, name: Option<&str>) -> Result<VoicePreset> {
        if let Some(found) = name.and_then(|n| self.catalog.resolve(n)) {
            return Ok(found.clone());
        }
        let fallback = self
            .catalog
            .first()
            .cloned()
            .ok_or(ParleyError::NoVoiceAvailable)?;
        if let Some(n) = name {
            let err = ParleyError::VoiceNotFound(n.to_string());
            warn!(target = "synthesis", warning = %err, fallback = %fallback.name, "Using fallback voice");
        }
        Ok(fallback)
    }

    pub fn prepare(&self, text: &str, voice: VoicePreset) -> SynthesisRequest {
        SynthesisRequest {
            text: text.to_string(),
            voice,
            device: self.device.device,
            params: self.params,
        }
    }

    pub async fn synthesize(&self, text: &str, voice: Option<&str>) -> SynthesisResult {
        let device = self.device.device;
        let preset = match self.resolve_voice(voice) {
            Ok(p) => p,
            Err(e) => {
                warn!(target = "synthesis", error = %e, "Synthesis skipped");
                return SynthesisResult::failed(device, None, e);
            }
        };
        let voice_name = preset.name.clone();
        if text.trim().is_empty() {
            return SynthesisResult::failed(device, Some(voice_name), ParleyError::SynthesisEmpty);
        }

        let request = self.prepare(text, preset);
        let model = Arc::clone(&self.model);
        let output_dir = self.output_dir.clone();
        // One deadline covers both waiting for the lock and the generation itself.
        let deadline = Instant::now() + self.timeout;
        let timeout_ms = self.timeout.as_millis();

        let guard = match timeout_at(deadline, Arc::clone(&self.lock).lock_owned()).await {
            Ok(g) => g,
            Err(_) => {
                let err = ParleyError::SynthesisFailed(format!(
                    "timed out after {timeout_ms} ms waiting for a running generation"
                ));
                warn!(target = "synthesis", error = %err, voice = %voice_name, "Speech synthesis failed");
                return SynthesisResult::failed(device, Some(voice_name), err);
            }
        };
        let started = std::time::Instant::now();
        let cancelled = Arc::new(AtomicBool::new(false));
        let abandoned = Arc::clone(&cancelled);

        info!(
            target = "synthesis",
            voice = %voice_name,
            device = %device,
            chars = request.text.chars().count(),
            "Generating speech"
        );

        // The guard travels into the blocking task: if the caller stops waiting,
        // the next generation still cannot start until this one is done.
        let join = task::spawn_blocking(move || {
            let _guard = guard;
            let audio = model
                .generate(&request)?
                .filter(|a| !a.is_empty())
                .ok_or(ParleyError::SynthesisEmpty)?;
            if abandoned.load(Ordering::SeqCst) {
                warn!(
                    target = "synthesis",
                    voice = %request.voice.name,
                    "Generation finished after the caller timed out; audio discarded"
                );
                return Err(ParleyError::SynthesisFailed("caller timed out".into()));
            }
            let (path, file) = create_artifact(&output_dir, "chat_response", "wav")?;
            if let Err(e) = audio.write_wav_to(BufWriter::new(file)) {
                let _ = std::fs::remove_file(&path);
                return Err(e);
            }
            Ok::<_, ParleyError>((path, audio.duration_secs()))
        });

        let outcome = match timeout_at(deadline, join).await {
            Ok(Ok(res)) => res,
            Ok(Err(join_err)) => Err(ParleyError::SynthesisFailed(format!(
                "synthesis task failed: {join_err}"
            ))),
            Err(_) => {
                cancelled.store(true, Ordering::SeqCst);
                Err(ParleyError::SynthesisFailed(format!(
                    "timed out after {timeout_ms} ms"
                )))
            }
        };

        match outcome {
            Ok((path, secs)) => {
                info!(
                    target = "synthesis",
                    path = %path.display(),
                    audio_secs = secs,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Speech saved"
                );
                SynthesisResult {
                    audio_path: Some(path),
                    voice: Some(voice_name),
                    device,
                    failure: None,
                }
            }
            Err(e) => {
                warn!(target = "synthesis", error = %e, voice = %voice_name, "Speech synthesis failed");
                SynthesisResult::failed(device, Some(voice_name), e)
            }
        }
    }
}
