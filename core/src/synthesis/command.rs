//! Speech model backed by an external synthesis executable.
//!
//! The executable receives the text on stdin and is invoked as:
//!
//! ```text
//! <bin> --model_path <model> --voice <preset file> --device <cuda|mps|cpu>
//!       --cfg_scale <f32> [--max_new_tokens <n>] --output <wav>
//! ```
//!
//! It must write a WAV file to `--output`. A missing or empty file is
//! reported as "no audio" rather than an error.

use super::model::{SpeechAudio, SpeechModel, SynthesisRequest};
use super::pipeline::SynthesisConfig;
use crate::util::{create_artifact, get_from_path};
use crate::{ParleyError, Result};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct CommandSpeechModel {
    bin: PathBuf,
    model_path: String,
    temp_dir: PathBuf,
}

impl CommandSpeechModel {
    /// Locate the executable. Fails with `ModelUnavailable` when it cannot be found.
    pub fn load(cfg: &SynthesisConfig) -> Result<Self> {
        let bin = cfg
            .tts_bin
            .as_ref()
            .and_then(|b| {
                if b.exists() {
                    Some(b.clone())
                } else {
                    get_from_path(&b.to_string_lossy())
                }
            })
            .ok_or_else(|| {
                ParleyError::ModelUnavailable(
                    "synthesis executable not found; set PARLEY_TTS_BIN".into(),
                )
            })?;
        std::fs::create_dir_all(&cfg.temp_dir)?;
        info!(target = "synthesis", bin = ?bin, model = %cfg.model_path, "Loaded speech model runner");
        Ok(Self {
            bin,
            model_path: cfg.model_path.clone(),
            temp_dir: cfg.temp_dir.clone(),
        })
    }

    pub fn bin(&self) -> &PathBuf {
        &self.bin
    }
}

impl SpeechModel for CommandSpeechModel {
    fn generate(&self, request: &SynthesisRequest) -> Result<Option<SpeechAudio>> {
        // Claim the name up front; the executable overwrites the empty file.
        let (out_wav, placeholder) = create_artifact(&self.temp_dir, "parley_tts", "wav")?;
        drop(placeholder);

        let mut cmd = Command::new(&self.bin);
        cmd.arg("--model_path").arg(&self.model_path);
        cmd.arg("--voice").arg(&request.voice.path);
        cmd.arg("--device").arg(request.device.as_str());
        cmd.arg("--cfg_scale")
            .arg(format!("{:.2}", request.params.cfg_scale));
        if let Some(n) = request.params.max_new_tokens {
            cmd.arg("--max_new_tokens").arg(n.to_string());
        }
        cmd.arg("--output").arg(&out_wav);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        debug!(target = "synthesis", command = ?cmd, "Running synthesis executable");
        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                let _ = std::fs::remove_file(&out_wav);
                return Err(e.into());
            }
        };
        // The child is always reaped, even when it closed stdin early.
        let fed = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(request.text.as_bytes()),
            None => Ok(()),
        };
        let output = child.wait_with_output();
        let output = match output {
            Ok(o) => o,
            Err(e) => {
                let _ = std::fs::remove_file(&out_wav);
                return Err(e.into());
            }
        };
        if !output.status.success() {
            let _ = std::fs::remove_file(&out_wav);
            return Err(ParleyError::SynthesisFailed(format!(
                "synthesis executable failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        if let Err(e) = fed {
            let _ = std::fs::remove_file(&out_wav);
            return Err(ParleyError::SynthesisFailed(format!(
                "synthesis executable did not read its input: {e}"
            )));
        }

        let written = std::fs::metadata(&out_wav).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            let _ = std::fs::remove_file(&out_wav);
            warn!(target = "synthesis", "Synthesis executable wrote no WAV output");
            return Ok(None);
        }
        let audio = SpeechAudio::read_wav(&out_wav);
        let _ = std::fs::remove_file(&out_wav);
        let audio = audio?;
        Ok(if audio.is_empty() { None } else { Some(audio) })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::synthesis::{GenerationParams, InferenceDevice};
    use crate::voice::VoicePreset;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &std::path::Path, body: &str) -> PathBuf {
        let path = dir.join("fake-tts.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn config(dir: &std::path::Path, bin: Option<PathBuf>) -> SynthesisConfig {
        SynthesisConfig {
            tts_bin: bin,
            temp_dir: dir.join("tmp"),
            output_dir: dir.join("out"),
            ..SynthesisConfig::default()
        }
    }

    fn request() -> SynthesisRequest {
        SynthesisRequest {
            text: "Hi there".into(),
            voice: VoicePreset::new("en-Emma_woman", "/voices/en-Emma_woman.pt"),
            device: InferenceDevice::Cpu,
            params: GenerationParams::default(),
        }
    }

    #[test]
    fn load_fails_without_executable() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), Some(dir.path().join("missing-bin")));
        assert!(matches!(
            CommandSpeechModel::load(&cfg),
            Err(ParleyError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn missing_output_means_no_audio() {
        let dir = tempfile::tempdir().unwrap();
        let bin = script(dir.path(), "cat > /dev/null; exit 0");
        let model = CommandSpeechModel::load(&config(dir.path(), Some(bin))).unwrap();
        assert!(model.generate(&request()).unwrap().is_none());
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let bin = script(dir.path(), "cat > /dev/null; echo boom >&2; exit 3");
        let model = CommandSpeechModel::load(&config(dir.path(), Some(bin))).unwrap();
        match model.generate(&request()) {
            Err(ParleyError::SynthesisFailed(msg)) => assert!(msg.contains("boom")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn early_exit_without_reading_input_is_reaped_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        // Exits before reading stdin, so a large write hits a closed pipe.
        let bin = script(dir.path(), "echo refused >&2; exit 2");
        let model = CommandSpeechModel::load(&config(dir.path(), Some(bin))).unwrap();
        let mut req = request();
        req.text = "x".repeat(1 << 20);
        match model.generate(&req) {
            Err(ParleyError::SynthesisFailed(msg)) => assert!(msg.contains("refused")),
            other => panic!("unexpected: {other:?}"),
        }
        // No temp WAV is left behind.
        assert_eq!(std::fs::read_dir(dir.path().join("tmp")).unwrap().count(), 0);
    }

    #[test]
    fn writes_audio_through_output_flag() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = dir.path().join("fixture.wav");
        SpeechAudio {
            samples: vec![0.25; 240],
            sample_rate: 24_000,
        }
        .write_wav(&fixture)
        .unwrap();
        let body = format!(
            "cat > /dev/null\nwhile [ $# -gt 0 ]; do if [ \"$1\" = --output ]; then cp {} \"$2\"; fi; shift; done",
            fixture.display()
        );
        let bin = script(dir.path(), &body);
        let model = CommandSpeechModel::load(&config(dir.path(), Some(bin))).unwrap();
        let audio = model.generate(&request()).unwrap().unwrap();
        assert_eq!(audio.samples.len(), 240);
        assert_eq!(audio.sample_rate, 24_000);
    }
}
