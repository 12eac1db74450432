use super::device::InferenceDevice;
use crate::voice::VoicePreset;
use crate::{ParleyError, Result};
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

/// Decoding parameters passed to the speech model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Classifier-free guidance scale
    pub cfg_scale: f32,
    /// Always false: generation is greedy so the same text and voice give the same audio
    pub do_sample: bool,
    pub max_new_tokens: Option<u32>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            cfg_scale: 1.5,
            do_sample: false,
            max_new_tokens: None,
        }
    }
}

/// Everything one generation needs, bound to a resolved voice and device.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: VoicePreset,
    pub device: InferenceDevice,
    pub params: GenerationParams,
}

/// Mono PCM audio in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SpeechAudio {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Write as 16-bit PCM mono WAV.
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_wav_to(BufWriter::new(file))
    }

    /// Same as `write_wav`, into an already opened writer.
    pub fn write_wav_to<W: Write + Seek>(&self, sink: W) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(sink, spec).map_err(wav_error)?;
        for s in &self.samples {
            let pcm = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(pcm).map_err(wav_error)?;
        }
        writer.finalize().map_err(wav_error)
    }

    /// Read a WAV file, downmixing to mono. Integer formats are scaled to `[-1.0, 1.0]`.
    pub fn read_wav(path: &Path) -> Result<Self> {
        let mut reader = hound::WavReader::open(path).map_err(wav_error)?;
        let spec = reader.spec();
        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(wav_error)?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(wav_error)?
            }
        };
        let channels = usize::from(spec.channels.max(1));
        let samples = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                .collect()
        };
        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
        })
    }
}

fn wav_error(e: hound::Error) -> ParleyError {
    match e {
        hound::Error::IoError(io) => ParleyError::IoError(io),
        other => ParleyError::SynthesisFailed(format!("WAV error: {other}")),
    }
}

/// A loaded text-to-speech model.
///
/// `generate` blocks for the whole inference and is never called
/// concurrently by the pipeline. `Ok(None)` means the model ran but
/// produced no audio.
#[cfg_attr(test, mockall::automock)]
pub trait SpeechModel: Send + Sync {
    fn generate(&self, request: &SynthesisRequest) -> Result<Option<SpeechAudio>>;
}
