//! Speech synthesis: device selection, the speech model boundary, and the
//! pipeline that turns assistant text into a WAV file on disk.

mod command;
mod device;
mod model;
mod pipeline;

pub use command::CommandSpeechModel;
pub use device::{
    select_device, DeviceDetector, DeviceRequest, InferenceDevice, ResolvedDevice, SystemDetector,
};
pub use model::{GenerationParams, SpeechAudio, SpeechModel, SynthesisRequest};
pub use pipeline::{SynthesisConfig, SynthesisPipeline, SynthesisResult};
