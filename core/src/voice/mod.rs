// Voice presets discovered on disk and the catalog that resolves them

mod catalog;
mod preset;

pub use catalog::{VoiceCatalog, VoiceCatalogConfig, VoiceListing};
pub use preset::{Gender, GenderBuckets, Language, VoicePreset};
