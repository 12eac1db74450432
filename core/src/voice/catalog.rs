//! Voice catalog: discovers preset files in a directory, categorizes them by
//! language and gender, and resolves user-supplied voice names.
//!
//! Lookup order for `resolve`:
//! 1. exact canonical name
//! 2. exact alias (`en-Emma_woman` is also reachable as `en-Emma`,
//!    `Emma_woman` and `Emma`)
//! 3. case-insensitive two-way substring scan over canonical names, first
//!    registered wins. This is best-effort and may pick an unrelated voice.
//!
//! Alias collisions are not resolved: a later alias silently replaces an
//! earlier one with the same text. Aliases never shadow canonical names.

use super::preset::{Gender, GenderBuckets, Language, VoicePreset};
use crate::{ParleyError, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// language → gender → names, in registration order
pub type VoiceListing = BTreeMap<Language, GenderBuckets>;

#[derive(Debug, Clone)]
pub struct VoiceCatalogConfig {
    /// Directory holding one file per voice preset
    pub voices_dir: PathBuf,
    /// File extension of serialized voice embeddings (without the dot)
    pub extension: String,
}

impl Default for VoiceCatalogConfig {
    fn default() -> Self {
        Self {
            voices_dir: std::env::var("PARLEY_VOICES_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("voices/streaming_model")),
            extension: std::env::var("PARLEY_VOICE_EXTENSION")
                .ok()
                .map(|s| s.trim_start_matches('.').to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "pt".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VoiceCatalog {
    source: Option<PathBuf>,
    extension: String,
    presets: Vec<VoicePreset>,
    by_name: HashMap<String, usize>,
    aliases: HashMap<String, usize>,
    index: VoiceListing,
}

impl VoiceCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Scan `cfg.voices_dir`. Fails with `CatalogUnavailable` when the directory is missing.
    pub fn load(cfg: &VoiceCatalogConfig) -> Result<Self> {
        let dir = &cfg.voices_dir;
        if !dir.is_dir() {
            return Err(ParleyError::CatalogUnavailable(dir.clone()));
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        // Directory order is platform dependent; sort so registration order is stable.
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let presets = files
            .iter()
            .filter_map(|p| VoicePreset::from_file(p, &cfg.extension));
        let mut catalog = Self::from_presets(presets);
        catalog.source = Some(dir.clone());
        catalog.extension = cfg.extension.clone();

        info!(
            target = "voice_catalog",
            dir = %dir.display(),
            presets = catalog.len(),
            aliases = catalog.aliases.len(),
            "Loaded voice catalog"
        );
        Ok(catalog)
    }

    /// Like `load`, but a missing directory yields an empty catalog.
    pub fn load_or_empty(cfg: &VoiceCatalogConfig) -> Self {
        match Self::load(cfg) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(target = "voice_catalog", error = %e, "Voice catalog unavailable; continuing without voices");
                Self {
                    source: Some(cfg.voices_dir.clone()),
                    extension: cfg.extension.clone(),
                    ..Self::default()
                }
            }
        }
    }

    /// Rescan the directory this catalog was loaded from.
    pub fn reload(&self) -> Result<Self> {
        let source = self
            .source
            .clone()
            .ok_or_else(|| ParleyError::ConfigError("catalog has no source directory".into()))?;
        Self::load(&VoiceCatalogConfig {
            voices_dir: source,
            extension: self.extension.clone(),
        })
    }

    /// Register presets in iteration order.
    pub fn from_presets(presets: impl IntoIterator<Item = VoicePreset>) -> Self {
        let mut catalog = Self::default();
        for preset in presets {
            catalog.register(preset);
        }
        catalog
    }

    fn register(&mut self, preset: VoicePreset) {
        if self.by_name.contains_key(&preset.name) {
            debug!(target = "voice_catalog", name = %preset.name, "Duplicate preset name ignored");
            return;
        }
        let idx = self.presets.len();
        self.by_name.insert(preset.name.clone(), idx);
        self.index
            .entry(preset.language)
            .or_default()
            .push(preset.gender, preset.name.clone());

        for alias in preset.aliases() {
            if let Some(prev) = self.aliases.insert(alias.to_string(), idx) {
                debug!(
                    target = "voice_catalog",
                    alias = %alias,
                    previous = %self.presets[prev].name,
                    current = %preset.name,
                    "Alias collision; last registered wins"
                );
            }
        }
        self.presets.push(preset);
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// Canonical names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.iter().map(|p| p.name.as_str())
    }

    /// First registered preset; the fallback when a requested voice is unknown.
    pub fn first(&self) -> Option<&VoicePreset> {
        self.presets.first()
    }

    pub fn resolve(&self, query: &str) -> Option<&VoicePreset> {
        if let Some(&idx) = self.by_name.get(query).or_else(|| self.aliases.get(query)) {
            return Some(&self.presets[idx]);
        }

        let wanted = query.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        self.presets.iter().find(|p| {
            let name = p.name.to_lowercase();
            name.contains(&wanted) || wanted.contains(&name)
        })
    }

    pub fn list(&self) -> &VoiceListing {
        &self.index
    }

    /// Uniform pick among presets of `language` (unknown or absent → english).
    /// `gender = None` draws from male then female lists combined.
    pub fn random_of(&self, language: &str, gender: Option<Gender>) -> Option<&VoicePreset> {
        self.random_of_with(language, gender, &mut rand::thread_rng())
    }

    pub fn random_of_with<R: Rng + ?Sized>(
        &self,
        language: &str,
        gender: Option<Gender>,
        rng: &mut R,
    ) -> Option<&VoicePreset> {
        let pool = self.pool(language, gender);
        let name = pool.choose(rng)?;
        self.by_name.get(name.as_str()).map(|&idx| &self.presets[idx])
    }

    fn pool(&self, language: &str, gender: Option<Gender>) -> Vec<&String> {
        let buckets = language
            .parse::<Language>()
            .ok()
            .and_then(|lang| self.index.get(&lang))
            .or_else(|| self.index.get(&Language::English));
        let Some(buckets) = buckets else {
            return Vec::new();
        };
        match gender {
            None => buckets.male.iter().chain(buckets.female.iter()).collect(),
            Some(g) => buckets.get(g).iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(names: &[&str]) -> VoiceCatalog {
        VoiceCatalog::from_presets(
            names
                .iter()
                .map(|n| VoicePreset::new(*n, format!("/voices/{n}.pt"))),
        )
    }

    #[test]
    fn exact_and_alias_lookup() {
        let c = catalog(&["en-Carter_man", "en-Emma_woman"]);
        assert_eq!(c.resolve("en-Emma_woman").unwrap().name, "en-Emma_woman");
        assert_eq!(c.resolve("Emma").unwrap().name, "en-Emma_woman");
        assert_eq!(c.resolve("en-Emma").unwrap().name, "en-Emma_woman");
        assert_eq!(c.resolve("Emma_woman").unwrap().name, "en-Emma_woman");
        assert_eq!(c.resolve("emma").unwrap().name, "en-Emma_woman");
    }

    #[test]
    fn canonical_name_wins_over_colliding_alias() {
        // Alias of `de-Carter` is `Carter`, which is also a canonical name.
        let c = catalog(&["Carter", "de-Carter"]);
        assert_eq!(c.resolve("Carter").unwrap().name, "Carter");
        assert_eq!(c.resolve("de-Carter").unwrap().name, "de-Carter");
    }

    #[test]
    fn alias_collision_last_registered_wins() {
        let c = catalog(&["en-Alex_man", "fr-Alex_man"]);
        assert_eq!(c.resolve("Alex").unwrap().name, "fr-Alex_man");
    }

    #[test]
    fn fuzzy_scan_is_two_way_and_ordered() {
        let c = catalog(&["en-Frank_man", "en-Frankie_man"]);
        // query contained in name: first registered wins
        assert_eq!(c.resolve("fran").unwrap().name, "en-Frank_man");
        // name contained in query
        assert_eq!(
            c.resolve("please use EN-FRANK_MAN voice").unwrap().name,
            "en-Frank_man"
        );
        assert!(c.resolve("zzz").is_none());
        assert!(c.resolve("  ").is_none());
    }

    #[test]
    fn listing_groups_by_language_and_gender() {
        let c = catalog(&["en-Carter_man", "en-Emma_woman", "es-Mujer1", "zz-Unknown"]);
        let list = c.list();
        assert_eq!(list[&Language::English].male, vec!["en-Carter_man"]);
        assert_eq!(list[&Language::English].female, vec!["en-Emma_woman"]);
        assert_eq!(list[&Language::Spanish].male, vec!["es-Mujer1"]);
        assert_eq!(list[&Language::Other].male, vec!["zz-Unknown"]);
    }

    #[test]
    fn random_of_falls_back_to_english() {
        let c = catalog(&["en-Carter_man", "fr-Marie_woman"]);
        let picked = c.random_of("klingon", None).unwrap();
        assert_eq!(picked.name, "en-Carter_man");
        // german is a known language but absent from the catalog
        assert_eq!(c.random_of("german", None).unwrap().name, "en-Carter_man");
    }

    #[test]
    fn random_of_respects_gender_pool() {
        let c = catalog(&["en-Carter_man", "fr-Marie_woman"]);
        assert_eq!(
            c.random_of("french", Some(Gender::Female)).unwrap().name,
            "fr-Marie_woman"
        );
        assert!(c.random_of("french", Some(Gender::Male)).is_none());
        assert!(VoiceCatalog::empty().random_of("english", None).is_none());
    }

    #[test]
    fn random_any_draws_from_both_genders() {
        let c = catalog(&["en-Carter_man", "en-Emma_woman"]);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(c.random_of("english", None).unwrap().name.clone());
        }
        assert_eq!(seen.len(), 2);
    }
}
