use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Language inferred from a preset name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Spanish,
    French,
    German,
    Italian,
    Portuguese,
    Japanese,
    Korean,
    Dutch,
    Polish,
    Hindi,
    Other,
}

/// Checked in order; the first matching prefix wins.
const LANGUAGE_PREFIXES: &[(&str, Language)] = &[
    ("en-", Language::English),
    ("es-", Language::Spanish),
    ("sp-", Language::Spanish),
    ("fr-", Language::French),
    ("de-", Language::German),
    ("it-", Language::Italian),
    ("pt-", Language::Portuguese),
    ("jp-", Language::Japanese),
    ("kr-", Language::Korean),
    ("nl-", Language::Dutch),
    ("pl-", Language::Polish),
    ("in-", Language::Hindi),
];

impl Language {
    pub const ALL: [Language; 12] = [
        Language::English,
        Language::Spanish,
        Language::French,
        Language::German,
        Language::Italian,
        Language::Portuguese,
        Language::Japanese,
        Language::Korean,
        Language::Dutch,
        Language::Polish,
        Language::Hindi,
        Language::Other,
    ];

    /// Infer from a canonical preset name. Prefix match is case-sensitive.
    pub fn infer(name: &str) -> Self {
        LANGUAGE_PREFIXES
            .iter()
            .find(|(prefix, _)| name.starts_with(prefix))
            .map(|(_, lang)| *lang)
            .unwrap_or(Language::Other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Spanish => "spanish",
            Language::French => "french",
            Language::German => "german",
            Language::Italian => "italian",
            Language::Portuguese => "portuguese",
            Language::Japanese => "japanese",
            Language::Korean => "korean",
            Language::Dutch => "dutch",
            Language::Polish => "polish",
            Language::Hindi => "hindi",
            Language::Other => "other",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Language::ALL
            .iter()
            .find(|l| l.as_str() == wanted)
            .copied()
            .ok_or_else(|| format!("unknown language '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// `female` iff the name contains `woman` (any case); everything else is `male`.
    pub fn infer(name: &str) -> Self {
        if name.to_lowercase().contains("woman") {
            Gender::Female
        } else {
            Gender::Male
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(format!("unknown gender '{other}'")),
        }
    }
}

/// Names of one language, split by gender, each list in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenderBuckets {
    pub male: Vec<String>,
    pub female: Vec<String>,
}

impl GenderBuckets {
    pub fn get(&self, gender: Gender) -> &[String] {
        match gender {
            Gender::Male => &self.male,
            Gender::Female => &self.female,
        }
    }

    pub(crate) fn push(&mut self, gender: Gender, name: String) {
        match gender {
            Gender::Male => self.male.push(name),
            Gender::Female => self.female.push(name),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.male.is_empty() && self.female.is_empty()
    }
}

/// A pre-computed voice embedding stored as one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoicePreset {
    pub name: String,
    pub path: PathBuf,
    pub language: Language,
    pub gender: Gender,
}

impl VoicePreset {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            language: Language::infer(&name),
            gender: Gender::infer(&name),
            name,
            path: path.into(),
        }
    }

    /// Build from a file path when its extension matches `extension`.
    pub fn from_file(path: &Path, extension: &str) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext != extension {
            return None;
        }
        let name = path.file_stem()?.to_str()?;
        if name.is_empty() {
            return None;
        }
        Some(Self::new(name, path))
    }

    /// Short lookup aliases, in registration order:
    /// - the part before the first `_` (`en-Emma_woman` → `en-Emma`)
    /// - the part after the last `-` (`en-Emma_woman` → `Emma_woman`)
    /// - both applied in turn (`en-Emma_woman` → `Emma`)
    pub fn aliases(&self) -> Vec<&str> {
        let name = self.name.as_str();
        let head = name.split_once('_').map(|(h, _)| h);
        let tail = name.rsplit_once('-').map(|(_, t)| t);
        let short = head
            .unwrap_or(name)
            .rsplit_once('-')
            .map(|(_, t)| t)
            .or(head);

        let mut out: Vec<&str> = Vec::with_capacity(3);
        for alias in [head, tail, short].into_iter().flatten() {
            if !alias.is_empty() && alias != name && !out.contains(&alias) {
                out.push(alias);
            }
        }
        out
    }
}
