//! Text-to-speech narration.
//!
//! Synthesis runs through an ordered backend chain so a narrated clip is
//! produced even when every network voice is unavailable.

pub mod backend;
pub mod synthesizer;

use std::path::{Path, PathBuf};

use crate::foundation::error::{SlidecastError, SlidecastResult};

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum VoiceGender {
    #[default]
    Female,
    Male,
    /// No gender preference; each backend routes this to its default voice.
    Neutral,
}

/// Which tier of the synthesis chain a backend belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendTier {
    Premium,
    Free,
    Stub,
}

#[derive(Clone, Debug, Default)]
pub struct VoiceConfig {
    pub gender: VoiceGender,
    /// Backend-specific voice override. When unset, each backend picks a
    /// sensible default for the requested gender.
    pub voice_name: Option<String>,
    /// Skip any backend above this tier. `Premium` allows the full chain.
    pub max_tier: TierPreference,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TierPreference {
    #[default]
    Premium,
    Free,
}

impl TierPreference {
    pub fn allows(self, tier: BackendTier) -> bool {
        match self {
            Self::Premium => true,
            Self::Free => !matches!(tier, BackendTier::Premium),
        }
    }
}

/// A synthesized audio file with a known, strictly positive duration.
#[derive(Clone, Debug)]
pub struct AudioClip {
    path: PathBuf,
    duration_secs: f64,
}

impl AudioClip {
    /// Sole constructor; rejects non-positive or non-finite durations so
    /// downstream timing math never divides by or sums zero-length clips.
    pub fn new(path: PathBuf, duration_secs: f64) -> SlidecastResult<Self> {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(SlidecastError::synthesis(format!(
                "audio clip '{}' has invalid duration {duration_secs}",
                path.display()
            )));
        }
        Ok(Self {
            path,
            duration_secs,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }
}
