pub mod concat;
pub mod media;
pub mod plan;
pub mod publish;
pub mod resolver;
pub mod synth;
pub mod translator;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Kind of sign asset a lookup key refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    Sentence,
    Word,
    Letter,
    Digit,
    Blank,
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetCategory::Sentence => "sentence",
            AssetCategory::Word => "word",
            AssetCategory::Letter => "letter",
            AssetCategory::Digit => "digit",
            AssetCategory::Blank => "blank",
        };
        f.write_str(name)
    }
}

/// Frame rate and per-image hold of a still-image clip
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub fps: u32,
    pub seconds_per_image: f64,
}

impl Timing {
    pub const fn new(fps: u32, seconds_per_image: f64) -> Self {
        Self {
            fps,
            seconds_per_image,
        }
    }

    /// Number of output frames each image is held for, at least one.
    pub fn frames_per_image(&self) -> usize {
        (f64::from(self.fps) * self.seconds_per_image).round().max(1.0) as usize
    }
}

/// What stays constant when clips with other frame rates are re-encoded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pacing {
    /// Source frames are repeated or dropped so playback time is unchanged.
    #[default]
    PreserveDuration,
    /// Every source frame is written exactly once.
    PreserveFrameCount,
}

/// Read-only media file with its decoded properties
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaAsset {
    Image {
        path: PathBuf,
        width: u32,
        height: u32,
    },
    Video {
        path: PathBuf,
        width: u32,
        height: u32,
        fps: f64,
        frames: u64,
    },
}

/// Existing asset located by the resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetRef {
    pub category: AssetCategory,
    pub key: String,
    pub path: PathBuf,
}

/// Why a still sequence exists in the plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum StillsRole {
    /// Letter-by-letter spelling of a word without its own clip.
    Spelling { word: String },
    /// Pause between two words.
    Separator,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StillSequence {
    #[serde(flatten)]
    pub role: StillsRole,
    pub images: Vec<PathBuf>,
    pub timing: Timing,
}

/// One unit of an assembly plan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Asset(AssetRef),
    Stills(StillSequence),
}

/// Tier that produced a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Sentence,
    Word,
}

/// Ordered, non-empty list of segments for one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssemblyPlan {
    /// Normalized input text.
    pub text: String,
    pub tier: PlanTier,
    pub segments: Vec<Segment>,
}

/// Input that was skipped while producing a clip
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAsset {
    pub path: PathBuf,
    pub reason: String,
}

impl SkippedAsset {
    pub fn new(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Summary of a synthesized or concatenated clip
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClipReport {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub frames: u64,
    pub skipped: Vec<SkippedAsset>,
}
