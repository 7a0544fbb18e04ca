//! Runtime settings: asset-store layout, output location and timing.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IslError, IslResult};
use crate::sign_video::{AssetCategory, Pacing, Timing};

/// How a lookup key is cased before it becomes a file stem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyCase {
    #[default]
    Upper,
    Lower,
    AsIs,
}

impl KeyCase {
    pub fn apply(self, key: &str) -> String {
        match self {
            KeyCase::Upper => key.to_uppercase(),
            KeyCase::Lower => key.to_lowercase(),
            KeyCase::AsIs => key.to_string(),
        }
    }
}

/// One category's directory, file extension and naming rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDir {
    /// Directory relative to the assets root.
    pub dir: PathBuf,
    pub extension: String,
    #[serde(default)]
    pub key_case: KeyCase,
    /// Placeholder file inside `dir` returned when a key misses.
    #[serde(default)]
    pub blank: Option<String>,
}

impl CategoryDir {
    fn new(dir: &str, extension: &str, blank: Option<&str>) -> Self {
        Self {
            dir: PathBuf::from(dir),
            extension: extension.to_string(),
            key_case: KeyCase::Upper,
            blank: blank.map(str::to_string),
        }
    }
}

/// Category → directory mapping of the asset store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetTable {
    pub sentence: CategoryDir,
    pub word: CategoryDir,
    pub letter: CategoryDir,
    pub digit: CategoryDir,
    /// Separator image, relative to the assets root.
    pub separator: PathBuf,
}

impl Default for AssetTable {
    fn default() -> Self {
        Self {
            sentence: CategoryDir::new("Sentence_folder", "mp4", None),
            word: CategoryDir::new("Words_folder", "mp4", None),
            letter: CategoryDir::new("Letters", "jpg", Some("blank.jpg")),
            digit: CategoryDir::new("Numbers", "jpg", Some("blank.jpg")),
            separator: PathBuf::from("Letters").join("blank.jpg"),
        }
    }
}

impl AssetTable {
    /// Directory entry for a keyed category. `Blank` has none.
    pub fn category(&self, category: AssetCategory) -> Option<&CategoryDir> {
        match category {
            AssetCategory::Sentence => Some(&self.sentence),
            AssetCategory::Word => Some(&self.word),
            AssetCategory::Letter => Some(&self.letter),
            AssetCategory::Digit => Some(&self.digit),
            AssetCategory::Blank => None,
        }
    }
}

/// Timing of the inter-word separator clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparatorSettings {
    pub timing: Timing,
    /// How many blank images the separator clip holds.
    pub images: usize,
}

impl Default for SeparatorSettings {
    fn default() -> Self {
        Self {
            timing: Timing::new(5, 0.4),
            images: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub assets_root: PathBuf,
    pub output_dir: PathBuf,
    /// Frame rate of concatenated output.
    pub output_fps: u32,
    pub pacing: Pacing,
    /// Timing of letter/digit spelling clips.
    pub spelling: Timing,
    pub separator: SeparatorSettings,
    pub assets: AssetTable,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            assets_root: PathBuf::from("Friend_ISL_Project").join("ISL_Dataset"),
            output_dir: PathBuf::from("OUTPUT"),
            output_fps: 25,
            pacing: Pacing::default(),
            spelling: Timing::new(5, 0.8),
            separator: SeparatorSettings::default(),
            assets: AssetTable::default(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file; missing keys keep their defaults.
    pub fn load(path: &Path) -> IslResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| IslError::config(format!("failed to read {}: {e}", path.display())))?;
        let settings: Settings = toml::from_str(&content)
            .map_err(|e| IslError::config(format!("invalid TOML in {}: {e}", path.display())))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply `ISL_ASSETS_DIR` / `ISL_OUTPUT_DIR` overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(dir) = std::env::var("ISL_ASSETS_DIR") {
            self.assets_root = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("ISL_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn validate(&self) -> IslResult<()> {
        if self.output_fps == 0 {
            return Err(IslError::config("output_fps must be non-zero"));
        }
        for (name, timing) in [
            ("spelling", &self.spelling),
            ("separator", &self.separator.timing),
        ] {
            if timing.fps == 0 {
                return Err(IslError::config(format!("{name} fps must be non-zero")));
            }
            if !(timing.seconds_per_image.is_finite() && timing.seconds_per_image > 0.0) {
                return Err(IslError::config(format!(
                    "{name} seconds_per_image must be positive"
                )));
            }
        }
        if self.separator.images == 0 {
            return Err(IslError::config("separator needs at least one image"));
        }
        Ok(())
    }
}
