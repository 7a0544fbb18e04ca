use std::path::PathBuf;

use super::AssetCategory;
use crate::config::{AssetTable, CategoryDir, Settings};

/// Looks up sign assets by category and key in a directory-backed store.
///
/// Lookups only check for file existence. A miss is `None`, never an error.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    root: PathBuf,
    table: AssetTable,
}

impl AssetResolver {
    pub fn new(root: impl Into<PathBuf>, table: AssetTable) -> Self {
        Self {
            root: root.into(),
            table,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.assets_root, settings.assets.clone())
    }

    /// Path of the asset for `key`, or the category's blank placeholder for a
    /// letter/digit miss.
    pub fn resolve(&self, category: AssetCategory, key: &str) -> Option<PathBuf> {
        let Some(entry) = self.table.category(category) else {
            return self.blank();
        };

        let single_char = matches!(category, AssetCategory::Letter | AssetCategory::Digit);
        if single_char && key.chars().count() != 1 {
            return None;
        }
        if !is_safe_key(key) {
            return None;
        }

        let hit = self.candidate(entry, key);
        if hit.is_file() {
            return Some(hit);
        }

        if single_char {
            return self.placeholder(entry);
        }
        None
    }

    /// Inter-word / inter-letter separator image.
    pub fn blank(&self) -> Option<PathBuf> {
        let path = self.root.join(&self.table.separator);
        path.is_file().then_some(path)
    }

    fn candidate(&self, entry: &CategoryDir, key: &str) -> PathBuf {
        let stem = entry.key_case.apply(key);
        self.root
            .join(&entry.dir)
            .join(format!("{stem}.{}", entry.extension))
    }

    fn placeholder(&self, entry: &CategoryDir) -> Option<PathBuf> {
        let path = self.root.join(&entry.dir).join(entry.blank.as_deref()?);
        path.is_file().then_some(path)
    }
}

// Keys become file stems and must stay inside their category directory.
fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && key != "."
        && key != ".."
        && !key.contains(['/', '\\', '\0'])
}
