use std::path::PathBuf;

use super::resolver::AssetResolver;
use super::{AssemblyPlan, AssetCategory, AssetRef, PlanTier, Segment, StillSequence, StillsRole, Timing};
use crate::config::{SeparatorSettings, Settings};
use crate::error::{IslError, IslResult};

/// Trim and uppercase request text
pub fn normalize(text: &str) -> String {
    text.trim().to_uppercase()
}

/// Turns text into an assembly plan by trying whole-sentence clips, then
/// per-word clips, then per-word letter and digit spelling.
#[derive(Debug, Clone)]
pub struct CascadeEngine {
    resolver: AssetResolver,
    spelling: Timing,
    separator: SeparatorSettings,
}

impl CascadeEngine {
    pub fn new(resolver: AssetResolver, spelling: Timing, separator: SeparatorSettings) -> Self {
        Self {
            resolver,
            spelling,
            separator,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            AssetResolver::from_settings(settings),
            settings.spelling,
            settings.separator,
        )
    }

    pub fn build_plan(&self, text: &str) -> IslResult<AssemblyPlan> {
        let text = normalize(text);
        if text.is_empty() {
            return Err(IslError::EmptyInput);
        }

        if let Some(path) = self.resolver.resolve(AssetCategory::Sentence, &text) {
            tracing::debug!(text = %text, path = %path.display(), "sentence clip found");
            let segment = Segment::Asset(AssetRef {
                category: AssetCategory::Sentence,
                key: text.clone(),
                path,
            });
            return Ok(AssemblyPlan {
                text,
                tier: PlanTier::Sentence,
                segments: vec![segment],
            });
        }

        let words: Vec<&str> = text.split_whitespace().collect();
        let blank = self.resolver.blank();
        let mut segments = Vec::new();

        for (index, word) in words.iter().enumerate() {
            if let Some(segment) = self.word_segment(word, blank.as_ref()) {
                segments.push(segment);
            }

            let last = index + 1 == words.len();
            if let (false, Some(blank)) = (last, &blank) {
                segments.push(Segment::Stills(StillSequence {
                    role: StillsRole::Separator,
                    images: vec![blank.clone(); self.separator.images],
                    timing: self.separator.timing,
                }));
            }
        }

        // Only separators means no word produced anything.
        let has_content = segments.iter().any(|s| {
            !matches!(
                s,
                Segment::Stills(StillSequence {
                    role: StillsRole::Separator,
                    ..
                })
            )
        });
        if !has_content {
            return Err(IslError::NoContent { text });
        }

        tracing::debug!(text = %text, segments = segments.len(), "word plan built");
        Ok(AssemblyPlan {
            text,
            tier: PlanTier::Word,
            segments,
        })
    }

    fn word_segment(&self, word: &str, blank: Option<&PathBuf>) -> Option<Segment> {
        if let Some(path) = self.resolver.resolve(AssetCategory::Word, word) {
            tracing::debug!(word, path = %path.display(), "word clip found");
            return Some(Segment::Asset(AssetRef {
                category: AssetCategory::Word,
                key: word.to_string(),
                path,
            }));
        }

        let images = self.spell(word, blank);
        if images.is_empty() {
            tracing::debug!(word, "nothing to spell");
            return None;
        }

        tracing::debug!(word, images = images.len(), "spelling word");
        Some(Segment::Stills(StillSequence {
            role: StillsRole::Spelling {
                word: word.to_string(),
            },
            images,
            timing: self.spelling,
        }))
    }

    /// Letter/digit images for `word`, with the blank image between characters.
    fn spell(&self, word: &str, blank: Option<&PathBuf>) -> Vec<PathBuf> {
        let mut images = Vec::new();

        for c in word.chars() {
            // Letter numbers such as roman numerals are neither letters nor digits.
            let category = if c.is_alphabetic() && !c.is_numeric() {
                AssetCategory::Letter
            } else if c.is_ascii_digit() {
                AssetCategory::Digit
            } else {
                continue;
            };

            let Some(path) = self.resolver.resolve(category, &c.to_string()) else {
                continue;
            };
            if let (false, Some(blank)) = (images.is_empty(), blank) {
                images.push(blank.clone());
            }
            images.push(path);
        }

        images
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssetTable;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn full_store() -> TempDir {
        let dir = TempDir::new().unwrap();
        for c in ALPHABET.chars() {
            touch(dir.path(), &format!("Letters/{c}.jpg"));
        }
        for d in 0..10 {
            touch(dir.path(), &format!("Numbers/{d}.jpg"));
        }
        touch(dir.path(), "Letters/blank.jpg");
        touch(dir.path(), "Numbers/blank.jpg");
        dir
    }

    fn engine(root: &Path) -> CascadeEngine {
        let defaults = Settings::default();
        CascadeEngine::new(
            AssetResolver::new(root, AssetTable::default()),
            defaults.spelling,
            defaults.separator,
        )
    }

    fn stills(segment: &Segment) -> &StillSequence {
        match segment {
            Segment::Stills(s) => s,
            other => panic!("expected stills, got {other:?}"),
        }
    }

    #[test]
    fn test_sentence_tier_wins() {
        let dir = full_store();
        touch(dir.path(), "Sentence_folder/GOOD MORNING.mp4");
        touch(dir.path(), "Words_folder/GOOD.mp4");
        touch(dir.path(), "Words_folder/MORNING.mp4");

        let plan = engine(dir.path()).build_plan("  good morning ").unwrap();
        assert_eq!(plan.tier, PlanTier::Sentence);
        assert_eq!(plan.text, "GOOD MORNING");
        assert_eq!(
            plan.segments,
            vec![Segment::Asset(AssetRef {
                category: AssetCategory::Sentence,
                key: "GOOD MORNING".into(),
                path: dir.path().join("Sentence_folder/GOOD MORNING.mp4"),
            })]
        );
    }

    #[test]
    fn test_words_with_separators() {
        let dir = full_store();
        for w in ["I", "LIKE", "TEA"] {
            touch(dir.path(), &format!("Words_folder/{w}.mp4"));
        }

        let plan = engine(dir.path()).build_plan("i like tea").unwrap();
        assert_eq!(plan.tier, PlanTier::Word);
        assert_eq!(plan.segments.len(), 5);

        for (i, segment) in plan.segments.iter().enumerate() {
            if i % 2 == 0 {
                assert!(matches!(segment, Segment::Asset(a) if a.category == AssetCategory::Word));
            } else {
                let sep = stills(segment);
                assert_eq!(sep.role, StillsRole::Separator);
                assert_eq!(sep.images.len(), 2);
                assert_eq!(sep.timing, Timing::new(5, 0.4));
            }
        }
    }

    #[test]
    fn test_spelled_word_image_count() {
        let dir = full_store();
        let plan = engine(dir.path()).build_plan("ab12").unwrap();

        assert_eq!(plan.segments.len(), 1);
        let spelled = stills(&plan.segments[0]);
        assert_eq!(
            spelled.role,
            StillsRole::Spelling {
                word: "AB12".into()
            }
        );
        assert_eq!(spelled.timing, Timing::new(5, 0.8));
        assert_eq!(spelled.images.len(), 4 + 3);

        let blank = dir.path().join("Letters/blank.jpg");
        assert_eq!(spelled.images[0], dir.path().join("Letters/A.jpg"));
        assert_eq!(spelled.images[1], blank);
        assert_eq!(spelled.images[4], blank);
        assert_eq!(spelled.images[6], dir.path().join("Numbers/2.jpg"));
    }

    #[test]
    fn test_symbols_are_skipped_inside_words() {
        let dir = full_store();
        let plan = engine(dir.path()).build_plan("a-b").unwrap();
        let spelled = stills(&plan.segments[0]);
        assert_eq!(spelled.images.len(), 3);
    }

    #[test]
    fn test_symbol_only_word_contributes_nothing() {
        let dir = full_store();
        touch(dir.path(), "Words_folder/HI.mp4");

        let plan = engine(dir.path()).build_plan("hi !!").unwrap();
        // word, separator; "!!" adds no segment of its own
        assert_eq!(plan.segments.len(), 2);
        assert!(matches!(&plan.segments[0], Segment::Asset(_)));
        assert_eq!(stills(&plan.segments[1]).role, StillsRole::Separator);
    }

    #[test]
    fn test_mixed_word_and_spelling() {
        let dir = full_store();
        touch(dir.path(), "Words_folder/HELLO.mp4");

        let plan = engine(dir.path()).build_plan("hello raj").unwrap();
        assert_eq!(plan.segments.len(), 3);
        assert!(matches!(&plan.segments[0], Segment::Asset(_)));
        assert_eq!(stills(&plan.segments[1]).role, StillsRole::Separator);
        assert_eq!(stills(&plan.segments[2]).images.len(), 5);
    }

    #[test]
    fn test_no_separator_without_blank() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "Words_folder/YES.mp4");
        touch(dir.path(), "Words_folder/NO.mp4");

        let plan = engine(dir.path()).build_plan("yes no").unwrap();
        assert_eq!(plan.segments.len(), 2);
        assert!(plan.segments.iter().all(|s| matches!(s, Segment::Asset(_))));
    }

    #[test]
    fn test_empty_input() {
        let dir = full_store();
        assert!(matches!(
            engine(dir.path()).build_plan("   \t\n"),
            Err(IslError::EmptyInput)
        ));
        assert!(matches!(engine(dir.path()).build_plan(""), Err(IslError::EmptyInput)));
    }

    #[test]
    fn test_punctuation_only_has_no_content() {
        let dir = full_store();
        let err = engine(dir.path()).build_plan("?! ... ,").unwrap_err();
        assert!(matches!(err, IslError::NoContent { ref text } if text == "?! ... ,"));
    }

    #[test]
    fn test_only_ascii_digits_are_spelled() {
        let dir = full_store();
        let engine = engine(dir.path());

        let err = engine.build_plan("½ Ⅻ").unwrap_err();
        assert!(matches!(err, IslError::NoContent { .. }));

        let plan = engine.build_plan("7½").unwrap();
        assert_eq!(plan.segments.len(), 1);
        assert_eq!(stills(&plan.segments[0]).images, vec![dir.path().join("Numbers/7.jpg")]);
    }

    #[test]
    fn test_empty_store_has_no_content() {
        let dir = TempDir::new().unwrap();
        let err = engine(dir.path()).build_plan("hello").unwrap_err();
        assert!(matches!(err, IslError::NoContent { .. }));
    }

    #[test]
    fn test_build_plan_is_idempotent() {
        let dir = full_store();
        touch(dir.path(), "Words_folder/THANK.mp4");
        let engine = engine(dir.path());

        let first = engine.build_plan("thank you 2").unwrap();
        let second = engine.build_plan("thank you 2").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Hello World \n"), "HELLO WORLD");
        assert_eq!(normalize(" \t "), "");
    }
}
