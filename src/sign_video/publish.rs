use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use uuid::Uuid;

use super::concat::concatenate_to_file;
use super::synth::synthesize_to_file;
use super::{AssemblyPlan, Pacing, Segment, SkippedAsset};
use crate::config::Settings;
use crate::error::{IslError, IslResult};

/// A written artifact and the inputs skipped while producing it
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub path: PathBuf,
    pub skipped: Vec<SkippedAsset>,
}

/// Realizes assembly plans as uniquely named MP4 files.
#[derive(Debug, Clone)]
pub struct Publisher {
    output_dir: PathBuf,
    output_fps: u32,
    pacing: Pacing,
}

impl Publisher {
    pub fn new(output_dir: impl Into<PathBuf>, output_fps: u32, pacing: Pacing) -> Self {
        Self {
            output_dir: output_dir.into(),
            output_fps,
            pacing,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.output_dir, settings.output_fps, settings.pacing)
    }

    /// Write `plan` to `<output_dir>/isl_<uuid>.mp4`.
    ///
    /// Intermediate clips live in a scratch directory removed before
    /// returning, and a partially written artifact is deleted on failure.
    pub fn publish(&self, plan: &AssemblyPlan) -> IslResult<Published> {
        fs::create_dir_all(&self.output_dir).map_err(|e| IslError::output(&self.output_dir, e))?;

        let output = self
            .output_dir
            .join(format!("isl_{}.mp4", Uuid::new_v4().simple()));

        match self.realize(plan, &output) {
            Ok(skipped) => {
                tracing::info!(
                    text = %plan.text,
                    path = %output.display(),
                    segments = plan.segments.len(),
                    skipped = skipped.len(),
                    "published sign video"
                );
                Ok(Published {
                    path: output,
                    skipped,
                })
            }
            Err(e) => {
                if output.exists() {
                    if let Err(rm) = fs::remove_file(&output) {
                        tracing::warn!(path = %output.display(), error = %rm, "failed to remove partial output");
                    }
                }
                tracing::error!(text = %plan.text, error = %e, "publication failed");
                Err(e)
            }
        }
    }

    fn realize(&self, plan: &AssemblyPlan, output: &Path) -> IslResult<Vec<SkippedAsset>> {
        match plan.segments.as_slice() {
            [] => Err(IslError::NoContent {
                text: plan.text.clone(),
            }),
            [Segment::Asset(asset)] => {
                if !asset.path.is_file() {
                    return Err(IslError::unreadable(&asset.path, "file not found"));
                }
                fs::copy(&asset.path, output).map_err(|e| IslError::output(output, e))?;
                Ok(Vec::new())
            }
            [Segment::Stills(stills)] => {
                synthesize_to_file(&stills.images, stills.timing, output).map(|r| r.skipped)
            }
            segments => self.realize_many(segments, output),
        }
    }

    fn realize_many(&self, segments: &[Segment], output: &Path) -> IslResult<Vec<SkippedAsset>> {
        let scratch = tempfile::Builder::new()
            .prefix(".isl-segments-")
            .tempdir_in(&self.output_dir)
            .map_err(|e| IslError::output(&self.output_dir, e))?;

        let mut clips = Vec::with_capacity(segments.len());
        let mut skipped = Vec::new();

        for (index, segment) in segments.iter().enumerate() {
            match segment {
                Segment::Asset(asset) => clips.push(asset.path.clone()),
                Segment::Stills(stills) => {
                    let clip = scratch.path().join(format!("segment_{index:03}.mp4"));
                    match synthesize_to_file(&stills.images, stills.timing, &clip) {
                        Ok(report) => {
                            skipped.extend(report.skipped);
                            clips.push(clip);
                        }
                        Err(IslError::UnreadableAsset { path, reason }) => {
                            tracing::warn!(path = %path.display(), %reason, "dropping segment");
                            skipped.push(SkippedAsset { path, reason });
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        let report = concatenate_to_file(&clips, self.output_fps, self.pacing, output)?;
        skipped.extend(report.skipped);
        Ok(skipped)
    }
}

/// Latest published artifact per session, plus the latest overall.
///
/// The overall entry is last-writer-wins across sessions.
#[derive(Debug, Default)]
pub struct PublicationRegistry {
    by_session: RwLock<HashMap<String, PathBuf>>,
    latest: RwLock<Option<PathBuf>>,
}

impl PublicationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `path` as the latest artifact. Only named sessions get a
    /// per-session entry; anonymous requests update the overall latest.
    pub fn record(&self, session: Option<&str>, path: &Path) {
        if let Some(session) = session {
            // A poisoned lock only means another writer panicked mid-insert.
            let mut sessions = self.by_session.write().unwrap_or_else(|e| e.into_inner());
            sessions.insert(session.to_string(), path.to_path_buf());
        }

        let mut latest = self.latest.write().unwrap_or_else(|e| e.into_inner());
        *latest = Some(path.to_path_buf());
    }

    pub fn latest_for(&self, session: &str) -> Option<PathBuf> {
        self.by_session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(session)
            .cloned()
    }

    pub fn latest(&self) -> Option<PathBuf> {
        self.latest
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of sessions with a recorded artifact.
    pub fn session_count(&self) -> usize {
        self.by_session.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign_video::media::{self, FrameSink, Mp4Writer};
    use crate::sign_video::{AssetCategory, AssetRef, PlanTier, StillSequence, StillsRole, Timing};
    use image::{Rgb, RgbImage};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn jpg(dir: &Path, name: &str, color: [u8; 3]) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(40, 30, Rgb(color)).save(&path).unwrap();
        path
    }

    fn clip(dir: &Path, name: &str, frames: u8) -> PathBuf {
        let path = dir.join(name);
        let mut writer = Mp4Writer::create(&path, 25);
        for i in 0..frames {
            writer
                .write_frame(&RgbImage::from_pixel(64, 48, Rgb([i, i, i])))
                .unwrap();
        }
        writer.finish().unwrap();
        path
    }

    fn plan(segments: Vec<Segment>) -> AssemblyPlan {
        AssemblyPlan {
            text: "TEST".into(),
            tier: PlanTier::Word,
            segments,
        }
    }

    fn asset(path: PathBuf) -> Segment {
        Segment::Asset(AssetRef {
            category: AssetCategory::Word,
            key: "TEST".into(),
            path,
        })
    }

    fn stills(images: Vec<PathBuf>) -> Segment {
        Segment::Stills(StillSequence {
            role: StillsRole::Spelling {
                word: "TEST".into(),
            },
            images,
            timing: Timing::new(5, 0.8),
        })
    }

    fn entries(dir: &Path) -> Vec<PathBuf> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_single_asset_is_copied() {
        let assets = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let source = clip(assets.path(), "HELLO.mp4", 3);

        let publisher = Publisher::new(out.path(), 25, Pacing::default());
        let published = publisher.publish(&plan(vec![asset(source.clone())])).unwrap();

        assert_eq!(fs::read(&published.path).unwrap(), fs::read(&source).unwrap());
        let name = published.path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("isl_") && name.ends_with(".mp4"));
    }

    #[test]
    fn test_single_stills_segment_is_encoded() {
        let assets = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let a = jpg(assets.path(), "A.jpg", [255, 0, 0]);

        let publisher = Publisher::new(out.path(), 25, Pacing::default());
        let published = publisher.publish(&plan(vec![stills(vec![a])])).unwrap();

        let info = media::probe_video(&published.path).unwrap();
        assert_eq!((info.width, info.height), (40, 30));
        assert_eq!(entries(out.path()), vec![published.path]);
    }

    #[test]
    fn test_multiple_segments_concatenate_and_clean_up() {
        let assets = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let word = clip(assets.path(), "HELLO.mp4", 5);
        let a = jpg(assets.path(), "A.jpg", [255, 0, 0]);
        let blank = jpg(assets.path(), "blank.jpg", [255, 255, 255]);

        let publisher = Publisher::new(out.path(), 25, Pacing::PreserveDuration);
        let published = publisher
            .publish(&plan(vec![
                asset(word),
                stills(vec![blank.clone(), blank]),
                stills(vec![a]),
            ]))
            .unwrap();

        let info = media::probe_video(&published.path).unwrap();
        assert_eq!((info.width, info.height), (64, 48));
        // scratch clips are gone, only the artifact remains
        assert_eq!(entries(out.path()), vec![published.path]);
    }

    #[test]
    fn test_unreadable_segment_is_skipped_not_fatal() {
        let assets = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let word = clip(assets.path(), "HELLO.mp4", 2);
        let broken = assets.path().join("B.jpg");
        fs::write(&broken, b"nope").unwrap();

        let publisher = Publisher::new(out.path(), 25, Pacing::default());
        let published = publisher
            .publish(&plan(vec![asset(word), stills(vec![broken.clone()])]))
            .unwrap();

        assert!(published.path.is_file());
        assert_eq!(published.skipped.len(), 1);
        assert_eq!(published.skipped[0].path, broken);
    }

    #[test]
    fn test_failure_leaves_no_files() {
        let assets = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let broken = assets.path().join("A.jpg");
        fs::write(&broken, b"nope").unwrap();

        let publisher = Publisher::new(out.path(), 25, Pacing::default());
        let err = publisher
            .publish(&plan(vec![
                stills(vec![broken.clone()]),
                stills(vec![broken]),
            ]))
            .unwrap_err();

        assert!(matches!(err, IslError::NoVideos));
        assert!(entries(out.path()).is_empty());
    }

    #[test]
    fn test_missing_sentence_asset() {
        let out = TempDir::new().unwrap();
        let publisher = Publisher::new(out.path(), 25, Pacing::default());
        let err = publisher
            .publish(&plan(vec![asset(out.path().join("gone.mp4"))]))
            .unwrap_err();
        assert!(matches!(err, IslError::UnreadableAsset { .. }));
        assert!(entries(out.path()).is_empty());
    }

    #[test]
    fn test_unique_output_names() {
        let assets = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let source = clip(assets.path(), "HI.mp4", 1);
        let publisher = Publisher::new(out.path(), 25, Pacing::default());
        let the_plan = plan(vec![asset(source)]);

        let first = publisher.publish(&the_plan).unwrap();
        let second = publisher.publish(&the_plan).unwrap();
        assert_ne!(first.path, second.path);
    }

    #[test]
    fn test_registry_tracks_sessions() {
        let registry = Arc::new(PublicationRegistry::new());
        assert_eq!(registry.latest(), None);

        registry.record(Some("alice"), Path::new("/out/1.mp4"));
        registry.record(Some("bob"), Path::new("/out/2.mp4"));
        registry.record(Some("alice"), Path::new("/out/3.mp4"));

        assert_eq!(registry.latest_for("alice"), Some(PathBuf::from("/out/3.mp4")));
        assert_eq!(registry.latest_for("bob"), Some(PathBuf::from("/out/2.mp4")));
        assert_eq!(registry.latest_for("carol"), None);
        assert_eq!(registry.latest(), Some(PathBuf::from("/out/3.mp4")));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry.record(Some(&format!("s{i}")), Path::new(&format!("/out/t{i}.mp4")));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        for i in 0..4 {
            assert!(registry.latest_for(&format!("s{i}")).is_some());
        }
    }

    #[test]
    fn test_anonymous_records_only_update_latest() {
        let registry = PublicationRegistry::new();
        registry.record(Some("alice"), Path::new("/out/1.mp4"));

        for i in 0..50 {
            registry.record(None, Path::new(&format!("/out/anon{i}.mp4")));
        }

        assert_eq!(registry.session_count(), 1);
        assert_eq!(registry.latest_for("alice"), Some(PathBuf::from("/out/1.mp4")));
        assert_eq!(registry.latest(), Some(PathBuf::from("/out/anon49.mp4")));
    }
}
