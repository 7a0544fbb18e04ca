use std::path::{Path, PathBuf};

use super::media::{self, FrameSink, Mp4Writer, VideoReader, sink_failure};
use super::{ClipReport, Pacing, SkippedAsset};
use crate::error::{IslError, IslResult};

/// Decides how many output frames each decoded source frame becomes.
#[derive(Debug)]
struct Pacer {
    /// Output frames per source frame; `None` writes every frame once.
    ratio: Option<f64>,
    source_frames: u64,
    emitted: u64,
}

impl Pacer {
    fn new(pacing: Pacing, source_fps: f64, output_fps: u32) -> Self {
        let ratio = match pacing {
            Pacing::PreserveDuration if source_fps > 0.0 => Some(f64::from(output_fps) / source_fps),
            _ => None,
        };
        Self {
            ratio,
            source_frames: 0,
            emitted: 0,
        }
    }

    fn repeats(&mut self) -> u64 {
        self.source_frames += 1;
        let Some(ratio) = self.ratio else {
            self.emitted += 1;
            return 1;
        };

        let target = (self.source_frames as f64 * ratio).round() as u64;
        let mut count = target.saturating_sub(self.emitted);
        // every clip shows up at least once
        if self.emitted == 0 && count == 0 {
            count = 1;
        }
        self.emitted += count;
        count
    }
}

/// Decode `video_paths` in order and write all frames to `sink` at one size.
///
/// The first decoded frame fixes the output size. Inputs that are missing or
/// cannot be decoded are skipped and listed in the report.
pub fn concatenate<S: FrameSink + ?Sized>(
    video_paths: &[PathBuf],
    output_fps: u32,
    pacing: Pacing,
    sink: &mut S,
) -> IslResult<ClipReport> {
    let mut canonical: Option<(u32, u32)> = None;
    let mut skipped = Vec::new();
    let mut frames = 0u64;

    for path in video_paths {
        if !path.is_file() {
            tracing::warn!(path = %path.display(), "skipping missing video");
            skipped.push(SkippedAsset::new(path, "file not found"));
            continue;
        }

        let reader = match VideoReader::open(path) {
            Ok(reader) => reader,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable video");
                skipped.push(SkippedAsset::new(path, format!("{e:#}")));
                continue;
            }
        };

        let mut pacer = Pacer::new(pacing, reader.info().fps, output_fps);
        let mut write_error: Option<IslError> = None;
        let mut kept = 0u64;

        let decoded = reader.for_each_frame(|frame| {
            let (width, height) = *canonical.get_or_insert(frame.dimensions());
            let frame = media::fit_to(frame, width, height);
            for _ in 0..pacer.repeats() {
                if let Err(e) = sink.write_frame(&frame) {
                    write_error = Some(sink_failure(sink, e));
                    anyhow::bail!("output write failed");
                }
                frames += 1;
            }
            kept += 1;
            Ok(())
        });

        if let Some(err) = write_error {
            return Err(err);
        }
        match decoded {
            Ok(0) => {
                tracing::warn!(path = %path.display(), "video has no decodable frames");
                skipped.push(SkippedAsset::new(path, "no decodable frames"));
            }
            Ok(count) => {
                tracing::debug!(path = %path.display(), frames = count, "appended video");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), kept, error = %e, "decoding stopped early");
                skipped.push(interrupted(path, kept, &e));
            }
        }
    }

    let Some((width, height)) = canonical else {
        return Err(IslError::NoVideos);
    };

    Ok(ClipReport {
        width,
        height,
        fps: output_fps,
        frames,
        skipped,
    })
}

/// Warning for a clip whose decoding failed after `kept` frames were already written.
fn interrupted(path: &Path, kept: u64, err: &anyhow::Error) -> SkippedAsset {
    if kept == 0 {
        SkippedAsset::new(path, format!("decoding failed: {err:#}"))
    } else {
        SkippedAsset::new(
            path,
            format!("truncated after {kept} frames, decoding stopped: {err:#}"),
        )
    }
}

/// Concatenate straight into an MP4 file at `output`.
pub fn concatenate_to_file(
    video_paths: &[PathBuf],
    output_fps: u32,
    pacing: Pacing,
    output: &Path,
) -> IslResult<ClipReport> {
    let mut writer = Mp4Writer::create(output, output_fps);
    let report = concatenate(video_paths, output_fps, pacing, &mut writer)?;
    writer
        .finish()
        .map_err(|e| IslError::output(output, format!("{e:#}")))?;
    Ok(report)
}
