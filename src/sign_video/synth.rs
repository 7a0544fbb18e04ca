use image::RgbImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::media::{self, FrameSink, Mp4Writer, sink_failure};
use super::{ClipReport, SkippedAsset, Timing};
use crate::error::{IslError, IslResult};

/// Build a clip from still images, holding each for `timing.frames_per_image()` frames.
///
/// The first image sets the output size and must decode. Later images that
/// fail to decode are skipped and listed in the report.
pub fn synthesize<S: FrameSink + ?Sized>(
    image_paths: &[PathBuf],
    timing: Timing,
    sink: &mut S,
) -> IslResult<ClipReport> {
    let Some(first_path) = image_paths.first() else {
        return Err(IslError::NoImages);
    };

    let first = media::load_image(first_path)
        .map_err(|e| IslError::unreadable(first_path, format!("{e:#}")))?;
    let (width, height) = first.dimensions();
    let hold = timing.frames_per_image();

    // The blank image repeats between every letter; decode it once.
    let mut decoded: HashMap<&Path, RgbImage> = HashMap::new();
    decoded.insert(first_path.as_path(), first);

    let mut skipped = Vec::new();
    let mut frames = 0u64;

    for path in image_paths {
        if !decoded.contains_key(path.as_path()) {
            match media::load_image(path) {
                Ok(image) => {
                    decoded.insert(path.as_path(), media::fit_to(image, width, height));
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable image");
                    skipped.push(SkippedAsset::new(path, format!("{e:#}")));
                    continue;
                }
            }
        }
        let image = &decoded[path.as_path()];

        for _ in 0..hold {
            sink.write_frame(image).map_err(|e| sink_failure(sink, e))?;
            frames += 1;
        }
    }

    tracing::debug!(
        images = image_paths.len(),
        frames,
        width,
        height,
        fps = timing.fps,
        "synthesized still sequence"
    );

    Ok(ClipReport {
        width,
        height,
        fps: timing.fps,
        frames,
        skipped,
    })
}

/// Synthesize straight into an MP4 file at `output`.
pub fn synthesize_to_file(
    image_paths: &[PathBuf],
    timing: Timing,
    output: &Path,
) -> IslResult<ClipReport> {
    let mut writer = Mp4Writer::create(output, timing.fps);
    let report = synthesize(image_paths, timing, &mut writer)?;
    writer
        .finish()
        .map_err(|e| IslError::output(output, format!("{e:#}")))?;
    Ok(report)
}
