use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;
use image::RgbImage;
use image::imageops::FilterType;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::MediaAsset;
use crate::error::IslError;

const OUTPUT_BIT_RATE: usize = 4_000_000;

/// Initialize FFmpeg once per process
pub fn init_ffmpeg() -> Result<()> {
    static INIT: OnceLock<Result<(), String>> = OnceLock::new();

    INIT.get_or_init(|| {
        ffmpeg::init().map_err(|e| e.to_string())?;
        ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);
        Ok(())
    })
    .clone()
    .map_err(|e| anyhow::anyhow!("Failed to initialize FFmpeg: {e}"))
}

/// Stream properties of a video file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Average frame rate, 0.0 when the container does not declare one.
    pub fps: f64,
    /// Declared frame count, 0 when unknown.
    pub frames: u64,
}

fn stream_fps(stream: &ffmpeg::format::stream::Stream<'_>) -> f64 {
    for rate in [stream.avg_frame_rate(), stream.rate()] {
        if rate.numerator() > 0 && rate.denominator() > 0 {
            return f64::from(rate);
        }
    }
    0.0
}

pub fn get_image_dimensions<P: AsRef<Path>>(image_path: P) -> Result<(u32, u32)> {
    image::image_dimensions(image_path.as_ref()).context("Failed to read image dimensions")
}

/// Decode an image to RGB
pub fn load_image<P: AsRef<Path>>(image_path: P) -> Result<RgbImage> {
    let img = image::open(image_path.as_ref()).context("Failed to open image")?;
    Ok(img.to_rgb8())
}

/// Resize `img` to exactly `width`x`height`; an image that already fits is returned as is.
pub fn fit_to(img: RgbImage, width: u32, height: u32) -> RgbImage {
    if img.dimensions() == (width, height) {
        return img;
    }
    image::imageops::resize(&img, width, height, FilterType::Triangle)
}

pub fn probe_video<P: AsRef<Path>>(video_path: P) -> Result<VideoInfo> {
    init_ffmpeg()?;
    let input = ffmpeg::format::input(&video_path).context("Failed to open video file")?;

    let video_stream = input
        .streams()
        .best(ffmpeg::media::Type::Video)
        .context("Could not find video stream")?;

    let decoder = ffmpeg::codec::context::Context::from_parameters(video_stream.parameters())
        .context("Failed to create decoder context")?
        .decoder()
        .video()
        .context("Failed to create video decoder")?;

    let fps = stream_fps(&video_stream);
    let mut frames = u64::try_from(video_stream.frames()).unwrap_or(0);
    if frames == 0 && fps > 0.0 && input.duration() > 0 {
        let seconds = input.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE);
        frames = (seconds * fps).round() as u64;
    }

    Ok(VideoInfo {
        width: decoder.width(),
        height: decoder.height(),
        fps,
        frames,
    })
}

/// Describe a media file, treating anything with a known image extension as a still.
pub fn probe<P: AsRef<Path>>(path: P) -> Result<MediaAsset> {
    let path = path.as_ref();
    if image::ImageFormat::from_path(path).is_ok() {
        let (width, height) = get_image_dimensions(path)?;
        return Ok(MediaAsset::Image {
            path: path.to_path_buf(),
            width,
            height,
        });
    }

    let info = probe_video(path)?;
    Ok(MediaAsset::Video {
        path: path.to_path_buf(),
        width: info.width,
        height: info.height,
        fps: info.fps,
        frames: info.frames,
    })
}

/// RGB24 converter that follows the decoder's format and size
struct RgbConverter {
    scaler: ffmpeg::software::scaling::context::Context,
    format: ffmpeg::format::Pixel,
    width: u32,
    height: u32,
}

impl RgbConverter {
    fn convert(
        slot: &mut Option<RgbConverter>,
        frame: &ffmpeg::util::frame::video::Video,
    ) -> Result<RgbImage> {
        let (format, width, height) = (frame.format(), frame.width(), frame.height());
        let stale = slot
            .as_ref()
            .is_none_or(|c| c.format != format || c.width != width || c.height != height);
        if stale {
            let scaler = ffmpeg::software::scaling::context::Context::get(
                format,
                width,
                height,
                ffmpeg::format::Pixel::RGB24,
                width,
                height,
                ffmpeg::software::scaling::flag::Flags::BILINEAR,
            )
            .context("Failed to create scaler")?;
            *slot = Some(RgbConverter {
                scaler,
                format,
                width,
                height,
            });
        }

        let converter = slot.as_mut().context("Scaler missing")?;
        let mut rgb_frame = ffmpeg::util::frame::video::Video::empty();
        converter
            .scaler
            .run(frame, &mut rgb_frame)
            .context("Failed to scale frame")?;

        frame_to_image(&rgb_frame)
    }
}

/// Copy an RGB24 frame into an image, dropping the row padding.
fn frame_to_image(frame: &ffmpeg::util::frame::video::Video) -> Result<RgbImage> {
    let width = frame.width();
    let height = frame.height();
    let stride = frame.stride(0);
    let row = width as usize * 3;
    let data = frame.data(0);

    let mut buf = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        let start = y * stride;
        buf.extend_from_slice(&data[start..start + row]);
    }

    RgbImage::from_raw(width, height, buf).context("Failed to create image buffer from frame")
}

/// Sequential decoder over the best video stream of a file.
///
/// The demuxer and decoder are released when the reader is dropped,
/// including when decoding stops early on an error.
pub struct VideoReader {
    path: PathBuf,
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    stream_index: usize,
    info: VideoInfo,
}

impl VideoReader {
    pub fn open<P: AsRef<Path>>(video_path: P) -> Result<Self> {
        init_ffmpeg()?;
        let path = video_path.as_ref().to_path_buf();
        let input = ffmpeg::format::input(&path).context("Failed to open video file")?;

        let video_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .context("Could not find video stream")?;
        let stream_index = video_stream.index();
        let fps = stream_fps(&video_stream);
        let frames = u64::try_from(video_stream.frames()).unwrap_or(0);

        let decoder = ffmpeg::codec::context::Context::from_parameters(video_stream.parameters())
            .context("Failed to create codec context")?
            .decoder()
            .video()
            .context("Failed to create video decoder")?;

        let info = VideoInfo {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            frames,
        };

        Ok(Self {
            path,
            input,
            decoder,
            stream_index,
            info,
        })
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    /// Decode every frame in presentation order, handing each to `on_frame` as RGB.
    /// Returns the number of decoded frames.
    pub fn for_each_frame<F>(mut self, mut on_frame: F) -> Result<u64>
    where
        F: FnMut(RgbImage) -> Result<()>,
    {
        let mut converter: Option<RgbConverter> = None;
        let mut decoded = ffmpeg::util::frame::video::Video::empty();
        let mut count = 0u64;

        for (stream, packet) in self.input.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            if let Err(e) = self.decoder.send_packet(&packet) {
                tracing::debug!(path = %self.path.display(), error = %e, "dropping undecodable packet");
                continue;
            }
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                on_frame(RgbConverter::convert(&mut converter, &decoded)?)?;
                count += 1;
            }
        }

        self.decoder.send_eof().ok();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            on_frame(RgbConverter::convert(&mut converter, &decoded)?)?;
            count += 1;
        }

        Ok(count)
    }
}

/// Destination for a stream of equally sized RGB frames
pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// File the frames end up in, if any.
    fn location(&self) -> Option<&Path> {
        None
    }
}

/// Map a failed sink write to an output error naming the sink's file.
pub(crate) fn sink_failure<S: FrameSink + ?Sized>(sink: &S, err: anyhow::Error) -> IslError {
    let path = sink
        .location()
        .map_or_else(|| PathBuf::from("<memory>"), Path::to_path_buf);
    IslError::output(path, format!("{err:#}"))
}

/// Keeps frames in memory
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pub frames: Vec<RgbImage>,
}

impl FrameSink for FrameBuffer {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }
}

// yuv420p needs even dimensions
fn even(v: u32) -> u32 {
    (v & !1).max(2)
}

struct OpenEncoder {
    output: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::Video,
    scaler: ffmpeg::software::scaling::context::Context,
    stream_index: usize,
    encoder_time_base: ffmpeg::Rational,
    stream_time_base: ffmpeg::Rational,
    width: u32,
    height: u32,
    next_pts: i64,
}

impl OpenEncoder {
    fn new(path: &Path, width: u32, height: u32, fps: u32) -> Result<Self> {
        init_ffmpeg()?;
        let fps = i32::try_from(fps).context("Frame rate out of range")?;
        let time_base = ffmpeg::Rational::new(1, fps);
        let (enc_width, enc_height) = (even(width), even(height));

        let mut output = ffmpeg::format::output(&path).context("Failed to create output file")?;
        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4)
            .context("MPEG-4 encoder not available")?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let (encoder, stream_index) = {
            let mut stream = output.add_stream(codec).context("Failed to add video stream")?;
            let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec)
                .encoder()
                .video()
                .context("Failed to create video encoder")?;

            encoder.set_width(enc_width);
            encoder.set_height(enc_height);
            encoder.set_format(ffmpeg::format::Pixel::YUV420P);
            encoder.set_time_base(time_base);
            encoder.set_frame_rate(Some(ffmpeg::Rational::new(fps, 1)));
            encoder.set_bit_rate(OUTPUT_BIT_RATE);
            if global_header {
                encoder.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
            }

            let encoder = encoder
                .open_as(codec)
                .context("Failed to open MPEG-4 encoder")?;
            stream.set_parameters(&encoder);
            stream.set_time_base(time_base);
            (encoder, stream.index())
        };

        output
            .write_header()
            .context("Failed to write container header")?;
        let stream_time_base = output
            .stream(stream_index)
            .context("Output stream missing")?
            .time_base();

        let scaler = ffmpeg::software::scaling::context::Context::get(
            ffmpeg::format::Pixel::RGB24,
            width,
            height,
            ffmpeg::format::Pixel::YUV420P,
            enc_width,
            enc_height,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("Failed to create scaler")?;

        Ok(Self {
            output,
            encoder,
            scaler,
            stream_index,
            encoder_time_base: time_base,
            stream_time_base,
            width,
            height,
            next_pts: 0,
        })
    }

    fn encode(&mut self, image: &RgbImage) -> Result<()> {
        let mut rgb_frame =
            ffmpeg::util::frame::video::Video::new(ffmpeg::format::Pixel::RGB24, self.width, self.height);
        let stride = rgb_frame.stride(0);
        let row = self.width as usize * 3;
        let data = rgb_frame.data_mut(0);
        for (y, line) in image.as_raw().chunks_exact(row).enumerate() {
            let start = y * stride;
            data[start..start + row].copy_from_slice(line);
        }

        let mut yuv_frame = ffmpeg::util::frame::video::Video::empty();
        self.scaler
            .run(&rgb_frame, &mut yuv_frame)
            .context("Failed to convert frame to YUV")?;
        yuv_frame.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.encoder
            .send_frame(&yuv_frame)
            .context("Failed to send frame to encoder")?;
        self.write_packets()
    }

    fn write_packets(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .context("Failed to write packet")?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        self.encoder.send_eof().context("Failed to flush encoder")?;
        self.write_packets()?;
        self.output
            .write_trailer()
            .context("Failed to write container trailer")?;
        Ok(())
    }
}

/// MP4 file writer. The encoder is opened with the size of the first frame.
pub struct Mp4Writer {
    path: PathBuf,
    fps: u32,
    encoder: Option<OpenEncoder>,
    frames: u64,
}

impl Mp4Writer {
    pub fn create<P: AsRef<Path>>(path: P, fps: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            fps,
            encoder: None,
            frames: 0,
        }
    }

    /// Flush and close the file. Nothing is written when no frame was received.
    pub fn finish(self) -> Result<u64> {
        if let Some(encoder) = self.encoder {
            encoder.finish()?;
        }
        Ok(self.frames)
    }
}

impl FrameSink for Mp4Writer {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let (width, height) = frame.dimensions();
        if self.encoder.is_none() {
            self.encoder = Some(OpenEncoder::new(&self.path, width, height, self.fps)?);
        }
        let encoder = self.encoder.as_mut().context("Encoder missing")?;
        if (encoder.width, encoder.height) != (width, height) {
            anyhow::bail!(
                "Frame size {}x{} differs from stream size {}x{}",
                width,
                height,
                encoder.width,
                encoder.height
            );
        }
        encoder.encode(frame)?;
        self.frames += 1;
        Ok(())
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }
}
