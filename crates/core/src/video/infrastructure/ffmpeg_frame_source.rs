use ffmpeg_next::format::context::Input;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;

use crate::shared::constants::{
    CAPTURE_DEVICE, CAPTURE_FORMAT, CAPTURE_FPS, CAPTURE_HEIGHT, CAPTURE_WIDTH,
};
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::frame_source::FrameSource;

/// Where and how to capture.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureSettings {
    /// Device node (`/dev/video0`) or a media file path.
    pub device: String,
    /// libavdevice demuxer name such as `v4l2`; `None` lets ffmpeg probe,
    /// which is how plain files are opened.
    pub input_format: Option<String>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            device: CAPTURE_DEVICE.to_string(),
            input_format: Some(CAPTURE_FORMAT.to_string()),
            width: CAPTURE_WIDTH,
            height: CAPTURE_HEIGHT,
            fps: CAPTURE_FPS,
        }
    }
}

struct OpenStream {
    input: Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    flushing: bool,
}

/// Captures frames via ffmpeg-next (libavdevice + libavcodec).
///
/// Every decoded frame is converted to tightly packed RGB24.
pub struct FfmpegFrameSource {
    settings: CaptureSettings,
    stream: Option<OpenStream>,
    frame_index: usize,
}

impl FfmpegFrameSource {
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            settings,
            stream: None,
            frame_index: 0,
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    fn open_input(&self) -> Result<Input, Box<dyn std::error::Error>> {
        let path = &self.settings.device;
        let Some(name) = self.settings.input_format.as_deref() else {
            return Ok(ffmpeg_next::format::input(path)?);
        };

        ffmpeg_next::device::register_all();
        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == name)
            .ok_or_else(|| format!("Capture input format not available: {name}"))?;

        let mut options = ffmpeg_next::Dictionary::new();
        options.set(
            "video_size",
            &format!("{}x{}", self.settings.width, self.settings.height),
        );
        options.set("framerate", &self.settings.fps.to_string());

        let ctx = ffmpeg_next::format::open_with(
            path,
            &ffmpeg_next::format::Format::Input(format),
            options,
        )?;
        Ok(ctx.input())
    }
}

impl Default for FfmpegFrameSource {
    fn default() -> Self {
        Self::new(CaptureSettings::default())
    }
}

impl FrameSource for FfmpegFrameSource {
    fn open(&mut self) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let input = self
            .open_input()
            .map_err(|e| format!("Cannot open {}: {e}", self.settings.device))?;

        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let stream_index = stream.index();

        let rate = stream.avg_frame_rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;
        let (width, height) = (decoder.width(), decoder.height());

        let scaler = scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            scaling::Flags::BILINEAR,
        )?;

        if width != self.settings.width || height != self.settings.height {
            log::info!(
                "Requested {}x{}, source delivers {width}x{height}",
                self.settings.width,
                self.settings.height
            );
        }

        self.stream = Some(OpenStream {
            input,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            flushing: false,
        });
        self.frame_index = 0;

        Ok(VideoMetadata {
            width,
            height,
            fps,
            source: self.settings.device.clone(),
        })
    }

    fn next_frame(&mut self) -> Option<Frame> {
        let stream = self.stream.as_mut()?;
        let decoded = match stream.receive() {
            Ok(decoded) => decoded?,
            Err(e) => {
                log::error!("Frame capture failed: {e}");
                return None;
            }
        };

        let mut rgb = Video::empty();
        if let Err(e) = stream.scaler.run(&decoded, &mut rgb) {
            log::error!("Pixel conversion failed: {e}");
            return None;
        }

        let pixels = extract_rgb_pixels(&rgb, stream.width, stream.height);
        let frame = Frame::new(pixels, stream.width, stream.height, 3, self.frame_index);
        self.frame_index += 1;
        Some(frame)
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            log::debug!("Closed {}", self.settings.device);
        }
    }
}

impl OpenStream {
    /// Pulls packets until the decoder yields a frame. `Ok(None)` once the
    /// input and the decoder are both drained.
    fn receive(&mut self) -> Result<Option<Video>, ffmpeg_next::Error> {
        let mut decoded = Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return Ok(Some(decoded));
            }
            if self.flushing {
                return Ok(None);
            }

            match self.input.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != self.stream_index {
                        continue;
                    }
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        log::warn!("Dropping undecodable packet: {e}");
                    }
                }
                None => {
                    self.decoder.send_eof()?;
                    self.flushing = true;
                }
            }
        }
    }
}

/// Copies an ffmpeg RGB24 frame into a buffer without row padding.
fn extract_rgb_pixels(rgb: &Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb.stride(0);
    let data = rgb.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}
