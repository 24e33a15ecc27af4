//! FFmpeg-backed container and codecs.
//!
//! [`FfmpegContainer`] implements [`Container`] over `ffmpeg_next`'s demuxer.
//! Its codecs decode with libavcodec and convert video to RGBA with swscale.
//! [`Io::open`](crate::Io::open) uses it for file paths.
//!
//! FFmpeg also writes its own messages to stderr, independently of the `log`
//! crate. [`set_ffmpeg_log_level`] tunes that output.
//!
//! ```no_run
//! use avqueue::FfmpegLogLevel;
//!
//! avqueue::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//! ```

use std::path::{Path, PathBuf};

use ffmpeg_next::{
    Error as FfmpegError, Packet,
    codec::{context::Context as CodecContext, decoder},
    format::{Pixel, Sample, context::Input},
    frame::{Audio as AudioFrame, Video as VideoFrame},
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::log::Level,
};
use ffmpeg_sys_next::AVSampleFormat;

use crate::{
    container::{
        AudioCodec, AudioPlanes, Codec, Container, MediaKind, StreamDescriptor, StreamParameters,
        VideoCodec,
    },
    error::PipelineError,
    metadata::FrameRate,
    sample::SampleFormat,
    time_base::{NO_TIMESTAMP, TimeBase},
};

/// A media file opened with libavformat.
pub struct FfmpegContainer {
    input: Input,
    path: PathBuf,
}

impl FfmpegContainer {
    /// Open `path` and read its stream table.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Open`] if FFmpeg cannot be initialised or the
    /// file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref().to_path_buf();

        ffmpeg_next::init().map_err(|error| PipelineError::Open {
            path: path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input = ffmpeg_next::format::input(&path).map_err(|error| PipelineError::Open {
            path: path.clone(),
            reason: error.to_string(),
        })?;

        log::debug!(
            "Opened {} ({}, {} streams)",
            path.display(),
            input.format().name(),
            input.streams().count()
        );
        Ok(Self { input, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn stream_context(&self, stream: &StreamDescriptor) -> Result<CodecContext, PipelineError> {
        let native = self
            .input
            .stream(stream.index)
            .ok_or_else(|| PipelineError::CodecNotFound {
                kind: stream.kind(),
                reason: format!("stream {} does not exist", stream.index),
            })?;
        CodecContext::from_parameters(native.parameters()).map_err(|error| {
            PipelineError::CodecNotFound {
                kind: stream.kind(),
                reason: format!("stream {}: {error}", stream.index),
            }
        })
    }
}

impl Container for FfmpegContainer {
    type Packet = Packet;
    type Video = FfmpegVideoCodec;
    type Audio = FfmpegAudioCodec;

    fn streams(&self) -> Vec<StreamDescriptor> {
        self.input.streams().map(|stream| describe_stream(&stream)).collect()
    }

    fn duration(&self) -> Option<i64> {
        let duration = self.input.duration();
        (duration >= 0).then_some(duration)
    }

    fn read_packet(&mut self) -> Result<Option<(usize, Packet)>, PipelineError> {
        let mut packet = Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => Ok(Some((packet.stream(), packet))),
            Err(FfmpegError::Eof) => Ok(None),
            Err(error) => Err(PipelineError::Read(error.to_string())),
        }
    }

    fn seek(&mut self, stream_index: usize, timestamp: i64) -> Result<(), PipelineError> {
        // Without a stream index libavformat expects AV_TIME_BASE units.
        let time_base = self
            .input
            .stream(stream_index)
            .and_then(|stream| TimeBase::try_from(stream.time_base()).ok())
            .unwrap_or(TimeBase::MICROSECONDS);
        let target = TimeBase::rescale(timestamp, time_base, TimeBase::MICROSECONDS);
        self.input
            .seek(target, ..target)
            .map_err(|error| PipelineError::Seek {
                target,
                reason: error.to_string(),
            })
    }

    fn open_video_codec(
        &mut self,
        stream: &StreamDescriptor,
    ) -> Result<FfmpegVideoCodec, PipelineError> {
        let decoder = self
            .stream_context(stream)?
            .decoder()
            .video()
            .map_err(|error| PipelineError::CodecNotFound {
                kind: MediaKind::Video,
                reason: format!("{} (stream {}): {error}", stream.codec_name, stream.index),
            })?;
        let (width, height) = match stream.parameters {
            StreamParameters::Video { width, height, .. } => (width, height),
            _ => (decoder.width(), decoder.height()),
        };
        Ok(FfmpegVideoCodec {
            decoder,
            decoded: VideoFrame::empty(),
            rgba: VideoFrame::empty(),
            scaler: None,
            width,
            height,
        })
    }

    fn open_audio_codec(
        &mut self,
        stream: &StreamDescriptor,
    ) -> Result<FfmpegAudioCodec, PipelineError> {
        let decoder = self
            .stream_context(stream)?
            .decoder()
            .audio()
            .map_err(|error| PipelineError::CodecNotFound {
                kind: MediaKind::Audio,
                reason: format!("{} (stream {}): {error}", stream.codec_name, stream.index),
            })?;
        let format = SampleFormat::from_ffmpeg(decoder.format())
            .ok_or_else(|| PipelineError::UnsupportedFormat(sample_name(decoder.format())))?;
        check_plane_count(format, decoder.channels())?;
        Ok(FfmpegAudioCodec {
            channels: decoder.channels(),
            decoder,
            decoded: AudioFrame::empty(),
            format,
        })
    }
}

fn describe_stream(stream: &ffmpeg_next::Stream<'_>) -> StreamDescriptor {
    let parameters = stream.parameters();
    let codec_name = decoder::find(parameters.id())
        .map(|codec| codec.name().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    // SAFETY: the parameters pointer is valid for the lifetime of the stream.
    let raw = unsafe { &*parameters.as_ptr() };

    let kind = match parameters.medium() {
        Type::Video => StreamParameters::Video {
            width: raw.width.max(0) as u32,
            height: raw.height.max(0) as u32,
            frame_rate: {
                let rate = stream.rate();
                FrameRate::new(rate.numerator(), rate.denominator())
            },
        },
        Type::Audio => {
            let sample = sample_from_raw(raw.format);
            StreamParameters::Audio {
                channels: raw.ch_layout.nb_channels.max(0) as u16,
                sample_rate: raw.sample_rate.max(0) as u32,
                sample_format: SampleFormat::from_ffmpeg(sample),
                format_name: sample_name(sample),
            }
        }
        _ => StreamParameters::Other,
    };

    let duration = stream.duration();
    StreamDescriptor {
        index: stream.index(),
        time_base: TimeBase::try_from(stream.time_base()).unwrap_or(TimeBase::MICROSECONDS),
        duration: (duration != NO_TIMESTAMP).then_some(duration),
        codec_name,
        parameters: kind,
    }
}

/// Map the raw `format` field of audio codec parameters to a [`Sample`].
fn sample_from_raw(raw: i32) -> Sample {
    use AVSampleFormat::*;

    [
        AV_SAMPLE_FMT_U8,
        AV_SAMPLE_FMT_S16,
        AV_SAMPLE_FMT_S32,
        AV_SAMPLE_FMT_FLT,
        AV_SAMPLE_FMT_DBL,
        AV_SAMPLE_FMT_U8P,
        AV_SAMPLE_FMT_S16P,
        AV_SAMPLE_FMT_S32P,
        AV_SAMPLE_FMT_FLTP,
        AV_SAMPLE_FMT_DBLP,
        AV_SAMPLE_FMT_S64,
        AV_SAMPLE_FMT_S64P,
    ]
    .into_iter()
    .find(|format| *format as i32 == raw)
    .map(Sample::from)
    .unwrap_or(Sample::None)
}

/// Planes reachable through `AVFrame::data`.
const MAX_PLANES: usize = 8;

/// Planar audio keeps one plane per channel, and only the first
/// [`MAX_PLANES`] of them are exposed by `frame::Audio::data`.
fn check_plane_count(format: SampleFormat, channels: u16) -> Result<(), PipelineError> {
    if format.is_planar() && channels as usize > MAX_PLANES {
        return Err(PipelineError::UnsupportedFormat(format!(
            "{format} with {channels} channels (at most {MAX_PLANES} planes)"
        )));
    }
    Ok(())
}

fn sample_name(sample: Sample) -> String {
    match sample {
        Sample::None => "none".to_string(),
        sample => sample.name().to_string(),
    }
}

/// Copy an RGBA frame into a tightly packed buffer, dropping row padding.
fn frame_to_buffer(frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = frame.stride(0);
    let row_bytes = width as usize * 4;
    let data = frame.data(0);

    if stride == row_bytes {
        data[..row_bytes * height as usize].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            buffer.extend_from_slice(&data[start..start + row_bytes]);
        }
        buffer
    }
}

/// Interpret a `receive_frame` result. "Need more input" and "fully drained"
/// both mean no frame is available.
fn received(result: Result<(), FfmpegError>, kind: MediaKind) -> Result<bool, PipelineError> {
    match result {
        Ok(()) => Ok(true),
        Err(FfmpegError::Eof) => Ok(false),
        Err(FfmpegError::Other { errno }) if errno == ffmpeg_next::util::error::EAGAIN => Ok(false),
        Err(error) => Err(PipelineError::PacketDecode {
            kind,
            reason: error.to_string(),
        }),
    }
}

fn sent(result: Result<(), FfmpegError>, kind: MediaKind) -> Result<(), PipelineError> {
    result.map_err(|error| PipelineError::PacketDecode {
        kind,
        reason: error.to_string(),
    })
}

/// libavcodec video decoder with an RGBA converter.
pub struct FfmpegVideoCodec {
    decoder: decoder::Video,
    decoded: VideoFrame,
    rgba: VideoFrame,
    scaler: Option<(ScalerInput, ScalingContext)>,
    width: u32,
    height: u32,
}

/// Source geometry a scaler was built for.
type ScalerInput = (Pixel, u32, u32);

impl Codec for FfmpegVideoCodec {
    type Packet = Packet;

    fn send_packet(&mut self, packet: Option<&Packet>) -> Result<(), PipelineError> {
        let result = match packet {
            Some(packet) => self.decoder.send_packet(packet),
            None => self.decoder.send_eof(),
        };
        sent(result, MediaKind::Video)
    }

    fn receive_frame(&mut self) -> Result<Option<i64>, PipelineError> {
        let result = self.decoder.receive_frame(&mut self.decoded);
        Ok(received(result, MediaKind::Video)?.then(|| self.decoded.pts().unwrap_or(NO_TIMESTAMP)))
    }

    fn flush(&mut self) {
        self.decoder.flush();
    }
}

impl VideoCodec for FfmpegVideoCodec {
    fn convert_frame(&mut self) -> Result<Vec<u8>, PipelineError> {
        let input = (self.decoded.format(), self.decoded.width(), self.decoded.height());
        let mut scaler = match self.scaler.take() {
            Some((built_for, scaler)) if built_for == input => scaler,
            _ => ScalingContext::get(
                input.0,
                input.1,
                input.2,
                Pixel::RGBA,
                self.width,
                self.height,
                ScalingFlags::BILINEAR,
            )?,
        };
        let result = scaler.run(&self.decoded, &mut self.rgba);
        self.scaler = Some((input, scaler));
        result?;
        Ok(frame_to_buffer(&self.rgba, self.width, self.height))
    }
}

/// libavcodec audio decoder exposing raw planes.
pub struct FfmpegAudioCodec {
    decoder: decoder::Audio,
    decoded: AudioFrame,
    format: SampleFormat,
    channels: u16,
}

impl Codec for FfmpegAudioCodec {
    type Packet = Packet;

    fn send_packet(&mut self, packet: Option<&Packet>) -> Result<(), PipelineError> {
        let result = match packet {
            Some(packet) => self.decoder.send_packet(packet),
            None => self.decoder.send_eof(),
        };
        sent(result, MediaKind::Audio)
    }

    fn receive_frame(&mut self) -> Result<Option<i64>, PipelineError> {
        let result = self.decoder.receive_frame(&mut self.decoded);
        Ok(received(result, MediaKind::Audio)?.then(|| self.decoded.pts().unwrap_or(NO_TIMESTAMP)))
    }

    fn flush(&mut self) {
        self.decoder.flush();
    }
}

impl AudioCodec for FfmpegAudioCodec {
    fn frame_planes(&self) -> AudioPlanes<'_> {
        let frame = &self.decoded;
        AudioPlanes {
            format: SampleFormat::from_ffmpeg(frame.format()).unwrap_or(self.format),
            channels: self.channels,
            samples_per_channel: frame.samples(),
            planes: (0..frame.planes().min(MAX_PLANES))
                .map(|plane| frame.data(plane))
                .collect(),
        }
    }
}

/// FFmpeg internal log verbosity, most quiet first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    Quiet,
    Panic,
    Fatal,
    Error,
    /// FFmpeg's default.
    Warning,
    Info,
    Verbose,
    Debug,
    Trace,
}

impl From<FfmpegLogLevel> for Level {
    fn from(level: FfmpegLogLevel) -> Self {
        match level {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Panic => Level::Panic,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Verbose => Level::Verbose,
            FfmpegLogLevel::Debug => Level::Debug,
            FfmpegLogLevel::Trace => Level::Trace,
        }
    }
}

impl From<Level> for FfmpegLogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Quiet => FfmpegLogLevel::Quiet,
            Level::Panic => FfmpegLogLevel::Panic,
            Level::Fatal => FfmpegLogLevel::Fatal,
            Level::Error => FfmpegLogLevel::Error,
            Level::Warning => FfmpegLogLevel::Warning,
            Level::Info => FfmpegLogLevel::Info,
            Level::Verbose => FfmpegLogLevel::Verbose,
            Level::Debug => FfmpegLogLevel::Debug,
            Level::Trace => FfmpegLogLevel::Trace,
        }
    }
}

/// Set what FFmpeg itself prints to stderr. Does not affect `log` output.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.into());
}

/// The current FFmpeg log level, or `None` if it maps to no known level.
pub fn ffmpeg_log_level() -> Option<FfmpegLogLevel> {
    ffmpeg_next::util::log::get_level().ok().map(FfmpegLogLevel::from)
}
