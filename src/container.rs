//! Demuxer and codec collaborator traits.
//!
//! The pipeline never talks to FFmpeg directly. It drives a [`Container`]
//! that yields compressed packets and opens one [`VideoCodec`] and one
//! [`AudioCodec`]. [`FfmpegContainer`](crate::FfmpegContainer) is the
//! production implementation; tests plug in synthetic containers.
//!
//! Implementations are created and used on the decode thread only, so none
//! of these traits require `Send`.

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::{error::PipelineError, metadata::FrameRate, sample::SampleFormat, time_base::TimeBase};

/// The media type of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
    /// Subtitles, data and attachment streams. Never selected.
    Other,
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Other => write!(f, "other"),
        }
    }
}

/// Kind-specific parameters of a stream, as declared by the container.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamParameters {
    Video {
        width: u32,
        height: u32,
        frame_rate: FrameRate,
    },
    Audio {
        channels: u16,
        sample_rate: u32,
        /// `None` when the native sample format has no presentation mapping.
        sample_format: Option<SampleFormat>,
        /// Native format name, used in error messages.
        format_name: String,
    },
    Other,
}

/// One entry in a container's stream table.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    /// Index used to route packets to this stream.
    pub index: usize,
    /// Native time base of the stream's timestamps.
    pub time_base: TimeBase,
    /// Declared stream duration in the native time base, if known.
    pub duration: Option<i64>,
    /// Decoder name, `"unknown"` when it cannot be determined.
    pub codec_name: String,
    pub parameters: StreamParameters,
}

impl StreamDescriptor {
    pub fn kind(&self) -> MediaKind {
        match self.parameters {
            StreamParameters::Video { .. } => MediaKind::Video,
            StreamParameters::Audio { .. } => MediaKind::Audio,
            StreamParameters::Other => MediaKind::Other,
        }
    }
}

/// A demuxer that yields compressed packets tagged with a stream index.
pub trait Container {
    /// A compressed packet.
    type Packet;
    /// Video decoder opened from one of this container's streams.
    type Video: VideoCodec<Packet = Self::Packet>;
    /// Audio decoder opened from one of this container's streams.
    type Audio: AudioCodec<Packet = Self::Packet>;

    /// The global stream table, in container order.
    fn streams(&self) -> Vec<StreamDescriptor>;

    /// Container-level duration in microseconds, or `None` when unknown.
    fn duration(&self) -> Option<i64>;

    /// Read the next packet and the index of the stream it belongs to.
    ///
    /// Returns `Ok(None)` at end of stream.
    fn read_packet(&mut self) -> Result<Option<(usize, Self::Packet)>, PipelineError>;

    /// Reposition to the keyframe at or before `timestamp`, expressed in the
    /// native time base of `stream_index`.
    fn seek(&mut self, stream_index: usize, timestamp: i64) -> Result<(), PipelineError>;

    fn open_video_codec(&mut self, stream: &StreamDescriptor) -> Result<Self::Video, PipelineError>;

    fn open_audio_codec(&mut self, stream: &StreamDescriptor) -> Result<Self::Audio, PipelineError>;
}

/// Submit/receive contract shared by video and audio decoders.
pub trait Codec {
    type Packet;

    /// Submit a packet. `None` signals end of stream and puts the decoder in
    /// draining mode.
    fn send_packet(&mut self, packet: Option<&Self::Packet>) -> Result<(), PipelineError>;

    /// Receive the next decoded frame and return its native presentation
    /// timestamp ([`NO_TIMESTAMP`](crate::NO_TIMESTAMP) when the frame has none).
    ///
    /// Returns `Ok(None)` when the decoder needs more input or is fully drained.
    fn receive_frame(&mut self) -> Result<Option<i64>, PipelineError>;

    /// Discard all buffered state, e.g. after a container seek.
    fn flush(&mut self);
}

pub trait VideoCodec: Codec {
    /// Convert the frame last returned by [`receive_frame`](Codec::receive_frame)
    /// into tightly packed RGBA8 at the stream's declared size.
    fn convert_frame(&mut self) -> Result<Vec<u8>, PipelineError>;
}

pub trait AudioCodec: Codec {
    /// Raw planes of the frame last returned by
    /// [`receive_frame`](Codec::receive_frame).
    fn frame_planes(&self) -> AudioPlanes<'_>;
}

/// Borrowed view of a decoded audio frame in its native layout.
///
/// Interleaved formats carry a single plane holding every channel. Planar
/// formats carry one plane per channel.
#[derive(Debug, Clone)]
pub struct AudioPlanes<'a> {
    pub format: SampleFormat,
    pub channels: u16,
    pub samples_per_channel: usize,
    pub planes: Vec<&'a [u8]>,
}
