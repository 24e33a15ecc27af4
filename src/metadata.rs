//! Stream metadata published after probing.
//!
//! [`Io::info`](crate::Io::info) returns an [`IoInfo`] describing the
//! selected streams. It is resolved once, before the decode loop starts
//! streaming, and never changes afterward. All durations are expressed in
//! the session [`TimeBase`].

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::{sample::SampleType, time_base::TimeBase};

/// Resolved format information for an open pipeline.
///
/// # Example
///
/// ```no_run
/// use avqueue::{Io, IoOptions};
///
/// let io = Io::open("input.mp4", IoOptions::default())?;
/// let info = io.info();
/// if let Some(video) = &info.video {
///     println!("{}x{} @ {} fps", video.width, video.height, video.frame_rate);
/// }
/// # Ok::<(), avqueue::PipelineError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct IoInfo {
    /// Path or label of the opened source.
    pub source: String,
    /// Unit of every timestamp and duration handed to consumers.
    pub time_base: TimeBase,
    /// The selected video stream, if the container has one.
    pub video: Option<VideoInfo>,
    /// The selected audio stream, if the container has one.
    pub audio: Option<AudioInfo>,
}

impl IoInfo {
    /// The longer of the two stream durations.
    pub fn duration(&self) -> i64 {
        let video = self.video.as_ref().map_or(0, |video| video.duration);
        let audio = self.audio.as_ref().map_or(0, |audio| audio.duration);
        video.max(audio)
    }
}

/// Geometry and timing of the selected video stream.
///
/// Decoded frames are always interleaved 8-bit RGBA at `width` x `height`.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct VideoInfo {
    pub stream_index: usize,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Nominal frame rate declared by the container.
    pub frame_rate: FrameRate,
    /// Stream duration in the session time base, `0` when unknown.
    pub duration: i64,
    /// Codec name (e.g. `"h264"`).
    pub codec: String,
}

/// Channel layout and timing of the selected audio stream.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct AudioInfo {
    pub stream_index: usize,
    pub channels: u16,
    /// Sample type of the queued interleaved buffers.
    pub sample_type: SampleType,
    /// Name of the decoder's native sample format (e.g. `"fltp"`).
    pub source_format: String,
    /// Sample rate in hertz.
    pub sample_rate: u32,
    /// Stream duration in the session time base, `0` when unknown.
    pub duration: i64,
    /// Codec name (e.g. `"aac"`).
    pub codec: String,
}

/// A rational frame rate in frames per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameRate {
    pub numerator: i32,
    pub denominator: i32,
}

impl FrameRate {
    pub fn new(numerator: i32, denominator: i32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Frames per second, or `0.0` when the rate is unknown.
    pub fn as_f64(&self) -> f64 {
        if self.denominator == 0 {
            0.0
        } else {
            self.numerator as f64 / self.denominator as f64
        }
    }
}

impl Display for FrameRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{:.3}", self.as_f64())
    }
}
