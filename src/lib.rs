//! # avqueue
//!
//! A threaded demux and decode pipeline that keeps bounded queues of decoded
//! audio and video frames ready for a player.
//!
//! [`Io`] opens a container on a dedicated decode thread, selects the first
//! video and first audio stream, and decodes ahead into an [`AvQueue`] until
//! each queue reaches its watermark. Every timestamp handed out is expressed
//! in one session-wide [`TimeBase`], so the consumer can synchronize audio
//! and video itself. Seeks are asynchronous: the queues are flushed and
//! refilled from the first frame at or after the target.
//!
//! ## Quick Start
//!
//! ```no_run
//! use avqueue::{Io, IoOptions, TimeBase};
//!
//! let io = Io::open("input.mp4", IoOptions::default())?;
//! let info = io.info();
//! println!("duration: {:.2}s", info.time_base.to_seconds(info.duration()));
//!
//! // Present whatever is due at the 1.5 second mark.
//! let now = TimeBase::MICROSECONDS.from_seconds(1.5);
//! if let Some(frame) = io.queue().pop_video_before(now) {
//!     if let Some(image) = frame.to_image() {
//!         image.save("frame.png")?;
//!     }
//! }
//!
//! // Hand up to 8 audio buffers to the output device.
//! for chunk in io.queue().pop_audio_frames(8) {
//!     let _samples = chunk.samples;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Custom containers
//!
//! The pipeline only needs the [`Container`] trait. [`Io::with_container`]
//! accepts any implementation, which is how the test suite drives it with
//! synthetic media.
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system for the
//! FFmpeg-backed container.

pub mod configuration;
pub mod container;
pub mod decode;
pub mod diagnostics;
pub mod error;
pub mod ffmpeg;
pub mod frame;
pub mod io;
pub mod metadata;
pub mod probe;
pub mod queue;
pub mod sample;
pub mod time_base;

pub use configuration::IoOptions;
pub use container::{
    AudioCodec, AudioPlanes, Codec, Container, MediaKind, StreamDescriptor, StreamParameters,
    VideoCodec,
};
pub use decode::{AudioDecoder, DecodeMode, VideoDecoder};
pub use diagnostics::Diagnostics;
pub use error::PipelineError;
pub use ffmpeg::{
    FfmpegAudioCodec, FfmpegContainer, FfmpegLogLevel, FfmpegVideoCodec, ffmpeg_log_level,
    set_ffmpeg_log_level,
};
pub use frame::{AudioFrameInfo, DecodedAudioFrame, DecodedVideoFrame};
pub use io::Io;
pub use metadata::{AudioInfo, FrameRate, IoInfo, VideoInfo};
pub use probe::{ProbedStreams, StreamHandle, probe_streams};
pub use queue::{AvQueue, FrameQueue, PipelineState, QueueState, SeekRequest};
pub use sample::{SampleFormat, SampleLayout, SampleType, Samples};
pub use time_base::{NO_TIMESTAMP, TimeBase};
