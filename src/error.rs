//! Error types for the `avqueue` crate.
//!
//! [`PipelineError`] is the single error type used throughout the crate.
//! Probing failures are fatal and surface synchronously from
//! [`Io::open`](crate::Io::open). Per-packet failures during streaming are
//! recoverable: they are counted and forwarded through
//! [`Diagnostics`](crate::Diagnostics) instead of stopping the decode thread.

use std::path::PathBuf;

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

use crate::container::MediaKind;

/// The unified error type for all `avqueue` operations.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// The container could not be opened or its stream table could not be read.
    #[error("Failed to open media file at {path}: {reason}")]
    Open {
        /// Path (or source label) that was being opened.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The container has neither a video nor an audio stream.
    #[error("No video or audio stream found in file")]
    NoStreams,

    /// A selected stream has no usable decoder.
    #[error("Cannot find {kind} codec: {reason}")]
    CodecNotFound {
        /// Which stream the codec was requested for.
        kind: MediaKind,
        /// Underlying reason the codec could not be opened.
        reason: String,
    },

    /// The audio stream uses a sample format with no presentation mapping.
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// A single packet or frame could not be decoded.
    #[error("Failed to decode {kind} packet: {reason}")]
    PacketDecode {
        /// Stream the packet belonged to.
        kind: MediaKind,
        /// Codec error message.
        reason: String,
    },

    /// Reading the next packet from the container failed.
    #[error("Failed to read packet: {0}")]
    Read(String),

    /// Repositioning the container failed.
    #[error("Failed to seek to {target}: {reason}")]
    Seek {
        /// Requested position.
        target: i64,
        /// Underlying reason the seek failed.
        reason: String,
    },

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    /// The decode thread could not be spawned.
    #[error("Failed to start decode thread: {0}")]
    ThreadStart(String),

    /// The decode thread went away before reporting the probe result.
    #[error("Decode thread exited before probing finished")]
    DecodeThreadExited,
}

impl PipelineError {
    /// The subsystem that raised the error.
    pub fn subsystem(&self) -> &'static str {
        match self {
            PipelineError::Open { .. }
            | PipelineError::NoStreams
            | PipelineError::CodecNotFound { .. }
            | PipelineError::UnsupportedFormat(_) => "probe",
            PipelineError::PacketDecode { .. } => "decode",
            PipelineError::Read(_) | PipelineError::Seek { .. } => "container",
            PipelineError::Ffmpeg(_) => "ffmpeg",
            PipelineError::ThreadStart(_) | PipelineError::DecodeThreadExited => "io",
        }
    }

    /// Returns `true` if the error ends the session.
    ///
    /// Packet, read, and seek failures are reported through diagnostics
    /// and streaming continues.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            PipelineError::PacketDecode { .. } | PipelineError::Read(_) | PipelineError::Seek { .. }
        )
    }
}

impl From<FfmpegError> for PipelineError {
    fn from(error: FfmpegError) -> Self {
        PipelineError::Ffmpeg(error.to_string())
    }
}
