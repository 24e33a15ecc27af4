//! Pipeline configuration.
//!
//! [`IoOptions`] collects the tuning knobs of an [`Io`](crate::Io) session:
//! the session time base, the queue watermarks, the decode loop's wait
//! timeout and the number of retained diagnostics.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use avqueue::{Io, IoOptions, TimeBase};
//!
//! let options = IoOptions::new()
//!     .with_time_base(TimeBase::per_second(48_000).unwrap())
//!     .with_video_watermark(30)
//!     .with_wait_timeout(Duration::from_millis(5));
//! let io = Io::open("input.mp4", options)?;
//! # Ok::<(), avqueue::PipelineError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use crate::time_base::TimeBase;

/// Default soft capacity of each frame queue.
pub const DEFAULT_WATERMARK: usize = 100;

/// Default bound on a single wait of the decode loop.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(10);

/// Default number of recoverable errors retained for the consumer.
pub const DEFAULT_DIAGNOSTICS_CAPACITY: usize = 64;

/// Settings for an [`Io`](crate::Io) session.
#[derive(Clone)]
pub struct IoOptions {
    pub(crate) time_base: TimeBase,
    pub(crate) video_watermark: usize,
    pub(crate) audio_watermark: usize,
    pub(crate) wait_timeout: Duration,
    pub(crate) diagnostics_capacity: usize,
}

impl Debug for IoOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("IoOptions")
            .field("time_base", &format_args!("{}", self.time_base))
            .field("video_watermark", &self.video_watermark)
            .field("audio_watermark", &self.audio_watermark)
            .field("wait_timeout", &self.wait_timeout)
            .field("diagnostics_capacity", &self.diagnostics_capacity)
            .finish()
    }
}

impl Default for IoOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl IoOptions {
    /// Create options with default settings.
    ///
    /// Defaults: microsecond time base, watermarks of 100 frames, a 10 ms
    /// wait timeout and 64 retained diagnostics.
    pub fn new() -> Self {
        Self {
            time_base: TimeBase::MICROSECONDS,
            video_watermark: DEFAULT_WATERMARK,
            audio_watermark: DEFAULT_WATERMARK,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            diagnostics_capacity: DEFAULT_DIAGNOSTICS_CAPACITY,
        }
    }

    /// Set the unit of every timestamp exchanged with the consumer.
    #[must_use]
    pub fn with_time_base(mut self, time_base: TimeBase) -> Self {
        self.time_base = time_base;
        self
    }

    /// Set the video queue watermark. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_video_watermark(mut self, frames: usize) -> Self {
        self.video_watermark = frames.max(1);
        self
    }

    /// Set the audio queue watermark. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_audio_watermark(mut self, frames: usize) -> Self {
        self.audio_watermark = frames.max(1);
        self
    }

    /// Set both watermarks at once.
    #[must_use]
    pub fn with_watermark(self, frames: usize) -> Self {
        self.with_video_watermark(frames).with_audio_watermark(frames)
    }

    /// Bound each wait of the decode loop.
    ///
    /// This is also the worst-case latency for observing shutdown.
    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Set how many recoverable errors are kept for the consumer before
    /// further ones are only counted. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_diagnostics_capacity(mut self, capacity: usize) -> Self {
        self.diagnostics_capacity = capacity.max(1);
        self
    }

    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }

    pub fn video_watermark(&self) -> usize {
        self.video_watermark
    }

    pub fn audio_watermark(&self) -> usize {
        self.audio_watermark
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    pub fn diagnostics_capacity(&self) -> usize {
        self.diagnostics_capacity
    }
}
