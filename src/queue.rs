//! Bounded frame queues shared between the decode thread and the consumer.
//!
//! [`AvQueue`] holds one [`FrameQueue`] per media kind together with the
//! pending seek request, the running flag and the [`PipelineState`], all
//! behind a single mutex. The queues never block on push: the decode loop
//! checks occupancy against the watermarks and simply stops reading packets
//! while both present queues are full. A decode call already in flight may
//! still add its frame, so a queue can sit one frame above its watermark.
//!
//! # Example
//!
//! ```no_run
//! use avqueue::{Io, IoOptions};
//!
//! let io = Io::open("input.mp4", IoOptions::default())?;
//! let queue = io.queue();
//! while let Some(frame) = queue.pop_video() {
//!     println!("frame at {}", frame.timestamp);
//! }
//! # Ok::<(), avqueue::PipelineError>(())
//! ```

use std::collections::VecDeque;
use std::collections::vec_deque::Iter;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::frame::{DecodedAudioFrame, DecodedVideoFrame};

/// A FIFO of `(timestamp, frame)` pairs with a soft capacity.
#[derive(Debug, Clone)]
pub struct FrameQueue<T> {
    entries: VecDeque<(i64, T)>,
    watermark: usize,
}

impl<T> FrameQueue<T> {
    pub fn new(watermark: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            watermark,
        }
    }

    /// Append a frame. Never blocks and never rejects.
    pub fn push(&mut self, timestamp: i64, frame: T) {
        self.entries.push_back((timestamp, frame));
    }

    pub fn pop(&mut self) -> Option<(i64, T)> {
        self.entries.pop_front()
    }

    pub fn front(&self) -> Option<&(i64, T)> {
        self.entries.front()
    }

    /// Timestamp of the oldest entry.
    pub fn front_timestamp(&self) -> Option<i64> {
        self.entries.front().map(|(timestamp, _)| *timestamp)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn watermark(&self) -> usize {
        self.watermark
    }

    /// `true` while the queue is below its watermark.
    pub fn has_room(&self) -> bool {
        self.entries.len() < self.watermark
    }

    pub fn iter(&self) -> Iter<'_, (i64, T)> {
        self.entries.iter()
    }

    /// Pop every entry older than `timestamp` and return the newest of them.
    pub fn pop_before(&mut self, timestamp: i64) -> Option<(i64, T)> {
        let mut latest = None;
        while self.front_timestamp().is_some_and(|front| front < timestamp) {
            latest = self.entries.pop_front();
        }
        latest
    }

    /// Pop at most `count` entries from the front.
    pub fn pop_up_to(&mut self, count: usize) -> Vec<(i64, T)> {
        let count = count.min(self.entries.len());
        self.entries.drain(..count).collect()
    }
}

/// Lifecycle of the decode thread, as observed by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// Opening the container and resolving codecs.
    Probing,
    /// Reading packets while either queue has room.
    Streaming,
    /// Discarding frames until the seek target is reached.
    Seeking,
    /// The container is exhausted and the codecs have been flushed. Waits for
    /// a seek or shutdown.
    Drained,
    /// The decode thread has exited.
    Stopped,
}

impl Display for PipelineState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            PipelineState::Probing => "probing",
            PipelineState::Streaming => "streaming",
            PipelineState::Seeking => "seeking",
            PipelineState::Drained => "drained",
            PipelineState::Stopped => "stopped",
        };
        write!(f, "{name}")
    }
}

/// The single outstanding seek target. A newer request replaces an older
/// one that has not been observed yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeekRequest(Option<i64>);

impl SeekRequest {
    pub fn set(&mut self, timestamp: i64) {
        self.0 = Some(timestamp);
    }

    pub fn take(&mut self) -> Option<i64> {
        self.0.take()
    }

    pub fn pending(&self) -> Option<i64> {
        self.0
    }
}

/// Everything guarded by the [`AvQueue`] mutex.
///
/// Consumers only ever read it. Frames leave the queues through the
/// [`AvQueue`] pop methods, which wake the decode thread.
#[derive(Debug)]
pub struct QueueState {
    pub(crate) video: FrameQueue<DecodedVideoFrame>,
    pub(crate) audio: FrameQueue<DecodedAudioFrame>,
    seek: SeekRequest,
    running: bool,
    state: PipelineState,
    has_video: bool,
    has_audio: bool,
}

impl QueueState {
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Seek target not yet picked up by the decode thread.
    pub fn pending_seek(&self) -> Option<i64> {
        self.seek.pending()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn video_len(&self) -> usize {
        self.video.len()
    }

    pub fn audio_len(&self) -> usize {
        self.audio.len()
    }

    /// Timestamps of the queued video frames, oldest first.
    pub fn video_timestamps(&self) -> Vec<i64> {
        self.video.iter().map(|(timestamp, _)| *timestamp).collect()
    }

    /// Timestamps of the queued audio frames, oldest first.
    pub fn audio_timestamps(&self) -> Vec<i64> {
        self.audio.iter().map(|(timestamp, _)| *timestamp).collect()
    }

    /// `true` when any queue whose stream exists is below its watermark.
    pub fn has_room(&self) -> bool {
        (self.has_video && self.video.has_room()) || (self.has_audio && self.audio.has_room())
    }
}

/// What the decode loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Work {
    Stop,
    Seek(i64),
    Read,
    Idle,
}

/// The pair of frame queues plus the control state shared with the decode
/// thread.
#[derive(Debug)]
pub struct AvQueue {
    state: Mutex<QueueState>,
    condvar: Condvar,
}

impl AvQueue {
    pub(crate) fn new(video_watermark: usize, audio_watermark: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                video: FrameQueue::new(video_watermark),
                audio: FrameQueue::new(audio_watermark),
                seek: SeekRequest::default(),
                running: true,
                state: PipelineState::Probing,
                has_video: false,
                has_audio: false,
            }),
            condvar: Condvar::new(),
        }
    }

    /// Lock the shared state to read several fields consistently.
    pub fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock()
    }

    pub fn pop_video(&self) -> Option<DecodedVideoFrame> {
        let frame = self.state.lock().video.pop().map(|(_, frame)| frame);
        self.condvar.notify_one();
        frame
    }

    pub fn pop_audio(&self) -> Option<DecodedAudioFrame> {
        let frame = self.state.lock().audio.pop().map(|(_, frame)| frame);
        self.condvar.notify_one();
        frame
    }

    /// Drop every video frame older than `timestamp` and return the newest
    /// dropped one. A player calls this with its clock to skip late frames.
    pub fn pop_video_before(&self, timestamp: i64) -> Option<DecodedVideoFrame> {
        let frame = self
            .state
            .lock()
            .video
            .pop_before(timestamp)
            .map(|(_, frame)| frame);
        self.condvar.notify_one();
        frame
    }

    /// Pop up to `count` audio frames at once.
    pub fn pop_audio_frames(&self, count: usize) -> Vec<DecodedAudioFrame> {
        let frames = self
            .state
            .lock()
            .audio
            .pop_up_to(count)
            .into_iter()
            .map(|(_, frame)| frame)
            .collect();
        self.condvar.notify_one();
        frames
    }

    pub fn video_len(&self) -> usize {
        self.state.lock().video.len()
    }

    pub fn audio_len(&self) -> usize {
        self.state.lock().audio.len()
    }

    pub fn state(&self) -> PipelineState {
        self.state.lock().state
    }

    pub(crate) fn push_video(&self, frame: DecodedVideoFrame) {
        log::trace!("Queueing video frame at {}", frame.timestamp);
        self.state.lock().video.push(frame.timestamp, frame);
    }

    pub(crate) fn push_audio(&self, frame: DecodedAudioFrame) {
        log::trace!("Queueing audio frame at {}", frame.timestamp);
        self.state.lock().audio.push(frame.timestamp, frame);
    }

    pub(crate) fn request_seek(&self, timestamp: i64) {
        self.state.lock().seek.set(timestamp);
        self.condvar.notify_one();
    }

    pub(crate) fn stop(&self) {
        self.state.lock().running = false;
        self.condvar.notify_one();
    }

    pub(crate) fn set_state(&self, state: PipelineState) {
        self.state.lock().state = state;
    }

    /// Final transition once the decode thread is gone.
    pub(crate) fn mark_stopped(&self) {
        let mut state = self.state.lock();
        state.running = false;
        state.state = PipelineState::Stopped;
        drop(state);
        self.condvar.notify_all();
    }

    pub(crate) fn configure_streams(&self, has_video: bool, has_audio: bool) {
        let mut state = self.state.lock();
        state.has_video = has_video;
        state.has_audio = has_audio;
    }

    /// `true` when the decode thread should abandon what it is doing, either
    /// because it was stopped or because a new seek arrived.
    pub(crate) fn interrupted(&self) -> bool {
        let state = self.state.lock();
        !state.running || state.seek.pending().is_some()
    }

    /// Block until there is something to do or `timeout` elapses.
    ///
    /// A pending seek is taken and both queues are cleared before returning,
    /// under the same lock, so no stale frame survives it.
    pub(crate) fn wait_for_work(&self, timeout: Duration) -> Work {
        let mut state = self.state.lock();
        let mut timed_out = false;
        loop {
            if !state.running {
                return Work::Stop;
            }
            if let Some(target) = state.seek.take() {
                state.video.clear();
                state.audio.clear();
                state.state = PipelineState::Seeking;
                return Work::Seek(target);
            }
            if state.state != PipelineState::Drained && state.has_room() {
                return Work::Read;
            }
            if timed_out {
                return Work::Idle;
            }
            timed_out = self.condvar.wait_for(&mut state, timeout).timed_out();
        }
    }
}
