//! Recoverable error reporting.
//!
//! Failures that do not end the session (a packet the codec rejects, a read
//! error, a failed container seek) are counted here and forwarded through a
//! bounded channel. When the channel is full the newest errors are dropped
//! and only counted, so a flood of bad packets cannot grow memory.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::{container::MediaKind, error::PipelineError};

/// Counters and a bounded error channel shared by the decode thread and the
/// consumer.
#[derive(Debug)]
pub struct Diagnostics {
    video_drops: AtomicU64,
    audio_drops: AtomicU64,
    container_errors: AtomicU64,
    overflow: AtomicU64,
    sender: Sender<PipelineError>,
    receiver: Receiver<PipelineError>,
}

impl Diagnostics {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            video_drops: AtomicU64::new(0),
            audio_drops: AtomicU64::new(0),
            container_errors: AtomicU64::new(0),
            overflow: AtomicU64::new(0),
            sender,
            receiver,
        }
    }

    /// Record a packet or frame of `kind` that produced no output.
    pub(crate) fn record_decode_failure(&self, kind: MediaKind, error: PipelineError) {
        log::warn!("Dropping {kind} packet: {error}");
        match kind {
            MediaKind::Video => self.video_drops.fetch_add(1, Ordering::Relaxed),
            MediaKind::Audio => self.audio_drops.fetch_add(1, Ordering::Relaxed),
            MediaKind::Other => 0,
        };
        self.publish(error);
    }

    /// Record a container-level failure such as a read or seek error.
    pub(crate) fn record(&self, error: PipelineError) {
        log::warn!("Recoverable {} error: {error}", error.subsystem());
        self.container_errors.fetch_add(1, Ordering::Relaxed);
        self.publish(error);
    }

    fn publish(&self, error: PipelineError) {
        if let Err(TrySendError::Full(_)) = self.sender.try_send(error) {
            self.overflow.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of dropped packets for `kind` since the session started.
    pub fn dropped_packets(&self, kind: MediaKind) -> u64 {
        match kind {
            MediaKind::Video => self.video_drops.load(Ordering::Relaxed),
            MediaKind::Audio => self.audio_drops.load(Ordering::Relaxed),
            MediaKind::Other => 0,
        }
    }

    /// Number of failed reads and seeks.
    pub fn container_errors(&self) -> u64 {
        self.container_errors.load(Ordering::Relaxed)
    }

    /// Number of errors counted but not retained because the channel was full.
    pub fn overflowed(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }

    /// Take the oldest retained error, if any.
    pub fn try_recv(&self) -> Option<PipelineError> {
        self.receiver.try_recv().ok()
    }

    /// Take every retained error.
    pub fn drain(&self) -> Vec<PipelineError> {
        self.receiver.try_iter().collect()
    }
}
