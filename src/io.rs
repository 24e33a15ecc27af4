//! The decode thread and its owner.
//!
//! [`Io`] opens a container on a dedicated thread, probes it, and then keeps
//! the shared [`AvQueue`] topped up until it is dropped. Construction blocks
//! only until probing finishes; probing errors are returned to the caller.
//!
//! # Example
//!
//! ```no_run
//! use avqueue::{Io, IoOptions};
//!
//! let io = Io::open("input.mp4", IoOptions::default())?;
//! println!("{:?}", io.info().video);
//!
//! // Jump to the two second mark (default time base is microseconds).
//! io.seek(2_000_000);
//! # Ok::<(), avqueue::PipelineError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Sender, bounded};

use crate::{
    configuration::IoOptions,
    container::{Container, MediaKind},
    decode::{AudioDecoder, DecodeMode, VideoDecoder},
    diagnostics::Diagnostics,
    error::PipelineError,
    ffmpeg::FfmpegContainer,
    metadata::IoInfo,
    probe::{ProbedStreams, probe_streams},
    queue::{AvQueue, PipelineState, Work},
    time_base::TimeBase,
};

/// Consecutive read failures tolerated before the container is treated as
/// exhausted.
const MAX_CONSECUTIVE_READ_FAILURES: u32 = 8;

/// Owner of a running decode pipeline.
///
/// Dropping an `Io` stops the decode thread and joins it. Shutdown latency is
/// bounded by the configured wait timeout plus one packet decode.
pub struct Io {
    queue: Arc<AvQueue>,
    diagnostics: Arc<Diagnostics>,
    info: IoInfo,
    thread: Option<JoinHandle<()>>,
}

impl Io {
    /// Open a media file with FFmpeg and start decoding it.
    ///
    /// # Errors
    ///
    /// Returns the probing error if the file cannot be opened, has no usable
    /// stream, or uses an unsupported codec or sample format.
    pub fn open<P: AsRef<Path>>(path: P, options: IoOptions) -> Result<Self, PipelineError> {
        let path = path.as_ref().to_path_buf();
        log::debug!("Opening media file: {}", path.display());
        let source = path.display().to_string();
        Self::with_container(source, options, move || FfmpegContainer::open(&path))
    }

    /// Start a pipeline over any [`Container`].
    ///
    /// `opener` runs on the decode thread, so the container itself never
    /// crosses threads. `source` only labels the session in logs and
    /// [`IoInfo::source`].
    pub fn with_container<C, F>(
        source: impl Into<String>,
        options: IoOptions,
        opener: F,
    ) -> Result<Self, PipelineError>
    where
        C: Container + 'static,
        F: FnOnce() -> Result<C, PipelineError> + Send + 'static,
    {
        let source = source.into();
        let queue = Arc::new(AvQueue::new(options.video_watermark, options.audio_watermark));
        let diagnostics = Arc::new(Diagnostics::new(options.diagnostics_capacity));
        let (sender, receiver) = bounded(1);

        let thread = {
            let queue = Arc::clone(&queue);
            let diagnostics = Arc::clone(&diagnostics);
            thread::Builder::new()
                .name("avqueue-decode".to_string())
                .spawn(move || decode_thread(source, options, opener, queue, diagnostics, sender))
                .map_err(|error| PipelineError::ThreadStart(error.to_string()))?
        };

        match receiver.recv() {
            Ok(Ok(info)) => Ok(Self {
                queue,
                diagnostics,
                info,
                thread: Some(thread),
            }),
            Ok(Err(error)) => {
                let _ = thread.join();
                Err(error)
            }
            Err(_) => {
                let _ = thread.join();
                Err(PipelineError::DecodeThreadExited)
            }
        }
    }

    /// Format metadata resolved during probing.
    pub fn info(&self) -> &IoInfo {
        &self.info
    }

    /// The shared frame queues.
    pub fn queue(&self) -> &AvQueue {
        &self.queue
    }

    /// A clonable handle to the queues, for consumers on other threads.
    pub fn queue_handle(&self) -> Arc<AvQueue> {
        Arc::clone(&self.queue)
    }

    /// Request a seek to `timestamp` in the session time base.
    ///
    /// The request is asynchronous. Both queues are cleared when the decode
    /// thread picks it up, and streaming resumes at the first frame at or
    /// after `timestamp`. A request that has not been picked up yet is
    /// replaced.
    pub fn seek(&self, timestamp: i64) {
        log::debug!("Seek requested to {timestamp}");
        self.queue.request_seek(timestamp);
    }

    pub fn state(&self) -> PipelineState {
        self.queue.state()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn time_base(&self) -> TimeBase {
        self.info.time_base
    }
}

impl Debug for Io {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Io")
            .field("source", &self.info.source)
            .field("state", &self.queue.state())
            .field("video_queued", &self.queue.video_len())
            .field("audio_queued", &self.queue.audio_len())
            .finish()
    }
}

impl Drop for Io {
    fn drop(&mut self) {
        self.queue.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("Decode thread panicked");
            }
        }
    }
}

fn decode_thread<C, F>(
    source: String,
    options: IoOptions,
    opener: F,
    queue: Arc<AvQueue>,
    diagnostics: Arc<Diagnostics>,
    startup: Sender<Result<IoInfo, PipelineError>>,
) where
    C: Container,
    F: FnOnce() -> Result<C, PipelineError>,
{
    let _stopped = StopOnExit(Arc::clone(&queue));
    let probed = opener().and_then(|mut container| {
        probe_streams(&mut container, &source, options.time_base).map(|probed| (container, probed))
    });

    match probed {
        Ok((container, probed)) => {
            queue.configure_streams(probed.video.is_some(), probed.audio.is_some());
            queue.set_state(PipelineState::Streaming);
            let info = probed.info.clone();
            let driver = Driver::new(container, probed, &options, queue, diagnostics);
            if startup.send(Ok(info)).is_err() {
                return;
            }
            driver.run();
        }
        Err(error) => {
            log::debug!("Probing {source} failed: {error}");
            let _ = startup.send(Err(error));
        }
    }
}

/// Moves the pipeline to [`PipelineState::Stopped`] however the decode
/// thread exits, unwinding included.
struct StopOnExit(Arc<AvQueue>);

impl Drop for StopOnExit {
    fn drop(&mut self) {
        if thread::panicking() {
            log::error!("Decode thread panicked, stopping pipeline");
        }
        self.0.mark_stopped();
    }
}

/// The primary stream is the one seeks are issued against and whose
/// timestamps decide when a seek has converged.
#[derive(Debug, Clone, Copy)]
struct PrimaryStream {
    kind: MediaKind,
    index: usize,
    time_base: TimeBase,
}

struct Driver<C: Container> {
    container: C,
    video: Option<VideoDecoder<C::Video>>,
    audio: Option<AudioDecoder<C::Audio>>,
    primary: Option<PrimaryStream>,
    queue: Arc<AvQueue>,
    diagnostics: Arc<Diagnostics>,
    time_base: TimeBase,
    wait_timeout: Duration,
    read_failures: u32,
}

impl<C: Container> Driver<C> {
    fn new(
        container: C,
        probed: ProbedStreams<C>,
        options: &IoOptions,
        queue: Arc<AvQueue>,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        let time_base = options.time_base;
        let ProbedStreams { video, audio, info } = probed;

        let video = video
            .zip(info.video.as_ref())
            .map(|(stream, video_info)| VideoDecoder::new(stream, video_info, time_base));
        let audio = audio
            .zip(info.audio.as_ref())
            .map(|(stream, audio_info)| AudioDecoder::new(stream, audio_info, time_base));

        let primary = match (&video, &audio) {
            (Some(video), _) => Some(PrimaryStream {
                kind: MediaKind::Video,
                index: video.stream_index(),
                time_base: video.stream().time_base(),
            }),
            (None, Some(audio)) => Some(PrimaryStream {
                kind: MediaKind::Audio,
                index: audio.stream_index(),
                time_base: audio.stream().time_base(),
            }),
            (None, None) => None,
        };

        Self {
            container,
            video,
            audio,
            primary,
            queue,
            diagnostics,
            time_base,
            wait_timeout: options.wait_timeout,
            read_failures: 0,
        }
    }

    fn run(mut self) {
        log::debug!("Decode loop started");
        loop {
            match self.queue.wait_for_work(self.wait_timeout) {
                Work::Stop => break,
                Work::Seek(target) => self.seek(target),
                Work::Read => self.read_next(),
                Work::Idle => {}
            }
        }
        log::debug!("Decode loop stopped");
    }

    fn read_next(&mut self) {
        match self.container.read_packet() {
            Ok(Some((index, packet))) => {
                self.read_failures = 0;
                self.route(index, &packet, DecodeMode::Normal);
            }
            Ok(None) => self.finish_stream(DecodeMode::Normal),
            Err(error) => self.read_failed(error, DecodeMode::Normal),
        }
    }

    /// Records a read failure. Returns `true` once the container has been
    /// given up on and drained.
    fn read_failed(&mut self, error: PipelineError, mode: DecodeMode) -> bool {
        self.diagnostics.record(error);
        self.read_failures += 1;
        if self.read_failures > MAX_CONSECUTIVE_READ_FAILURES {
            log::warn!("Giving up after {} consecutive read failures", self.read_failures);
            self.finish_stream(mode);
            return true;
        }
        false
    }

    /// Send a packet to the decoder of its stream. Packets of unselected
    /// streams are ignored.
    fn route(
        &mut self,
        index: usize,
        packet: &C::Packet,
        mode: DecodeMode,
    ) -> Option<(MediaKind, i64)> {
        if let Some(video) = self.video.as_mut().filter(|video| video.stream_index() == index) {
            return video
                .decode(Some(packet), mode, &self.queue, &self.diagnostics)
                .map(|timestamp| (MediaKind::Video, timestamp));
        }
        if let Some(audio) = self.audio.as_mut().filter(|audio| audio.stream_index() == index) {
            return audio
                .decode(Some(packet), mode, &self.queue, &self.diagnostics)
                .map(|timestamp| (MediaKind::Audio, timestamp));
        }
        None
    }

    /// Drain both decoders and park until a seek or shutdown.
    fn finish_stream(&mut self, mode: DecodeMode) {
        log::debug!("End of stream, flushing decoders");
        if let Some(video) = self.video.as_mut() {
            video.decode(None, mode, &self.queue, &self.diagnostics);
        }
        if let Some(audio) = self.audio.as_mut() {
            audio.decode(None, mode, &self.queue, &self.diagnostics);
        }
        self.queue.set_state(PipelineState::Drained);
    }

    fn seek(&mut self, target: i64) {
        let Some(primary) = self.primary else {
            return;
        };
        log::debug!("Seeking to {target} on {} stream {}", primary.kind, primary.index);

        let native = TimeBase::rescale(target, self.time_base, primary.time_base);
        if let Err(error) = self.container.seek(primary.index, native) {
            self.diagnostics.record(error);
        }
        if let Some(video) = self.video.as_mut() {
            video.flush();
        }
        if let Some(audio) = self.audio.as_mut() {
            audio.flush();
        }
        self.read_failures = 0;

        let mode = DecodeMode::Seeking { target };
        loop {
            // A newer seek or a shutdown is handled by the next wait.
            if self.queue.interrupted() {
                return;
            }
            match self.container.read_packet() {
                Ok(Some((index, packet))) => {
                    self.read_failures = 0;
                    let reached = self.route(index, &packet, mode).is_some_and(
                        |(kind, timestamp)| kind == primary.kind && timestamp >= target,
                    );
                    if reached {
                        break;
                    }
                }
                Ok(None) => {
                    log::debug!("Seek to {target} ran past end of stream");
                    self.finish_stream(mode);
                    return;
                }
                Err(error) => {
                    if self.read_failed(error, mode) {
                        return;
                    }
                }
            }
        }
        self.queue.set_state(PipelineState::Streaming);
    }
}
