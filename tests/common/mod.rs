//! Synthetic in-memory media shared by the integration tests.
//!
//! `SyntheticMedia` describes a container: its stream table and its packets
//! in container order. `SyntheticContainer` serves those packets through the
//! `Container` trait, and its codecs turn each packet into exactly one frame
//! (after an optional decoder delay) whose payload encodes the packet's PTS.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

use avqueue::{
    AudioCodec, AudioPlanes, Codec, Container, FrameRate, Io, IoOptions, MediaKind, NO_TIMESTAMP,
    PipelineError, SampleFormat, SampleLayout, SampleType, StreamDescriptor, StreamParameters,
    TimeBase, VideoCodec,
};

pub const VIDEO_WIDTH: u32 = 4;
pub const VIDEO_HEIGHT: u32 = 2;
pub const AUDIO_SAMPLES_PER_CHANNEL: usize = 4;
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;
/// Audio packets are spaced 40 ms apart in a millisecond time base.
pub const AUDIO_FRAME_MILLISECONDS: i64 = 40;

#[derive(Debug, Clone)]
pub struct SyntheticPacket {
    pub stream: usize,
    /// Position used for seeking, in the stream's native time base.
    pub pts: i64,
    /// PTS reported by the decoded frame.
    pub frame_pts: i64,
    pub keyframe: bool,
    pub corrupt: bool,
}

#[derive(Debug, Clone)]
pub struct SyntheticMedia {
    pub streams: Vec<StreamDescriptor>,
    pub packets: Vec<SyntheticPacket>,
    pub container_duration: Option<i64>,
    pub video_delay: usize,
    pub missing_codec: Option<MediaKind>,
    pub read_delay: Option<Duration>,
    pub panic_at: Option<usize>,
}

pub fn s16_planar() -> SampleFormat {
    SampleFormat::new(SampleType::S16, SampleLayout::Planar)
}

fn video_descriptor(index: usize, frames: i64, fps: i32) -> StreamDescriptor {
    StreamDescriptor {
        index,
        time_base: TimeBase::per_second(fps).expect("positive frame rate"),
        duration: Some(frames),
        codec_name: "synthetic-video".to_string(),
        parameters: StreamParameters::Video {
            width: VIDEO_WIDTH,
            height: VIDEO_HEIGHT,
            frame_rate: FrameRate::new(fps, 1),
        },
    }
}

fn audio_descriptor(
    index: usize,
    frames: i64,
    channels: u16,
    format: SampleFormat,
) -> StreamDescriptor {
    StreamDescriptor {
        index,
        time_base: TimeBase::per_second(1000).expect("positive time base"),
        duration: Some(frames * AUDIO_FRAME_MILLISECONDS),
        codec_name: "synthetic-audio".to_string(),
        parameters: StreamParameters::Audio {
            channels,
            sample_rate: AUDIO_SAMPLE_RATE,
            sample_format: Some(format),
            format_name: format.to_string(),
        },
    }
}

fn packet(stream: usize, pts: i64) -> SyntheticPacket {
    SyntheticPacket {
        stream,
        pts,
        frame_pts: pts,
        keyframe: true,
        corrupt: false,
    }
}

impl SyntheticMedia {
    fn with_streams(streams: Vec<StreamDescriptor>, packets: Vec<SyntheticPacket>) -> Self {
        Self {
            streams,
            packets,
            container_duration: None,
            video_delay: 0,
            missing_codec: None,
            read_delay: None,
            panic_at: None,
        }
    }

    /// A video-only container with `frames` frames at `fps`, PTS 0, 1, 2, ...
    /// in a `1/fps` time base. Every frame is a keyframe.
    pub fn video(frames: i64, fps: i32) -> Self {
        let packets = (0..frames).map(|pts| packet(0, pts)).collect();
        Self::with_streams(vec![video_descriptor(0, frames, fps)], packets)
    }

    /// An audio-only container with `frames` frames spaced 40 ms apart.
    pub fn audio(frames: i64, channels: u16, format: SampleFormat) -> Self {
        let packets = (0..frames)
            .map(|frame| packet(0, frame * AUDIO_FRAME_MILLISECONDS))
            .collect();
        Self::with_streams(vec![audio_descriptor(0, frames, channels, format)], packets)
    }

    /// Video at `fps` plus stereo planar S16 audio covering the same span,
    /// interleaved in presentation order.
    pub fn audio_video(video_frames: i64, fps: i32) -> Self {
        let span_ms = video_frames * 1000 / fps as i64;
        let audio_frames = span_ms / AUDIO_FRAME_MILLISECONDS;

        let mut packets = Vec::new();
        let mut audio = 0;
        for video in 0..video_frames {
            let video_ms = video * 1000 / fps as i64;
            while audio < audio_frames && audio * AUDIO_FRAME_MILLISECONDS <= video_ms {
                packets.push(packet(1, audio * AUDIO_FRAME_MILLISECONDS));
                audio += 1;
            }
            packets.push(packet(0, video));
        }
        for rest in audio..audio_frames {
            packets.push(packet(1, rest * AUDIO_FRAME_MILLISECONDS));
        }

        Self::with_streams(
            vec![
                video_descriptor(0, video_frames, fps),
                audio_descriptor(1, audio_frames, 2, s16_planar()),
            ],
            packets,
        )
    }

    /// A container whose only stream is neither audio nor video.
    pub fn empty() -> Self {
        let data = StreamDescriptor {
            index: 0,
            time_base: TimeBase::MICROSECONDS,
            duration: None,
            codec_name: "bin_data".to_string(),
            parameters: StreamParameters::Other,
        };
        Self::with_streams(vec![data], Vec::new())
    }

    pub fn with_video_delay(mut self, frames: usize) -> Self {
        self.video_delay = frames;
        self
    }

    /// Only every `interval`-th video packet is a keyframe.
    pub fn with_keyframe_interval(mut self, interval: i64) -> Self {
        let video = self.stream_index(MediaKind::Video);
        for packet in self.packets.iter_mut().filter(|p| Some(p.stream) == video) {
            packet.keyframe = packet.pts % interval == 0;
        }
        self
    }

    /// The packet of `kind` at `pts` is rejected by the codec.
    pub fn with_corrupt_packet(mut self, kind: MediaKind, pts: i64) -> Self {
        if let Some(packet) = self.packet_mut(kind, pts) {
            packet.corrupt = true;
        }
        self
    }

    /// The frame decoded from the packet of `kind` at `pts` carries no PTS.
    pub fn with_untimed_frame(mut self, kind: MediaKind, pts: i64) -> Self {
        if let Some(packet) = self.packet_mut(kind, pts) {
            packet.frame_pts = NO_TIMESTAMP;
        }
        self
    }

    pub fn with_missing_codec(mut self, kind: MediaKind) -> Self {
        self.missing_codec = Some(kind);
        self
    }

    /// Declare the audio stream in a 64-bit float format.
    pub fn with_unsupported_audio(mut self) -> Self {
        for stream in &mut self.streams {
            if let StreamParameters::Audio {
                sample_format,
                format_name,
                ..
            } = &mut stream.parameters
            {
                *sample_format = None;
                *format_name = "dbl".to_string();
            }
        }
        self
    }

    /// Remove every stream-level duration.
    pub fn without_stream_durations(mut self) -> Self {
        for stream in &mut self.streams {
            stream.duration = None;
        }
        self
    }

    pub fn with_container_duration(mut self, microseconds: i64) -> Self {
        self.container_duration = Some(microseconds);
        self
    }

    /// Sleep this long on every packet read.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Panic instead of returning the packet at container position `position`.
    pub fn with_read_panic(mut self, position: usize) -> Self {
        self.panic_at = Some(position);
        self
    }

    fn stream_index(&self, kind: MediaKind) -> Option<usize> {
        self.streams
            .iter()
            .find(|stream| stream.kind() == kind)
            .map(|stream| stream.index)
    }

    fn packet_mut(&mut self, kind: MediaKind, pts: i64) -> Option<&mut SyntheticPacket> {
        let index = self.stream_index(kind)?;
        self.packets
            .iter_mut()
            .find(|packet| packet.stream == index && packet.pts == pts)
    }
}

pub struct SyntheticContainer {
    media: SyntheticMedia,
    position: usize,
}

impl SyntheticContainer {
    pub fn new(media: SyntheticMedia) -> Self {
        Self { media, position: 0 }
    }

    fn missing(&self, kind: MediaKind) -> Result<(), PipelineError> {
        if self.media.missing_codec == Some(kind) {
            return Err(PipelineError::CodecNotFound {
                kind,
                reason: "no synthetic decoder registered".to_string(),
            });
        }
        Ok(())
    }
}

impl Container for SyntheticContainer {
    type Packet = SyntheticPacket;
    type Video = SyntheticVideoCodec;
    type Audio = SyntheticAudioCodec;

    fn streams(&self) -> Vec<StreamDescriptor> {
        self.media.streams.clone()
    }

    fn duration(&self) -> Option<i64> {
        self.media.container_duration
    }

    fn read_packet(&mut self) -> Result<Option<(usize, SyntheticPacket)>, PipelineError> {
        if let Some(delay) = self.media.read_delay {
            thread::sleep(delay);
        }
        if self.media.panic_at == Some(self.position) {
            panic!("synthetic container failed at packet {}", self.position);
        }
        let Some(packet) = self.media.packets.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;
        Ok(Some((packet.stream, packet.clone())))
    }

    fn seek(&mut self, stream_index: usize, timestamp: i64) -> Result<(), PipelineError> {
        self.position = self
            .media
            .packets
            .iter()
            .rposition(|packet| {
                packet.stream == stream_index && packet.keyframe && packet.pts <= timestamp
            })
            .unwrap_or(0);
        Ok(())
    }

    fn open_video_codec(
        &mut self,
        stream: &StreamDescriptor,
    ) -> Result<SyntheticVideoCodec, PipelineError> {
        self.missing(MediaKind::Video)?;
        let StreamParameters::Video { width, height, .. } = stream.parameters else {
            return Err(PipelineError::CodecNotFound {
                kind: MediaKind::Video,
                reason: "not a video stream".to_string(),
            });
        };
        Ok(SyntheticVideoCodec {
            delay: self.media.video_delay,
            pending: VecDeque::new(),
            ready: VecDeque::new(),
            current: 0,
            width,
            height,
        })
    }

    fn open_audio_codec(
        &mut self,
        stream: &StreamDescriptor,
    ) -> Result<SyntheticAudioCodec, PipelineError> {
        self.missing(MediaKind::Audio)?;
        let StreamParameters::Audio {
            channels,
            sample_format: Some(format),
            ..
        } = stream.parameters
        else {
            return Err(PipelineError::CodecNotFound {
                kind: MediaKind::Audio,
                reason: "not a decodable audio stream".to_string(),
            });
        };
        Ok(SyntheticAudioCodec {
            format,
            channels,
            ready: VecDeque::new(),
            planes: Vec::new(),
        })
    }
}

fn rejected(kind: MediaKind, packet: &SyntheticPacket) -> PipelineError {
    PipelineError::PacketDecode {
        kind,
        reason: format!("corrupt packet at {}", packet.pts),
    }
}

/// Emits one frame per packet, holding back `delay` frames until more input
/// or end of stream arrives.
pub struct SyntheticVideoCodec {
    delay: usize,
    pending: VecDeque<i64>,
    ready: VecDeque<i64>,
    current: i64,
    width: u32,
    height: u32,
}

impl Codec for SyntheticVideoCodec {
    type Packet = SyntheticPacket;

    fn send_packet(&mut self, packet: Option<&SyntheticPacket>) -> Result<(), PipelineError> {
        match packet {
            Some(packet) if packet.corrupt => return Err(rejected(MediaKind::Video, packet)),
            Some(packet) => {
                self.pending.push_back(packet.frame_pts);
                while self.pending.len() > self.delay {
                    if let Some(pts) = self.pending.pop_front() {
                        self.ready.push_back(pts);
                    }
                }
            }
            None => self.ready.extend(self.pending.drain(..)),
        }
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<Option<i64>, PipelineError> {
        Ok(self.ready.pop_front().inspect(|pts| self.current = *pts))
    }

    fn flush(&mut self) {
        self.pending.clear();
        self.ready.clear();
    }
}

impl VideoCodec for SyntheticVideoCodec {
    /// Every byte of the frame is the low byte of its PTS.
    fn convert_frame(&mut self) -> Result<Vec<u8>, PipelineError> {
        let size = (self.width * self.height * 4) as usize;
        Ok(vec![self.current as u8; size])
    }
}

/// Produces frames whose sample `i` of channel `c` is `c * 1000 + i`
/// (`c * 10 + i` for U8).
pub struct SyntheticAudioCodec {
    format: SampleFormat,
    channels: u16,
    ready: VecDeque<i64>,
    planes: Vec<Vec<u8>>,
}

fn sample_bytes(sample_type: SampleType, channel: usize, index: usize) -> Vec<u8> {
    match sample_type {
        SampleType::U8 => vec![(channel * 10 + index) as u8],
        SampleType::S16 => ((channel * 1000 + index) as i16).to_ne_bytes().to_vec(),
        SampleType::S32 => ((channel * 1000 + index) as i32).to_ne_bytes().to_vec(),
        SampleType::F32 => ((channel * 1000 + index) as f32).to_ne_bytes().to_vec(),
    }
}

impl SyntheticAudioCodec {
    fn build_planes(&mut self) {
        let channels = self.channels as usize;
        let sample_type = self.format.sample_type;
        self.planes = match self.format.layout {
            SampleLayout::Planar => (0..channels)
                .map(|channel| {
                    (0..AUDIO_SAMPLES_PER_CHANNEL)
                        .flat_map(|index| sample_bytes(sample_type, channel, index))
                        .collect()
                })
                .collect(),
            SampleLayout::Interleaved => vec![
                (0..AUDIO_SAMPLES_PER_CHANNEL)
                    .flat_map(|index| {
                        (0..channels)
                            .flat_map(move |channel| sample_bytes(sample_type, channel, index))
                    })
                    .collect(),
            ],
        };
    }
}

impl Codec for SyntheticAudioCodec {
    type Packet = SyntheticPacket;

    fn send_packet(&mut self, packet: Option<&SyntheticPacket>) -> Result<(), PipelineError> {
        match packet {
            Some(packet) if packet.corrupt => Err(rejected(MediaKind::Audio, packet)),
            Some(packet) => {
                self.ready.push_back(packet.frame_pts);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn receive_frame(&mut self) -> Result<Option<i64>, PipelineError> {
        let Some(pts) = self.ready.pop_front() else {
            return Ok(None);
        };
        self.build_planes();
        Ok(Some(pts))
    }

    fn flush(&mut self) {
        self.ready.clear();
    }
}

impl AudioCodec for SyntheticAudioCodec {
    fn frame_planes(&self) -> AudioPlanes<'_> {
        AudioPlanes {
            format: self.format,
            channels: self.channels,
            samples_per_channel: AUDIO_SAMPLES_PER_CHANNEL,
            planes: self.planes.iter().map(Vec::as_slice).collect(),
        }
    }
}

/// Start a pipeline over `media`.
pub fn open(media: SyntheticMedia, options: IoOptions) -> Result<Io, PipelineError> {
    Io::with_container("synthetic", options, move || Ok(SyntheticContainer::new(media)))
}

/// Poll `condition` every millisecond until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    loop {
        if condition() {
            return true;
        }
        if started.elapsed() > timeout {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

pub const PATIENCE: Duration = Duration::from_secs(5);

/// Block until the decode thread has taken the pending seek and cleared
/// the queues.
pub fn wait_for_seek(io: &Io) {
    assert!(
        wait_until(PATIENCE, || io.queue().lock().pending_seek().is_none()),
        "seek was never picked up"
    );
}

/// Pop video frame timestamps until the pipeline is drained.
pub fn drain_video(io: &Io) -> Vec<i64> {
    let mut timestamps = Vec::new();
    let finished = wait_until(PATIENCE, || {
        while let Some(frame) = io.queue().pop_video() {
            timestamps.push(frame.timestamp);
        }
        io.state() == avqueue::PipelineState::Drained && io.queue().video_len() == 0
    });
    assert!(finished, "pipeline never drained (state {})", io.state());
    timestamps
}
