//! Video and audio frame decoders.
//!
//! Each decoder owns one [`StreamHandle`] and turns compressed packets into
//! queued frames: submit the packet, drain every frame the codec has ready,
//! rescale each timestamp into the session time base, convert the payload
//! into presentation form and push it onto the shared [`AvQueue`].
//!
//! Codec failures never escape a decode call. They are recorded in
//! [`Diagnostics`] and the call reports that no frame was produced.

use crate::{
    container::{AudioCodec, MediaKind, VideoCodec},
    diagnostics::Diagnostics,
    frame::{AudioFrameInfo, DecodedAudioFrame, DecodedVideoFrame},
    metadata::{AudioInfo, VideoInfo},
    probe::StreamHandle,
    queue::AvQueue,
    sample,
    time_base::{NO_TIMESTAMP, TimeBase},
};

/// How decoded frames are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Convert and queue every frame.
    Normal,
    /// Discard frames before `target` without converting them. Frames at or
    /// after `target` are converted and queued as usual.
    Seeking { target: i64 },
}

impl DecodeMode {
    fn skips(&self, timestamp: i64) -> bool {
        matches!(*self, DecodeMode::Seeking { target } if timestamp < target)
    }
}

/// Rescales native timestamps, reusing the previous one for frames that
/// carry none.
#[derive(Debug)]
struct TimestampTracker {
    native: TimeBase,
    pipeline: TimeBase,
    last: Option<i64>,
}

impl TimestampTracker {
    fn new(native: TimeBase, pipeline: TimeBase) -> Self {
        Self {
            native,
            pipeline,
            last: None,
        }
    }

    fn resolve(&mut self, pts: i64) -> i64 {
        let timestamp = if pts == NO_TIMESTAMP {
            self.last.unwrap_or(0)
        } else {
            TimeBase::rescale(pts, self.native, self.pipeline)
        };
        self.last = Some(timestamp);
        timestamp
    }

    fn reset(&mut self) {
        self.last = None;
    }
}

/// Decodes the selected video stream into RGBA frames.
#[derive(Debug)]
pub struct VideoDecoder<C> {
    stream: StreamHandle<C>,
    timestamps: TimestampTracker,
    width: u32,
    height: u32,
}

impl<C: VideoCodec> VideoDecoder<C> {
    pub fn new(stream: StreamHandle<C>, info: &VideoInfo, time_base: TimeBase) -> Self {
        let timestamps = TimestampTracker::new(stream.time_base(), time_base);
        Self {
            stream,
            timestamps,
            width: info.width,
            height: info.height,
        }
    }

    pub fn stream_index(&self) -> usize {
        self.stream.index()
    }

    pub fn stream(&self) -> &StreamHandle<C> {
        &self.stream
    }

    /// Submit `packet` (`None` to drain at end of stream) and queue every
    /// frame the codec produces.
    ///
    /// Returns the timestamp of the last frame decoded by this call, queued
    /// or not, or `None` if no frame came out.
    pub fn decode(
        &mut self,
        packet: Option<&C::Packet>,
        mode: DecodeMode,
        queue: &AvQueue,
        diagnostics: &Diagnostics,
    ) -> Option<i64> {
        let codec = self.stream.codec_mut();
        if let Err(error) = codec.send_packet(packet) {
            diagnostics.record_decode_failure(MediaKind::Video, error);
            return None;
        }

        let mut last = None;
        loop {
            let pts = match codec.receive_frame() {
                Ok(Some(pts)) => pts,
                Ok(None) => break,
                Err(error) => {
                    diagnostics.record_decode_failure(MediaKind::Video, error);
                    break;
                }
            };
            let timestamp = self.timestamps.resolve(pts);
            last = Some(timestamp);
            if mode.skips(timestamp) {
                log::trace!("Skipping video frame at {timestamp} while seeking");
                continue;
            }
            match codec.convert_frame() {
                Ok(data) => queue.push_video(DecodedVideoFrame {
                    timestamp,
                    width: self.width,
                    height: self.height,
                    data,
                }),
                Err(error) => diagnostics.record_decode_failure(MediaKind::Video, error),
            }
        }
        last
    }

    /// Discard buffered codec state after a container seek.
    pub fn flush(&mut self) {
        self.stream.codec_mut().flush();
        self.timestamps.reset();
    }
}

/// Decodes the selected audio stream into interleaved sample frames.
#[derive(Debug)]
pub struct AudioDecoder<C> {
    stream: StreamHandle<C>,
    timestamps: TimestampTracker,
    sample_rate: u32,
}

impl<C: AudioCodec> AudioDecoder<C> {
    pub fn new(stream: StreamHandle<C>, info: &AudioInfo, time_base: TimeBase) -> Self {
        let timestamps = TimestampTracker::new(stream.time_base(), time_base);
        Self {
            stream,
            timestamps,
            sample_rate: info.sample_rate,
        }
    }

    pub fn stream_index(&self) -> usize {
        self.stream.index()
    }

    pub fn stream(&self) -> &StreamHandle<C> {
        &self.stream
    }

    /// Audio counterpart of [`VideoDecoder::decode`]. Planar frames are
    /// interleaved before queuing.
    pub fn decode(
        &mut self,
        packet: Option<&C::Packet>,
        mode: DecodeMode,
        queue: &AvQueue,
        diagnostics: &Diagnostics,
    ) -> Option<i64> {
        let codec = self.stream.codec_mut();
        if let Err(error) = codec.send_packet(packet) {
            diagnostics.record_decode_failure(MediaKind::Audio, error);
            return None;
        }

        let mut last = None;
        loop {
            let pts = match codec.receive_frame() {
                Ok(Some(pts)) => pts,
                Ok(None) => break,
                Err(error) => {
                    diagnostics.record_decode_failure(MediaKind::Audio, error);
                    break;
                }
            };
            let timestamp = self.timestamps.resolve(pts);
            last = Some(timestamp);
            if mode.skips(timestamp) {
                log::trace!("Skipping audio frame at {timestamp} while seeking");
                continue;
            }
            let planes = codec.frame_planes();
            let info = AudioFrameInfo {
                channels: planes.channels,
                sample_type: planes.format.sample_type,
                sample_rate: self.sample_rate,
            };
            match sample::interleave(&planes) {
                Ok(samples) => queue.push_audio(DecodedAudioFrame {
                    timestamp,
                    info,
                    samples,
                }),
                Err(error) => diagnostics.record_decode_failure(MediaKind::Audio, error),
            }
        }
        last
    }

    pub fn flush(&mut self) {
        self.stream.codec_mut().flush();
        self.timestamps.reset();
    }
}
