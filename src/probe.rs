//! Stream selection and codec resolution.
//!
//! [`probe_streams`] picks the first video and the first audio stream of a
//! container, opens a decoder for each and derives the [`IoInfo`] published
//! to consumers. It runs once, on the decode thread, before streaming.

use crate::{
    container::{Container, MediaKind, StreamDescriptor, StreamParameters},
    error::PipelineError,
    metadata::{AudioInfo, IoInfo, VideoInfo},
    time_base::{NO_TIMESTAMP, TimeBase},
};

/// A selected stream and its opened decoder.
#[derive(Debug)]
pub struct StreamHandle<C> {
    index: usize,
    time_base: TimeBase,
    codec: C,
}

impl<C> StreamHandle<C> {
    pub(crate) fn new(index: usize, time_base: TimeBase, codec: C) -> Self {
        Self {
            index,
            time_base,
            codec,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Native time base of the stream.
    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn codec_mut(&mut self) -> &mut C {
        &mut self.codec
    }
}

/// Result of a successful probe.
pub struct ProbedStreams<C: Container> {
    pub video: Option<StreamHandle<C::Video>>,
    pub audio: Option<StreamHandle<C::Audio>>,
    pub info: IoInfo,
}

/// Select streams, open their decoders and derive the session metadata.
///
/// `source` only labels the result. All durations in the returned
/// [`IoInfo`] are in `time_base`.
///
/// # Errors
///
/// - [`PipelineError::NoStreams`] if there is neither a video nor an audio stream.
/// - [`PipelineError::UnsupportedFormat`] if the audio sample format cannot be presented.
/// - Whatever the container reports when a decoder cannot be opened, normally
///   [`PipelineError::CodecNotFound`].
pub fn probe_streams<C: Container>(
    container: &mut C,
    source: &str,
    time_base: TimeBase,
) -> Result<ProbedStreams<C>, PipelineError> {
    let streams = container.streams();
    let video_stream = streams.iter().find(|stream| stream.kind() == MediaKind::Video);
    let audio_stream = streams.iter().find(|stream| stream.kind() == MediaKind::Audio);

    if video_stream.is_none() && audio_stream.is_none() {
        return Err(PipelineError::NoStreams);
    }

    let container_duration = container.duration();

    let mut video = None;
    let mut video_info = None;
    if let Some(stream) = video_stream {
        log::debug!("Selected video stream {} ({})", stream.index, stream.codec_name);
        let codec = container.open_video_codec(stream)?;
        if let StreamParameters::Video {
            width,
            height,
            frame_rate,
        } = stream.parameters
        {
            video_info = Some(VideoInfo {
                stream_index: stream.index,
                width,
                height,
                frame_rate,
                duration: resolve_duration(stream, container_duration, time_base),
                codec: stream.codec_name.clone(),
            });
        }
        video = Some(StreamHandle::new(stream.index, stream.time_base, codec));
    }

    let mut audio = None;
    let mut audio_info = None;
    if let Some(stream) = audio_stream {
        log::debug!("Selected audio stream {} ({})", stream.index, stream.codec_name);
        if let StreamParameters::Audio {
            channels,
            sample_rate,
            sample_format,
            format_name,
        } = &stream.parameters
        {
            let format = sample_format
                .ok_or_else(|| PipelineError::UnsupportedFormat(format_name.clone()))?;
            audio_info = Some(AudioInfo {
                stream_index: stream.index,
                channels: *channels,
                sample_type: format.sample_type,
                source_format: format_name.clone(),
                sample_rate: *sample_rate,
                duration: resolve_duration(stream, container_duration, time_base),
                codec: stream.codec_name.clone(),
            });
        }
        let codec = container.open_audio_codec(stream)?;
        audio = Some(StreamHandle::new(stream.index, stream.time_base, codec));
    }

    let info = IoInfo {
        source: source.to_string(),
        time_base,
        video: video_info,
        audio: audio_info,
    };

    log::info!(
        "Probed {source}: video={}, audio={}, duration={:.3}s",
        describe_video(info.video.as_ref()),
        describe_audio(info.audio.as_ref()),
        time_base.to_seconds(info.duration()),
    );

    Ok(ProbedStreams { video, audio, info })
}

/// Stream duration in `time_base`, falling back to the container duration
/// and then to zero.
fn resolve_duration(
    stream: &StreamDescriptor,
    container_duration: Option<i64>,
    time_base: TimeBase,
) -> i64 {
    if let Some(duration) = stream.duration.filter(|d| *d != NO_TIMESTAMP && *d >= 0) {
        return TimeBase::rescale(duration, stream.time_base, time_base);
    }
    container_duration
        .filter(|d| *d >= 0)
        .map(|d| TimeBase::rescale(d, TimeBase::MICROSECONDS, time_base))
        .unwrap_or(0)
}

fn describe_video(video: Option<&VideoInfo>) -> String {
    video.map_or_else(
        || "none".to_string(),
        |video| format!("{}x{}@{}", video.width, video.height, video.frame_rate),
    )
}

fn describe_audio(audio: Option<&AudioInfo>) -> String {
    audio.map_or_else(
        || "none".to_string(),
        |audio| format!("{}ch/{}Hz/{}", audio.channels, audio.sample_rate, audio.source_format),
    )
}
