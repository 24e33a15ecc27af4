//! Audio sample types, channel layouts and conversions.
//!
//! Decoded audio reaches the pipeline in one of eight native formats (four
//! sample types, each interleaved or planar). [`interleave`] turns any of
//! them into the interleaved [`Samples`] buffer carried by
//! [`DecodedAudioFrame`](crate::DecodedAudioFrame) by looking the format up
//! in a static table instead of branching on it.
//!
//! # Example
//!
//! ```
//! use avqueue::sample::{planar_deinterleave, planar_interleave};
//!
//! // Two channels, three samples each.
//! let planar = [1, 2, 3, 10, 20, 30];
//! let interleaved = planar_interleave(&planar, 2);
//! assert_eq!(interleaved, vec![1, 10, 2, 20, 3, 30]);
//! assert_eq!(planar_deinterleave(&interleaved, 2), planar.to_vec());
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};

use ffmpeg_next::format::{Sample, sample::Type as SampleKind};

use crate::{
    container::{AudioPlanes, MediaKind},
    error::PipelineError,
};

/// Numeric type of a single audio sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    /// Unsigned 8-bit, silence at 128.
    U8,
    S16,
    S32,
    /// 32-bit float, nominal range -1.0 to 1.0.
    F32,
}

impl SampleType {
    /// Size of one sample in bytes.
    pub fn byte_count(self) -> usize {
        match self {
            SampleType::U8 => 1,
            SampleType::S16 => 2,
            SampleType::S32 | SampleType::F32 => 4,
        }
    }
}

impl Display for SampleType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            SampleType::U8 => "u8",
            SampleType::S16 => "s16",
            SampleType::S32 => "s32",
            SampleType::F32 => "f32",
        };
        write!(f, "{name}")
    }
}

/// How channels are arranged in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleLayout {
    /// One buffer, channels packed per sample frame.
    Interleaved,
    /// One buffer per channel.
    Planar,
}

/// A native decoder sample format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleFormat {
    pub sample_type: SampleType,
    pub layout: SampleLayout,
}

impl SampleFormat {
    pub const fn new(sample_type: SampleType, layout: SampleLayout) -> Self {
        Self {
            sample_type,
            layout,
        }
    }

    pub fn is_planar(&self) -> bool {
        self.layout == SampleLayout::Planar
    }

    /// Map an FFmpeg sample format. 64-bit formats have no presentation
    /// mapping and yield `None`.
    pub fn from_ffmpeg(sample: Sample) -> Option<Self> {
        let (sample_type, kind) = match sample {
            Sample::U8(kind) => (SampleType::U8, kind),
            Sample::I16(kind) => (SampleType::S16, kind),
            Sample::I32(kind) => (SampleType::S32, kind),
            Sample::F32(kind) => (SampleType::F32, kind),
            _ => return None,
        };
        let layout = match kind {
            SampleKind::Packed => SampleLayout::Interleaved,
            SampleKind::Planar => SampleLayout::Planar,
        };
        Some(Self::new(sample_type, layout))
    }
}

impl Display for SampleFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.layout {
            SampleLayout::Interleaved => write!(f, "{}", self.sample_type),
            SampleLayout::Planar => write!(f, "{}p", self.sample_type),
        }
    }
}

/// A typed buffer of interleaved audio samples.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    U8(Vec<u8>),
    S16(Vec<i16>),
    S32(Vec<i32>),
    F32(Vec<f32>),
}

impl Samples {
    /// Total number of samples across all channels.
    pub fn len(&self) -> usize {
        match self {
            Samples::U8(values) => values.len(),
            Samples::S16(values) => values.len(),
            Samples::S32(values) => values.len(),
            Samples::F32(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sample_type(&self) -> SampleType {
        match self {
            Samples::U8(_) => SampleType::U8,
            Samples::S16(_) => SampleType::S16,
            Samples::S32(_) => SampleType::S32,
            Samples::F32(_) => SampleType::F32,
        }
    }

    /// Convert every sample to `target`, scaling through the unit range.
    ///
    /// Integer results are rounded to nearest and clamped, so full-scale
    /// float input never wraps.
    pub fn convert(&self, target: SampleType) -> Samples {
        if self.sample_type() == target {
            return self.clone();
        }
        let unit: Vec<f64> = match self {
            Samples::U8(values) => values.iter().map(|&v| (v as f64 - 128.0) / 128.0).collect(),
            Samples::S16(values) => values.iter().map(|&v| v as f64 / 32_768.0).collect(),
            Samples::S32(values) => values.iter().map(|&v| v as f64 / 2_147_483_648.0).collect(),
            Samples::F32(values) => values.iter().map(|&v| v as f64).collect(),
        };
        match target {
            SampleType::U8 => Samples::U8(
                unit.iter()
                    .map(|v| (v * 128.0 + 128.0).round().clamp(0.0, 255.0) as u8)
                    .collect(),
            ),
            SampleType::S16 => Samples::S16(
                unit.iter()
                    .map(|v| (v * 32_768.0).round().clamp(-32_768.0, 32_767.0) as i16)
                    .collect(),
            ),
            SampleType::S32 => Samples::S32(
                unit.iter()
                    .map(|v| {
                        (v * 2_147_483_648.0)
                            .round()
                            .clamp(i32::MIN as f64, i32::MAX as f64) as i32
                    })
                    .collect(),
            ),
            SampleType::F32 => Samples::F32(unit.iter().map(|&v| v as f32).collect()),
        }
    }

    /// Split interleaved samples into consecutive per-channel runs.
    pub fn deinterleave(&self, channels: usize) -> Samples {
        match self {
            Samples::U8(values) => Samples::U8(planar_deinterleave(values, channels)),
            Samples::S16(values) => Samples::S16(planar_deinterleave(values, channels)),
            Samples::S32(values) => Samples::S32(planar_deinterleave(values, channels)),
            Samples::F32(values) => Samples::F32(planar_deinterleave(values, channels)),
        }
    }
}

/// Interleave channel-major samples (`ch0[0..k], ch1[0..k], ...`) into
/// frame-major order (`ch0[0], ch1[0], ..., ch0[1], ...`).
///
/// Trailing samples that do not fill a whole channel are ignored. Zero
/// channels yields an empty buffer.
pub fn planar_interleave<T: Copy>(planar: &[T], channels: usize) -> Vec<T> {
    if channels == 0 {
        return Vec::new();
    }
    let per_channel = planar.len() / channels;
    let mut interleaved = Vec::with_capacity(per_channel * channels);
    for sample in 0..per_channel {
        for channel in 0..channels {
            interleaved.push(planar[channel * per_channel + sample]);
        }
    }
    interleaved
}

/// Inverse of [`planar_interleave`].
pub fn planar_deinterleave<T: Copy>(interleaved: &[T], channels: usize) -> Vec<T> {
    if channels == 0 {
        return Vec::new();
    }
    let per_channel = interleaved.len() / channels;
    let mut planar = Vec::with_capacity(per_channel * channels);
    for channel in 0..channels {
        for sample in 0..per_channel {
            planar.push(interleaved[sample * channels + channel]);
        }
    }
    planar
}

/// Build an interleaved sample buffer from a decoded frame's native planes.
///
/// # Errors
///
/// Returns [`PipelineError::PacketDecode`] when the planes are shorter than
/// the declared channel and sample counts imply.
pub fn interleave(planes: &AudioPlanes<'_>) -> Result<Samples, PipelineError> {
    let convert = INTERLEAVE_TABLE
        .iter()
        .find(|(format, _)| *format == planes.format)
        .map(|(_, convert)| *convert)
        .ok_or_else(|| PipelineError::UnsupportedFormat(planes.format.to_string()))?;
    convert(planes)
}

type InterleaveFn = fn(&AudioPlanes<'_>) -> Result<Samples, PipelineError>;

const fn format(sample_type: SampleType, layout: SampleLayout) -> SampleFormat {
    SampleFormat::new(sample_type, layout)
}

static INTERLEAVE_TABLE: [(SampleFormat, InterleaveFn); 8] = [
    (format(SampleType::U8, SampleLayout::Interleaved), copy_packed::<u8>),
    (format(SampleType::S16, SampleLayout::Interleaved), copy_packed::<i16>),
    (format(SampleType::S32, SampleLayout::Interleaved), copy_packed::<i32>),
    (format(SampleType::F32, SampleLayout::Interleaved), copy_packed::<f32>),
    (format(SampleType::U8, SampleLayout::Planar), interleave_planes::<u8>),
    (format(SampleType::S16, SampleLayout::Planar), interleave_planes::<i16>),
    (format(SampleType::S32, SampleLayout::Planar), interleave_planes::<i32>),
    (format(SampleType::F32, SampleLayout::Planar), interleave_planes::<f32>),
];

trait RawSample: Copy {
    const SIZE: usize;

    fn from_bytes(bytes: &[u8]) -> Self;

    fn wrap(values: Vec<Self>) -> Samples;
}

impl RawSample for u8 {
    const SIZE: usize = 1;

    fn from_bytes(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn wrap(values: Vec<Self>) -> Samples {
        Samples::U8(values)
    }
}

impl RawSample for i16 {
    const SIZE: usize = 2;

    fn from_bytes(bytes: &[u8]) -> Self {
        i16::from_ne_bytes([bytes[0], bytes[1]])
    }

    fn wrap(values: Vec<Self>) -> Samples {
        Samples::S16(values)
    }
}

impl RawSample for i32 {
    const SIZE: usize = 4;

    fn from_bytes(bytes: &[u8]) -> Self {
        i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn wrap(values: Vec<Self>) -> Samples {
        Samples::S32(values)
    }
}

impl RawSample for f32 {
    const SIZE: usize = 4;

    fn from_bytes(bytes: &[u8]) -> Self {
        f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn wrap(values: Vec<Self>) -> Samples {
        Samples::F32(values)
    }
}

fn read_plane<T: RawSample>(plane: &[u8], count: usize) -> Result<Vec<T>, PipelineError> {
    let needed = count * T::SIZE;
    if plane.len() < needed {
        return Err(PipelineError::PacketDecode {
            kind: MediaKind::Audio,
            reason: format!("audio plane holds {} bytes, expected {needed}", plane.len()),
        });
    }
    Ok(plane[..needed].chunks_exact(T::SIZE).map(T::from_bytes).collect())
}

fn copy_packed<T: RawSample>(planes: &AudioPlanes<'_>) -> Result<Samples, PipelineError> {
    let plane = planes.planes.first().copied().unwrap_or_default();
    let count = planes.samples_per_channel * planes.channels as usize;
    read_plane::<T>(plane, count).map(T::wrap)
}

fn interleave_planes<T: RawSample>(planes: &AudioPlanes<'_>) -> Result<Samples, PipelineError> {
    let channels = planes.channels as usize;
    if planes.planes.len() < channels {
        return Err(PipelineError::PacketDecode {
            kind: MediaKind::Audio,
            reason: format!(
                "planar frame has {} planes for {channels} channels",
                planes.planes.len()
            ),
        });
    }
    let mut planar = Vec::with_capacity(channels * planes.samples_per_channel);
    for plane in &planes.planes[..channels] {
        planar.extend(read_plane::<T>(plane, planes.samples_per_channel)?);
    }
    Ok(T::wrap(planar_interleave(&planar, channels)))
}
