//! Decoded frames handed to consumers through the queues.

use image::RgbaImage;

use crate::sample::{SampleType, Samples};

/// One decoded video frame in presentation format.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedVideoFrame {
    /// Presentation timestamp in the session time base.
    pub timestamp: i64,
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 pixels, `width * height * 4` bytes.
    pub data: Vec<u8>,
}

impl DecodedVideoFrame {
    /// Copy the pixels into an [`RgbaImage`].
    ///
    /// Returns `None` if the buffer size does not match the dimensions.
    pub fn to_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// Consume the frame and wrap its buffer without copying.
    pub fn into_image(self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data)
    }
}

/// Channel layout of a decoded audio frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFrameInfo {
    pub channels: u16,
    pub sample_type: SampleType,
    pub sample_rate: u32,
}

/// One decoded audio frame with interleaved samples.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudioFrame {
    /// Presentation timestamp in the session time base.
    pub timestamp: i64,
    pub info: AudioFrameInfo,
    pub samples: Samples,
}

impl DecodedAudioFrame {
    /// Total interleaved sample count (per-channel count times channels).
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn samples_per_channel(&self) -> usize {
        match self.info.channels {
            0 => 0,
            channels => self.samples.len() / channels as usize,
        }
    }

    /// A copy of this frame with every sample converted to `sample_type`.
    pub fn convert(&self, sample_type: SampleType) -> DecodedAudioFrame {
        DecodedAudioFrame {
            timestamp: self.timestamp,
            info: AudioFrameInfo {
                sample_type,
                ..self.info
            },
            samples: self.samples.convert(sample_type),
        }
    }

    /// The samples split into one consecutive run per channel.
    pub fn to_planar(&self) -> Samples {
        self.samples.deinterleave(self.info.channels as usize)
    }
}
