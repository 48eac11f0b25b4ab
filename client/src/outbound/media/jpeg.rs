//! JPEG frame encoder.

use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;

use crate::domain::ImagePayload;
use crate::domain::ports::{FrameEncodeError, FrameEncoder, PixelBuffer};

/// Quality used when none is configured.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Encodes captured frames as baseline JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegFrameEncoder {
    quality: u8,
}

impl JpegFrameEncoder {
    /// Build an encoder. Quality is clamped to `1..=100`.
    #[must_use]
    pub const fn new(quality: u8) -> Self {
        let clamped = if quality == 0 {
            1
        } else if quality > 100 {
            100
        } else {
            quality
        };
        Self { quality: clamped }
    }

    /// Effective quality.
    #[must_use]
    pub const fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegFrameEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl FrameEncoder for JpegFrameEncoder {
    fn encode(&self, frame: &PixelBuffer) -> Result<ImagePayload, FrameEncodeError> {
        let resolution = frame.resolution();
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, self.quality)
            .encode(
                frame.as_rgb(),
                resolution.width,
                resolution.height,
                ExtendedColorType::Rgb8,
            )
            .map_err(|err| FrameEncodeError::encode(err.to_string()))?;
        Ok(ImagePayload::jpeg(bytes))
    }
}
