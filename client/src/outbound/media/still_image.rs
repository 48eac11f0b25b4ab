//! Still-photo capture source.
//!
//! Serves a decoded photo as a video track so the full countdown flow can run
//! on hosts without a camera. Every acquisition opens a fresh track over the
//! same frame.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::ports::{MediaCapture, MediaCaptureError, PixelBuffer, Resolution, VideoTrack};

/// Capture source backed by a single decoded photo.
#[derive(Debug, Clone)]
pub struct StillImageCapture {
    frame: Arc<PixelBuffer>,
}

impl StillImageCapture {
    /// Decode an encoded photo (JPEG or PNG) into the frame every track serves.
    ///
    /// # Errors
    ///
    /// Returns [`MediaCaptureError::Unavailable`] when the bytes are not a
    /// decodable image or the image has no pixels.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, MediaCaptureError> {
        let decoded = image::load_from_memory(bytes).map_err(|err| {
            MediaCaptureError::unavailable(format!("cannot decode still image: {err}"))
        })?;
        let rgb = decoded.to_rgb8();
        let resolution = Resolution::new(rgb.width(), rgb.height());
        let frame = PixelBuffer::from_rgb(resolution, rgb.into_raw())
            .ok_or_else(|| MediaCaptureError::unavailable("still image has no pixels"))?;
        Ok(Self::from_frame(frame))
    }

    /// Serve an already decoded frame.
    #[must_use]
    pub fn from_frame(frame: PixelBuffer) -> Self {
        Self {
            frame: Arc::new(frame),
        }
    }

    /// Resolution of the served frame.
    #[must_use]
    pub fn resolution(&self) -> Resolution {
        self.frame.resolution()
    }
}

#[async_trait]
impl MediaCapture for StillImageCapture {
    async fn acquire(&self) -> Result<Box<dyn VideoTrack>, MediaCaptureError> {
        debug!(
            width = self.frame.resolution().width,
            height = self.frame.resolution().height,
            "still image track opened"
        );
        Ok(Box::new(StillImageTrack {
            frame: Some(Arc::clone(&self.frame)),
        }))
    }
}

struct StillImageTrack {
    frame: Option<Arc<PixelBuffer>>,
}

impl VideoTrack for StillImageTrack {
    fn native_resolution(&self) -> Option<Resolution> {
        self.frame.as_deref().map(PixelBuffer::resolution)
    }

    fn copy_frame(&mut self, target: &mut PixelBuffer) -> Result<(), MediaCaptureError> {
        let frame = self
            .frame
            .as_deref()
            .ok_or_else(MediaCaptureError::no_video_surface)?;
        if frame.resolution() != target.resolution() {
            return Err(MediaCaptureError::frame_copy(format!(
                "target is {}x{} but the track is {}x{}",
                target.resolution().width,
                target.resolution().height,
                frame.resolution().width,
                frame.resolution().height,
            )));
        }
        target.as_rgb_mut().copy_from_slice(frame.as_rgb());
        Ok(())
    }

    fn stop(&mut self) {
        if self.frame.take().is_some() {
            debug!("still image track stopped");
        }
    }
}
