//! Driven port for turning raw frames into transferable images.

use super::define_port_error;
use super::media_capture::PixelBuffer;
use crate::domain::ImagePayload;

define_port_error! {
    /// Errors surfaced while encoding a frame.
    pub enum FrameEncodeError {
        /// The encoder rejected the pixel data.
        Encode {
            /// Encoder diagnostic.
            message: String,
        } => "frame encode failed: {message}",
    }
}

/// Port for still-image encoding.
#[cfg_attr(test, mockall::automock)]
pub trait FrameEncoder: Send + Sync {
    /// Encode one frame.
    fn encode(&self, frame: &PixelBuffer) -> Result<ImagePayload, FrameEncodeError>;
}
