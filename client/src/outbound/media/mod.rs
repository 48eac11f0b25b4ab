//! Media adapters for hosts without a live camera.
//!
//! `StillImageCapture` serves a decoded photo as a one-frame video track and
//! `JpegFrameEncoder` turns captured frames into JPEG payloads.

mod jpeg;
mod still_image;

pub use jpeg::{DEFAULT_JPEG_QUALITY, JpegFrameEncoder};
pub use still_image::StillImageCapture;
