//! Still-frame extraction from an open video track.

use crate::domain::ClassifiedError;
use crate::domain::ImagePayload;
use crate::domain::ports::{FrameEncoder, MediaCaptureError, PixelBuffer, VideoTrack};

/// Map a device error onto the user-facing taxonomy.
pub(super) fn classify_media_error(err: &MediaCaptureError) -> ClassifiedError {
    match err {
        MediaCaptureError::PermissionDenied { .. } => {
            ClassifiedError::camera_permission(err.to_string())
        }
        MediaCaptureError::Unavailable { .. }
        | MediaCaptureError::NoVideoSurface
        | MediaCaptureError::FrameCopy { .. } => ClassifiedError::camera_hardware(err.to_string()),
    }
}

/// Copy the track's current frame at native resolution and encode it.
pub(super) fn extract_frame(
    track: &mut dyn VideoTrack,
    encoder: &dyn FrameEncoder,
) -> Result<ImagePayload, ClassifiedError> {
    let no_surface = || classify_media_error(&MediaCaptureError::no_video_surface());
    let resolution = track.native_resolution().ok_or_else(no_surface)?;
    let mut buffer = PixelBuffer::for_resolution(resolution).ok_or_else(no_surface)?;
    track
        .copy_frame(&mut buffer)
        .map_err(|err| classify_media_error(&err))?;
    encoder
        .encode(&buffer)
        .map_err(|err| ClassifiedError::camera_hardware(err.to_string()))
}
