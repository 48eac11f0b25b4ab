//! Driven port for acquiring a live video source.

use async_trait::async_trait;

use super::define_port_error;

/// Native pixel dimensions of a video track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// Build a resolution.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

const RGB_CHANNELS: usize = 3;

/// Packed 8-bit RGB drawing surface sized to a track's native resolution.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    resolution: Resolution,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Allocate a zeroed surface, or `None` when the size is zero or does not
    /// fit in memory.
    pub fn for_resolution(resolution: Resolution) -> Option<Self> {
        let len = byte_len(resolution)?;
        Some(Self {
            resolution,
            data: vec![0; len],
        })
    }

    /// Wrap packed RGB bytes, or `None` when the length does not match.
    pub fn from_rgb(resolution: Resolution, data: Vec<u8>) -> Option<Self> {
        (byte_len(resolution)? == data.len()).then_some(Self { resolution, data })
    }

    /// Surface dimensions.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Packed RGB bytes, row-major.
    pub fn as_rgb(&self) -> &[u8] {
        &self.data
    }

    /// Mutable packed RGB bytes for tracks to draw into.
    pub fn as_rgb_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("resolution", &self.resolution)
            .field("len", &self.data.len())
            .finish()
    }
}

fn byte_len(resolution: Resolution) -> Option<usize> {
    let width = usize::try_from(resolution.width).ok()?;
    let height = usize::try_from(resolution.height).ok()?;
    let len = width.checked_mul(height)?.checked_mul(RGB_CHANNELS)?;
    (len > 0).then_some(len)
}

define_port_error! {
    /// Errors surfaced while acquiring or reading a capture device.
    pub enum MediaCaptureError {
        /// The user or platform refused camera access.
        PermissionDenied {
            /// Platform diagnostic.
            message: String,
        } => "camera permission denied: {message}",
        /// The device could not be opened.
        Unavailable {
            /// Platform diagnostic.
            message: String,
        } => "camera unavailable: {message}",
        /// The track has no frame surface to read from yet.
        NoVideoSurface =>
            "camera has no video surface",
        /// Copying the current frame failed.
        FrameCopy {
            /// Copy diagnostic.
            message: String,
        } => "camera frame copy failed: {message}",
    }
}

/// An open video track. Holding one keeps the device busy.
pub trait VideoTrack: Send {
    /// Native resolution, or `None` while no frame has been produced.
    fn native_resolution(&self) -> Option<Resolution>;

    /// Draw the current frame into `target`.
    fn copy_frame(&mut self, target: &mut PixelBuffer) -> Result<(), MediaCaptureError>;

    /// Release the device. Calling this more than once has no effect.
    fn stop(&mut self);
}

/// Port for requesting access to a capture device.
#[async_trait]
pub trait MediaCapture: Send + Sync {
    /// Ask for the device and return its live video track.
    async fn acquire(&self) -> Result<Box<dyn VideoTrack>, MediaCaptureError>;
}
