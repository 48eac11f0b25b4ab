//! Camera lifecycle states and countdown settings.

use std::fmt;
use std::time::Duration;

/// Lifecycle of the capture device.
///
/// The device is held only in `Ready`, `CountingDown` and `Capturing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraState {
    /// No device held.
    Idle,
    /// Waiting for the platform to grant the device.
    Starting,
    /// Device held and showing a live preview.
    Ready,
    /// Counting down to a capture; the value is the number still to show.
    CountingDown(u32),
    /// Grabbing the current frame.
    Capturing,
    /// Acquisition failed; only `activate` leaves this state.
    Failed,
}

impl CameraState {
    /// Whether a device lease may exist in this state.
    pub const fn holds_device(self) -> bool {
        matches!(self, Self::Ready | Self::CountingDown(_) | Self::Capturing)
    }
}

impl fmt::Display for CameraState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Starting => f.write_str("starting"),
            Self::Ready => f.write_str("ready"),
            Self::CountingDown(remaining) => write!(f, "counting_down({remaining})"),
            Self::Capturing => f.write_str("capturing"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Countdown shape used by [`super::CameraCaptureSession::begin_countdown_capture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownSettings {
    /// First value shown. Values below one are treated as one.
    pub start_from: u32,
    /// Delay between ticks.
    pub period: Duration,
}

impl Default for CountdownSettings {
    fn default() -> Self {
        Self {
            start_from: 3,
            period: Duration::from_secs(1),
        }
    }
}
