//! Camera capture session.
//!
//! Owns the exclusive capture device, the 3-2-1 countdown and frame
//! extraction. Captured frames and extraction failures are delivered on the
//! channel returned by [`CameraCaptureSession::new`].
//!
//! Every activation and deactivation bumps a generation counter. Timer ticks
//! and acquisition completions carry the generation they were started under
//! and are ignored once it is stale, so a late tick never captures and a
//! device granted after deactivation is released straight away.

mod frame;
mod state;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub use self::state::{CameraState, CountdownSettings};
use self::frame::{classify_media_error, extract_frame};
use super::ports::{CountdownTimer, FrameEncoder, MediaCapture, TimerHandle, VideoTrack};
use super::{CapturedFrame, ClassifiedError};

/// Event emitted when a countdown finishes.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// A frame was captured. Always one element; the last frame is canonical.
    Captured(Vec<CapturedFrame>),
    /// Frame extraction failed and the camera went back to `Ready`.
    Failed(ClassifiedError),
}

/// Holds the device; dropping it stops the track.
struct DeviceLease {
    track: Box<dyn VideoTrack>,
}

impl DeviceLease {
    fn new(track: Box<dyn VideoTrack>) -> Self {
        Self { track }
    }

    fn track_mut(&mut self) -> &mut dyn VideoTrack {
        self.track.as_mut()
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        self.track.stop();
    }
}

struct CameraInner {
    state: CameraState,
    generation: u64,
    lease: Option<DeviceLease>,
    countdown: Option<TimerHandle>,
    next_sequence: u64,
    last_error: Option<ClassifiedError>,
}

impl CameraInner {
    fn bump_generation(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }

    /// Cancel the countdown and release the device.
    fn release(&mut self) {
        self.bump_generation();
        self.countdown.take();
        self.lease.take();
        if self.state != CameraState::Failed {
            self.state = CameraState::Idle;
        }
    }
}

struct CameraShared {
    media: Arc<dyn MediaCapture>,
    timer: Arc<dyn CountdownTimer>,
    encoder: Arc<dyn FrameEncoder>,
    settings: CountdownSettings,
    events: mpsc::UnboundedSender<CaptureEvent>,
    inner: Mutex<CameraInner>,
}

impl CameraShared {
    fn lock(&self) -> MutexGuard<'_, CameraInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: CaptureEvent) {
        if self.events.send(event).is_err() {
            debug!("capture event receiver dropped; discarding event");
        }
    }

    fn on_tick(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(generation, current = inner.generation, "ignoring stale countdown tick");
            return;
        }
        match inner.state {
            CameraState::CountingDown(remaining) if remaining > 1 => {
                inner.state = CameraState::CountingDown(remaining.saturating_sub(1));
                debug!(camera_state = %inner.state, "countdown tick");
            }
            CameraState::CountingDown(_) => self.capture(&mut inner),
            other => debug!(camera_state = %other, "countdown tick outside countdown"),
        }
    }

    fn capture(&self, inner: &mut CameraInner) {
        inner.state = CameraState::Capturing;
        inner.countdown.take();
        let extracted = match inner.lease.as_mut() {
            Some(lease) => extract_frame(lease.track_mut(), self.encoder.as_ref()),
            None => Err(ClassifiedError::camera_hardware("no device held at capture time")),
        };
        match extracted {
            Ok(image) => {
                let sequence = inner.next_sequence;
                inner.next_sequence = sequence.wrapping_add(1);
                inner.release();
                info!(sequence, bytes = image.len(), "frame captured");
                self.emit(CaptureEvent::Captured(vec![CapturedFrame {
                    image,
                    captured_at_sequence: sequence,
                }]));
            }
            Err(err) => {
                warn!(category = %err.category(), raw = err.raw_message(), "frame extraction failed");
                inner.state = CameraState::Ready;
                inner.last_error = Some(err.clone());
                self.emit(CaptureEvent::Failed(err));
            }
        }
    }
}

/// Resets `Starting` back to `Idle` if `activate` is abandoned mid-await.
struct StartingGuard<'a> {
    shared: &'a CameraShared,
    generation: u64,
    armed: bool,
}

impl Drop for StartingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.shared.lock();
        if inner.generation == self.generation && inner.state == CameraState::Starting {
            inner.state = CameraState::Idle;
        }
    }
}

/// Exclusive camera device with a timed still capture.
pub struct CameraCaptureSession {
    shared: Arc<CameraShared>,
}

impl CameraCaptureSession {
    /// Build an idle session with the default 3-2-1 countdown.
    pub fn new(
        media: Arc<dyn MediaCapture>,
        timer: Arc<dyn CountdownTimer>,
        encoder: Arc<dyn FrameEncoder>,
    ) -> (Self, mpsc::UnboundedReceiver<CaptureEvent>) {
        Self::with_settings(media, timer, encoder, CountdownSettings::default())
    }

    /// Build an idle session with explicit countdown settings.
    pub fn with_settings(
        media: Arc<dyn MediaCapture>,
        timer: Arc<dyn CountdownTimer>,
        encoder: Arc<dyn FrameEncoder>,
        settings: CountdownSettings,
    ) -> (Self, mpsc::UnboundedReceiver<CaptureEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(CameraShared {
            media,
            timer,
            encoder,
            settings,
            events,
            inner: Mutex::new(CameraInner {
                state: CameraState::Idle,
                generation: 0,
                lease: None,
                countdown: None,
                next_sequence: 0,
                last_error: None,
            }),
        });
        (Self { shared }, receiver)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CameraState {
        self.shared.lock().state
    }

    /// Error from the last failed acquisition or extraction.
    pub fn last_error(&self) -> Option<ClassifiedError> {
        self.shared.lock().last_error.clone()
    }

    /// Acquire the device.
    ///
    /// Valid from `Idle` or `Failed`; a no-op otherwise. When `deactivate`
    /// runs while the platform is still granting access, the granted track is
    /// stopped immediately and the session stays `Idle`.
    ///
    /// # Errors
    /// Returns `CameraPermissionError` or `CameraHardwareError` and moves to
    /// `Failed` when acquisition fails.
    pub async fn activate(&self) -> Result<(), ClassifiedError> {
        let generation = {
            let mut inner = self.shared.lock();
            if !matches!(inner.state, CameraState::Idle | CameraState::Failed) {
                debug!(camera_state = %inner.state, "activate ignored; camera already active");
                return Ok(());
            }
            inner.state = CameraState::Starting;
            inner.last_error = None;
            inner.bump_generation()
        };
        let mut guard = StartingGuard {
            shared: &self.shared,
            generation,
            armed: true,
        };

        let acquired = self.shared.media.acquire().await;
        guard.armed = false;

        let mut inner = self.shared.lock();
        let superseded = inner.generation != generation || inner.state != CameraState::Starting;
        match acquired {
            Ok(track) if superseded => {
                drop(DeviceLease::new(track));
                debug!("camera deactivated during acquisition; released device");
                Ok(())
            }
            Ok(track) => {
                inner.lease = Some(DeviceLease::new(track));
                inner.state = CameraState::Ready;
                info!(camera_state = %inner.state, "camera ready");
                Ok(())
            }
            Err(err) if superseded => {
                debug!(error = %err, "acquisition failed after deactivation; ignoring");
                Ok(())
            }
            Err(err) => {
                let classified = classify_media_error(&err);
                warn!(category = %classified.category(), error = %err, "camera acquisition failed");
                inner.state = CameraState::Failed;
                inner.last_error = Some(classified.clone());
                Err(classified)
            }
        }
    }

    /// Release the device and cancel any countdown. Safe from any state.
    ///
    /// `Failed` stays `Failed`; every other state ends in `Idle`.
    pub fn deactivate(&self) {
        let mut inner = self.shared.lock();
        let before = inner.state;
        inner.release();
        debug!(from = %before, camera_state = %inner.state, "camera deactivated");
    }

    /// Start the countdown towards a capture.
    ///
    /// A no-op while already counting down or capturing.
    ///
    /// # Errors
    /// Returns `InvalidStep` unless the camera is `Ready`.
    pub fn begin_countdown_capture(&self) -> Result<(), ClassifiedError> {
        let mut inner = self.shared.lock();
        match inner.state {
            CameraState::Ready => {}
            CameraState::CountingDown(_) | CameraState::Capturing => return Ok(()),
            other => {
                return Err(ClassifiedError::invalid_step(format!(
                    "countdown capture needs a ready camera (camera is {other})"
                )));
            }
        }
        let settings = self.shared.settings;
        let generation = inner.generation;
        inner.state = CameraState::CountingDown(settings.start_from.max(1));
        let weak: Weak<CameraShared> = Arc::downgrade(&self.shared);
        let handle = self.shared.timer.start(
            settings.period,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_tick(generation);
                }
            }),
        );
        inner.countdown = Some(handle);
        info!(camera_state = %inner.state, "countdown started");
        Ok(())
    }
}

impl Drop for CameraCaptureSession {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl std::fmt::Debug for CameraCaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraCaptureSession")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
