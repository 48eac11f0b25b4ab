//! Identity verification client.
//!
//! Drives a verification attempt through document OCR, a timed liveness
//! capture, face matching and a one-time code check. The domain layer owns the
//! step state machine and the camera capture session; outbound adapters talk to
//! the verification service and to capture hardware.

pub mod config;
pub mod domain;
pub mod outbound;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
