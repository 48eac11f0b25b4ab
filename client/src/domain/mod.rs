//! Domain primitives and orchestration.
//!
//! Purpose: own the verification session, the forward-only step state
//! machine and the camera capture lifecycle. Everything here is transport
//! agnostic; adapters plug in through [`ports`].
//!
//! Public surface:
//! - StepStateMachine: sequences the external operations for one attempt.
//! - CameraCaptureSession: acquires the capture device and emits frames.
//! - ClassifiedError / ErrorCategory: user-facing failure taxonomy.
//! - VerificationSession, Step, DocumentFields, FaceMatchResult,
//!   CapturedFrame, ImagePayload, OtpCode: session data.

pub mod camera;
pub mod error_classifier;
pub mod otp_code;
pub mod ports;
pub mod session;
pub mod step_machine;

pub use self::camera::{CameraCaptureSession, CameraState, CaptureEvent, CountdownSettings};
pub use self::error_classifier::{
    ClassifiedError, ErrorCategory, FaceDetectionKind, MessageClass, classify_message,
};
pub use self::otp_code::{OTP_CODE_LENGTH, OtpCode, OtpCodeValidationError};
pub use self::session::{
    CapturedFrame, DocumentFields, FaceMatchResult, ImagePayload, Step, VerificationSession,
};
pub use self::step_machine::{StepOperation, StepStateMachine};
