//! Verification session data.
//!
//! The session is the accumulated state of one verification attempt. Only the
//! step state machine mutates it; everyone else sees snapshots.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use super::error_classifier::ClassifiedError;

/// One stage of the linear verification sequence.
///
/// Variants are declared in flow order so the derived `Ord` matches the
/// direction the session is allowed to move in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Waiting for the identity document image.
    DocumentUpload,
    /// Waiting for a live capture to compare against the document photo.
    LiveFaceCheck,
    /// Waiting for a one-time code to be issued.
    GenerateCode,
    /// Waiting for the user to confirm the one-time code.
    VerifyCode,
    /// Verification finished.
    Complete,
}

impl Step {
    /// Return the step that follows `self`, or `None` once complete.
    ///
    /// # Examples
    /// ```
    /// use verification_client::domain::Step;
    ///
    /// assert_eq!(Step::DocumentUpload.next(), Some(Step::LiveFaceCheck));
    /// assert_eq!(Step::Complete.next(), None);
    /// ```
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::DocumentUpload => Some(Self::LiveFaceCheck),
            Self::LiveFaceCheck => Some(Self::GenerateCode),
            Self::GenerateCode => Some(Self::VerifyCode),
            Self::VerifyCode => Some(Self::Complete),
            Self::Complete => None,
        }
    }

    /// Stable snake-case name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DocumentUpload => "document_upload",
            Self::LiveFaceCheck => "live_face_check",
            Self::GenerateCode => "generate_code",
            Self::VerifyCode => "verify_code",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque image bytes tagged with their media type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    media_type: String,
}

impl ImagePayload {
    /// Wrap encoded image bytes.
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
        }
    }

    /// Wrap JPEG-encoded bytes.
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self::new(bytes, "image/jpeg")
    }

    /// Encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Media type such as `image/jpeg`.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload carries no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consume the payload and return its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Fields extracted from the identity document.
///
/// Set once per attempt by a successful document upload and never edited
/// afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentFields {
    /// Document number as printed on the card.
    pub document_number: Option<String>,
    /// Registered phone number the one-time code is sent to.
    pub phone_number: Option<String>,
    /// Date of birth as printed on the card.
    pub date_of_birth: Option<String>,
    /// Portrait cropped from the document.
    pub document_photo: Option<ImagePayload>,
}

/// Outcome of a face comparison the service completed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceMatchResult {
    /// Whether the live face matches the document photo.
    pub matched: bool,
    /// Service-reported confidence percentage.
    pub confidence: f64,
    /// Service message describing the comparison.
    pub message: String,
    /// Machine-readable failure subtype, when the service reports one.
    pub error_type: Option<String>,
    /// Embedding distance between the two faces.
    pub distance: Option<f64>,
    /// Distance threshold the service applied.
    pub threshold: Option<f64>,
}

/// One still frame produced by the camera capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    /// Encoded still image.
    pub image: ImagePayload,
    /// Monotonic capture counter within one camera session.
    pub captured_at_sequence: u64,
}

/// Accumulated state of one verification attempt.
#[derive(Debug, Clone)]
pub struct VerificationSession {
    attempt_id: Uuid,
    step: Step,
    document: Option<DocumentFields>,
    face_result: Option<FaceMatchResult>,
    otp_verified: bool,
    phone_number: Option<String>,
    last_error: Option<ClassifiedError>,
}

impl VerificationSession {
    /// Start a fresh attempt on [`Step::DocumentUpload`].
    pub fn new() -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            step: Step::DocumentUpload,
            document: None,
            face_result: None,
            otp_verified: false,
            phone_number: None,
            last_error: None,
        }
    }

    /// Identifier correlating everything done within this attempt.
    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    /// Current step.
    pub fn step(&self) -> Step {
        self.step
    }

    /// Extracted document fields, once the upload succeeded.
    pub fn document(&self) -> Option<&DocumentFields> {
        self.document.as_ref()
    }

    /// Most recent face comparison result, matched or not.
    pub fn face_result(&self) -> Option<&FaceMatchResult> {
        self.face_result.as_ref()
    }

    /// Whether the one-time code was confirmed.
    pub fn otp_verified(&self) -> bool {
        self.otp_verified
    }

    /// Phone number confirmed by a successful face match.
    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }

    /// Error recorded by the last failed operation, cleared on success.
    pub fn last_error(&self) -> Option<&ClassifiedError> {
        self.last_error.as_ref()
    }

    /// Move exactly one step forward from `from`.
    ///
    /// Does nothing unless the session is currently on `from`, so a stale
    /// completion can never skip or regress the step.
    pub(crate) fn advance_from(&mut self, from: Step) {
        if self.step != from {
            return;
        }
        if let Some(next) = from.next() {
            self.step = next;
        }
    }

    pub(crate) fn record_document(&mut self, fields: DocumentFields) {
        self.document = Some(fields);
    }

    pub(crate) fn record_face_result(&mut self, result: FaceMatchResult) {
        self.face_result = Some(result);
    }

    pub(crate) fn record_phone_number(&mut self, phone_number: String) {
        self.phone_number = Some(phone_number);
    }

    pub(crate) fn mark_otp_verified(&mut self) {
        self.otp_verified = true;
    }

    pub(crate) fn record_error(&mut self, error: ClassifiedError) {
        self.last_error = Some(error);
    }

    pub(crate) fn clear_error(&mut self) {
        self.last_error = None;
    }
}

impl Default for VerificationSession {
    fn default() -> Self {
        Self::new()
    }
}
