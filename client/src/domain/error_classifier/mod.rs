//! Classification of raw failure messages into user-facing errors.
//!
//! Backend and transport failures arrive as free text. [`classify_message`]
//! maps that text onto a small set of stable classes using ordered substring
//! rules; [`ClassifiedError`] pairs the resulting category with a fixed
//! user-facing message while keeping the raw text for diagnostics.

use std::fmt;

use serde::Serialize;

/// Face-detection failure subtypes reported by the face-matching service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceDetectionKind {
    /// No face found in the document photo.
    NoFaceInDocument,
    /// No face found in the live capture.
    NoFaceInLiveCapture,
    /// More than one face found in the document photo.
    MultipleFacesInDocument,
    /// More than one face found in the live capture.
    MultipleFacesInLiveCapture,
    /// A face was found but is too small to compare.
    FaceTooSmall,
}

impl FaceDetectionKind {
    /// Classifier class carrying the same meaning.
    pub const fn message_class(self) -> MessageClass {
        match self {
            Self::NoFaceInDocument => MessageClass::NoFaceInDocument,
            Self::NoFaceInLiveCapture => MessageClass::NoFaceInLiveCapture,
            Self::MultipleFacesInDocument => MessageClass::MultipleFacesInDocument,
            Self::MultipleFacesInLiveCapture => MessageClass::MultipleFacesInLiveCapture,
            Self::FaceTooSmall => MessageClass::FaceTooSmall,
        }
    }
}

/// Result of running the substring rules over a raw message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageClass {
    /// No face found in the document photo.
    NoFaceInDocument,
    /// No face found in the live capture.
    NoFaceInLiveCapture,
    /// More than one face found in the document photo.
    MultipleFacesInDocument,
    /// More than one face found in the live capture.
    MultipleFacesInLiveCapture,
    /// Face too small or unclear.
    FaceTooSmall,
    /// The service could not be reached.
    NetworkUnreachable,
    /// No rule matched.
    Unclassified,
}

impl MessageClass {
    /// Stable snake-case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoFaceInDocument => "no_face_in_document",
            Self::NoFaceInLiveCapture => "no_face_in_live_capture",
            Self::MultipleFacesInDocument => "multiple_faces_in_document",
            Self::MultipleFacesInLiveCapture => "multiple_faces_in_live_capture",
            Self::FaceTooSmall => "face_too_small",
            Self::NetworkUnreachable => "network_unreachable",
            Self::Unclassified => "unclassified",
        }
    }

    /// Face-detection subtype for face-related classes.
    pub const fn face_detection_kind(self) -> Option<FaceDetectionKind> {
        match self {
            Self::NoFaceInDocument => Some(FaceDetectionKind::NoFaceInDocument),
            Self::NoFaceInLiveCapture => Some(FaceDetectionKind::NoFaceInLiveCapture),
            Self::MultipleFacesInDocument => Some(FaceDetectionKind::MultipleFacesInDocument),
            Self::MultipleFacesInLiveCapture => Some(FaceDetectionKind::MultipleFacesInLiveCapture),
            Self::FaceTooSmall => Some(FaceDetectionKind::FaceTooSmall),
            Self::NetworkUnreachable | Self::Unclassified => None,
        }
    }

    /// Fixed user-facing template, absent for [`MessageClass::Unclassified`].
    pub const fn user_message(self) -> Option<&'static str> {
        match self {
            Self::NoFaceInDocument => Some(
                "We could not find a face in the document photo. Upload a clearer image of the document.",
            ),
            Self::NoFaceInLiveCapture => Some(
                "We could not see your face in the live capture. Face the camera in good light and try again.",
            ),
            Self::MultipleFacesInDocument => Some(
                "The document photo contains more than one face. Upload an image of your own document only.",
            ),
            Self::MultipleFacesInLiveCapture => Some(
                "More than one face was detected in the live capture. Make sure you are alone in the frame.",
            ),
            Self::FaceTooSmall => Some(
                "Your face is too small or unclear. Move closer to the camera and try again.",
            ),
            Self::NetworkUnreachable => Some(NETWORK_MESSAGE),
            Self::Unclassified => None,
        }
    }
}

impl fmt::Display for MessageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const NETWORK_MESSAGE: &str =
    "The verification service could not be reached. Check your connection and try again.";
const BACKEND_FALLBACK_MESSAGE: &str = "The verification service rejected the request.";
const DECODE_MESSAGE: &str = "The verification service returned an unexpected response.";
const CAMERA_PERMISSION_MESSAGE: &str =
    "Camera access was denied. Allow camera access and activate the camera again.";
const CAMERA_HARDWARE_MESSAGE: &str =
    "The camera is unavailable. Check the device and activate the camera again.";
const FACE_MISMATCH_MESSAGE: &str = "Your live face does not match the document photo.";

// Order matters: the first rule with a matching needle wins. Document rules
// precede live-capture rules and both precede the generic size rule.
const RULES: &[(MessageClass, &[&str])] = &[
    (
        MessageClass::NoFaceInDocument,
        &[
            "no_face_reference",
            "no face detected in aadhaar",
            "no face detected in document",
            "could not detect face in aadhaar",
            "could not detect face in document",
            "aadhaar photo validation failed: no face",
            "document photo validation failed: no face",
        ],
    ),
    (
        MessageClass::NoFaceInLiveCapture,
        &[
            "no_face_live",
            "no face detected in live",
            "no face detected in captured",
            "could not detect face in live",
            "live photo validation failed: no face",
        ],
    ),
    (
        MessageClass::MultipleFacesInDocument,
        &[
            "multiple_faces_reference",
            "multiple faces detected in aadhaar",
            "multiple faces detected in document",
            "aadhaar photo validation failed: multiple faces",
            "document photo validation failed: multiple faces",
        ],
    ),
    (
        MessageClass::MultipleFacesInLiveCapture,
        &[
            "multiple_faces_live",
            "multiple faces detected in live",
            "multiple faces detected in captured",
            "live photo validation failed: multiple faces",
        ],
    ),
    (
        MessageClass::FaceTooSmall,
        &["face too small", "face_too_small"],
    ),
    (
        MessageClass::NetworkUnreachable,
        &[
            "network error",
            "networkerror",
            "failed to fetch",
            "error sending request",
            "connection refused",
            "connection reset",
            "network is unreachable",
            "dns error",
            "timed out",
        ],
    ),
];

/// Classify a raw failure message.
///
/// Matching is case-insensitive and the first matching rule wins.
///
/// # Examples
/// ```
/// use verification_client::domain::{MessageClass, classify_message};
///
/// let class = classify_message("No face detected in Aadhaar photo. Please retry.");
/// assert_eq!(class, MessageClass::NoFaceInDocument);
/// assert_eq!(classify_message("invalid phone"), MessageClass::Unclassified);
/// ```
pub fn classify_message(raw: &str) -> MessageClass {
    let haystack = raw.to_lowercase();
    RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|needle| haystack.contains(needle)))
        .map_or(MessageClass::Unclassified, |(class, _)| *class)
}

/// Stable failure category surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// A session field the operation depends on is absent. Local.
    MissingPrerequisite,
    /// The operation does not belong to the current step. Local.
    InvalidStep,
    /// User input is malformed. Local.
    ValidationError,
    /// Another step operation is still waiting for its result. Local.
    OperationInFlight,
    /// No response was received from the service.
    NetworkError,
    /// The service answered with an application-level failure.
    BackendError,
    /// Camera access was refused.
    CameraPermissionError,
    /// The camera could not be opened or read.
    CameraHardwareError,
    /// The face-matching service could not use one of the faces.
    FaceDetectionError(FaceDetectionKind),
    /// The comparison completed but the faces differ.
    FaceMismatch,
}

impl ErrorCategory {
    /// Stable snake-case name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingPrerequisite => "missing_prerequisite",
            Self::InvalidStep => "invalid_step",
            Self::ValidationError => "validation_error",
            Self::OperationInFlight => "operation_in_flight",
            Self::NetworkError => "network_error",
            Self::BackendError => "backend_error",
            Self::CameraPermissionError => "camera_permission_error",
            Self::CameraHardwareError => "camera_hardware_error",
            Self::FaceDetectionError(_) => "face_detection_error",
            Self::FaceMismatch => "face_mismatch",
        }
    }

    /// Whether the failed operation can simply be retried.
    ///
    /// Camera failures need the user to reactivate the camera first.
    pub const fn is_recoverable(self) -> bool {
        !matches!(
            self,
            Self::CameraPermissionError | Self::CameraHardwareError
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FaceDetectionError(kind) => {
                write!(f, "{}.{}", self.as_str(), kind.message_class())
            }
            _ => f.write_str(self.as_str()),
        }
    }
}

/// A failure mapped to a stable category and a user-facing message.
///
/// ## Invariants
/// - `raw_message` is the untouched source text.
/// - `recoverable` always equals `category.is_recoverable()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ClassifiedError {
    category: ErrorCategory,
    message: String,
    raw_message: String,
    recoverable: bool,
}

impl ClassifiedError {
    /// Build an error from its parts.
    pub fn new(
        category: ErrorCategory,
        message: impl Into<String>,
        raw_message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            raw_message: raw_message.into(),
            recoverable: category.is_recoverable(),
        }
    }

    fn local(category: ErrorCategory, detail: impl Into<String>) -> Self {
        let text = detail.into();
        Self::new(category, text.clone(), text)
    }

    /// A required session field is absent.
    pub fn missing_prerequisite(detail: impl Into<String>) -> Self {
        Self::local(ErrorCategory::MissingPrerequisite, detail)
    }

    /// The operation was invoked on the wrong step.
    pub fn invalid_step(detail: impl Into<String>) -> Self {
        Self::local(ErrorCategory::InvalidStep, detail)
    }

    /// User input failed local validation.
    pub fn validation(detail: impl Into<String>) -> Self {
        Self::local(ErrorCategory::ValidationError, detail)
    }

    /// Another operation holds the in-flight slot.
    pub fn operation_in_flight(detail: impl Into<String>) -> Self {
        Self::local(ErrorCategory::OperationInFlight, detail)
    }

    /// Classify an application-level failure message from the service.
    ///
    /// Face-detection phrasing maps to [`ErrorCategory::FaceDetectionError`],
    /// network phrasing to [`ErrorCategory::NetworkError`], everything else to
    /// [`ErrorCategory::BackendError`] with the raw text shown verbatim.
    pub fn from_backend(raw: impl Into<String>) -> Self {
        let text = raw.into();
        let class = classify_message(&text);
        if let Some(kind) = class.face_detection_kind() {
            return Self::face_detection(kind, text);
        }
        match class {
            MessageClass::NetworkUnreachable => {
                Self::new(ErrorCategory::NetworkError, NETWORK_MESSAGE, text)
            }
            _ if text.trim().is_empty() => {
                Self::new(ErrorCategory::BackendError, BACKEND_FALLBACK_MESSAGE, text)
            }
            _ => Self::new(ErrorCategory::BackendError, text.clone(), text),
        }
    }

    /// A transport failure: no response was received.
    pub fn from_transport(raw: impl Into<String>) -> Self {
        Self::new(ErrorCategory::NetworkError, NETWORK_MESSAGE, raw)
    }

    /// A response arrived but could not be understood.
    pub fn undecodable_response(raw: impl Into<String>) -> Self {
        Self::new(ErrorCategory::BackendError, DECODE_MESSAGE, raw)
    }

    /// A face-detection failure of the given subtype.
    pub fn face_detection(kind: FaceDetectionKind, raw: impl Into<String>) -> Self {
        let message = kind
            .message_class()
            .user_message()
            .unwrap_or(FACE_MISMATCH_MESSAGE);
        Self::new(ErrorCategory::FaceDetectionError(kind), message, raw)
    }

    /// A completed comparison that found different faces.
    pub fn face_mismatch(raw: impl Into<String>) -> Self {
        Self::new(ErrorCategory::FaceMismatch, FACE_MISMATCH_MESSAGE, raw)
    }

    /// Camera access was refused.
    pub fn camera_permission(raw: impl Into<String>) -> Self {
        Self::new(
            ErrorCategory::CameraPermissionError,
            CAMERA_PERMISSION_MESSAGE,
            raw,
        )
    }

    /// The camera could not be opened or read.
    pub fn camera_hardware(raw: impl Into<String>) -> Self {
        Self::new(ErrorCategory::CameraHardwareError, CAMERA_HARDWARE_MESSAGE, raw)
    }

    /// Failure category.
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// User-facing message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Raw failure text, kept for diagnostics.
    pub fn raw_message(&self) -> &str {
        &self.raw_message
    }

    /// Whether retrying the same operation may succeed.
    pub fn recoverable(&self) -> bool {
        self.recoverable
    }
}
