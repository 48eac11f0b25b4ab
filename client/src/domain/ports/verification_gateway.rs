//! Driven port for the remote verification service.
//!
//! The domain owns the request and response shapes so the step state machine
//! stays independent of the HTTP adapter.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::{ClassifiedError, DocumentFields, FaceMatchResult, ImagePayload, OtpCode};

/// Inputs for one face comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceVerificationRequest {
    /// Portrait extracted from the identity document.
    pub document_photo: ImagePayload,
    /// Still frame captured from the camera.
    pub live_capture: ImagePayload,
    /// Phone number from the document, forwarded for correlation.
    pub phone_number: String,
}

define_port_error! {
    /// Errors surfaced while calling the verification service.
    pub enum VerificationGatewayError {
        /// No response was received.
        Transport {
            /// Transport diagnostic.
            message: String,
        } => "verification service transport failed: {message}",
        /// The service answered with an application-level failure.
        Rejected {
            /// Message returned by the service.
            message: String,
        } => "verification service rejected request: {message}",
        /// The response body did not have the expected shape.
        Decode {
            /// Decoder diagnostic.
            message: String,
        } => "verification service response decode failed: {message}",
    }
}

impl VerificationGatewayError {
    /// Failure text as reported by the transport or the service.
    pub fn detail(&self) -> &str {
        match self {
            Self::Transport { message } | Self::Rejected { message } | Self::Decode { message } => {
                message
            }
        }
    }
}

/// Port for the five remote operations of a verification attempt.
///
/// A completed face comparison is a successful call even when the faces do
/// not match; the result carries `matched = false`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VerificationGateway: Send + Sync {
    /// Run OCR over the document image and return the extracted fields.
    async fn extract_document(
        &self,
        image: &ImagePayload,
    ) -> Result<DocumentFields, VerificationGatewayError>;

    /// Compare the live capture against the document portrait.
    async fn verify_face(
        &self,
        request: &FaceVerificationRequest,
    ) -> Result<FaceMatchResult, VerificationGatewayError>;

    /// Issue a one-time code to the phone number.
    async fn generate_code(&self, phone_number: &str) -> Result<(), VerificationGatewayError>;

    /// Re-issue a one-time code to the phone number.
    async fn resend_code(&self, phone_number: &str) -> Result<(), VerificationGatewayError>;

    /// Check the code the user entered.
    async fn verify_code(
        &self,
        phone_number: &str,
        code: &OtpCode,
    ) -> Result<(), VerificationGatewayError>;
}

impl From<VerificationGatewayError> for ClassifiedError {
    fn from(err: VerificationGatewayError) -> Self {
        match err {
            VerificationGatewayError::Transport { message } => Self::from_transport(message),
            VerificationGatewayError::Rejected { message } => Self::from_backend(message),
            VerificationGatewayError::Decode { message } => Self::undecodable_response(message),
        }
    }
}
