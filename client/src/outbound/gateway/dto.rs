//! DTOs for the verification service's JSON bodies.
//!
//! Responses decode into these transport DTOs first and are mapped into
//! domain records in one pass. Field aliases cover the spellings the service
//! has used across versions.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::{DocumentFields, FaceMatchResult, ImagePayload};

/// Common response envelope.
#[derive(Debug, Deserialize)]
pub(super) struct EnvelopeDto<T> {
    pub(super) success: bool,
    #[serde(default)]
    pub(super) message: Option<String>,
    pub(super) data: Option<T>,
    #[serde(default)]
    pub(super) error: Option<String>,
}

impl<T> EnvelopeDto<T> {
    /// Failure text for a `success: false` envelope.
    pub(super) fn failure_message(&self) -> String {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .filter(|text| !text.trim().is_empty())
            .map_or_else(|| "request failed".to_owned(), str::to_owned)
    }
}

/// Decode an envelope body.
pub(super) fn decode_envelope<T: DeserializeOwned>(body: &[u8]) -> Result<EnvelopeDto<T>, String> {
    serde_json::from_slice(body).map_err(|error| format!("invalid response envelope: {error}"))
}

/// Body of a non-2xx response.
#[derive(Debug, Default, Deserialize)]
pub(super) struct ErrorBodyDto {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBodyDto {
    /// Human-readable failure text, if the body carries one.
    pub(super) fn into_message(self) -> Option<String> {
        let detail = self.detail.and_then(|value| match value {
            serde_json::Value::String(text) => Some(text),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        });
        detail
            .or(self.message)
            .or(self.error)
            .filter(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct DocumentDataDto {
    #[serde(
        default,
        alias = "documentNumber",
        alias = "document_number",
        alias = "aadhaarNumber"
    )]
    aadhaar_number: Option<String>,
    #[serde(default, alias = "phoneNumber", alias = "phone_number")]
    phone: Option<String>,
    #[serde(default, alias = "dob", alias = "dateOfBirth")]
    date_of_birth: Option<String>,
    #[serde(
        default,
        alias = "documentPhoto",
        alias = "document_photo",
        alias = "aadhaar_photo"
    )]
    photo: Option<String>,
}

impl DocumentDataDto {
    pub(super) fn into_domain(self) -> Result<DocumentFields, String> {
        let document_photo = self
            .photo
            .filter(|encoded| !encoded.trim().is_empty())
            .map(|encoded| decode_image(&encoded))
            .transpose()?;
        Ok(DocumentFields {
            document_number: non_blank(self.aadhaar_number),
            phone_number: non_blank(self.phone),
            date_of_birth: non_blank(self.date_of_birth),
            document_photo,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct FaceDataDto {
    #[serde(rename = "match", alias = "matched")]
    matched: bool,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, alias = "face_distance")]
    distance: Option<f64>,
    #[serde(default)]
    threshold: Option<f64>,
    #[serde(default, alias = "errorType")]
    error_type: Option<String>,
}

impl FaceDataDto {
    /// Map to the domain result, falling back to the envelope message.
    pub(super) fn into_domain(self, envelope_message: Option<String>) -> FaceMatchResult {
        FaceMatchResult {
            matched: self.matched,
            confidence: self.confidence,
            message: self.message.or(envelope_message).unwrap_or_default(),
            error_type: non_blank(self.error_type),
            distance: self.distance,
            threshold: self.threshold,
        }
    }
}

/// JSON body for the face comparison endpoint.
#[derive(Debug, Serialize)]
pub(super) struct FaceVerificationBodyDto<'a> {
    pub(super) aadhaar_photo_base64: String,
    pub(super) live_photo_base64: String,
    pub(super) phone_number: &'a str,
}

impl<'a> FaceVerificationBodyDto<'a> {
    pub(super) fn new(document_photo: &[u8], live_capture: &[u8], phone_number: &'a str) -> Self {
        Self {
            aadhaar_photo_base64: STANDARD.encode(document_photo),
            live_photo_base64: STANDARD.encode(live_capture),
            phone_number,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

/// Decode raw base64 or a `data:<type>;base64,<payload>` URL.
pub(super) fn decode_image(encoded: &str) -> Result<ImagePayload, String> {
    let trimmed = encoded.trim();
    let (media_type, payload) = match trimmed.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| "data URL has no payload".to_owned())?;
            let media_type = header.strip_suffix(";base64").ok_or_else(|| {
                format!("data URL `{header}` is not base64 encoded")
            })?;
            (media_type, data)
        }
        None => ("image/jpeg", trimmed),
    };
    let bytes = STANDARD
        .decode(payload)
        .map_err(|error| format!("document photo is not valid base64: {error}"))?;
    let resolved_type = if media_type.is_empty() {
        "image/jpeg"
    } else {
        media_type
    };
    Ok(ImagePayload::new(bytes, resolved_type))
}
