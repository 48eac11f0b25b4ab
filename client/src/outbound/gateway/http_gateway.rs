//! Reqwest-backed verification service adapter.
//!
//! This adapter owns transport details only: request encoding, timeout and
//! HTTP error mapping, and decoding of the response envelope into domain
//! records.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url, multipart};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::dto::{
    DocumentDataDto, EnvelopeDto, ErrorBodyDto, FaceDataDto, FaceVerificationBodyDto,
    decode_envelope,
};
use crate::domain::ports::{
    FaceVerificationRequest, VerificationGateway, VerificationGatewayError,
};
use crate::domain::{DocumentFields, FaceMatchResult, ImagePayload, OtpCode};

const EXTRACT_DOCUMENT_PATH: &str = "api/aadhaar/extract-aadhaar-data";
const VERIFY_FACE_PATH: &str = "api/face/verify-face";
const GENERATE_CODE_PATH: &str = "api/otp/generate-otp";
const RESEND_CODE_PATH: &str = "api/otp/resend-otp";
const VERIFY_CODE_PATH: &str = "api/otp/verify-otp";

/// Errors raised while building the adapter.
#[derive(Debug, thiserror::Error)]
pub enum HttpGatewayBuildError {
    /// The reqwest client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    /// An endpoint URL could not be derived from the base URL.
    #[error("invalid endpoint URL: {0}")]
    Endpoint(#[from] url::ParseError),
}

struct Endpoints {
    extract_document: Url,
    verify_face: Url,
    generate_code: Url,
    resend_code: Url,
    verify_code: Url,
}

impl Endpoints {
    fn resolve(base_url: &Url) -> Result<Self, url::ParseError> {
        let base = with_trailing_slash(base_url);
        Ok(Self {
            extract_document: base.join(EXTRACT_DOCUMENT_PATH)?,
            verify_face: base.join(VERIFY_FACE_PATH)?,
            generate_code: base.join(GENERATE_CODE_PATH)?,
            resend_code: base.join(RESEND_CODE_PATH)?,
            verify_code: base.join(VERIFY_CODE_PATH)?,
        })
    }
}

/// Ensure relative joins append to the base path instead of replacing its
/// last segment.
fn with_trailing_slash(base_url: &Url) -> Url {
    let mut base = base_url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

/// Verification service adapter performing HTTP requests against one base URL.
pub struct HttpVerificationGateway {
    client: Client,
    endpoints: Endpoints,
}

impl HttpVerificationGateway {
    /// Build an adapter using a reqwest client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed or the
    /// base URL cannot carry the endpoint paths.
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, HttpGatewayBuildError> {
        let client = Client::builder().timeout(timeout).build()?;
        let endpoints = Endpoints::resolve(base_url)?;
        Ok(Self { client, endpoints })
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Vec<u8>, VerificationGatewayError> {
        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let url = response.url().clone();
        let body = response.bytes().await.map_err(map_transport_error)?;
        debug!(endpoint = %url, status = status.as_u16(), bytes = body.len(), "verification service responded");
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        Ok(body.to_vec())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<EnvelopeDto<T>, VerificationGatewayError> {
        let body = self.execute(request).await?;
        let envelope: EnvelopeDto<T> =
            decode_envelope(&body).map_err(VerificationGatewayError::decode)?;
        if !envelope.success {
            return Err(VerificationGatewayError::rejected(envelope.failure_message()));
        }
        Ok(envelope)
    }

    async fn post_phone_form(
        &self,
        url: &Url,
        fields: &[(&str, &str)],
    ) -> Result<(), VerificationGatewayError> {
        let request = self.client.post(url.clone()).form(fields);
        self.call::<serde_json::Value>(request).await.map(|_| ())
    }
}

#[async_trait]
impl VerificationGateway for HttpVerificationGateway {
    async fn extract_document(
        &self,
        image: &ImagePayload,
    ) -> Result<DocumentFields, VerificationGatewayError> {
        let part = multipart::Part::bytes(image.as_bytes().to_vec())
            .file_name(upload_file_name(image.media_type()))
            .mime_str(image.media_type())
            .map_err(|error| {
                VerificationGatewayError::transport(format!(
                    "invalid document media type `{}`: {error}",
                    image.media_type()
                ))
            })?;
        let form = multipart::Form::new().part("file", part);
        let request = self
            .client
            .post(self.endpoints.extract_document.clone())
            .multipart(form);
        let envelope = self.call::<DocumentDataDto>(request).await?;
        envelope
            .data
            .ok_or_else(|| VerificationGatewayError::decode("extraction response has no data"))?
            .into_domain()
            .map_err(VerificationGatewayError::decode)
    }

    async fn verify_face(
        &self,
        request: &FaceVerificationRequest,
    ) -> Result<FaceMatchResult, VerificationGatewayError> {
        let body = FaceVerificationBodyDto::new(
            request.document_photo.as_bytes(),
            request.live_capture.as_bytes(),
            &request.phone_number,
        );
        let http_request = self
            .client
            .post(self.endpoints.verify_face.clone())
            .json(&body);
        let envelope = self.call::<FaceDataDto>(http_request).await?;
        let message = envelope.message;
        envelope
            .data
            .map(|data| data.into_domain(message))
            .ok_or_else(|| VerificationGatewayError::decode("face verification response has no data"))
    }

    async fn generate_code(&self, phone_number: &str) -> Result<(), VerificationGatewayError> {
        self.post_phone_form(&self.endpoints.generate_code, &[("phone", phone_number)])
            .await
    }

    async fn resend_code(&self, phone_number: &str) -> Result<(), VerificationGatewayError> {
        self.post_phone_form(&self.endpoints.resend_code, &[("phone", phone_number)])
            .await
    }

    async fn verify_code(
        &self,
        phone_number: &str,
        code: &OtpCode,
    ) -> Result<(), VerificationGatewayError> {
        self.post_phone_form(
            &self.endpoints.verify_code,
            &[("phone", phone_number), ("otp", code.as_str())],
        )
        .await
    }
}

fn upload_file_name(media_type: &str) -> &'static str {
    match media_type {
        "image/png" => "document.png",
        "image/webp" => "document.webp",
        _ => "document.jpg",
    }
}

fn map_transport_error(error: reqwest::Error) -> VerificationGatewayError {
    if error.is_timeout() {
        VerificationGatewayError::transport(format!("request timed out: {error}"))
    } else {
        VerificationGatewayError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> VerificationGatewayError {
    let detail = serde_json::from_slice::<ErrorBodyDto>(body)
        .ok()
        .and_then(ErrorBodyDto::into_message);
    if let Some(message) = detail {
        return VerificationGatewayError::rejected(message);
    }

    let body_preview = body_preview(body);
    let message = if body_preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), body_preview)
    };
    match status {
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            VerificationGatewayError::transport(format!("network error, {message}"))
        }
        _ => VerificationGatewayError::rejected(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
