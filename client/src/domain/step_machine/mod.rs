//! Forward-only orchestration of one verification attempt.
//!
//! `StepStateMachine` owns the [`VerificationSession`] and sequences the
//! remote operations: document extraction, face comparison, code issuance and
//! code confirmation. Each operation is valid on exactly one step, leaves the
//! step untouched on failure and advances it by one on success. Only one
//! operation may wait on the network at a time.

mod gate;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};
use uuid::Uuid;

use self::gate::{InFlightGate, InFlightPermit};
use super::camera::{CameraCaptureSession, CaptureEvent};
use super::ports::{FaceVerificationRequest, VerificationGateway};
use super::{
    CapturedFrame, ClassifiedError, DocumentFields, FaceMatchResult, ImagePayload, MessageClass,
    OtpCode, Step, VerificationSession, classify_message,
};

/// Step-bound operations exposed by [`StepStateMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepOperation {
    /// Upload the identity document.
    SubmitDocument,
    /// Compare a live capture against the document photo.
    SubmitLiveCapture,
    /// Ask for a one-time code.
    RequestCode,
    /// Ask for a fresh one-time code.
    ResendCode,
    /// Confirm the one-time code.
    ConfirmCode,
}

impl StepOperation {
    /// The only step on which the operation may run.
    pub const fn designated_step(self) -> Step {
        match self {
            Self::SubmitDocument => Step::DocumentUpload,
            Self::SubmitLiveCapture => Step::LiveFaceCheck,
            Self::RequestCode => Step::GenerateCode,
            Self::ResendCode | Self::ConfirmCode => Step::VerifyCode,
        }
    }

    /// Stable snake-case name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SubmitDocument => "submit_document",
            Self::SubmitLiveCapture => "submit_live_capture",
            Self::RequestCode => "request_code",
            Self::ResendCode => "resend_code",
            Self::ConfirmCode => "confirm_code",
        }
    }
}

impl fmt::Display for StepOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Admission to run one operation against one attempt.
struct Ticket<'a> {
    operation: StepOperation,
    attempt_id: Uuid,
    _permit: InFlightPermit<'a>,
}

/// Sequences the verification steps for one user.
///
/// ## Invariants
/// - The session step never decreases except through [`Self::reset`].
/// - At most one operation is awaiting the gateway at any time.
/// - Results that arrive after a reset are discarded.
pub struct StepStateMachine {
    gateway: Arc<dyn VerificationGateway>,
    session: Mutex<VerificationSession>,
    gate: InFlightGate,
    camera: Mutex<Option<Arc<CameraCaptureSession>>>,
}

impl StepStateMachine {
    /// Start a fresh attempt backed by `gateway`.
    pub fn new(gateway: Arc<dyn VerificationGateway>) -> Self {
        Self {
            gateway,
            session: Mutex::new(VerificationSession::new()),
            gate: InFlightGate::default(),
            camera: Mutex::new(None),
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, VerificationSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_camera(&self) -> MutexGuard<'_, Option<Arc<CameraCaptureSession>>> {
        self.camera.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current step.
    pub fn step(&self) -> Step {
        self.lock_session().step()
    }

    /// Snapshot of the session.
    pub fn session(&self) -> VerificationSession {
        self.lock_session().clone()
    }

    /// Operation currently waiting on the gateway, if any.
    pub fn pending_operation(&self) -> Option<StepOperation> {
        self.gate.current()
    }

    /// Attach the camera whose device [`Self::reset`] should release.
    pub fn attach_camera(&self, camera: Arc<CameraCaptureSession>) {
        *self.lock_camera() = Some(camera);
    }

    /// Camera attached with [`Self::attach_camera`].
    pub fn camera(&self) -> Option<Arc<CameraCaptureSession>> {
        self.lock_camera().clone()
    }

    /// Abandon the attempt and start over on [`Step::DocumentUpload`].
    ///
    /// Any attached camera is deactivated. A call still in flight keeps the
    /// gate until it returns; its result is then discarded.
    pub fn reset(&self) {
        let retired = {
            let mut session = self.lock_session();
            let attempt_id = session.attempt_id();
            *session = VerificationSession::new();
            attempt_id
        };
        if let Some(camera) = self.camera() {
            camera.deactivate();
        }
        info!(attempt_id = %retired, "verification attempt reset");
    }

    fn begin(&self, operation: StepOperation) -> Result<Ticket<'_>, ClassifiedError> {
        let (attempt_id, step) = {
            let session = self.lock_session();
            (session.attempt_id(), session.step())
        };
        if step != operation.designated_step() {
            debug!(%attempt_id, %step, %operation, "operation rejected on current step");
            return Err(ClassifiedError::invalid_step(format!(
                "{operation} is only available on {}, current step is {step}",
                operation.designated_step()
            )));
        }
        let permit = self.gate.try_acquire(operation).map_err(|busy| {
            debug!(%attempt_id, %operation, pending = %busy, "operation rejected while busy");
            ClassifiedError::operation_in_flight(format!(
                "{busy} is still waiting for a response"
            ))
        })?;
        debug!(%attempt_id, %step, %operation, "operation started");
        Ok(Ticket {
            operation,
            attempt_id,
            _permit: permit,
        })
    }

    /// Apply an outcome to the session it was started against.
    fn settle<T>(
        &self,
        ticket: &Ticket<'_>,
        apply: impl FnOnce(&mut VerificationSession) -> Result<T, ClassifiedError>,
    ) -> Result<T, ClassifiedError> {
        let operation = ticket.operation;
        let mut session = self.lock_session();
        if session.attempt_id() != ticket.attempt_id {
            warn!(
                attempt_id = %ticket.attempt_id,
                %operation,
                "discarding result for an attempt that was reset"
            );
            return Err(ClassifiedError::invalid_step(format!(
                "the attempt was reset while {operation} was in flight"
            )));
        }
        let outcome = apply(&mut session);
        let attempt_id = session.attempt_id();
        let step = session.step();
        match &outcome {
            Ok(_) => {
                session.clear_error();
                info!(%attempt_id, %step, %operation, "operation succeeded");
            }
            Err(err) => {
                session.record_error(err.clone());
                warn!(
                    %attempt_id,
                    %step,
                    %operation,
                    category = %err.category(),
                    raw = err.raw_message(),
                    "operation failed"
                );
            }
        }
        outcome
    }

    /// Upload the identity document and store the extracted fields.
    ///
    /// # Errors
    /// `InvalidStep` off [`Step::DocumentUpload`], `ValidationError` for an
    /// empty image, otherwise the classified gateway failure.
    pub async fn submit_document(
        &self,
        document: &ImagePayload,
    ) -> Result<DocumentFields, ClassifiedError> {
        let ticket = self.begin(StepOperation::SubmitDocument)?;
        if document.is_empty() {
            return self.settle(&ticket, |_| {
                Err(ClassifiedError::validation("the document image is empty"))
            });
        }
        let outcome = self
            .gateway
            .extract_document(document)
            .await
            .map_err(ClassifiedError::from);
        self.settle(&ticket, |session| {
            let fields = outcome?;
            session.record_document(fields.clone());
            session.advance_from(Step::DocumentUpload);
            Ok(fields)
        })
    }

    /// Compare the last of `frames` against the document photo.
    ///
    /// A completed comparison that does not match is reported as an error
    /// while its result is still stored on the session.
    ///
    /// # Errors
    /// `MissingPrerequisite` without a document phone number or photo,
    /// `ValidationError` for an empty frame list, `FaceDetectionError` or
    /// `FaceMismatch` for a non-match, otherwise the classified gateway
    /// failure.
    pub async fn submit_live_capture(
        &self,
        frames: &[CapturedFrame],
    ) -> Result<FaceMatchResult, ClassifiedError> {
        let ticket = self.begin(StepOperation::SubmitLiveCapture)?;
        let prerequisites = {
            let session = self.lock_session();
            live_capture_prerequisites(session.document())
        };
        let (phone_number, document_photo) = match prerequisites {
            Ok(found) => found,
            Err(err) => return self.settle(&ticket, |_| Err(err)),
        };
        let Some(frame) = frames.last() else {
            return self.settle(&ticket, |_| {
                Err(ClassifiedError::validation("no frame was captured"))
            });
        };
        let request = FaceVerificationRequest {
            document_photo,
            live_capture: frame.image.clone(),
            phone_number,
        };
        let outcome = self
            .gateway
            .verify_face(&request)
            .await
            .map_err(ClassifiedError::from);
        self.settle(&ticket, |session| {
            let result = outcome?;
            session.record_face_result(result.clone());
            if !result.matched {
                return Err(classify_non_match(&result));
            }
            session.record_phone_number(request.phone_number);
            session.advance_from(Step::LiveFaceCheck);
            Ok(result)
        })
    }

    /// Forward a camera event to the live face check.
    ///
    /// # Errors
    /// As [`Self::submit_live_capture`] for captured frames; the camera error
    /// itself for a failed capture.
    pub async fn submit_capture_event(
        &self,
        event: CaptureEvent,
    ) -> Result<FaceMatchResult, ClassifiedError> {
        match event {
            CaptureEvent::Captured(frames) => self.submit_live_capture(&frames).await,
            CaptureEvent::Failed(err) => {
                let ticket = self.begin(StepOperation::SubmitLiveCapture)?;
                self.settle(&ticket, |_| Err(err))
            }
        }
    }

    /// Ask the service to send a one-time code.
    ///
    /// # Errors
    /// `InvalidStep` off [`Step::GenerateCode`], `MissingPrerequisite` without
    /// a confirmed phone number, otherwise the classified gateway failure.
    pub async fn request_code(&self) -> Result<(), ClassifiedError> {
        let ticket = self.begin(StepOperation::RequestCode)?;
        let phone_number = match self.confirmed_phone_number() {
            Ok(phone_number) => phone_number,
            Err(err) => return self.settle(&ticket, |_| Err(err)),
        };
        let outcome = self
            .gateway
            .generate_code(&phone_number)
            .await
            .map_err(ClassifiedError::from);
        self.settle(&ticket, |session| {
            outcome?;
            session.advance_from(Step::GenerateCode);
            Ok(())
        })
    }

    /// Ask the service to send a fresh one-time code. Never moves the step.
    ///
    /// # Errors
    /// `InvalidStep` off [`Step::VerifyCode`], `MissingPrerequisite` without
    /// a confirmed phone number, otherwise the classified gateway failure.
    pub async fn resend_code(&self) -> Result<(), ClassifiedError> {
        let ticket = self.begin(StepOperation::ResendCode)?;
        let phone_number = match self.confirmed_phone_number() {
            Ok(phone_number) => phone_number,
            Err(err) => return self.settle(&ticket, |_| Err(err)),
        };
        let outcome = self
            .gateway
            .resend_code(&phone_number)
            .await
            .map_err(ClassifiedError::from);
        self.settle(&ticket, |_| outcome)
    }

    /// Confirm the code the user typed and complete the attempt.
    ///
    /// # Errors
    /// `InvalidStep` off [`Step::VerifyCode`], `ValidationError` unless `raw`
    /// is exactly six ASCII digits, otherwise the classified gateway failure.
    pub async fn confirm_code(&self, raw: &str) -> Result<(), ClassifiedError> {
        let ticket = self.begin(StepOperation::ConfirmCode)?;
        let code = match OtpCode::parse(raw) {
            Ok(code) => code,
            Err(err) => {
                return self.settle(&ticket, |_| Err(ClassifiedError::validation(err.to_string())));
            }
        };
        let phone_number = match self.confirmed_phone_number() {
            Ok(phone_number) => phone_number,
            Err(err) => return self.settle(&ticket, |_| Err(err)),
        };
        let outcome = self
            .gateway
            .verify_code(&phone_number, &code)
            .await
            .map_err(ClassifiedError::from);
        self.settle(&ticket, |session| {
            outcome?;
            session.mark_otp_verified();
            session.advance_from(Step::VerifyCode);
            Ok(())
        })
    }

    fn confirmed_phone_number(&self) -> Result<String, ClassifiedError> {
        self.lock_session()
            .phone_number()
            .map(str::to_owned)
            .ok_or_else(|| {
                ClassifiedError::missing_prerequisite(
                    "a phone number confirmed by the face check is required",
                )
            })
    }
}

impl fmt::Debug for StepStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepStateMachine")
            .field("session", &*self.lock_session())
            .field("pending", &self.pending_operation())
            .finish_non_exhaustive()
    }
}

fn live_capture_prerequisites(
    uploaded: Option<&DocumentFields>,
) -> Result<(String, ImagePayload), ClassifiedError> {
    let document = uploaded.ok_or_else(|| {
        ClassifiedError::missing_prerequisite("the document must be uploaded first")
    })?;
    let phone_number = document
        .phone_number
        .as_deref()
        .filter(|phone| !phone.trim().is_empty())
        .ok_or_else(|| {
            ClassifiedError::missing_prerequisite("the document did not yield a phone number")
        })?;
    let photo = document
        .document_photo
        .as_ref()
        .filter(|photo| !photo.is_empty())
        .ok_or_else(|| {
            ClassifiedError::missing_prerequisite("the document did not yield a photo")
        })?;
    Ok((phone_number.to_owned(), photo.clone()))
}

/// Error for a comparison that completed without a match.
///
/// The reported `error_type` wins; the message is consulted only when the
/// type names no face-detection subtype.
fn classify_non_match(result: &FaceMatchResult) -> ClassifiedError {
    let raw = result.error_type.as_deref().map_or_else(
        || result.message.clone(),
        |error_type| format!("{error_type}: {}", result.message),
    );
    result
        .error_type
        .as_deref()
        .map(classify_message)
        .and_then(MessageClass::face_detection_kind)
        .or_else(|| classify_message(&result.message).face_detection_kind())
        .map_or_else(
            || ClassifiedError::face_mismatch(raw.clone()),
            |kind| ClassifiedError::face_detection(kind, raw.clone()),
        )
}

#[cfg(test)]
mod tests;
