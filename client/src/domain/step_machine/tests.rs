//! Regression coverage for step sequencing.

use std::sync::Arc;

use rstest::{fixture, rstest};
use tokio::sync::Notify;

use super::*;
use crate::domain::ports::{
    CountdownTimer, FrameEncoder, MediaCapture, MockVerificationGateway, VerificationGatewayError,
};
use crate::domain::{CameraState, ErrorCategory, FaceDetectionKind};
use crate::test_support::gateway::{
    GatewayCall, SAMPLE_PHONE_NUMBER, ScriptedGateway, face_result, sample_document_fields,
};
use crate::test_support::media::{FakeMediaCapture, RawFrameEncoder};
use crate::test_support::timer::ManualCountdownTimer;

fn document() -> ImagePayload {
    ImagePayload::jpeg(vec![0xFF, 0xD8, 0x00, 0xFF, 0xD9])
}

fn frame(sequence: u64, fill: u8) -> CapturedFrame {
    CapturedFrame {
        image: ImagePayload::jpeg(vec![fill; 8]),
        captured_at_sequence: sequence,
    }
}

#[fixture]
fn scripted() -> Arc<ScriptedGateway> {
    Arc::new(ScriptedGateway::new())
}

fn machine_over(gateway: &Arc<ScriptedGateway>) -> StepStateMachine {
    StepStateMachine::new(Arc::clone(gateway) as Arc<dyn VerificationGateway>)
}

async fn advance_to(machine: &StepStateMachine, gateway: &ScriptedGateway, target: Step) {
    if target > Step::DocumentUpload {
        gateway.push_extract(Ok(sample_document_fields()));
        machine.submit_document(&document()).await.expect("document accepted");
    }
    if target > Step::LiveFaceCheck {
        gateway.push_verify_face(Ok(face_result(true, 92.3)));
        machine
            .submit_live_capture(&[frame(0, 1)])
            .await
            .expect("faces match");
    }
    if target > Step::GenerateCode {
        gateway.push_generate_code(Ok(()));
        machine.request_code().await.expect("code issued");
    }
    if target > Step::VerifyCode {
        gateway.push_verify_code(Ok(()));
        machine.confirm_code("123456").await.expect("code confirmed");
    }
    assert_eq!(machine.step(), target);
}

#[rstest]
#[tokio::test]
async fn successful_document_upload_stores_fields_and_advances(scripted: Arc<ScriptedGateway>) {
    let machine = machine_over(&scripted);
    scripted.push_extract(Ok(sample_document_fields()));

    let fields = machine
        .submit_document(&document())
        .await
        .expect("document accepted");

    assert_eq!(fields.phone_number.as_deref(), Some(SAMPLE_PHONE_NUMBER));
    let session = machine.session();
    assert_eq!(session.step(), Step::LiveFaceCheck);
    assert_eq!(session.document(), Some(&fields));
    assert!(session.last_error().is_none());
}

#[rstest]
#[tokio::test]
async fn empty_document_is_rejected_locally() {
    let gateway = MockVerificationGateway::new();
    let machine = StepStateMachine::new(Arc::new(gateway));

    let err = machine
        .submit_document(&ImagePayload::jpeg(Vec::new()))
        .await
        .expect_err("empty image");

    assert_eq!(err.category(), ErrorCategory::ValidationError);
    assert_eq!(machine.step(), Step::DocumentUpload);
    assert_eq!(machine.session().last_error(), Some(&err));
}

#[rstest]
#[tokio::test]
async fn failed_document_upload_keeps_step_and_records_error(scripted: Arc<ScriptedGateway>) {
    let machine = machine_over(&scripted);
    scripted.push_extract(Err(VerificationGatewayError::rejected(
        "Could not read the document",
    )));

    let err = machine
        .submit_document(&document())
        .await
        .expect_err("backend rejects");

    assert_eq!(err.category(), ErrorCategory::BackendError);
    assert_eq!(err.message(), "Could not read the document");
    assert_eq!(machine.step(), Step::DocumentUpload);
    assert_eq!(machine.session().last_error(), Some(&err));
}

#[rstest]
#[case::submit_live_capture(StepOperation::SubmitLiveCapture)]
#[case::request_code(StepOperation::RequestCode)]
#[case::resend_code(StepOperation::ResendCode)]
#[case::confirm_code(StepOperation::ConfirmCode)]
#[tokio::test]
async fn operations_off_their_step_fail_without_side_effects(#[case] operation: StepOperation) {
    let gateway = MockVerificationGateway::new();
    let machine = StepStateMachine::new(Arc::new(gateway));

    let err = run(&machine, operation).await.expect_err("wrong step");
    assert_eq!(err.category(), ErrorCategory::InvalidStep);
    assert_eq!(machine.step(), Step::DocumentUpload);
    assert!(machine.session().last_error().is_none());
}

async fn run(machine: &StepStateMachine, operation: StepOperation) -> Result<(), ClassifiedError> {
    match operation {
        StepOperation::SubmitDocument => machine.submit_document(&document()).await.map(|_| ()),
        StepOperation::SubmitLiveCapture => machine
            .submit_live_capture(&[frame(0, 1)])
            .await
            .map(|_| ()),
        StepOperation::RequestCode => machine.request_code().await,
        StepOperation::ResendCode => machine.resend_code().await,
        StepOperation::ConfirmCode => machine.confirm_code("123456").await,
    }
}

#[rstest]
#[tokio::test]
async fn live_capture_without_phone_makes_no_call(scripted: Arc<ScriptedGateway>) {
    let machine = machine_over(&scripted);
    let mut fields = sample_document_fields();
    fields.phone_number = None;
    scripted.push_extract(Ok(fields));
    machine.submit_document(&document()).await.expect("accepted");

    let err = machine
        .submit_live_capture(&[frame(0, 1)])
        .await
        .expect_err("phone missing");

    assert_eq!(err.category(), ErrorCategory::MissingPrerequisite);
    assert_eq!(machine.step(), Step::LiveFaceCheck);
    assert_eq!(scripted.call_count(), 1);
}

#[rstest]
#[tokio::test]
async fn live_capture_without_frames_is_a_validation_error(scripted: Arc<ScriptedGateway>) {
    let machine = machine_over(&scripted);
    advance_to(&machine, &scripted, Step::LiveFaceCheck).await;

    let err = machine
        .submit_live_capture(&[])
        .await
        .expect_err("no frames");

    assert_eq!(err.category(), ErrorCategory::ValidationError);
    assert_eq!(scripted.call_count(), 1);
}

#[rstest]
#[tokio::test]
async fn live_capture_uses_the_last_frame(scripted: Arc<ScriptedGateway>) {
    let machine = machine_over(&scripted);
    advance_to(&machine, &scripted, Step::LiveFaceCheck).await;
    scripted.push_verify_face(Ok(face_result(true, 92.3)));
    let last = CapturedFrame {
        image: ImagePayload::jpeg(vec![7; 32]),
        captured_at_sequence: 2,
    };

    machine
        .submit_live_capture(&[frame(0, 1), frame(1, 2), last])
        .await
        .expect("faces match");

    assert_eq!(
        scripted.calls().last(),
        Some(&GatewayCall::VerifyFace {
            phone_number: SAMPLE_PHONE_NUMBER.to_owned(),
            live_bytes: 32,
        })
    );
    let session = machine.session();
    assert_eq!(session.step(), Step::GenerateCode);
    assert_eq!(session.phone_number(), Some(SAMPLE_PHONE_NUMBER));
}

#[rstest]
#[case::typed(Some("NO_FACE_LIVE"), "Face verification failed", ErrorCategory::FaceDetectionError(FaceDetectionKind::NoFaceInLiveCapture))]
#[case::from_message(None, "Multiple faces detected in Aadhaar photo", ErrorCategory::FaceDetectionError(FaceDetectionKind::MultipleFacesInDocument))]
#[case::type_wins(Some("FACE_TOO_SMALL"), "No face detected in live photo", ErrorCategory::FaceDetectionError(FaceDetectionKind::FaceTooSmall))]
#[case::plain_mismatch(None, "Face verification failed", ErrorCategory::FaceMismatch)]
#[case::unknown_type(Some("LOW_CONFIDENCE"), "Face verification failed", ErrorCategory::FaceMismatch)]
#[tokio::test]
async fn non_match_stays_on_live_face_check(
    #[case] error_type: Option<&str>,
    #[case] message: &str,
    #[case] expected: ErrorCategory,
) {
    let scripted = Arc::new(ScriptedGateway::new());
    let machine = machine_over(&scripted);
    advance_to(&machine, &scripted, Step::LiveFaceCheck).await;
    let mut result = face_result(false, 12.0);
    result.error_type = error_type.map(str::to_owned);
    result.message = message.to_owned();
    scripted.push_verify_face(Ok(result.clone()));

    let err = machine
        .submit_live_capture(&[frame(0, 1)])
        .await
        .expect_err("faces differ");

    assert_eq!(err.category(), expected);
    let session = machine.session();
    assert_eq!(session.step(), Step::LiveFaceCheck);
    assert_eq!(session.face_result(), Some(&result));
    assert!(session.phone_number().is_none());
}

#[rstest]
#[tokio::test]
async fn request_code_failure_keeps_generate_code(scripted: Arc<ScriptedGateway>) {
    let machine = machine_over(&scripted);
    advance_to(&machine, &scripted, Step::GenerateCode).await;
    scripted.push_generate_code(Err(VerificationGatewayError::rejected("invalid phone")));

    let err = machine.request_code().await.expect_err("rejected");

    assert_eq!(err.category(), ErrorCategory::BackendError);
    assert_eq!(err.raw_message(), "invalid phone");
    assert_eq!(machine.step(), Step::GenerateCode);
}

#[rstest]
#[tokio::test]
async fn transport_failure_is_a_network_error(scripted: Arc<ScriptedGateway>) {
    let machine = machine_over(&scripted);
    advance_to(&machine, &scripted, Step::GenerateCode).await;
    scripted.push_generate_code(Err(VerificationGatewayError::transport(
        "error sending request for url (http://localhost:8000/api/otp/generate-otp)",
    )));

    let err = machine.request_code().await.expect_err("offline");

    assert_eq!(err.category(), ErrorCategory::NetworkError);
    assert!(err.recoverable());
    assert_eq!(machine.step(), Step::GenerateCode);
}

#[rstest]
#[tokio::test]
async fn resend_code_never_moves_the_step(scripted: Arc<ScriptedGateway>) {
    let machine = machine_over(&scripted);
    advance_to(&machine, &scripted, Step::VerifyCode).await;
    scripted.push_resend_code(Ok(()));

    machine.resend_code().await.expect("code re-issued");

    assert_eq!(machine.step(), Step::VerifyCode);
    assert_eq!(
        scripted.calls().last(),
        Some(&GatewayCall::ResendCode {
            phone_number: SAMPLE_PHONE_NUMBER.to_owned(),
        })
    );
}

#[rstest]
#[case("12a456")]
#[case("12345")]
#[case("1234567")]
#[case(" 123456")]
#[tokio::test]
async fn malformed_codes_never_reach_the_gateway(#[case] raw: &str) {
    let scripted = Arc::new(ScriptedGateway::new());
    let machine = machine_over(&scripted);
    advance_to(&machine, &scripted, Step::VerifyCode).await;
    let calls_before = scripted.call_count();

    let err = machine.confirm_code(raw).await.expect_err("malformed");

    assert_eq!(err.category(), ErrorCategory::ValidationError);
    assert_eq!(scripted.call_count(), calls_before);
    assert_eq!(machine.step(), Step::VerifyCode);
}

#[rstest]
#[tokio::test]
async fn confirmed_code_completes_the_attempt(scripted: Arc<ScriptedGateway>) {
    let machine = machine_over(&scripted);
    advance_to(&machine, &scripted, Step::Complete).await;
    assert!(machine.session().otp_verified());
    assert_eq!(
        scripted.calls().last(),
        Some(&GatewayCall::VerifyCode {
            phone_number: SAMPLE_PHONE_NUMBER.to_owned(),
            code: "123456".to_owned(),
        })
    );
}

#[rstest]
#[tokio::test]
async fn mocked_gateway_receives_confirmed_phone_number() {
    let mut gateway = MockVerificationGateway::new();
    gateway
        .expect_extract_document()
        .times(1)
        .returning(|_| Ok(sample_document_fields()));
    gateway
        .expect_verify_face()
        .times(1)
        .returning(|_| Ok(face_result(true, 88.0)));
    gateway
        .expect_generate_code()
        .withf(|phone| phone == SAMPLE_PHONE_NUMBER)
        .times(1)
        .returning(|_| Ok(()));
    let machine = StepStateMachine::new(Arc::new(gateway));

    machine.submit_document(&document()).await.expect("accepted");
    machine
        .submit_live_capture(&[frame(0, 1)])
        .await
        .expect("matched");
    machine.request_code().await.expect("issued");

    assert_eq!(machine.step(), Step::VerifyCode);
}

#[rstest]
#[tokio::test]
async fn second_operation_while_pending_is_rejected(scripted: Arc<ScriptedGateway>) {
    let machine = machine_over(&scripted);
    advance_to(&machine, &scripted, Step::GenerateCode).await;
    let barrier = Arc::new(Notify::new());
    scripted.hold_calls_on(Arc::clone(&barrier));
    scripted.push_generate_code(Ok(()));

    let first = machine.request_code();
    let second = async {
        tokio::task::yield_now().await;
        assert_eq!(machine.pending_operation(), Some(StepOperation::RequestCode));
        let outcome = machine.request_code().await;
        barrier.notify_one();
        outcome
    };
    let (first_outcome, second_outcome) = tokio::join!(first, second);

    first_outcome.expect("first call completes");
    let err = second_outcome.expect_err("gate is busy");
    assert_eq!(err.category(), ErrorCategory::OperationInFlight);
    assert_eq!(machine.step(), Step::VerifyCode);
    assert_eq!(machine.pending_operation(), None);
    assert_eq!(
        scripted
            .calls()
            .iter()
            .filter(|call| matches!(call, GatewayCall::GenerateCode { .. }))
            .count(),
        1
    );
}

#[rstest]
#[tokio::test]
async fn result_arriving_after_reset_is_discarded(scripted: Arc<ScriptedGateway>) {
    let machine = machine_over(&scripted);
    let barrier = Arc::new(Notify::new());
    scripted.hold_calls_on(Arc::clone(&barrier));
    scripted.push_extract(Ok(sample_document_fields()));
    let before = machine.session().attempt_id();

    let payload = document();
    let upload = machine.submit_document(&payload);
    let interrupt = async {
        tokio::task::yield_now().await;
        machine.reset();
        barrier.notify_one();
    };
    let (outcome, ()) = tokio::join!(upload, interrupt);

    let err = outcome.expect_err("stale result");
    assert_eq!(err.category(), ErrorCategory::InvalidStep);
    let session = machine.session();
    assert_ne!(session.attempt_id(), before);
    assert_eq!(session.step(), Step::DocumentUpload);
    assert!(session.document().is_none());
    assert!(session.last_error().is_none());
}

#[rstest]
#[tokio::test]
async fn reset_returns_to_document_upload(scripted: Arc<ScriptedGateway>) {
    let machine = machine_over(&scripted);
    advance_to(&machine, &scripted, Step::VerifyCode).await;

    machine.reset();

    let session = machine.session();
    assert_eq!(session.step(), Step::DocumentUpload);
    assert!(session.document().is_none());
    assert!(session.face_result().is_none());
    assert!(session.phone_number().is_none());
    assert!(!session.otp_verified());
}

#[rstest]
#[tokio::test]
async fn reset_releases_a_camera_mid_countdown(scripted: Arc<ScriptedGateway>) {
    let machine = machine_over(&scripted);
    let media = Arc::new(FakeMediaCapture::granting());
    let timer = Arc::new(ManualCountdownTimer::new());
    let (camera, mut events) = CameraCaptureSession::new(
        Arc::clone(&media) as Arc<dyn MediaCapture>,
        Arc::clone(&timer) as Arc<dyn CountdownTimer>,
        Arc::new(RawFrameEncoder::default()) as Arc<dyn FrameEncoder>,
    );
    let camera = Arc::new(camera);
    machine.attach_camera(Arc::clone(&camera));
    camera.activate().await.expect("activation succeeds");
    camera.begin_countdown_capture().expect("countdown starts");
    timer.fire();

    machine.reset();
    timer.fire_including_cancelled();
    timer.fire_including_cancelled();

    assert_eq!(camera.state(), CameraState::Idle);
    assert_eq!(media.open_tracks(), 0);
    assert_eq!(timer.active_count(), 0);
    assert!(events.try_recv().is_err());
}

#[rstest]
#[tokio::test]
async fn failed_capture_event_is_recorded(scripted: Arc<ScriptedGateway>) {
    let machine = machine_over(&scripted);
    advance_to(&machine, &scripted, Step::LiveFaceCheck).await;
    let failure = ClassifiedError::camera_hardware("no video surface");

    let err = machine
        .submit_capture_event(CaptureEvent::Failed(failure.clone()))
        .await
        .expect_err("capture failed");

    assert_eq!(err, failure);
    assert!(!err.recoverable());
    assert_eq!(machine.session().last_error(), Some(&failure));
    assert_eq!(machine.step(), Step::LiveFaceCheck);
}

#[rstest]
#[tokio::test]
async fn success_clears_the_previous_error(scripted: Arc<ScriptedGateway>) {
    let machine = machine_over(&scripted);
    scripted.push_extract(Err(VerificationGatewayError::transport("timed out")));
    machine
        .submit_document(&document())
        .await
        .expect_err("offline");
    assert!(machine.session().last_error().is_some());

    scripted.push_extract(Ok(sample_document_fields()));
    machine.submit_document(&document()).await.expect("retry works");
    assert!(machine.session().last_error().is_none());
}
