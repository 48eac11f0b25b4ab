//! Test utilities for the verification client.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`).
//! Compiled only for tests or with the `test-support` feature.

pub mod gateway {
    //! Scripted verification gateway.
    //!
    //! Each endpoint pops its next scripted result; an empty script answers
    //! with a transport error so unexpected calls are visible in assertions.

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::domain::ports::{
        FaceVerificationRequest, VerificationGateway, VerificationGatewayError,
    };
    use crate::domain::{DocumentFields, FaceMatchResult, ImagePayload, OtpCode};

    /// Phone number used by [`sample_document_fields`].
    pub const SAMPLE_PHONE_NUMBER: &str = "9998887770";

    /// Document fields matching a typical successful extraction.
    pub fn sample_document_fields() -> DocumentFields {
        DocumentFields {
            document_number: Some("1234".to_owned()),
            phone_number: Some(SAMPLE_PHONE_NUMBER.to_owned()),
            date_of_birth: Some("1990-01-01".to_owned()),
            document_photo: Some(ImagePayload::jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9])),
        }
    }

    /// Face comparison result with the given outcome.
    pub fn face_result(matched: bool, confidence: f64) -> FaceMatchResult {
        FaceMatchResult {
            matched,
            confidence,
            message: if matched {
                "Face verification successful".to_owned()
            } else {
                "Face verification failed".to_owned()
            },
            error_type: None,
            distance: None,
            threshold: None,
        }
    }

    /// One recorded call against the gateway.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum GatewayCall {
        /// Document extraction with the uploaded payload size.
        ExtractDocument {
            /// Uploaded payload size in bytes.
            bytes: usize,
        },
        /// Face comparison.
        VerifyFace {
            /// Forwarded phone number.
            phone_number: String,
            /// Live capture payload size in bytes.
            live_bytes: usize,
        },
        /// Code issuance.
        GenerateCode {
            /// Target phone number.
            phone_number: String,
        },
        /// Code re-issuance.
        ResendCode {
            /// Target phone number.
            phone_number: String,
        },
        /// Code confirmation.
        VerifyCode {
            /// Target phone number.
            phone_number: String,
            /// Submitted digits.
            code: String,
        },
    }

    #[derive(Default)]
    struct Script {
        extract: VecDeque<Result<DocumentFields, VerificationGatewayError>>,
        face: VecDeque<Result<FaceMatchResult, VerificationGatewayError>>,
        generate: VecDeque<Result<(), VerificationGatewayError>>,
        resend: VecDeque<Result<(), VerificationGatewayError>>,
        verify: VecDeque<Result<(), VerificationGatewayError>>,
        calls: Vec<GatewayCall>,
        barrier: Option<Arc<Notify>>,
    }

    /// Gateway answering from per-endpoint queues and recording every call.
    #[derive(Default)]
    pub struct ScriptedGateway {
        script: Mutex<Script>,
    }

    fn exhausted<T>() -> Result<T, VerificationGatewayError> {
        Err(VerificationGatewayError::transport("script exhausted"))
    }

    impl ScriptedGateway {
        /// Build a gateway with empty scripts.
        pub fn new() -> Self {
            Self::default()
        }

        fn lock(&self) -> MutexGuard<'_, Script> {
            self.script.lock().unwrap_or_else(PoisonError::into_inner)
        }

        /// Queue the next document extraction result.
        pub fn push_extract(&self, result: Result<DocumentFields, VerificationGatewayError>) {
            self.lock().extract.push_back(result);
        }

        /// Queue the next face comparison result.
        pub fn push_verify_face(&self, result: Result<FaceMatchResult, VerificationGatewayError>) {
            self.lock().face.push_back(result);
        }

        /// Queue the next code issuance result.
        pub fn push_generate_code(&self, result: Result<(), VerificationGatewayError>) {
            self.lock().generate.push_back(result);
        }

        /// Queue the next code re-issuance result.
        pub fn push_resend_code(&self, result: Result<(), VerificationGatewayError>) {
            self.lock().resend.push_back(result);
        }

        /// Queue the next code confirmation result.
        pub fn push_verify_code(&self, result: Result<(), VerificationGatewayError>) {
            self.lock().verify.push_back(result);
        }

        /// Make every later call wait for a permit on `barrier` before
        /// answering.
        pub fn hold_calls_on(&self, barrier: Arc<Notify>) {
            self.lock().barrier = Some(barrier);
        }

        /// Calls made so far, in order.
        pub fn calls(&self) -> Vec<GatewayCall> {
            self.lock().calls.clone()
        }

        /// Number of calls made so far.
        pub fn call_count(&self) -> usize {
            self.lock().calls.len()
        }

        async fn record(&self, call: GatewayCall) {
            let barrier = {
                let mut script = self.lock();
                script.calls.push(call);
                script.barrier.clone()
            };
            if let Some(notify) = barrier {
                notify.notified().await;
            }
        }
    }

    #[async_trait]
    impl VerificationGateway for ScriptedGateway {
        async fn extract_document(
            &self,
            image: &ImagePayload,
        ) -> Result<DocumentFields, VerificationGatewayError> {
            self.record(GatewayCall::ExtractDocument { bytes: image.len() })
                .await;
            self.lock().extract.pop_front().unwrap_or_else(exhausted)
        }

        async fn verify_face(
            &self,
            request: &FaceVerificationRequest,
        ) -> Result<FaceMatchResult, VerificationGatewayError> {
            self.record(GatewayCall::VerifyFace {
                phone_number: request.phone_number.clone(),
                live_bytes: request.live_capture.len(),
            })
            .await;
            self.lock().face.pop_front().unwrap_or_else(exhausted)
        }

        async fn generate_code(&self, phone_number: &str) -> Result<(), VerificationGatewayError> {
            self.record(GatewayCall::GenerateCode {
                phone_number: phone_number.to_owned(),
            })
            .await;
            self.lock().generate.pop_front().unwrap_or_else(exhausted)
        }

        async fn resend_code(&self, phone_number: &str) -> Result<(), VerificationGatewayError> {
            self.record(GatewayCall::ResendCode {
                phone_number: phone_number.to_owned(),
            })
            .await;
            self.lock().resend.pop_front().unwrap_or_else(exhausted)
        }

        async fn verify_code(
            &self,
            phone_number: &str,
            code: &OtpCode,
        ) -> Result<(), VerificationGatewayError> {
            self.record(GatewayCall::VerifyCode {
                phone_number: phone_number.to_owned(),
                code: code.as_str().to_owned(),
            })
            .await;
            self.lock().verify.pop_front().unwrap_or_else(exhausted)
        }
    }
}

pub mod media {
    //! Fake capture device and frame encoder.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::domain::ImagePayload;
    use crate::domain::ports::{
        FrameEncodeError, FrameEncoder, MediaCapture, MediaCaptureError, PixelBuffer, Resolution,
        VideoTrack,
    };

    /// Resolution reported by granted fake tracks.
    pub const FAKE_RESOLUTION: Resolution = Resolution::new(4, 3);

    /// Value every fake frame pixel channel is filled with.
    pub const FAKE_PIXEL_VALUE: u8 = 0x80;

    /// How the fake device answers the next acquisition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FakeDeviceBehaviour {
        /// Grant a track with the given native resolution.
        Grant(Option<Resolution>),
        /// Refuse access.
        Deny,
        /// Report the device as unavailable.
        Unavailable,
    }

    #[derive(Debug, Default)]
    struct Counters {
        acquisitions: AtomicUsize,
        stops: AtomicUsize,
        open: AtomicUsize,
    }

    /// Fake capture device counting acquisitions and releases.
    pub struct FakeMediaCapture {
        behaviour: Mutex<FakeDeviceBehaviour>,
        barrier: Mutex<Option<Arc<Notify>>>,
        counters: Arc<Counters>,
    }

    impl FakeMediaCapture {
        /// Device that grants tracks at [`FAKE_RESOLUTION`].
        pub fn granting() -> Self {
            Self::with_behaviour(FakeDeviceBehaviour::Grant(Some(FAKE_RESOLUTION)))
        }

        /// Device that refuses access.
        pub fn denying() -> Self {
            Self::with_behaviour(FakeDeviceBehaviour::Deny)
        }

        /// Device with the given behaviour.
        pub fn with_behaviour(behaviour: FakeDeviceBehaviour) -> Self {
            Self {
                behaviour: Mutex::new(behaviour),
                barrier: Mutex::new(None),
                counters: Arc::new(Counters::default()),
            }
        }

        /// Change how later acquisitions are answered.
        pub fn set_behaviour(&self, behaviour: FakeDeviceBehaviour) {
            *lock(&self.behaviour) = behaviour;
        }

        /// Make later acquisitions wait for a permit on `barrier`.
        pub fn hold_acquisitions_on(&self, barrier: Arc<Notify>) {
            *lock(&self.barrier) = Some(barrier);
        }

        /// Number of acquisition attempts.
        pub fn acquisitions(&self) -> usize {
            self.counters.acquisitions.load(Ordering::SeqCst)
        }

        /// Number of tracks stopped.
        pub fn stops(&self) -> usize {
            self.counters.stops.load(Ordering::SeqCst)
        }

        /// Number of granted tracks not yet stopped.
        pub fn open_tracks(&self) -> usize {
            self.counters.open.load(Ordering::SeqCst)
        }
    }

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[async_trait]
    impl MediaCapture for FakeMediaCapture {
        async fn acquire(&self) -> Result<Box<dyn VideoTrack>, MediaCaptureError> {
            self.counters.acquisitions.fetch_add(1, Ordering::SeqCst);
            let barrier = lock(&self.barrier).clone();
            if let Some(notify) = barrier {
                notify.notified().await;
            }
            let behaviour = *lock(&self.behaviour);
            match behaviour {
                FakeDeviceBehaviour::Grant(resolution) => {
                    self.counters.open.fetch_add(1, Ordering::SeqCst);
                    Ok(Box::new(FakeTrack {
                        resolution,
                        stopped: false,
                        counters: Arc::clone(&self.counters),
                    }))
                }
                FakeDeviceBehaviour::Deny => Err(MediaCaptureError::permission_denied(
                    "NotAllowedError: permission denied",
                )),
                FakeDeviceBehaviour::Unavailable => Err(MediaCaptureError::unavailable(
                    "NotReadableError: device in use",
                )),
            }
        }
    }

    struct FakeTrack {
        resolution: Option<Resolution>,
        stopped: bool,
        counters: Arc<Counters>,
    }

    impl VideoTrack for FakeTrack {
        fn native_resolution(&self) -> Option<Resolution> {
            if self.stopped {
                None
            } else {
                self.resolution
            }
        }

        fn copy_frame(&mut self, target: &mut PixelBuffer) -> Result<(), MediaCaptureError> {
            if self.stopped {
                return Err(MediaCaptureError::no_video_surface());
            }
            target.as_rgb_mut().fill(FAKE_PIXEL_VALUE);
            Ok(())
        }

        fn stop(&mut self) {
            if self.stopped {
                return;
            }
            self.stopped = true;
            self.counters.stops.fetch_add(1, Ordering::SeqCst);
            self.counters.open.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Encoder that passes raw RGB bytes through unchanged.
    #[derive(Debug, Default)]
    pub struct RawFrameEncoder {
        encoded: AtomicUsize,
    }

    /// Media type produced by [`RawFrameEncoder`].
    pub const RAW_MEDIA_TYPE: &str = "image/x-raw-rgb";

    impl RawFrameEncoder {
        /// Number of frames encoded.
        pub fn encoded(&self) -> usize {
            self.encoded.load(Ordering::SeqCst)
        }
    }

    impl FrameEncoder for RawFrameEncoder {
        fn encode(&self, frame: &PixelBuffer) -> Result<ImagePayload, FrameEncodeError> {
            self.encoded.fetch_add(1, Ordering::SeqCst);
            Ok(ImagePayload::new(frame.as_rgb().to_vec(), RAW_MEDIA_TYPE))
        }
    }
}

pub mod timer {
    //! Countdown timer fired by hand.

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
    use std::time::Duration;

    use crate::domain::ports::{CountdownTimer, TimerHandle, TimerTick};

    struct TimerEntry {
        period: Duration,
        cancelled: AtomicBool,
        tick: Mutex<TimerTick>,
    }

    /// Timer whose ticks run only when a test calls [`Self::fire`].
    #[derive(Default)]
    pub struct ManualCountdownTimer {
        entries: Mutex<Vec<Arc<TimerEntry>>>,
    }

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    impl ManualCountdownTimer {
        /// Build a timer with no running countdowns.
        pub fn new() -> Self {
            Self::default()
        }

        fn snapshot(&self) -> Vec<Arc<TimerEntry>> {
            lock(&self.entries).clone()
        }

        /// Tick every countdown that has not been cancelled. Returns how many
        /// ticks ran.
        pub fn fire(&self) -> usize {
            self.fire_matching(false)
        }

        /// Tick every countdown ever started, cancelled or not, as a timer
        /// that fires late would. Returns how many ticks ran.
        pub fn fire_including_cancelled(&self) -> usize {
            self.fire_matching(true)
        }

        fn fire_matching(&self, include_cancelled: bool) -> usize {
            let mut fired = 0;
            for entry in self.snapshot() {
                if !include_cancelled && entry.cancelled.load(Ordering::SeqCst) {
                    continue;
                }
                let mut tick = lock(&entry.tick);
                (*tick)();
                fired += 1;
            }
            fired
        }

        /// Number of countdowns still running.
        pub fn active_count(&self) -> usize {
            self.snapshot()
                .iter()
                .filter(|entry| !entry.cancelled.load(Ordering::SeqCst))
                .count()
        }

        /// Number of countdowns ever started.
        pub fn started_count(&self) -> usize {
            lock(&self.entries).len()
        }

        /// Period requested by the most recent countdown.
        pub fn last_period(&self) -> Option<Duration> {
            lock(&self.entries).last().map(|entry| entry.period)
        }
    }

    impl CountdownTimer for ManualCountdownTimer {
        fn start(&self, period: Duration, tick: TimerTick) -> TimerHandle {
            let entry = Arc::new(TimerEntry {
                period,
                cancelled: AtomicBool::new(false),
                tick: Mutex::new(tick),
            });
            lock(&self.entries).push(Arc::clone(&entry));
            TimerHandle::new(move || entry.cancelled.store(true, Ordering::SeqCst))
        }
    }
}
