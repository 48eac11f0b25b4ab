//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod countdown_timer;
mod frame_encoder;
mod media_capture;
mod verification_gateway;

pub use countdown_timer::{CountdownTimer, TimerHandle, TimerTick};
#[cfg(test)]
pub use frame_encoder::MockFrameEncoder;
pub use frame_encoder::{FrameEncodeError, FrameEncoder};
pub use media_capture::{MediaCapture, MediaCaptureError, PixelBuffer, Resolution, VideoTrack};
#[cfg(test)]
pub use verification_gateway::MockVerificationGateway;
pub use verification_gateway::{
    FaceVerificationRequest, VerificationGateway, VerificationGatewayError,
};
