//! Verification service outbound adapter.
//!
//! A thin HTTP implementation of the `VerificationGateway` port.

mod dto;
mod http_gateway;

pub use http_gateway::{HttpGatewayBuildError, HttpVerificationGateway};
