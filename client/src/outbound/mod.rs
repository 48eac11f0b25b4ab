//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **gateway**: reqwest-backed client for the verification service
//! - **media**: still-image capture source and JPEG frame encoder
//! - **timer**: Tokio-backed countdown timer
//!
//! Adapters are thin translators between domain types and infrastructure
//! representations. They contain no business logic.

pub mod gateway;
pub mod media;
pub mod timer;
