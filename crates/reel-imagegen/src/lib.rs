//! Client for the upstream prompt-to-image service.
//!
//! The service is a black box reachable over HTTP: one GET per frame, the
//! prompt percent-encoded into the path, raw image bytes on success and a
//! non-2xx status (notably 429) on failure.

pub mod client;
pub mod error;
pub mod types;

pub use client::{ImageSourceClient, ImageSourceConfig};
pub use error::{ImageGenError, ImageGenResult};
pub use types::FrameImage;
