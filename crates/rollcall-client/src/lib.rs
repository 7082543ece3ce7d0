//! rollcall-client: HTTP face backend and local image preflight.
//!
//! Implements [`rollcall_core::FaceBackend`] against the enrollment and
//! recognition endpoints, and checks image files before they are uploaded.

pub mod http;
pub mod preflight;
pub mod wire;

pub use http::{ClientError, HttpBackend};
pub use preflight::{inspect, load_image, ImageError, Preflight};
