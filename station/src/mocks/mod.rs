//! In-memory collaborators for tests and offline runs.
//!
//! Every mock records what it was asked to do so tests can assert on the
//! exact sequence of backend calls or camera transitions.

pub mod api;
pub mod camera;
pub mod certificates;

pub use api::{ApiCall, MockAtlasApi};
pub use camera::{CameraEvent, MockCamera};
pub use certificates::MemoryCertificateSink;
