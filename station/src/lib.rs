//! Onsite Atlas scanner station.
//!
//! Staff at a conference event scan attendee QR codes to hand out
//! resources: meals, kits, certificates and printed certificates. Each scan
//! is validated against the Atlas backend before the redemption is
//! recorded, so a badge cannot claim the same meal twice.
//!
//! # Architecture
//!
//! ```text
//!   camera ──decodes──┐
//!                     ▼
//!   operator ──► ScannerStation ──► Store ──► ScannerReducer
//!                                     ▲            │
//!                                     │         effects
//!                                     │            ▼
//!                                     └── AtlasApi / CameraDevice / CertificateSink
//! ```
//!
//! - [`scanner`]: the reducer and the scan pipeline
//!   (guard → validate → record → registration lookup)
//! - [`catalog`]: resource options derived from event settings
//! - [`statistics`]: last-known-good views over counters and the recent feed
//! - [`api`]: the backend trait, envelope decoding and the HTTP client
//! - [`camera`]: the camera abstraction and an external-decoder camera
//! - [`abstracts`]: read access to submitted abstracts through a TTL cache
//!
//! # Scan rules
//!
//! ```text
//! no event / no option      → rejected locally, no request
//! validation fails          → rejected, never recorded
//! validation ok, record ok  → recorded, statistics + feed refreshed once
//! validation ok, record err → "Recording failed after successful validation"
//! ```

#![forbid(unsafe_code)]

pub mod abstracts;
pub mod api;
pub mod app;
pub mod cache;
pub mod camera;
pub mod catalog;
pub mod certificates;
pub mod config;
pub mod error;
pub mod mocks;
pub mod scanner;
pub mod statistics;
pub mod types;

pub use app::{ScannerStation, ScannerStore, StationDeps, StationOptions};
pub use config::Config;
pub use error::{AbstractError, ApiError, CameraError, CertificateError, ConfigError, StationError};
pub use scanner::{ScannerAction, ScannerReducer, ScannerState};
