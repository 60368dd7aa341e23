//! The scanner station state machine.
//!
//! [`ScannerReducer`] owns everything the station shows: the selection,
//! the camera lifecycle, in-flight scans, the result banner, statistics
//! and the recent-scans feed. Every scanned code, from the camera or the
//! manual field, goes through [`pipeline::process_qr_code`].

pub mod actions;
pub mod environment;
pub mod pipeline;
pub mod reducer;
pub mod state;

pub use actions::{ScanSource, ScannerAction};
pub use environment::{ScannerEnvironment, ScannerSettings};
pub use pipeline::{GuardFailure, ScanOutcome, ScanTarget, process_qr_code};
pub use reducer::ScannerReducer;
pub use state::{CameraStatus, InFlightScan, Notification, NotificationId, NotificationLevel, ScannerState};

#[cfg(test)]
mod tests;
