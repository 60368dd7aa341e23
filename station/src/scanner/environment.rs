//! Scanner station environment.

use crate::api::AtlasApi;
use crate::camera::{CameraDevice, CameraSink};
use crate::catalog::ResourceCatalog;
use crate::certificates::CertificateSink;
use atlas_core::environment::Clock;
use std::sync::Arc;
use std::time::Duration;

/// Tunables of the scanner reducer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScannerSettings {
    /// Cooldown before the camera resumes after a decode
    pub resume_delay: Duration,
    /// Entries requested for the recent-scans feed
    pub recent_scans_limit: usize,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            resume_delay: Duration::from_secs(2),
            recent_scans_limit: 10,
        }
    }
}

/// Collaborators of the scanner reducer
///
/// Cheap to clone; every collaborator is shared.
#[derive(Clone)]
pub struct ScannerEnvironment {
    /// Atlas backend
    pub api: Arc<dyn AtlasApi>,
    /// Option loader over the same backend
    pub catalog: ResourceCatalog,
    /// QR decoding camera
    pub camera: Arc<dyn CameraDevice>,
    /// Destination of generated certificates
    pub certificates: Arc<dyn CertificateSink>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Channel camera sessions report decodes and failures into
    pub camera_signals: CameraSink,
    /// Tunables
    pub settings: ScannerSettings,
}

impl std::fmt::Debug for ScannerEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerEnvironment")
            .field("catalog", &self.catalog)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
