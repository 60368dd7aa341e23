//! Scanner station actions.
//!
//! Operator intent (selections, mode switches, submissions) and the results
//! of effects (options loaded, camera started, scan completed) both arrive
//! as [`ScannerAction`]s.

use super::pipeline::ScanOutcome;
use super::state::NotificationId;
use crate::catalog::CatalogLoad;
use crate::error::{ApiError, CameraError, CertificateError};
use crate::types::{
    CameraSessionId, EventId, ResourceOptionId, ResourceStatistics, ResourceType, ScanAttemptId,
    ScanRecord, ScannerMode,
};

/// How a scanned code reached the station
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanSource {
    /// Decoded by the camera during a session
    Camera(CameraSessionId),
    /// Typed or pasted by the operator
    Manual,
}

/// Scanner station action
#[derive(Clone, Debug, PartialEq)]
pub enum ScannerAction {
    // ═══════════════════════════════════════════════════════════════════════
    // Operator
    // ═══════════════════════════════════════════════════════════════════════
    /// Choose the event being staffed
    SelectEvent {
        /// Event id
        event: EventId,
    },

    /// Choose which resource type is handed out
    ///
    /// Tears down the camera and reloads options.
    SelectResourceType {
        /// Resource type
        resource_type: ResourceType,
    },

    /// Choose the option scans are recorded against
    SelectResourceOption {
        /// One of the loaded options
        option: ResourceOptionId,
    },

    /// Switch between camera and manual entry
    SetScannerMode {
        /// New mode
        mode: ScannerMode,
    },

    /// Open the camera (camera mode only)
    StartScanning,

    /// Release the camera
    StopScanning,

    /// Manual entry field changed
    ManualInputChanged {
        /// Current field contents
        input: String,
    },

    /// Submit the manual entry field
    SubmitManualCode,

    /// Re-fetch statistics and recent scans
    RefreshData,

    /// Close a toast
    DismissNotification {
        /// Toast to close
        id: NotificationId,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Camera
    // ═══════════════════════════════════════════════════════════════════════
    /// The camera decoded a payload
    CodeDecoded {
        /// Session that produced it
        session: CameraSessionId,
        /// Raw payload
        code: String,
    },

    /// The camera opened
    CameraStarted {
        /// Session that opened
        session: CameraSessionId,
    },

    /// The camera could not be opened
    CameraStartFailed {
        /// Session that failed
        session: CameraSessionId,
        /// Why
        error: CameraError,
    },

    /// An open camera session stopped working
    CameraFailed {
        /// Session that failed
        session: CameraSessionId,
        /// Why
        error: CameraError,
    },

    /// Cooldown after a decode elapsed
    ResumeCamera {
        /// Session to resume
        session: CameraSessionId,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Effect results
    // ═══════════════════════════════════════════════════════════════════════
    /// Resource options resolved
    OptionsLoaded {
        /// Load request this answers
        generation: u64,
        /// Resolved options
        load: CatalogLoad,
    },

    /// A scan finished, successfully or not
    ScanCompleted {
        /// Attempt that finished
        attempt: ScanAttemptId,
        /// Where the code came from
        source: ScanSource,
        /// Result of the pipeline
        outcome: ScanOutcome,
    },

    /// Statistics refresh finished
    StatisticsLoaded {
        /// Refresh token
        token: u64,
        /// Counters or the failure
        result: Result<ResourceStatistics, ApiError>,
    },

    /// Recent-scans refresh finished
    RecentScansLoaded {
        /// Refresh token
        token: u64,
        /// Feed or the failure
        result: Result<Vec<ScanRecord>, ApiError>,
    },

    /// A generated certificate was handed to the operator
    CertificateDelivered {
        /// Scan that triggered it
        attempt: ScanAttemptId,
        /// Where it ended up
        location: String,
    },

    /// Certificate generation or delivery failed
    CertificateFailed {
        /// Scan that triggered it
        attempt: ScanAttemptId,
        /// Why
        error: CertificateError,
    },
}
