//! Scanner station state.

use super::actions::ScanSource;
use super::pipeline::{GuardFailure, ScanTarget};
use crate::error::ApiError;
use crate::statistics::RemoteView;
use crate::types::{
    CameraSessionId, EventId, ResourceOption, ResourceOptionId, ResourceStatistics, ResourceType,
    ScanAttemptId, ScanRecord, ScanResult, ScannerMode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Camera lifecycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CameraStatus {
    /// No camera session
    #[default]
    Off,
    /// Device is being opened
    Starting(CameraSessionId),
    /// Decoding
    Active(CameraSessionId),
    /// Decoding suspended while a scan is processed and during the cooldown
    Paused(CameraSessionId),
    /// The last start failed
    Failed,
}

impl CameraStatus {
    /// Session holding the device, if any
    #[must_use]
    pub const fn session(self) -> Option<CameraSessionId> {
        match self {
            Self::Starting(session) | Self::Active(session) | Self::Paused(session) => Some(session),
            Self::Off | Self::Failed => None,
        }
    }

    /// Whether a camera session is open or opening
    #[must_use]
    pub const fn is_running(self) -> bool {
        self.session().is_some()
    }
}

/// Toast identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NotificationId(pub u64);

/// Toast severity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationLevel {
    /// Informational
    Info,
    /// Something went wrong outside the scan itself
    Error,
}

/// A toast shown alongside the scan banner
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Identifier for dismissal
    pub id: NotificationId,
    /// Severity
    pub level: NotificationLevel,
    /// Text
    pub message: String,
}

/// A scan between submission and result
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InFlightScan {
    /// Submitted payload
    pub code: String,
    /// Where it came from
    pub source: ScanSource,
    /// When it was submitted
    pub started_at: DateTime<Utc>,
}

/// Everything the scanner station shows and remembers
#[derive(Clone, Debug, Default)]
pub struct ScannerState {
    /// Event being staffed
    pub event: Option<EventId>,
    /// Resource type handed out
    pub resource_type: ResourceType,
    /// Options of the resource type
    pub options: Vec<ResourceOption>,
    /// Options are being loaded
    pub options_loading: bool,
    /// Why the last option load failed
    pub options_error: Option<ApiError>,
    /// Option scans are recorded against
    pub selected_option: Option<ResourceOptionId>,
    /// Camera or manual entry
    pub mode: ScannerMode,
    /// Camera lifecycle
    pub camera: CameraStatus,
    /// Most recently allocated camera session
    pub last_camera_session: Option<CameraSessionId>,
    /// Camera failure banner, advising manual mode
    pub camera_error: Option<String>,
    /// Scans awaiting their result
    pub in_flight: HashMap<ScanAttemptId, InFlightScan>,
    /// Banner of the most recent scan
    pub last_result: Option<ScanResult>,
    /// Counters of the selected option
    pub statistics: RemoteView<ResourceStatistics>,
    /// Recent redemptions of the resource type
    pub recent_scans: RemoteView<Vec<ScanRecord>>,
    /// Manual entry field
    pub manual_input: String,
    /// Open toasts, oldest first
    pub notifications: Vec<Notification>,
    /// Redemptions recorded by this station since start
    pub scans_recorded: u64,
    pub(crate) options_generation: u64,
    pub(crate) next_notification: u64,
}

impl ScannerState {
    /// Initial state in the given mode
    #[must_use]
    pub fn new(mode: ScannerMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// The selected option, if it is one of the loaded options
    #[must_use]
    pub fn selected(&self) -> Option<&ResourceOption> {
        let id = self.selected_option.as_ref()?;
        self.options.iter().find(|option| &option.id == id)
    }

    /// Whether any scan is being validated or recorded
    #[must_use]
    pub fn is_processing(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// What a scan submitted now would be made against
    ///
    /// # Errors
    ///
    /// The first missing piece of the selection.
    pub fn scan_target(&self) -> Result<ScanTarget, GuardFailure> {
        ScanTarget::resolve(self.event.as_ref(), self.resource_type, self.selected())
    }

    pub(crate) fn push_notification(&mut self, level: NotificationLevel, message: impl Into<String>) -> NotificationId {
        self.next_notification += 1;
        let id = NotificationId(self.next_notification);
        self.notifications.push(Notification {
            id,
            level,
            message: message.into(),
        });
        id
    }

    pub(crate) fn allocate_camera_session(&mut self) -> CameraSessionId {
        let session = self
            .last_camera_session
            .map_or_else(|| CameraSessionId::new(1), CameraSessionId::next);
        self.last_camera_session = Some(session);
        session
    }
}
