//! Domain types for the scanner station.
//!
//! Identifiers coming from the Atlas backend are opaque strings (database
//! object ids); identifiers minted by the station itself are UUIDs or
//! counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a backend identifier
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a conference event
    EventId
);

string_id!(
    /// Identifier of a registration record
    RegistrationId
);

string_id!(
    /// Identifier of a redeemable resource option
    ///
    /// For food this is the composite `"{dayIndex}_{mealName}"`.
    ResourceOptionId
);

/// Client-generated identifier for one scan attempt
///
/// Sent to the backend as the `Idempotency-Key` of the usage record so a
/// retried or duplicated submission collapses into one redemption.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanAttemptId(Uuid);

impl ScanAttemptId {
    /// Creates a new random `ScanAttemptId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScanAttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScanAttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one camera acquisition, from start to stop
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CameraSessionId(u64);

impl CameraSessionId {
    /// Create a session id from its sequence number
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// The session that follows this one
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for CameraSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "camera-{}", self.0)
    }
}

// ============================================================================
// Resources
// ============================================================================

/// Category of redeemable conference amenity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceType {
    /// Meals, one option per (day, meal)
    #[default]
    Food,
    /// Kit bag items
    Kits,
    /// Certificate types handed out on paper
    Certificates,
    /// Certificates generated and printed at the station
    CertificatePrinting,
}

impl ResourceType {
    /// Every resource type, in selector order
    pub const ALL: [Self; 4] = [
        Self::Food,
        Self::Kits,
        Self::Certificates,
        Self::CertificatePrinting,
    ];

    /// Name used on the wire and in URLs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Kits => "kits",
            Self::Certificates => "certificates",
            Self::CertificatePrinting => "certificatePrinting",
        }
    }

    /// Wire name with its first letter upper-cased, as shown in banners
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Food => "Food",
            Self::Kits => "Kits",
            Self::Certificates => "Certificates",
            Self::CertificatePrinting => "CertificatePrinting",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown resource type `{s}`"))
    }
}

/// Where a resource option came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionOrigin {
    /// Derived from the event's resource settings
    Configured,
    /// Stand-in shown when the event configures nothing
    Placeholder,
    /// Stand-in shown when the settings could not be loaded
    LoadError,
}

/// Printable field of a certificate template
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateField {
    /// Field name (e.g. `name`, `registrationId`)
    pub name: String,
    /// Field kind as configured (text, qr, ...)
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// A redeemable unit within a resource type
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOption {
    /// Option identifier sent with scans
    pub id: ResourceOptionId,
    /// Label shown to the operator and echoed in scan results
    pub name: String,
    /// Whether this option is real or a fallback
    pub origin: OptionOrigin,
    /// Printable fields (certificate printing templates only)
    pub fields: Vec<TemplateField>,
}

impl ResourceOption {
    /// A configured option without template fields
    #[must_use]
    pub fn configured(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceOptionId::new(id),
            name: name.into(),
            origin: OptionOrigin::Configured,
            fields: Vec::new(),
        }
    }
}

// ============================================================================
// Registrations and scans
// ============================================================================

/// Registration category as embedded in registration payloads
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationCategory {
    /// Category id
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    /// Category name
    #[serde(default)]
    pub name: Option<String>,
}

/// A registrant's event-specific enrollment record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    /// Database id
    #[serde(rename = "_id")]
    pub id: RegistrationId,
    /// Human-facing badge code (what the QR code usually carries)
    #[serde(default)]
    pub registration_id: Option<String>,
    /// First name
    #[serde(default)]
    pub first_name: Option<String>,
    /// Last name
    #[serde(default)]
    pub last_name: Option<String>,
    /// Email address
    #[serde(default)]
    pub email: Option<String>,
    /// Registration category
    #[serde(default)]
    pub category: Option<RegistrationCategory>,
}

impl Registration {
    /// Display name, falling back to the badge code and then the id
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !full.is_empty() {
            return full;
        }
        self.registration_id
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// One recorded redemption, as listed in the recent-scans feed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    /// Record id
    #[serde(rename = "_id")]
    pub id: String,
    /// Who redeemed
    #[serde(default)]
    pub registration: Option<Registration>,
    /// Resource type
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Resource option
    #[serde(default)]
    pub resource_option_id: Option<ResourceOptionId>,
    /// When the redemption was recorded
    pub timestamp: DateTime<Utc>,
}

/// Redemption counters for one resource option
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceStatistics {
    /// All-time redemptions
    pub count: u64,
    /// Redemptions today
    pub today: u64,
    /// Distinct registrants who redeemed
    pub unique_attendees: u64,
}

/// How a scan ended, so callers can tell failure classes apart
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanOutcomeKind {
    /// Validated and recorded
    Recorded,
    /// Nothing selected to scan against; no request was made
    NotConfigured,
    /// The backend refused the code (unknown, ineligible, already redeemed)
    Rejected,
    /// Validation passed but the usage record did not land
    RecordingFailed,
}

/// Banner shown after a scan
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Green or red banner
    pub success: bool,
    /// Headline
    pub message: String,
    /// Optional detail line
    pub details: Option<String>,
    /// Failure class
    pub kind: ScanOutcomeKind,
    /// Matched registration, when known
    pub registration: Option<Registration>,
    /// Label of the option the scan was made against
    pub resource_option: Option<String>,
    /// The code that was scanned
    pub code: String,
}

impl ScanResult {
    /// A failed scan with a headline and optional detail line
    #[must_use]
    pub fn failure(
        kind: ScanOutcomeKind,
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<String>,
    ) -> Self {
        Self {
            success: false,
            message: message.into(),
            details,
            kind,
            registration: None,
            resource_option: None,
            code: code.into(),
        }
    }
}

/// How the station acquires codes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScannerMode {
    /// Live QR decoding from a camera
    #[default]
    Camera,
    /// Operator types or pastes codes
    Manual,
}
