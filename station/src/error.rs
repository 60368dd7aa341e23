//! Error types for the scanner station.

use atlas_runtime::StoreError;
use thiserror::Error;

/// Errors from the Atlas backend, decoded once at the client boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The backend answered `success: false`
    #[error("{message}")]
    Rejected {
        /// Human-readable reason from the backend
        message: String,
        /// Optional detail line from the backend
        details: Option<String>,
    },

    /// Credentials missing, expired or insufficient
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Non-success HTTP status without a usable envelope
    #[error("Backend returned status {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// The request never produced a response
    #[error("Request failed: {0}")]
    Transport(String),

    /// The response could not be decoded into the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Construct a backend rejection
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
            details: None,
        }
    }

    /// Whether the backend itself refused the request
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Detail line carried by a rejection
    #[must_use]
    pub fn details(&self) -> Option<&str> {
        match self {
            Self::Rejected { details, .. } => details.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Errors from a camera / QR decoder
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    /// The decoder could not be started
    #[error("Unable to start camera: {0}")]
    StartFailed(String),

    /// The device is held by another session
    #[error("Camera is already in use by {0}")]
    Busy(String),

    /// The decoder went away while its session was open
    #[error("Camera decoder stopped: {0}")]
    Stopped(String),
}

/// Errors delivering a generated certificate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertificateError {
    /// The backend could not generate the document
    #[error("Certificate generation failed: {0}")]
    Generation(#[from] ApiError),

    /// The scan did not identify a registration to print for
    #[error("No registration available to print a certificate for")]
    MissingRegistration,

    /// The document could not be written out
    #[error("Unable to save certificate: {0}")]
    Io(String),
}

/// Errors driving a station from outside
#[derive(Debug, Error)]
pub enum StationError {
    /// The store refused the action or timed out
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The requested option is not among the loaded ones
    #[error("Option `{option}` is not offered for {resource_type} (available: {available})")]
    UnknownOption {
        /// Requested option id
        option: String,
        /// Resource type the options were loaded for
        resource_type: String,
        /// Ids that were loaded, comma separated
        available: String,
    },
}

/// Errors in station configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is present but malformed
    #[error("Invalid {key}: {reason}")]
    Invalid {
        /// Environment variable or flag
        key: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Errors from abstract rules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbstractError {
    /// Abstract submission is switched off for the event
    #[error("Abstract submissions are not enabled for this event")]
    SubmissionsDisabled,

    /// The submission deadline has passed
    #[error("The abstract submission deadline has passed")]
    DeadlinePassed,

    /// The abstract is in a state that can no longer change
    #[error("Abstract is {0} and can no longer be edited")]
    Locked(String),

    /// Status change not allowed
    #[error("Cannot move abstract from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// Category not configured for the event
    #[error("Unknown abstract category `{0}`")]
    UnknownCategory(String),

    /// Sub-topic not configured under the category
    #[error("Sub-topic `{sub_topic}` is not part of category `{category}`")]
    UnknownSubTopic {
        /// Category name
        category: String,
        /// Requested sub-topic
        sub_topic: String,
    },

    /// Attached file breaks the event's file rules
    #[error("File rejected: {0}")]
    FileRejected(String),

    /// Backend failure
    #[error(transparent)]
    Api(#[from] ApiError),
}
