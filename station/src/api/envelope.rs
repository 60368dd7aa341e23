//! The `{success, message?, details?, data?}` response envelope.

use crate::error::ApiError;
use serde::Deserialize;

/// Message used when the backend refuses without saying why
pub const UNSPECIFIED_FAILURE: &str = "Request was not successful";

/// Response wrapper returned by every JSON endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Whether the backend accepted the request
    pub success: bool,
    /// Human-readable outcome
    #[serde(default)]
    pub message: Option<String>,
    /// Extra detail line, mostly on failures
    #[serde(default)]
    pub details: Option<String>,
    /// Payload
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// Resolve into the payload, treating a missing payload as malformed
    ///
    /// # Errors
    ///
    /// [`ApiError::Rejected`] when `success` is false, [`ApiError::Decode`]
    /// when a successful response has no `data`.
    pub fn into_result(self) -> Result<T, ApiError> {
        let data = self.into_optional()?;
        data.ok_or_else(|| ApiError::Decode("successful response carried no data".to_string()))
    }

    /// Resolve into the payload, or its default when `data` is absent
    ///
    /// # Errors
    ///
    /// [`ApiError::Rejected`] when `success` is false.
    pub fn into_result_or_default(self) -> Result<T, ApiError>
    where
        T: Default,
    {
        Ok(self.into_optional()?.unwrap_or_default())
    }

    /// Resolve, ignoring any payload
    ///
    /// # Errors
    ///
    /// [`ApiError::Rejected`] when `success` is false.
    pub fn into_unit(self) -> Result<(), ApiError> {
        self.into_optional().map(|_| ())
    }

    /// The rejection carried by a failed envelope, `None` on success
    #[must_use]
    pub fn into_rejection(self) -> Option<ApiError> {
        if self.success {
            return None;
        }
        Some(ApiError::Rejected {
            message: self
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| UNSPECIFIED_FAILURE.to_string()),
            details: self.details,
        })
    }

    fn into_optional(self) -> Result<Option<T>, ApiError> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self.into_rejection().unwrap_or_else(|| ApiError::rejected(UNSPECIFIED_FAILURE)))
        }
    }
}
