//! The single path every scanned code takes, whatever its source.
//!
//! guard → validate → record → registration lookup → result
//!
//! Validation always precedes recording, and recording is never attempted
//! once validation has failed.

use crate::api::{AtlasApi, ScanRequest};
use crate::error::ApiError;
use crate::types::{
    EventId, OptionOrigin, Registration, RegistrationId, ResourceOption, ResourceType,
    ScanAttemptId, ScanOutcomeKind, ScanResult,
};
use std::time::Instant;

/// Message shown when recording fails after the code was accepted
pub const RECORDING_FAILED_MESSAGE: &str = "Recording failed after successful validation";

/// What a scan is made against
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanTarget {
    /// Event being staffed
    pub event: EventId,
    /// Resource type handed out
    pub resource_type: ResourceType,
    /// Option handed out
    pub option: ResourceOption,
}

/// Why a scan cannot be attempted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardFailure {
    /// No event selected
    NoEvent,
    /// No resource option selected
    NoOption,
    /// Options failed to load; the selection is the error stand-in
    OptionsUnavailable,
}

impl GuardFailure {
    /// Banner text
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NoEvent => "Please select an event before scanning",
            Self::NoOption => "Please select a resource option before scanning",
            Self::OptionsUnavailable => "Resource options could not be loaded",
        }
    }
}

impl ScanTarget {
    /// Check the selection is complete enough to scan against
    ///
    /// # Errors
    ///
    /// The first missing piece of the selection.
    pub fn resolve(
        event: Option<&EventId>,
        resource_type: ResourceType,
        option: Option<&ResourceOption>,
    ) -> Result<Self, GuardFailure> {
        let event = event.ok_or(GuardFailure::NoEvent)?;
        let option = option.ok_or(GuardFailure::NoOption)?;
        if option.origin == OptionOrigin::LoadError {
            return Err(GuardFailure::OptionsUnavailable);
        }
        Ok(Self {
            event: event.clone(),
            resource_type,
            option: option.clone(),
        })
    }

    fn request(&self, code: &str) -> ScanRequest {
        ScanRequest {
            event_id: self.event.clone(),
            resource_type: self.resource_type,
            resource_option_id: self.option.id.clone(),
            qr_code: code.to_string(),
        }
    }
}

/// Result of running a code through the pipeline
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Banner to show
    pub result: ScanResult,
    /// Target the scan was made against, when the guard passed
    pub target: Option<ScanTarget>,
}

impl ScanOutcome {
    /// Whether a redemption was recorded
    #[must_use]
    pub fn recorded(&self) -> bool {
        self.result.kind == ScanOutcomeKind::Recorded
    }

    /// Registration to generate documents for
    #[must_use]
    pub fn registration_id(&self) -> Option<&RegistrationId> {
        self.result.registration.as_ref().map(|r| &r.id)
    }
}

/// Run one scanned code through guard, validation, recording and lookup
pub async fn process_qr_code(
    api: &dyn AtlasApi,
    target: Result<ScanTarget, GuardFailure>,
    code: String,
    attempt: ScanAttemptId,
) -> ScanOutcome {
    let started = Instant::now();
    let outcome = run(api, target, code, attempt).await;

    let kind = match outcome.result.kind {
        ScanOutcomeKind::Recorded => "recorded",
        ScanOutcomeKind::NotConfigured => "not_configured",
        ScanOutcomeKind::Rejected => "rejected",
        ScanOutcomeKind::RecordingFailed => "recording_failed",
    };
    metrics::counter!("scanner.scans.total", "outcome" => kind).increment(1);
    metrics::histogram!("scanner.scan.duration_seconds").record(started.elapsed().as_secs_f64());

    outcome
}

async fn run(
    api: &dyn AtlasApi,
    target: Result<ScanTarget, GuardFailure>,
    code: String,
    attempt: ScanAttemptId,
) -> ScanOutcome {
    let target = match target {
        Ok(target) => target,
        Err(guard) => {
            tracing::debug!(%attempt, ?guard, "Scan rejected before any request");
            return ScanOutcome {
                result: ScanResult::failure(ScanOutcomeKind::NotConfigured, code, guard.message(), None),
                target: None,
            };
        },
    };

    let validation = match api.validate_scan(target.request(&code)).await {
        Ok(validation) => validation,
        Err(error) => {
            tracing::info!(%attempt, code = %code, %error, "Scan rejected");
            return ScanOutcome {
                result: rejection(code, &error),
                target: Some(target),
            };
        },
    };

    if let Err(error) = api.record_usage(target.request(&code), attempt).await {
        tracing::error!(
            %attempt,
            code = %code,
            %error,
            "Usage record failed after successful validation"
        );
        return ScanOutcome {
            result: ScanResult::failure(
                ScanOutcomeKind::RecordingFailed,
                code,
                RECORDING_FAILED_MESSAGE,
                Some(error.to_string()),
            ),
            target: Some(target),
        };
    }

    let registration = lookup_registration(api, &target.event, validation.registration, &code).await;

    tracing::info!(
        %attempt,
        code = %code,
        resource_type = %target.resource_type,
        option = %target.option.id,
        registration = registration.as_ref().map(|r| r.id.as_str()),
        "Scan recorded"
    );

    ScanOutcome {
        result: ScanResult {
            success: true,
            message: format!("{} recorded successfully", target.resource_type.label()),
            details: None,
            kind: ScanOutcomeKind::Recorded,
            registration,
            resource_option: Some(target.option.name.clone()),
            code,
        },
        target: Some(target),
    }
}

fn rejection(code: String, error: &ApiError) -> ScanResult {
    match error {
        ApiError::Rejected { message, details } => {
            ScanResult::failure(ScanOutcomeKind::Rejected, code, message.clone(), details.clone())
        },
        other => ScanResult::failure(
            ScanOutcomeKind::Rejected,
            code,
            "Unable to validate scan",
            Some(other.to_string()),
        ),
    }
}

/// Fetch display details of the registrant; failures only get logged
async fn lookup_registration(
    api: &dyn AtlasApi,
    event: &EventId,
    validated: Option<Registration>,
    code: &str,
) -> Option<Registration> {
    let id = validated
        .as_ref()
        .map_or_else(|| RegistrationId::new(code), |r| r.id.clone());

    match api.registration(event.clone(), id).await {
        Ok(registration) => Some(registration),
        Err(error) => {
            tracing::warn!(%error, code, "Registration lookup failed");
            validated
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::MockAtlasApi;
    use proptest::prelude::*;

    fn api_error_strategy() -> impl Strategy<Value = ApiError> {
        prop_oneof![
            (".{0,40}", proptest::option::of(".{0,40}"))
                .prop_map(|(message, details)| ApiError::Rejected { message, details }),
            ".{0,40}".prop_map(ApiError::Unauthorized),
            (400u16..600, ".{0,40}").prop_map(|(status, message)| ApiError::Status { status, message }),
            ".{0,40}".prop_map(ApiError::Transport),
            ".{0,40}".prop_map(ApiError::Decode),
        ]
    }

    fn breakfast() -> ScanTarget {
        ScanTarget {
            event: EventId::new("E1"),
            resource_type: ResourceType::Food,
            option: ResourceOption::configured("0_Breakfast", "Breakfast (Jan 1)"),
        }
    }

    proptest! {
        #[test]
        fn failed_validation_never_records(code in ".{0,64}", error in api_error_strategy()) {
            let api = MockAtlasApi::new().with_validation(code.clone(), Err(error.clone()));
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();

            let outcome = runtime.block_on(process_qr_code(&api, Ok(breakfast()), code.clone(), ScanAttemptId::new()));

            prop_assert_eq!(api.validation_count(), 1);
            prop_assert_eq!(api.record_count(), 0);
            prop_assert!(!outcome.result.success);
            prop_assert_eq!(outcome.result.kind, ScanOutcomeKind::Rejected);
            prop_assert_eq!(outcome.result.code, code);
            if let ApiError::Rejected { message, details } = error {
                prop_assert_eq!(outcome.result.message, message);
                prop_assert_eq!(outcome.result.details, details);
            }
        }
    }

    #[tokio::test]
    async fn missing_selection_makes_no_request() {
        let api = MockAtlasApi::new();

        let outcome = process_qr_code(&api, Err(GuardFailure::NoOption), "REG-001".to_string(), ScanAttemptId::new()).await;

        assert_eq!(outcome.result.kind, ScanOutcomeKind::NotConfigured);
        assert_eq!(outcome.result.message, GuardFailure::NoOption.message());
        assert!(outcome.target.is_none());
        assert!(api.calls().is_empty());
    }
}
