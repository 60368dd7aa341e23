//! Mock Atlas backend.

use crate::abstracts::{Abstract, AbstractSettings};
use crate::api::{ApiFuture, ApiResult, AtlasApi, ScanRequest, ScanValidation};
use crate::catalog::ResourceSettings;
use crate::error::ApiError;
use crate::types::{
    EventId, Registration, RegistrationId, ResourceOptionId, ResourceStatistics, ResourceType,
    ScanAttemptId, ScanRecord,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A call made against [`MockAtlasApi`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiCall {
    /// `resource_settings`
    ResourceSettings {
        /// Event
        event: EventId,
        /// Resource type
        resource_type: ResourceType,
    },
    /// `validate_scan`
    ValidateScan(ScanRequest),
    /// `record_usage`
    RecordUsage {
        /// Scan being recorded
        request: ScanRequest,
        /// Idempotency key
        attempt: ScanAttemptId,
    },
    /// `registration`
    Registration {
        /// Event
        event: EventId,
        /// Id or badge code looked up
        id: RegistrationId,
    },
    /// `recent_scans`
    RecentScans {
        /// Event
        event: EventId,
        /// Resource type
        resource_type: ResourceType,
        /// Entries requested
        limit: usize,
    },
    /// `resource_statistics`
    ResourceStatistics {
        /// Event
        event: EventId,
        /// Resource type
        resource_type: ResourceType,
        /// Option
        option: ResourceOptionId,
    },
    /// `certificate_pdf`
    CertificatePdf {
        /// Event
        event: EventId,
        /// Registration printed for
        registration: RegistrationId,
        /// Template
        template: ResourceOptionId,
    },
    /// `abstracts`
    Abstracts {
        /// Event
        event: EventId,
    },
    /// `abstract_settings`
    AbstractSettings {
        /// Event
        event: EventId,
    },
}

#[derive(Debug)]
struct Responses {
    settings: HashMap<ResourceType, ApiResult<ResourceSettings>>,
    settings_latency: HashMap<ResourceType, Duration>,
    validations: HashMap<String, ApiResult<ScanValidation>>,
    validation_latency: Option<Duration>,
    record: ApiResult<()>,
    registrations: HashMap<RegistrationId, Registration>,
    statistics: ApiResult<ResourceStatistics>,
    recent: ApiResult<Vec<ScanRecord>>,
    certificate: ApiResult<Vec<u8>>,
    abstracts: ApiResult<Vec<Abstract>>,
    abstract_settings: ApiResult<AbstractSettings>,
}

impl Default for Responses {
    fn default() -> Self {
        Self {
            settings: HashMap::new(),
            settings_latency: HashMap::new(),
            validations: HashMap::new(),
            validation_latency: None,
            record: Ok(()),
            registrations: HashMap::new(),
            statistics: Ok(ResourceStatistics::default()),
            recent: Ok(Vec::new()),
            certificate: Ok(b"%PDF-1.4 mock certificate".to_vec()),
            abstracts: Ok(Vec::new()),
            abstract_settings: Ok(AbstractSettings::default()),
        }
    }
}

/// Scriptable in-memory backend
///
/// Unscripted calls succeed: empty settings, accepted codes without a
/// registration, zeroed statistics. Registration lookups of unknown ids
/// fail with a 404. Clones share responses and the call log.
#[derive(Clone, Debug, Default)]
pub struct MockAtlasApi {
    responses: Arc<Mutex<Responses>>,
    calls: Arc<Mutex<Vec<ApiCall>>>,
}

impl MockAtlasApi {
    /// Backend with default responses
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn responses(&self) -> MutexGuard<'_, Responses> {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log(&self, call: ApiCall) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }

    /// Settings answered for a resource type
    #[must_use]
    pub fn with_settings(self, resource_type: ResourceType, settings: ApiResult<ResourceSettings>) -> Self {
        self.set_settings(resource_type, settings);
        self
    }

    /// Replace the settings answered for a resource type
    pub fn set_settings(&self, resource_type: ResourceType, settings: ApiResult<ResourceSettings>) {
        self.responses().settings.insert(resource_type, settings);
    }

    /// Delay settings responses of a resource type
    #[must_use]
    pub fn with_settings_latency(self, resource_type: ResourceType, latency: Duration) -> Self {
        self.responses().settings_latency.insert(resource_type, latency);
        self
    }

    /// Validation answer for a code
    #[must_use]
    pub fn with_validation(self, code: impl Into<String>, result: ApiResult<ScanValidation>) -> Self {
        self.responses().validations.insert(code.into(), result);
        self
    }

    /// Reject a code with the backend's message
    #[must_use]
    pub fn rejecting(self, code: impl Into<String>, message: impl Into<String>, details: Option<&str>) -> Self {
        self.with_validation(
            code,
            Err(ApiError::Rejected {
                message: message.into(),
                details: details.map(str::to_string),
            }),
        )
    }

    /// Delay every validation
    #[must_use]
    pub fn with_validation_latency(self, latency: Duration) -> Self {
        self.responses().validation_latency = Some(latency);
        self
    }

    /// Answer for usage records
    pub fn set_record_result(&self, result: ApiResult<()>) {
        self.responses().record = result;
    }

    /// Registration known to the backend, found by id and badge code
    #[must_use]
    pub fn with_registration(self, registration: Registration) -> Self {
        {
            let mut responses = self.responses();
            if let Some(code) = &registration.registration_id {
                responses
                    .registrations
                    .insert(RegistrationId::new(code.as_str()), registration.clone());
            }
            responses.registrations.insert(registration.id.clone(), registration);
        }
        self
    }

    /// Answer for statistics refreshes
    pub fn set_statistics(&self, result: ApiResult<ResourceStatistics>) {
        self.responses().statistics = result;
    }

    /// Answer for recent-scans refreshes
    pub fn set_recent_scans(&self, result: ApiResult<Vec<ScanRecord>>) {
        self.responses().recent = result;
    }

    /// Answer for certificate generation
    pub fn set_certificate(&self, result: ApiResult<Vec<u8>>) {
        self.responses().certificate = result;
    }

    /// Abstracts of every event
    #[must_use]
    pub fn with_abstracts(self, result: ApiResult<Vec<Abstract>>) -> Self {
        self.responses().abstracts = result;
        self
    }

    /// Abstract rules of every event
    #[must_use]
    pub fn with_abstract_settings(self, result: ApiResult<AbstractSettings>) -> Self {
        self.responses().abstract_settings = result;
        self
    }

    /// Every call so far, oldest first
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of calls matching `predicate`
    #[must_use]
    pub fn count(&self, predicate: impl Fn(&ApiCall) -> bool) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|call| predicate(call))
            .count()
    }

    /// Number of validations
    #[must_use]
    pub fn validation_count(&self) -> usize {
        self.count(|call| matches!(call, ApiCall::ValidateScan(_)))
    }

    /// Number of usage records
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.count(|call| matches!(call, ApiCall::RecordUsage { .. }))
    }

    /// Number of statistics refreshes
    #[must_use]
    pub fn statistics_count(&self) -> usize {
        self.count(|call| matches!(call, ApiCall::ResourceStatistics { .. }))
    }

    /// Number of recent-scans refreshes
    #[must_use]
    pub fn recent_count(&self) -> usize {
        self.count(|call| matches!(call, ApiCall::RecentScans { .. }))
    }

    /// Forget the call log
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

async fn after(latency: Option<Duration>) {
    if let Some(latency) = latency {
        tokio::time::sleep(latency).await;
    }
}

impl AtlasApi for MockAtlasApi {
    fn resource_settings(&self, event: EventId, resource_type: ResourceType) -> ApiFuture<ResourceSettings> {
        self.log(ApiCall::ResourceSettings {
            event,
            resource_type,
        });
        let (result, latency) = {
            let responses = self.responses();
            (
                responses
                    .settings
                    .get(&resource_type)
                    .cloned()
                    .unwrap_or_else(|| Ok(ResourceSettings::default())),
                responses.settings_latency.get(&resource_type).copied(),
            )
        };
        Box::pin(async move {
            after(latency).await;
            result
        })
    }

    fn validate_scan(&self, request: ScanRequest) -> ApiFuture<ScanValidation> {
        let (result, latency) = {
            let responses = self.responses();
            (
                responses
                    .validations
                    .get(&request.qr_code)
                    .cloned()
                    .unwrap_or_else(|| Ok(ScanValidation::default())),
                responses.validation_latency,
            )
        };
        self.log(ApiCall::ValidateScan(request));
        Box::pin(async move {
            after(latency).await;
            result
        })
    }

    fn record_usage(&self, request: ScanRequest, attempt: ScanAttemptId) -> ApiFuture<()> {
        self.log(ApiCall::RecordUsage { request, attempt });
        let result = self.responses().record.clone();
        Box::pin(async move { result })
    }

    fn registration(&self, event: EventId, id: RegistrationId) -> ApiFuture<Registration> {
        let result = self.responses().registrations.get(&id).cloned().ok_or_else(|| ApiError::Status {
            status: 404,
            message: format!("Registration {id} not found"),
        });
        self.log(ApiCall::Registration { event, id });
        Box::pin(async move { result })
    }

    fn recent_scans(&self, event: EventId, resource_type: ResourceType, limit: usize) -> ApiFuture<Vec<ScanRecord>> {
        self.log(ApiCall::RecentScans {
            event,
            resource_type,
            limit,
        });
        let result = self.responses().recent.clone().map(|mut scans| {
            scans.truncate(limit);
            scans
        });
        Box::pin(async move { result })
    }

    fn resource_statistics(
        &self,
        event: EventId,
        resource_type: ResourceType,
        option: ResourceOptionId,
    ) -> ApiFuture<ResourceStatistics> {
        self.log(ApiCall::ResourceStatistics {
            event,
            resource_type,
            option,
        });
        let result = self.responses().statistics.clone();
        Box::pin(async move { result })
    }

    fn certificate_pdf(
        &self,
        event: EventId,
        registration: RegistrationId,
        template: ResourceOptionId,
    ) -> ApiFuture<Vec<u8>> {
        self.log(ApiCall::CertificatePdf {
            event,
            registration,
            template,
        });
        let result = self.responses().certificate.clone();
        Box::pin(async move { result })
    }

    fn abstracts(&self, event: EventId) -> ApiFuture<Vec<Abstract>> {
        self.log(ApiCall::Abstracts { event });
        let result = self.responses().abstracts.clone();
        Box::pin(async move { result })
    }

    fn abstract_settings(&self, event: EventId) -> ApiFuture<AbstractSettings> {
        self.log(ApiCall::AbstractSettings { event });
        let result = self.responses().abstract_settings.clone();
        Box::pin(async move { result })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(code: &str) -> ScanRequest {
        ScanRequest {
            event_id: EventId::new("E1"),
            resource_type: ResourceType::Kits,
            resource_option_id: ResourceOptionId::new("kit-1"),
            qr_code: code.to_string(),
        }
    }

    #[tokio::test]
    async fn unscripted_calls_succeed() {
        let api = MockAtlasApi::new();

        assert!(api.validate_scan(request("ANY")).await.is_ok());
        assert!(api.record_usage(request("ANY"), ScanAttemptId::new()).await.is_ok());
        assert_eq!(
            api.resource_settings(EventId::new("E1"), ResourceType::Food).await.unwrap(),
            ResourceSettings::default()
        );
        assert_eq!(api.validation_count(), 1);
        assert_eq!(api.record_count(), 1);
    }

    #[tokio::test]
    async fn registrations_resolve_by_badge_code() {
        let api = MockAtlasApi::new().with_registration(Registration {
            id: RegistrationId::new("r1"),
            registration_id: Some("REG-001".to_string()),
            first_name: Some("Ada".to_string()),
            last_name: None,
            email: None,
            category: None,
        });

        let by_code = api
            .registration(EventId::new("E1"), RegistrationId::new("REG-001"))
            .await
            .unwrap();
        assert_eq!(by_code.id, RegistrationId::new("r1"));

        let missing = api.registration(EventId::new("E1"), RegistrationId::new("nope")).await;
        assert!(matches!(missing, Err(ApiError::Status { status: 404, .. })));
    }

    #[tokio::test]
    async fn rejections_carry_backend_text() {
        let api = MockAtlasApi::new().rejecting("DUP", "Already redeemed", Some("at 09:14"));

        let error = api.validate_scan(request("DUP")).await.unwrap_err();

        assert_eq!(error.to_string(), "Already redeemed");
        assert_eq!(error.details(), Some("at 09:14"));
    }
}
