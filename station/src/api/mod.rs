//! Atlas backend client.
//!
//! The station talks to the backend through the [`AtlasApi`] trait so the
//! scanner reducer can be driven by the real HTTP client in production and
//! by [`crate::mocks::MockAtlasApi`] in tests.

use crate::abstracts::{Abstract, AbstractSettings};
use crate::catalog::ResourceSettings;
use crate::error::ApiError;
use crate::types::{
    EventId, Registration, RegistrationId, ResourceOptionId, ResourceStatistics, ResourceType,
    ScanAttemptId, ScanRecord,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

pub mod envelope;
pub mod http;

pub use envelope::ApiEnvelope;
pub use http::HttpAtlasApi;

/// Result of a backend call
pub type ApiResult<T> = Result<T, ApiError>;

/// Boxed backend call, dyn-compatible so clients can be shared as `Arc<dyn AtlasApi>`
pub type ApiFuture<T> = Pin<Box<dyn Future<Output = ApiResult<T>> + Send>>;

/// What a scan is checked and recorded against
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    /// Event being staffed
    pub event_id: EventId,
    /// Resource type being handed out
    pub resource_type: ResourceType,
    /// Option being handed out
    pub resource_option_id: ResourceOptionId,
    /// Raw decoded or typed payload
    pub qr_code: String,
}

/// Body of the usage record call
///
/// The backend expects the option id twice, once as `selectedOption`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordUsageBody<'a> {
    /// Shared scan fields
    #[serde(flatten)]
    pub request: &'a ScanRequest,
    /// Option id as the record endpoint names it
    pub selected_option: &'a ResourceOptionId,
}

impl<'a> From<&'a ScanRequest> for RecordUsageBody<'a> {
    fn from(request: &'a ScanRequest) -> Self {
        Self {
            request,
            selected_option: &request.resource_option_id,
        }
    }
}

/// Successful validation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanValidation {
    /// Registration the code resolved to, when the backend includes it
    pub registration: Option<Registration>,
}

/// Atlas REST backend
///
/// Every method resolves the response envelope; callers only ever see
/// the payload or an [`ApiError`].
pub trait AtlasApi: Send + Sync {
    /// Resource settings of one type for an event
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be fetched.
    fn resource_settings(
        &self,
        event: EventId,
        resource_type: ResourceType,
    ) -> ApiFuture<ResourceSettings>;

    /// Ask the backend whether a code may redeem the option
    ///
    /// # Errors
    ///
    /// [`ApiError::Rejected`] carries the backend's reason (unknown code,
    /// ineligible, already redeemed).
    fn validate_scan(&self, request: ScanRequest) -> ApiFuture<ScanValidation>;

    /// Record a redemption
    ///
    /// `attempt` is sent as the idempotency key.
    ///
    /// # Errors
    ///
    /// Returns an error if the record was not accepted.
    fn record_usage(&self, request: ScanRequest, attempt: ScanAttemptId) -> ApiFuture<()>;

    /// Look up a registration by id or badge code
    ///
    /// # Errors
    ///
    /// Returns an error if no registration matches.
    fn registration(&self, event: EventId, id: RegistrationId) -> ApiFuture<Registration>;

    /// Most recent redemptions of a resource type
    ///
    /// # Errors
    ///
    /// Returns an error if the feed cannot be fetched.
    fn recent_scans(
        &self,
        event: EventId,
        resource_type: ResourceType,
        limit: usize,
    ) -> ApiFuture<Vec<ScanRecord>>;

    /// Redemption counters for one option
    ///
    /// # Errors
    ///
    /// Returns an error if the counters cannot be fetched.
    fn resource_statistics(
        &self,
        event: EventId,
        resource_type: ResourceType,
        option: ResourceOptionId,
    ) -> ApiFuture<ResourceStatistics>;

    /// Generate a certificate PDF for a registration from a template
    ///
    /// # Errors
    ///
    /// Returns an error if generation fails.
    fn certificate_pdf(
        &self,
        event: EventId,
        registration: RegistrationId,
        template: ResourceOptionId,
    ) -> ApiFuture<Vec<u8>>;

    /// Abstracts submitted to an event
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be fetched.
    fn abstracts(&self, event: EventId) -> ApiFuture<Vec<Abstract>>;

    /// Abstract submission rules of an event
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be fetched.
    fn abstract_settings(&self, event: EventId) -> ApiFuture<AbstractSettings>;
}
