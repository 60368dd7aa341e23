//! HTTP implementation of [`AtlasApi`] over `reqwest`.

use super::{
    ApiEnvelope, ApiFuture, ApiResult, AtlasApi, RecordUsageBody, ScanRequest, ScanValidation,
};
use crate::abstracts::{Abstract, AbstractSettings};
use crate::catalog::ResourceSettings;
use crate::error::ApiError;
use crate::types::{
    EventId, Registration, RegistrationId, ResourceOptionId, ResourceStatistics, ResourceType,
    ScanAttemptId, ScanRecord,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use std::time::Duration;
use tracing::Instrument;

/// Header carrying the scan attempt id on usage records
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Settings payload as the settings endpoint wraps it
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsPayload {
    settings: ResourceSettings,
}

/// Atlas backend client
#[derive(Clone, Debug)]
pub struct HttpAtlasApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpAtlasApi {
    /// Create a client for `base_url` (e.g. `https://atlas.example.org/api`)
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] if `base_url` is not an http(s) base
    /// URL or the TLS backend cannot be initialised.
    pub fn new(
        base_url: impl AsRef<str>,
        token: Option<String>,
        timeout: Duration,
    ) -> ApiResult<Self> {
        let base_url = Url::parse(base_url.as_ref())
            .map_err(|e| ApiError::Transport(format!("invalid base URL `{}`: {e}", base_url.as_ref())))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Transport(format!("`{base_url}` cannot be a base URL")));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Endpoint below the base URL
    ///
    /// Every segment is percent-encoded on its own, so ids and scanned
    /// payloads can never add path levels or a query.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn get(&self, segments: &[&str]) -> RequestBuilder {
        self.authorize(self.client.get(self.url(segments)))
    }

    fn post(&self, segments: &[&str]) -> RequestBuilder {
        self.authorize(self.client.post(self.url(segments)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Send a request and decode its envelope
async fn send_envelope<T: DeserializeOwned>(request: RequestBuilder) -> ApiResult<ApiEnvelope<T>> {
    let response = request.send().await?;
    let response = check_status(response).await?;
    response
        .json::<ApiEnvelope<T>>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

/// Map non-success statuses to errors
///
/// Backends frequently answer 4xx with a regular `success: false` envelope;
/// that is surfaced as a rejection so the operator sees the backend's reason.
async fn check_status(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();

    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        let message = serde_json::from_str::<ApiEnvelope<IgnoredAny>>(&body)
            .ok()
            .and_then(|envelope| envelope.message)
            .unwrap_or_else(|| status.to_string());
        return Err(ApiError::Unauthorized(message));
    }

    let rejection = serde_json::from_str::<ApiEnvelope<IgnoredAny>>(&body)
        .ok()
        .and_then(ApiEnvelope::into_rejection);

    Err(rejection.unwrap_or(ApiError::Status {
        status: status.as_u16(),
        message: body,
    }))
}

impl AtlasApi for HttpAtlasApi {
    fn resource_settings(
        &self,
        event: EventId,
        resource_type: ResourceType,
    ) -> ApiFuture<ResourceSettings> {
        let request = self
            .get(&["events", event.as_str(), "resources", "settings"])
            .query(&[("type", resource_type.as_str())]);

        Box::pin(async move {
            let envelope = send_envelope::<SettingsPayload>(request).await?;
            Ok(envelope.into_result_or_default()?.settings)
        })
    }

    fn validate_scan(&self, request: ScanRequest) -> ApiFuture<ScanValidation> {
        let span = tracing::debug_span!(
            "validate_scan",
            event = %request.event_id,
            option = %request.resource_option_id,
            code = %request.qr_code,
        );
        let request = self.post(&["resources", "validate-scan"]).json(&request);

        Box::pin(
            async move {
                send_envelope::<ScanValidation>(request)
                    .await?
                    .into_result_or_default()
            }
            .instrument(span),
        )
    }

    fn record_usage(&self, request: ScanRequest, attempt: ScanAttemptId) -> ApiFuture<()> {
        let span = tracing::debug_span!(
            "record_usage",
            event = %request.event_id,
            option = %request.resource_option_id,
            %attempt,
        );
        let request = self
            .post(&["resources", "scan"])
            .header(IDEMPOTENCY_KEY_HEADER, attempt.to_string())
            .json(&RecordUsageBody::from(&request));

        Box::pin(async move { send_envelope::<IgnoredAny>(request).await?.into_unit() }.instrument(span))
    }

    fn registration(&self, event: EventId, id: RegistrationId) -> ApiFuture<Registration> {
        let request = self.get(&["events", event.as_str(), "registrations", id.as_str()]);

        Box::pin(async move { send_envelope::<Registration>(request).await?.into_result() })
    }

    fn recent_scans(
        &self,
        event: EventId,
        resource_type: ResourceType,
        limit: usize,
    ) -> ApiFuture<Vec<ScanRecord>> {
        let request = self.get(&["resources", "recent"]).query(&[
            ("eventId", event.to_string()),
            ("type", resource_type.as_str().to_string()),
            ("limit", limit.to_string()),
        ]);

        Box::pin(async move {
            send_envelope::<Vec<ScanRecord>>(request)
                .await?
                .into_result_or_default()
        })
    }

    fn resource_statistics(
        &self,
        event: EventId,
        resource_type: ResourceType,
        option: ResourceOptionId,
    ) -> ApiFuture<ResourceStatistics> {
        let request = self.get(&["resources", "statistics"]).query(&[
            ("eventId", event.to_string()),
            ("type", resource_type.as_str().to_string()),
            ("resourceOptionId", option.to_string()),
        ]);

        Box::pin(async move {
            send_envelope::<ResourceStatistics>(request)
                .await?
                .into_result_or_default()
        })
    }

    fn certificate_pdf(
        &self,
        event: EventId,
        registration: RegistrationId,
        template: ResourceOptionId,
    ) -> ApiFuture<Vec<u8>> {
        let request = self
            .post(&[
                "events",
                event.as_str(),
                "registrations",
                registration.as_str(),
                "certificates",
                template.as_str(),
                "pdf",
            ])
            .header(reqwest::header::ACCEPT, "application/pdf");

        Box::pin(async move {
            let response = check_status(request.send().await?).await?;
            let bytes = response.bytes().await?;
            tracing::debug!(size = bytes.len(), "Certificate generated");
            Ok(bytes.to_vec())
        })
    }

    fn abstracts(&self, event: EventId) -> ApiFuture<Vec<Abstract>> {
        let request = self.get(&["events", event.as_str(), "abstracts"]);

        Box::pin(async move {
            send_envelope::<Vec<Abstract>>(request)
                .await?
                .into_result_or_default()
        })
    }

    fn abstract_settings(&self, event: EventId) -> ApiFuture<AbstractSettings> {
        let request = self.get(&["events", event.as_str(), "abstract-settings"]);

        Box::pin(async move {
            send_envelope::<AbstractSettings>(request)
                .await?
                .into_result_or_default()
        })
    }
}
