//! HTTP client against a stubbed Atlas backend.
//!
//! Run with: `cargo test -p onsite-atlas --test http_client_test`

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use onsite_atlas::api::http::IDEMPOTENCY_KEY_HEADER;
use onsite_atlas::api::{AtlasApi, HttpAtlasApi, ScanRequest};
use onsite_atlas::error::ApiError;
use onsite_atlas::types::{
    EventId, RegistrationId, ResourceOptionId, ResourceType, ScanAttemptId,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> HttpAtlasApi {
    HttpAtlasApi::new(
        format!("{}/api/", server.uri()),
        Some("station-token".to_string()),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn breakfast_scan(code: &str) -> ScanRequest {
    ScanRequest {
        event_id: EventId::new("E1"),
        resource_type: ResourceType::Food,
        resource_option_id: ResourceOptionId::new("0_Breakfast"),
        qr_code: code.to_string(),
    }
}

#[tokio::test]
async fn settings_are_unwrapped_from_the_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/events/E1/resources/settings"))
        .and(query_param("type", "food"))
        .and(header("authorization", "Bearer station-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "settings": {
                "days": [{ "date": "2025-01-01", "meals": [{ "name": "Breakfast" }, { "name": "Lunch" }] }]
            } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let settings = client(&server)
        .resource_settings(EventId::new("E1"), ResourceType::Food)
        .await
        .unwrap();

    assert_eq!(settings.days.len(), 1);
    assert_eq!(settings.days[0].meals.len(), 2);
}

#[tokio::test]
async fn malformed_settings_read_as_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/events/E1/resources/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "settings": { "items": "not-a-list" } }
        })))
        .mount(&server)
        .await;

    let settings = client(&server)
        .resource_settings(EventId::new("E1"), ResourceType::Kits)
        .await
        .unwrap();

    assert!(settings.items.is_empty());
}

#[tokio::test]
async fn validation_returns_the_registration() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/resources/validate-scan"))
        .and(body_partial_json(json!({
            "eventId": "E1",
            "resourceType": "food",
            "resourceOptionId": "0_Breakfast",
            "qrCode": "REG-001"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "registration": { "_id": "r1", "firstName": "Ada" } }
        })))
        .mount(&server)
        .await;

    let validation = client(&server).validate_scan(breakfast_scan("REG-001")).await.unwrap();

    let registration = validation.registration.unwrap();
    assert_eq!(registration.id, RegistrationId::new("r1"));
    assert_eq!(registration.first_name.as_deref(), Some("Ada"));
}

#[tokio::test]
async fn unsuccessful_envelope_is_a_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/resources/validate-scan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "Already redeemed",
            "details": "Redeemed at 08:12"
        })))
        .mount(&server)
        .await;

    let error = client(&server)
        .validate_scan(breakfast_scan("REG-001"))
        .await
        .unwrap_err();

    assert_eq!(
        error,
        ApiError::Rejected {
            message: "Already redeemed".to_string(),
            details: Some("Redeemed at 08:12".to_string()),
        }
    );
}

#[tokio::test]
async fn client_error_with_envelope_is_a_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/resources/validate-scan"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "message": "Invalid QR code"
        })))
        .mount(&server)
        .await;

    let error = client(&server)
        .validate_scan(breakfast_scan("garbage"))
        .await
        .unwrap_err();

    assert!(error.is_rejection());
    assert_eq!(error.to_string(), "Invalid QR code");
}

#[tokio::test]
async fn failure_without_message_gets_a_generic_one() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/resources/validate-scan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": false })))
        .mount(&server)
        .await;

    let error = client(&server)
        .validate_scan(breakfast_scan("REG-001"))
        .await
        .unwrap_err();

    assert_eq!(error.to_string(), "Request was not successful");
}

#[tokio::test]
async fn unauthorized_is_reported_separately() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/resources/statistics"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "message": "Token expired"
        })))
        .mount(&server)
        .await;

    let error = client(&server)
        .resource_statistics(
            EventId::new("E1"),
            ResourceType::Food,
            ResourceOptionId::new("0_Breakfast"),
        )
        .await
        .unwrap_err();

    assert_eq!(error, ApiError::Unauthorized("Token expired".to_string()));
}

#[tokio::test]
async fn server_error_without_envelope_keeps_the_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/resources/recent"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let error = client(&server)
        .recent_scans(EventId::new("E1"), ResourceType::Food, 10)
        .await
        .unwrap_err();

    assert!(matches!(error, ApiError::Status { status: 502, .. }));
}

#[tokio::test]
async fn usage_record_sends_idempotency_key_and_selected_option() {
    let server = MockServer::start().await;
    let attempt = ScanAttemptId::new();
    Mock::given(method("POST"))
        .and(path("/api/resources/scan"))
        .and(header(IDEMPOTENCY_KEY_HEADER, attempt.to_string().as_str()))
        .and(body_partial_json(json!({
            "qrCode": "REG-001",
            "resourceOptionId": "0_Breakfast",
            "selectedOption": "0_Breakfast"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "success": true, "message": "Recorded" })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .record_usage(breakfast_scan("REG-001"), attempt)
        .await
        .unwrap();
}

#[tokio::test]
async fn statistics_and_recent_scans_pass_their_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/resources/statistics"))
        .and(query_param("eventId", "E1"))
        .and(query_param("type", "food"))
        .and(query_param("resourceOptionId", "0_Breakfast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "count": 120, "today": 40, "uniqueAttendees": 118 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/resources/recent"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{
                "_id": "s1",
                "registration": { "_id": "r1", "registrationId": "REG-001" },
                "type": "food",
                "resourceOptionId": "0_Breakfast",
                "timestamp": "2025-01-01T08:12:00Z"
            }]
        })))
        .mount(&server)
        .await;
    let api = client(&server);

    let stats = api
        .resource_statistics(
            EventId::new("E1"),
            ResourceType::Food,
            ResourceOptionId::new("0_Breakfast"),
        )
        .await
        .unwrap();
    let recent = api
        .recent_scans(EventId::new("E1"), ResourceType::Food, 5)
        .await
        .unwrap();

    assert_eq!(stats.count, 120);
    assert_eq!(stats.unique_attendees, 118);
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].resource_type, ResourceType::Food);
}

#[tokio::test]
async fn certificate_pdf_is_returned_as_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/events/E1/registrations/r1/certificates/tmpl-1/pdf"))
        .and(header("accept", "application/pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(b"%PDF-1.7 certificate".to_vec()),
        )
        .mount(&server)
        .await;

    let pdf = client(&server)
        .certificate_pdf(
            EventId::new("E1"),
            RegistrationId::new("r1"),
            ResourceOptionId::new("tmpl-1"),
        )
        .await
        .unwrap();

    assert!(pdf.starts_with(b"%PDF"));
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let server = MockServer::start().await;
    let api = client(&server);
    drop(server);

    let error = api
        .registration(EventId::new("E1"), RegistrationId::new("r1"))
        .await
        .unwrap_err();

    assert!(matches!(error, ApiError::Transport(_)));
}

#[tokio::test]
async fn scanned_payload_stays_inside_its_path_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/events/E1/registrations/REG%2F001%3Fadmin=1%23x"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "_id": "r1", "registrationId": "REG/001?admin=1#x" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let registration = client(&server)
        .registration(EventId::new("E1"), RegistrationId::new("REG/001?admin=1#x"))
        .await
        .unwrap();

    assert_eq!(registration.id, RegistrationId::new("r1"));
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.query(), None);
}

#[tokio::test]
async fn option_ids_with_slashes_reach_the_certificate_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/events/E1/registrations/r1/certificates/0_Tea%2FCoffee/pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let pdf = client(&server)
        .certificate_pdf(
            EventId::new("E1"),
            RegistrationId::new("r1"),
            ResourceOptionId::new("0_Tea/Coffee"),
        )
        .await
        .unwrap();

    assert!(pdf.starts_with(b"%PDF"));
}
