//! PagerDuty client against a wiremock server.

use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pdsync_core::{PlatformError, ScheduleSource};
use pdsync_pagerduty::PagerDutyClient;

fn client(server: &MockServer) -> PagerDutyClient {
    PagerDutyClient::with_http_client(server.uri(), "pd-token", reqwest::Client::new())
}

#[tokio::test]
async fn test_get_schedule_sends_auth_headers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/schedules/P1"))
        .and(header("Authorization", "Token token=pd-token"))
        .and(header("Accept", "application/vnd.pagerduty+json;version=2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "schedule": { "id": "P1", "name": "Backend", "time_zone": "UTC" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let schedule = client(&server).get_schedule("P1").await.unwrap().unwrap();
    assert_eq!(schedule.id, "P1");
    assert_eq!(schedule.name, "Backend");
}

#[tokio::test]
async fn test_get_schedule_not_found_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/schedules/NOPE"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "message": "Not Found", "code": 2100 }
        })))
        .mount(&server)
        .await;

    assert!(client(&server).get_schedule("NOPE").await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_schedules_page_uses_offset_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/schedules"))
        .and(query_param("limit", "100"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "schedules": [{ "id": "P1", "name": "Backend" }],
            "limit": 100, "offset": 0, "more": true
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/schedules"))
        .and(query_param("offset", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "schedules": [{ "id": "P2", "name": "Frontend" }],
            "limit": 100, "offset": 100, "more": false
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let first = client.list_schedules_page(None).await.unwrap();
    assert_eq!(first.items[0].id, "P1");
    assert_eq!(first.next_cursor.as_deref(), Some("100"));

    let second = client.list_schedules_page(Some("100")).await.unwrap();
    assert_eq!(second.items[0].name, "Frontend");
    assert!(second.next_cursor.is_none());
}

#[tokio::test]
async fn test_list_on_call_passes_window() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/schedules/P1/users"))
        .and(query_param("since", "2024-03-01T12:00:00Z"))
        .and(query_param("until", "2024-03-01T12:00:01Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{ "id": "PU1", "name": "Alice Smith", "email": "alice@example.com" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let since = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let until = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 1).unwrap();
    let users = client(&server).list_on_call("P1", since, until).await.unwrap();

    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "Alice Smith");
    assert_eq!(users[0].email, "alice@example.com");
}

#[tokio::test]
async fn test_rate_limit_has_no_server_delay() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/schedules/P1"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "5"))
        .mount(&server)
        .await;

    let err = client(&server).get_schedule("P1").await.unwrap_err();
    assert!(matches!(err, PlatformError::RateLimited { retry_after: None }));
}

#[tokio::test]
async fn test_unauthorized_is_permission_denied() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/schedules"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Unauthorized", "code": 2006 }
        })))
        .mount(&server)
        .await;

    let err = client(&server).list_schedules_page(None).await.unwrap_err();
    match err {
        PlatformError::PermissionDenied(msg) => assert!(msg.contains("Unauthorized")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_server_error_is_http() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/schedules/P1/users"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let now = Utc::now();
    let err = client(&server)
        .list_on_call("P1", now - chrono::Duration::seconds(1), now)
        .await
        .unwrap_err();
    assert!(matches!(err, PlatformError::Http { status: 502, .. }));
}
