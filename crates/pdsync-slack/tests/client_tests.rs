//! Slack client against a wiremock server.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pdsync_core::models::JoinOutcome;
use pdsync_core::{ChatPlatform, PlatformError};
use pdsync_slack::SlackClient;

fn client(server: &MockServer) -> SlackClient {
    SlackClient::with_http_client(server.uri(), "xoxb-test", reqwest::Client::new())
}

fn ok(body: serde_json::Value) -> ResponseTemplate {
    let mut body = body;
    body["ok"] = json!(true);
    ResponseTemplate::new(200).set_body_json(body)
}

fn slack_error(code: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "ok": false, "error": code }))
}

// ═══════════════════════════════════════════════════════════════════════════
// Listings
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_users_list_filters_non_humans_and_lowercases() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users.list"))
        .and(header("Authorization", "Bearer xoxb-test"))
        .and(query_param("limit", "200"))
        .respond_with(ok(json!({
            "members": [
                { "id": "U1", "name": "Alice", "real_name": "Alice Smith",
                  "profile": { "email": "alice@example.com" } },
                { "id": "U2", "name": "gone", "deleted": true },
                { "id": "B1", "name": "deploy", "is_bot": true },
                { "id": "USLACKBOT", "name": "slackbot" }
            ],
            "response_metadata": { "next_cursor": "dXNlcjpVMg==" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client(&server).list_accounts_page(None).await.unwrap();

    assert_eq!(page.items.len(), 1);
    let alice = &page.items[0];
    assert_eq!(alice.id, "U1");
    assert_eq!(alice.name, "alice");
    assert_eq!(alice.real_name, "alice smith");
    assert_eq!(alice.email, "alice@example.com");
    assert_eq!(page.next_cursor.as_deref(), Some("dXNlcjpVMg=="));
}

#[tokio::test]
async fn test_conversations_list_private_channels() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/conversations.list"))
        .and(query_param("exclude_archived", "true"))
        .and(query_param("types", "public_channel,private_channel"))
        .and(query_param("cursor", "abc"))
        .respond_with(ok(json!({
            "channels": [{ "id": "C1", "name": "eng", "topic": { "value": "Backend: U1" } }],
            "response_metadata": { "next_cursor": "" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server).include_private_channels(true);
    let page = client.list_channels_page(Some("abc")).await.unwrap();

    assert_eq!(page.items[0].name, "eng");
    assert_eq!(page.items[0].topic, "Backend: U1");
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn test_usergroups_list() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/usergroups.list"))
        .respond_with(ok(json!({
            "usergroups": [{ "id": "S1", "name": "Backend On-Call", "handle": "backend-oncall" }]
        })))
        .mount(&server)
        .await;

    let groups = client(&server).list_groups().await.unwrap();
    assert_eq!(groups[0].handle, "backend-oncall");
}

// ═══════════════════════════════════════════════════════════════════════════
// Mutations
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_replace_group_members_joins_ids() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/usergroups.users.update"))
        .and(body_string_contains("usergroup=S1"))
        .and(body_string_contains("users=U1%2CU2"))
        .respond_with(ok(json!({ "usergroup": { "id": "S1" } })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .replace_group_members("S1", &["U1".to_string(), "U2".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_set_topic() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/conversations.setTopic"))
        .and(body_string_contains("channel=C1"))
        .respond_with(ok(json!({ "channel": { "id": "C1" } })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .set_channel_status("C1", "Backend: <@U1>")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_get_channel_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/conversations.info"))
        .respond_with(slack_error("channel_not_found"))
        .mount(&server)
        .await;

    let err = client(&server).get_channel("C404").await.unwrap_err();
    assert!(matches!(err, PlatformError::NotFound(_)));
}

// ═══════════════════════════════════════════════════════════════════════════
// Joining
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_join_outcomes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/conversations.join"))
        .and(body_string_contains("channel=C1"))
        .respond_with(ok(json!({ "channel": { "id": "C1" } })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/conversations.join"))
        .and(body_string_contains("channel=C2"))
        .respond_with(ok(json!({
            "channel": { "id": "C2" },
            "warning": "already_in_channel",
            "response_metadata": { "warnings": ["already_in_channel"] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/conversations.join"))
        .and(body_string_contains("channel=G1"))
        .respond_with(slack_error("method_not_supported_for_channel_type"))
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(client.join_channel("C1").await.unwrap(), JoinOutcome::Joined);
    assert_eq!(client.join_channel("C2").await.unwrap(), JoinOutcome::AlreadyMember);
    assert_eq!(client.join_channel("G1").await.unwrap(), JoinOutcome::NotPermitted);
}

#[tokio::test]
async fn test_join_missing_scope() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/conversations.join"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": false, "error": "missing_scope", "needed": "channels:join"
        })))
        .mount(&server)
        .await;

    let err = client(&server).join_channel("C1").await.unwrap_err();
    assert!(err.is_permission());
    assert_eq!(err.to_string(), "missing scope: channels:join");
}

#[tokio::test]
async fn test_join_unexpected_warning_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/conversations.join"))
        .respond_with(ok(json!({ "warning": "superfluous_charset" })))
        .mount(&server)
        .await;

    let err = client(&server).join_channel("C1").await.unwrap_err();
    assert!(err.to_string().contains("superfluous_charset"));
}

// ═══════════════════════════════════════════════════════════════════════════
// Rate limiting
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_http_429_carries_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/usergroups.users.list"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let err = client(&server).get_group_members("S1").await.unwrap_err();
    assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
}

#[tokio::test]
async fn test_ratelimited_body_is_rate_limit() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/usergroups.users.list"))
        .respond_with(slack_error("ratelimited"))
        .mount(&server)
        .await;

    let err = client(&server).get_group_members("S1").await.unwrap_err();
    assert!(err.is_rate_limited());
    assert_eq!(err.retry_after(), None);
}
