//! Integration tests for the compliance API client using wiremock
//!
//! These tests verify the client behavior against mocked endpoints, ensuring
//! proper handling of the concurrency-token headers, not-found semantics, and
//! error responses.

use rulectl::api::auth::Credentials;
use rulectl::api::client::ComplianceClient;
use rulectl::model::{RequiredConfig, RulePayload, RuleValue, Target};
use serde_json::json;
use wiremock::matchers::{bearer_token, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(server: &MockServer) -> ComplianceClient {
    ComplianceClient::with_credentials(&server.uri(), Credentials::from_key("test-key-0123456789"))
        .expect("client should build")
}

fn sample_payload() -> RulePayload {
    RulePayload {
        description: "bucket location check".to_string(),
        target: Target {
            service_name: "cloud-object-storage".to_string(),
            resource_kind: "bucket".to_string(),
            ..Target::default()
        },
        required_config: RequiredConfig {
            property: Some("location".to_string()),
            operator: Some("string_equals".to_string()),
            value: Some(RuleValue::Scalar("us-south".to_string())),
            ..RequiredConfig::default()
        },
        version: None,
        import: None,
        labels: None,
    }
}

fn rule_body(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "description": "bucket location check",
        "type": "user_defined",
        "account_id": "acct-1",
        "target": {"service_name": "cloud-object-storage", "resource_kind": "bucket"},
        "required_config": {
            "property": "location",
            "operator": "string_equals",
            "value": "us-south"
        },
        "created_on": "2024-03-01T10:30:00Z",
        "created_by": "iam-user"
    })
}

/// A successful get returns the parsed rule and the ETag header verbatim
#[tokio::test]
async fn test_get_rule_captures_etag() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/instances/inst-1/v3/rules/rule-1"))
        .and(bearer_token("test-key-0123456789"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "W/\"42\"")
                .set_body_json(rule_body("rule-1")),
        )
        .mount(&server)
        .await;

    let client = test_client(&server);
    let revision = client
        .get_rule("inst-1", "rule-1")
        .await
        .expect("get should succeed")
        .expect("rule should exist");

    assert_eq!(revision.rule.id, "rule-1");
    assert_eq!(revision.etag.as_deref(), Some("W/\"42\""));
    assert_eq!(revision.rule.rule_type.as_deref(), Some("user_defined"));
}

/// A 404 is not an error: the rule is simply gone
#[tokio::test]
async fn test_get_rule_returns_none_on_404() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/instances/inst-1/v3/rules/vanished"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errors": [{"code": "not_found", "message": "rule not found"}]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let revision = client
        .get_rule("inst-1", "vanished")
        .await
        .expect("get should not error on 404");

    assert!(revision.is_none());
}

/// Non-404 failures are errors
#[tokio::test]
async fn test_get_rule_propagates_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/instances/inst-1/v3/rules/rule-1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = test_client(&server);
    assert!(client.get_rule("inst-1", "rule-1").await.is_err());
}

/// Create posts the payload and parses the assigned identity
#[tokio::test]
async fn test_create_rule() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/instances/inst-1/v3/rules"))
        .and(bearer_token("test-key-0123456789"))
        .respond_with(ResponseTemplate::new(201).set_body_json(rule_body("rule-new")))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let rule = client
        .create_rule("inst-1", &sample_payload())
        .await
        .expect("create should succeed");

    assert_eq!(rule.id, "rule-new");
    assert_eq!(rule.account_id.as_deref(), Some("acct-1"));
}

/// Replace sends the concurrency token as If-Match
#[tokio::test]
async fn test_replace_rule_sends_if_match() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/instances/inst-1/v3/rules/rule-1"))
        .and(header("If-Match", "W/\"42\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(rule_body("rule-1")))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let rule = client
        .replace_rule("inst-1", "rule-1", "W/\"42\"", &sample_payload())
        .await
        .expect("replace should succeed");

    assert_eq!(rule.id, "rule-1");
}

/// A stale or missing token is rejected by the service with a conflict
#[tokio::test]
async fn test_replace_rule_stale_etag_conflicts() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/instances/inst-1/v3/rules/rule-1"))
        .and(header("If-Match", "W/\"42\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(rule_body("rule-1")))
        .mount(&server)
        .await;

    // Anything else, including an empty token, conflicts.
    Mock::given(method("PUT"))
        .and(path("/instances/inst-1/v3/rules/rule-1"))
        .respond_with(ResponseTemplate::new(412).set_body_json(json!({
            "errors": [{"code": "precondition_failed", "message": "etag mismatch"}]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client
        .replace_rule("inst-1", "rule-1", "W/\"1\"", &sample_payload())
        .await
        .expect_err("stale etag should be rejected");

    let friendly = rulectl::api::http::format_api_error(&err);
    assert!(friendly.contains("etag"), "unexpected message: {friendly}");
}

/// Delete succeeds on a 2xx with an empty body
#[tokio::test]
async fn test_delete_rule() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/instances/inst-1/v3/rules/rule-1"))
        .and(bearer_token("test-key-0123456789"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = test_client(&server);
    client
        .delete_rule("inst-1", "rule-1")
        .await
        .expect("delete should succeed");
}

/// Requests carry a correlation id for the service's diagnostics
#[tokio::test]
async fn test_requests_carry_correlation_id() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/instances/inst-1/v3/rules/rule-1"))
        .and(wiremock::matchers::header_exists("X-Correlation-Id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rule_body("rule-1")))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let revision = client.get_rule("inst-1", "rule-1").await.unwrap();
    assert!(revision.is_some());
}
