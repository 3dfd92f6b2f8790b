//! Connector surface tests: validation, metadata and event mapping.

mod common;

use common::*;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use idsync_connector::annotations::Annotation;
use idsync_connector::resource::ResourceId;
use idsync_connector::traits::{Connector, ResourceSyncer};
use idsync_connector_okta::{LogEvent, OktaConfig};

#[tokio::test]
async fn test_validate_without_token_makes_no_call() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/org"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "00o1"})))
        .expect(0)
        .mount(&server)
        .await;

    let connector = test_connector(OktaConfig::new(TEST_DOMAIN).with_base_url(server.uri()));
    let annotations = connector.validate().await.unwrap();
    assert!(annotations.is_empty());
}

#[tokio::test]
async fn test_empty_token_sends_no_authorization_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/groups/00g1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(create_test_group("00g1", "Engineering", None)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let connector = test_connector(
        OktaConfig::new(TEST_DOMAIN)
            .with_base_url(server.uri())
            .with_api_token(""),
    );
    connector.validate().await.unwrap();
    connector
        .group_syncer()
        .get(&ResourceId::new("group", "00g1"), None)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_validate_fetches_org_settings() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/org"))
        .and(header("authorization", format!("SSWS {TEST_TOKEN}").as_str()))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "00o1",
            "subdomain": "acme",
            "companyName": "Acme"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let connector = test_connector(test_config(&server));
    connector.validate().await.unwrap();
}

#[tokio::test]
async fn test_validate_access_denied_is_fatal() {
    let server = MockServer::start().await;
    mock_get_error(&server, "/api/v1/org", 403, "E0000006").await;

    let connector = test_connector(test_config(&server));
    let err = connector.validate().await.unwrap_err();
    assert!(err.is_access_denied());
}

#[tokio::test]
async fn test_validate_invalid_token() {
    let server = MockServer::start().await;
    mock_get_error(&server, "/api/v1/org", 401, "E0000011").await;

    let connector = test_connector(test_config(&server));
    let err = connector.validate().await.unwrap_err();
    assert_eq!(err.error_code(), "UPSTREAM_ERROR");
    assert!(err.is_permanent());
    assert!(!err.to_string().contains(TEST_TOKEN));
}

#[tokio::test]
async fn test_metadata() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/org"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "00o1"})))
        .mount(&server)
        .await;

    let connector = test_connector(test_config(&server));
    let metadata = connector.metadata().await.unwrap();

    assert_eq!(metadata.display_name, "Okta");
    assert!(metadata
        .annotations
        .contains(|a| matches!(a, Annotation::ExternalLink { url } if url == TEST_DOMAIN)));

    let schema = metadata.account_creation_schema.unwrap();
    let names: Vec<_> = schema.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "first_name",
            "last_name",
            "email",
            "login",
            "password_change_on_login_required"
        ]
    );
}

#[tokio::test]
async fn test_map_user_lifecycle_event() {
    let server = MockServer::start().await;
    let connector = test_connector(test_config(&server));

    let event: LogEvent = serde_json::from_value(json!({
        "uuid": "b1d2",
        "eventType": "user.lifecycle.create",
        "published": "2024-06-01T08:00:00.000Z",
        "target": [{"id": "00u9", "type": "User", "alternateId": "new@acme.com"}]
    }))
    .unwrap();

    let change = connector.map_event(&event).unwrap().unwrap();
    assert_eq!(change.resource_id, ResourceId::new("user", "00u9"));
    assert_eq!(change.event_id, "b1d2");
}
