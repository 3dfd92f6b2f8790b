//! Common test utilities for idsync-connector-okta integration tests.

#![allow(dead_code)]

use std::sync::Once;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use idsync_connector::resource::Resource;
use idsync_connector_okta::group::group_resource;
use idsync_connector_okta::{OktaConfig, OktaConnector, OktaGroup};

pub const TEST_TOKEN: &str = "00test-token";
pub const TEST_DOMAIN: &str = "acme.okta.com";

/// Config pointed at the mock server, with a token and the `acme.com` CIAM
/// domain.
pub fn test_config(server: &MockServer) -> OktaConfig {
    OktaConfig::new(TEST_DOMAIN)
        .with_base_url(server.uri())
        .with_api_token(TEST_TOKEN)
        .with_ciam_email_domains(["acme.com"])
}

static INIT: Once = Once::new();

/// Initialize logging for tests (once). Set `RUST_LOG` to see connector spans.
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

pub fn test_connector(config: OktaConfig) -> OktaConnector {
    init_test_logging();
    OktaConnector::new(config).expect("valid test config")
}

/// Test data factory for creating Okta users.
pub fn create_test_user(id: &str, email: &str, status: &str) -> Value {
    json!({
        "id": id,
        "status": status,
        "created": "2024-01-15T09:30:00.000Z",
        "lastLogin": null,
        "profile": {
            "firstName": "Test",
            "lastName": format!("User {id}"),
            "email": email,
            "login": email
        }
    })
}

/// Test data factory for creating Okta users with a secondary email.
pub fn create_user_with_second_email(id: &str, email: &str, second: &str) -> Value {
    let mut user = create_test_user(id, email, "ACTIVE");
    user["profile"]["secondEmail"] = json!(second);
    user
}

/// Test data factory for creating Okta groups. `users_count` adds the
/// embedded stats `expand=stats` returns.
pub fn create_test_group(id: &str, name: &str, users_count: Option<i64>) -> Value {
    let mut group = json!({
        "id": id,
        "type": "OKTA_GROUP",
        "lastMembershipUpdated": "2024-02-01T00:00:00.000Z",
        "profile": {
            "name": name,
            "description": format!("Test group: {name}")
        }
    });
    if let Some(count) = users_count {
        group["_embedded"] = json!({"stats": {"usersCount": count}});
    }
    group
}

/// Group resource as the group syncer would list it.
pub fn group_fixture(id: &str, name: &str, users_count: Option<i64>) -> Resource {
    let group: OktaGroup =
        serde_json::from_value(create_test_group(id, name, users_count)).expect("valid group");
    group_resource(&group)
}

/// Test data factory for a group role assignment.
pub fn create_role_assignment(
    role_type: &str,
    label: &str,
    status: &str,
    assignment_type: &str,
) -> Value {
    json!({
        "id": format!("ra-{}", role_type.to_lowercase()),
        "label": label,
        "type": role_type,
        "status": status,
        "assignmentType": assignment_type
    })
}

/// Okta error envelope.
pub fn create_okta_error(code: &str, summary: &str) -> Value {
    json!({
        "errorCode": code,
        "errorSummary": summary,
        "errorLink": code,
        "errorId": "oae-test",
        "errorCauses": []
    })
}

/// `Link` header value pointing at the next page.
pub fn next_link(server: &MockServer, path: &str, after: &str) -> String {
    format!(
        "<{}{}?after={}&limit=200>; rel=\"next\", <{}{}>; rel=\"self\"",
        server.uri(),
        path,
        after,
        server.uri(),
        path
    )
}

/// Mounts an Okta error response for `GET path`.
pub async fn mock_get_error(server: &MockServer, url_path: &str, status: u16, code: &str) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(
            ResponseTemplate::new(status).set_body_json(create_okta_error(code, "test failure")),
        )
        .mount(server)
        .await;
}

/// Request bodies received by the mock server for `method` and `path`.
pub async fn received_bodies(server: &MockServer, http_method: &str, url_path: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == http_method && r.url.path() == url_path)
        .map(|r| serde_json::from_slice(&r.body).unwrap_or(Value::Null))
        .collect()
}
