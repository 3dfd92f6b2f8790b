//! User sync tests: CIAM scoping, pagination and single-user lookups.

mod common;

use common::*;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use idsync_connector::pagination::Token;
use idsync_connector::profile::ProfileValue;
use idsync_connector::resource::{ResourceId, UserStatus};
use idsync_connector::traits::ResourceSyncer;
use idsync_connector_okta::OktaConfig;

#[tokio::test]
async fn test_list_without_email_domains_makes_no_call() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let config = OktaConfig::new(TEST_DOMAIN)
        .with_base_url(server.uri())
        .with_api_token(TEST_TOKEN);
    let connector = test_connector(config);

    let page = connector
        .user_syncer()
        .list(None, &Token::first_page(0))
        .await
        .unwrap();

    assert!(page.items.is_empty());
    assert!(page.is_last());

    let got = connector
        .user_syncer()
        .get(&ResourceId::new("user", "00u1"), None)
        .await
        .unwrap();
    assert!(got.is_none());
}

#[tokio::test]
async fn test_list_filters_by_domain_and_paginates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .and(query_param("search", "status pr"))
        .and(query_param("limit", "2"))
        .and(query_param_is_missing("after"))
        .and(header("authorization", format!("SSWS {TEST_TOKEN}").as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("link", next_link(&server, "/api/v1/users", "00u2").as_str())
                .insert_header("x-rate-limit-limit", "600")
                .insert_header("x-rate-limit-remaining", "598")
                .insert_header("x-rate-limit-reset", "1717000000")
                .set_body_json(json!([
                    create_test_user("00u1", "jane@Acme.com", "ACTIVE"),
                    create_test_user("00u2", "bob@other.com", "ACTIVE"),
                ])),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .and(query_param("after", "00u2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            create_test_user("00u3", "carol@acme.com", "SUSPENDED"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let connector = test_connector(test_config(&server));
    let syncer = connector.user_syncer();

    let first = syncer.list(None, &Token::first_page(2)).await.unwrap();
    assert_eq!(first.items.len(), 1);
    assert_eq!(first.items[0].id, ResourceId::new("user", "00u1"));
    assert!(!first.is_last());
    let rate_limit = first.annotations.rate_limit().unwrap();
    assert_eq!(rate_limit.limit, 600);
    assert_eq!(rate_limit.remaining, 598);

    let second = syncer
        .list(None, &Token::resume(2, first.next_token.clone()))
        .await
        .unwrap();
    assert_eq!(second.items.len(), 1);
    assert!(second.is_last());

    let carol = second.items[0].user_trait().unwrap();
    assert_eq!(carol.status.as_ref().unwrap().status, UserStatus::Disabled);
    assert!(second.annotations.rate_limit().is_none());
}

#[tokio::test]
async fn test_list_skip_secondary_emails() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            create_user_with_second_email("00u1", "jane@acme.com", "jane@home.example"),
        ])))
        .mount(&server)
        .await;

    let connector = test_connector(test_config(&server).with_skip_secondary_emails(true));
    let page = connector
        .user_syncer()
        .list(None, &Token::first_page(0))
        .await
        .unwrap();

    let user = page.items[0].user_trait().unwrap();
    assert_eq!(user.emails.len(), 1);
    assert_eq!(user.primary_email(), Some("jane@acme.com"));
    assert_eq!(user.profile.get("secondEmail"), Some(&ProfileValue::Null));
}

#[tokio::test]
async fn test_secondary_email_brings_user_into_scope() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            create_user_with_second_email("00u1", "jane@other.com", "jane@acme.com"),
        ])))
        .mount(&server)
        .await;

    let connector = test_connector(test_config(&server));
    let page = connector
        .user_syncer()
        .list(None, &Token::first_page(0))
        .await
        .unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].user_trait().unwrap().emails.len(), 2);
}

#[tokio::test]
async fn test_get_user_scoping_and_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/00u1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(create_test_user("00u1", "jane@acme.com", "ACTIVE")),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/00u2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(create_test_user("00u2", "bob@other.com", "ACTIVE")),
        )
        .mount(&server)
        .await;

    mock_get_error(&server, "/api/v1/users/00u404", 404, "E0000007").await;

    let connector = test_connector(test_config(&server));
    let syncer = connector.user_syncer();

    let jane = syncer
        .get(&ResourceId::new("user", "00u1"), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(jane.display_name, "Test User 00u1");

    let bob = syncer
        .get(&ResourceId::new("user", "00u2"), None)
        .await
        .unwrap();
    assert!(bob.is_none());

    let missing = syncer
        .get(&ResourceId::new("user", "00u404"), None)
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_get_user_served_from_response_cache() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/00u1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(create_test_user("00u1", "jane@acme.com", "ACTIVE")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let connector = test_connector(test_config(&server));
    let id = ResourceId::new("user", "00u1");

    let first = connector.user_syncer().get(&id, None).await.unwrap();
    let second = connector.user_syncer().get(&id, None).await.unwrap();
    assert_eq!(first, second);
    assert!(first.is_some());
}

#[tokio::test]
async fn test_get_user_without_cache_calls_every_time() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/00u1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(create_test_user("00u1", "jane@acme.com", "ACTIVE")),
        )
        .expect(2)
        .mount(&server)
        .await;

    let connector = test_connector(test_config(&server).with_cache(false));
    let id = ResourceId::new("user", "00u1");

    connector.user_syncer().get(&id, None).await.unwrap();
    connector.user_syncer().get(&id, None).await.unwrap();
}

#[tokio::test]
async fn test_list_upstream_error_carries_rate_limit() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("x-rate-limit-limit", "600")
                .insert_header("x-rate-limit-remaining", "0")
                .insert_header("x-rate-limit-reset", "1717000000")
                .set_body_json(create_okta_error("E0000047", "API call exceeded rate limit")),
        )
        .mount(&server)
        .await;

    let connector = test_connector(test_config(&server));
    let err = connector
        .user_syncer()
        .list(None, &Token::first_page(0))
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "UPSTREAM_ERROR");
    assert!(!err.is_permanent());
    assert_eq!(err.rate_limit().unwrap().remaining, 0);
}
