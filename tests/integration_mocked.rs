/// Integration tests with a mocked Zoho API
/// Covers the token cache, the CRM client and the upsert decision without hitting Zoho
use chrono::{DateTime, Duration, TimeZone, Utc};
use pipefile_zoho_sync::errors::AppError;
use pipefile_zoho_sync::token_cache::{Clock, OAuthCredentials, TokenCache, TOKEN_VALIDITY_MINUTES};
use pipefile_zoho_sync::upsert::{upsert, UpsertAction, DEFAULT_SEARCH_FIELD};
use pipefile_zoho_sync::zoho_client::{http_client, ZohoClient};
use pipefile_zoho_sync::zoho_models::{fields, CrmRecord};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Clock that only moves when told to.
struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    fn starting_at(start: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(start)))
    }

    fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

fn credentials() -> OAuthCredentials {
    OAuthCredentials {
        client_id: "1000.CLIENT".to_string(),
        client_secret: "client_secret".to_string(),
        refresh_token: "1000.refresh".to_string(),
    }
}

fn token_cache(server: &MockServer) -> Arc<TokenCache> {
    let http = http_client(std::time::Duration::from_secs(5)).unwrap();
    Arc::new(TokenCache::new(http, server.uri(), credentials()))
}

fn zoho_client(server: &MockServer, tokens: Arc<TokenCache>) -> ZohoClient {
    let http = http_client(std::time::Duration::from_secs(5)).unwrap();
    ZohoClient::new(http, server.uri(), tokens)
}

async fn mount_token(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "api_domain": "https://www.zohoapis.com",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

fn success_body(id: &str) -> Value {
    json!({
        "data": [{
            "code": "SUCCESS",
            "status": "success",
            "message": "record added",
            "details": { "id": id }
        }]
    })
}

fn jane_record() -> CrmRecord {
    let mut record = CrmRecord::new();
    record.insert(fields::FIRST_NAME, "Jane");
    record.insert(fields::LAST_NAME, "Doe");
    record.insert(fields::EMAIL, "jane@x.com");
    record
}

// ============ Token cache ============

#[tokio::test]
async fn test_token_cached_until_expiry_then_refreshed_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(query_param("refresh_token", "1000.refresh"))
        .and(query_param("client_id", "1000.CLIENT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok-1"})))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok-2"})))
        .expect(1)
        .mount(&server)
        .await;

    let start = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
    let clock = ManualClock::starting_at(start);
    let http = http_client(std::time::Duration::from_secs(5)).unwrap();
    let cache = TokenCache::new(http, server.uri(), credentials()).with_clock(clock.clone());

    assert_eq!(cache.get_access_token().await.unwrap(), "tok-1");
    assert_eq!(
        cache.cached().await.unwrap().expires_at,
        start + Duration::minutes(TOKEN_VALIDITY_MINUTES)
    );

    // Still inside the validity window: no new exchange
    clock.advance(Duration::minutes(54));
    assert_eq!(cache.get_access_token().await.unwrap(), "tok-1");

    // Past expiry: exactly one refresh, validity extended from the new "now"
    clock.advance(Duration::minutes(2));
    assert_eq!(cache.get_access_token().await.unwrap(), "tok-2");
    assert_eq!(cache.get_access_token().await.unwrap(), "tok-2");
    assert_eq!(
        cache.cached().await.unwrap().expires_at,
        start + Duration::minutes(56) + Duration::minutes(TOKEN_VALIDITY_MINUTES)
    );
}

#[tokio::test]
async fn test_revoked_refresh_token_is_auth_error() {
    let server = MockServer::start().await;

    // Zoho reports grant errors with HTTP 200
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "invalid_code"})))
        .mount(&server)
        .await;

    let cache = token_cache(&server);
    match cache.get_access_token().await {
        Err(AppError::Auth(reason)) => assert_eq!(reason, "invalid_code"),
        other => panic!("Expected auth error, got {:?}", other),
    }
    assert!(cache.cached().await.is_none());
}

#[tokio::test]
async fn test_token_endpoint_error_status_is_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let result = token_cache(&server).get_access_token().await;
    assert!(matches!(result, Err(AppError::Auth(_))));
}

// ============ CRM client ============

#[tokio::test]
async fn test_search_not_found_is_empty() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path("/crm/v8/Leads/search"))
        .and(query_param("criteria", "(Email:equals:nobody@x.com)"))
        .and(header("Authorization", "Zoho-oauthtoken tok-1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = zoho_client(&server, token_cache(&server));
    let results = client.search("Leads", "Email", "nobody@x.com").await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_search_no_content_is_empty() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path("/crm/v8/Leads/search"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = zoho_client(&server, token_cache(&server));
    let results = client.search("Leads", "Email", "jane@x.com").await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_search_returns_matches_in_provider_order() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path("/crm/v8/Leads/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "111", "Email": "jane@x.com"},
                {"id": "222", "Email": "jane@x.com"}
            ],
            "info": {"count": 2, "more_records": false}
        })))
        .mount(&server)
        .await;

    let client = zoho_client(&server, token_cache(&server));
    let results = client.search("Leads", "Email", "jane@x.com").await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id(), Some("111".to_string()));
    assert_eq!(results[1].id(), Some("222".to_string()));
}

#[tokio::test]
async fn test_search_server_error_carries_body() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path("/crm/v8/Leads/search"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let client = zoho_client(&server, token_cache(&server));
    match client.search("Leads", "Email", "jane@x.com").await {
        Err(AppError::CrmApi { status, body, .. }) => {
            assert_eq!(status, Some(500));
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("Expected CRM error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unauthorized_response_invalidates_token() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path("/crm/v8/Leads/search"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "INVALID_TOKEN",
            "status": "error",
            "message": "invalid oauth token"
        })))
        .mount(&server)
        .await;

    let tokens = token_cache(&server);
    let client = zoho_client(&server, tokens.clone());

    let result = client.search("Leads", "Email", "jane@x.com").await;
    assert!(matches!(result, Err(AppError::CrmApi { status: Some(401), .. })));
    assert!(tokens.cached().await.is_none());
}

#[tokio::test]
async fn test_create_returns_record_id() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("POST"))
        .and(path("/crm/v8/Leads"))
        .and(header("Authorization", "Zoho-oauthtoken tok-1"))
        .and(body_string_contains("\"Email\":\"jane@x.com\""))
        .respond_with(ResponseTemplate::new(201).set_body_json(success_body("5725767000000524157")))
        .expect(1)
        .mount(&server)
        .await;

    let client = zoho_client(&server, token_cache(&server));
    let id = client.create("Leads", &jane_record()).await.unwrap();
    assert_eq!(id, "5725767000000524157");
}

#[tokio::test]
async fn test_create_item_failure_behind_http_200() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("POST"))
        .and(path("/crm/v8/Leads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "code": "DUPLICATE_DATA",
                "status": "error",
                "message": "duplicate data",
                "details": {"api_name": "Email"}
            }]
        })))
        .mount(&server)
        .await;

    let client = zoho_client(&server, token_cache(&server));
    match client.create("Leads", &jane_record()).await {
        Err(AppError::CrmApi {
            message, status, body,
        }) => {
            assert!(message.contains("DUPLICATE_DATA"));
            assert_eq!(status, Some(200));
            assert!(body.contains("duplicate data"));
        }
        other => panic!("Expected CRM error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_update_returns_record_id() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("PUT"))
        .and(path("/crm/v8/Leads/111"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body("111")))
        .expect(1)
        .mount(&server)
        .await;

    let client = zoho_client(&server, token_cache(&server));
    let id = client.update("Leads", "111", &jane_record()).await.unwrap();
    assert_eq!(id, "111");
}

#[tokio::test]
async fn test_attach_url_sends_link_field() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("POST"))
        .and(path("/crm/v8/Leads/111/Attachments"))
        .and(body_string_contains("name=\"attachmentUrl\""))
        .and(body_string_contains("https://api.pipefile.com/v1/file_pipes/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body("att-1")))
        .expect(1)
        .mount(&server)
        .await;

    let client = zoho_client(&server, token_cache(&server));
    let id = client
        .attach_url("Leads", "111", "https://api.pipefile.com/v1/file_pipes/abc")
        .await
        .unwrap();
    assert_eq!(id, "att-1");
}

#[tokio::test]
async fn test_attach_file_downloads_then_uploads() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path("/files/report"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string("quarterly report"),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/crm/v8/Leads/111/Attachments"))
        .and(body_string_contains("name=\"file\""))
        .and(body_string_contains("filename=\"report.txt\""))
        .and(body_string_contains("quarterly report"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body("att-2")))
        .expect(1)
        .mount(&server)
        .await;

    let client = zoho_client(&server, token_cache(&server));
    let id = client
        .attach_file(
            "Leads",
            "111",
            &format!("{}/files/report", server.uri()),
            "report.txt",
            1024,
        )
        .await
        .unwrap();
    assert_eq!(id, "att-2");
}

#[tokio::test]
async fn test_attach_file_refuses_oversized_download() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path("/files/big"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 100]))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/crm/v8/Leads/111/Attachments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body("never")))
        .expect(0)
        .mount(&server)
        .await;

    let client = zoho_client(&server, token_cache(&server));
    let result = client
        .attach_file("Leads", "111", &format!("{}/files/big", server.uri()), "big", 10)
        .await;
    assert!(matches!(result, Err(AppError::Attachment(_))));
}

// ============ Upsert ============

#[tokio::test]
async fn test_upsert_without_email_creates_without_searching() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path("/crm/v8/Leads/search"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/crm/v8/Leads"))
        .respond_with(ResponseTemplate::new(201).set_body_json(success_body("900")))
        .expect(1)
        .mount(&server)
        .await;

    let mut record = jane_record();
    record.insert(fields::EMAIL, Value::Null);

    let client = zoho_client(&server, token_cache(&server));
    let result = upsert(&client, "Leads", &record, DEFAULT_SEARCH_FIELD)
        .await
        .unwrap();
    assert_eq!(result.action, UpsertAction::Created);
    assert_eq!(result.record_id, "900");
}

#[tokio::test]
async fn test_upsert_updates_first_match_and_never_creates() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path("/crm/v8/Leads/search"))
        .and(query_param("criteria", "(Email:equals:jane@x.com)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "111"}, {"id": "222"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/crm/v8/Leads/111"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body("111")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/crm/v8/Leads"))
        .respond_with(ResponseTemplate::new(201).set_body_json(success_body("never")))
        .expect(0)
        .mount(&server)
        .await;

    let client = zoho_client(&server, token_cache(&server));
    let result = upsert(&client, "Leads", &jane_record(), DEFAULT_SEARCH_FIELD)
        .await
        .unwrap();
    assert_eq!(result.action, UpsertAction::Updated);
    assert_eq!(result.record_id, "111");
}

#[tokio::test]
async fn test_upsert_creates_when_search_is_empty() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path("/crm/v8/Leads/search"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/crm/v8/Leads"))
        .respond_with(ResponseTemplate::new(201).set_body_json(success_body("555")))
        .expect(1)
        .mount(&server)
        .await;

    let client = zoho_client(&server, token_cache(&server));
    let result = upsert(&client, "Leads", &jane_record(), DEFAULT_SEARCH_FIELD)
        .await
        .unwrap();
    assert_eq!(result.action, UpsertAction::Created);
    assert_eq!(result.record_id, "555");
}

#[tokio::test]
async fn test_upsert_propagates_search_failure() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path("/crm/v8/Leads/search"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad criteria"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/crm/v8/Leads"))
        .respond_with(ResponseTemplate::new(201).set_body_json(success_body("never")))
        .expect(0)
        .mount(&server)
        .await;

    let client = zoho_client(&server, token_cache(&server));
    let result = upsert(&client, "Leads", &jane_record(), DEFAULT_SEARCH_FIELD).await;
    assert!(matches!(result, Err(AppError::CrmApi { status: Some(400), .. })));
}

#[tokio::test]
async fn test_concurrent_callers_share_token_cache() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path("/crm/v8/Leads/search"))
        .and(header("Authorization", "Zoho-oauthtoken tok-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(10)
        .mount(&server)
        .await;

    let client = zoho_client(&server, token_cache(&server));

    // Fire 10 concurrent requests
    let mut handles = vec![];
    for i in 0..10 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client
                .search("Leads", "Email", &format!("user{}@x.com", i))
                .await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(result.unwrap().is_empty());
    }
}
