use super::{AccessMethod, DrsObject, ProbeSession, RESOLVER_FIELDS, access_id_for_scheme};
use crate::config::SecretString;
use crate::probe::ObjectUri;
use crate::probe_engine::ClientOptions;
use crate::test_support::{StubResponse, StubServer, TEST_OBJECT_URI, closed_host, route, snapshot_for};

const BROKER: &str = "/api/link/v1/fence";
const METADATA: &str = "/ga4gh/drs/v1/objects/obj-123";

fn object() -> ObjectUri {
    ObjectUri::parse(TEST_OBJECT_URI).expect("uri")
}

fn caller() -> SecretString {
    SecretString::new("caller-token")
}

#[test]
fn access_id_lookup_matches_scheme() {
    let object = DrsObject {
        id: Some("obj-123".to_string()),
        size: None,
        access_methods: vec![
            AccessMethod {
                kind: "s3".to_string(),
                access_id: Some("s3-id".to_string()),
            },
            AccessMethod {
                kind: "gs".to_string(),
                access_id: Some("gs-id".to_string()),
            },
        ],
    };
    assert_eq!(access_id_for_scheme(&object, "gs").as_deref(), Some("gs-id"));
    assert_eq!(access_id_for_scheme(&object, "s3").as_deref(), Some("s3-id"));
    assert_eq!(access_id_for_scheme(&object, "https"), None);
}

#[test]
fn access_id_lookup_on_empty_methods_is_none() {
    let object: DrsObject = serde_json::from_str(r#"{"id":"x"}"#).expect("object");
    assert_eq!(access_id_for_scheme(&object, "gs"), None);
}

#[test]
fn metadata_probe_ok_yields_payload() {
    let server = StubServer::start(vec![route(
        "GET",
        METADATA,
        StubResponse::ok(r#"{"id":"obj-123","size":42,"access_methods":[{"type":"gs","access_id":"gs"}]}"#),
    )]);
    let config = snapshot_for(&server.host());
    let mut session = ProbeSession::new(&config, ClientOptions::default()).expect("session");

    let (payload, result) = session.resolve_metadata(&object());

    let metadata = payload.expect("metadata");
    assert_eq!(metadata.size, Some(42));
    assert_eq!(access_id_for_scheme(&metadata, "gs").as_deref(), Some("gs"));
    assert_eq!(result.status_code, Some(200));
    assert!(server.requests_to(METADATA)[0].header("authorization").is_none());
}

#[test]
fn metadata_probe_server_error_yields_no_payload() {
    let server = StubServer::start(vec![route(
        "GET",
        METADATA,
        StubResponse::error(500, "Internal Server Error"),
    )]);
    let config = snapshot_for(&server.host());
    let mut session = ProbeSession::new(&config, ClientOptions::default()).expect("session");

    let (payload, result) = session.resolve_metadata(&object());

    assert!(payload.is_none());
    assert_eq!(result.status_code, Some(500));
}

#[test]
fn undecodable_success_body_keeps_status() {
    let server = StubServer::start(vec![route(
        "GET",
        &format!("{BROKER}/accesstoken"),
        StubResponse::ok("not json"),
    )]);
    let config = snapshot_for(&server.host());
    let mut session = ProbeSession::new(&config, ClientOptions::default()).expect("session");

    let (token, result) = session.delegated_access_token(&caller());

    assert!(token.is_none());
    assert_eq!(result.status_code, Some(200));
}

#[test]
fn access_token_probe_forwards_caller_token() {
    let path = format!("{BROKER}/accesstoken");
    let server = StubServer::start(vec![route("GET", &path, StubResponse::ok(r#"{"token":"delegated"}"#))]);
    let config = snapshot_for(&server.host());
    let mut session = ProbeSession::new(&config, ClientOptions::default()).expect("session");

    let (token, _) = session.delegated_access_token(&caller());

    assert_eq!(token.expect("token").expose(), "delegated");
    let seen = server.requests_to(&path);
    assert_eq!(seen[0].header("authorization"), Some("Bearer caller-token"));
}

#[test]
fn service_account_key_extracts_data_field() {
    let server = StubServer::start(vec![route(
        "GET",
        &format!("{BROKER}/serviceaccount/key"),
        StubResponse::ok(r#"{"data":{"client_email":"sa@example.com"}}"#),
    )]);
    let config = snapshot_for(&server.host());
    let mut session = ProbeSession::new(&config, ClientOptions::default()).expect("session");

    let (key, result) = session.service_account_key(&caller());

    assert_eq!(key.expect("key")["client_email"], "sa@example.com");
    assert_eq!(result.status_code, Some(200));
}

#[test]
fn signed_url_uses_delegated_token_and_access_id() {
    let path = format!("{METADATA}/access/gs");
    let server = StubServer::start(vec![route(
        "GET",
        &path,
        StubResponse::ok(r#"{"url":"https://storage.example.com/signed"}"#),
    )]);
    let config = snapshot_for(&server.host());
    let mut session = ProbeSession::new(&config, ClientOptions::default()).expect("session");
    let delegated = SecretString::new("delegated");

    let (signed, result) = session.signed_access_url(Some(&delegated), &object(), "gs");

    assert_eq!(signed.expect("signed").expose(), "https://storage.example.com/signed");
    assert_eq!(result.status_code, Some(200));
    assert_eq!(server.requests_to(&path)[0].header("authorization"), Some("Bearer delegated"));
}

#[test]
fn resolver_lookup_posts_uri_and_fields() {
    let server = StubServer::start(vec![route(
        "POST",
        "/martha_v3/",
        StubResponse::ok(r#"{"gsUri":"gs://bucket/key"}"#),
    )]);
    let config = snapshot_for(&server.host());
    let mut session = ProbeSession::new(&config, ClientOptions::default()).expect("session");

    let (payload, result) = session.resolver_lookup(&caller(), &object());

    assert_eq!(payload.expect("payload")["gsUri"], "gs://bucket/key");
    assert_eq!(result.status_code, Some(200));
    let seen = server.requests_to("/martha_v3/");
    let body: serde_json::Value = serde_json::from_slice(&seen[0].body).expect("json body");
    assert_eq!(body["url"], TEST_OBJECT_URI);
    assert_eq!(body["fields"], serde_json::json!(RESOLVER_FIELDS));
}

#[test]
fn identity_link_url_sends_options_with_scopes() {
    let path = format!("{BROKER}/authorization-url");
    let server = StubServer::start(vec![route("OPTIONS", &path, StubResponse::ok(""))]);
    let config = snapshot_for(&server.host());
    let mut session = ProbeSession::new(&config, ClientOptions::default()).expect("session");

    let (link, result) = session.identity_link_url();

    let link = link.expect("link url");
    assert!(link.contains("/authorization-url?scopes=openid"));
    assert_eq!(result.status_code, Some(200));
    let seen = server.requests_to(&path);
    assert_eq!(seen[0].method, "OPTIONS");
    assert!(seen[0].header("authorization").is_none());
    assert_eq!(seen[0].target.matches("scopes=").count(), 4);
}

#[test]
fn identity_link_status_unauthorized_has_no_payload() {
    let server = StubServer::start(vec![route("GET", BROKER, StubResponse::error(401, "Unauthorized"))]);
    let config = snapshot_for(&server.host());
    let mut session = ProbeSession::new(&config, ClientOptions::default()).expect("session");

    let (payload, result) = session.identity_link_status(&caller());

    assert!(payload.is_none());
    assert_eq!(result.status_code, Some(401));
    assert_eq!(result.status_text, "Unauthorized");
}

#[test]
fn user_info_without_token_sends_no_authorization() {
    let server = StubServer::start(vec![route("GET", "/user/user/", StubResponse::error(401, "Unauthorized"))]);
    let config = snapshot_for(&server.host());
    let mut session = ProbeSession::new(&config, ClientOptions::default()).expect("session");

    let (payload, result) = session.user_info(None);

    assert!(payload.is_none());
    assert_eq!(result.status_code, Some(401));
    let seen = server.requests_to("/user/user/");
    assert!(seen[0].header("authorization").is_none());
    assert_eq!(seen[0].header("accept"), Some("*/*"));
}

#[test]
fn unreachable_service_is_recorded_not_raised() {
    let config = snapshot_for(&closed_host());
    let mut session = ProbeSession::new(&config, ClientOptions::default()).expect("session");

    let (payload, result) = session.resolve_metadata(&object());

    assert!(payload.is_none());
    assert_eq!(result.status_code, None);
    assert!(result.status_text.starts_with("connect_failed"));
}
