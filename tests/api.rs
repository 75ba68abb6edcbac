//! HTTP-level tests: routing, auth middleware, redirects and error bodies.

use anyhow::{bail, Result};
use async_trait::async_trait;
use axum::http::{header, HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};
use std::sync::Arc;

use bude_finder::api::{build_router, AppState};
use bude_finder::config::Config;
use bude_finder::db::repositories::{AdminRepository, SqlxAdminRepository};
use bude_finder::db::{create_test_pool, migrations};
use bude_finder::models::Admin;
use bude_finder::services::{OAuthProfile, OAuthProvider};

const ADMIN_EMAIL: &str = "mod@example.com";
const TYPE_GONE: &str = "4f1c2d3e-0001-4000-8000-000000000001";
const TYPE_OWNER: &str = "4f1c2d3e-0004-4000-8000-000000000004";

/// Treats the authorization code as the signed-in e-mail; `bad` fails
struct StubProvider;

#[async_trait]
impl OAuthProvider for StubProvider {
    fn authorize_url(&self, state: &str, redirect_uri: &str) -> String {
        format!("https://idp.example/auth?redirect_uri={}&state={}", redirect_uri, state)
    }

    async fn exchange_code(&self, code: &str, _redirect_uri: &str) -> Result<String> {
        if code == "bad" {
            bail!("invalid_grant");
        }
        Ok(code.to_string())
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<OAuthProfile> {
        Ok(OAuthProfile { email: access_token.to_string(), name: String::new() })
    }
}

async fn setup() -> TestServer {
    let pool = create_test_pool().await.unwrap();
    migrations::run_migrations(&pool).await.unwrap();
    SqlxAdminRepository::new(pool.clone())
        .create(&Admin::new(ADMIN_EMAIL))
        .await
        .unwrap();

    let state = AppState::new(pool, Config::default(), Arc::new(StubProvider));
    TestServer::new(build_router(state, "http://localhost:3000")).unwrap()
}

/// Value of cookie `name` set by the response (empty when cleared)
fn set_cookie(response: &TestResponse, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

fn location(response: &TestResponse) -> String {
    response.headers()[header::LOCATION].to_str().unwrap().to_string()
}

fn cookie(pair: String) -> HeaderValue {
    HeaderValue::from_str(&pair).unwrap()
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
}

/// Run a login + callback pair and return the callback response
async fn oauth_flow(server: &TestServer, login: &str, callback: &str, code: &str) -> TestResponse {
    let login = server.get(login).await;
    login.assert_status(StatusCode::SEE_OTHER);
    let state = set_cookie(&login, "auth_state").unwrap();

    server
        .get(callback)
        .add_query_param("code", code)
        .add_query_param("state", &state)
        .add_header(header::COOKIE, cookie(format!("auth_state={}", state)))
        .await
}

async fn sign_in_user(server: &TestServer, email: &str) -> String {
    let response = oauth_flow(server, "/auth/login", "/auth/callback", email).await;
    response.assert_status(StatusCode::SEE_OTHER);
    set_cookie(&response, "session").unwrap()
}

async fn sign_in_admin(server: &TestServer) -> String {
    let response = oauth_flow(server, "/admin/login", "/admin/auth", ADMIN_EMAIL).await;
    assert_eq!(location(&response), "/admin");
    set_cookie(&response, "jid").unwrap()
}

fn bude_body(name: &str) -> Value {
    json!({
        "name": name,
        "description": "Kiosk mit Kaltgetränken",
        "lat": 50.94,
        "lng": 6.96,
        "contact": "kiosk@example.com"
    })
}

async fn create_own_bude(server: &TestServer, token: &str) -> String {
    let response = server
        .post("/api/v1/budes/own")
        .add_header(header::AUTHORIZATION, bearer(token))
        .json(&bude_body("Büdchen am Ring"))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let server = setup().await;
    let response = server.get("/api/v1/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "ok");
}

#[tokio::test]
async fn test_user_login_redirects_with_state() {
    let server = setup().await;
    let response = server.get("/auth/login").await;

    response.assert_status(StatusCode::SEE_OTHER);
    let state = set_cookie(&response, "auth_state").unwrap();
    let target = location(&response);
    assert!(target.starts_with("https://idp.example/auth"));
    assert!(target.contains("redirect_uri=http://localhost:8080/auth/callback"));
    assert!(target.ends_with(&format!("state={}", state)));
}

#[tokio::test]
async fn test_user_callback_creates_session() {
    let server = setup().await;
    let token = sign_in_user(&server, "anna@example.com").await;

    let me = server
        .get("/api/v1/auth/me")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    me.assert_status_ok();
    let user = me.json::<Value>();
    assert_eq!(user["email"], "anna@example.com");
    assert_eq!(user["name"], "anna");

    // The session cookie works as well as the bearer header
    server
        .get("/api/v1/auth/me")
        .add_header(header::COOKIE, cookie(format!("session={}", token)))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_user_callback_rejects_state_mismatch() {
    let server = setup().await;
    let response = server
        .get("/auth/callback")
        .add_query_param("code", "anna@example.com")
        .add_query_param("state", "forged")
        .add_header(header::COOKIE, cookie("auth_state=expected".to_string()))
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    assert!(set_cookie(&response, "session").is_none());
}

#[tokio::test]
async fn test_user_callback_provider_failure_goes_home() {
    let server = setup().await;
    let response = oauth_flow(&server, "/auth/login", "/auth/callback", "bad").await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    assert!(set_cookie(&response, "session").is_none());
}

#[tokio::test]
async fn test_logout_ends_session() {
    let server = setup().await;
    let token = sign_in_user(&server, "anna@example.com").await;

    let response = server
        .post("/api/v1/auth/logout")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status(StatusCode::NO_CONTENT);
    assert_eq!(set_cookie(&response, "session").as_deref(), Some(""));

    let me = server
        .get("/api/v1/auth/me")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    me.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let server = setup().await;

    let response = server.get("/api/v1/budes/own").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"]["code"], "UNAUTHORIZED");

    server
        .get("/api/v1/budes/own")
        .add_header(header::AUTHORIZATION, bearer("not-a-session"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_own_bude_lifecycle() {
    let server = setup().await;
    let token = sign_in_user(&server, "anna@example.com").await;
    let auth = bearer(&token);

    let none = server.get("/api/v1/budes/own").add_header(header::AUTHORIZATION, auth.clone()).await;
    none.assert_status_ok();
    assert_eq!(none.json::<Value>(), Value::Null);

    let id = create_own_bude(&server, &token).await;

    // One Bude per user
    server
        .post("/api/v1/budes/own")
        .add_header(header::AUTHORIZATION, auth.clone())
        .json(&bude_body("Zweite Bude"))
        .await
        .assert_status(StatusCode::CONFLICT);

    let public = server.get("/api/v1/budes").await.json::<Value>();
    assert_eq!(public.as_array().unwrap().len(), 1);
    assert_eq!(public[0]["id"], id.as_str());
    assert!(public[0].get("contact").is_none());

    let updated = server
        .put("/api/v1/budes/own")
        .add_header(header::AUTHORIZATION, auth.clone())
        .json(&bude_body("Büdchen am Dom"))
        .await;
    updated.assert_status_ok();
    assert_eq!(updated.json::<Value>()["name"], "Büdchen am Dom");

    server
        .delete("/api/v1/budes/own")
        .add_header(header::AUTHORIZATION, auth.clone())
        .await
        .assert_status(StatusCode::NO_CONTENT);
    let public = server.get("/api/v1/budes").await.json::<Value>();
    assert!(public.as_array().unwrap().is_empty());

    // Updating brings it back onto the map
    server
        .put("/api/v1/budes/own")
        .add_header(header::AUTHORIZATION, auth)
        .json(&bude_body("Büdchen am Dom"))
        .await
        .assert_status_ok();
    let public = server.get("/api/v1/budes").await.json::<Value>();
    assert_eq!(public.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_own_bude_validation() {
    let server = setup().await;
    let token = sign_in_user(&server, "anna@example.com").await;

    let mut body = bude_body("Büdchen");
    body["contact"] = json!("not a contact");
    let response = server
        .post("/api/v1/budes/own")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&body)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "VALIDATION_ERROR");

    server
        .put("/api/v1/budes/own")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&bude_body("Büdchen"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_evaluations() {
    let server = setup().await;
    let owner = sign_in_user(&server, "owner@example.com").await;
    let voter = sign_in_user(&server, "voter@example.com").await;
    let bude_id = create_own_bude(&server, &owner).await;
    let path = format!("/api/v1/evaluations/{}", bude_id);

    let anonymous = server.get(&path).await;
    anonymous.assert_status_ok();
    assert_eq!(anonymous.headers()[header::CACHE_CONTROL], "public, max-age=30");
    assert_eq!(anonymous.json::<Value>(), json!({"likes": 0, "dislikes": 0, "own": null}));

    let signed_in = server.get(&path).add_header(header::AUTHORIZATION, bearer(&voter)).await;
    assert_eq!(signed_in.headers()[header::CACHE_CONTROL], "private, max-age=30");
    assert_eq!(signed_in.json::<Value>()["own"], json!({"like": null}));

    let vote = json!({"id": bude_id, "like": true});
    server
        .post("/api/v1/evaluations")
        .add_header(header::AUTHORIZATION, bearer(&voter))
        .json(&vote)
        .await
        .assert_status(StatusCode::CREATED);
    server
        .post("/api/v1/evaluations")
        .add_header(header::AUTHORIZATION, bearer(&voter))
        .json(&vote)
        .await
        .assert_status(StatusCode::CONFLICT);

    let tally = server.get(&path).add_header(header::AUTHORIZATION, bearer(&voter)).await.json::<Value>();
    assert_eq!(tally, json!({"likes": 1, "dislikes": 0, "own": {"like": true}}));

    server
        .put("/api/v1/evaluations")
        .add_header(header::AUTHORIZATION, bearer(&voter))
        .json(&json!({"id": bude_id, "like": false}))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    let tally = server.get(&path).await.json::<Value>();
    assert_eq!(tally, json!({"likes": 0, "dislikes": 1, "own": null}));

    server
        .delete(&path)
        .add_header(header::AUTHORIZATION, bearer(&voter))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .delete(&path)
        .add_header(header::AUTHORIZATION, bearer(&voter))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_evaluation_for_unknown_bude() {
    let server = setup().await;
    let voter = sign_in_user(&server, "voter@example.com").await;
    let response = server
        .post("/api/v1/evaluations")
        .add_header(header::AUTHORIZATION, bearer(&voter))
        .json(&json!({"id": "7d0f4a52-6a4b-4f0e-9d1e-0a5c3b2e1f99", "like": true}))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_reports() {
    let server = setup().await;
    let owner = sign_in_user(&server, "owner@example.com").await;
    let reporter = sign_in_user(&server, "reporter@example.com").await;
    let bude_id = create_own_bude(&server, &owner).await;

    let types = server
        .get("/api/v1/reports/types")
        .add_query_param("bude_id", &bude_id)
        .add_header(header::AUTHORIZATION, bearer(&reporter))
        .await;
    types.assert_status_ok();
    assert_eq!(types.json::<Value>()["types"].as_array().unwrap().len(), 5);

    // The owner type needs description and contact
    server
        .post("/api/v1/reports")
        .add_header(header::AUTHORIZATION, bearer(&reporter))
        .json(&json!({"bude_id": bude_id, "type_id": TYPE_OWNER}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let created = server
        .post("/api/v1/reports")
        .add_header(header::AUTHORIZATION, bearer(&reporter))
        .json(&json!({"bude_id": bude_id, "type_id": TYPE_GONE, "description": "ignored"}))
        .await;
    created.assert_status(StatusCode::CREATED);
    let report = created.json::<Value>();
    assert_eq!(report["state"], "UNREAD");
    assert_eq!(report["description"], Value::Null);

    server
        .post("/api/v1/reports")
        .add_header(header::AUTHORIZATION, bearer(&reporter))
        .json(&json!({"bude_id": bude_id, "type_id": TYPE_GONE}))
        .await
        .assert_status(StatusCode::CONFLICT);

    let types = server
        .get("/api/v1/reports/types")
        .add_query_param("bude_id", &bude_id)
        .add_header(header::AUTHORIZATION, bearer(&reporter))
        .await;
    assert_eq!(types.json::<Value>(), json!({"types": null}));

    server
        .delete(&format!("/api/v1/reports/{}", bude_id))
        .add_header(header::AUTHORIZATION, bearer(&reporter))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .delete(&format!("/api/v1/reports/{}", bude_id))
        .add_header(header::AUTHORIZATION, bearer(&reporter))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reports_reject_malformed_ids() {
    let server = setup().await;
    let reporter = sign_in_user(&server, "reporter@example.com").await;
    let response = server
        .post("/api/v1/reports")
        .add_header(header::AUTHORIZATION, bearer(&reporter))
        .json(&json!({"bude_id": "not-a-uuid", "type_id": TYPE_GONE}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_admin_sign_in_and_out() {
    let server = setup().await;
    server.get("/api/v1/admin/me").await.assert_status(StatusCode::UNAUTHORIZED);

    let jid = sign_in_admin(&server).await;
    let me = server
        .get("/api/v1/admin/me")
        .add_header(header::COOKIE, cookie(format!("jid={}", jid)))
        .await;
    me.assert_status_ok();
    assert_eq!(me.json::<Value>()["email"], ADMIN_EMAIL);

    // Already signed in: straight to the dashboard
    let again = server
        .get("/admin/login")
        .add_header(header::COOKIE, cookie(format!("jid={}", jid)))
        .await;
    again.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&again), "/admin");

    let signout = server
        .post("/admin/signout")
        .add_header(header::COOKIE, cookie(format!("jid={}", jid)))
        .await;
    signout.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&signout), "/");
    assert_eq!(set_cookie(&signout, "jid").as_deref(), Some(""));

    server
        .get("/api/v1/admin/me")
        .add_header(header::COOKIE, cookie(format!("jid={}", jid)))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_sign_in_refuses_non_admin() {
    let server = setup().await;
    let response = oauth_flow(&server, "/admin/login", "/admin/auth", "anna@example.com").await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    assert!(set_cookie(&response, "jid").is_none());
}

#[tokio::test]
async fn test_user_session_is_not_admin_session() {
    let server = setup().await;
    let token = sign_in_user(&server, ADMIN_EMAIL).await;
    server
        .get("/api/v1/admin/me")
        .add_header(header::COOKIE, cookie(format!("jid={}", token)))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_bude_management() {
    let server = setup().await;
    let jid = cookie(format!("jid={}", sign_in_admin(&server).await));

    let invalid = server
        .post("/api/v1/admin/budes")
        .add_header(header::COOKIE, jid.clone())
        .json(&json!({"name": "", "description": "", "lat": "50.9", "lng": "6.9", "links": ["ok", ""]}))
        .await;
    invalid.assert_status(StatusCode::BAD_REQUEST);
    let details = &invalid.json::<Value>()["error"]["details"];
    assert_eq!(details["messages"].as_array().unwrap().len(), 3);
    assert_eq!(details["name"], true);
    assert_eq!(details["description"], true);
    assert_eq!(details["links"], json!([null, true]));

    server
        .post("/api/v1/admin/budes")
        .add_header(header::COOKIE, jid.clone())
        .json(&json!({"name": "Kiosk", "description": "Am Rhein", "lat": "nördlich", "lng": "6.9"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let created = server
        .post("/api/v1/admin/budes")
        .add_header(header::COOKIE, jid.clone())
        .json(&json!({
            "name": "Kiosk",
            "description": "Am Rhein",
            "lat": "50.93",
            "lng": 6.97,
            "links": ["https://kiosk.example", "https://instagram.example/kiosk"]
        }))
        .await;
    created.assert_status_ok();
    let bude = created.json::<Value>();
    let id = bude["id"].as_str().unwrap().to_string();
    assert_eq!(bude["links"][1]["value"], "https://instagram.example/kiosk");

    let updated = server
        .post("/api/v1/admin/budes")
        .add_header(header::COOKIE, jid.clone())
        .json(&json!({"bude_id": id, "name": "Kiosk Rhein", "description": "Am Ufer", "lat": 50.93, "lng": 6.97, "links": ["https://kiosk.example"]}))
        .await;
    updated.assert_status_ok();
    assert_eq!(updated.json::<Value>()["links"].as_array().unwrap().len(), 1);

    let all = server.get("/api/v1/admin/budes").add_header(header::COOKIE, jid.clone()).await;
    assert_eq!(all.json::<Value>()[0]["name"], "Kiosk Rhein");

    let public = server.get("/api/v1/budes").await.json::<Value>();
    assert_eq!(public[0]["name"], "Kiosk Rhein");

    server
        .delete(&format!("/api/v1/admin/budes/{}", id))
        .add_header(header::COOKIE, jid.clone())
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .delete(&format!("/api/v1/admin/budes/{}", id))
        .add_header(header::COOKIE, jid)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    let public = server.get("/api/v1/budes").await.json::<Value>();
    assert!(public.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_moderation() {
    let server = setup().await;
    let owner = sign_in_user(&server, "owner@example.com").await;
    let reporter = sign_in_user(&server, "reporter@example.com").await;
    let bude_id = create_own_bude(&server, &owner).await;
    let jid = cookie(format!("jid={}", sign_in_admin(&server).await));

    let reporter_id = server
        .get("/api/v1/auth/me")
        .add_header(header::AUTHORIZATION, bearer(&reporter))
        .await
        .json::<Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    server
        .post("/api/v1/reports")
        .add_header(header::AUTHORIZATION, bearer(&reporter))
        .json(&json!({
            "bude_id": bude_id,
            "type_id": TYPE_OWNER,
            "description": "Das ist meine Bude",
            "contact": "+49 170 1234567"
        }))
        .await
        .assert_status(StatusCode::CREATED);

    let unread = server
        .get("/api/v1/admin/reports")
        .add_query_param("state", "unread")
        .add_header(header::COOKIE, jid.clone())
        .await;
    unread.assert_status_ok();
    let reports = unread.json::<Value>();
    assert_eq!(reports.as_array().unwrap().len(), 1);
    assert_eq!(reports[0]["user_name"], "reporter");
    assert_eq!(reports[0]["type"]["name"], "Ich bin der Besitzer");
    assert_eq!(reports[0]["bude"]["id"], bude_id.as_str());

    server
        .get("/api/v1/admin/reports")
        .add_query_param("state", "deleted")
        .add_header(header::COOKIE, jid.clone())
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .put("/api/v1/admin/reports/state")
        .add_header(header::COOKIE, jid.clone())
        .json(&json!({"user_id": reporter_id, "bude_id": bude_id, "state": "marked"}))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let marked = server
        .get("/api/v1/admin/reports")
        .add_query_param("state", "MARKED")
        .add_query_param("bude_id", &bude_id)
        .add_header(header::COOKIE, jid.clone())
        .await
        .json::<Value>();
    assert_eq!(marked[0]["state"], "MARKED");

    let unread = server
        .get("/api/v1/admin/reports")
        .add_query_param("state", "UNREAD")
        .add_header(header::COOKIE, jid)
        .await
        .json::<Value>();
    assert!(unread.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_requests_use_error_body() {
    let server = setup().await;
    let token = sign_in_user(&server, "anna@example.com").await;
    let jid = cookie(format!("jid={}", sign_in_admin(&server).await));

    let missing_state = server
        .get("/api/v1/admin/reports")
        .add_header(header::COOKIE, jid.clone())
        .await;
    missing_state.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(missing_state.json::<Value>()["error"]["code"], "VALIDATION_ERROR");

    let missing_bude = server
        .get("/api/v1/reports/types")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    missing_bude.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(missing_bude.json::<Value>()["error"]["code"], "VALIDATION_ERROR");

    let wrong_types = server
        .post("/api/v1/budes/own")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({"name": 5, "lat": "north"}))
        .await;
    wrong_types.assert_status(StatusCode::BAD_REQUEST);
    let body = wrong_types.json::<Value>();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(!body["error"]["message"].as_str().unwrap().is_empty());

    let not_json = server
        .post("/api/v1/evaluations")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .text("like")
        .await;
    not_json.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(not_json.json::<Value>()["error"]["code"], "VALIDATION_ERROR");

    let bad_state_body = server
        .put("/api/v1/admin/reports/state")
        .add_header(header::COOKIE, jid)
        .json(&json!({"state": "READ"}))
        .await;
    bad_state_body.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(bad_state_body.json::<Value>()["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_admin_report_types_and_internals() {
    let server = setup().await;
    let owner = sign_in_user(&server, "owner@example.com").await;
    let bude_id = create_own_bude(&server, &owner).await;
    let jid = cookie(format!("jid={}", sign_in_admin(&server).await));

    let created = server
        .post("/api/v1/admin/report-types")
        .add_header(header::COOKIE, jid.clone())
        .json(&json!({"name": "Geschlossen", "requires_description": true}))
        .await;
    created.assert_status(StatusCode::CREATED);
    assert_eq!(created.json::<Value>()["requires_contact"], false);

    let types = server
        .get("/api/v1/admin/report-types")
        .add_header(header::COOKIE, jid.clone())
        .await
        .json::<Value>();
    assert_eq!(types.as_array().unwrap().len(), 6);

    let note = server
        .put(&format!("/api/v1/admin/internals/{}", bude_id))
        .add_header(header::COOKIE, jid.clone())
        .json(&json!({"info": "Schlüssel beim Nachbarn"}))
        .await;
    note.assert_status_ok();
    assert_eq!(note.json::<Value>()["info"], "Schlüssel beim Nachbarn");

    let internals = server
        .get("/api/v1/admin/internals")
        .add_header(header::COOKIE, jid.clone())
        .await
        .json::<Value>();
    assert_eq!(internals[0]["bude_id"], bude_id.as_str());

    let cleared = server
        .put(&format!("/api/v1/admin/internals/{}", bude_id))
        .add_header(header::COOKIE, jid.clone())
        .json(&json!({"info": ""}))
        .await;
    assert_eq!(cleared.json::<Value>(), Value::Null);

    server
        .put("/api/v1/admin/internals/7d0f4a52-6a4b-4f0e-9d1e-0a5c3b2e1f99")
        .add_header(header::COOKIE, jid)
        .json(&json!({"info": "x"}))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
