use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use chrono::{Duration, Utc};
use tower::ServiceExt;

use super::*;
use crate::api::test_api::{Call, TestApi};
use crate::auth::{SessionState, TokenSet};
use crate::data::{Contact, Organization};
use crate::settings::AuthSettings;

fn organizations() -> Vec<Organization> {
    let mut acme = Organization::new("Acme".to_string(), 1, "IT".to_string());
    acme.contacts.push(Contact {
        contact_id: "k1".to_string(),
        org_number: 1,
        name: "Kari".to_string(),
        phone: 98765432,
        email: None,
        position_name: "CEO".to_string(),
        contacted_at: None,
    });
    let fisk = Organization::new("Fjord Fisk".to_string(), 2, "Sjømat".to_string());

    vec![acme, fisk]
}

fn provider() -> IdentityProvider {
    IdentityProvider::new(&AuthSettings {
        domain: "tenant.eu.auth0.com".to_string(),
        client_id: "frontend".to_string(),
        client_secret: None,
        audience: "http://localhost:8080".to_string(),
        scope: "openid".to_string(),
    })
    .unwrap()
}

fn app_state(api: Arc<TestApi>, session: SessionState) -> Arc<AppState> {
    Arc::new(AppState {
        mutator: Mutator::new(api),
        session: Arc::new(AuthSession::with_state(provider(), session)),
        redirect_uri: "http://localhost:5173/callback".to_string(),
        public_url: "http://localhost:5173".to_string(),
    })
}

fn signed_in() -> SessionState {
    SessionState::Authenticated(TokenSet {
        access_token: "token".to_string(),
        refresh_token: None,
        expires_at: Utc::now() + Duration::hours(1),
    })
}

async fn send(state: &Arc<AppState>, request: Request<Body>) -> Response {
    router(state.clone()).oneshot(request).await.unwrap()
}

async fn body(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn htmx(method: &str, uri: &str, form: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("hx-request", "true")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_gated_routes_redirect_to_login() {
    let state = app_state(
        Arc::new(TestApi::new(organizations(), Vec::new())),
        SessionState::Unauthenticated,
    );

    let response = send(&state, get("/")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], LOGIN_PATH);

    let response = send(&state, htmx("GET", "/organizations?q=acme", "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["hx-redirect"], LOGIN_PATH);
}

#[tokio::test]
async fn test_login_redirects_to_identity_provider() {
    let state = app_state(
        Arc::new(TestApi::new(Vec::new(), Vec::new())),
        SessionState::Unauthenticated,
    );

    let response = send(&state, get("/login")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://tenant.eu.auth0.com/authorize?"));
    assert!(location.contains("redirect_uri=http%3A%2F%2Flocalhost%3A5173%2Fcallback"));
    assert_eq!(state.session.status().await, SessionStatus::Authenticating);
}

#[tokio::test]
async fn test_callback_failures_show_error_page() {
    let state = app_state(
        Arc::new(TestApi::new(Vec::new(), Vec::new())),
        SessionState::Authenticating {
            csrf: "expected".to_string(),
        },
    );

    let response = send(&state, get("/callback?code=abc&state=forged")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let page = body(response).await;
    assert!(page.contains(CONFIG.labels.login_failed));
    assert!(page.contains(CONFIG.labels.try_again));
    assert_eq!(state.session.status().await, SessionStatus::Error);

    let response = send(
        &state,
        get("/callback?error=access_denied&error_description=User%20cancelled"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body(response).await.contains("User cancelled"));
}

#[tokio::test]
async fn test_index_loads_once() {
    let api = Arc::new(TestApi::new(organizations(), vec!["IT".to_string(), "Bygg".to_string()]));
    let state = app_state(api.clone(), signed_in());

    let response = send(&state, get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body(response).await;
    assert!(page.contains("Acme"));
    assert!(page.contains("Fjord Fisk"));
    assert!(page.contains("value=\"Bygg\""));
    assert!(page.contains("987 65 432"));

    send(&state, get("/")).await;
    assert_eq!(api.calls(), vec![Call::FetchAll, Call::FetchOrgTypes]);
}

#[tokio::test]
async fn test_failed_load_shows_notice_and_retries() {
    let api = Arc::new(TestApi::new(organizations(), Vec::new()));
    let state = app_state(api.clone(), signed_in());

    api.fail(true);
    let page = body(send(&state, get("/")).await).await;
    assert!(page.contains(CONFIG.labels.load_failed));
    assert!(page.contains(CONFIG.labels.no_results));

    api.fail(false);
    let page = body(send(&state, get("/")).await).await;
    assert!(!page.contains(CONFIG.labels.load_failed));
    assert!(page.contains("Acme"));
}

#[tokio::test]
async fn test_results_fall_back_to_contacts() {
    let state = app_state(
        Arc::new(TestApi::new(organizations(), Vec::new())),
        signed_in(),
    );
    send(&state, get("/")).await;

    let page = body(send(&state, get("/organizations?q=ka")).await).await;
    assert!(page.contains("contact-k1"));
    assert!(!page.contains("class=\"organizations\""));

    let page = body(send(&state, get("/organizations?q=&types=Sj%C3%B8mat")).await).await;
    assert!(page.contains("Fjord Fisk"));
    assert!(!page.contains("Acme"));

    let page = body(send(&state, get("/organizations?q=zzz")).await).await;
    assert!(page.contains(CONFIG.labels.no_results));
}

#[tokio::test]
async fn test_add_contact_triggers_results_reload() {
    let api = Arc::new(TestApi::new(organizations(), Vec::new()));
    let state = app_state(api.clone(), signed_in());
    send(&state, get("/")).await;

    let response = send(
        &state,
        htmx(
            "POST",
            "/contact",
            "name=Ola&phone=12345678&email=&position_name=CTO&org_number=2",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["hx-trigger"], RESULTS_CHANGED);
    assert!(body(response).await.contains(CONFIG.labels.contact_added));

    let store = state.mutator.store().await;
    let added = store.contact("c1").map(|c| (c.name.clone(), c.org_number));
    assert_eq!(added, Some(("Ola".to_string(), 2)));
    assert_eq!(store.organization(2).map(|o| o.contacts.len()), Some(1));
}

#[tokio::test]
async fn test_add_contact_without_organization() {
    let api = Arc::new(TestApi::new(organizations(), Vec::new()));
    let state = app_state(api.clone(), signed_in());
    send(&state, get("/")).await;

    let response = send(
        &state,
        htmx("POST", "/contact", "name=Ola&phone=12345678&position_name=CTO"),
    )
    .await;
    assert!(response.headers().get("hx-trigger").is_none());
    let form = body(response).await;
    assert!(form.contains("no organization selected"));
    assert!(form.contains("value=\"Ola\""));
    assert!(!api.calls().iter().any(|c| matches!(c, Call::CreateContact(_))));
}

#[tokio::test]
async fn test_add_organization() {
    let api = Arc::new(TestApi::new(organizations(), Vec::new()));
    let state = app_state(api.clone(), signed_in());
    send(&state, get("/")).await;

    let response = send(
        &state,
        htmx(
            "POST",
            "/organization",
            "organization_name=Bygg%20AS&org_number=3&org_type=Bygg",
        ),
    )
    .await;
    assert_eq!(response.headers()["hx-trigger"], RESULTS_CHANGED);
    assert!(state.mutator.store().await.organization(3).is_some());
}

#[tokio::test]
async fn test_field_edit() {
    let api = Arc::new(TestApi::new(organizations(), Vec::new()));
    let state = app_state(api.clone(), signed_in());
    send(&state, get("/")).await;

    let form = body(send(&state, get("/contact/k1/phone/edit")).await).await;
    assert!(form.contains("type=\"tel\""));
    assert!(form.contains("value=\"98765432\""));

    let cell = body(send(&state, htmx("PUT", "/contact/k1/phone", "value=98765431")).await).await;
    assert!(cell.contains("987 65 431"));

    let cell = body(send(&state, htmx("PUT", "/contact/k1/name", "value=")).await).await;
    assert!(cell.contains("class=\"error\""));
    assert_eq!(
        state.mutator.store().await.contact("k1").map(|c| c.name.clone()),
        Some("Kari".to_string())
    );

    let response = send(&state, get("/contact/k1/unknown/edit")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_whole_record_edit() {
    let api = Arc::new(TestApi::new(organizations(), Vec::new()));
    let state = app_state(api.clone(), signed_in());
    send(&state, get("/")).await;

    let form = body(send(&state, get("/contact/k1/edit")).await).await;
    assert!(form.contains("name=\"position_name\" value=\"CEO\""));

    let row = body(
        send(
            &state,
            htmx(
                "PUT",
                "/contact/k1",
                "name=Kari%20Nordmann&phone=98765432&email=kari%40acme.no&position_name=CEO",
            ),
        )
        .await,
    )
    .await;
    assert!(row.contains("Kari Nordmann"));
    assert!(row.contains("kari@acme.no"));
}

#[tokio::test]
async fn test_failed_delete_keeps_row() {
    let api = Arc::new(TestApi::new(organizations(), Vec::new()));
    let state = app_state(api.clone(), signed_in());
    send(&state, get("/")).await;

    api.fail(true);
    let response = send(&state, htmx("DELETE", "/contact/k1", "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let row = body(response).await;
    assert!(row.contains("contact-k1"));
    assert!(row.contains("class=\"error\""));
    assert!(state.mutator.store().await.contact("k1").is_some());

    api.fail(false);
    let row = body(send(&state, htmx("DELETE", "/contact/k1", "")).await).await;
    assert!(row.is_empty());
    assert!(state.mutator.store().await.contact("k1").is_none());
}

#[tokio::test]
async fn test_rejected_token_redirects_to_login() {
    let api = Arc::new(TestApi::new(organizations(), Vec::new()));
    let state = app_state(api.clone(), signed_in());
    send(&state, get("/")).await;

    api.fail_with(401);
    let response = send(&state, htmx("DELETE", "/contact/k1", "")).await;
    assert_eq!(response.headers()["hx-redirect"], LOGIN_PATH);
}

#[tokio::test]
async fn test_picker_filters_by_name() {
    let state = app_state(
        Arc::new(TestApi::new(organizations(), Vec::new())),
        signed_in(),
    );
    send(&state, get("/")).await;

    let options = body(send(&state, get("/contact/organizations?q=fjo")).await).await;
    assert!(options.contains("Fjord Fisk"));
    assert!(!options.contains("Acme"));
}

#[tokio::test]
async fn test_failed_session_offers_retry() {
    let state = app_state(
        Arc::new(TestApi::new(organizations(), Vec::new())),
        SessionState::Error("login was refused: access_denied".to_string()),
    );

    let response = send(&state, get("/")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let page = body(response).await;
    assert!(page.contains("access_denied"));
    assert!(page.contains(CONFIG.labels.try_again));

    let response = send(&state, htmx("GET", "/organizations", "")).await;
    assert_eq!(response.headers()["hx-redirect"], LOGIN_PATH);
}
