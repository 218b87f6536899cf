use std::env::VarError;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use chrono::Utc;
use folio_chat::{
    ChatProvider, ChatReply, ChatTurn, HttpProviderFactory, ProviderFactory, ProviderHandle,
    ProviderKind,
};
use folio_core::{CachePolicyWindow, RepositorySnapshot};
use folio_db::{EntityStore, MemoryStore};
use folio_github::{GithubClient, RetryPolicy};
use folio_sync::GithubUpstream;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::middleware::RouteClass;

struct EchoProvider;

#[async_trait]
impl ChatProvider for EchoProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn complete(&self, turns: &[ChatTurn]) -> Result<ChatReply, ProviderError> {
        Ok(ChatReply {
            text: format!("{} turns", turns.len()),
            provider: ProviderKind::Ollama,
            model: "echo".to_string(),
            tokens_used: Some(3),
        })
    }
}

struct EchoFactory;

#[async_trait]
impl ProviderFactory for EchoFactory {
    async fn build(&self, _kind: ProviderKind) -> Result<ProviderHandle, ProviderError> {
        Ok(ProviderHandle::new(Arc::new(EchoProvider), "echo".to_string()))
    }
}

fn no_env(_: &str) -> Result<String, VarError> {
    Err(VarError::NotPresent)
}

fn engine_for(server: &MockServer, store: Arc<MemoryStore>) -> Arc<SyncEngine> {
    let retry = RetryPolicy {
        max_retries: 0,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        budget: Duration::ZERO,
        jitter: false,
    };
    let client = GithubClient::with_base_url(&server.uri(), None, 5, "folio-test", retry)
        .expect("client");
    let upstream = GithubUpstream::new(client, false, CachePolicyWindow::from_hours(24));
    Arc::new(SyncEngine::new(store, Arc::new(upstream)))
}

fn generous_limits() -> RouteLimits {
    RouteLimits {
        upstream: ClientLimiter::new(RouteClass::Upstream, 100, Duration::from_secs(60)),
        store: ClientLimiter::new(RouteClass::Store, 100, Duration::from_secs(60)),
    }
}

fn app_with_limits(
    engine: Arc<SyncEngine>,
    chat: ProviderRegistry,
    auth: OperatorAuth,
    limits: RouteLimits,
) -> Router {
    build_app(
        AppState {
            sync: engine,
            chat: Arc::new(chat),
        },
        auth,
        limits,
    )
}

fn app(engine: Arc<SyncEngine>, chat: ProviderRegistry, auth: OperatorAuth) -> Router {
    app_with_limits(engine, chat, auth, generous_limits())
}

fn open_auth() -> OperatorAuth {
    OperatorAuth::new(Vec::new(), true).expect("auth")
}

fn echo_chat() -> ProviderRegistry {
    ProviderRegistry::new(Arc::new(EchoFactory), no_env)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn snapshot(id: i64, name: &str, stars: i64) -> RepositorySnapshot {
    RepositorySnapshot {
        external_id: id,
        name: name.to_string(),
        full_name: format!("octocat/{name}"),
        description: None,
        html_url: None,
        language: None,
        languages: std::collections::BTreeMap::new(),
        topics: vec![],
        stars,
        forks: 0,
        pushed_at: None,
    }
}

#[test]
fn api_error_codes_map_to_statuses() {
    for (code, status) in [
        ("validation_error", StatusCode::BAD_REQUEST),
        ("not_found", StatusCode::NOT_FOUND),
        ("upstream_rejected", StatusCode::BAD_GATEWAY),
        ("sync_failed", StatusCode::SERVICE_UNAVAILABLE),
        ("provider_unavailable", StatusCode::SERVICE_UNAVAILABLE),
        ("internal_error", StatusCode::INTERNAL_SERVER_ERROR),
    ] {
        let response = ApiError::new("req-1", code, "x").into_response();
        assert_eq!(response.status(), status, "{code}");
    }
}

#[tokio::test]
async fn health_reports_ok_with_memory_store() {
    let server = MockServer::start().await;
    let app = app(engine_for(&server, Arc::new(MemoryStore::new())), echo_chat(), open_auth());

    let (status, json) = send(app, get("/api/v1/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "ok");
    assert!(json["meta"]["request_id"].is_string());
}

#[tokio::test]
async fn profile_route_fetches_then_serves_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "login": "octocat",
            "name": "The Octocat",
            "public_repos": 8,
            "followers": 100,
            "following": 9
        })))
        .expect(1)
        .mount(&server)
        .await;
    let engine = engine_for(&server, Arc::new(MemoryStore::new()));

    let (status, first) = send(
        app(Arc::clone(&engine), echo_chat(), open_auth()),
        get("/api/v1/github/OctoCat"),
    )
    .await;
    let (_, second) = send(
        app(engine, echo_chat(), open_auth()),
        get("/api/v1/github/octocat"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["followers"], 100);
    assert_eq!(first["meta"]["sync"]["source"], "fetched");
    assert_eq!(second["meta"]["sync"]["source"], "cached");
}

#[tokio::test]
async fn invalid_username_is_a_validation_error_without_upstream_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let app = app(engine_for(&server, Arc::new(MemoryStore::new())), echo_chat(), open_auth());

    let (status, json) = send(app, get("/api/v1/github/bad%3Fname")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

#[tokio::test]
async fn unknown_upstream_user_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let app = app(engine_for(&server, Arc::new(MemoryStore::new())), echo_chat(), open_auth());

    let (status, json) = send(app, get("/api/v1/github/ghost")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
}

#[tokio::test]
async fn upstream_outage_without_cache_is_sync_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let app = app(engine_for(&server, Arc::new(MemoryStore::new())), echo_chat(), open_auth());

    let (status, json) = send(app, get("/api/v1/github/octocat")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "sync_failed");
}

#[tokio::test]
async fn forced_repository_sync_with_outage_serves_stale_copy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/octocat/repos"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;
    let store = Arc::new(MemoryStore::new());
    store
        .upsert_repositories("octocat", vec![snapshot(1, "hello", 5)], Utc::now())
        .await
        .unwrap();
    let app = app(engine_for(&server, store), echo_chat(), open_auth());

    let (status, json) = send(
        app,
        json_request(
            "POST",
            "/api/v1/repositories/sync/octocat?force_refresh=true",
            &json!({}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["count"], 1);
    assert_eq!(json["meta"]["sync"]["source"], "stale");
    assert!(json["meta"]["sync"]["warning"].is_string());
}

#[tokio::test]
async fn repository_listing_pages_stored_records() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    store
        .upsert_repositories(
            "octocat",
            vec![snapshot(1, "a", 1), snapshot(2, "b", 30), snapshot(3, "c", 20)],
            Utc::now(),
        )
        .await
        .unwrap();
    let app = app(engine_for(&server, store), echo_chat(), open_auth());

    let (status, json) = send(app, get("/api/v1/repositories/OctoCat?page=1&size=2")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["total"], 3);
    assert_eq!(json["data"]["pages"], 2);
    assert_eq!(json["data"]["items"][0]["name"], "b");
    assert_eq!(json["data"]["items"][1]["name"], "c");
}

#[tokio::test]
async fn feature_route_requires_bearer_when_enabled() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    store
        .upsert_repositories("octocat", vec![snapshot(7, "hello", 5)], Utc::now())
        .await
        .unwrap();
    let engine = engine_for(&server, store);
    let auth = OperatorAuth::new(vec!["secret".to_string()], false).expect("auth");
    let body = json!({"featured": true, "display_order": 1});

    let (denied, _) = send(
        app(Arc::clone(&engine), echo_chat(), auth.clone()),
        json_request("PATCH", "/api/v1/repositories/octocat/7/feature", &body),
    )
    .await;

    let mut request = json_request("PATCH", "/api/v1/repositories/octocat/7/feature", &body);
    request
        .headers_mut()
        .insert("authorization", "Bearer secret".parse().unwrap());
    let (allowed, json) = send(app(Arc::clone(&engine), echo_chat(), auth), request).await;

    assert_eq!(denied, StatusCode::UNAUTHORIZED);
    assert_eq!(allowed, StatusCode::OK);
    assert_eq!(json["data"]["featured"], true);

    let (_, featured) = send(
        app(engine, echo_chat(), open_auth()),
        get("/api/v1/repositories/featured"),
    )
    .await;
    assert_eq!(featured["data"][0]["external_id"], 7);
}

#[tokio::test]
async fn featuring_unknown_repository_is_not_found() {
    let server = MockServer::start().await;
    let app = app(engine_for(&server, Arc::new(MemoryStore::new())), echo_chat(), open_auth());

    let (status, json) = send(
        app,
        json_request(
            "PATCH",
            "/api/v1/repositories/octocat/99/feature",
            &json!({"featured": true}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
}

#[tokio::test]
async fn chat_appends_message_to_history() {
    let server = MockServer::start().await;
    let app = app(engine_for(&server, Arc::new(MemoryStore::new())), echo_chat(), open_auth());

    let (status, json) = send(
        app,
        json_request(
            "POST",
            "/api/v1/chat",
            &json!({
                "message": "What do you build?",
                "history": [
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "hello"}
                ]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["text"], "3 turns");
    assert_eq!(json["data"]["provider"], "ollama");
}

#[tokio::test]
async fn spent_upstream_budget_leaves_store_routes_open() {
    let server = MockServer::start().await;
    let limits = RouteLimits {
        upstream: ClientLimiter::new(RouteClass::Upstream, 1, Duration::from_secs(60)),
        store: ClientLimiter::new(RouteClass::Store, 10, Duration::from_secs(60)),
    };
    let app = app_with_limits(
        engine_for(&server, Arc::new(MemoryStore::new())),
        echo_chat(),
        open_auth(),
        limits,
    );
    let chat = json!({"message": "hello"});

    let (first, _) = send(app.clone(), json_request("POST", "/api/v1/chat", &chat)).await;
    let limited = app
        .clone()
        .oneshot(json_request("POST", "/api/v1/chat", &chat))
        .await
        .expect("response");
    let (featured, _) = send(app, get("/api/v1/repositories/featured")).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers().contains_key("retry-after"));
    assert!(limited.headers().contains_key("x-request-id"));
    assert_eq!(featured, StatusCode::OK);
}

#[tokio::test]
async fn chat_rejects_empty_message() {
    let server = MockServer::start().await;
    let app = app(engine_for(&server, Arc::new(MemoryStore::new())), echo_chat(), open_auth());

    let (status, json) = send(
        app,
        json_request("POST", "/api/v1/chat", &json!({"message": "   "})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

#[tokio::test]
async fn misconfigured_provider_is_unavailable() {
    let server = MockServer::start().await;
    let chat = ProviderRegistry::new(
        Arc::new(HttpProviderFactory::with_lookup(no_env)),
        no_env,
    );
    let app = app(engine_for(&server, Arc::new(MemoryStore::new())), chat, open_auth());

    let (status, json) = send(
        app,
        json_request(
            "POST",
            "/api/v1/chat",
            &json!({"message": "hi", "provider": "openai"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "provider_unavailable");
    assert!(json["error"]["message"].as_str().unwrap().contains("openai"));
}
