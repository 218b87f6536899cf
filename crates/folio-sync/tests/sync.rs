//! End-to-end synchronization against a wiremock upstream.

use std::sync::Arc;
use std::time::Duration;

use folio_core::CachePolicyWindow;
use folio_db::{EntityStore, MemoryStore};
use folio_github::{GithubClient, RetryPolicy};
use folio_sync::{GithubUpstream, SyncEngine, SyncError, SyncSource};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine_for(server: &MockServer, store: Arc<MemoryStore>) -> SyncEngine {
    let retry = RetryPolicy {
        max_retries: 1,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        budget: Duration::from_secs(1),
        jitter: false,
    };
    let client = GithubClient::with_base_url(&server.uri(), None, 5, "folio-test", retry)
        .expect("client construction should not fail");
    let upstream = GithubUpstream::new(client, false, CachePolicyWindow::from_hours(24));
    SyncEngine::new(store, Arc::new(upstream))
}

#[tokio::test]
async fn profile_is_fetched_once_then_served_from_store() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "login": "octocat",
            "name": "The Octocat",
            "public_repos": 8,
            "followers": 100,
            "following": 9
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let engine = engine_for(&server, Arc::clone(&store));

    let first = engine.sync_profile("OctoCat", false).await.unwrap();
    let second = engine.sync_profile("octocat", false).await.unwrap();

    assert_eq!(first.source, SyncSource::Fetched);
    assert_eq!(second.source, SyncSource::Cached);
    assert_eq!(second.value.display_name.as_deref(), Some("The Octocat"));
    assert!(store.get_profile("octocat").await.unwrap().is_some());
}

#[tokio::test]
async fn unknown_user_without_cache_fails_with_rejection_cause() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/ghost"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server, Arc::new(MemoryStore::new()));
    let err = engine.sync_profile("ghost", false).await.unwrap_err();

    assert!(
        matches!(
            err,
            SyncError::SyncFailed {
                cause: folio_sync::FetchError::Rejected { status: 404 },
                ..
            }
        ),
        "got {err:?}"
    );
}

#[tokio::test]
async fn repositories_are_synced_and_featured_survives() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/octocat/repos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
            "id": 1296269,
            "name": "Hello-World",
            "full_name": "octocat/Hello-World",
            "description": "My first repository",
            "html_url": "https://github.com/octocat/Hello-World",
            "language": "C",
            "stargazers_count": 80,
            "forks_count": 9
        }])))
        .expect(2)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let engine = engine_for(&server, Arc::clone(&store));

    engine.sync_repositories("octocat", false).await.unwrap();
    store
        .set_featured("octocat", 1_296_269, true, Some(1))
        .await
        .unwrap();
    let refreshed = engine.sync_repositories("octocat", true).await.unwrap();

    assert_eq!(refreshed.source, SyncSource::Fetched);
    assert!(refreshed.value[0].featured);
    assert_eq!(refreshed.value[0].snapshot.stars, 80);
}
