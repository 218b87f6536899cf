//! Offline tests for folio-db pool configuration and the store seam.
//! These tests do not require a live database connection.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use folio_core::{AppConfig, Environment, RepositorySnapshot};
use folio_db::{EntityStore, MemoryStore, PoolConfig};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: Some("postgres://example".to_string()),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        owner: None,
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        api_keys: Vec::new(),
        upstream_route_limit: 30,
        store_route_limit: 120,
        rate_limit_window_secs: 60,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

fn snapshot(id: i64, stars: i64) -> RepositorySnapshot {
    RepositorySnapshot {
        external_id: id,
        name: format!("repo-{id}"),
        full_name: format!("octocat/repo-{id}"),
        description: Some("demo".to_string()),
        html_url: None,
        language: Some("Rust".to_string()),
        languages: BTreeMap::from([("Rust".to_string(), 2_048)]),
        topics: vec!["cli".to_string()],
        stars,
        forks: 0,
        pushed_at: None,
    }
}

#[tokio::test]
async fn store_is_usable_as_shared_trait_object() {
    let store: Arc<dyn EntityStore> = Arc::new(MemoryStore::new());
    let t0 = Utc::now();

    store
        .upsert_repositories("octocat", vec![snapshot(1, 5)], t0)
        .await
        .unwrap();
    store.set_featured("octocat", 1, true, Some(2)).await.unwrap();

    // A late-arriving older snapshot must not replace the stored one.
    let after = store
        .upsert_repositories("octocat", vec![snapshot(1, 1)], t0 - TimeDelta::minutes(10))
        .await
        .unwrap();

    assert_eq!(after[0].snapshot.stars, 5);
    assert_eq!(after[0].last_fetched_at, t0);
    assert!(after[0].featured);
    store.health_check().await.unwrap();
}

#[tokio::test]
async fn unknown_owner_lists_empty_page() {
    let store = MemoryStore::new();
    let page = store.list_by_owner("nobody", 1, 20).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);
    assert_eq!(page.pages, 0);
}
