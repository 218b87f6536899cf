use std::collections::BTreeMap;

use chrono::TimeDelta;

use super::*;

fn profile(key: &str, followers: i64, at: DateTime<Utc>) -> ExternalProfile {
    ExternalProfile {
        key: key.to_string(),
        display_name: None,
        bio: None,
        followers,
        following: 0,
        public_repos: 0,
        avatar_url: None,
        profile_url: None,
        company: None,
        location: None,
        blog: None,
        twitter_username: None,
        hireable: None,
        last_fetched_at: at,
    }
}

fn snapshot(id: i64, name: &str, stars: i64) -> RepositorySnapshot {
    RepositorySnapshot {
        external_id: id,
        name: name.to_string(),
        full_name: format!("octocat/{name}"),
        description: None,
        html_url: None,
        language: None,
        languages: BTreeMap::new(),
        topics: vec![],
        stars,
        forks: 0,
        pushed_at: None,
    }
}

#[tokio::test]
async fn profile_round_trips_by_key() {
    let store = MemoryStore::new();
    let now = Utc::now();
    store.upsert_profile(profile("octocat", 5, now)).await.unwrap();

    let stored = store.get_profile("octocat").await.unwrap().unwrap();
    assert_eq!(stored.followers, 5);
    assert!(store.get_profile("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn older_profile_write_is_discarded() {
    let store = MemoryStore::new();
    let now = Utc::now();
    store.upsert_profile(profile("octocat", 10, now)).await.unwrap();

    let winner = store
        .upsert_profile(profile("octocat", 1, now - TimeDelta::minutes(1)))
        .await
        .unwrap();

    assert_eq!(winner.followers, 10);
    assert_eq!(winner.last_fetched_at, now);
}

#[tokio::test]
async fn resync_preserves_curation() {
    let store = MemoryStore::new();
    let t0 = Utc::now();
    store
        .upsert_repositories("octocat", vec![snapshot(1, "hello", 3)], t0)
        .await
        .unwrap();
    store.set_featured("octocat", 1, true, Some(1)).await.unwrap();

    let after = store
        .upsert_repositories(
            "octocat",
            vec![snapshot(1, "hello", 30)],
            t0 + TimeDelta::hours(25),
        )
        .await
        .unwrap();

    assert_eq!(after.len(), 1);
    assert!(after[0].featured);
    assert_eq!(after[0].display_order, Some(1));
    assert_eq!(after[0].snapshot.stars, 30);
}

#[tokio::test]
async fn repositories_missing_upstream_are_kept() {
    let store = MemoryStore::new();
    let t0 = Utc::now();
    store
        .upsert_repositories(
            "octocat",
            vec![snapshot(1, "a", 1), snapshot(2, "b", 2)],
            t0,
        )
        .await
        .unwrap();

    let after = store
        .upsert_repositories("octocat", vec![snapshot(1, "a", 1)], t0 + TimeDelta::hours(1))
        .await
        .unwrap();

    assert_eq!(after.len(), 2);
}

#[tokio::test]
async fn list_by_owner_pages_by_stars() {
    let store = MemoryStore::new();
    let snapshots = (1..=5).map(|i| snapshot(i, &format!("r{i}"), i * 10)).collect();
    store
        .upsert_repositories("octocat", snapshots, Utc::now())
        .await
        .unwrap();

    let page = store.list_by_owner("octocat", 2, 2).await.unwrap();

    assert_eq!(page.total, 5);
    assert_eq!(page.pages, 3);
    assert_eq!(page.page, 2);
    let names: Vec<_> = page.items.iter().map(|r| r.snapshot.name.as_str()).collect();
    assert_eq!(names, ["r3", "r2"]);
}

#[tokio::test]
async fn featured_orders_by_display_order_then_stars() {
    let store = MemoryStore::new();
    let snapshots = vec![
        snapshot(1, "low", 1),
        snapshot(2, "high", 100),
        snapshot(3, "pinned", 5),
        snapshot(4, "hidden", 1_000),
    ];
    store
        .upsert_repositories("octocat", snapshots, Utc::now())
        .await
        .unwrap();
    store.set_featured("octocat", 1, true, None).await.unwrap();
    store.set_featured("octocat", 2, true, None).await.unwrap();
    store.set_featured("octocat", 3, true, Some(0)).await.unwrap();

    let featured = store.list_featured().await.unwrap();

    let names: Vec<_> = featured.iter().map(|r| r.snapshot.name.as_str()).collect();
    assert_eq!(names, ["pinned", "high", "low"]);
}

#[tokio::test]
async fn set_featured_on_unknown_repository_is_not_found() {
    let store = MemoryStore::new();
    let err = store.set_featured("octocat", 99, true, None).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound));
}
