//! Integration test for the Redis-backed distributed store.
//!
//! Requires Docker (via testcontainers) and starts a real Redis instance,
//! mirroring the teacher's `consul_integration.rs` shape: start a
//! container, wait for it to accept connections, exercise the real
//! client against it.
//!
//! Run with: `cargo test --test redis_integration -- --ignored`

use ratelimit_engine::store::redis_store::RedisStore;
use ratelimit_engine::store::Store;

use testcontainers::core::IntoContainerPort;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

async fn start_redis() -> (RedisStore, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(6379_u16.tcp())
        .start()
        .await
        .expect("failed to start redis container");

    let host = container.get_host().await.expect("get host");
    let port = container.get_host_port_ipv4(6379).await.expect("get port");
    let url = format!("redis://{host}:{port}");

    let store = RedisStore::connect(&url).expect("failed to parse redis url");

    (store, container)
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn admits_up_to_capacity_then_rejects() {
    let (store, _container) = start_redis().await;

    for _ in 0..3 {
        let check = store.check("client-1", 0, 10_000, 3).await.unwrap();
        assert!(check.admitted);
    }
    let rejected = store.check("client-1", 0, 10_000, 3).await.unwrap();
    assert!(!rejected.admitted);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn reset_clears_the_window() {
    let (store, _container) = start_redis().await;

    store.check("client-2", 0, 10_000, 1).await.unwrap();
    assert!(!store.check("client-2", 0, 10_000, 1).await.unwrap().admitted);

    store.reset("client-2").await.unwrap();
    assert!(store.check("client-2", 0, 10_000, 1).await.unwrap().admitted);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn expired_entries_are_evicted_from_the_window() {
    let (store, _container) = start_redis().await;

    store.check("client-3", 0, 1_000, 2).await.unwrap();
    // A member scored far outside the window should be pruned on the next
    // check, regardless of wall-clock time — the script evicts by score,
    // not by TTL alone.
    let check = store.check("client-3", 50_000, 1_000, 2).await.unwrap();
    assert_eq!(check.in_window, 1);
    assert!(check.admitted);
}
