//! Integration tests against a real Redis.
//!
//! Tests use testcontainers to spin up a Redis instance and are ignored by
//! default since they need Docker. Run them with `--ignored`.

use std::sync::Arc;
use std::time::Duration;

use beatrock_core::{CounterKey, SessionRecord, VerdictKey};
use beatrock_server::{
    CacheConfig, CacheFacade, RedisConfig, RedisStore, SessionStore, SharedCacheClient,
    SharedStore, StoreReply, SystemClock,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

// Shared Redis container for all tests
static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

/// Get or create the shared Redis container
async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");

            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            let url = format!("redis://127.0.0.1:{}", host_port);

            (container, url)
        })
        .await;

    url.clone()
}

async fn redis_store() -> RedisStore {
    let config = RedisConfig {
        enabled: true,
        url: get_redis_url().await,
        ..RedisConfig::default()
    };
    RedisStore::from_config(&config).expect("create pool")
}

fn client(store: RedisStore) -> SharedCacheClient {
    SharedCacheClient::new(
        Arc::new(store),
        Duration::from_secs(3),
        Duration::from_secs(60),
        SystemClock::shared(),
    )
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_ping_and_mode() {
    let store = redis_store().await;
    assert_eq!(store.mode(), "redis");
    assert!(store.ping().await.is_ok());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_increment_is_atomic_under_concurrency() {
    let store = Arc::new(redis_store().await);
    let key = format!("count:concurrency-{}", uuid::Uuid::new_v4());

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let store = store.clone();
        let key = key.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                store.increment(&key, Duration::from_secs(60)).await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(store.counter(&key).await.unwrap(), 200);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_reserved_slots_never_collide() {
    let store = Arc::new(redis_store().await);
    let key = format!("ai_request:last_time-{}", uuid::Uuid::new_v4());
    let interval = Duration::from_millis(500);

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let store = store.clone();
        let key = key.clone();
        tasks.push(tokio::spawn(async move {
            store
                .reserve_slot(&key, 1_000, interval, Duration::from_secs(60))
                .await
                .unwrap()
        }));
    }
    let mut slots = Vec::new();
    for task in tasks {
        slots.push(task.await.unwrap());
    }
    slots.sort_unstable();

    let expected: Vec<u64> = (0..10).map(|n| 1_000 + n * 500).collect();
    assert_eq!(slots, expected);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_facade_and_sessions_over_redis() {
    let shared = client(redis_store().await);
    let clock = SystemClock::shared();
    let cache = CacheFacade::new(shared.clone(), &CacheConfig::default(), clock.clone());
    let sessions = SessionStore::new(shared.clone(), &CacheConfig::default(), clock);

    let subject = format!("rock-{}", uuid::Uuid::new_v4());
    let key = VerdictKey::new(&subject, "Paper");
    cache.save_verdict(&key, true).await;
    assert_eq!(
        shared.get::<bool>(&format!("verdict:{key}")).await,
        StoreReply::Available(Some(true))
    );
    assert_eq!(cache.get_verdict(&key).await, Some(true));

    let counter = CounterKey::word(&subject);
    assert_eq!(cache.increment(&counter).await, 1);
    assert_eq!(cache.increment(&counter).await, 2);
    assert_eq!(cache.get_count(&counter).await, 2);

    let record = SessionRecord::new("Rock", "default");
    let id = sessions.create(&record).await;
    assert_eq!(sessions.load(id).await, Some(record));
    assert!(sessions.active_count().await >= 1);
    assert!(sessions.delete(id).await);
    assert_eq!(sessions.load(id).await, None);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_closed_pool_reports_unavailable() {
    let store = redis_store().await;
    let shared = client(store.clone());
    assert!(shared.ping().await);

    store.close();
    assert!(!shared.ping().await);
    assert_eq!(shared.get::<bool>("anything").await, StoreReply::Unavailable);
}
