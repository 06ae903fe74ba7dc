pub mod archive;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod game;
pub mod judge;
pub mod metrics;
pub mod observability;
pub mod runtime;
pub mod throttle;

use std::sync::Arc;
use std::time::Duration;

pub use archive::{FinishedGame, GameArchive, LogArchive};
pub use cache::{
    CacheFacade, MemoryStore, RedisStore, SavedTo, SessionStore, SharedCacheClient, SharedStore,
    StoreReply,
};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{AppConfig, CacheConfig, RateLimitConfig, RedisConfig};
pub use error::{GameError, JudgeError, StartupError, StoreError};
pub use game::{GameHistory, GameService, GameStart, GuessOutcome};
pub use judge::{GatedJudge, GeminiClient, GenerationRequest, Judge, TextGenerator, Verdict};
pub use observability::{init_tracing, shutdown_tracing};
pub use runtime::{GameRuntime, RuntimeBuilder};
pub use throttle::{CallCategory, CallGate};

/// Create the shared cache client from configuration.
///
/// ## Modes
///
/// - **Redis disabled**: a disabled client; every call answers `Unavailable`
///   and the local tier serves everything
/// - **Redis enabled**: a pooled Redis client
///
/// ## Graceful Degradation
///
/// A Redis that cannot be reached at startup is logged and kept. Calls fall
/// back to the local tier until it comes up. Only a pool that cannot be
/// built at all (a malformed URL) disables the shared tier.
pub async fn create_shared_cache(
    config: &AppConfig,
    clock: SharedClock,
) -> (SharedCacheClient, Option<RedisStore>) {
    let redis = &config.redis;
    if !redis.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return (SharedCacheClient::disabled(clock), None);
    }

    tracing::info!(url = %redis.url, "Connecting to Redis");

    let store = match RedisStore::from_config(redis) {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Falling back to local cache."
            );
            return (SharedCacheClient::disabled(clock), None);
        }
    };

    let client = SharedCacheClient::new(
        Arc::new(store.clone()),
        redis.timeout(),
        Duration::from_secs(config.cache.unavailable_log_window_secs),
        clock,
    );

    if client.ping().await {
        tracing::info!("✓ Connected to Redis successfully");
    } else {
        tracing::warn!("Redis not reachable at startup; local fallback active until it is");
    }

    (client, Some(store))
}
