//! Process-wide wiring.
//!
//! [`GameRuntime`] owns every long-lived component: the shared cache client
//! and its pool, the local maps (through the façade and session store), the
//! call gate, the judge and the sweeper task. Startup builds them in
//! dependency order; [`GameRuntime::shutdown`] stops the sweeper and closes
//! the pool.

use std::sync::Arc;
use std::time::Duration;

use crate::archive::{GameArchive, LogArchive};
use crate::cache::{
    CacheFacade, RedisStore, SessionStore, SharedCacheClient, SharedStore, Sweepable, Sweeper,
    SweeperHandle,
};
use crate::clock::{SharedClock, SystemClock};
use crate::config::AppConfig;
use crate::error::StartupError;
use crate::game::GameService;
use crate::judge::{GatedJudge, GeminiClient, Judge, TextGenerator};
use crate::throttle::CallGate;

pub struct GameRuntime {
    config: AppConfig,
    shared: SharedCacheClient,
    redis: Option<RedisStore>,
    game: Arc<GameService>,
    sweeper: SweeperHandle,
}

impl GameRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    pub fn game(&self) -> &Arc<GameService> {
        &self.game
    }

    pub fn shared_cache(&self) -> &SharedCacheClient {
        &self.shared
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Stop the sweeper, then close the Redis pool.
    pub async fn shutdown(self) {
        tracing::info!("shutting down game runtime");
        self.sweeper.shutdown().await;
        if let Some(redis) = &self.redis {
            redis.close();
            tracing::info!("Redis pool closed");
        }
    }
}

/// Builder for [`GameRuntime`]. Anything not supplied is created from the
/// configuration.
#[derive(Default)]
pub struct RuntimeBuilder {
    config: AppConfig,
    clock: Option<SharedClock>,
    shared_store: Option<Arc<dyn SharedStore>>,
    generator: Option<Arc<dyn TextGenerator>>,
    judge: Option<Arc<dyn Judge>>,
    archive: Option<Arc<dyn GameArchive>>,
}

impl RuntimeBuilder {
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use this backend for the shared tier instead of the configured one.
    pub fn with_shared_store(mut self, store: Arc<dyn SharedStore>) -> Self {
        self.shared_store = Some(store);
        self
    }

    /// Put the call gate in front of this generator instead of Gemini.
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Use this judge as is, without a call gate.
    pub fn with_judge(mut self, judge: Arc<dyn Judge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn with_archive(mut self, archive: Arc<dyn GameArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub async fn build(self) -> Result<GameRuntime, StartupError> {
        let config = self.config;
        config.validate().map_err(StartupError::Config)?;
        let clock = self.clock.unwrap_or_else(SystemClock::shared);

        let (shared, redis) = match self.shared_store {
            Some(store) => {
                let client = SharedCacheClient::new(
                    store,
                    config.redis.timeout(),
                    Duration::from_secs(config.cache.unavailable_log_window_secs),
                    clock.clone(),
                );
                (client, None)
            }
            None => crate::create_shared_cache(&config, clock.clone()).await,
        };
        tracing::info!(mode = shared.mode(), "shared cache tier ready");

        let cache = CacheFacade::new(shared.clone(), &config.cache, clock.clone());
        let sessions = SessionStore::new(shared.clone(), &config.cache, clock.clone());

        let judge: Arc<dyn Judge> = match (self.judge, self.generator) {
            (Some(judge), _) => judge,
            (None, generator) => {
                let generator: Arc<dyn TextGenerator> = match generator {
                    Some(generator) => generator,
                    None => Arc::new(GeminiClient::new(&config.judge)?),
                };
                let gate = CallGate::new(shared.clone(), &config.rate_limit, clock.clone());
                Arc::new(GatedJudge::new(generator, gate))
            }
        };
        let archive = self.archive.unwrap_or_else(|| Arc::new(LogArchive) as Arc<dyn GameArchive>);

        let mut targets: Vec<Arc<dyn Sweepable>> = cache.sweep_targets();
        targets.push(sessions.sweep_target());
        let sweeper = Sweeper::new(
            targets,
            Duration::from_secs(config.cache.sweep_interval_secs),
        )
        .start();

        let game = Arc::new(GameService::new(
            sessions,
            cache,
            judge,
            archive,
            config.game.clone(),
            clock,
        ));

        Ok(GameRuntime {
            config,
            shared,
            redis,
            game,
            sweeper,
        })
    }
}
