use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Shared (L2) cache connection
    #[serde(default)]
    pub redis: RedisConfig,
    /// TTLs and local-tier housekeeping
    #[serde(default)]
    pub cache: CacheConfig,
    /// Spacing and retry policy for judge calls
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Text-generation service behind the judge
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// Default derived via field defaults

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Redis validations
        if self.redis.enabled && self.redis.url.trim().is_empty() {
            return Err("redis.enabled=true requires redis.url".into());
        }
        if self.redis.pool_size == 0 {
            return Err("redis.pool_size must be > 0".into());
        }
        if self.redis.timeout_ms == 0 {
            return Err("redis.timeout_ms must be > 0".into());
        }
        // Cache validations
        if self.cache.verdict_ttl_secs == 0 || self.cache.session_ttl_secs == 0 {
            return Err("cache TTLs must be > 0".into());
        }
        if self.cache.sweep_interval_secs == 0 {
            return Err("cache.sweep_interval_secs must be > 0".into());
        }
        if self.cache.sweep_every_ops == 0 {
            return Err("cache.sweep_every_ops must be > 0".into());
        }
        // Rate limit validations
        if self.rate_limit.backoff_floor_ms == 0 {
            return Err("rate_limit.backoff_floor_ms must be > 0".into());
        }
        if self.rate_limit.backoff_floor_ms > self.rate_limit.backoff_ceiling_ms {
            return Err("rate_limit.backoff_floor_ms must be <= rate_limit.backoff_ceiling_ms".into());
        }
        if self.rate_limit.max_attempts == 0 {
            return Err("rate_limit.max_attempts must be > 0".into());
        }
        // Judge validations
        if self.judge.model.trim().is_empty() {
            return Err("judge.model must not be empty".into());
        }
        if self.judge.request_timeout_ms == 0 {
            return Err("judge.request_timeout_ms must be > 0".into());
        }
        // Game validations
        if self.game.initial_word.trim().is_empty() {
            return Err("game.initial_word must not be empty".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }
}

/// Redis configuration for the shared cache tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Enable Redis. Without it every read and write uses the local tier.
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connect and per-operation timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    3000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

impl RedisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Verdict and counter TTL in seconds
    #[serde(default = "default_verdict_ttl_secs")]
    pub verdict_ttl_secs: u64,

    /// Session TTL in seconds (shared: since last write, local: since last read)
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Background sweep interval for the local tier
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Opportunistic sweep after this many local mutations
    #[serde(default = "default_sweep_every_ops")]
    pub sweep_every_ops: u64,

    /// At most one "shared cache unavailable" warning per window
    #[serde(default = "default_unavailable_log_window_secs")]
    pub unavailable_log_window_secs: u64,
}

fn default_verdict_ttl_secs() -> u64 {
    86_400 // 24 hours
}

fn default_session_ttl_secs() -> u64 {
    604_800 // 7 days
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

fn default_sweep_every_ops() -> u64 {
    100
}

fn default_unavailable_log_window_secs() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            verdict_ttl_secs: default_verdict_ttl_secs(),
            session_ttl_secs: default_session_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            sweep_every_ops: default_sweep_every_ops(),
            unavailable_log_window_secs: default_unavailable_log_window_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Minimum spacing between two calls of one category
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    #[serde(default = "default_backoff_floor_ms")]
    pub backoff_floor_ms: u64,

    #[serde(default = "default_backoff_ceiling_ms")]
    pub backoff_ceiling_ms: u64,

    /// Attempts per call, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_min_interval_ms() -> u64 {
    500
}

fn default_backoff_floor_ms() -> u64 {
    1000
}

fn default_backoff_ceiling_ms() -> u64 {
    60_000
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            backoff_floor_ms: default_backoff_floor_ms(),
            backoff_ceiling_ms: default_backoff_ceiling_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl RateLimitConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn backoff_floor(&self) -> Duration {
        Duration::from_millis(self.backoff_floor_ms)
    }

    pub fn backoff_ceiling(&self) -> Duration {
        Duration::from_millis(self.backoff_ceiling_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// API key; falls back to the GEMINI_API_KEY environment variable
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_judge_base_url")]
    pub base_url: String,

    #[serde(default = "default_judge_model")]
    pub model: String,

    #[serde(default = "default_judge_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_judge_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_judge_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_judge_request_timeout_ms() -> u64 {
    10_000
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_judge_base_url(),
            model: default_judge_model(),
            request_timeout_ms: default_judge_request_timeout_ms(),
        }
    }
}

impl JudgeConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_initial_word")]
    pub initial_word: String,

    /// How many recent words a history response carries
    #[serde(default = "default_recent_history")]
    pub recent_history: usize,
}

fn default_initial_word() -> String {
    beatrock_core::INITIAL_WORD.to_string()
}

fn default_recent_history() -> usize {
    5
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            initial_word: default_initial_word(),
            recent_history: default_recent_history(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_FILE: &str = "beatrock.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., BEATROCK__REDIS__URL=redis://cache:6379
        builder = builder.add_source(
            Environment::with_prefix("BEATROCK")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
