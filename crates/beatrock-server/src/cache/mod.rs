//! Dual-tier persistence.
//!
//! The shared tier (Redis, or the in-process [`MemoryStore`]) is the source
//! of truth whenever it answers. Each data category also has a local
//! [`LocalStore`] that takes over transparently while the shared tier is
//! unreachable:
//!
//! - [`CacheFacade`]: verdicts and usage counters
//! - [`SessionStore`]: whole game sessions
//!
//! Local maps are compacted by the [`Sweeper`] owned by the runtime.

pub mod facade;
pub mod local;
pub mod memory;
pub mod redis;
pub mod session;
pub mod shared;
pub mod sweeper;

pub use facade::CacheFacade;
pub use local::{LocalStats, LocalStore};
pub use memory::MemoryStore;
pub use redis::RedisStore;
pub use session::{SavedTo, SessionStore};
pub use shared::{LogThrottle, SharedCacheClient, SharedStore, StoreReply};
pub use sweeper::{Sweepable, Sweeper, SweeperHandle};
