//! Domain layer for the beatrock guessing game.
//!
//! Everything in this crate is synchronous and storage-agnostic: the session
//! record and its transition rules, case-folded cache keys, the verdict text
//! parser, judge personas and guess moderation. The persistence and caching
//! layer lives in `beatrock-server`.

pub mod keys;
pub mod moderation;
pub mod persona;
pub mod session;
pub mod verdict;

pub use keys::{CounterKey, VerdictKey, fold};
pub use moderation::{ModerationResult, check_prompt_injection, moderate};
pub use persona::Persona;
pub use session::{GuessResult, Screening, SessionRecord};
pub use verdict::{ParsedVerdict, parse_verdict};

/// The word every game starts from.
pub const INITIAL_WORD: &str = "Rock";
