//! Prepdeck - progress tracking for JavaScript interview preparation
//!
//! Keeps local study profiles (completed and bookmarked questions, exam
//! results, streaks) in a pluggable key-value store, with JSON import and
//! export of individual profiles.

pub mod catalog;
pub mod config;
pub mod exam;
pub mod ledger;
pub mod profile;
pub mod store;
pub mod streak;
pub mod time;

pub use catalog::QuestionCatalog;
pub use config::Config;
pub use ledger::ProgressLedger;
pub use profile::{ProfileError, UserProfile, UserStore};
pub use store::{FileStore, JsonStore, KeyValueStore, MemoryStore};
pub use time::Clock;
