//! Local user profiles
//!
//! Profiles live in a single directory blob in the key-value store, with a
//! separate pointer naming the active one.

pub mod directory;
pub mod error;
pub mod model;
pub mod store;

// Re-exports
pub use directory::Directory;
pub use error::ProfileError;
pub use model::{
    Avatar, ExamOutcome, ExamResult, ProgressSummary, Settings, StudyEvent, UserExport,
    UserProfile, UserStats,
};
pub use store::UserStore;
