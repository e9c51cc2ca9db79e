//! Multi-profile progress store
//!
//! Every operation reads the whole directory from the backing store, applies
//! its change in memory and writes the whole directory back. There is no
//! partial-write path.

use chrono::{DateTime, Utc};
use rand::Rng;

use super::directory::Directory;
use super::error::ProfileError;
use super::model::{EXPORT_VERSION, ExamOutcome, UserExport, UserProfile, UserStats};
use crate::catalog::QuestionId;
use crate::store::{JsonStore, KeyValueStore};
use crate::streak::advance_streak;
use crate::time::Clock;

/// Key holding the JSON array of all profiles
pub const USERS_KEY: &str = "users";

/// Key holding the bare ID of the active profile
pub const CURRENT_USER_KEY: &str = "current_user";

/// Name given to the profile created on first start
pub const DEFAULT_USERNAME: &str = "Student";

type Result<T> = std::result::Result<T, ProfileError>;

/// Profile directory backed by a key-value store
#[derive(Debug)]
pub struct UserStore<S> {
    store: JsonStore<S>,
    clock: Clock,
    default_username: String,
}

impl<S: KeyValueStore> UserStore<S> {
    /// Create a store over `backend` using the system clock
    pub fn new(backend: S) -> Self {
        Self {
            store: JsonStore::new(backend),
            clock: Clock::default(),
            default_username: DEFAULT_USERNAME.to_string(),
        }
    }

    /// Use a specific clock
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Override the name used by [`initialize_default_user`](Self::initialize_default_user)
    pub fn with_default_username(mut self, username: impl Into<String>) -> Self {
        self.default_username = username.into();
        self
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    /// Borrow the underlying JSON store
    pub fn storage(&self) -> &JsonStore<S> {
        &self.store
    }

    /// Load profiles and pointer from storage
    pub fn load_directory(&self) -> Directory {
        let users = self.store.load_or_default(USERS_KEY);
        let current = self.store.load_raw(CURRENT_USER_KEY).filter(|id| !id.is_empty());
        Directory::new(users, current)
    }

    fn persist_users(&mut self, directory: &Directory) -> bool {
        self.store.save(USERS_KEY, &directory.users)
    }

    fn persist_pointer(&mut self, id: Option<&str>) -> bool {
        match id {
            Some(id) => self.store.save_raw(CURRENT_USER_KEY, id),
            None => self.store.remove(CURRENT_USER_KEY),
        }
    }

    /// All stored profiles, empty if storage is missing or corrupt
    pub fn all_users(&self) -> Vec<UserProfile> {
        self.load_directory().users
    }

    /// The active profile, or `None` if the pointer is unset or stale
    pub fn current_user(&self) -> Option<UserProfile> {
        self.load_directory().current().cloned()
    }

    /// Look a profile up by name, ignoring case
    pub fn find_by_username(&self, username: &str) -> Option<UserProfile> {
        self.load_directory().find_by_username(username).cloned()
    }

    /// Create a profile and make it current
    pub fn create_user(&mut self, username: &str, email: Option<&str>) -> Result<UserProfile> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ProfileError::EmptyUsername);
        }

        let mut directory = self.load_directory();
        if directory.username_taken(username, None) {
            return Err(ProfileError::DuplicateUsername(username.to_string()));
        }

        let now = self.clock.now();
        let mut id = generate_user_id(now);
        while directory.find(&id).is_some() {
            id = generate_user_id(now);
        }

        let email = email.map(str::trim).filter(|e| !e.is_empty()).map(str::to_string);
        let user = UserProfile::new(id, username, email, now);
        directory.users.push(user.clone());

        // Only point at the new profile once it is actually stored
        if self.persist_users(&directory) {
            self.persist_pointer(Some(&user.id));
        }
        tracing::info!(id = %user.id, username = %user.username, "Created profile");
        Ok(user)
    }

    /// Make `id` the active profile
    pub fn set_current_user(&mut self, id: &str) -> Result<UserProfile> {
        let now = self.clock.now();
        let mut directory = self.load_directory();
        let user =
            directory.find_mut(id).ok_or_else(|| ProfileError::UserNotFound(id.to_string()))?;
        user.last_active = now;
        let user = user.clone();

        self.persist_users(&directory);
        self.persist_pointer(Some(id));
        tracing::info!(id, username = %user.username, "Switched profile");
        Ok(user)
    }

    /// Replace the stored profile with the same ID
    ///
    /// Duplicate question IDs are dropped and counters rebuilt before storing.
    pub fn update_user(&mut self, mut user: UserProfile) -> Result<UserProfile> {
        let mut directory = self.load_directory();
        if directory.username_taken(&user.username, Some(&user.id)) {
            return Err(ProfileError::DuplicateUsername(user.username));
        }
        let slot = directory
            .find_mut(&user.id)
            .ok_or_else(|| ProfileError::UserNotFound(user.id.clone()))?;

        user.last_active = self.clock.now();
        user.normalize();
        *slot = user.clone();

        self.persist_users(&directory);
        tracing::debug!(id = %user.id, "Updated profile");
        Ok(user)
    }

    /// Remove a profile. Clears the pointer if it was current; never picks a
    /// replacement.
    pub fn delete_user(&mut self, id: &str) -> bool {
        let mut directory = self.load_directory();
        let was_current = directory.current_user_id.as_deref() == Some(id);
        if !directory.remove(id) {
            tracing::debug!(id, "Delete requested for unknown profile");
            return false;
        }

        if !self.persist_users(&directory) {
            // Profile is still stored, so it stays current
            return false;
        }
        if was_current {
            self.persist_pointer(None);
        }
        tracing::info!(id, "Deleted profile");
        true
    }

    /// Apply `change` to the current profile and store it
    fn update_current<F>(&mut self, change: F) -> Result<Option<UserProfile>>
    where
        F: FnOnce(&mut UserProfile, DateTime<Utc>),
    {
        let Some(mut user) = self.current_user() else {
            tracing::debug!("No current user; ignoring update");
            return Ok(None);
        };
        change(&mut user, self.clock.now());
        self.update_user(user).map(Some)
    }

    pub fn mark_question_completed(
        &mut self,
        question: QuestionId,
    ) -> Result<Option<UserProfile>> {
        self.update_current(|user, now| {
            user.complete(question, now);
        })
    }

    pub fn mark_question_incomplete(
        &mut self,
        question: QuestionId,
    ) -> Result<Option<UserProfile>> {
        self.update_current(|user, _| {
            user.uncomplete(question);
        })
    }

    pub fn toggle_bookmark(&mut self, question: QuestionId) -> Result<Option<UserProfile>> {
        self.update_current(|user, _| {
            user.toggle_bookmark(question);
        })
    }

    /// Store an exam result for the current profile, replacing an earlier attempt
    pub fn save_exam_result(
        &mut self,
        exam_id: &str,
        outcome: ExamOutcome,
    ) -> Result<Option<UserProfile>> {
        self.update_current(|user, now| user.record_exam(exam_id, outcome, now))
    }

    /// Record the catalog size on a profile (the current one if `id` is `None`)
    ///
    /// Nothing is written when the stored value already matches.
    pub fn set_total_questions(
        &mut self,
        id: Option<&str>,
        total: u32,
    ) -> Result<Option<UserProfile>> {
        let directory = self.load_directory();
        let user = match id {
            Some(id) => {
                directory.find(id).ok_or_else(|| ProfileError::UserNotFound(id.to_string()))?
            }
            None => match directory.current() {
                Some(user) => user,
                None => return Ok(None),
            },
        };
        if user.progress.total_questions == total {
            return Ok(Some(user.clone()));
        }

        let mut user = user.clone();
        user.progress.total_questions = total;
        self.update_user(user).map(Some)
    }

    /// Advance the current profile's streak for today and return it
    ///
    /// Returns 0 when there is no current profile.
    pub fn update_study_streak(&mut self) -> Result<u32> {
        let Some(mut user) = self.current_user() else {
            return Ok(0);
        };

        let last = user.progress.last_study_date.map(|at| self.clock.day_of(at));
        let update = advance_streak(user.progress.study_streak, last, self.clock.today());
        if !update.restamp {
            return Ok(update.streak);
        }

        user.progress.study_streak = update.streak;
        user.progress.last_study_date = Some(self.clock.now());
        let user = self.update_user(user)?;
        Ok(user.progress.study_streak)
    }

    /// Snapshot a profile (the current one if `id` is `None`) for export
    pub fn export_user_data(&self, id: Option<&str>) -> Option<UserExport> {
        let directory = self.load_directory();
        let user = match id {
            Some(id) => directory.find(id),
            None => directory.current(),
        }?;
        Some(UserExport {
            user: user.clone(),
            exported_at: self.clock.now(),
            version: EXPORT_VERSION.to_string(),
        })
    }

    /// Import an export file, replacing a profile with the same ID or
    /// appending a new one
    pub fn import_user_data(&mut self, payload: &str) -> Result<UserProfile> {
        let mut value: serde_json::Value = serde_json::from_str(payload)
            .map_err(|e| ProfileError::InvalidImport(e.to_string()))?;

        let has_id = value
            .get("user")
            .and_then(|u| u.get("id"))
            .and_then(serde_json::Value::as_str)
            .is_some_and(|id| !id.is_empty());
        if !has_id {
            return Err(ProfileError::InvalidImport("missing user.id".to_string()));
        }

        let mut user: UserProfile = serde_json::from_value(value["user"].take())
            .map_err(|e| ProfileError::InvalidImport(e.to_string()))?;
        user.normalize();

        let mut directory = self.load_directory();
        if directory.username_taken(&user.username, Some(&user.id)) {
            return Err(ProfileError::DuplicateUsername(user.username));
        }
        let replaced = directory.find(&user.id).is_some();
        directory.upsert(user.clone());

        self.persist_users(&directory);
        tracing::info!(id = %user.id, replaced, "Imported profile");
        Ok(user)
    }

    /// Ensure there is a current profile, creating the default one if needed
    ///
    /// An existing profile with the default name is reused rather than
    /// duplicated.
    pub fn initialize_default_user(&mut self) -> Result<UserProfile> {
        let directory = self.load_directory();
        if let Some(user) = directory.current() {
            return Ok(user.clone());
        }

        let default_username = self.default_username.clone();
        match directory.find_by_username(&default_username) {
            Some(existing) => self.set_current_user(&existing.id),
            None => self.create_user(&default_username, None),
        }
    }

    /// Derived statistics for a profile (the current one if `id` is `None`)
    pub fn user_stats(&self, id: Option<&str>) -> Option<UserStats> {
        let directory = self.load_directory();
        let user = match id {
            Some(id) => directory.find(id),
            None => directory.current(),
        }?;
        Some(UserStats {
            progress: user.progress.clone(),
            total_study_days: user.total_study_days(&self.clock),
            account_age: (self.clock.now() - user.created_at).num_days(),
            last_active: user.last_active,
        })
    }
}

/// `user_<base36 millis>_<9 random base36 chars>`
fn generate_user_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..9)
        .map(|_| {
            let idx = rng.random_range(0..36u8);
            if idx < 10 { (b'0' + idx) as char } else { (b'a' + idx - 10) as char }
        })
        .collect();
    format!("user_{}_{}", to_base36(now.timestamp_millis().max(0) as u64), suffix)
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError};
    use chrono::{Duration, FixedOffset, TimeZone};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn store() -> UserStore<MemoryStore> {
        UserStore::new(MemoryStore::default()).with_clock(Clock::fixed(start()))
    }

    fn outcome(score: f64) -> ExamOutcome {
        ExamOutcome { score, ..Default::default() }
    }

    #[test]
    fn create_user_becomes_current() {
        let mut store = store();
        let user = store.create_user("Ann", Some("ann@example.com")).unwrap();

        assert!(user.id.starts_with("user_"));
        assert_eq!(user.email.as_deref(), Some("ann@example.com"));
        assert_eq!(user.avatar.initials, "A");
        assert_eq!(store.current_user(), Some(user.clone()));
        assert_eq!(store.all_users(), vec![user]);
    }

    #[test]
    fn duplicate_username_differs_only_in_case() {
        let mut store = store();
        store.create_user("Bob", None).unwrap();

        let err = store.create_user("bob", None).unwrap_err();
        assert!(matches!(err, ProfileError::DuplicateUsername(name) if name == "bob"));
        assert_eq!(store.all_users().len(), 1);
    }

    #[test]
    fn blank_username_is_rejected() {
        let mut store = store();
        assert!(matches!(store.create_user("   ", None), Err(ProfileError::EmptyUsername)));
        assert!(store.all_users().is_empty());
    }

    #[test]
    fn generated_ids_are_unique() {
        let mut store = store();
        let a = store.create_user("a", None).unwrap();
        let b = store.create_user("b", None).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn corrupt_directory_reads_as_empty() {
        let mut backend = MemoryStore::default();
        backend.set(USERS_KEY, "[{ broken").unwrap();
        let store = UserStore::new(backend);
        assert!(store.all_users().is_empty());
        assert!(store.current_user().is_none());
    }

    #[test]
    fn set_current_user_stamps_last_active() {
        let mut store = store();
        let ann = store.create_user("Ann", None).unwrap();
        store.create_user("Bob", None).unwrap();

        store.clock_mut().advance(Duration::hours(2));
        let switched = store.set_current_user(&ann.id).unwrap();

        assert_eq!(switched.last_active, start() + Duration::hours(2));
        assert_eq!(store.current_user().unwrap().id, ann.id);
    }

    #[test]
    fn set_current_user_unknown_id() {
        let mut store = store();
        let err = store.set_current_user("user_missing").unwrap_err();
        assert!(matches!(err, ProfileError::UserNotFound(_)));
    }

    #[test]
    fn update_user_requires_existing_id() {
        let mut store = store();
        let ghost = UserProfile::new("user_ghost", "Ghost", None, start());
        assert!(matches!(store.update_user(ghost), Err(ProfileError::UserNotFound(_))));
    }

    #[test]
    fn update_user_refreshes_last_active_and_repairs_counts() {
        let mut store = store();
        let mut user = store.create_user("Ann", None).unwrap();
        user.completed_questions = vec![1, 1, 2];
        user.progress.completed_questions = 9;

        store.clock_mut().advance(Duration::minutes(5));
        let stored = store.update_user(user).unwrap();

        assert_eq!(stored.completed_questions, vec![1, 2]);
        assert_eq!(stored.progress.completed_questions, 2);
        assert_eq!(stored.last_active, start() + Duration::minutes(5));
        assert_eq!(store.current_user(), Some(stored));
    }

    #[test]
    fn update_user_cannot_steal_a_name() {
        let mut store = store();
        store.create_user("Ann", None).unwrap();
        let mut bob = store.create_user("Bob", None).unwrap();
        bob.username = "ANN".into();
        assert!(matches!(store.update_user(bob), Err(ProfileError::DuplicateUsername(_))));
    }

    #[test]
    fn deleting_current_user_clears_pointer() {
        let mut store = store();
        let ann = store.create_user("Ann", None).unwrap();
        let bob = store.create_user("Bob", None).unwrap();

        assert!(store.delete_user(&bob.id));
        assert!(store.current_user().is_none());
        assert_eq!(store.all_users().len(), 1);

        store.set_current_user(&ann.id).unwrap();
        assert_eq!(store.current_user().unwrap().id, ann.id);
    }

    #[test]
    fn deleting_other_user_keeps_current() {
        let mut store = store();
        let ann = store.create_user("Ann", None).unwrap();
        let bob = store.create_user("Bob", None).unwrap();
        store.set_current_user(&ann.id).unwrap();

        assert!(store.delete_user(&bob.id));
        assert_eq!(store.current_user().unwrap().id, ann.id);
    }

    #[test]
    fn deleting_unknown_user_returns_false() {
        let mut store = store();
        assert!(!store.delete_user("nobody"));
    }

    #[test]
    fn progress_ops_without_current_user_are_noops() {
        let mut store = store();
        assert_eq!(store.mark_question_completed(1).unwrap(), None);
        assert_eq!(store.mark_question_incomplete(1).unwrap(), None);
        assert_eq!(store.toggle_bookmark(1).unwrap(), None);
        assert_eq!(store.save_exam_result("x", outcome(50.0)).unwrap(), None);
        assert_eq!(store.update_study_streak().unwrap(), 0);
        assert!(store.export_user_data(None).is_none());
        assert!(store.user_stats(None).is_none());
    }

    #[test]
    fn completing_appends_history_once() {
        let mut store = store();
        store.create_user("Ann", None).unwrap();

        store.mark_question_completed(5).unwrap();
        let user = store.mark_question_completed(5).unwrap().unwrap();
        assert_eq!(user.completed_questions, vec![5]);
        assert_eq!(user.study_history.len(), 1);

        let user = store.mark_question_incomplete(5).unwrap().unwrap();
        assert!(user.completed_questions.is_empty());
        assert_eq!(user.progress.completed_questions, 0);
        assert_eq!(user.study_history.len(), 1);
    }

    #[test]
    fn bookmark_toggle_is_an_involution() {
        let mut store = store();
        store.create_user("Ann", None).unwrap();

        let once = store.toggle_bookmark(7).unwrap().unwrap();
        assert_eq!(once.bookmarked_questions, vec![7]);
        let twice = store.toggle_bookmark(7).unwrap().unwrap();
        assert!(twice.bookmarked_questions.is_empty());
    }

    #[test]
    fn exam_results_stamp_and_average() {
        let mut store = store();
        store.create_user("Ann", None).unwrap();

        store.save_exam_result("closures", outcome(60.0)).unwrap();
        let user = store.save_exam_result("promises", outcome(90.0)).unwrap().unwrap();

        assert_eq!(user.progress.completed_exams, 2);
        assert_eq!(user.progress.average_score, 75.0);
        assert_eq!(user.exam_results["closures"].completed_at, start());
        assert!(matches!(
            user.study_history.last(),
            Some(crate::profile::StudyEvent::ExamCompleted { score, .. }) if *score == 90.0
        ));
    }

    #[test]
    fn streak_same_day_next_day_and_gap() {
        let mut store = store();
        store.create_user("Ann", None).unwrap();

        assert_eq!(store.update_study_streak().unwrap(), 1);
        store.clock_mut().advance(Duration::hours(1));
        assert_eq!(store.update_study_streak().unwrap(), 1);

        store.clock_mut().advance(Duration::days(1));
        assert_eq!(store.update_study_streak().unwrap(), 2);
        store.clock_mut().advance(Duration::days(1));
        assert_eq!(store.update_study_streak().unwrap(), 3);

        store.clock_mut().advance(Duration::days(2));
        assert_eq!(store.update_study_streak().unwrap(), 1);

        let user = store.current_user().unwrap();
        let expected = start() + Duration::days(4) + Duration::hours(1);
        assert_eq!(user.progress.last_study_date, Some(expected));
    }

    #[test]
    fn same_day_streak_does_not_restamp() {
        let mut store = store();
        store.create_user("Ann", None).unwrap();
        store.update_study_streak().unwrap();

        store.clock_mut().advance(Duration::minutes(30));
        store.update_study_streak().unwrap();
        assert_eq!(store.current_user().unwrap().progress.last_study_date, Some(start()));
    }

    #[test]
    fn export_then_import_into_empty_directory() {
        let mut source = store();
        let ann = source.create_user("Ann", Some("ann@example.com")).unwrap();
        source.mark_question_completed(3).unwrap();
        source.toggle_bookmark(4).unwrap();
        source.save_exam_result("core-concepts", outcome(80.0)).unwrap();
        source.update_study_streak().unwrap();

        let export = source.export_user_data(None).unwrap();
        assert_eq!(export.version, "1.0");
        let payload = serde_json::to_string_pretty(&export).unwrap();

        let mut target = store();
        let imported = target.import_user_data(&payload).unwrap();

        assert_eq!(imported, source.current_user().unwrap());
        assert_eq!(target.all_users(), vec![imported]);
        assert_eq!(export.user.id, ann.id);
        assert!(target.current_user().is_none());
    }

    #[test]
    fn import_replaces_profile_with_same_id() {
        let mut store = store();
        let ann = store.create_user("Ann", None).unwrap();
        store.create_user("Bob", None).unwrap();

        let mut export = store.export_user_data(Some(&ann.id)).unwrap();
        export.user.completed_questions = vec![1, 2, 3];
        let payload = serde_json::to_string(&export).unwrap();

        let imported = store.import_user_data(&payload).unwrap();
        assert_eq!(imported.progress.completed_questions, 3);

        let users = store.all_users();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, ann.id);
        assert_eq!(users[0].completed_questions, vec![1, 2, 3]);
    }

    #[test]
    fn import_rejects_missing_id() {
        let mut store = store();
        let err = store.import_user_data(r#"{"user": {"username": "x"}}"#).unwrap_err();
        assert!(matches!(err, ProfileError::InvalidImport(_)));

        let err = store.import_user_data(r#"{"version": "1.0"}"#).unwrap_err();
        assert!(matches!(err, ProfileError::InvalidImport(_)));

        let err = store.import_user_data("not json").unwrap_err();
        assert!(matches!(err, ProfileError::InvalidImport(_)));
        assert!(store.all_users().is_empty());
    }

    #[test]
    fn import_rejects_name_clash_with_other_profile() {
        let mut source = store();
        source.create_user("ann", None).unwrap();
        let payload = serde_json::to_string(&source.export_user_data(None).unwrap()).unwrap();

        let mut target = store();
        target.create_user("Ann", None).unwrap();
        let err = target.import_user_data(&payload).unwrap_err();
        assert!(matches!(err, ProfileError::DuplicateUsername(_)));
        assert_eq!(target.all_users().len(), 1);
    }

    #[test]
    fn initialize_creates_student_once() {
        let mut store = store();
        let first = store.initialize_default_user().unwrap();
        assert_eq!(first.username, DEFAULT_USERNAME);

        let second = store.initialize_default_user().unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(store.all_users().len(), 1);
    }

    #[test]
    fn initialize_with_stale_pointer_reuses_default_profile() {
        let mut store = store();
        let student = store.initialize_default_user().unwrap();
        let other = store.create_user("Other", None).unwrap();
        store.delete_user(&other.id);

        let restored = store.initialize_default_user().unwrap();
        assert_eq!(restored.id, student.id);
        assert_eq!(store.current_user().unwrap().id, student.id);
    }

    #[test]
    fn initialize_uses_configured_name() {
        let mut store = store().with_default_username("Learner");
        assert_eq!(store.initialize_default_user().unwrap().username, "Learner");
    }

    #[test]
    fn stats_scenario() {
        let mut store = store();
        store.create_user("Ann", None).unwrap();
        store.mark_question_completed(5).unwrap();
        store
            .save_exam_result(
                "core-concepts",
                ExamOutcome { score: 80.0, correct: 4, total: 5, ..Default::default() },
            )
            .unwrap();

        store.clock_mut().advance(Duration::days(3));
        let stats = store.user_stats(None).unwrap();
        assert_eq!(stats.progress.completed_questions, 1);
        assert_eq!(stats.progress.average_score, 80.0);
        assert_eq!(stats.total_study_days, 1);
        assert_eq!(stats.account_age, 3);
    }

    #[test]
    fn stats_count_distinct_days() {
        let mut store = store();
        let ann = store.create_user("Ann", None).unwrap();
        store.mark_question_completed(1).unwrap();
        store.mark_question_completed(2).unwrap();
        store.clock_mut().advance(Duration::days(1));
        store.mark_question_completed(3).unwrap();

        assert_eq!(store.user_stats(Some(&ann.id)).unwrap().total_study_days, 2);
        assert!(store.user_stats(Some("nobody")).is_none());
    }

    #[test]
    fn failed_persist_leaves_previous_directory() {
        let mut store =
            UserStore::new(MemoryStore::with_quota(2048)).with_clock(Clock::fixed(start()));
        store.create_user("Ann", None).unwrap();
        let before = store.all_users();

        // A long enough email pushes the directory past the quota
        let huge = "x".repeat(4096);
        store.create_user("Bob", Some(&huge)).unwrap();
        assert_eq!(store.all_users(), before);
        assert_eq!(store.current_user().unwrap().username, "Ann");
    }

    #[test]
    fn streak_days_follow_the_clock_offset() {
        // 23:00 on 2024-03-01 at UTC+11
        let sydney = FixedOffset::east_opt(11 * 3600).unwrap();
        let mut store = UserStore::new(MemoryStore::default())
            .with_clock(Clock::fixed_in(start(), sydney));
        store.create_user("Ann", None).unwrap();

        assert_eq!(store.update_study_streak().unwrap(), 1);
        store.clock_mut().advance(Duration::minutes(30));
        assert_eq!(store.update_study_streak().unwrap(), 1);
        store.clock_mut().advance(Duration::hours(1));
        assert_eq!(store.update_study_streak().unwrap(), 2);
    }

    #[test]
    fn study_days_follow_the_clock_offset() {
        let sydney = FixedOffset::east_opt(11 * 3600).unwrap();
        let mut store = UserStore::new(MemoryStore::default())
            .with_clock(Clock::fixed_in(start(), sydney));
        store.create_user("Ann", None).unwrap();
        store.mark_question_completed(1).unwrap();
        store.clock_mut().advance(Duration::hours(2));
        store.mark_question_completed(2).unwrap();

        assert_eq!(store.user_stats(None).unwrap().total_study_days, 2);
    }

    /// Backend that refuses to write one key
    #[derive(Debug, Default)]
    struct LockedKey {
        inner: MemoryStore,
        locked: Option<&'static str>,
    }

    impl KeyValueStore for LockedKey {
        fn get(&self, key: &str) -> std::result::Result<Option<String>, StoreError> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> std::result::Result<(), StoreError> {
            if self.locked == Some(key) {
                return Err(StoreError::InvalidKey(key.to_string()));
            }
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) -> std::result::Result<(), StoreError> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn failed_delete_keeps_user_current() {
        let mut store =
            UserStore::new(LockedKey::default()).with_clock(Clock::fixed(start()));
        let ann = store.create_user("Ann", None).unwrap();

        store.store.inner_mut().locked = Some(USERS_KEY);
        assert!(!store.delete_user(&ann.id));
        assert_eq!(store.all_users().len(), 1);
        assert_eq!(store.current_user().map(|u| u.id), Some(ann.id));
    }

    #[test]
    fn total_questions_targets_requested_profile() {
        let mut store = store();
        let ann = store.create_user("Ann", None).unwrap();
        let bob = store.create_user("Bob", None).unwrap();

        store.clock_mut().advance(Duration::hours(1));
        let updated = store.set_total_questions(Some(&ann.id), 120).unwrap().unwrap();
        assert_eq!(updated.id, ann.id);
        assert_eq!(updated.progress.total_questions, 120);

        let current = store.current_user().unwrap();
        assert_eq!(current.id, bob.id);
        assert_eq!(current.progress.total_questions, 0);
        assert_eq!(current.last_active, start());
    }

    #[test]
    fn unchanged_total_questions_is_not_rewritten() {
        let mut store = store();
        store.create_user("Ann", None).unwrap();
        store.set_total_questions(None, 50).unwrap();

        store.clock_mut().advance(Duration::hours(1));
        let user = store.set_total_questions(None, 50).unwrap().unwrap();
        assert_eq!(user.last_active, start());
        assert!(matches!(
            store.set_total_questions(Some("nobody"), 50),
            Err(ProfileError::UserNotFound(_))
        ));
    }

    #[test]
    fn to_base36_encodes() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[derive(Debug, Clone)]
    enum Op {
        Complete(QuestionId),
        Uncomplete(QuestionId),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![(0u32..8).prop_map(Op::Complete), (0u32..8).prop_map(Op::Uncomplete)]
    }

    proptest! {
        #[test]
        fn completed_questions_stay_unique_and_counted(ops in prop::collection::vec(op(), 0..40)) {
            let mut store = store();
            store.create_user("Ann", None).unwrap();
            for op in ops {
                match op {
                    Op::Complete(q) => store.mark_question_completed(q).unwrap(),
                    Op::Uncomplete(q) => store.mark_question_incomplete(q).unwrap(),
                };
            }
            let user = store.current_user().unwrap();
            let unique: BTreeSet<_> = user.completed_questions.iter().collect();
            prop_assert_eq!(unique.len(), user.completed_questions.len());
            let count = user.progress.completed_questions as usize;
            prop_assert_eq!(count, user.completed_questions.len());
        }

        #[test]
        fn double_toggle_restores_bookmark_set(
            initial in prop::collection::btree_set(0u32..20, 0..6),
            question in 0u32..20,
        ) {
            let mut store = store();
            store.create_user("Ann", None).unwrap();
            for q in &initial {
                store.toggle_bookmark(*q).unwrap();
            }
            store.toggle_bookmark(question).unwrap();
            let user = store.toggle_bookmark(question).unwrap().unwrap();
            let after: BTreeSet<_> = user.bookmarked_questions.into_iter().collect();
            prop_assert_eq!(after, initial);
        }

        #[test]
        fn average_matches_stored_scores(
            results in prop::collection::vec((0usize..5, 0u32..=100), 1..20),
        ) {
            let mut store = store();
            store.create_user("Ann", None).unwrap();
            for (exam, score) in &results {
                store.save_exam_result(&format!("exam-{exam}"), outcome(*score as f64)).unwrap();
            }
            let user = store.current_user().unwrap();
            let scores: Vec<f64> = user.exam_results.values().map(|r| r.score()).collect();
            let expected = scores.iter().sum::<f64>() / scores.len() as f64;
            prop_assert!((user.progress.average_score - expected).abs() < 1e-9);
            prop_assert_eq!(user.progress.completed_exams as usize, user.exam_results.len());
        }

        #[test]
        fn distinct_names_all_created(names in prop::collection::btree_set("[a-z]{1,8}", 0..10)) {
            let mut store = store();
            for name in &names {
                store.create_user(name, None).unwrap();
            }
            prop_assert_eq!(store.all_users().len(), names.len());
            for name in &names {
                let upper = name.to_uppercase();
                prop_assert!(store.create_user(&upper, None).is_err());
            }
            prop_assert_eq!(store.all_users().len(), names.len());
        }
    }
}
