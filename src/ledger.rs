//! Single-user progress ledger
//!
//! The original flat storage layout, kept for call sites that do not know
//! about profiles. It shares nothing with the profile store except the
//! backing store and the streak rule.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::QuestionId;
use crate::profile::{ExamOutcome, ExamResult};
use crate::store::{JsonStore, KeyValueStore};
use crate::streak::advance_streak;
use crate::time::Clock;

pub const COMPLETED_KEY: &str = "completed_questions";
pub const EXAM_RESULTS_KEY: &str = "exam_results";
pub const PROGRESS_KEY: &str = "progress";
pub const STREAK_KEY: &str = "study_streak";

/// Every key the ledger owns
pub const LEDGER_KEYS: [&str; 4] = [COMPLETED_KEY, EXAM_RESULTS_KEY, PROGRESS_KEY, STREAK_KEY];

/// Aggregate counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerProgress {
    pub completed_questions: u32,
    pub completed_exams: u32,
    pub average_score: f64,
    pub last_activity: Option<DateTime<Utc>>,
}

/// Stored streak
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreakRecord {
    pub count: u32,
    pub last_study_date: Option<DateTime<Utc>>,
}

/// Snapshot of all ledger keys, as raw JSON values
pub type LedgerSnapshot = serde_json::Map<String, serde_json::Value>;

/// Flat progress tracking over a key-value store
#[derive(Debug)]
pub struct ProgressLedger<S> {
    store: JsonStore<S>,
    clock: Clock,
}

impl<S: KeyValueStore> ProgressLedger<S> {
    pub fn new(backend: S) -> Self {
        Self { store: JsonStore::new(backend), clock: Clock::default() }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    /// Completed question IDs in completion order
    pub fn completed(&self) -> Vec<QuestionId> {
        self.store.load_or_default(COMPLETED_KEY)
    }

    pub fn is_completed(&self, question: QuestionId) -> bool {
        self.completed().contains(&question)
    }

    pub fn exam_results(&self) -> BTreeMap<String, ExamResult> {
        self.store.load_or_default(EXAM_RESULTS_KEY)
    }

    pub fn progress(&self) -> LedgerProgress {
        self.store.load_or_default(PROGRESS_KEY)
    }

    pub fn streak(&self) -> StreakRecord {
        self.store.load_or_default(STREAK_KEY)
    }

    fn save_progress(&mut self, update: impl FnOnce(&mut LedgerProgress)) -> bool {
        let mut progress = self.progress();
        update(&mut progress);
        progress.last_activity = Some(self.clock.now());
        self.store.save(PROGRESS_KEY, &progress)
    }

    /// Add a question to the completed list. Returns the list.
    pub fn mark_completed(&mut self, question: QuestionId) -> Vec<QuestionId> {
        let mut completed = self.completed();
        if !completed.contains(&question) {
            completed.push(question);
            self.store.save(COMPLETED_KEY, &completed);
            let count = completed.len() as u32;
            self.save_progress(|p| p.completed_questions = count);
        }
        completed
    }

    /// Remove a question from the completed list. Returns the list.
    pub fn mark_incomplete(&mut self, question: QuestionId) -> Vec<QuestionId> {
        let mut completed = self.completed();
        let len_before = completed.len();
        completed.retain(|&q| q != question);
        if completed.len() < len_before {
            self.store.save(COMPLETED_KEY, &completed);
            let count = completed.len() as u32;
            self.save_progress(|p| p.completed_questions = count);
        }
        completed
    }

    /// Store an exam result, replacing any earlier attempt at the same exam
    pub fn save_exam_result(&mut self, exam_id: &str, outcome: ExamOutcome) -> ExamResult {
        let result = ExamResult { outcome, completed_at: self.clock.now() };
        let mut results = self.exam_results();
        results.insert(exam_id.to_string(), result.clone());
        self.store.save(EXAM_RESULTS_KEY, &results);

        let count = results.len() as u32;
        let average = results.values().map(ExamResult::score).sum::<f64>() / f64::from(count);
        self.save_progress(|p| {
            p.completed_exams = count;
            p.average_score = average;
        });
        result
    }

    /// Advance the streak for today and return it
    pub fn update_streak(&mut self) -> u32 {
        let mut record = self.streak();
        let last = record.last_study_date.map(|at| self.clock.day_of(at));
        let update = advance_streak(record.count, last, self.clock.today());
        if update.restamp {
            record.count = update.streak;
            record.last_study_date = Some(self.clock.now());
            self.store.save(STREAK_KEY, &record);
        }
        update.streak
    }

    /// Raw JSON of every ledger key that is set
    pub fn export_all(&self) -> LedgerSnapshot {
        LEDGER_KEYS
            .iter()
            .filter_map(|&key| {
                let value = self.store.load::<Option<serde_json::Value>>(key, None)?;
                Some((key.to_string(), value))
            })
            .collect()
    }

    /// Write back a snapshot. Only ledger keys are touched; anything else in
    /// the snapshot is ignored. Returns the number of keys written.
    pub fn import_all(&mut self, snapshot: &LedgerSnapshot) -> usize {
        let mut written = 0;
        for key in LEDGER_KEYS {
            if let Some(value) = snapshot.get(key) {
                if self.store.save(key, value) {
                    written += 1;
                }
            }
        }
        tracing::info!(written, "Imported ledger snapshot");
        written
    }

    /// Remove every ledger key
    pub fn clear_all(&mut self) -> bool {
        LEDGER_KEYS.iter().fold(true, |ok, key| self.store.remove(key) && ok)
    }
}
