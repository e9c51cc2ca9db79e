//! Profile records
//!
//! Field names serialize in camelCase so exported files stay compatible with
//! the browser build of the study app.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::QuestionId;
use crate::time::Clock;

/// Version tag written into export files
pub const EXPORT_VERSION: &str = "1.0";

const AVATAR_COLORS: [&str; 8] =
    ["#f87171", "#fb923c", "#facc15", "#4ade80", "#2dd4bf", "#60a5fa", "#a78bfa", "#f472b6"];

/// Display initials and color derived from the username
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Avatar {
    pub initials: String,
    pub color: String,
}

impl Avatar {
    /// Initials of the first two words, color picked by username length
    pub fn for_username(username: &str) -> Self {
        let initials: String = username
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect();
        let color = AVATAR_COLORS[username.chars().count() % AVATAR_COLORS.len()];
        Self { initials, color: color.to_string() }
    }
}

/// Display preferences. Stored as-is; the core never acts on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub theme: String,
    pub notifications: bool,
    pub auto_save: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self { theme: "light".to_string(), notifications: true, auto_save: true }
    }
}

/// Aggregate counters kept alongside the raw collections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressSummary {
    /// Size of the question catalog, when known
    pub total_questions: u32,
    /// Mirrors `UserProfile::completed_questions.len()`
    pub completed_questions: u32,
    pub total_exams: u32,
    /// Mirrors `UserProfile::exam_results.len()`
    pub completed_exams: u32,
    /// Mean of all exam scores, 0 when there are none
    pub average_score: f64,
    pub study_streak: u32,
    pub last_study_date: Option<DateTime<Utc>>,
    /// Seconds
    pub total_study_time: u64,
}

/// What a finished exam reports, before it is stamped and stored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExamOutcome {
    /// Percentage, 0-100
    pub score: f64,
    pub correct: u32,
    pub total: u32,
    /// Seconds
    pub time_spent: u64,
    /// Question ID (as a string key) -> chosen option index
    pub answers: BTreeMap<String, usize>,
    pub questions: Vec<QuestionId>,
}

/// Stored exam result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    #[serde(flatten)]
    pub outcome: ExamOutcome,
    pub completed_at: DateTime<Utc>,
}

impl ExamResult {
    pub fn score(&self) -> f64 {
        self.outcome.score
    }
}

/// Entry in the append-only study log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StudyEvent {
    QuestionCompleted { question_id: QuestionId, timestamp: DateTime<Utc> },
    ExamCompleted { exam_id: String, score: f64, timestamp: DateTime<Utc> },
}

impl StudyEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            StudyEvent::QuestionCompleted { timestamp, .. }
            | StudyEvent::ExamCompleted { timestamp, .. } => *timestamp,
        }
    }
}

/// A local study profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub avatar: Avatar,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub progress: ProgressSummary,
    #[serde(default)]
    pub completed_questions: Vec<QuestionId>,
    #[serde(default)]
    pub bookmarked_questions: Vec<QuestionId>,
    #[serde(default)]
    pub exam_results: BTreeMap<String, ExamResult>,
    /// Populated by the presentation layer only
    #[serde(default)]
    pub achievements: Vec<serde_json::Value>,
    #[serde(default)]
    pub study_history: Vec<StudyEvent>,
}

impl UserProfile {
    /// Fresh profile with empty collections and zeroed progress
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        email: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let username = username.into();
        Self {
            id: id.into(),
            avatar: Avatar::for_username(&username),
            username,
            email,
            created_at: now,
            last_active: now,
            settings: Settings::default(),
            progress: ProgressSummary::default(),
            completed_questions: Vec::new(),
            bookmarked_questions: Vec::new(),
            exam_results: BTreeMap::new(),
            achievements: Vec::new(),
            study_history: Vec::new(),
        }
    }

    pub fn is_completed(&self, question: QuestionId) -> bool {
        self.completed_questions.contains(&question)
    }

    pub fn is_bookmarked(&self, question: QuestionId) -> bool {
        self.bookmarked_questions.contains(&question)
    }

    /// Add `question` to the completed set. Returns false if already present.
    pub fn complete(&mut self, question: QuestionId, now: DateTime<Utc>) -> bool {
        if self.is_completed(question) {
            return false;
        }
        self.completed_questions.push(question);
        self.progress.completed_questions = self.completed_questions.len() as u32;
        self.study_history
            .push(StudyEvent::QuestionCompleted { question_id: question, timestamp: now });
        true
    }

    /// Remove `question` from the completed set. Returns false if absent.
    pub fn uncomplete(&mut self, question: QuestionId) -> bool {
        let len_before = self.completed_questions.len();
        self.completed_questions.retain(|&q| q != question);
        self.progress.completed_questions = self.completed_questions.len() as u32;
        self.completed_questions.len() < len_before
    }

    /// Flip bookmark membership. Returns the new state.
    pub fn toggle_bookmark(&mut self, question: QuestionId) -> bool {
        if self.is_bookmarked(question) {
            self.bookmarked_questions.retain(|&q| q != question);
            false
        } else {
            self.bookmarked_questions.push(question);
            true
        }
    }

    /// Store an exam result, replacing any earlier attempt at the same exam
    pub fn record_exam(&mut self, exam_id: &str, outcome: ExamOutcome, now: DateTime<Utc>) {
        let score = outcome.score;
        self.exam_results
            .insert(exam_id.to_string(), ExamResult { outcome, completed_at: now });
        self.recompute_exam_stats();
        self.study_history.push(StudyEvent::ExamCompleted {
            exam_id: exam_id.to_string(),
            score,
            timestamp: now,
        });
    }

    /// Rebuild exam counters from the stored results
    ///
    /// Always a full scan: a running mean would drift when a retake replaces
    /// an earlier score.
    pub fn recompute_exam_stats(&mut self) {
        self.progress.completed_exams = self.exam_results.len() as u32;
        self.progress.average_score = mean(self.exam_results.values().map(ExamResult::score));
    }

    /// Repair counters and drop duplicate IDs, keeping first occurrences
    pub fn normalize(&mut self) {
        dedup_in_order(&mut self.completed_questions);
        dedup_in_order(&mut self.bookmarked_questions);
        self.progress.completed_questions = self.completed_questions.len() as u32;
        self.recompute_exam_stats();
    }

    /// Number of distinct calendar days, in `clock`'s zone, with any study activity
    pub fn total_study_days(&self, clock: &Clock) -> usize {
        self.study_history
            .iter()
            .map(|event| clock.day_of(event.timestamp()))
            .collect::<BTreeSet<_>>()
            .len()
    }
}

fn mean(scores: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = scores.fold((0.0, 0usize), |(sum, count), s| (sum + s, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn dedup_in_order(ids: &mut Vec<QuestionId>) {
    let mut seen = BTreeSet::new();
    ids.retain(|id| seen.insert(*id));
}

/// Portable snapshot of one profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserExport {
    pub user: UserProfile,
    pub exported_at: DateTime<Utc>,
    pub version: String,
}

/// Derived statistics for a profile
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    #[serde(flatten)]
    pub progress: ProgressSummary,
    pub total_study_days: usize,
    /// Whole days since the profile was created
    pub account_age: i64,
    pub last_active: DateTime<Utc>,
}
