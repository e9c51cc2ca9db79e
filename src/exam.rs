//! Multiple-choice exam grading

use std::collections::BTreeMap;

use crate::catalog::{Category, QuestionId};
use crate::profile::ExamOutcome;

/// Chosen option index per question
pub type ExamAnswers = BTreeMap<QuestionId, usize>;

/// Grade `answers` against the multiple-choice questions of `category`
///
/// Unanswered questions count as wrong. The score is a percentage rounded to
/// one decimal place, 0 for a category with no gradable questions.
pub fn grade_exam(category: &Category, answers: &ExamAnswers, time_spent: u64) -> ExamOutcome {
    let questions: Vec<QuestionId> = category.exam_questions().map(|q| q.id).collect();
    let correct = category
        .exam_questions()
        .filter(|q| answers.get(&q.id).copied() == q.correct_option)
        .count() as u32;
    let total = questions.len() as u32;

    let score = if total == 0 {
        0.0
    } else {
        (f64::from(correct) / f64::from(total) * 1000.0).round() / 10.0
    };

    ExamOutcome {
        score,
        correct,
        total,
        time_spent,
        answers: answers
            .iter()
            .filter(|(id, _)| questions.contains(id))
            .map(|(id, choice)| (id.to_string(), *choice))
            .collect(),
        questions,
    }
}
