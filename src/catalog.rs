//! Question catalog
//!
//! Static interview questions grouped by category. The progress stores only
//! ever reference questions by ID; the catalog itself is read-only.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Identifier of a catalog question
pub type QuestionId = u32;

/// A single interview question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub question: String,
    pub answer: String,
    /// Optional code sample shown with the question
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Multiple-choice options, if the question can appear in an exam
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Index into `options` of the right answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_option: Option<usize>,
}

impl Question {
    /// True if the question has options and a valid correct index
    pub fn is_multiple_choice(&self) -> bool {
        self.correct_option.is_some_and(|i| i < self.options.len())
    }
}

/// A named group of questions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Category {
    /// Questions usable in a multiple-choice exam
    pub fn exam_questions(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter().filter(|q| q.is_multiple_choice())
    }
}

/// The whole question bank
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionCatalog {
    pub categories: Vec<Category>,
}

impl QuestionCatalog {
    /// Load a catalog from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog from {:?}", path))?;
        Self::from_json(&contents).with_context(|| format!("Failed to parse catalog {:?}", path))
    }

    /// Parse a catalog from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Total number of questions across categories
    pub fn total_questions(&self) -> usize {
        self.categories.iter().map(|c| c.questions.len()).sum()
    }

    /// Find a category by ID
    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Find a question by ID in any category
    pub fn find_question(&self, id: QuestionId) -> Option<&Question> {
        self.categories.iter().flat_map(|c| c.questions.iter()).find(|q| q.id == id)
    }

    /// Every question ID, in catalog order
    pub fn question_ids(&self) -> Vec<QuestionId> {
        self.categories.iter().flat_map(|c| c.questions.iter().map(|q| q.id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"{
        "categories": [
            {
                "id": "core-concepts",
                "title": "Core Concepts",
                "questions": [
                    { "id": 1, "question": "What is hoisting?", "answer": "Declarations move up." },
                    {
                        "id": 2,
                        "question": "typeof null?",
                        "answer": "object",
                        "code": "typeof null",
                        "tags": ["types"],
                        "options": ["null", "object", "undefined"],
                        "correctOption": 1
                    }
                ]
            },
            {
                "id": "async",
                "title": "Async",
                "questions": [
                    { "id": 10, "question": "What is a promise?", "answer": "A future value." }
                ]
            }
        ]
    }"#;

    #[test]
    fn parses_and_counts() {
        let catalog = QuestionCatalog::from_json(SAMPLE).unwrap();
        assert_eq!(catalog.total_questions(), 3);
        assert_eq!(catalog.question_ids(), vec![1, 2, 10]);
    }

    #[test]
    fn finds_questions_and_categories() {
        let catalog = QuestionCatalog::from_json(SAMPLE).unwrap();
        assert_eq!(catalog.find_question(10).unwrap().question, "What is a promise?");
        assert!(catalog.find_question(99).is_none());
        assert_eq!(catalog.category("async").unwrap().title, "Async");
        assert!(catalog.category("dom").is_none());
    }

    #[test]
    fn only_valid_choices_are_exam_questions() {
        let catalog = QuestionCatalog::from_json(SAMPLE).unwrap();
        let core = catalog.category("core-concepts").unwrap();
        let ids: Vec<_> = core.exam_questions().map(|q| q.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{SAMPLE}").unwrap();
        let catalog = QuestionCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.categories.len(), 2);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = QuestionCatalog::load(Path::new("/nonexistent/catalog.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read catalog"));
    }
}
