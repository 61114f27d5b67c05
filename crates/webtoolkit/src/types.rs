//! Core data types shared by the extraction and form engines.

use scraper::ElementRef;
use serde::{Deserialize, Serialize};

/// Result of one capture pass over a page.
///
/// `text` and `html` are always present. A failed pass yields empty strings
/// and a populated `error` instead of an `Err`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: String,
    pub html: String,
    pub url: String,
    pub title: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionResult {
    /// Degraded result carrying only page metadata and the failure reason.
    pub fn degraded(url: &str, title: &str, domain: &str, error: String) -> Self {
        Self {
            text: String::new(),
            html: String::new(),
            url: url.to_string(),
            title: title.to_string(),
            domain: domain.to_string(),
            error: Some(error),
        }
    }
}

/// A candidate subtree and its heuristic score. Lives for one extraction pass.
#[derive(Debug, Clone, Copy)]
pub struct ScoredCandidate<'a> {
    pub element: ElementRef<'a>,
    pub score: f64,
}

/// Question kinds encoded at index 3 of a question record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    ShortText,
    LongText,
    MultipleChoice,
    Dropdown,
    Checkboxes,
    Other(Option<i64>),
}

impl QuestionType {
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(0) => QuestionType::ShortText,
            Some(1) => QuestionType::LongText,
            Some(2) => QuestionType::MultipleChoice,
            Some(3) => QuestionType::Dropdown,
            Some(4) => QuestionType::Checkboxes,
            other => QuestionType::Other(other),
        }
    }
}

/// Resolved correct values for one question, in blob encounter order.
pub type AnswerSet = Vec<String>;

/// Which resolver strategy produced an answer set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStrategy {
    GradingData,
    ChoiceFlag,
    ValidationRule,
}

/// One question of a form blob together with its resolved answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedQuestion {
    pub id: Option<String>,
    pub title: String,
    pub kind: QuestionType,
    pub answers: AnswerSet,
    pub strategy: Option<AnswerStrategy>,
}

/// Errors that can occur in the toolkit engines.
#[derive(thiserror::Error, Debug)]
pub enum ToolkitError {
    #[error("Invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    #[error("Script literal evaluation failed: {0}")]
    Evaluation(String),

    #[error("Form data structure not recognized. This may not be a quiz form.")]
    StructureNotRecognized,

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("No entries selected for merging.")]
    NothingSelected,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type.
pub type ToolkitResult<T> = Result<T, ToolkitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_type_codes() {
        assert_eq!(QuestionType::from_code(Some(2)), QuestionType::MultipleChoice);
        assert_eq!(QuestionType::from_code(Some(4)), QuestionType::Checkboxes);
        assert_eq!(QuestionType::from_code(Some(9)), QuestionType::Other(Some(9)));
        assert_eq!(QuestionType::from_code(None), QuestionType::Other(None));
    }

    #[test]
    fn test_extraction_result_omits_missing_error() {
        let result = ExtractionResult::default();
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("error").is_none());
        assert_eq!(value["text"], "");
    }
}
