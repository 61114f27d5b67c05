//! Recovering correct answers from a form payload.

use crate::blob::{AnswerRecord, Field, FormBlob, QuestionRecord};
use crate::types::{AnswerSet, AnswerStrategy, ResolvedQuestion, ToolkitError, ToolkitResult};

/// Validation rule (type, match mode) pairs whose expected value is usable.
const VALUE_RULES: &[(f64, f64)] = &[
    // number, equal to
    (1.0, 5.0),
    // text, contains
    (2.0, 100.0),
];

/// Walk the question list of `blob` and resolve each question's answers.
///
/// Questions without a title or without an answer record are skipped.
/// Questions whose answers cannot be recovered are returned with an empty
/// [`AnswerSet`] so callers can count them.
pub fn resolve_answers(blob: &FormBlob) -> ToolkitResult<Vec<ResolvedQuestion>> {
    let questions = blob
        .question_list()
        .ok_or(ToolkitError::StructureNotRecognized)?;

    let mut resolved = Vec::new();
    for (index, field) in questions.items().enumerate() {
        let question = QuestionRecord(field);
        let Some(title) = question.title() else {
            continue;
        };
        let Some(answer) = question.primary_answer() else {
            continue;
        };

        let kind = question.kind();
        let (answers, strategy) = correct_answers(answer);
        let id = answer.id();
        tracing::debug!(
            index,
            title,
            ?kind,
            id = id.as_deref().unwrap_or("-"),
            ?answers,
            "Resolved question"
        );

        resolved.push(ResolvedQuestion {
            id,
            title: title.to_string(),
            kind,
            answers,
            strategy,
        });
    }

    Ok(resolved)
}

/// Try each strategy in turn; the first non-empty answer set wins.
pub fn correct_answers(answer: AnswerRecord<'_>) -> (AnswerSet, Option<AnswerStrategy>) {
    let strategies: [(AnswerStrategy, fn(AnswerRecord) -> AnswerSet); 3] = [
        (AnswerStrategy::GradingData, from_grading_data),
        (AnswerStrategy::ChoiceFlag, from_choice_flags),
        (AnswerStrategy::ValidationRule, from_validation_rule),
    ];

    for (strategy, run) in strategies {
        let answers = run(answer);
        if !answers.is_empty() {
            return (answers, Some(strategy));
        }
    }
    (Vec::new(), None)
}

/// `grading[0]` is a list of correct-answer infos; each info's slot 1 is a
/// correct value. Only string values count: a number there is a flag.
fn from_grading_data(answer: AnswerRecord<'_>) -> AnswerSet {
    answer
        .grading()
        .at(0)
        .items()
        .filter_map(|info| info.at(1).as_text().map(str::to_string))
        .collect()
}

fn from_choice_flags(answer: AnswerRecord<'_>) -> AnswerSet {
    answer
        .choices()
        .filter(|choice| choice.is_correct())
        .filter_map(|choice| choice.value())
        .collect()
}

/// `grading[0]` read as a `[type, mode, [expected, ...]]` rule.
fn from_validation_rule(answer: AnswerRecord<'_>) -> AnswerSet {
    let rule = answer.grading().at(0);
    let Some(items) = rule.as_list() else {
        return Vec::new();
    };
    if items.len() < 3 {
        return Vec::new();
    }

    let matches_rule = VALUE_RULES
        .iter()
        .any(|(kind, mode)| rule.at(0).is_number(*kind) && rule.at(1).is_number(*mode));
    let expected = rule.at(2);
    if !matches_rule || !matches!(expected, Field::List(_)) {
        return Vec::new();
    }

    expected.at(0).stringify().into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QuestionType;
    use serde_json::json;

    fn resolve(value: serde_json::Value) -> Vec<ResolvedQuestion> {
        resolve_answers(&FormBlob::new(value)).unwrap()
    }

    #[test]
    fn test_worked_example_resolves_flagged_choice() {
        let blob = json!([null,[null,[[null,"Q1",null,2,[["qid1",[["A",0,0,0,0],["B",0,0,0,1]],0,0,[[["B",1]]]]]]]]]);
        let questions = resolve(blob);
        assert_eq!(questions.len(), 1);
        let q = &questions[0];
        assert_eq!(q.title, "Q1");
        assert_eq!(q.id.as_deref(), Some("qid1"));
        assert_eq!(q.kind, QuestionType::MultipleChoice);
        assert_eq!(q.answers, vec!["B".to_string()]);
        assert_eq!(q.strategy, Some(AnswerStrategy::ChoiceFlag));
    }

    #[test]
    fn test_choice_flag_on_third_choice() {
        let blob = json!([null,[null,[[null,"Pick",null,2,[[1,[["x",0,0,0,0],["y",0,0,0,0],["z",0,0,0,1]]]]]]]]);
        let questions = resolve(blob);
        assert_eq!(questions[0].answers, vec!["z".to_string()]);
        assert_eq!(questions[0].id.as_deref(), Some("1"));
    }

    #[test]
    fn test_grading_data_strings_win() {
        let blob = json!([null,[null,[[null,"Q",null,4,[["id",[["a",0,0,0,1]],0,0,[[[0,"b"],[0,"c"]]]]]]]]]);
        let q = &resolve(blob)[0];
        assert_eq!(q.answers, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(q.strategy, Some(AnswerStrategy::GradingData));
    }

    #[test]
    fn test_validation_rules() {
        let numeric = json!([null,[null,[[null,"Code",null,0,[["id",null,0,0,[[1,5,[42]]]]]]]]]);
        let q = &resolve(numeric)[0];
        assert_eq!(q.answers, vec!["42".to_string()]);
        assert_eq!(q.strategy, Some(AnswerStrategy::ValidationRule));

        let contains = json!([null,[null,[[null,"Pass",null,0,[["id",null,0,0,[[2,100,["open sesame"]]]]]]]]]);
        assert_eq!(resolve(contains)[0].answers, vec!["open sesame".to_string()]);

        let other_rule = json!([null,[null,[[null,"Len",null,0,[["id",null,0,0,[[6,202,["10"]]]]]]]]]);
        let q = &resolve(other_rule)[0];
        assert!(q.answers.is_empty());
        assert_eq!(q.strategy, None);
    }

    #[test]
    fn test_malformed_questions_are_skipped_not_errors() {
        let blob = json!([null,[null,[
            null,
            [null,"",null,2,[["id"]]],
            [null,"No answers",null,2],
            [null,"Empty answers",null,2,[]],
            "not a record",
            [null,"Kept",null,0,[["id2",5,0,0,"junk"]]]
        ]]]);
        let questions = resolve(blob);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].title, "Kept");
        assert!(questions[0].answers.is_empty());
    }

    #[test]
    fn test_shallow_layout() {
        let blob = json!([[null,[[null,"Q",null,2,[["i",[["A",0,0,0,1]]]]]]]]);
        assert_eq!(resolve(blob)[0].answers, vec!["A".to_string()]);
    }

    #[test]
    fn test_unrecognized_structure() {
        let err = resolve_answers(&FormBlob::new(json!([1, 2, 3]))).unwrap_err();
        assert!(matches!(err, ToolkitError::StructureNotRecognized));
        assert_eq!(
            err.to_string(),
            "Form data structure not recognized. This may not be a quiz form."
        );
    }
}
