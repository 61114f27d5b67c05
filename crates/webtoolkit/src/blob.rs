//! Typed views over the untyped form payload.
//!
//! The payload is a deeply nested heterogeneous array whose meaning is
//! purely positional. [`Field`] is the sum type for one slot; every accessor
//! returns another `Field` (or an `Option`), so a payload of the wrong shape
//! reads as "missing" instead of failing.

use serde_json::{Map, Number, Value};

use crate::types::QuestionType;

/// One slot of the payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    Missing,
    Null,
    Text(&'a str),
    Number(&'a Number),
    Flag(bool),
    List(&'a [Value]),
    Record(&'a Map<String, Value>),
}

impl<'a> Field<'a> {
    pub fn of(value: Option<&'a Value>) -> Self {
        match value {
            None => Field::Missing,
            Some(Value::Null) => Field::Null,
            Some(Value::String(s)) => Field::Text(s),
            Some(Value::Number(n)) => Field::Number(n),
            Some(Value::Bool(b)) => Field::Flag(*b),
            Some(Value::Array(items)) => Field::List(items),
            Some(Value::Object(map)) => Field::Record(map),
        }
    }

    /// Element `index` of a list; `Missing` for anything else.
    pub fn at(self, index: usize) -> Field<'a> {
        match self {
            Field::List(items) => Field::of(items.get(index)),
            _ => Field::Missing,
        }
    }

    pub fn is_missing_or_null(self) -> bool {
        matches!(self, Field::Missing | Field::Null)
    }

    pub fn as_list(self) -> Option<&'a [Value]> {
        match self {
            Field::List(items) => Some(items),
            _ => None,
        }
    }

    /// Iterate the elements of a list; empty for anything else.
    pub fn items(self) -> impl Iterator<Item = Field<'a>> {
        self.as_list()
            .unwrap_or_default()
            .iter()
            .map(|v| Field::of(Some(v)))
    }

    pub fn as_text(self) -> Option<&'a str> {
        match self {
            Field::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(self) -> Option<f64> {
        match self {
            Field::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        match self {
            Field::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            _ => None,
        }
    }

    /// True when the slot holds the number `n`.
    pub fn is_number(self, n: f64) -> bool {
        self.as_f64() == Some(n)
    }

    /// Scalar rendered as a string; `None` for null, missing and containers.
    pub fn stringify(self) -> Option<String> {
        match self {
            Field::Text(s) => Some(s.to_string()),
            Field::Number(n) => Some(n.to_string()),
            Field::Flag(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// The recovered form payload.
#[derive(Debug, Clone, PartialEq)]
pub struct FormBlob(Value);

impl FormBlob {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn root(&self) -> Field<'_> {
        Field::of(Some(&self.0))
    }

    /// The question list, trying `root[1][1]` and then `root[0][1]`.
    pub fn question_list(&self) -> Option<Field<'_>> {
        let root = self.root();
        [root.at(1).at(1), root.at(0).at(1)]
            .into_iter()
            .find(|f| matches!(f, Field::List(_)))
    }
}

/// `[_, title, _, type, [AnswerRecord, ...], ...]`
#[derive(Debug, Clone, Copy)]
pub struct QuestionRecord<'a>(pub Field<'a>);

impl<'a> QuestionRecord<'a> {
    /// Non-empty title string.
    pub fn title(self) -> Option<&'a str> {
        self.0.at(1).as_text().filter(|t| !t.is_empty())
    }

    pub fn kind(self) -> QuestionType {
        QuestionType::from_code(self.0.at(3).as_i64())
    }

    /// The first answer record, which is authoritative.
    pub fn primary_answer(self) -> Option<AnswerRecord<'a>> {
        let first = self.0.at(4).at(0);
        (!first.is_missing_or_null()).then_some(AnswerRecord(first))
    }
}

/// `[id, [Choice, ...], _, _, grading-or-rule, ...]`
#[derive(Debug, Clone, Copy)]
pub struct AnswerRecord<'a>(pub Field<'a>);

impl<'a> AnswerRecord<'a> {
    pub fn id(self) -> Option<String> {
        self.0.at(0).stringify()
    }

    pub fn choices(self) -> impl Iterator<Item = ChoiceRecord<'a>> {
        self.0.at(1).items().map(ChoiceRecord)
    }

    /// Slot 4: either grading data or a validation rule container.
    pub fn grading(self) -> Field<'a> {
        self.0.at(4)
    }
}

/// `[value, _, _, _, correct-flag]`
#[derive(Debug, Clone, Copy)]
pub struct ChoiceRecord<'a>(pub Field<'a>);

impl<'a> ChoiceRecord<'a> {
    pub fn value(self) -> Option<String> {
        self.0.at(0).stringify()
    }

    pub fn is_correct(self) -> bool {
        self.0.at(4).is_number(1.0)
    }
}
