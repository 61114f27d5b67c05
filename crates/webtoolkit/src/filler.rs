//! Type-specific fill actions for one question container.

use std::sync::OnceLock;
use std::time::Duration;

use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};

use crate::adapter::{ControlHandle, FormControlAdapter};
use crate::container::find_question_container;
use crate::page::{self, Page};
use crate::types::{QuestionType, ResolvedQuestion};

/// Delay before looking for a custom dropdown's rendered options.
pub const DEFAULT_DROPDOWN_SETTLE: Duration = Duration::from_millis(300);

const CHOICE_SELECTORS: &[&str] = &[
    "[data-value]",
    "[role=\"radio\"]",
    ".docssharedWizToggleLabeledContainer",
    ".nWQGrd",
    "label",
];

const CHECKBOX_SELECTORS: &[&str] = &[
    "[data-answer-value]",
    "[role=\"checkbox\"]",
    ".docssharedWizToggleLabeledContainer",
    ".nWQGrd",
    "label",
];

const TEXT_SELECTORS: &[&str] = &[
    "input[type=\"text\"]",
    "textarea",
    ".whsOnd",
    ".KHxj8b",
    "[role=\"textbox\"]",
    "input:not([type=\"hidden\"]):not([type=\"radio\"]):not([type=\"checkbox\"])",
];

const DROPDOWN_TRIGGER: &str = "[role=\"listbox\"], .MocG8c, .quantumWizMenuPaperselectEl, select";
const DROPDOWN_OPTIONS: &str = "[role=\"option\"], [data-value], .OA0qNb";

struct FillerSelectors {
    choices: Vec<Selector>,
    checkboxes: Vec<Selector>,
    text: Vec<Selector>,
    trigger: Selector,
    options: Selector,
    native_option: Selector,
}

fn selectors() -> Option<&'static FillerSelectors> {
    static SELECTORS: OnceLock<Option<FillerSelectors>> = OnceLock::new();
    SELECTORS
        .get_or_init(|| {
            Some(FillerSelectors {
                choices: page::compile_selectors(CHOICE_SELECTORS).ok()?,
                checkboxes: page::compile_selectors(CHECKBOX_SELECTORS).ok()?,
                text: page::compile_selectors(TEXT_SELECTORS).ok()?,
                trigger: Selector::parse(DROPDOWN_TRIGGER).ok()?,
                options: Selector::parse(DROPDOWN_OPTIONS).ok()?,
                native_option: Selector::parse("option").ok()?,
            })
        })
        .as_ref()
}

/// What happened to one question during a fill pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum FillStatus {
    Filled { count: usize },
    NoAnswers,
    ContainerNotFound,
    NothingMatched,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub title: String,
    #[serde(flatten)]
    pub status: FillStatus,
}

/// Totals for a whole form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillReport {
    /// Questions that had a title and an answer record.
    pub total_questions: usize,
    /// Sum of per-question fill counts.
    pub answered_count: usize,
    pub questions: Vec<QuestionOutcome>,
}

/// Applies resolved answers to a page through an adapter.
pub struct FormFiller<'p, A: FormControlAdapter> {
    page: &'p Page,
    adapter: A,
    dropdown_settle: Duration,
}

impl<'p, A: FormControlAdapter> FormFiller<'p, A> {
    pub fn new(page: &'p Page, adapter: A) -> Self {
        Self {
            page,
            adapter,
            dropdown_settle: DEFAULT_DROPDOWN_SETTLE,
        }
    }

    pub fn with_dropdown_settle(mut self, delay: Duration) -> Self {
        self.dropdown_settle = delay;
        self
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn into_adapter(self) -> A {
        self.adapter
    }

    /// Locate and fill every question.
    pub fn fill_all(&mut self, questions: &[ResolvedQuestion]) -> FillReport {
        let mut report = FillReport {
            total_questions: questions.len(),
            ..FillReport::default()
        };

        for question in questions {
            let status = self.fill_question(question);
            if let FillStatus::Filled { count } = status {
                report.answered_count += count;
            }
            report.questions.push(QuestionOutcome {
                title: question.title.clone(),
                status,
            });
        }

        tracing::info!(
            answered = report.answered_count,
            total = report.total_questions,
            "Form fill pass complete"
        );
        report
    }

    /// Locate one question's container and fill it.
    pub fn fill_question(&mut self, question: &ResolvedQuestion) -> FillStatus {
        if question.answers.is_empty() {
            tracing::debug!(title = %question.title, "No answers found, skipping");
            return FillStatus::NoAnswers;
        }

        let page = self.page;
        let Some(container) = find_question_container(page, question.id.as_deref(), &question.title)
        else {
            tracing::warn!(title = %question.title, "Container not found");
            return FillStatus::ContainerNotFound;
        };

        match self.fill(container, question.kind, &question.answers) {
            0 => FillStatus::NothingMatched,
            count => FillStatus::Filled { count },
        }
    }

    /// Fill `container` for a question of `kind`; returns the filled count.
    pub fn fill(&mut self, container: ElementRef<'p>, kind: QuestionType, answers: &[String]) -> usize {
        let Some(first) = answers.first() else {
            return 0;
        };

        match kind {
            QuestionType::MultipleChoice => self.fill_choice(container, answers),
            QuestionType::Checkboxes => self.fill_checkboxes(container, answers),
            QuestionType::ShortText | QuestionType::LongText => self.fill_text(container, first),
            QuestionType::Dropdown => self.fill_dropdown(container, first),
            QuestionType::Other(code) => {
                tracing::debug!(?code, "Unknown question type, trying choice then text");
                match self.fill_choice(container, answers) {
                    0 => self.fill_text(container, first),
                    n => n,
                }
            }
        }
    }

    fn fill_choice(&mut self, container: ElementRef<'p>, answers: &[String]) -> usize {
        let Some(selectors) = selectors() else {
            return 0;
        };

        for selector in &selectors.choices {
            for option in container.select(selector) {
                let data_value = option.value().attr("data-value").unwrap_or("");
                let text = page::text_content(option);
                let text = text.trim();

                let hit = answers.iter().any(|answer| {
                    !answer.is_empty() && (data_value == answer.as_str() || loosely_matches(text, answer))
                });
                if hit {
                    let shown = if data_value.is_empty() { text } else { data_value };
                    tracing::debug!(option = shown, "Radio");
                    self.adapter.click(&ControlHandle::of(option));
                    return 1;
                }
            }
        }
        0
    }

    fn fill_checkboxes(&mut self, container: ElementRef<'p>, answers: &[String]) -> usize {
        let Some(selectors) = selectors() else {
            return 0;
        };

        let mut filled = 0;
        for selector in &selectors.checkboxes {
            for option in container.select(selector) {
                let attrs = option.value();
                let text = page::text_content(option);
                let check = attrs
                    .attr("data-answer-value")
                    .filter(|v| !v.is_empty())
                    .or_else(|| attrs.attr("data-value").filter(|v| !v.is_empty()))
                    .unwrap_or_else(|| text.trim());

                if answers
                    .iter()
                    .any(|answer| !answer.is_empty() && loosely_matches(check, answer))
                {
                    tracing::debug!(option = check, "Checkbox");
                    self.adapter.click(&ControlHandle::of(option));
                    filled += 1;
                }
            }
            if filled > 0 {
                break;
            }
        }
        filled
    }

    fn fill_text(&mut self, container: ElementRef<'p>, answer: &str) -> usize {
        let Some(selectors) = selectors() else {
            return 0;
        };

        let input = selectors
            .text
            .iter()
            .find_map(|selector| container.select(selector).next());
        match input {
            Some(input) => {
                tracing::debug!(answer, "Text");
                self.adapter.set_value(&ControlHandle::of(input), answer);
                1
            }
            None => 0,
        }
    }

    fn fill_dropdown(&mut self, container: ElementRef<'p>, answer: &str) -> usize {
        let Some(selectors) = selectors() else {
            return 0;
        };
        let Some(trigger) = container.select(&selectors.trigger).next() else {
            return 0;
        };

        if trigger.value().name() == "select" {
            for option in trigger.select(&selectors.native_option) {
                let text = page::text_content(option);
                if !answer.is_empty() && (text.trim() == answer || text.contains(answer)) {
                    let value = option
                        .value()
                        .attr("value")
                        .map_or_else(|| text.trim().to_string(), str::to_string);
                    tracing::debug!(answer, "Dropdown (native)");
                    self.adapter.select_option(&ControlHandle::of(trigger), &value);
                    return 1;
                }
            }
            return 0;
        }

        self.adapter.click(&ControlHandle::of(trigger));
        self.adapter.settle(self.dropdown_settle);

        let page_root = self.page.document().root_element();
        let option = [container, page_root].into_iter().find_map(|scope| {
            scope.select(&selectors.options).find(|option| {
                let dv = option.value().attr("data-value").unwrap_or("");
                let text = page::text_content(*option);
                let text = text.trim();
                !answer.is_empty() && (dv == answer || text == answer || text.contains(answer))
            })
        });

        match option {
            Some(option) => {
                tracing::debug!(answer, "Dropdown (custom)");
                self.adapter.click(&ControlHandle::of(option));
                1
            }
            None => {
                tracing::debug!(answer, "Dropdown opened but no option matched");
                0
            }
        }
    }
}

/// Equal, contains, or is contained by (the last only for texts longer than
/// one character, so single letters do not match everything).
fn loosely_matches(candidate: &str, answer: &str) -> bool {
    if candidate.is_empty() {
        return false;
    }
    candidate == answer
        || candidate.contains(answer)
        || (answer.contains(candidate) && candidate.chars().count() > 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{FillAction, RecordingAdapter};
    use crate::types::AnswerStrategy;

    fn container<'a>(page: &'a Page, css: &str) -> ElementRef<'a> {
        page.document().select(&Selector::parse(css).unwrap()).next().unwrap()
    }

    fn answers(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_choice_clicks_matching_option() {
        let page = Page::parse(
            r#"<body><div id="q"><div role="radio">A</div><div role="radio">B</div></div></body>"#,
            "",
        );
        let mut filler = FormFiller::new(&page, RecordingAdapter::new());
        let filled = filler.fill(container(&page, "#q"), QuestionType::MultipleChoice, &answers(&["B"]));
        assert_eq!(filled, 1);
        assert_eq!(filler.adapter().clicked(), vec!["B"]);
    }

    #[test]
    fn test_choice_single_letter_is_not_contained_by() {
        let page = Page::parse(
            r#"<body><div id="q"><label>a</label><label>Paris</label></div></body>"#,
            "",
        );
        let mut filler = FormFiller::new(&page, RecordingAdapter::new());
        let filled = filler.fill(container(&page, "#q"), QuestionType::MultipleChoice, &answers(&["Paris"]));
        assert_eq!(filled, 1);
        assert_eq!(filler.adapter().clicked(), vec!["Paris"]);
    }

    #[test]
    fn test_choice_data_value_takes_priority() {
        let page = Page::parse(
            r#"<body><div id="q"><label>Yes</label><div data-value="Yes">Y</div></div></body>"#,
            "",
        );
        let mut filler = FormFiller::new(&page, RecordingAdapter::new());
        filler.fill(container(&page, "#q"), QuestionType::MultipleChoice, &answers(&["Yes"]));
        let actions = filler.into_adapter().into_actions();
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            FillAction::Click { target } => assert_eq!(target.tag, "div"),
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_checkboxes_click_every_match() {
        let page = Page::parse(
            r#"<body><div id="q">
                <div role="checkbox" data-answer-value="Red"></div>
                <div role="checkbox" data-answer-value="Green"></div>
                <div role="checkbox" data-answer-value="Blue"></div>
              </div></body>"#,
            "",
        );
        let mut filler = FormFiller::new(&page, RecordingAdapter::new());
        let filled = filler.fill(container(&page, "#q"), QuestionType::Checkboxes, &answers(&["Red", "Blue"]));
        assert_eq!(filled, 2);
        assert_eq!(filler.adapter().clicked(), vec!["Red", "Blue"]);
    }

    #[test]
    fn test_text_uses_first_answer() {
        let page = Page::parse(
            r#"<body><div id="q"><input type="hidden" name="x"><textarea></textarea></div></body>"#,
            "",
        );
        let mut filler = FormFiller::new(&page, RecordingAdapter::new());
        let filled = filler.fill(container(&page, "#q"), QuestionType::LongText, &answers(&["first", "second"]));
        assert_eq!(filled, 1);
        match &filler.adapter().actions()[0] {
            FillAction::SetValue { target, value } => {
                assert_eq!(target.tag, "textarea");
                assert_eq!(value, "first");
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_text_without_input() {
        let page = Page::parse(r#"<body><div id="q"><input type="radio"></div></body>"#, "");
        let mut filler = FormFiller::new(&page, RecordingAdapter::new());
        assert_eq!(filler.fill(container(&page, "#q"), QuestionType::ShortText, &answers(&["x"])), 0);
    }

    #[test]
    fn test_native_select() {
        let page = Page::parse(
            r#"<body><div id="q"><select><option value="1">One</option><option value="2">Two</option></select></div></body>"#,
            "",
        );
        let mut filler = FormFiller::new(&page, RecordingAdapter::new());
        let filled = filler.fill(container(&page, "#q"), QuestionType::Dropdown, &answers(&["Two"]));
        assert_eq!(filled, 1);
        match &filler.adapter().actions()[0] {
            FillAction::SelectOption { target, value } => {
                assert_eq!(target.tag, "select");
                assert_eq!(value, "2");
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_empty_answer_selects_nothing() {
        let page = Page::parse(
            r#"<body><div id="q"><select><option value="">Choose</option><option value="1">One</option></select></div>
               <div id="c"><div role="listbox">Choose</div><div role="option" data-value="">Blank</div></div></body>"#,
            "",
        );
        let mut filler = FormFiller::new(&page, RecordingAdapter::new());
        assert_eq!(filler.fill(container(&page, "#q"), QuestionType::Dropdown, &answers(&[""])), 0);
        assert_eq!(filler.fill(container(&page, "#c"), QuestionType::Dropdown, &answers(&[""])), 0);
        assert_eq!(filler.adapter().clicked(), vec!["Choose"]);
    }

    #[test]
    fn test_custom_dropdown_settles_then_clicks() {
        let page = Page::parse(
            r#"<body><div id="q"><div role="listbox">Choose</div></div>
               <div class="popup"><div role="option" data-value="Beta">Beta</div></div></body>"#,
            "",
        );
        let mut filler = FormFiller::new(&page, RecordingAdapter::new())
            .with_dropdown_settle(Duration::from_millis(300));
        let filled = filler.fill(container(&page, "#q"), QuestionType::Dropdown, &answers(&["Beta"]));
        assert_eq!(filled, 1);
        let actions = filler.adapter().actions();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[1], FillAction::Settle { millis: 300 });
        assert_eq!(filler.adapter().clicked(), vec!["Choose", "Beta"]);
    }

    #[test]
    fn test_custom_dropdown_without_match_reports_zero() {
        let page = Page::parse(r#"<body><div id="q"><div role="listbox">Choose</div></div></body>"#, "");
        let mut filler = FormFiller::new(&page, RecordingAdapter::new());
        assert_eq!(filler.fill(container(&page, "#q"), QuestionType::Dropdown, &answers(&["Zeta"])), 0);
    }

    #[test]
    fn test_unknown_type_falls_back_to_text() {
        let page = Page::parse(r#"<body><div id="q"><input type="text"></div></body>"#, "");
        let mut filler = FormFiller::new(&page, RecordingAdapter::new());
        let filled = filler.fill(container(&page, "#q"), QuestionType::Other(Some(9)), &answers(&["v"]));
        assert_eq!(filled, 1);
    }

    #[test]
    fn test_fill_all_report() {
        let page = Page::parse(
            r#"<body>
              <div role="listitem"><div role="heading">Q1</div><div role="radio">A</div><div role="radio">B</div></div>
            </body>"#,
            "",
        );
        let question = |title: &str, values: &[&str]| ResolvedQuestion {
            id: None,
            title: title.to_string(),
            kind: QuestionType::MultipleChoice,
            answers: answers(values),
            strategy: Some(AnswerStrategy::ChoiceFlag),
        };
        let questions = vec![question("Q1", &["B"]), question("Missing", &["x"]), question("Q1", &[])];

        let mut filler = FormFiller::new(&page, RecordingAdapter::new());
        let report = filler.fill_all(&questions);
        assert_eq!(report.total_questions, 3);
        assert_eq!(report.answered_count, 1);
        assert_eq!(report.questions[0].status, FillStatus::Filled { count: 1 });
        assert_eq!(report.questions[1].status, FillStatus::ContainerNotFound);
        assert_eq!(report.questions[2].status, FillStatus::NoAnswers);
    }
}
