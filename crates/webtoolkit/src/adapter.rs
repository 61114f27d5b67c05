//! The seam between fill decisions and the page that receives them.
//!
//! [`FormFiller`](crate::filler::FormFiller) decides *what* to click or type;
//! a [`FormControlAdapter`] decides *how*. [`RecordingAdapter`] keeps the
//! decisions as data, [`ScriptAdapter`] turns them into a JavaScript program
//! that replays them in a live page with the events frontend frameworks
//! listen for.

use std::time::Duration;

use scraper::ElementRef;
use serde::{Deserialize, Serialize};

use crate::page;

const LABEL_MAX_CHARS: usize = 80;

/// A form control addressed by a CSS path that selects exactly it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlHandle {
    pub path: String,
    pub tag: String,
    pub label: String,
}

impl ControlHandle {
    pub fn of(element: ElementRef<'_>) -> Self {
        let text = page::collapse_whitespace(&page::text_content(element));
        let label = if text.is_empty() {
            let el = element.value();
            ["data-value", "data-answer-value", "aria-label"]
                .iter()
                .find_map(|name| el.attr(name).filter(|v| !v.is_empty()))
                .unwrap_or("")
                .to_string()
        } else {
            text.chars().take(LABEL_MAX_CHARS).collect()
        };
        Self {
            path: page::css_path(element),
            tag: element.value().name().to_string(),
            label,
        }
    }
}

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum FillAction {
    Click { target: ControlHandle },
    SetValue { target: ControlHandle, value: String },
    SelectOption { target: ControlHandle, value: String },
    Settle { millis: u64 },
}

/// Operations the filler performs on page controls.
pub trait FormControlAdapter {
    /// Simulate a user click.
    fn click(&mut self, control: &ControlHandle);

    /// Set a text control's value so that framework listeners observe it.
    fn set_value(&mut self, control: &ControlHandle, value: &str);

    /// Select `value` on a native `<select>`.
    fn select_option(&mut self, control: &ControlHandle, value: &str);

    /// Let the page react (e.g. render a dropdown's options).
    fn settle(&mut self, delay: Duration);
}

/// Records every call; used by tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct RecordingAdapter {
    actions: Vec<FillAction>,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> &[FillAction] {
        &self.actions
    }

    pub fn into_actions(self) -> Vec<FillAction> {
        self.actions
    }

    /// Labels of clicked controls, in order.
    pub fn clicked(&self) -> Vec<&str> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                FillAction::Click { target } => Some(target.label.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl FormControlAdapter for RecordingAdapter {
    fn click(&mut self, control: &ControlHandle) {
        self.actions.push(FillAction::Click {
            target: control.clone(),
        });
    }

    fn set_value(&mut self, control: &ControlHandle, value: &str) {
        self.actions.push(FillAction::SetValue {
            target: control.clone(),
            value: value.to_string(),
        });
    }

    fn select_option(&mut self, control: &ControlHandle, value: &str) {
        self.actions.push(FillAction::SelectOption {
            target: control.clone(),
            value: value.to_string(),
        });
    }

    fn settle(&mut self, delay: Duration) {
        self.actions.push(FillAction::Settle {
            millis: delay.as_millis() as u64,
        });
    }
}

const SCRIPT_PRELUDE: &str = r#"(async () => {
  const $ = (path) => document.querySelector(path);
  const fire = (el, type) => el.dispatchEvent(new Event(type, { bubbles: true }));
  const setValue = (el, proto, value) => {
    el.focus();
    el.click();
    const desc = Object.getOwnPropertyDescriptor(proto, "value");
    if (desc && desc.set) { desc.set.call(el, value); } else { el.value = value; }
    ["focus", "input", "change", "blur"].forEach((type) => fire(el, type));
  };
  let el;
"#;

const SCRIPT_EPILOGUE: &str = "})();\n";

/// Production adapter: emits a JavaScript program that performs the calls.
#[derive(Debug, Default, Clone)]
pub struct ScriptAdapter {
    statements: Vec<String>,
}

impl ScriptAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// The complete program, an async IIFE suitable for page injection.
    pub fn script(&self) -> String {
        let mut out = String::from(SCRIPT_PRELUDE);
        for statement in &self.statements {
            out.push_str("  ");
            out.push_str(statement);
            out.push('\n');
        }
        out.push_str(SCRIPT_EPILOGUE);
        out
    }

    fn with_element(&mut self, control: &ControlHandle, body: &str) {
        self.statements.push(format!(
            "el = $({}); if (el) {{ {body} }}",
            js_string(&control.path)
        ));
    }
}

impl FormControlAdapter for ScriptAdapter {
    fn click(&mut self, control: &ControlHandle) {
        self.with_element(control, "el.click();");
    }

    fn set_value(&mut self, control: &ControlHandle, value: &str) {
        let proto = if control.tag.eq_ignore_ascii_case("textarea") {
            "HTMLTextAreaElement.prototype"
        } else {
            "HTMLInputElement.prototype"
        };
        let body = format!("setValue(el, {proto}, {});", js_string(value));
        self.with_element(control, &body);
    }

    fn select_option(&mut self, control: &ControlHandle, value: &str) {
        let body = format!("el.value = {}; fire(el, \"change\");", js_string(value));
        self.with_element(control, &body);
    }

    fn settle(&mut self, delay: Duration) {
        self.statements.push(format!(
            "await new Promise((resolve) => setTimeout(resolve, {}));",
            delay.as_millis()
        ));
    }
}

/// A JS string literal for `s`. JSON strings are valid JS strings.
fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string())
        .to_string()
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
        .replace("</", "<\\/")
}
