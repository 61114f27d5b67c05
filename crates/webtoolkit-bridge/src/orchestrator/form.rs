//! FormAnswerOrchestrator: recover a quiz form's answers and fill them in.
//!
//! The coordinator half checks the tab and routes the request to the tab's
//! content script. The page half runs inside a page context: the content
//! script relays the payload global out of the host page and falls back to
//! script-tag parsing; the main-world path, used when the content script is
//! unreachable, reads the global directly.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use webtoolkit::locator::locate_in_scripts;
use webtoolkit::{
    locate, resolve_answers, BlobSource, FormBlob, FormFiller, GlobalScope, LocatedBlob, Page,
    QuestionOutcome, ScriptAdapter,
};

use super::InFlight;
use crate::bus::MessageBus;
use crate::page::{relay_global, HostPage, RelayOutcome};
use crate::types::{BridgeError, BridgeResult, PageRequest, Response};

/// Substring a tab URL must contain to be treated as a Google Form.
pub const GOOGLE_FORMS_URL: &str = "docs.google.com/forms";

/// A successful fill pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormAnswer {
    pub answered_count: usize,
    pub total_questions: usize,
    pub source: BlobSource,
    pub questions: Vec<QuestionOutcome>,
    /// Program that replays the fill in a live page.
    pub fill_script: String,
}

/// Resolve and fill every question of `located` against `page`.
pub fn answer_with_blob(page: &Page, located: LocatedBlob, dropdown_settle: Duration) -> BridgeResult<FormAnswer> {
    let questions = resolve_answers(&located.blob)?;

    let mut filler = FormFiller::new(page, ScriptAdapter::new()).with_dropdown_settle(dropdown_settle);
    let report = filler.fill_all(&questions);

    if report.total_questions == 0 {
        return Err(BridgeError::NoQuestions);
    }
    if report.answered_count == 0 {
        return Err(BridgeError::NothingFilled(report.total_questions));
    }

    Ok(FormAnswer {
        answered_count: report.answered_count,
        total_questions: report.total_questions,
        source: located.source,
        questions: report.questions,
        fill_script: filler.into_adapter().script(),
    })
}

/// Content-script path: relay, then script tags.
pub async fn answer_in_isolated_world(
    host: &Arc<HostPage>,
    relay_timeout: Duration,
    dropdown_settle: Duration,
) -> BridgeResult<FormAnswer> {
    let outcome = relay_global(host, relay_timeout).await;
    answer_after_relay(host, outcome, dropdown_settle)
}

fn answer_after_relay(host: &HostPage, outcome: RelayOutcome, dropdown_settle: Duration) -> BridgeResult<FormAnswer> {
    let page = Page::parse(host.html(), host.url());
    let timed_out = outcome == RelayOutcome::TimedOut;

    let located = match outcome {
        RelayOutcome::Received(Some(value)) => {
            tracing::debug!("Form payload received from page relay");
            Some(LocatedBlob {
                blob: FormBlob::new(value),
                source: BlobSource::Global,
            })
        }
        RelayOutcome::Received(None) | RelayOutcome::TimedOut => {
            tracing::debug!("No relayed payload, parsing script tags");
            locate_in_scripts(&page)
        }
    };

    match located {
        Some(located) => answer_with_blob(&page, located, dropdown_settle),
        None if timed_out => Err(BridgeError::RelayTimedOut),
        None => Err(BridgeError::AnswersNotDetected),
    }
}

/// Injected main-world path: every locator strategy, global read included.
pub fn answer_in_main_world(host: &HostPage, dropdown_settle: Duration) -> BridgeResult<FormAnswer> {
    host.check_injectable().map_err(BridgeError::FormPageUnreachable)?;

    let page = Page::parse(host.html(), host.url());
    match locate(&page, Some(host as &dyn GlobalScope)) {
        Some(located) => answer_with_blob(&page, located, dropdown_settle),
        None => Err(BridgeError::AnswersNotDetected),
    }
}

pub struct FormAnswerOrchestrator {
    bus: Arc<MessageBus>,
    dropdown_settle: Duration,
    in_flight: InFlight,
}

impl FormAnswerOrchestrator {
    pub fn new(bus: Arc<MessageBus>, dropdown_settle: Duration) -> Self {
        Self {
            bus,
            dropdown_settle,
            in_flight: InFlight::default(),
        }
    }

    /// Answer the form in tab `tab_id` (the active tab when `None`).
    pub async fn answer(&self, tab_id: Option<u32>) -> BridgeResult<Response> {
        let _guard = self.in_flight.try_begin("form fill")?;

        let tab = self.bus.resolve_tab(tab_id).await?;
        if !tab.url.contains(GOOGLE_FORMS_URL) {
            return Err(BridgeError::NotAGoogleForm);
        }

        match self.bus.send_to_tab(tab.id, PageRequest::AnswerGForm).await {
            Ok(response) if response.success => {
                tracing::info!(tab = tab.id, answered = ?response.get("answeredCount"), "Form answered");
                Ok(response)
            }
            Ok(response) => Err(match response.error {
                Some(reason) => BridgeError::PageFailure(reason),
                None => BridgeError::FormProcessingFailed,
            }),
            Err(BridgeError::Transport(reason)) => {
                tracing::warn!("Content script failed, injecting into page: {reason}");
                let host = self
                    .bus
                    .injection_target(tab.id)
                    .await
                    .ok_or(BridgeError::FormInjectionFailed)?;
                let answer = answer_in_main_world(&host, self.dropdown_settle)?;
                tracing::info!(tab = tab.id, answered = answer.answered_count, "Form answered by injection");
                Ok(Response::from_payload(&answer))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::RelayBehavior;
    use serde_json::{json, Map, Value};
    use webtoolkit::BLOB_MARKER;

    const FORM_URL: &str = "https://docs.google.com/forms/d/e/abc/viewform";

    fn payload() -> Value {
        json!([null, [null, [[null, "Q1", null, 2, [["qid1", [["A", 0, 0, 0, 0], ["B", 0, 0, 0, 1]], 0, 0, [[["B", 1]]]]]]]]])
    }

    fn form_html(with_script: bool) -> String {
        let script = if with_script {
            format!("<script>var {BLOB_MARKER} = {};</script>", payload())
        } else {
            String::new()
        };
        format!(
            "<html><head><title>Quiz</title>{script}</head><body>\
             <div role=\"listitem\" data-params=\"%.@.[qid1,&quot;Q1&quot;]\">\
             <div role=\"heading\">Q1</div>\
             <div role=\"radio\" data-value=\"A\">A</div>\
             <div role=\"radio\" data-value=\"B\">B</div>\
             </div></body></html>"
        )
    }

    fn globals() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(BLOB_MARKER.to_string(), payload());
        map
    }

    #[tokio::test(start_paused = true)]
    async fn test_isolated_world_uses_relay() {
        let host = Arc::new(HostPage::new(FORM_URL, form_html(false)).with_globals(globals()));
        let answer = answer_in_isolated_world(&host, Duration::from_millis(3000), Duration::from_millis(300))
            .await
            .unwrap();
        assert_eq!(answer.answered_count, 1);
        assert_eq!(answer.total_questions, 1);
        assert_eq!(answer.source, BlobSource::Global);
        assert!(answer.fill_script.contains("el.click();"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back_to_scripts() {
        let host = Arc::new(HostPage::new(FORM_URL, form_html(true)).with_relay(RelayBehavior::Silent));
        let answer = answer_in_isolated_world(&host, Duration::from_millis(3000), Duration::from_millis(300))
            .await
            .unwrap();
        assert_eq!(answer.source, BlobSource::ScriptJson);
        assert_eq!(answer.answered_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_without_scripts_reports_timeout() {
        let host = Arc::new(HostPage::new(FORM_URL, form_html(false)).with_relay(RelayBehavior::Silent));
        let err = answer_in_isolated_world(&host, Duration::from_millis(3000), Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::RelayTimedOut));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_payload_anywhere() {
        let host = Arc::new(HostPage::new(FORM_URL, form_html(false)));
        let err = answer_in_isolated_world(&host, Duration::from_millis(3000), Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::AnswersNotDetected));
    }

    #[test]
    fn test_main_world_reads_global() {
        let host = HostPage::new(FORM_URL, form_html(false)).with_globals(globals());
        let answer = answer_in_main_world(&host, Duration::from_millis(300)).unwrap();
        assert_eq!(answer.source, BlobSource::Global);

        let blocked = HostPage::new(FORM_URL, form_html(false)).blocking_scripts();
        let err = answer_in_main_world(&blocked, Duration::from_millis(300)).unwrap_err();
        assert!(err.to_string().starts_with("Failed to access the Google Form page: "));
    }

    #[test]
    fn test_fill_reasons() {
        let page = Page::parse("<body><p>nothing here</p></body>", FORM_URL);
        let empty = LocatedBlob {
            blob: FormBlob::new(json!([null, [null, []]])),
            source: BlobSource::ScriptJson,
        };
        let err = answer_with_blob(&page, empty, Duration::ZERO).unwrap_err();
        assert_eq!(err.to_string(), "No quiz questions found in this form.");

        let unfillable = LocatedBlob {
            blob: FormBlob::new(payload()),
            source: BlobSource::ScriptJson,
        };
        let err = answer_with_blob(&page, unfillable, Duration::ZERO).unwrap_err();
        assert!(matches!(err, BridgeError::NothingFilled(1)));

        let garbage = LocatedBlob {
            blob: FormBlob::new(json!("nope")),
            source: BlobSource::ScriptJson,
        };
        let err = answer_with_blob(&page, garbage, Duration::ZERO).unwrap_err();
        assert!(err.to_string().starts_with("Form data structure not recognized"));
    }

    #[tokio::test]
    async fn test_rejects_non_form_pages() {
        let bus = Arc::new(MessageBus::new());
        bus.open_bare_tab("https://example.com/", "Example").await;
        let orchestrator = FormAnswerOrchestrator::new(bus, Duration::from_millis(300));
        let err = orchestrator.answer(None).await.unwrap_err();
        assert_eq!(err.to_string(), "This page is not a Google Form");
    }
}
