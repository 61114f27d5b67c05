//! The host page's own ("main") world: its markup, its global variables and
//! the page-level event target content scripts listen on.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::broadcast;

use webtoolkit::{extract_html, ExtractionResult, GlobalScope, Page};

const EVENT_CAPACITY: usize = 16;

/// A `CustomEvent` dispatched on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageEvent {
    pub name: String,
    pub detail: Option<Value>,
}

/// How the page reacts when a relay script is injected into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayBehavior {
    /// Dispatches the event as soon as the script runs.
    #[default]
    Immediate,
    /// Dispatches the event after a delay.
    Delayed(Duration),
    /// Never dispatches (the injected script was blocked or crashed).
    Silent,
}

/// A loaded page as the host sees it.
#[derive(Debug)]
pub struct HostPage {
    url: String,
    html: String,
    title: String,
    globals: Map<String, Value>,
    runs_injected_scripts: bool,
    relay: RelayBehavior,
    events: broadcast::Sender<PageEvent>,
}

impl HostPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        let url = url.into();
        let html = html.into();
        let title = Page::parse(&html, &url).title();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            url,
            html,
            title,
            globals: Map::new(),
            runs_injected_scripts: true,
            relay: RelayBehavior::default(),
            events,
        }
    }

    pub fn with_globals(mut self, globals: Map<String, Value>) -> Self {
        self.globals = globals;
        self
    }

    pub fn with_relay(mut self, relay: RelayBehavior) -> Self {
        self.relay = relay;
        self
    }

    /// Refuse every injected script, as privileged or error pages do.
    pub fn blocking_scripts(mut self) -> Self {
        self.runs_injected_scripts = false;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    pub fn dispatch(&self, event: PageEvent) {
        // no listeners is not an error for a DOM event
        let _ = self.events.send(event);
    }

    /// Whether scripts can be injected at all.
    pub fn check_injectable(&self) -> Result<(), String> {
        if self.runs_injected_scripts {
            Ok(())
        } else {
            Err(format!("Cannot access contents of the page: {}", self.url))
        }
    }

    /// Run the extractor as an injected script.
    pub fn execute_extraction(&self) -> Result<ExtractionResult, String> {
        self.check_injectable()?;
        Ok(extract_html(&self.html, &self.url))
    }

    /// Inject a script that reads global `name` and dispatches it as the
    /// detail of an `event` event.
    pub fn inject_relay(self: &Arc<Self>, name: &str, event: &str) -> Result<(), String> {
        self.check_injectable()?;

        let relayed = PageEvent {
            name: event.to_string(),
            detail: self.global(name),
        };
        match self.relay {
            RelayBehavior::Immediate => self.dispatch(relayed),
            RelayBehavior::Delayed(delay) => {
                let page = Arc::clone(self);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    page.dispatch(relayed);
                });
            }
            RelayBehavior::Silent => {
                tracing::debug!("Relay script produced no event");
            }
        }
        Ok(())
    }
}

impl GlobalScope for HostPage {
    fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }
}
