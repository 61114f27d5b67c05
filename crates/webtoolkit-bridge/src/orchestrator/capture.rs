//! CaptureOrchestrator: page content into a stored entry.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use webtoolkit::{Entry, ExtractionResult};

use super::InFlight;
use crate::bus::MessageBus;
use crate::state::{self, SharedStore};
use crate::types::{BridgeError, BridgeResult, PageRequest, Response};

/// Pages no script can run on.
const RESTRICTED_PREFIXES: &[&str] = &[
    "chrome://",
    "chrome-extension://",
    "edge://",
    "extension://",
    "about:",
    "moz-extension://",
    "file://",
];

const LOAD_COMPLETE: &str = "complete";

pub fn is_restricted_url(url: &str) -> bool {
    RESTRICTED_PREFIXES.iter().any(|prefix| url.starts_with(prefix))
}

pub struct CaptureOrchestrator {
    bus: Arc<MessageBus>,
    store: SharedStore,
    in_flight: InFlight,
}

impl CaptureOrchestrator {
    pub fn new(bus: Arc<MessageBus>, store: SharedStore) -> Self {
        Self {
            bus,
            store,
            in_flight: InFlight::default(),
        }
    }

    /// Capture tab `tab_id` (the active tab when `None`) and store the entry.
    pub async fn capture(&self, tab_id: Option<u32>) -> BridgeResult<Entry> {
        let _guard = self.in_flight.try_begin("capture")?;

        if !state::read(&self.store, |s| s.capturing).await {
            return Err(BridgeError::CaptureDisabled);
        }

        let tab = self.bus.resolve_tab(tab_id).await?;
        tracing::debug!(tab = tab.id, url = %tab.url, "Starting capture");

        let content = match self.bus.send_to_tab(tab.id, PageRequest::CapturePageContent).await {
            Ok(response) => content_of(response)?,
            Err(BridgeError::Transport(reason)) => {
                tracing::warn!("Content script failed, trying fallback injection: {reason}");
                self.capture_by_injection(tab.id).await?
            }
            Err(e) => return Err(e),
        };

        let entry = Entry::from_capture(&content, &tab.url, Some(&tab.title), Utc::now());
        let stored = entry.clone();
        state::update(&self.store, move |s| {
            s.entries.push(stored);
            Ok(())
        })
        .await?;

        tracing::info!(
            id = %entry.id,
            chars = entry.full_text.chars().count(),
            trimmed = entry.trimmed,
            "Captured {}",
            entry.url
        );
        Ok(entry)
    }

    async fn capture_by_injection(&self, tab_id: u32) -> BridgeResult<ExtractionResult> {
        let host = self
            .bus
            .injection_target(tab_id)
            .await
            .ok_or(BridgeError::InjectionFailed)?;
        host.execute_extraction().map_err(BridgeError::CaptureFailed)
    }

    /// Decide whether a page-load signal should trigger a capture.
    pub async fn should_auto_capture(&self, tab_id: u32, status: &str) -> bool {
        if status != LOAD_COMPLETE {
            return false;
        }
        if !state::read(&self.store, |s| s.capturing).await {
            tracing::debug!(tab = tab_id, "Capturing off, ignoring page load");
            return false;
        }
        match self.bus.tab(tab_id).await {
            Some(tab) if is_restricted_url(&tab.url) => {
                tracing::debug!(tab = tab_id, url = %tab.url, "Skipping restricted page");
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Wait `delay`, then capture. Failures are logged, not returned.
    pub async fn auto_capture(&self, tab_id: u32, delay: Duration) {
        tokio::time::sleep(delay).await;
        match self.capture(Some(tab_id)).await {
            Ok(entry) => tracing::info!(tab = tab_id, id = %entry.id, "Auto-captured page"),
            Err(e) => tracing::warn!(tab = tab_id, "Auto-capture failed: {e}"),
        }
    }
}

fn content_of(response: Response) -> BridgeResult<ExtractionResult> {
    if !response.success {
        return Err(BridgeError::ContentCaptureFailed);
    }
    let content = response
        .data
        .get("content")
        .cloned()
        .ok_or(BridgeError::ContentCaptureFailed)?;
    Ok(serde_json::from_value(content)?)
}
