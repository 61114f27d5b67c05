//! Main request dispatcher: receives protocol messages, routes them to the
//! orchestrators and the state store.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use webtoolkit::{merge_entries, ExportBundle};

use crate::bus::MessageBus;
use crate::config::Timeouts;
use crate::orchestrator::{CaptureOrchestrator, FormAnswerOrchestrator};
use crate::page::HostPage;
use crate::state::{self, SharedStore};
use crate::types::{BridgeError, BridgeResult, PageRequest, Request, Response};

/// The privileged context. Owns the state store and the tab bus.
pub struct Coordinator {
    store: SharedStore,
    bus: Arc<MessageBus>,
    capture: Arc<CaptureOrchestrator>,
    forms: FormAnswerOrchestrator,
    timeouts: Timeouts,
}

impl Coordinator {
    pub fn new(store: SharedStore, timeouts: Timeouts) -> Self {
        let bus = Arc::new(MessageBus::new());
        Self {
            capture: Arc::new(CaptureOrchestrator::new(Arc::clone(&bus), store.clone())),
            forms: FormAnswerOrchestrator::new(Arc::clone(&bus), timeouts.dropdown_settle),
            store,
            bus,
            timeouts,
        }
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Handle one raw JSON message.
    pub async fn handle_value(&self, message: Value) -> Value {
        let response = match serde_json::from_value::<Request>(message) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                tracing::warn!("Rejected request: {e}");
                Response::failure(BridgeError::InvalidRequest(e.to_string()))
            }
        };
        serde_json::to_value(response).unwrap_or_default()
    }

    /// Handle one request. Failures become `success: false` responses.
    pub async fn handle(&self, request: Request) -> Response {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Request failed: {e}");
                Response::failure(e)
            }
        }
    }

    async fn dispatch(&self, request: Request) -> BridgeResult<Response> {
        match request {
            Request::CapturePageContent { tab_id } => {
                let tab = self.bus.resolve_tab(tab_id).await?;
                self.bus.send_to_tab(tab.id, PageRequest::CapturePageContent).await
            }
            Request::AnswerGForm { tab_id } => self.forms.answer(tab_id).await,
            Request::CaptureContent { tab_id } => {
                let entry = self.capture.capture(tab_id).await?;
                Ok(Response::ok().with("entry", entry))
            }

            Request::SaveEntry { entry } => {
                state::update(&self.store, move |s| {
                    s.entries.push(entry);
                    Ok(())
                })
                .await?;
                Ok(Response::ok())
            }
            Request::GetEntries => {
                let entries = state::read(&self.store, |s| s.entries.clone()).await;
                Ok(Response::ok().with("entries", entries))
            }
            Request::DeleteEntry { entry_id } => {
                let removed = state::update(&self.store, |s| Ok(s.entries.remove(&entry_id))).await?;
                if !removed {
                    tracing::debug!(id = %entry_id, "Delete of unknown entry");
                }
                Ok(Response::ok())
            }
            Request::ClearAllEntries => {
                state::update(&self.store, |s| {
                    s.entries.clear();
                    Ok(())
                })
                .await?;
                Ok(Response::ok())
            }

            Request::GetSettings => {
                let settings = state::read(&self.store, |s| s.settings).await;
                Ok(Response::ok().with("settings", settings))
            }
            Request::SaveSettings { settings } => {
                state::update(&self.store, |s| {
                    s.settings = settings;
                    Ok(())
                })
                .await?;
                Ok(Response::ok())
            }
            Request::GetCaptureStatus => {
                let capturing = state::read(&self.store, |s| s.capturing).await;
                Ok(Response::ok().with("capturing", capturing))
            }
            Request::SetCaptureStatus { capturing } => {
                state::update(&self.store, |s| {
                    s.capturing = capturing;
                    Ok(())
                })
                .await?;
                tracing::info!("Capturing {}", if capturing { "enabled" } else { "disabled" });
                Ok(Response::ok().with("capturing", capturing))
            }

            Request::MergeEntries { entry_ids } => {
                let merged = state::read(&self.store, |s| {
                    merge_entries(s.entries.entries(), &entry_ids, &s.settings)
                })
                .await?;
                Ok(Response::ok().with("merged", merged))
            }
            Request::ExportData => {
                let bundle = state::read(&self.store, |s| ExportBundle::from_state(s, Utc::now())).await;
                Ok(Response::ok().with("bundle", bundle))
            }
            Request::ImportData { bundle } => {
                let entries = ExportBundle::entries_from_value(&bundle)?;
                let count = entries.len();
                state::update(&self.store, move |s| {
                    s.entries = webtoolkit::EntryLog::from_entries(entries);
                    Ok(())
                })
                .await?;
                tracing::info!("Imported {count} entries");
                Ok(Response::ok().with("count", count))
            }

            Request::TabUpdated { tab_id, status } => {
                let scheduled = self.capture.should_auto_capture(tab_id, &status).await;
                if scheduled {
                    let capture = Arc::clone(&self.capture);
                    let delay = self.timeouts.auto_capture_delay;
                    tokio::spawn(async move { capture.auto_capture(tab_id, delay).await });
                }
                Ok(Response::ok().with("scheduled", scheduled))
            }
            Request::OpenTab { url, html, globals } => {
                let host = HostPage::new(url, html).with_globals(globals);
                let tab_id = self.bus.open_tab(host, &self.timeouts).await;
                Ok(Response::ok().with("tabId", tab_id))
            }
            Request::CloseTab { tab_id } => {
                self.bus.close_tab(tab_id).await?;
                Ok(Response::ok())
            }
            Request::ActivateTab { tab_id } => {
                self.bus.activate(tab_id).await?;
                Ok(Response::ok())
            }
            Request::ListTabs => {
                let active = self.bus.active_tab().await.map(|tab| tab.id);
                Ok(Response::ok()
                    .with("tabs", self.bus.tabs().await)
                    .with("activeTabId", active))
            }
        }
    }

    /// Persist pending state.
    pub async fn shutdown(&self) -> BridgeResult<()> {
        tracing::info!("Shutdown requested");
        self.store.lock().await.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{shared, MemoryStateStore};
    use serde_json::json;

    fn coordinator() -> Coordinator {
        Coordinator::new(shared(MemoryStateStore::default()), Timeouts::default())
    }

    #[tokio::test]
    async fn test_invalid_request() {
        let c = coordinator();
        let response = c.handle_value(json!({"action": "nope"})).await;
        assert_eq!(response["success"], false);
        assert!(response["error"].as_str().unwrap().starts_with("Invalid request"));

        let response = c.handle_value(json!({"entryId": "x"})).await;
        assert_eq!(response["success"], false);
    }

    #[tokio::test]
    async fn test_capture_status_roundtrip() {
        let c = coordinator();
        let response = c.handle_value(json!({"action": "getCaptureStatus"})).await;
        assert_eq!(response, json!({"success": true, "capturing": false}));

        c.handle_value(json!({"action": "setCaptureStatus", "capturing": true})).await;
        let response = c.handle_value(json!({"action": "getCaptureStatus"})).await;
        assert_eq!(response["capturing"], true);
    }

    #[tokio::test]
    async fn test_settings_default_and_save() {
        let c = coordinator();
        let response = c.handle_value(json!({"action": "getSettings"})).await;
        assert_eq!(
            response["settings"],
            json!({"includeTitle": true, "includeURL": true, "includeTime": true})
        );

        c.handle_value(json!({
            "action": "saveSettings",
            "settings": {"includeTitle": false, "includeURL": true, "includeTime": false}
        }))
        .await;
        let response = c.handle_value(json!({"action": "getSettings"})).await;
        assert_eq!(response["settings"]["includeTitle"], false);
    }

    #[tokio::test]
    async fn test_delete_unknown_entry_succeeds() {
        let c = coordinator();
        let response = c.handle_value(json!({"action": "deleteEntry", "entryId": "missing"})).await;
        assert_eq!(response["success"], true);
    }

    #[tokio::test]
    async fn test_merge_with_nothing_selected() {
        let c = coordinator();
        let response = c.handle_value(json!({"action": "mergeEntries", "entryIds": []})).await;
        assert_eq!(response["error"], "No entries selected for merging.");
    }

    #[tokio::test]
    async fn test_open_and_close_tab() {
        let c = coordinator();
        let response = c
            .handle_value(json!({"action": "openTab", "url": "https://a.test/", "html": "<p>x</p>"}))
            .await;
        let tab_id = response["tabId"].as_u64().unwrap();
        assert_eq!(c.bus().active_tab().await.unwrap().id as u64, tab_id);

        let response = c.handle_value(json!({"action": "closeTab", "tabId": tab_id})).await;
        assert_eq!(response["success"], true);
        let response = c.handle_value(json!({"action": "capturePageContent"})).await;
        assert_eq!(response["error"], "No active tab found");
    }

    #[tokio::test]
    async fn test_list_and_activate_tabs() {
        let c = coordinator();
        let response = c.handle_value(json!({"action": "listTabs"})).await;
        assert_eq!(response, json!({"success": true, "tabs": [], "activeTabId": null}));

        let first = c
            .handle_value(json!({"action": "openTab", "url": "https://a.test/", "html": "<title>A</title>"}))
            .await["tabId"]
            .clone();
        let second = c
            .handle_value(json!({"action": "openTab", "url": "https://b.test/", "html": "<title>B</title>"}))
            .await["tabId"]
            .clone();

        let response = c.handle_value(json!({"action": "listTabs"})).await;
        assert_eq!(response["activeTabId"], second);
        assert_eq!(response["tabs"][0]["title"], "A");
        assert_eq!(response["tabs"][1]["url"], "https://b.test/");

        let response = c.handle_value(json!({"action": "activateTab", "tabId": first})).await;
        assert_eq!(response["success"], true);
        let response = c.handle_value(json!({"action": "listTabs"})).await;
        assert_eq!(response["activeTabId"], first);

        let response = c.handle_value(json!({"action": "activateTab", "tabId": 99})).await;
        assert_eq!(response["error"], "No tab with id 99");
    }
}
