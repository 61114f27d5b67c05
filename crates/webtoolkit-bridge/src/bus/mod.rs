//! Message bus between the coordinator and the page contexts of open tabs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, RwLock};

use crate::config::Timeouts;
use crate::page::{HostPage, PageContext, PageEnvelope};
use crate::types::{BridgeError, BridgeResult, PageRequest, Response};

const NO_RECEIVER: &str = "Could not establish connection. Receiving end does not exist.";
const PORT_CLOSED: &str = "The message port closed before a response was received.";

/// What the coordinator knows about a tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: u32,
    pub url: String,
    pub title: String,
}

struct TabSlot {
    info: TabInfo,
    content_script: Option<mpsc::Sender<PageEnvelope>>,
    host: Option<Arc<HostPage>>,
}

/// Tab registry and request routing.
pub struct MessageBus {
    tabs: RwLock<HashMap<u32, TabSlot>>,
    active: RwLock<Option<u32>>,
    next_id: AtomicU32,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            tabs: RwLock::new(HashMap::new()),
            active: RwLock::new(None),
            next_id: AtomicU32::new(1),
        }
    }

    /// Load `host` into a new active tab with a running content script.
    pub async fn open_tab(&self, host: HostPage, timeouts: &Timeouts) -> u32 {
        let host = Arc::new(host);
        let script = PageContext::new(Arc::clone(&host), timeouts).spawn();
        let info = TabInfo {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            url: host.url().to_string(),
            title: host.title().to_string(),
        };
        self.insert(info, Some(script), Some(host)).await
    }

    /// Register a tab with no content script and no injection target.
    pub async fn open_bare_tab(&self, url: &str, title: &str) -> u32 {
        let info = TabInfo {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            url: url.to_string(),
            title: title.to_string(),
        };
        self.insert(info, None, None).await
    }

    async fn insert(
        &self,
        info: TabInfo,
        content_script: Option<mpsc::Sender<PageEnvelope>>,
        host: Option<Arc<HostPage>>,
    ) -> u32 {
        let id = info.id;
        tracing::debug!(tab = id, url = %info.url, "Tab opened");
        self.tabs.write().await.insert(
            id,
            TabSlot {
                info,
                content_script,
                host,
            },
        );
        *self.active.write().await = Some(id);
        id
    }

    pub async fn close_tab(&self, id: u32) -> BridgeResult<()> {
        self.tabs.write().await.remove(&id).ok_or(BridgeError::TabNotFound(id))?;
        let mut active = self.active.write().await;
        if *active == Some(id) {
            *active = None;
        }
        Ok(())
    }

    pub async fn activate(&self, id: u32) -> BridgeResult<()> {
        if !self.tabs.read().await.contains_key(&id) {
            return Err(BridgeError::TabNotFound(id));
        }
        *self.active.write().await = Some(id);
        Ok(())
    }

    /// Replace (or remove) the content script of a tab.
    pub async fn attach_content_script(
        &self,
        id: u32,
        script: Option<mpsc::Sender<PageEnvelope>>,
    ) -> BridgeResult<()> {
        let mut tabs = self.tabs.write().await;
        let slot = tabs.get_mut(&id).ok_or(BridgeError::TabNotFound(id))?;
        slot.content_script = script;
        Ok(())
    }

    pub async fn tab(&self, id: u32) -> Option<TabInfo> {
        self.tabs.read().await.get(&id).map(|slot| slot.info.clone())
    }

    pub async fn active_tab(&self) -> Option<TabInfo> {
        let id = (*self.active.read().await)?;
        self.tab(id).await
    }

    pub async fn tabs(&self) -> Vec<TabInfo> {
        let mut tabs: Vec<TabInfo> = self.tabs.read().await.values().map(|s| s.info.clone()).collect();
        tabs.sort_by_key(|t| t.id);
        tabs
    }

    /// The tab `id`, or the active tab when no id is given.
    pub async fn resolve_tab(&self, id: Option<u32>) -> BridgeResult<TabInfo> {
        match id {
            Some(id) => self.tab(id).await.ok_or(BridgeError::TabNotFound(id)),
            None => self.active_tab().await.ok_or(BridgeError::NoActiveTab),
        }
    }

    /// Where scripts for tab `id` can be injected, if anywhere.
    pub async fn injection_target(&self, id: u32) -> Option<Arc<HostPage>> {
        self.tabs.read().await.get(&id).and_then(|slot| slot.host.clone())
    }

    /// Send `request` to the content script of tab `id` and wait for its reply.
    pub async fn send_to_tab(&self, id: u32, request: PageRequest) -> BridgeResult<Response> {
        let script = {
            let tabs = self.tabs.read().await;
            let slot = tabs.get(&id).ok_or(BridgeError::TabNotFound(id))?;
            slot.content_script.clone()
        };
        let script = script.ok_or_else(|| BridgeError::Transport(NO_RECEIVER.to_string()))?;

        let (reply, response) = oneshot::channel();
        script
            .send(PageEnvelope { request, reply })
            .await
            .map_err(|_| BridgeError::Transport(NO_RECEIVER.to_string()))?;

        response
            .await
            .map_err(|_| BridgeError::Transport(PORT_CLOSED.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_tab_becomes_active() {
        let bus = MessageBus::new();
        let first = bus
            .open_tab(HostPage::new("https://a.test/", "<title>A</title>"), &Timeouts::default())
            .await;
        let second = bus.open_bare_tab("chrome://newtab", "New Tab").await;
        assert_ne!(first, second);
        assert_eq!(bus.active_tab().await.unwrap().id, second);

        bus.activate(first).await.unwrap();
        let active = bus.resolve_tab(None).await.unwrap();
        assert_eq!(active.title, "A");
        assert_eq!(bus.tabs().await.len(), 2);
    }

    #[tokio::test]
    async fn test_no_active_tab() {
        let bus = MessageBus::new();
        let err = bus.resolve_tab(None).await.unwrap_err();
        assert_eq!(err.to_string(), "No active tab found");
        assert!(matches!(bus.resolve_tab(Some(9)).await, Err(BridgeError::TabNotFound(9))));
    }

    #[tokio::test]
    async fn test_send_without_content_script_is_transport_error() {
        let bus = MessageBus::new();
        let id = bus.open_bare_tab("https://a.test/", "A").await;
        let err = bus.send_to_tab(id, PageRequest::CapturePageContent).await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
        assert!(err.to_string().contains("Receiving end does not exist"));
    }

    #[tokio::test]
    async fn test_dropped_reply_is_port_closed() {
        let bus = MessageBus::new();
        let id = bus.open_bare_tab("https://a.test/", "A").await;
        let (tx, mut rx) = mpsc::channel::<PageEnvelope>(1);
        bus.attach_content_script(id, Some(tx)).await.unwrap();

        tokio::spawn(async move {
            // receive and drop without replying
            let _ = rx.recv().await;
        });
        let err = bus.send_to_tab(id, PageRequest::AnswerGForm).await.unwrap_err();
        assert_eq!(err.to_string(), PORT_CLOSED);
    }

    #[tokio::test]
    async fn test_close_tab_clears_active() {
        let bus = MessageBus::new();
        let id = bus.open_bare_tab("https://a.test/", "A").await;
        bus.close_tab(id).await.unwrap();
        assert!(bus.active_tab().await.is_none());
        assert!(bus.close_tab(id).await.is_err());
    }
}
