//! Moves the form payload global from the host page into the content script.
//!
//! The content script cannot read page globals, so it injects a small script
//! into the host page that re-publishes the global as the detail of a
//! `CustomEvent`. Whichever comes first, the event or the timeout, decides
//! the outcome; the other is ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, oneshot};

use webtoolkit::BLOB_MARKER;

use super::host::HostPage;

/// Name of the relay event.
pub const RELAY_EVENT: &str = "__gform_data_result__";

#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    /// The event arrived. `None` when the page had no payload.
    Received(Option<Value>),
    TimedOut,
}

/// Resolves a oneshot at most once; later attempts are dropped.
pub struct FirstResponse<T> {
    resolved: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> FirstResponse<T> {
    pub fn new() -> (Arc<Self>, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        let guard = Arc::new(Self {
            resolved: AtomicBool::new(false),
            sender: Mutex::new(Some(tx)),
        });
        (guard, rx)
    }

    /// Returns `false` if an earlier call already resolved.
    pub fn resolve(&self, value: T) -> bool {
        if self.resolved.swap(true, Ordering::AcqRel) {
            return false;
        }
        let sender = self.sender.lock().ok().and_then(|mut slot| slot.take());
        match sender {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }
}

/// Relay the form payload global out of `host`, waiting at most `timeout`.
pub async fn relay_global(host: &Arc<HostPage>, timeout: Duration) -> RelayOutcome {
    let (guard, outcome) = FirstResponse::new();

    let mut events = host.subscribe();
    let listener = {
        let guard = Arc::clone(&guard);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.name == RELAY_EVENT => {
                        let detail = event.detail.filter(|v| !v.is_null());
                        if !guard.resolve(RelayOutcome::Received(detail)) {
                            tracing::debug!("Dropping late relay event");
                        }
                        break;
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    };

    {
        let guard = Arc::clone(&guard);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if guard.resolve(RelayOutcome::TimedOut) {
                tracing::warn!("Relay timed out after {}ms", timeout.as_millis());
            }
        });
    }

    if let Err(reason) = host.inject_relay(BLOB_MARKER, RELAY_EVENT) {
        // a blocked script looks like a page that never answers
        tracing::warn!("Relay injection failed: {reason}");
    }

    let result = outcome.await.unwrap_or(RelayOutcome::TimedOut);
    listener.abort();
    result
}
