//! Page-side execution contexts: the host page and the content script
//! embedded in it.

pub mod host;
pub mod relay;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use webtoolkit::extract_html;

use crate::config::Timeouts;
use crate::orchestrator::form;
use crate::types::{PageRequest, Response};

pub use host::{HostPage, PageEvent, RelayBehavior};
pub use relay::{relay_global, FirstResponse, RelayOutcome, RELAY_EVENT};

const INBOX_CAPACITY: usize = 16;

/// A page request with its reply channel.
#[derive(Debug)]
pub struct PageEnvelope {
    pub request: PageRequest,
    pub reply: oneshot::Sender<Response>,
}

/// The content script of one tab. Sees the page's DOM but not its globals.
pub struct PageContext {
    host: Arc<HostPage>,
    relay_timeout: Duration,
    dropdown_settle: Duration,
}

impl PageContext {
    pub fn new(host: Arc<HostPage>, timeouts: &Timeouts) -> Self {
        Self {
            host,
            relay_timeout: timeouts.relay_timeout,
            dropdown_settle: timeouts.dropdown_settle,
        }
    }

    pub async fn handle(&self, request: PageRequest) -> Response {
        match request {
            PageRequest::CapturePageContent => {
                let content = extract_html(self.host.html(), self.host.url());
                Response::ok().with("content", content)
            }
            PageRequest::AnswerGForm => {
                match form::answer_in_isolated_world(&self.host, self.relay_timeout, self.dropdown_settle)
                    .await
                {
                    Ok(answer) => Response::from_payload(&answer),
                    Err(e) => {
                        tracing::warn!("Form answer failed in page: {e}");
                        Response::failure(e)
                    }
                }
            }
        }
    }

    /// Serve requests until every sender is dropped.
    pub fn spawn(self) -> mpsc::Sender<PageEnvelope> {
        let (tx, mut rx) = mpsc::channel::<PageEnvelope>(INBOX_CAPACITY);
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let response = self.handle(envelope.request).await;
                if envelope.reply.send(response).is_err() {
                    tracing::debug!("Requester went away before the reply");
                }
            }
            tracing::debug!("Content script for {} stopped", self.host.url());
        });
        tx
    }
}
