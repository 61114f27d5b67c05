//! Stdio transport: reads requests from stdin, writes responses to stdout.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::protocol::Coordinator;
use crate::types::{BridgeResult, Response};

use super::framing;

/// Newline-delimited JSON transport, one response per request line.
pub struct StdioTransport {
    coordinator: Arc<Coordinator>,
}

impl StdioTransport {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    /// Run the transport loop on stdin/stdout.
    pub async fn run(&self) -> BridgeResult<()> {
        let reader = BufReader::new(tokio::io::stdin());
        let writer = tokio::io::stdout();
        self.run_with(reader, writer).await
    }

    /// Run the transport loop on any line source and sink until EOF.
    pub async fn run_with<R, W>(&self, mut reader: R, mut writer: W) -> BridgeResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();

        tracing::info!("Stdio transport started");

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                tracing::info!("EOF on stdin, shutting down");
                break;
            }

            if line.trim().is_empty() {
                continue;
            }

            let response = match framing::parse_message(&line) {
                Ok(message) => self.coordinator.handle_value(message).await,
                Err(e) => {
                    tracing::warn!("Parse error: {e}");
                    serde_json::to_value(Response::failure(e))?
                }
            };

            let framed = framing::frame_response(&response)?;
            writer.write_all(framed.as_bytes()).await?;
            writer.flush().await?;
        }

        self.coordinator.shutdown().await
    }
}
