use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, trace, warn};

use lc_core::{decode_chat_line, ChatBackend, ChatChunk, ChatRequest, ChatStream, Error};

use crate::http::{error_from_response, join_url, network_error, streaming_client, BodyLines};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Client for the chat proxy's `POST /api/chat` endpoint.
pub struct HttpChatBackend {
    client: Client,
    base_url: String,
}

impl HttpChatBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: streaming_client(),
            base_url: base_url.into(),
        }
    }
}

impl Default for HttpChatBackend {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn stream_chat(&self, request: ChatRequest) -> Result<ChatStream, Error> {
        let url = join_url(&self.base_url, "/api/chat");
        debug!(
            %url,
            model = %request.model,
            history = request.history.len(),
            "Opening chat stream"
        );

        let response = self
            .client
            .post(&url)
            .header("Accept", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .json(&request)
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let (tx, rx) = mpsc::channel::<Result<ChatChunk, Error>>(100);

        tokio::spawn(async move {
            let mut lines = BodyLines::new(response);
            let mut fragments = 0u32;

            loop {
                // Dropping the receiver must drop the response too, even
                // while the server only sends keep-alives.
                let next = tokio::select! {
                    _ = tx.closed() => {
                        debug!(fragments, "Chat stream abandoned");
                        return;
                    }
                    next = lines.next_line() => next,
                };
                let line = match next {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                };

                match decode_chat_line(&line) {
                    Ok(Some(text)) => {
                        fragments += 1;
                        if tx.send(Ok(ChatChunk::Delta { text })).await.is_err() {
                            // Receiver dropped: the turn was cancelled.
                            debug!(fragments, "Chat stream abandoned");
                            return;
                        }
                    }
                    Ok(None) => trace!(line = %line, "Chat line without text"),
                    Err(e) => {
                        warn!(error = %e, line = %line, "Skipping malformed chat fragment");
                    }
                }
            }

            debug!(fragments, "Chat stream complete");
            let _ = tx.send(Ok(ChatChunk::Done)).await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)) as ChatStream)
    }
}
