use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use lc_core::{
    decode_pull_line, Error, InferenceServer, InstalledModel, PullEvent, PullStream, TagsResponse,
};

use crate::http::{error_from_response, join_url, network_error, streaming_client, BodyLines};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the model-management endpoints of an Ollama-compatible server.
pub struct OllamaClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct NameRequest<'a> {
    name: &'a str,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: streaming_client(),
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Timeout for the non-streaming calls (listing and deletion).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl InferenceServer for OllamaClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn list_models(&self) -> Result<Vec<InstalledModel>, Error> {
        let url = join_url(&self.base_url, "/api/tags");
        debug!(%url, "Listing models");

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| Error::serialization(e.to_string()))?;
        debug!(count = tags.models.len(), "Listed models");
        Ok(tags.models)
    }

    async fn pull(&self, name: &str) -> Result<PullStream, Error> {
        let url = join_url(&self.base_url, "/api/pull");
        info!(model = name, "Pulling model");

        let response = self
            .client
            .post(&url)
            .json(&NameRequest { name })
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let (tx, rx) = mpsc::channel::<Result<PullEvent, Error>>(64);
        let model = name.to_string();

        tokio::spawn(async move {
            let mut lines = BodyLines::new(response);
            loop {
                let next = tokio::select! {
                    _ = tx.closed() => {
                        debug!(model = %model, "Pull stream abandoned");
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

                let event = match decode_pull_line(&line) {
                    Ok(Some(event)) => event,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(model = %model, error = %e, line = %line, "Skipping malformed pull fragment");
                        continue;
                    }
                };

                let stop = matches!(event, PullEvent::Error { .. });
                if tx.send(Ok(event)).await.is_err() || stop {
                    return;
                }
            }
            debug!(model = %model, "Pull stream finished");
        });

        Ok(Box::pin(ReceiverStream::new(rx)) as PullStream)
    }

    async fn delete(&self, name: &str) -> Result<(), Error> {
        let url = join_url(&self.base_url, "/api/delete");
        info!(model = name, "Deleting model");

        let response = self
            .client
            .delete(&url)
            .timeout(self.timeout)
            .json(&NameRequest { name })
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::test_server::{start_endless, Canned, TestServer};
    use lc_core::PullStatus;

    #[tokio::test]
    async fn test_list_models() {
        let server = TestServer::start(vec![Canned::json(
            200,
            r#"{"models":[{"name":"llama3","size":4294967296,"details":{"families":["llama"],"format":"gguf","parameter_size":"8B","quantization_level":"Q4_0"}}]}"#,
        )])
        .await;

        let client = OllamaClient::new(server.base_url.clone());
        let models = client.list_models().await.unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].summary().label, "llama3 | 4.00 GB");

        let requests = server.requests().await;
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[0].path, "/api/tags");
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        // Bind and drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = OllamaClient::new(format!("http://{addr}"));
        let err = client.list_models().await.unwrap_err();
        assert!(err.is_connectivity());
        assert!(!client.is_reachable().await);
    }

    #[tokio::test]
    async fn test_pull_streams_statuses_across_chunks() {
        let server = TestServer::start(vec![Canned::streamed(
            "application/x-ndjson",
            &[
                "{\"status\":\"pulling manifest\"}\n{\"status\":\"pul",
                "ling 6a07\",\"total\":10,\"completed\":5}\n",
                "not json\n{\"status\":\"verifying sha256 digest\"}\n",
                "{\"status\":\"writing manifest\"}\n{\"status\":\"success\"}",
            ],
        )])
        .await;

        let client = OllamaClient::new(server.base_url.clone());
        let stream = client.pull("llama3").await.unwrap();
        let events: Vec<PullEvent> = stream.map(|e| e.unwrap()).collect().await;

        let statuses: Vec<String> = events
            .iter()
            .map(|e| match e {
                PullEvent::Status(s) => s.status.clone(),
                PullEvent::Error { message } => panic!("unexpected error {message}"),
            })
            .collect();
        assert_eq!(
            statuses,
            vec![
                "pulling manifest",
                "pulling 6a07",
                "verifying sha256 digest",
                "writing manifest",
                "success"
            ]
        );

        let requests = server.requests().await;
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].path, "/api/pull");
        assert_eq!(requests[0].body, r#"{"name":"llama3"}"#);
    }

    #[tokio::test]
    async fn test_pull_error_fragment_ends_stream() {
        let server = TestServer::start(vec![Canned::streamed(
            "application/x-ndjson",
            &[
                "{\"status\":\"pulling manifest\"}\n",
                "{\"error\":\"pull model manifest: file does not exist\"}\n",
                "{\"status\":\"success\"}\n",
            ],
        )])
        .await;

        let client = OllamaClient::new(server.base_url.clone());
        let events: Vec<PullEvent> = client
            .pull("nope")
            .await
            .unwrap()
            .map(|e| e.unwrap())
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            PullEvent::Error {
                message: "pull model manifest: file does not exist".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_dropping_pull_stream_closes_connection() {
        let (base_url, server) = start_endless(
            "application/x-ndjson",
            "{\"status\":\"pulling manifest\"}\n",
            "\n",
        )
        .await;

        let client = OllamaClient::new(base_url);
        let mut stream = client.pull("llama3").await.unwrap();
        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            PullEvent::Status(PullStatus::new("pulling manifest"))
        );
        drop(stream);

        assert!(server.await.unwrap(), "connection stayed open after the stream was dropped");
    }

    #[tokio::test]
    async fn test_pull_http_error() {
        let server = TestServer::start(vec![Canned::json(400, r#"{"error":"invalid model name"}"#)]).await;
        let client = OllamaClient::new(server.base_url.clone());
        let err = client.pull("???").await.err().unwrap();
        assert_eq!(err.user_message(), "invalid model name");
    }

    #[tokio::test]
    async fn test_delete() {
        let server = TestServer::start(vec![
            Canned::json(200, ""),
            Canned::json(404, r#"{"error":"model 'gone' not found"}"#),
        ])
        .await;

        let client = OllamaClient::new(server.base_url.clone());
        client.delete("llama3").await.unwrap();
        let err = client.delete("gone").await.unwrap_err();
        assert_eq!(err.user_message(), "model 'gone' not found");

        let requests = server.requests().await;
        assert_eq!(requests[0].method, "DELETE");
        assert_eq!(requests[0].path, "/api/delete");
        assert_eq!(requests[0].body, r#"{"name":"llama3"}"#);
    }
}
