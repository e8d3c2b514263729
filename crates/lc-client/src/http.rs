//! Shared HTTP plumbing: client construction, error bodies, and line
//! reassembly over streamed response bodies.

use std::collections::VecDeque;

use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{debug, trace, warn};

use lc_core::{Error, LineBuffer};

/// Build a client suited to streamed bodies.
///
/// Decompression is disabled so chunks reach us as the server flushes them.
pub fn streaming_client() -> Client {
    Client::builder()
        .http1_only()
        .no_gzip()
        .no_brotli()
        .no_deflate()
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to a default HTTP client");
            Client::new()
        })
}

pub fn join_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Map a transport failure.
pub fn network_error(err: reqwest::Error) -> Error {
    Error::network(err.to_string())
}

/// Turn a non-success response into an error, preferring the server's
/// `{"error": "..."}` message.
pub async fn error_from_response(response: Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    parse_error(status.as_u16(), &body, status.canonical_reason())
}

pub fn parse_error(status: u16, body: &str, reason: Option<&str>) -> Error {
    #[derive(Deserialize)]
    struct ErrorResponse {
        error: String,
    }

    if let Ok(err) = serde_json::from_str::<ErrorResponse>(body) {
        return Error::api(status, err.error);
    }

    let body = body.trim();
    if body.is_empty() {
        Error::api(status, reason.unwrap_or("request failed").to_string())
    } else {
        Error::api(status, body.to_string())
    }
}

/// Lines of a streamed response body, reassembled across chunk boundaries.
pub struct BodyLines {
    response: Response,
    buffer: LineBuffer,
    ready: VecDeque<String>,
    finished: bool,
    byte_count: usize,
}

impl BodyLines {
    pub fn new(response: Response) -> Self {
        Self {
            response,
            buffer: LineBuffer::new(),
            ready: VecDeque::new(),
            finished: false,
            byte_count: 0,
        }
    }

    /// Next complete line, or `None` once the body ended. A trailing
    /// unterminated line is delivered last.
    pub async fn next_line(&mut self) -> Result<Option<String>, Error> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Ok(Some(line));
            }
            if self.finished {
                return Ok(None);
            }

            match self.response.chunk().await {
                Ok(Some(chunk)) => {
                    self.byte_count += chunk.len();
                    trace!(bytes = chunk.len(), total = self.byte_count, "Received body chunk");
                    self.ready.extend(self.buffer.push(&chunk));
                }
                Ok(None) => {
                    debug!(total = self.byte_count, "Body ended");
                    self.finished = true;
                    self.ready.extend(self.buffer.finish());
                }
                Err(e) => {
                    self.finished = true;
                    return Err(Error::stream(e.to_string()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{Canned, TestServer};

    #[test]
    fn test_parse_error_json_body() {
        let err = parse_error(404, r#"{"error":"model \"x\" not found"}"#, Some("Not Found"));
        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "model \"x\" not found");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_plain_body() {
        let err = parse_error(502, "bad gateway\n", None);
        assert_eq!(err.user_message(), "bad gateway");
    }

    #[test]
    fn test_parse_error_empty_body_uses_reason() {
        let err = parse_error(500, "", Some("Internal Server Error"));
        assert_eq!(err.user_message(), "Internal Server Error");
    }

    #[tokio::test]
    async fn test_streaming_client_speaks_plain_http1() {
        let server = TestServer::start(vec![Canned::json(200, "{}")]).await;
        let response = streaming_client()
            .get(join_url(&server.base_url, "/api/tags"))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());

        let requests = server.requests().await;
        assert_eq!(requests[0].version, "HTTP/1.1");
        assert!(requests[0]
            .headers
            .iter()
            .all(|h| !h.starts_with("accept-encoding:")));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://localhost:11434/", "/api/tags"), "http://localhost:11434/api/tags");
        assert_eq!(join_url("http://h:1", "/api/chat"), "http://h:1/api/chat");
    }
}
