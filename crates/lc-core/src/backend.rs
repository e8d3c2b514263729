use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::message::ChatMessage;
use crate::model::InstalledModel;
use crate::stream::{ChatChunk, PullEvent};

pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, Error>> + Send>>;
pub type PullStream = Pin<Box<dyn Stream<Item = Result<PullEvent, Error>> + Send>>;

/// Body of `POST /api/chat` on the chat backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    pub model: String,
    pub history: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }
}

/// The local inference server: model listing, download and removal.
#[async_trait]
pub trait InferenceServer: Send + Sync {
    fn base_url(&self) -> &str;

    /// `GET /api/tags`.
    async fn list_models(&self) -> Result<Vec<InstalledModel>, Error>;

    /// `POST /api/pull`. Resolves once the response headers arrived; HTTP
    /// errors are reported here, download progress through the stream.
    async fn pull(&self, name: &str) -> Result<PullStream, Error>;

    /// `DELETE /api/delete`.
    async fn delete(&self, name: &str) -> Result<(), Error>;

    /// Whether the server answers at all.
    async fn is_reachable(&self) -> bool {
        self.list_models().await.is_ok()
    }
}

/// The chat proxy that streams model responses.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Open a streaming chat turn. Resolves when the response starts.
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChatStream, Error>;
}
