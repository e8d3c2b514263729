//! Test utilities shared across the workspace.
//! Only compiled when running tests or with the `testing` feature.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::backend::{ChatBackend, ChatRequest, ChatStream, InferenceServer, PullStream};
use crate::error::Error;
use crate::model::InstalledModel;
use crate::stream::{ChatChunk, PullEvent, PullStatus};

/// What the next `stream_chat` call produces.
enum ChatScript {
    Chunks(Vec<Result<ChatChunk, Error>>),
    Channel(mpsc::Receiver<Result<ChatChunk, Error>>),
    Fail(Error),
}

/// A chat backend that replays queued scripts.
pub struct MockChatBackend {
    scripts: Mutex<VecDeque<ChatScript>>,
    /// Captured requests (for assertion).
    pub captured_requests: Mutex<Vec<ChatRequest>>,
}

impl MockChatBackend {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            captured_requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a response made of text deltas followed by `Done`.
    pub fn queue_deltas(&self, deltas: &[&str]) {
        let mut chunks: Vec<Result<ChatChunk, Error>> = deltas
            .iter()
            .map(|d| Ok(ChatChunk::Delta { text: d.to_string() }))
            .collect();
        chunks.push(Ok(ChatChunk::Done));
        self.scripts.lock().unwrap().push_back(ChatScript::Chunks(chunks));
    }

    /// Queue a raw chunk sequence.
    pub fn queue_chunks(&self, chunks: Vec<Result<ChatChunk, Error>>) {
        self.scripts.lock().unwrap().push_back(ChatScript::Chunks(chunks));
    }

    /// Queue a response whose chunks the test feeds by hand.
    pub fn queue_channel(&self) -> mpsc::Sender<Result<ChatChunk, Error>> {
        let (tx, rx) = mpsc::channel(32);
        self.scripts.lock().unwrap().push_back(ChatScript::Channel(rx));
        tx
    }

    /// Queue a failure to open the stream.
    pub fn queue_error(&self, error: Error) {
        self.scripts.lock().unwrap().push_back(ChatScript::Fail(error));
    }

    pub fn request_count(&self) -> usize {
        self.captured_requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.captured_requests.lock().unwrap().last().cloned()
    }
}

impl Default for MockChatBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatBackend for MockChatBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stream_chat(&self, request: ChatRequest) -> Result<ChatStream, Error> {
        self.captured_requests.lock().unwrap().push(request);
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(ChatScript::Chunks(chunks)) => Ok(Box::pin(futures::stream::iter(chunks))),
            Some(ChatScript::Channel(rx)) => Ok(Box::pin(ReceiverStream::new(rx))),
            Some(ChatScript::Fail(error)) => Err(error),
            None => Err(Error::network("No mock chat response queued")),
        }
    }
}

/// An inference server backed by an in-memory model list.
pub struct MockInferenceServer {
    pub models: Mutex<Vec<InstalledModel>>,
    pub reachable: Mutex<bool>,
    pull_scripts: Mutex<VecDeque<Result<Vec<Result<PullEvent, Error>>, Error>>>,
    delete_results: Mutex<VecDeque<Result<(), Error>>>,
    pub list_calls: Mutex<usize>,
    pub pull_calls: Mutex<Vec<String>>,
    pub delete_calls: Mutex<Vec<String>>,
}

impl MockInferenceServer {
    pub fn new() -> Self {
        Self {
            models: Mutex::new(Vec::new()),
            reachable: Mutex::new(true),
            pull_scripts: Mutex::new(VecDeque::new()),
            delete_results: Mutex::new(VecDeque::new()),
            list_calls: Mutex::new(0),
            pull_calls: Mutex::new(Vec::new()),
            delete_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_models(self, models: Vec<InstalledModel>) -> Self {
        *self.models.lock().unwrap() = models;
        self
    }

    pub fn unreachable() -> Self {
        let server = Self::new();
        *server.reachable.lock().unwrap() = false;
        server
    }

    /// Queue the status lines of the next pull.
    pub fn queue_pull_statuses(&self, statuses: &[&str]) {
        let events = statuses
            .iter()
            .map(|s| Ok(PullEvent::Status(PullStatus::new(*s))))
            .collect();
        self.pull_scripts.lock().unwrap().push_back(Ok(events));
    }

    pub fn queue_pull_events(&self, events: Vec<Result<PullEvent, Error>>) {
        self.pull_scripts.lock().unwrap().push_back(Ok(events));
    }

    /// Queue a pull that fails before streaming.
    pub fn queue_pull_error(&self, error: Error) {
        self.pull_scripts.lock().unwrap().push_back(Err(error));
    }

    pub fn queue_delete_result(&self, result: Result<(), Error>) {
        self.delete_results.lock().unwrap().push_back(result);
    }

    pub fn list_count(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }

    pub fn delete_count(&self) -> usize {
        self.delete_calls.lock().unwrap().len()
    }
}

impl Default for MockInferenceServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceServer for MockInferenceServer {
    fn base_url(&self) -> &str {
        "http://mock"
    }

    async fn list_models(&self) -> Result<Vec<InstalledModel>, Error> {
        *self.list_calls.lock().unwrap() += 1;
        if !*self.reachable.lock().unwrap() {
            return Err(Error::network("connection refused"));
        }
        Ok(self.models.lock().unwrap().clone())
    }

    async fn pull(&self, name: &str) -> Result<PullStream, Error> {
        self.pull_calls.lock().unwrap().push(name.to_string());
        let script = self.pull_scripts.lock().unwrap().pop_front();
        match script {
            Some(Ok(events)) => {
                let succeeded = events.iter().any(
                    |e| matches!(e, Ok(PullEvent::Status(status)) if status.is_success()),
                );
                if succeeded {
                    self.models
                        .lock()
                        .unwrap()
                        .push(InstalledModel::new(name, 1024 * 1024 * 1024));
                }
                Ok(Box::pin(futures::stream::iter(events)))
            }
            Some(Err(error)) => Err(error),
            None => Err(Error::network("No mock pull response queued")),
        }
    }

    async fn delete(&self, name: &str) -> Result<(), Error> {
        self.delete_calls.lock().unwrap().push(name.to_string());
        let result = self.delete_results.lock().unwrap().pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            self.models.lock().unwrap().retain(|m| m.name != name);
        }
        result
    }
}
