//! The chat shell: conversation state, model selection and streaming turns.

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lc_core::{
    ChatBackend, ChatChunk, ChatMessage, ChatRequest, Error, InferenceServer, InstalledModel,
    ModelSummary, Store, Transcript,
};

use crate::events::{ChatEvent, UiEvent, UiSender};
use crate::manager::ModelManager;
use crate::markdown::extract_code_blocks;
use crate::tui::scroll::ScrollState;

pub const GENERATION_STOPPED: &str = "Generation stopped";
pub const EMPTY_TRANSCRIPT: &str = "What can I help with?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerStatus {
    #[default]
    Probing,
    Reachable,
    Unreachable,
}

#[derive(Debug, Clone, Default)]
pub struct ShellState {
    pub server: ServerStatus,
    pub probe_error: Option<String>,
    pub models: Vec<ModelSummary>,
    pub selected: usize,
    pub transcript: Transcript,
    /// Request sent, response not opened yet.
    pub loading: bool,
    /// Response opened, body still arriving.
    pub streaming: bool,
    pub status_message: Option<String>,
    pub alert: Option<String>,
}

/// The in-flight turn. Only events carrying its id are applied.
struct ActiveTurn {
    id: u64,
    cancel: CancellationToken,
    response: String,
    opened: bool,
}

pub struct ChatShell {
    state: Store<ShellState>,
    pub manager: ModelManager,
    pub scroll: ScrollState,
    inference: Arc<dyn InferenceServer>,
    backend: Arc<dyn ChatBackend>,
    tx: UiSender,
    default_model: String,
    next_turn: u64,
    active: Option<ActiveTurn>,
}

impl ChatShell {
    pub fn new(
        inference: Arc<dyn InferenceServer>,
        backend: Arc<dyn ChatBackend>,
        tx: UiSender,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            state: Store::new(ShellState::default()),
            manager: ModelManager::new(Arc::clone(&inference), tx.clone()),
            scroll: ScrollState::default(),
            inference,
            backend,
            tx,
            default_model: default_model.into(),
            next_turn: 1,
            active: None,
        }
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    /// Whether anything visible changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        let shell = self.state.take_dirty();
        let manager = self.manager.take_dirty();
        shell || manager
    }

    pub fn mark_dirty(&mut self) {
        self.state.mark_dirty();
    }

    pub fn server_url(&self) -> &str {
        self.inference.base_url()
    }

    pub fn is_busy(&self) -> bool {
        self.state.loading || self.state.streaming
    }

    /// Check the inference server in the background.
    pub fn probe(&mut self) {
        // The previous error stays so a retry keeps the notice on screen.
        self.state.write().server = ServerStatus::Probing;

        let inference = Arc::clone(&self.inference);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = inference.list_models().await.map_err(|e| e.user_message());
            let _ = tx.send(UiEvent::Probed(result));
        });
    }

    fn apply_probe(&mut self, result: Result<Vec<InstalledModel>, String>) {
        match result {
            Ok(models) => {
                info!(
                    url = self.inference.base_url(),
                    count = models.len(),
                    "Inference server reachable"
                );
                let state = self.state.write();
                state.server = ServerStatus::Reachable;
                state.probe_error = None;
                self.set_models(&models);
                self.manager.apply_listed(&Ok(models));
            }
            Err(e) => {
                warn!(url = self.inference.base_url(), error = %e, "Inference server unreachable");
                let state = self.state.write();
                state.server = ServerStatus::Unreachable;
                state.probe_error = Some(e);
            }
        }
    }

    /// Replace the selectable models, keeping the current choice when it is
    /// still installed.
    fn set_models(&mut self, models: &[InstalledModel]) {
        let current = self.state.models.get(self.state.selected).map(|m| m.value.clone());
        let models: Vec<ModelSummary> = models.iter().map(ModelSummary::from).collect();
        let selected = current
            .and_then(|value| models.iter().position(|m| m.value == value))
            .unwrap_or(0);

        let state = self.state.write();
        state.models = models;
        state.selected = selected;
    }

    /// The model name sent with the next turn.
    pub fn selected_model(&self) -> &str {
        self.state
            .models
            .get(self.state.selected)
            .map(|m| m.value.as_str())
            .unwrap_or(self.default_model.as_str())
    }

    pub fn select_next_model(&mut self) {
        let count = self.state.models.len();
        if count > 1 {
            let state = self.state.write();
            state.selected = (state.selected + 1) % count;
        }
    }

    pub fn select_previous_model(&mut self) {
        let count = self.state.models.len();
        if count > 1 {
            let state = self.state.write();
            state.selected = (state.selected + count - 1) % count;
        }
    }

    /// Start a chat turn. Returns false for blank text, which changes nothing.
    pub fn submit_prompt(&mut self, text: &str) -> bool {
        let prompt = text.trim();
        if prompt.is_empty() {
            return false;
        }

        if let Some(previous) = self.active.take() {
            debug!(turn = previous.id, "Replacing in-flight turn");
            previous.cancel.cancel();
        }

        let model = self.selected_model().to_string();
        let state = self.state.write();
        state.transcript.push(ChatMessage::user(prompt));
        state.loading = true;
        state.streaming = false;
        state.status_message = None;
        let request = ChatRequest::new(prompt, model).with_history(state.transcript.to_vec());
        self.scroll.scroll_to_bottom();

        let id = self.next_turn;
        self.next_turn += 1;
        let cancel = CancellationToken::new();
        self.active = Some(ActiveTurn {
            id,
            cancel: cancel.clone(),
            response: String::new(),
            opened: false,
        });

        info!(turn = id, model = %request.model, "Sending chat turn");
        tokio::spawn(run_turn(
            Arc::clone(&self.backend),
            request,
            id,
            cancel,
            self.tx.clone(),
        ));
        true
    }

    /// Abort the in-flight turn. Nothing from it is applied afterwards.
    pub fn stop(&mut self) -> bool {
        let Some(turn) = self.active.take() else {
            return false;
        };
        turn.cancel.cancel();
        info!(turn = turn.id, "Generation stopped");

        let state = self.state.write();
        state.loading = false;
        state.streaming = false;
        state.status_message = Some(GENERATION_STOPPED.to_string());
        true
    }

    /// Apply one event from a background task.
    pub fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::PromptSubmitted(text) => {
                self.submit_prompt(&text);
            }
            UiEvent::Probed(result) => self.apply_probe(result),
            UiEvent::ModelsListed(result) => {
                if let Ok(models) = &result {
                    self.set_models(models);
                }
                self.manager.apply_listed(&result);
            }
            UiEvent::Chat { turn, event } => self.apply_chat(turn, event),
            UiEvent::Install(event) => {
                if let Some(alert) = self.manager.apply_install(event) {
                    self.show_alert(alert);
                }
            }
            UiEvent::Deleted { name, result } => {
                if let Some(alert) = self.manager.apply_deleted(&name, result) {
                    self.show_alert(alert);
                }
            }
            // Owned by the prompt input.
            UiEvent::Voice { .. } => {}
        }
    }

    fn apply_chat(&mut self, turn: u64, event: ChatEvent) {
        let Some(active) = self.active.as_mut().filter(|a| a.id == turn) else {
            debug!(turn, "Dropping event of inactive turn");
            return;
        };

        match event {
            ChatEvent::Opened => {
                active.opened = true;
                let state = self.state.write();
                state.loading = false;
                state.streaming = true;
                state.transcript.push(ChatMessage::assistant(""));
            }
            ChatEvent::Delta(text) => {
                active.response.push_str(&text);
                self.state
                    .write()
                    .transcript
                    .replace_last_assistant(&active.response);
            }
            ChatEvent::Done => {
                debug!(turn, chars = active.response.len(), "Turn complete");
                self.active = None;
                let state = self.state.write();
                state.loading = false;
                state.streaming = false;
            }
            ChatEvent::Failed(message) => {
                let content = format!("Error: {}", message);
                let reuse_placeholder = active.opened && active.response.is_empty();
                self.active = None;

                let state = self.state.write();
                state.loading = false;
                state.streaming = false;
                if reuse_placeholder {
                    state.transcript.replace_last_assistant(&content);
                } else {
                    state.transcript.push(ChatMessage::assistant(content));
                }
            }
        }
    }

    /// The last code block of the newest assistant message that has one.
    pub fn last_code_block(&self) -> Option<String> {
        self.state
            .transcript
            .messages()
            .iter()
            .rev()
            .filter(|m| !m.is_user())
            .find_map(|m| extract_code_blocks(&m.content).pop())
    }

    /// Copy the newest code block with `copy`, reporting in the status bar.
    pub fn copy_last_code_block(&mut self, copy: impl FnOnce(&str) -> Result<(), Error>) {
        let message = match self.last_code_block() {
            None => "No code block to copy".to_string(),
            Some(block) => match copy(&block) {
                Ok(()) => "Copied code block to clipboard".to_string(),
                Err(e) => {
                    warn!(error = %e, "Copy failed");
                    e.to_string()
                }
            },
        };
        self.state.write().status_message = Some(message);
    }

    pub fn show_alert(&mut self, alert: impl Into<String>) {
        self.state.write().alert = Some(alert.into());
    }

    pub fn dismiss_alert(&mut self) -> bool {
        if self.state.alert.is_none() {
            return false;
        }
        self.state.write().alert = None;
        true
    }
}

async fn run_turn(
    backend: Arc<dyn ChatBackend>,
    request: ChatRequest,
    turn: u64,
    cancel: CancellationToken,
    tx: UiSender,
) {
    let send = |event| {
        let _ = tx.send(UiEvent::Chat { turn, event });
    };

    let mut stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = backend.stream_chat(request) => match result {
            Ok(stream) => stream,
            Err(e) => {
                warn!(turn, backend = backend.name(), error = %e, "Chat request failed");
                send(ChatEvent::Failed(e.user_message()));
                return;
            }
        },
    };
    send(ChatEvent::Opened);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(turn, "Turn cancelled");
                return;
            }
            item = stream.next() => match item {
                Some(Ok(ChatChunk::Delta { text })) => send(ChatEvent::Delta(text)),
                Some(Ok(ChatChunk::Done)) | None => {
                    send(ChatEvent::Done);
                    return;
                }
                Some(Err(e)) => {
                    warn!(turn, error = %e, "Chat stream broke");
                    send(ChatEvent::Failed(e.user_message()));
                    return;
                }
            },
        }
    }
}
