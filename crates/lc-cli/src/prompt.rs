//! The prompt input: line editing, submission history and dictation.

use std::sync::Arc;

use tracing::{debug, warn};
use tui_input::Input;

use lc_core::Store;

use crate::events::{UiEvent, UiSender, VoiceEvent};
use crate::tui::events::{edit_request, InputAction};
use crate::voice::{RecognitionHandle, SpeechRecognizer, SPEECH_UNAVAILABLE};

/// Maximum number of remembered submissions
const MAX_HISTORY_ENTRIES: usize = 1000;

#[derive(Debug, Clone)]
pub struct PromptState {
    pub input: Input,
    pub listening: bool,
    pub enabled: bool,
}

impl Default for PromptState {
    fn default() -> Self {
        Self {
            input: Input::default(),
            listening: false,
            enabled: true,
        }
    }
}

pub struct PromptInput {
    state: Store<PromptState>,
    history: InputHistory,
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    recognition: Option<RecognitionHandle>,
    next_session: u64,
    tx: UiSender,
}

impl PromptInput {
    pub fn new(tx: UiSender, recognizer: Option<Arc<dyn SpeechRecognizer>>) -> Self {
        Self {
            state: Store::new(PromptState::default()),
            history: InputHistory::new(),
            recognizer,
            recognition: None,
            next_session: 1,
            tx,
        }
    }

    pub fn state(&self) -> &PromptState {
        &self.state
    }

    pub fn take_dirty(&mut self) -> bool {
        self.state.take_dirty()
    }

    pub fn value(&self) -> &str {
        self.state.input.value()
    }

    pub fn voice_available(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Disabled while the shell is busy with a turn.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.state.enabled != enabled {
            self.state.write().enabled = enabled;
        }
    }

    /// Apply an editing action. Returns an alert to show, if any.
    pub fn handle_action(&mut self, action: InputAction) -> Option<String> {
        if !self.state.enabled {
            return None;
        }

        let request = match action {
            InputAction::HistoryUp => {
                let current = self.state.input.value().to_string();
                if let Some(entry) = self.history.navigate_up(&current).map(str::to_string) {
                    self.state.write().input = Input::new(entry);
                }
                return None;
            }
            InputAction::HistoryDown => {
                let current = self.state.input.value().to_string();
                if let Some(entry) = self.history.navigate_down(&current).map(str::to_string) {
                    self.state.write().input = Input::new(entry);
                }
                return None;
            }
            InputAction::Submit => {
                self.submit();
                return None;
            }
            InputAction::ToggleVoice => return self.toggle_listening(),
            other => match edit_request(other) {
                Some(request) => request,
                None => return None,
            },
        };

        if matches!(action, InputAction::Char(_)) {
            self.history.reset();
        }
        self.state.write().input.handle(request);
        None
    }

    /// Emit the trimmed text if it is non-empty. The field is always cleared.
    pub fn submit(&mut self) -> bool {
        if self.state.listening {
            self.stop_listening();
        }

        let text = self.state.input.value().trim().to_string();
        self.state.write().input.reset();

        if text.is_empty() {
            return false;
        }

        self.history.add(text.clone());
        let _ = self.tx.send(UiEvent::PromptSubmitted(text));
        true
    }

    pub fn toggle_listening(&mut self) -> Option<String> {
        if self.state.listening {
            self.stop_listening();
            None
        } else {
            self.start_listening()
        }
    }

    /// Start a dictation session. Returns an alert when dictation is
    /// unavailable.
    pub fn start_listening(&mut self) -> Option<String> {
        let Some(recognizer) = self.recognizer.clone() else {
            return Some(SPEECH_UNAVAILABLE.to_string());
        };
        if self.state.listening {
            return None;
        }

        let session = self.next_session;
        self.next_session += 1;

        match recognizer.start(session, self.tx.clone()) {
            Ok(handle) => {
                debug!(session, recognizer = recognizer.name(), "Listening");
                self.recognition = Some(handle);
                self.state.write().listening = true;
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to start speech recognition");
                Some(SPEECH_UNAVAILABLE.to_string())
            }
        }
    }

    pub fn stop_listening(&mut self) {
        if let Some(handle) = self.recognition.take() {
            handle.stop();
        }
        if self.state.listening {
            self.state.write().listening = false;
        }
    }

    /// Apply an event of a dictation session. Events of any session other
    /// than the current one are ignored.
    pub fn apply_voice(&mut self, session: u64, event: VoiceEvent) {
        let current = self.recognition.as_ref().map(RecognitionHandle::session);
        if current != Some(session) {
            debug!(session, "Ignoring event from finished dictation session");
            return;
        }

        match event {
            VoiceEvent::Partial(text) => {
                self.state.write().input = Input::new(text);
            }
            VoiceEvent::Ended => {
                self.recognition = None;
                self.state.write().listening = false;
            }
            VoiceEvent::Failed(message) => {
                warn!(session, error = %message, "Speech recognition failed");
                self.recognition = None;
                self.state.write().listening = false;
            }
        }
    }
}

/// In-memory input history for up/down arrow navigation
#[derive(Clone, Debug, Default)]
pub struct InputHistory {
    entries: Vec<String>,
    position: Option<usize>,
    current_input: String,
}

impl InputHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: String) {
        if entry.trim().is_empty() {
            self.reset();
            return;
        }

        self.entries.retain(|e| *e != entry);
        self.entries.push(entry);

        if self.entries.len() > MAX_HISTORY_ENTRIES {
            let excess = self.entries.len() - MAX_HISTORY_ENTRIES;
            self.entries.drain(0..excess);
        }

        self.reset();
    }

    pub fn navigate_up(&mut self, current: &str) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }

        match self.position {
            None => {
                self.current_input = current.to_string();
                self.position = Some(self.entries.len() - 1);
                self.entries.last().map(String::as_str)
            }
            Some(pos) if pos > 0 => {
                self.position = Some(pos - 1);
                Some(&self.entries[pos - 1])
            }
            // Already at the oldest entry
            _ => Some(&self.entries[0]),
        }
    }

    pub fn navigate_down(&mut self, _current: &str) -> Option<&str> {
        match self.position {
            None => None,
            Some(pos) if pos + 1 < self.entries.len() => {
                self.position = Some(pos + 1);
                Some(&self.entries[pos + 1])
            }
            Some(_) => {
                self.position = None;
                Some(&self.current_input)
            }
        }
    }

    pub fn reset(&mut self) {
        self.position = None;
        self.current_input.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::events::{self, UiReceiver};
    use lc_core::Error;

    /// Records started sessions instead of listening.
    #[derive(Default)]
    struct FakeRecognizer {
        started: Mutex<Vec<u64>>,
        fail: bool,
    }

    impl SpeechRecognizer for FakeRecognizer {
        fn name(&self) -> &str {
            "fake"
        }

        fn start(&self, session: u64, _tx: UiSender) -> Result<RecognitionHandle, Error> {
            if self.fail {
                return Err(Error::speech("no microphone"));
            }
            self.started.lock().unwrap().push(session);
            Ok(RecognitionHandle::new(session, CancellationToken::new()))
        }
    }

    fn prompt_with(recognizer: Option<Arc<dyn SpeechRecognizer>>) -> (PromptInput, UiReceiver) {
        let (tx, rx) = events::channel();
        (PromptInput::new(tx, recognizer), rx)
    }

    fn type_text(prompt: &mut PromptInput, text: &str) {
        for c in text.chars() {
            prompt.handle_action(InputAction::Char(c));
        }
    }

    #[test]
    fn test_submit_emits_trimmed_text_and_clears() {
        let (mut prompt, mut rx) = prompt_with(None);
        type_text(&mut prompt, "  hello  ");

        assert!(prompt.submit());
        assert_eq!(prompt.value(), "");
        assert_eq!(rx.try_recv().unwrap(), UiEvent::PromptSubmitted("hello".to_string()));
    }

    #[test]
    fn test_whitespace_submit_emits_nothing_but_clears() {
        let (mut prompt, mut rx) = prompt_with(None);
        type_text(&mut prompt, "   ");

        assert!(!prompt.submit());
        assert_eq!(prompt.value(), "");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_editing_actions() {
        let (mut prompt, _rx) = prompt_with(None);
        type_text(&mut prompt, "helo");
        prompt.handle_action(InputAction::Left);
        prompt.handle_action(InputAction::Char('l'));
        assert_eq!(prompt.value(), "hello");

        prompt.handle_action(InputAction::End);
        prompt.handle_action(InputAction::Backspace);
        assert_eq!(prompt.value(), "hell");

        type_text(&mut prompt, " world");
        prompt.handle_action(InputAction::DeleteWord);
        assert_eq!(prompt.value(), "hell ");
    }

    #[test]
    fn test_disabled_input_ignores_keys() {
        let (mut prompt, mut rx) = prompt_with(None);
        prompt.set_enabled(false);
        type_text(&mut prompt, "hi");
        prompt.handle_action(InputAction::Submit);

        assert_eq!(prompt.value(), "");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_history_navigation_through_prompt() {
        let (mut prompt, _rx) = prompt_with(None);
        type_text(&mut prompt, "first");
        prompt.submit();
        type_text(&mut prompt, "second");
        prompt.submit();

        type_text(&mut prompt, "draft");
        prompt.handle_action(InputAction::HistoryUp);
        assert_eq!(prompt.value(), "second");
        prompt.handle_action(InputAction::HistoryUp);
        assert_eq!(prompt.value(), "first");
        prompt.handle_action(InputAction::HistoryDown);
        prompt.handle_action(InputAction::HistoryDown);
        assert_eq!(prompt.value(), "draft");
    }

    #[test]
    fn test_voice_unavailable_alerts() {
        let (mut prompt, _rx) = prompt_with(None);
        let alert = prompt.handle_action(InputAction::ToggleVoice);
        assert_eq!(alert.as_deref(), Some(SPEECH_UNAVAILABLE));
        assert!(!prompt.state().listening);
    }

    #[test]
    fn test_recognizer_start_failure_alerts() {
        let recognizer = Arc::new(FakeRecognizer {
            fail: true,
            ..Default::default()
        });
        let (mut prompt, _rx) = prompt_with(Some(recognizer));
        assert_eq!(prompt.start_listening().as_deref(), Some(SPEECH_UNAVAILABLE));
        assert!(!prompt.state().listening);
    }

    #[test]
    fn test_dictation_state_machine() {
        let recognizer = Arc::new(FakeRecognizer::default());
        let (mut prompt, _rx) = prompt_with(Some(recognizer.clone()));
        type_text(&mut prompt, "typed");

        assert!(prompt.toggle_listening().is_none());
        assert!(prompt.state().listening);
        let session = recognizer.started.lock().unwrap()[0];

        // Partial transcripts overwrite the field.
        prompt.apply_voice(session, VoiceEvent::Partial("what is".to_string()));
        prompt.apply_voice(session, VoiceEvent::Partial("what is rust".to_string()));
        assert_eq!(prompt.value(), "what is rust");

        prompt.apply_voice(session, VoiceEvent::Ended);
        assert!(!prompt.state().listening);

        // Late events of the finished session change nothing.
        prompt.apply_voice(session, VoiceEvent::Partial("stale".to_string()));
        assert_eq!(prompt.value(), "what is rust");
    }

    #[test]
    fn test_stop_listening_ignores_old_session() {
        let recognizer = Arc::new(FakeRecognizer::default());
        let (mut prompt, _rx) = prompt_with(Some(recognizer.clone()));

        prompt.start_listening();
        prompt.toggle_listening();
        assert!(!prompt.state().listening);

        prompt.start_listening();
        let sessions = recognizer.started.lock().unwrap().clone();
        assert_eq!(sessions.len(), 2);

        prompt.apply_voice(sessions[0], VoiceEvent::Partial("old".to_string()));
        assert_eq!(prompt.value(), "");
        prompt.apply_voice(sessions[1], VoiceEvent::Failed("mic unplugged".to_string()));
        assert!(!prompt.state().listening);
    }

    #[test]
    fn test_history_deduplication_and_pruning() {
        let mut history = InputHistory::new();
        history.add("first".to_string());
        history.add("second".to_string());
        history.add("first".to_string());
        assert_eq!(history.len(), 2);
        assert_eq!(history.navigate_up(""), Some("first"));

        let mut history = InputHistory::new();
        for i in 0..MAX_HISTORY_ENTRIES + 5 {
            history.add(format!("entry {}", i));
        }
        assert_eq!(history.len(), MAX_HISTORY_ENTRIES);
    }
}
