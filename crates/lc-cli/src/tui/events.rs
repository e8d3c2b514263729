//! Keyboard input mapped to actions.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tui_input::InputRequest;

/// Input action from keyboard events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    /// Character input
    Char(char),
    /// Backspace
    Backspace,
    /// Delete
    Delete,
    /// Move cursor left
    Left,
    /// Move cursor right
    Right,
    /// Move cursor to start of line
    Home,
    /// Move cursor to end of line
    End,
    /// Delete word before cursor
    DeleteWord,
    /// Move cursor forward one word
    WordForward,
    /// Move cursor backward one word
    WordBackward,
    /// Submit input
    Submit,
    /// Navigate history up
    HistoryUp,
    /// Navigate history down
    HistoryDown,
    /// Start or stop dictation
    ToggleVoice,
    /// Scroll transcript up
    ScrollUp,
    /// Scroll transcript down
    ScrollDown,
    PageUp,
    PageDown,
    ScrollToTop,
    ScrollToBottom,
    NextModel,
    PreviousModel,
    /// Open the model-management modal
    OpenManager,
    /// Copy the last code block
    CopyCode,
    /// Stop the current generation
    Stop,
    /// Quit the application
    Quit,
}

/// The line-editing request for an action, if it edits text.
pub fn edit_request(action: InputAction) -> Option<InputRequest> {
    let request = match action {
        InputAction::Char(c) => InputRequest::InsertChar(c),
        InputAction::Backspace => InputRequest::DeletePrevChar,
        InputAction::Delete => InputRequest::DeleteNextChar,
        InputAction::Left => InputRequest::GoToPrevChar,
        InputAction::Right => InputRequest::GoToNextChar,
        InputAction::WordBackward => InputRequest::GoToPrevWord,
        InputAction::WordForward => InputRequest::GoToNextWord,
        InputAction::Home => InputRequest::GoToStart,
        InputAction::End => InputRequest::GoToEnd,
        InputAction::DeleteWord => InputRequest::DeletePrevWord,
        _ => return None,
    };
    Some(request)
}

/// Map a key press in the chat view. `busy` is true while a turn is
/// loading or streaming.
pub fn key_to_action(key: KeyEvent, busy: bool) -> Option<InputAction> {
    match (key.code, key.modifiers) {
        // Quit
        (KeyCode::Char('d'), KeyModifiers::CONTROL) => Some(InputAction::Quit),
        (KeyCode::Char('q'), KeyModifiers::CONTROL) => Some(InputAction::Quit),

        // Stop
        (KeyCode::Char('c'), KeyModifiers::CONTROL) if busy => Some(InputAction::Stop),
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(InputAction::Quit),
        (KeyCode::Esc, _) if busy => Some(InputAction::Stop),

        // Shell
        (KeyCode::Char('n'), KeyModifiers::CONTROL) => Some(InputAction::NextModel),
        (KeyCode::Char('p'), KeyModifiers::CONTROL) => Some(InputAction::PreviousModel),
        (KeyCode::Char('o'), KeyModifiers::CONTROL) => Some(InputAction::OpenManager),
        (KeyCode::Char('y'), KeyModifiers::CONTROL) => Some(InputAction::CopyCode),
        (KeyCode::Char('l'), KeyModifiers::CONTROL) => Some(InputAction::ToggleVoice),

        // Submit
        (KeyCode::Enter, KeyModifiers::NONE) => Some(InputAction::Submit),

        // Navigation
        (KeyCode::Up, KeyModifiers::NONE) => Some(InputAction::HistoryUp),
        (KeyCode::Down, KeyModifiers::NONE) => Some(InputAction::HistoryDown),
        (KeyCode::Left, KeyModifiers::NONE) => Some(InputAction::Left),
        (KeyCode::Right, KeyModifiers::NONE) => Some(InputAction::Right),
        (KeyCode::Left, KeyModifiers::CONTROL) => Some(InputAction::WordBackward),
        (KeyCode::Right, KeyModifiers::CONTROL) => Some(InputAction::WordForward),
        (KeyCode::Home, KeyModifiers::NONE) => Some(InputAction::Home),
        (KeyCode::End, KeyModifiers::NONE) => Some(InputAction::End),

        // Scrolling
        (KeyCode::Up, KeyModifiers::SHIFT) => Some(InputAction::ScrollUp),
        (KeyCode::Down, KeyModifiers::SHIFT) => Some(InputAction::ScrollDown),
        (KeyCode::PageUp, _) => Some(InputAction::PageUp),
        (KeyCode::PageDown, _) => Some(InputAction::PageDown),
        (KeyCode::Home, KeyModifiers::CONTROL) => Some(InputAction::ScrollToTop),
        (KeyCode::End, KeyModifiers::CONTROL) => Some(InputAction::ScrollToBottom),

        // Editing
        (KeyCode::Backspace, KeyModifiers::NONE) => Some(InputAction::Backspace),
        (KeyCode::Delete, KeyModifiers::NONE) => Some(InputAction::Delete),
        (KeyCode::Char('w'), KeyModifiers::CONTROL) => Some(InputAction::DeleteWord),

        // Characters (only when idle)
        (KeyCode::Char(c), KeyModifiers::NONE) if !busy => Some(InputAction::Char(c)),
        (KeyCode::Char(c), KeyModifiers::SHIFT) if !busy => Some(InputAction::Char(c)),

        _ => None,
    }
}

/// Keys of the model-management modal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerAction {
    Close,
    SwitchFocus,
    Up,
    Down,
    RequestDelete,
    Confirm,
    Cancel,
    Install,
    /// Editing of the model name field
    Edit(InputAction),
}

/// Map a key press while the modal is open. `name_focused` is true when the
/// model name field has focus, `confirming` while a delete awaits an answer.
pub fn key_to_manager_action(
    key: KeyEvent,
    name_focused: bool,
    confirming: bool,
) -> Option<ManagerAction> {
    if confirming {
        return match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => Some(ManagerAction::Confirm),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(ManagerAction::Cancel),
            _ => None,
        };
    }

    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => Some(ManagerAction::Close),
        (KeyCode::Tab, _) | (KeyCode::BackTab, _) => Some(ManagerAction::SwitchFocus),
        (KeyCode::Enter, _) if name_focused => Some(ManagerAction::Install),
        _ if name_focused => key_to_action(key, false)
            .filter(|action| edit_request(*action).is_some())
            .map(ManagerAction::Edit),
        (KeyCode::Up, _) | (KeyCode::Char('k'), KeyModifiers::NONE) => Some(ManagerAction::Up),
        (KeyCode::Down, _) | (KeyCode::Char('j'), KeyModifiers::NONE) => Some(ManagerAction::Down),
        (KeyCode::Char('d'), KeyModifiers::NONE) | (KeyCode::Delete, _) => {
            Some(ManagerAction::RequestDelete)
        }
        _ => None,
    }
}
