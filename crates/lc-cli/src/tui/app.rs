//! TUI main event loop.

use std::io;
use std::panic;
use std::sync::Arc;

use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{debug, info};

use lc_core::{ChatBackend, InferenceServer};

use crate::clipboard;
use crate::config::Config;
use crate::events::{self, UiEvent};
use crate::manager::ManagerFocus;
use crate::prompt::PromptInput;
use crate::shell::{ChatShell, ServerStatus};
use crate::voice;

use super::events::{edit_request, key_to_action, key_to_manager_action, InputAction, ManagerAction};
use super::ui;

/// Set up panic hook to restore terminal on panic
fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
        original_hook(panic_info);
    }));
}

/// Run the TUI chat interface
pub async fn run_tui(
    config: &Config,
    inference: Arc<dyn InferenceServer>,
    backend: Arc<dyn ChatBackend>,
) -> Result<()> {
    setup_panic_hook();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, crossterm::cursor::Hide)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = event_loop(&mut terminal, config, inference, backend).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        crossterm::cursor::Show
    )?;
    terminal.show_cursor()?;

    result
}

type Tui = Terminal<CrosstermBackend<io::Stdout>>;

async fn event_loop(
    terminal: &mut Tui,
    config: &Config,
    inference: Arc<dyn InferenceServer>,
    backend: Arc<dyn ChatBackend>,
) -> Result<()> {
    let (tx, mut rx) = events::channel();
    let recognizer = voice::detect(&config.voice);
    if let Some(recognizer) = &recognizer {
        info!(recognizer = recognizer.name(), "Speech recognition available");
    }

    let mut prompt = PromptInput::new(tx.clone(), recognizer);
    let mut shell = ChatShell::new(inference, backend, tx, config.chat.default_model.clone());
    shell.probe();

    let mut keys = EventStream::new();
    let mut resized = true;

    loop {
        prompt.set_enabled(!shell.is_busy());

        // Non-short-circuiting so both stores are reset.
        let dirty = shell.take_dirty() | prompt.take_dirty();
        if dirty || resized {
            terminal.draw(|frame| ui::render(frame, &mut shell, &prompt))?;
            resized = false;
        }

        tokio::select! {
            Some(event) = rx.recv() => {
                apply_event(&mut shell, &mut prompt, event);
                // Batch whatever else is pending into this draw.
                while let Ok(event) = rx.try_recv() {
                    apply_event(&mut shell, &mut prompt, event);
                }
            }
            maybe_event = keys.next() => match maybe_event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if handle_key(&mut shell, &mut prompt, key) {
                        break;
                    }
                }
                Some(Ok(Event::Resize(..))) => resized = true,
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
        }
    }

    shell.stop();
    prompt.stop_listening();
    Ok(())
}

fn apply_event(shell: &mut ChatShell, prompt: &mut PromptInput, event: UiEvent) {
    match event {
        UiEvent::Voice { session, event } => prompt.apply_voice(session, event),
        other => shell.apply(other),
    }
}

/// Route a key press. Returns true to quit.
fn handle_key(shell: &mut ChatShell, prompt: &mut PromptInput, key: KeyEvent) -> bool {
    // Any key closes an alert.
    if shell.dismiss_alert() {
        return false;
    }

    if shell.state().server != ServerStatus::Reachable {
        return handle_notice_key(shell, key);
    }

    if shell.manager.is_visible() {
        handle_manager_key(shell, key);
        return false;
    }

    let Some(action) = key_to_action(key, shell.is_busy()) else {
        return false;
    };

    match action {
        InputAction::Quit => return true,
        InputAction::Stop => {
            shell.stop();
        }
        InputAction::NextModel => shell.select_next_model(),
        InputAction::PreviousModel => shell.select_previous_model(),
        InputAction::OpenManager => shell.manager.open(),
        InputAction::CopyCode => shell.copy_last_code_block(clipboard::copy_text),
        InputAction::ScrollUp => scroll(shell, |s| s.scroll_up(1)),
        InputAction::ScrollDown => scroll(shell, |s| s.scroll_down(1)),
        InputAction::PageUp => scroll(shell, |s| s.page_up()),
        InputAction::PageDown => scroll(shell, |s| s.page_down()),
        InputAction::ScrollToTop => scroll(shell, |s| s.scroll_to_top()),
        InputAction::ScrollToBottom => scroll(shell, |s| s.scroll_to_bottom()),
        other => {
            if let Some(alert) = prompt.handle_action(other) {
                shell.show_alert(alert);
            }
        }
    }
    false
}

fn scroll(shell: &mut ChatShell, f: impl FnOnce(&mut super::scroll::ScrollState)) {
    f(&mut shell.scroll);
    shell.mark_dirty();
}

fn handle_notice_key(shell: &mut ChatShell, key: KeyEvent) -> bool {
    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => true,
        (KeyCode::Char('c'), KeyModifiers::CONTROL) | (KeyCode::Char('d'), KeyModifiers::CONTROL) => {
            true
        }
        (KeyCode::Char('r'), _) if shell.state().server == ServerStatus::Unreachable => {
            debug!("Retrying inference server probe");
            shell.probe();
            false
        }
        _ => false,
    }
}

fn handle_manager_key(shell: &mut ChatShell, key: KeyEvent) {
    let state = shell.manager.state();
    let name_focused = state.focus == ManagerFocus::NameInput;
    let confirming = state.pending_delete.is_some();

    let Some(action) = key_to_manager_action(key, name_focused, confirming) else {
        return;
    };

    let manager = &mut shell.manager;
    let alert = match action {
        ManagerAction::Close => {
            manager.close();
            None
        }
        ManagerAction::SwitchFocus => {
            manager.switch_focus();
            None
        }
        ManagerAction::Up => {
            manager.select_previous();
            None
        }
        ManagerAction::Down => {
            manager.select_next();
            None
        }
        ManagerAction::RequestDelete => {
            manager.request_delete_selected();
            None
        }
        ManagerAction::Confirm => {
            manager.confirm_delete();
            None
        }
        ManagerAction::Cancel => {
            manager.cancel_delete();
            None
        }
        ManagerAction::Install => manager.install_from_input(),
        ManagerAction::Edit(action) => {
            if let Some(request) = edit_request(action) {
                manager.edit_name(request);
            }
            None
        }
    };

    if let Some(alert) = alert {
        shell.show_alert(alert);
    }
}
