//! UI layout rendering for the TUI.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::Paragraph,
    Frame,
};

use crate::markdown::{render_to_text, wrap_lines};
use crate::prompt::PromptInput;
use crate::shell::{ChatShell, ServerStatus, ShellState, EMPTY_TRANSCRIPT};

use super::widgets::{
    content_inner, input_height, AlertPopup, ContentArea, InputArea, ModelModal, ServerNotice,
    StatusBar,
};

const TITLE: &str = "localchat";
const IDLE_HINT: &str = "Enter send | Ctrl+L dictate | Ctrl+O models | Ctrl+N/P switch model | Ctrl+D quit";
const IDLE_HINT_NO_VOICE: &str = "Enter send | Ctrl+O models | Ctrl+N/P switch model | Ctrl+D quit";
const BUSY_HINT: &str = "Esc or Ctrl+C to stop";
const LISTENING_HINT: &str = "Listening... Ctrl+L to stop";

/// Render the entire TUI
pub fn render(frame: &mut Frame, shell: &mut ChatShell, prompt: &PromptInput) {
    let area = frame.area();

    let server = shell.state().server;
    let probe_error = shell.state().probe_error.clone();
    match server {
        ServerStatus::Reachable => render_chat(frame, area, shell, prompt),
        ServerStatus::Unreachable => {
            let notice = ServerNotice::new(shell.server_url()).error(probe_error.as_deref());
            frame.render_widget(notice, area);
        }
        ServerStatus::Probing if probe_error.is_some() => {
            let notice = ServerNotice::new(shell.server_url())
                .error(probe_error.as_deref())
                .probing(true);
            frame.render_widget(notice, area);
        }
        ServerStatus::Probing => {
            let line = Line::from(Span::styled(
                format!("Connecting to Ollama at {}...", shell.server_url()),
                Style::default().fg(Color::DarkGray),
            ));
            let y = area.y + area.height / 2;
            frame.render_widget(
                Paragraph::new(line).centered(),
                Rect::new(area.x, y, area.width, 1.min(area.height)),
            );
        }
    }

    if let Some(alert) = &shell.state().alert {
        let popup = AlertPopup::new(alert);
        let width = 60u16.min(area.width.saturating_sub(4));
        let height = popup.height(width).min(area.height);
        frame.render_widget(popup, centered_rect(width, height, area));
    }
}

fn render_chat(frame: &mut Frame, area: Rect, shell: &mut ChatShell, prompt: &PromptInput) {
    let prompt_state = prompt.state();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(5),
            Constraint::Length(input_height(prompt_state.input.value(), area.width)),
        ])
        .split(area);

    let state = shell.state();
    let model_label = state
        .models
        .get(state.selected)
        .map(|m| m.label.clone())
        .unwrap_or_else(|| shell.selected_model().to_string());
    let mut status_bar = StatusBar::new(TITLE, &model_label)
        .position(state.selected, state.models.len())
        .loading(state.loading)
        .streaming(state.streaming);
    if let Some(msg) = &state.status_message {
        status_bar = status_bar.status(msg);
    }
    frame.render_widget(status_bar, chunks[0]);

    // Measure the transcript so scrolling knows where the bottom is.
    let inner = content_inner(chunks[1]);
    let text = transcript_text(state, inner.width.max(1) as usize);
    let streaming = state.streaming;
    let content_height = text.lines.len().min(u16::MAX as usize) as u16;
    shell.scroll.set_dimensions(content_height, inner.height);

    let content = ContentArea::new(&text, EMPTY_TRANSCRIPT)
        .scroll(shell.scroll.offset())
        .streaming(streaming);
    frame.render_widget(content, chunks[1]);

    let hint = if prompt_state.listening {
        LISTENING_HINT
    } else if shell.is_busy() {
        BUSY_HINT
    } else if prompt.voice_available() {
        IDLE_HINT
    } else {
        IDLE_HINT_NO_VOICE
    };
    let input = InputArea::new(&prompt_state.input)
        .active(prompt_state.enabled)
        .listening(prompt_state.listening)
        .hint(hint);
    frame.render_widget(input, chunks[2]);

    if shell.manager.is_visible() {
        let width = (area.width * 9 / 10).max(40).min(area.width);
        let height = (area.height * 4 / 5).max(16).min(area.height);
        frame.render_widget(
            ModelModal::new(shell.manager.state()),
            centered_rect(width, height, area),
        );
    }
}

/// Transcript lines, wrapped to `width`.
fn transcript_text(state: &ShellState, width: usize) -> Text<'static> {
    let user_style = Style::default().fg(Color::Green).add_modifier(Modifier::BOLD);
    let assistant_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);

    let mut lines: Vec<Line<'static>> = Vec::new();
    for message in state.transcript.messages() {
        if message.is_user() {
            lines.push(Line::from(Span::styled("You", user_style)));
            lines.extend(message.content.lines().map(|l| Line::from(l.to_string())));
        } else {
            lines.push(Line::from(Span::styled("Assistant", assistant_style)));
            lines.extend(render_to_text(&message.content, width).lines);
        }
        lines.push(Line::default());
    }

    if state.loading {
        lines.push(Line::from(Span::styled(
            "Thinking...",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    Text::from(wrap_lines(lines, width))
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use lc_core::testing::{MockChatBackend, MockInferenceServer};
    use lc_core::InstalledModel;
    use ratatui::{backend::TestBackend, Terminal};

    use crate::events::{self, ChatEvent, UiEvent, UiReceiver};

    fn setup() -> (ChatShell, PromptInput, UiReceiver) {
        let (tx, rx) = events::channel();
        let shell = ChatShell::new(
            Arc::new(MockInferenceServer::new()),
            Arc::new(MockChatBackend::new()),
            tx.clone(),
            "llama3.2:latest",
        );
        (shell, PromptInput::new(tx, None), rx)
    }

    fn draw(shell: &mut ChatShell, prompt: &PromptInput) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| render(f, shell, prompt)).unwrap();
        let buffer = terminal.backend().buffer();
        (0..buffer.area.height)
            .map(|y| {
                (0..buffer.area.width)
                    .map(|x| buffer[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn test_unreachable_shows_only_notice() {
        let (mut shell, prompt, _rx) = setup();
        shell.apply(UiEvent::Probed(Err("connection refused".to_string())));

        let screen = draw(&mut shell, &prompt);
        assert!(screen.contains("Ollama is not active on your machine."));
        assert!(screen.contains("https://ollama.com/"));
        assert!(!screen.contains(EMPTY_TRANSCRIPT));
        assert!(!screen.contains("you>"));
        assert!(!screen.contains("Model:"));
    }

    #[tokio::test]
    async fn test_retry_keeps_notice() {
        let (mut shell, prompt, _rx) = setup();
        let screen = draw(&mut shell, &prompt);
        assert!(screen.contains("Connecting to Ollama at"));

        shell.apply(UiEvent::Probed(Err("connection refused".to_string())));
        assert!(draw(&mut shell, &prompt).contains("Press r to retry"));

        shell.probe();
        let screen = draw(&mut shell, &prompt);
        assert!(screen.contains("Ollama is not active on your machine."));
        assert!(screen.contains("Checking..."));
        assert!(screen.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_empty_transcript_placeholder() {
        let (mut shell, prompt, _rx) = setup();
        shell.apply(UiEvent::Probed(Ok(vec![InstalledModel::new("llama3", 4294967296)])));

        let screen = draw(&mut shell, &prompt);
        assert!(screen.contains(EMPTY_TRANSCRIPT));
        assert!(screen.contains("llama3 | 4.00 GB"));
        assert!(screen.contains("you>"));
        assert!(screen.contains(IDLE_HINT_NO_VOICE));
        assert!(!screen.contains("Ollama is not active"));
    }

    #[tokio::test]
    async fn test_streamed_markdown_is_rendered() {
        let (mut shell, prompt, _rx) = setup();
        shell.apply(UiEvent::Probed(Ok(Vec::new())));
        shell.submit_prompt("Say hello");
        let screen = draw(&mut shell, &prompt);
        assert!(screen.contains("Thinking..."));
        assert!(screen.contains("WAITING"));

        shell.apply(UiEvent::Chat { turn: 1, event: ChatEvent::Opened });
        shell.apply(UiEvent::Chat {
            turn: 1,
            event: ChatEvent::Delta("**Hello** there".to_string()),
        });

        let screen = draw(&mut shell, &prompt);
        assert!(screen.contains("Say hello"));
        assert!(screen.contains("Hello there"));
        assert!(!screen.contains("**"));
        assert!(!screen.contains("Thinking..."));
        assert!(screen.contains(BUSY_HINT));
        // No installed models: the configured default is shown.
        assert!(screen.contains("Model: llama3.2:latest"));
    }

    #[tokio::test]
    async fn test_overlays() {
        let (mut shell, prompt, _rx) = setup();
        shell.apply(UiEvent::Probed(Ok(Vec::new())));
        shell.manager.open();
        let screen = draw(&mut shell, &prompt);
        assert!(screen.contains("Ollama Model Management"));

        shell.show_alert("Please enter a valid model name.");
        let screen = draw(&mut shell, &prompt);
        assert!(screen.contains("Please enter a valid model name."));
    }

    #[test]
    fn test_centered_rect() {
        let rect = centered_rect(20, 10, Rect::new(0, 0, 100, 30));
        assert_eq!(rect, Rect::new(40, 10, 20, 10));
        let clamped = centered_rect(200, 50, Rect::new(0, 0, 100, 30));
        assert_eq!(clamped, Rect::new(0, 0, 100, 30));
    }
}
