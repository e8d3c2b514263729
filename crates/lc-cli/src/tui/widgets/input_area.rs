//! Input area widget with line editing support.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};
use tui_input::Input;
use unicode_width::UnicodeWidthChar;

/// Input area widget with basic line editing
pub struct InputArea<'a> {
    input: &'a Input,
    prompt: &'a str,
    is_active: bool,
    is_listening: bool,
    hint: Option<&'a str>,
}

impl<'a> InputArea<'a> {
    pub fn new(input: &'a Input) -> Self {
        Self {
            input,
            prompt: "you> ",
            is_active: true,
            is_listening: false,
            hint: None,
        }
    }

    pub fn active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    pub fn listening(mut self, listening: bool) -> Self {
        self.is_listening = listening;
        if listening {
            self.prompt = "mic> ";
        }
        self
    }

    pub fn hint(mut self, hint: &'a str) -> Self {
        self.hint = Some(hint);
        self
    }
}

/// Rows the input needs at `width`, including the border and hint rows.
pub fn input_height(input_text: &str, width: u16) -> u16 {
    let prompt_len = 5; // "you> "
    let text_width = width.saturating_sub(prompt_len) as usize;

    if text_width == 0 || input_text.is_empty() {
        return 3;
    }

    let text_columns: usize = input_text
        .chars()
        .map(|c| UnicodeWidthChar::width(c).unwrap_or(0))
        .sum();
    let wrapped_lines = text_columns.div_ceil(text_width).max(1);

    ((1 + wrapped_lines + 1) as u16).clamp(3, 10)
}

impl Widget for InputArea<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(Color::DarkGray));

        let inner = block.inner(area);
        block.render(area, buf);

        let prompt_len = self.prompt.len();
        let input_value = self.input.value();
        let cursor_pos = self.input.visual_cursor();

        let prompt_style = if self.is_listening {
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
        } else if self.is_active {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        let input_style = if self.is_active {
            Style::default().fg(Color::White)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        let first_line_width = inner.width.saturating_sub(prompt_len as u16) as usize;
        let full_line_width = inner.width as usize;

        if first_line_width == 0 || full_line_width == 0 {
            return;
        }

        // Split input into wrapped lines
        let mut lines: Vec<Line> = Vec::new();
        let mut remaining = input_value;
        let mut is_first_line = true;

        while !remaining.is_empty() || is_first_line {
            let line_width = if is_first_line { first_line_width } else { full_line_width };

            let (line_text, rest) = {
                let mut width = 0;
                let mut split_byte = remaining.len();
                for (byte_idx, ch) in remaining.char_indices() {
                    let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
                    if width + ch_width > line_width {
                        split_byte = byte_idx;
                        break;
                    }
                    width += ch_width;
                }
                remaining.split_at(split_byte)
            };

            if is_first_line {
                lines.push(Line::from(vec![
                    Span::styled(self.prompt, prompt_style),
                    Span::styled(line_text.to_string(), input_style),
                ]));
                is_first_line = false;
            } else {
                lines.push(Line::from(Span::styled(line_text.to_string(), input_style)));
            }

            remaining = rest;

            if lines.len() >= inner.height.saturating_sub(1) as usize {
                break;
            }
        }

        // Reserve the last row for the hint
        let input_lines_available = inner.height.saturating_sub(1) as usize;
        let input_lines_count = lines.len().min(input_lines_available);

        for (i, line) in lines.iter().take(input_lines_count).enumerate() {
            let y = inner.y + i as u16;
            if y < inner.bottom() {
                buf.set_line(inner.x, y, line, inner.width);
            }
        }

        if self.is_active {
            let (cursor_line, cursor_col) = if cursor_pos <= first_line_width {
                (0, prompt_len + cursor_pos)
            } else {
                let pos_after_first = cursor_pos - first_line_width;
                let line_num = 1 + pos_after_first / full_line_width;
                let col = pos_after_first % full_line_width;
                (line_num, col)
            };

            let cursor_y = inner.y + cursor_line as u16;
            let cursor_x = inner.x + cursor_col as u16;

            if cursor_y < inner.bottom().saturating_sub(1) && cursor_x < inner.right() {
                let cursor_char = input_value.chars().nth(cursor_pos).unwrap_or(' ');

                buf.set_string(
                    cursor_x,
                    cursor_y,
                    cursor_char.to_string(),
                    Style::default().bg(Color::White).fg(Color::Black),
                );
            }
        }

        if let Some(hint) = self.hint {
            let hint_y = inner.y + inner.height.saturating_sub(1);
            if hint_y < inner.bottom() && hint_y > inner.y {
                buf.set_string(inner.x, hint_y, hint, Style::default().fg(Color::DarkGray));
            }
        }
    }
}
