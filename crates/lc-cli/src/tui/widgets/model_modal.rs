//! The model-management modal: installed table, download form, delete prompt.

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Cell, Clear, Gauge, Paragraph, Row, StatefulWidget, Table, TableState,
        Widget, Wrap,
    },
};

use crate::manager::{ManagerFocus, ManagerState};

const COLUMNS: [&str; 6] = ["Model", "Size", "Family", "Format", "Parameters", "Quantization"];

pub struct ModelModal<'a> {
    state: &'a ManagerState,
}

impl<'a> ModelModal<'a> {
    pub fn new(state: &'a ManagerState) -> Self {
        Self { state }
    }

    fn focus_style(&self, focus: ManagerFocus) -> Style {
        if self.state.focus == focus {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        }
    }

    fn render_installed(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Installed Models ")
            .borders(Borders::ALL)
            .border_style(self.focus_style(ManagerFocus::Installed));

        if self.state.installed.is_empty() {
            Paragraph::new(Span::styled(
                "No models installed",
                Style::default().fg(Color::DarkGray),
            ))
            .block(block)
            .render(area, buf);
            return;
        }

        let header = Row::new(COLUMNS.iter().map(|c| Cell::from(*c)))
            .style(Style::default().add_modifier(Modifier::BOLD));
        let or_na = |value: &str| {
            if value.is_empty() {
                "N/A".to_string()
            } else {
                value.to_string()
            }
        };
        let rows = self.state.installed.iter().map(|model| {
            Row::new(vec![
                Cell::from(model.name.clone()),
                Cell::from(model.size_label()),
                Cell::from(model.families_label()),
                Cell::from(or_na(&model.details.format)),
                Cell::from(or_na(&model.details.parameter_size)),
                Cell::from(or_na(&model.details.quantization_level)),
            ])
        });

        let widths = [
            Constraint::Fill(3),
            Constraint::Length(10),
            Constraint::Fill(2),
            Constraint::Length(7),
            Constraint::Length(11),
            Constraint::Length(13),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .row_highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White))
            .highlight_symbol("> ");

        let mut table_state = TableState::default().with_selected(Some(self.state.selected_row));
        StatefulWidget::render(table, area, buf, &mut table_state);
    }

    fn render_download(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Download New Model ")
            .borders(Borders::ALL)
            .border_style(self.focus_style(ManagerFocus::NameInput));
        let inner = block.inner(area);
        block.render(area, buf);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(1)])
            .split(inner);

        let value = self.state.name_input.value();
        let name_line = if value.is_empty() {
            Line::from(Span::styled("Model name...", Style::default().fg(Color::DarkGray)))
        } else {
            Line::from(Span::styled(value, Style::default().fg(Color::White)))
        };
        Paragraph::new(name_line).render(rows[0], buf);

        if self.state.focus == ManagerFocus::NameInput {
            let x = rows[0].x + self.state.name_input.visual_cursor() as u16;
            if x < rows[0].right() {
                let cursor = value
                    .chars()
                    .nth(self.state.name_input.cursor())
                    .unwrap_or(' ');
                buf.set_string(
                    x,
                    rows[0].y,
                    cursor.to_string(),
                    Style::default().bg(Color::White).fg(Color::Black),
                );
            }
        }

        if self.state.installing.is_some() || self.state.progress > 0.0 {
            Gauge::default()
                .gauge_style(Style::default().fg(Color::Green))
                .ratio((self.state.progress / 100.0).clamp(0.0, 1.0))
                .label(format!("{:.0}%", self.state.progress))
                .render(rows[1], buf);
        }

        if let Some(status) = &self.state.status_message {
            Paragraph::new(Span::styled(status.as_str(), Style::default().fg(Color::Yellow)))
                .wrap(Wrap { trim: true })
                .render(rows[2], buf);
        }
    }
}

impl Widget for ModelModal<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);

        let block = Block::default()
            .title(Span::styled(
                " Ollama Model Management ",
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .style(Style::default().bg(Color::Black));
        let inner = block.inner(area);
        block.render(area, buf);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(4),
                Constraint::Length(5),
                Constraint::Length(1),
            ])
            .split(inner);

        self.render_installed(chunks[0], buf);
        self.render_download(chunks[1], buf);

        let footer = if let Some(name) = &self.state.pending_delete {
            Line::from(vec![
                Span::styled(
                    format!("Are you sure you want to delete the model {}?", name),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
                Span::styled(" (y/n)", Style::default().fg(Color::DarkGray)),
            ])
        } else {
            Line::from(Span::styled(
                "Tab switch | Up/Down select | d delete | Enter install | Esc close",
                Style::default().fg(Color::DarkGray),
            ))
        };
        Paragraph::new(footer).render(chunks[2], buf);
    }
}
