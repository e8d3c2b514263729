//! Modal alert popup. Any key dismisses it.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};

pub struct AlertPopup<'a> {
    message: &'a str,
}

impl<'a> AlertPopup<'a> {
    pub fn new(message: &'a str) -> Self {
        Self { message }
    }

    /// Rows needed to show the message at `width`, borders included.
    pub fn height(&self, width: u16) -> u16 {
        let text_width = width.saturating_sub(2).max(1) as usize;
        let wrapped = self.message.chars().count().div_ceil(text_width).max(1);
        wrapped as u16 + 4
    }
}

impl Widget for AlertPopup<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);

        let lines = vec![
            Line::from(self.message.to_string()),
            Line::default(),
            Line::from(Span::styled(
                "Press any key to close",
                Style::default().fg(Color::DarkGray),
            )),
        ];

        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title(" localchat ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow)),
            )
            .style(Style::default().bg(Color::Black))
            .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_height_grows_with_message() {
        assert_eq!(AlertPopup::new("short").height(40), 5);
        let long = "x".repeat(100);
        assert_eq!(AlertPopup::new(&long).height(40), 7);
    }

    #[test]
    fn test_render_clears_background() {
        let area = Rect::new(0, 0, 40, 6);
        let mut buf = Buffer::empty(area);
        buf.set_string(0, 2, "z".repeat(40), Style::default());

        AlertPopup::new("Model removed").render(area, &mut buf);
        let row: String = (0..area.width).map(|x| buf[(x, 1)].symbol().to_string()).collect();
        assert!(row.contains("Model removed"));
        let row: String = (0..area.width).map(|x| buf[(x, 2)].symbol().to_string()).collect();
        assert!(!row.contains('z'));
    }
}
