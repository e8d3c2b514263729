//! Markdown rendering for assistant messages.
//!
//! Uses pulldown-cmark to parse markdown and produces ratatui `Text` directly.
//! Fenced code blocks are framed and labelled with the copy shortcut.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Label on the frame of every code block.
pub const COPY_LABEL: &str = "Ctrl+Y copy";

/// Style definitions for markdown elements.
struct MarkdownStyle {
    bold: Style,
    italic: Style,
    inline_code: Style,
    code_block: Style,
    code_frame: Style,
    h1: Style,
    h2: Style,
    h3: Style,
    h4_h6: Style,
    bullet: Style,
    blockquote: Style,
    link: Style,
    strikethrough: Style,
}

impl Default for MarkdownStyle {
    fn default() -> Self {
        Self {
            bold: Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            italic: Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::ITALIC),
            inline_code: Style::default().fg(Color::Yellow),
            code_block: Style::default().fg(Color::Yellow),
            code_frame: Style::default().fg(Color::DarkGray),
            h1: Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
            h2: Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
            h3: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            h4_h6: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::ITALIC),
            bullet: Style::default().fg(Color::Cyan),
            blockquote: Style::default().fg(Color::DarkGray),
            link: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::UNDERLINED),
            strikethrough: Style::default().add_modifier(Modifier::CROSSED_OUT),
        }
    }
}

/// Render markdown content to ratatui `Text`.
///
/// `width` sizes the code block frames. Lines are not wrapped here; see
/// [`wrap_lines`].
pub fn render_to_text(content: &str, width: usize) -> Text<'static> {
    let styles = MarkdownStyle::default();
    let parser = Parser::new_ext(content, Options::ENABLE_STRIKETHROUGH);

    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut current_spans: Vec<Span<'static>> = Vec::new();
    let mut style_stack: Vec<Style> = Vec::new();
    let mut in_code_block = false;
    let mut in_blockquote = false;

    // List tracking: stack of (is_ordered, next_number)
    let mut list_stack: Vec<(bool, u64)> = Vec::new();
    let mut pending_item_prefix: Option<Span<'static>> = None;

    let mut link_url: Option<String> = None;

    for event in parser {
        match event {
            Event::Start(Tag::Paragraph) => {
                flush_line(&mut lines, &mut current_spans);
            }
            Event::End(TagEnd::Paragraph) => {
                flush_line(&mut lines, &mut current_spans);
                if list_stack.is_empty() {
                    lines.push(Line::default());
                }
            }

            Event::Start(Tag::Heading { level, .. }) => {
                let (style, prefix) = match level {
                    HeadingLevel::H1 => (styles.h1, "# "),
                    HeadingLevel::H2 => (styles.h2, "## "),
                    HeadingLevel::H3 => (styles.h3, "### "),
                    HeadingLevel::H4 => (styles.h4_h6, "#### "),
                    HeadingLevel::H5 => (styles.h4_h6, "##### "),
                    HeadingLevel::H6 => (styles.h4_h6, "###### "),
                };
                flush_line(&mut lines, &mut current_spans);
                style_stack.push(style);
                current_spans.push(Span::styled(prefix, style));
            }
            Event::End(TagEnd::Heading(_)) => {
                style_stack.pop();
                flush_line(&mut lines, &mut current_spans);
                lines.push(Line::default());
            }

            Event::Start(Tag::Strong) => style_stack.push(styles.bold),
            Event::Start(Tag::Emphasis) => style_stack.push(styles.italic),
            Event::Start(Tag::Strikethrough) => style_stack.push(styles.strikethrough),
            Event::End(TagEnd::Strong | TagEnd::Emphasis | TagEnd::Strikethrough) => {
                style_stack.pop();
            }

            Event::Start(Tag::BlockQuote(_)) => {
                in_blockquote = true;
                style_stack.push(styles.blockquote);
            }
            Event::End(TagEnd::BlockQuote(_)) => {
                in_blockquote = false;
                style_stack.pop();
                flush_line(&mut lines, &mut current_spans);
            }

            Event::Start(Tag::CodeBlock(kind)) => {
                flush_line(&mut lines, &mut current_spans);
                let language = match kind {
                    CodeBlockKind::Fenced(lang) => lang.split_whitespace().next().unwrap_or("").to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                lines.push(code_block_header(&language, width, styles.code_frame));
                in_code_block = true;
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                let rule = "─".repeat(width.saturating_sub(1).clamp(1, 60));
                lines.push(Line::from(Span::styled(format!("╰{}", rule), styles.code_frame)));
                lines.push(Line::default());
            }

            Event::Start(Tag::List(start)) => {
                flush_line(&mut lines, &mut current_spans);
                list_stack.push((start.is_some(), start.unwrap_or(0)));
            }
            Event::End(TagEnd::List(_)) => {
                list_stack.pop();
                if list_stack.is_empty() {
                    lines.push(Line::default());
                }
            }

            Event::Start(Tag::Item) => {
                flush_line(&mut lines, &mut current_spans);
                let indent = "  ".repeat(list_stack.len().saturating_sub(1));
                if let Some((is_ordered, num)) = list_stack.last_mut() {
                    let prefix = if *is_ordered {
                        let prefix = format!("{}{}. ", indent, num);
                        *num += 1;
                        prefix
                    } else {
                        format!("{}- ", indent)
                    };
                    pending_item_prefix = Some(Span::styled(prefix, styles.bullet));
                }
            }
            Event::End(TagEnd::Item) => {
                flush_line(&mut lines, &mut current_spans);
            }

            Event::Start(Tag::Link { dest_url, .. }) => {
                link_url = Some(dest_url.to_string());
                style_stack.push(styles.link);
            }
            Event::End(TagEnd::Link) => {
                style_stack.pop();
                if let Some(url) = link_url.take() {
                    current_spans.push(Span::styled(
                        format!(" ({})", url),
                        effective_style(&style_stack),
                    ));
                }
            }

            Event::Code(text) => {
                if let Some(prefix) = pending_item_prefix.take() {
                    current_spans.push(prefix);
                }
                current_spans.push(Span::styled(text.to_string(), styles.inline_code));
            }

            Event::Text(text) => {
                if in_code_block {
                    for line in text.lines() {
                        lines.push(Line::from(vec![
                            Span::styled("│ ", styles.code_frame),
                            Span::styled(line.to_string(), styles.code_block),
                        ]));
                    }
                    continue;
                }

                if let Some(prefix) = pending_item_prefix.take() {
                    current_spans.push(prefix);
                }
                let style = effective_style(&style_stack);

                if in_blockquote {
                    for (i, line) in text.split('\n').enumerate() {
                        if i > 0 {
                            flush_line(&mut lines, &mut current_spans);
                        }
                        if current_spans.is_empty() {
                            current_spans.push(Span::styled("│ ", styles.blockquote));
                        }
                        if !line.is_empty() {
                            current_spans.push(Span::styled(line.to_string(), style));
                        }
                    }
                } else {
                    current_spans.push(Span::styled(text.to_string(), style));
                }
            }

            Event::SoftBreak => current_spans.push(Span::raw(" ")),
            Event::HardBreak => flush_line(&mut lines, &mut current_spans),

            Event::Rule => {
                flush_line(&mut lines, &mut current_spans);
                lines.push(Line::from(Span::styled(
                    "─".repeat(width.clamp(1, 40)),
                    Style::default().fg(Color::DarkGray),
                )));
                lines.push(Line::default());
            }

            _ => {}
        }
    }

    flush_line(&mut lines, &mut current_spans);

    // Remove trailing empty lines
    while lines.last().is_some_and(|l| l.spans.is_empty()) {
        lines.pop();
    }

    Text::from(lines)
}

/// The contents of every fenced or indented code block, in order.
pub fn extract_code_blocks(content: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<String> = None;

    for event in Parser::new(content) {
        match event {
            Event::Start(Tag::CodeBlock(_)) => current = Some(String::new()),
            Event::Text(text) => {
                if let Some(block) = current.as_mut() {
                    block.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(block) = current.take() {
                    blocks.push(block.trim_end_matches('\n').to_string());
                }
            }
            _ => {}
        }
    }

    blocks
}

/// Wrap lines to `width` display columns, preferring breaks at spaces.
pub fn wrap_lines(lines: Vec<Line<'static>>, width: usize) -> Vec<Line<'static>> {
    lines
        .into_iter()
        .flat_map(|line| {
            wrap_spans(&line.spans, width)
                .into_iter()
                .map(Line::from)
                .collect::<Vec<_>>()
        })
        .collect()
}

fn code_block_header(language: &str, width: usize, style: Style) -> Line<'static> {
    let lead = if language.is_empty() {
        "╭─".to_string()
    } else {
        format!("╭─ {} ", language)
    };
    let label = format!(" {} ─", COPY_LABEL);
    let used = UnicodeWidthStr::width(lead.as_str()) + UnicodeWidthStr::width(label.as_str());
    let fill = width.min(60).saturating_sub(used).max(1);

    Line::from(vec![
        Span::styled(lead, style),
        Span::styled("─".repeat(fill), style),
        Span::styled(label, style.fg(Color::Cyan)),
    ])
}

/// Flush the current span accumulator into a completed line.
fn flush_line(lines: &mut Vec<Line<'static>>, spans: &mut Vec<Span<'static>>) {
    if spans.is_empty() {
        return;
    }
    lines.push(Line::from(std::mem::take(spans)));
}

/// Compute the effective style by patching all styles on the stack together.
fn effective_style(stack: &[Style]) -> Style {
    stack
        .iter()
        .fold(Style::default(), |style, s| style.patch(*s))
}

/// Find a byte offset for breaking `text` at approximately `avail` display-width characters.
/// Prefers breaking at a space; falls back to hard-breaking at the width limit.
fn find_break_point(text: &str, avail: usize) -> usize {
    let mut width_so_far = 0usize;
    let mut last_space_byte = None;
    let mut byte_at_avail = text.len();

    for (byte_idx, ch) in text.char_indices() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width_so_far + ch_width > avail {
            byte_at_avail = byte_idx;
            break;
        }
        if ch == ' ' && byte_idx > 0 {
            last_space_byte = Some(byte_idx);
        }
        width_so_far += ch_width;
    }

    last_space_byte.unwrap_or(byte_at_avail)
}

/// Wrap a sequence of styled spans to fit within `width` visible characters.
fn wrap_spans(spans: &[Span<'static>], width: usize) -> Vec<Vec<Span<'static>>> {
    let total: usize = spans
        .iter()
        .map(|s| UnicodeWidthStr::width(s.content.as_ref()))
        .sum();
    if width == 0 || total <= width {
        return vec![spans.to_vec()];
    }

    let mut result: Vec<Vec<Span<'static>>> = Vec::new();
    let mut current_line: Vec<Span<'static>> = Vec::new();
    let mut current_width: usize = 0;

    for span in spans {
        let mut remaining = span.content.as_ref();
        while !remaining.is_empty() {
            let avail = width.saturating_sub(current_width);
            if avail == 0 {
                result.push(std::mem::take(&mut current_line));
                current_width = 0;
                remaining = remaining.trim_start();
                continue;
            }

            let rem_width = UnicodeWidthStr::width(remaining);
            if rem_width <= avail {
                current_line.push(Span::styled(remaining.to_string(), span.style));
                current_width += rem_width;
                break;
            }

            let mut break_pos = find_break_point(remaining, avail);
            if break_pos == 0 && current_width == 0 {
                // A single character wider than the line.
                break_pos = remaining.chars().next().map_or(remaining.len(), char::len_utf8);
            }
            let (chunk, rest) = remaining.split_at(break_pos);
            if !chunk.is_empty() {
                current_line.push(Span::styled(chunk.to_string(), span.style));
            }
            result.push(std::mem::take(&mut current_line));
            current_width = 0;
            remaining = rest.trim_start();
        }
    }

    if !current_line.is_empty() || result.is_empty() {
        result.push(current_line);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &Text) -> Vec<String> {
        text.lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn test_render_heading_styles() {
        let text = render_to_text("# Title", 80);
        assert_eq!(plain(&text), vec!["# Title"]);
        assert!(text.lines[0].spans.iter().all(|s| s.style.fg == Some(Color::Green)));
    }

    #[test]
    fn test_render_inline_code() {
        let text = render_to_text("Use `code` here", 80);
        let code_spans: Vec<_> = text
            .lines
            .iter()
            .flat_map(|l| l.spans.iter())
            .filter(|s| s.style.fg == Some(Color::Yellow))
            .collect();
        assert!(code_spans.iter().any(|s| s.content.contains("code")));
    }

    #[test]
    fn test_render_lists() {
        let text = render_to_text("- one\n- two\n\n1. first\n2. second", 80);
        let lines = plain(&text);
        assert!(lines.contains(&"- one".to_string()));
        assert!(lines.contains(&"- two".to_string()));
        assert!(lines.contains(&"1. first".to_string()));
        assert!(lines.contains(&"2. second".to_string()));
    }

    #[test]
    fn test_render_blockquote_and_link() {
        let text = render_to_text("> quoted\n\nsee [docs](https://ollama.com)", 80);
        let lines = plain(&text);
        assert!(lines.contains(&"│ quoted".to_string()));
        assert!(lines.contains(&"see docs (https://ollama.com)".to_string()));
    }

    #[test]
    fn test_code_block_is_framed_with_copy_label() {
        let text = render_to_text("Try:\n\n```rust\nlet x = 1;\n\nlet y = 2;\n```\n", 40);
        let lines = plain(&text);
        let header = lines.iter().find(|l| l.starts_with("╭─ rust")).unwrap();
        assert!(header.ends_with(&format!("{} ─", COPY_LABEL)));
        assert!(lines.contains(&"│ let x = 1;".to_string()));
        assert!(lines.contains(&"│ ".to_string()));
        assert!(lines.contains(&"│ let y = 2;".to_string()));
        assert!(lines.last().unwrap().starts_with('╰'));
    }

    #[test]
    fn test_extract_code_blocks() {
        let content = "a\n```sh\nls -la\n```\nb\n```\nfn main() {}\nmore\n```";
        assert_eq!(
            extract_code_blocks(content),
            vec!["ls -la".to_string(), "fn main() {}\nmore".to_string()]
        );
        assert!(extract_code_blocks("no code").is_empty());
    }

    #[test]
    fn test_wrap_lines_at_spaces() {
        let lines = vec![Line::from("the quick brown fox")];
        let wrapped = wrap_lines(lines, 10);
        let plain: Vec<String> = wrapped
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect();
        assert_eq!(plain, vec!["the quick", "brown fox"]);
    }

    #[test]
    fn test_wrap_hard_breaks_long_words() {
        let wrapped = wrap_lines(vec![Line::from("abcdefghij")], 4);
        assert_eq!(wrapped.len(), 3);
        assert!(wrapped.iter().all(|l| l.width() <= 4));
    }

    #[test]
    fn test_empty_content() {
        assert!(render_to_text("", 80).lines.is_empty());
    }
}
