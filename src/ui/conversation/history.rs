//! Conversation history display component

use crate::conversation::{ConversationState, Message, Sender};
use crate::ui::conversation::indicator::TypingIndicator;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

pub const WELCOME: &str = "Hello! Ask me anything to get started.";

/// Renders a conversation snapshot, bottom-aligned.
///
/// `scroll` counts lines up from the newest line; zero keeps the view pinned
/// to the bottom.
pub struct HistoryView<'a> {
    state: &'a ConversationState,
    indicator: TypingIndicator,
    scroll: usize,
    show_timestamps: bool,
}

impl<'a> HistoryView<'a> {
    pub fn new(state: &'a ConversationState, indicator: TypingIndicator) -> Self {
        Self {
            state,
            indicator,
            scroll: 0,
            show_timestamps: true,
        }
    }

    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }

    pub fn show_timestamps(mut self, show: bool) -> Self {
        self.show_timestamps = show;
        self
    }

    fn block() -> Block<'static> {
        Block::default().borders(Borders::ALL).title(" Chat ")
    }

    /// Largest useful scroll offset for `area`
    pub fn max_scroll(&self, area: Rect) -> usize {
        let inner = Self::block().inner(area);
        self.lines(inner.width)
            .len()
            .saturating_sub(inner.height as usize)
    }

    fn lines(&self, width: u16) -> Vec<Line<'static>> {
        let mut all_lines = Vec::new();
        if self.state.messages.is_empty() {
            all_lines.push(Line::from(Span::styled(
                WELCOME,
                Style::default().fg(Color::Gray),
            )));
        }

        for message in &self.state.messages {
            all_lines.extend(self.render_message(message, width));
            // spacing between messages
            all_lines.push(Line::default());
        }

        if self.state.pending {
            all_lines.push(self.indicator.line());
        }
        all_lines
    }

    /// Render a single message into lines
    fn render_message(&self, message: &Message, width: u16) -> Vec<Line<'static>> {
        let mut header = vec![Span::styled(
            message.sender.display_name(),
            sender_style(message.sender).add_modifier(Modifier::BOLD),
        )];
        if self.show_timestamps {
            header.push(Span::styled(
                format!(" {}", message.sent_at.format("%H:%M")),
                Style::default().fg(Color::DarkGray),
            ));
        }

        let mut lines = vec![Line::from(header)];
        for content_line in wrap_text(&message.text, width.saturating_sub(2) as usize) {
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(content_line, sender_style(message.sender)),
            ]));
        }
        lines
    }
}

impl Widget for HistoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Self::block();
        let inner_area = block.inner(area);
        block.render(area, buf);

        let all_lines = self.lines(inner_area.width);

        // Show the window ending `scroll` lines above the bottom
        let height = inner_area.height as usize;
        let end = all_lines.len().saturating_sub(self.scroll).max(height.min(all_lines.len()));
        let start = end.saturating_sub(height);

        for (i, line) in all_lines[start..end].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

fn sender_style(sender: Sender) -> Style {
    match sender {
        Sender::User => Style::default().fg(Color::Cyan),
        Sender::Assistant => Style::default().fg(Color::Green),
    }
}

/// Wrap text to fit within the given width
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current_line = String::new();
        let mut current_len = 0;

        for word in paragraph.split_whitespace() {
            let word_len = word.chars().count();
            if current_len > 0 && current_len + 1 + word_len <= width {
                current_line.push(' ');
                current_line.push_str(word);
                current_len += 1 + word_len;
                continue;
            }

            if current_len > 0 {
                lines.push(std::mem::take(&mut current_line));
            }

            // Hard-split words longer than the line
            let chars: Vec<char> = word.chars().collect();
            let mut chunks = chars.chunks(width).peekable();
            current_len = 0;
            while let Some(chunk) = chunks.next() {
                if chunks.peek().is_some() {
                    lines.push(chunk.iter().collect());
                } else {
                    current_line = chunk.iter().collect();
                    current_len = chunk.len();
                }
            }
        }

        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
