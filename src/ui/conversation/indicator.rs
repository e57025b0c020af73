use ratatui::{
    style::{Color, Style},
    text::{Line, Span},
};

pub const TYPING_TEXT: &str = "Assistant is typing";

/// Animated "assistant is composing" line shown while a reply is pending
#[derive(Debug, Clone, Copy, Default)]
pub struct TypingIndicator {
    tick: u64,
}

impl TypingIndicator {
    /// Advance the animation by one frame
    pub fn tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    fn dots(&self) -> &'static str {
        match self.tick % 4 {
            0 => ".",
            1 => "..",
            2 => "...",
            _ => "   ",
        }
    }

    pub fn line(&self) -> Line<'static> {
        Line::from(vec![
            Span::styled(TYPING_TEXT, Style::default().fg(Color::Green)),
            Span::styled(self.dots(), Style::default().fg(Color::Yellow)),
        ])
    }
}
