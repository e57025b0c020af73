use crate::conversation::{ConversationState, ConversationStore};
use crate::llm::{CompletionClient, CompletionResult};
use crate::ui::conversation::{
    get_help_text, ComposerResult, ConversationComposer, HistoryView, SlashCommand,
    TypingIndicator,
};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::Widget,
};
use tokio::sync::{mpsc, watch};

const PAGE: usize = 5;

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    Exit,
}

/// Manages the conversation flow and UI components
pub struct ConversationManager {
    store: ConversationStore,
    client: CompletionClient,
    composer: ConversationComposer,
    indicator: TypingIndicator,
    results: mpsc::UnboundedSender<CompletionResult>,
    scroll: usize,
    show_help: bool,
    show_timestamps: bool,
}

impl ConversationManager {
    /// Create a manager and the receiver on which finished completions arrive
    pub fn new(client: CompletionClient) -> (Self, mpsc::UnboundedReceiver<CompletionResult>) {
        let (results, rx) = mpsc::unbounded_channel();
        let manager = Self {
            store: ConversationStore::new(),
            client,
            composer: ConversationComposer::new(),
            indicator: TypingIndicator::default(),
            results,
            scroll: 0,
            show_help: false,
            show_timestamps: true,
        };
        (manager, rx)
    }

    pub fn with_timestamps(mut self, show: bool) -> Self {
        self.show_timestamps = show;
        self
    }

    /// Start a turn for `text`; returns false if the store rejected it
    pub fn submit(&mut self, text: &str) -> bool {
        let Some(prompt) = self.store.append_user_message(text) else {
            return false;
        };
        self.composer.set_disabled(true);

        let client = self.client.clone();
        let results = self.results.clone();
        tokio::spawn(async move {
            let result = client.complete(&prompt).await;
            if results.send(result).is_err() {
                tracing::debug!("completion finished after the UI shut down");
            }
        });
        true
    }

    /// Apply a finished completion to the store
    pub fn resolve(&mut self, result: CompletionResult) {
        if let Err(e) = self.store.resolve(result) {
            tracing::error!(error = %e, "dropping completion result");
        }
        self.composer.set_disabled(self.store.snapshot().pending);
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        match key.code {
            KeyCode::PageUp => self.scroll = self.scroll.saturating_add(PAGE),
            KeyCode::PageDown => self.scroll = self.scroll.saturating_sub(PAGE),
            KeyCode::Up => self.scroll = self.scroll.saturating_add(1),
            KeyCode::Down => self.scroll = self.scroll.saturating_sub(1),
            _ => match self.composer.handle_key(key) {
                ComposerResult::Submitted(input) => {
                    self.submit(&input);
                }
                ComposerResult::Command(command) => return self.handle_slash_command(command),
                ComposerResult::None => {}
            },
        }
        ConversationAction::None
    }

    pub fn handle_paste(&mut self, text: &str) {
        self.composer.paste(text);
    }

    fn handle_slash_command(&mut self, command: SlashCommand) -> ConversationAction {
        match command {
            SlashCommand::Bye => ConversationAction::Exit,
            SlashCommand::Help => {
                self.show_help = !self.show_help;
                ConversationAction::None
            }
        }
    }

    /// Snap back to the newest message after the conversation changed
    pub fn on_state_change(&mut self) {
        self.scroll = 0;
    }

    pub fn tick(&mut self) {
        if self.store.snapshot().pending {
            self.indicator.tick();
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.store.subscribe()
    }

    pub fn snapshot(&self) -> ConversationState {
        self.store.snapshot()
    }

    /// Render the conversation UI components
    pub fn render(&mut self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),    // History area
                Constraint::Length(3), // Composer area
                Constraint::Length(1), // Status line
            ])
            .split(area);

        let state = self.store.snapshot();
        let history = HistoryView::new(&state, self.indicator)
            .show_timestamps(self.show_timestamps);
        self.scroll = self.scroll.min(history.max_scroll(chunks[0]));
        history.scroll(self.scroll).render(chunks[0], buf);

        (&self.composer).render(chunks[1], buf);

        let status = if self.show_help {
            get_help_text()
        } else {
            format!(
                "{} · Enter send · PgUp/PgDn scroll · /help · Esc quit",
                self.client.model()
            )
        };
        let line = Line::from(Span::styled(status, Style::default().fg(Color::DarkGray)));
        buf.set_line(chunks[2].x, chunks[2].y, &line, chunks[2].width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompletionConfig;
    use crate::conversation::{Sender, APOLOGY};
    use crossterm::event::KeyModifiers;
    use serde_json::json;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn client(endpoint: String) -> CompletionClient {
        CompletionClient::new(CompletionConfig {
            endpoint,
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 150,
            timeout: None,
            api_key: Some("test-key".to_string()),
        })
        .unwrap()
    }

    async fn replying(content: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": content } }]
            })))
            .mount(&server)
            .await;
        server
    }

    fn screen(manager: &mut ConversationManager, area: Rect) -> String {
        let mut buf = Buffer::empty(area);
        manager.render(area, &mut buf);
        (area.y..area.y + area.height)
            .map(|y| {
                (area.x..area.x + area.width)
                    .map(|x| buf.get(x, y).symbol().to_string())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn summary(state: &ConversationState) -> Vec<(String, Sender)> {
        state
            .messages
            .iter()
            .map(|m| (m.text.clone(), m.sender))
            .collect()
    }

    #[tokio::test]
    async fn hello_turn_end_to_end() {
        let server = replying("hi!").await;
        let (mut manager, mut results) =
            ConversationManager::new(client(format!("{}/v1/chat/completions", server.uri())));

        assert!(manager.submit("hello"));
        let state = manager.snapshot();
        assert_eq!(summary(&state), vec![("hello".to_string(), Sender::User)]);
        assert!(state.pending);

        let result = results.recv().await.unwrap();
        manager.resolve(result);

        let state = manager.snapshot();
        assert_eq!(
            summary(&state),
            vec![
                ("hello".to_string(), Sender::User),
                ("hi!".to_string(), Sender::Assistant)
            ]
        );
        assert!(!state.pending);
    }

    #[tokio::test]
    async fn transport_failure_ends_in_apology() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());
        drop(listener);

        let (mut manager, mut results) = ConversationManager::new(client(endpoint));
        assert!(manager.submit("hello"));
        manager.resolve(results.recv().await.unwrap());

        let state = manager.snapshot();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].text, APOLOGY);
        assert!(!state.pending);
    }

    #[tokio::test]
    async fn second_submission_rejected_until_resolved() {
        let server = replying("one").await;
        let (mut manager, mut results) =
            ConversationManager::new(client(format!("{}/v1/chat/completions", server.uri())));

        assert!(manager.submit("first"));
        assert!(!manager.submit("second"));
        assert_eq!(manager.snapshot().messages.len(), 1);

        manager.resolve(results.recv().await.unwrap());
        assert!(manager.submit("second"));
        manager.resolve(results.recv().await.unwrap());
        assert_eq!(manager.snapshot().messages.len(), 4);
    }

    #[tokio::test]
    async fn typing_and_enter_starts_a_turn() {
        let server = replying("ok").await;
        let (mut manager, mut results) =
            ConversationManager::new(client(format!("{}/v1/chat/completions", server.uri())));

        for c in "ping".chars() {
            manager.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }
        let action = manager.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
        assert_eq!(action, ConversationAction::None);
        assert!(manager.snapshot().pending);

        manager.resolve(results.recv().await.unwrap());
        assert_eq!(manager.snapshot().messages[1].text, "ok");
    }

    #[tokio::test]
    async fn bye_command_requests_exit() {
        let (mut manager, _results) =
            ConversationManager::new(client("http://127.0.0.1:9/".to_string()));
        for c in "/bye".chars() {
            manager.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }
        let action = manager.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
        assert_eq!(action, ConversationAction::Exit);
        assert!(manager.snapshot().messages.is_empty());
    }

    #[tokio::test]
    async fn stray_result_does_not_add_messages() {
        let (mut manager, _results) =
            ConversationManager::new(client("http://127.0.0.1:9/".to_string()));
        manager.resolve(Ok("unexpected".to_string()));
        assert!(manager.snapshot().messages.is_empty());
    }

    #[tokio::test]
    async fn new_message_snaps_scrolled_view_to_bottom() {
        let server = replying("reply").await;
        let (manager, mut results) =
            ConversationManager::new(client(format!("{}/v1/chat/completions", server.uri())));
        let mut manager = manager.with_timestamps(false);
        let area = Rect::new(0, 0, 40, 14);

        for turn in 0..4 {
            assert!(manager.submit(&format!("turn {}", turn)));
            manager.resolve(results.recv().await.unwrap());
        }
        assert!(screen(&mut manager, area).contains("turn 3"));

        for _ in 0..4 {
            manager.handle_key(KeyEvent::new(KeyCode::PageUp, KeyModifiers::NONE));
        }
        let scrolled = screen(&mut manager, area);
        assert!(scrolled.contains("turn 0"));
        assert!(!scrolled.contains("turn 3"));

        let mut rx = manager.subscribe();
        assert!(manager.submit("newest"));
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().pending);
        manager.on_state_change();

        let snapped = screen(&mut manager, area);
        assert!(snapped.contains("newest"));
        assert!(!snapped.contains("turn 0"));
    }
}
