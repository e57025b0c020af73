use crate::config::Config;
use crate::conversation::{ConversationState, ConversationStore};
use crate::events::{EventHandler, TuiEvent};
use crate::llm::{CompletionClient, CompletionResult};
use crate::tui::Tui;
use crate::ui::conversation::{ConversationAction, ConversationManager};
use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Full-screen chat session
pub struct App {
    manager: ConversationManager,
    completions: mpsc::UnboundedReceiver<CompletionResult>,
    state_rx: watch::Receiver<ConversationState>,
    tick_rate: Duration,
}

impl App {
    pub fn new(config: &Config, client: CompletionClient) -> Self {
        let (manager, completions) = ConversationManager::new(client);
        let manager = manager.with_timestamps(config.ui.show_timestamps);
        let state_rx = manager.subscribe();

        Self {
            manager,
            completions,
            state_rx,
            tick_rate: Duration::from_millis(config.ui.tick_rate_ms.max(16)),
        }
    }

    pub async fn run(mut self, terminal: &mut Tui) -> Result<()> {
        let mut events = EventHandler::new(self.tick_rate);

        loop {
            terminal
                .draw(|frame| {
                    let area = frame.size();
                    self.manager.render(area, frame.buffer_mut());
                })
                .context("Failed to draw frame")?;

            tokio::select! {
                Some(event) = events.next() => {
                    if handle_event(&mut self.manager, event) == ConversationAction::Exit {
                        break;
                    }
                }
                Some(result) = self.completions.recv() => self.manager.resolve(result),
                Ok(()) = self.state_rx.changed() => {
                    let _ = self.state_rx.borrow_and_update();
                    self.manager.on_state_change();
                }
                else => break,
            }
        }

        tracing::info!(
            messages = self.manager.snapshot().messages.len(),
            "chat session ended"
        );
        Ok(())
    }
}

fn handle_event(manager: &mut ConversationManager, event: TuiEvent) -> ConversationAction {
    match event {
        TuiEvent::Key(key) if is_quit(&key) => ConversationAction::Exit,
        TuiEvent::Key(key) => manager.handle_key(key),
        TuiEvent::Paste(text) => {
            manager.handle_paste(&text);
            ConversationAction::None
        }
        TuiEvent::Tick => {
            manager.tick();
            ConversationAction::None
        }
        TuiEvent::Resize => ConversationAction::None,
    }
}

fn is_quit(key: &KeyEvent) -> bool {
    key.code == KeyCode::Esc
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}

/// Run a single turn without the TUI and return the assistant's message
pub async fn ask(client: &CompletionClient, prompt: &str) -> Result<String> {
    let store = ConversationStore::new();
    let prompt = store
        .append_user_message(prompt)
        .context("Prompt must not be empty")?;

    store.resolve(client.complete(&prompt).await)?;

    let state = store.snapshot();
    let reply = state
        .messages
        .last()
        .context("Conversation has no reply")?;
    Ok(reply.text.clone())
}
