use std::sync::Arc;
use sitechat_core::{ChatRole, ChatSession, ChatTransport, InputControls, SlotId, TurnOutcome};
use tracing::{info, warn};

use crate::bridge::{ChannelUi, UiUpdate};

/// Tallest the input box grows before it stops expanding
pub const MAX_INPUT_LINES: u16 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BubbleContent {
    /// Typing dots until the first delta arrives
    Placeholder,
    Text(String),
    Error(String),
}

#[derive(Debug, Clone)]
pub struct Bubble {
    pub slot: SlotId,
    pub role: ChatRole,
    pub content: BubbleContent,
}

pub struct App<T> {
    pub should_quit: bool,
    pub chat_open: bool,

    // Transcript
    pub bubbles: Vec<Bubble>,
    pub scroll: u16,
    pub follow_latest: bool,
    pub chat_height: u16, // inner height of the transcript, set on render
    pub chat_width: u16,

    // Input box
    pub input: String,
    pub cursor: usize, // char index into input
    pub input_enabled: bool,
    pub input_focused: bool,

    // Typing placeholder text and its dot animation
    pub placeholder: String,
    pub animation_frame: u8,

    session: Arc<ChatSession<T>>,
    ui: ChannelUi,
}

impl<T: ChatTransport + 'static> App<T> {
    pub fn new(session: Arc<ChatSession<T>>, ui: ChannelUi, placeholder: impl Into<String>) -> Self {
        Self {
            should_quit: false,
            chat_open: false,
            bubbles: Vec::new(),
            scroll: 0,
            follow_latest: true,
            chat_height: 0,
            chat_width: 0,
            input: String::new(),
            cursor: 0,
            input_enabled: true,
            input_focused: false,
            placeholder: placeholder.into(),
            animation_frame: 0,
            session,
            ui,
        }
    }

    pub fn set_chat_open(&mut self, open: bool) {
        self.chat_open = open;
        self.input_focused = open;
        if open {
            self.follow_latest = true;
        }
    }

    pub fn toggle_chat(&mut self) {
        self.set_chat_open(!self.chat_open);
    }

    /// Start a turn for the current input.
    ///
    /// The input locks here, before the turn task runs, so a second Enter or
    /// more typing can't land before the session's own updates arrive.
    pub fn submit(&mut self) {
        if !self.input_enabled || self.input.trim().is_empty() {
            return;
        }
        self.input_enabled = false;

        let text = self.input.clone();
        let session = self.session.clone();
        let mut ui = self.ui.clone();
        tokio::spawn(async move {
            let report = session.send(&text, &mut ui).await;
            match report.outcome {
                TurnOutcome::Failed(error) => warn!(%error, "turn failed"),
                // No turn ran, so nothing else will unlock the input
                outcome @ (TurnOutcome::Ignored | TurnOutcome::Busy) => {
                    info!(?outcome, "turn not started");
                    ui.set_enabled(true);
                }
                outcome => info!(
                    ?outcome,
                    deltas = report.deltas,
                    parse_failures = report.parse_failures,
                    "turn finished"
                ),
            }
        });
    }

    pub fn apply(&mut self, update: UiUpdate) {
        match update {
            UiUpdate::CreateSlot { slot, role } => {
                let content = match role {
                    ChatRole::User => BubbleContent::Text(String::new()),
                    ChatRole::Assistant => BubbleContent::Placeholder,
                };
                self.bubbles.push(Bubble { slot, role, content });
                // Appending always reveals the new bubble
                self.follow_latest = true;
            }
            UiUpdate::SetContent { slot, text, is_error } => {
                if let Some(bubble) = self.bubbles.iter_mut().rev().find(|b| b.slot == slot) {
                    bubble.content = if is_error {
                        BubbleContent::Error(text)
                    } else {
                        BubbleContent::Text(text)
                    };
                }
            }
            UiUpdate::ScrollToLatest => self.follow_latest = true,
            UiUpdate::ClearInput => {
                self.input.clear();
                self.cursor = 0;
            }
            UiUpdate::SetEnabled(enabled) => self.input_enabled = enabled,
            UiUpdate::FocusInput => self.input_focused = self.chat_open,
        }
    }

    /// Rows the input box needs, borders included. Shrinks back once cleared.
    pub fn input_height(&self) -> u16 {
        let lines = self.input.split('\n').count() as u16;
        lines.clamp(1, MAX_INPUT_LINES) + 2
    }

    // Input editing

    pub fn insert_char(&mut self, c: char) {
        if !self.input_enabled {
            return;
        }
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if !self.input_enabled || self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.remove(byte_pos);
    }

    pub fn delete(&mut self) {
        if !self.input_enabled || self.cursor >= self.input.chars().count() {
            return;
        }
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.remove(byte_pos);
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    /// (row, column) of the cursor inside the input text
    pub fn cursor_row_col(&self) -> (u16, u16) {
        let before: String = self.input.chars().take(self.cursor).collect();
        let row = before.matches('\n').count();
        let col = before.rsplit('\n').next().map(|l| l.chars().count()).unwrap_or(0);
        (row as u16, col as u16)
    }

    // Transcript scrolling

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_latest = false;
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines);
    }

    /// Clamp scroll to content, or pin to the bottom while following
    pub fn settle_scroll(&mut self, total_lines: u16) {
        let max_scroll = total_lines.saturating_sub(self.chat_height);
        if self.follow_latest || self.scroll >= max_scroll {
            self.scroll = max_scroll;
            self.follow_latest = true;
        }
    }

    pub fn tick_animation(&mut self) {
        self.animation_frame = (self.animation_frame + 1) % 3;
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
