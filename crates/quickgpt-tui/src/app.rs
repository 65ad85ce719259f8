use quickgpt_core::{InputFocus, PopupController};

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Terminal-side state wrapped around the popup controller
pub struct App {
    pub popup: PopupController,
    pub hotkey: String,
    pub input: String,
    /// Cursor position in characters, not bytes
    pub cursor: usize,
    pub should_quit: bool,
    /// Lines scrolled up from the bottom of the transcript
    pub scroll_back: u16,
}

impl App {
    pub fn new(popup: PopupController, hotkey: impl Into<String>) -> Self {
        Self {
            popup,
            hotkey: hotkey.into(),
            input: String::new(),
            cursor: 0,
            should_quit: false,
            scroll_back: 0,
        }
    }

    /// The input box has focus whenever the popup is on screen
    pub fn input_focus(&self) -> InputFocus {
        let visible = self.popup.is_visible();
        InputFocus {
            popup_visible: visible,
            text_entry_focused: visible,
        }
    }

    pub fn insert_char(&mut self, c: char) {
        let idx = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(idx, c);
        self.cursor += 1;
    }

    pub fn delete_back(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let idx = char_to_byte_index(&self.input, self.cursor);
        self.input.remove(idx);
    }

    pub fn delete_forward(&mut self) {
        if self.cursor < self.input.chars().count() {
            let idx = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(idx);
        }
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

    /// Hand the input to the controller; it is cleared only if accepted
    pub fn submit_input(&mut self) -> bool {
        if !self.popup.submit(&self.input) {
            return false;
        }
        self.input.clear();
        self.cursor = 0;
        self.scroll_back = 0;
        true
    }

    pub fn scroll_up(&mut self) {
        self.scroll_back = self.scroll_back.saturating_add(1);
    }

    pub fn scroll_down(&mut self) {
        self.scroll_back = self.scroll_back.saturating_sub(1);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use quickgpt_core::{CompletionClient, ChatTurn, RequestOrchestrator, Result, TranscriptStore};
    use std::sync::Arc;

    pub(crate) struct EchoClient;

    #[async_trait::async_trait]
    impl CompletionClient for EchoClient {
        async fn complete(&self, _model: &str, messages: &[ChatTurn]) -> Result<String> {
            Ok(messages.last().map(|m| m.content.clone()).unwrap_or_default())
        }
    }

    pub(crate) fn test_app(dir: &tempfile::TempDir) -> App {
        let store = TranscriptStore::new(dir.path().join("history.json"), "gpt-5");
        let popup = PopupController::new(
            store,
            RequestOrchestrator::new(Arc::new(EchoClient)),
            vec!["gpt-5".to_string(), "o4-mini".to_string()],
            false,
        );
        App::new(popup, "ctrl+alt+space")
    }

    #[test]
    fn test_editing_is_utf8_safe() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);

        for c in "héllo".chars() {
            app.insert_char(c);
        }
        app.cursor_left();
        app.cursor_left();
        app.delete_back();
        assert_eq!(app.input, "hélo");
        assert_eq!(app.cursor, 2);

        app.cursor_home();
        app.delete_forward();
        app.cursor_end();
        app.insert_char('!');
        assert_eq!(app.input, "élo!");
    }

    #[test]
    fn test_rejected_submit_keeps_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.input = "hello".into();
        app.cursor = 5;

        // Hidden popup refuses the submit
        assert!(!app.submit_input());
        assert_eq!(app.input, "hello");
    }
}
