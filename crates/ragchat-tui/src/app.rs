use std::sync::Arc;

use ragchat_core::{ChatSession, Config, RemoteClient, SendRoute, SyncEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Typing into the message composer
    Compose,
    /// Typing a document path into the upload prompt
    FilePrompt,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub session: ChatSession<RemoteClient>,

    // Composer state
    pub draft_cursor: usize, // cursor position in the draft, in chars

    // Upload prompt state
    pub file_input: String,
    pub file_input_cursor: usize,
    pub file_input_error: Option<String>,

    // Chat view state
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub seen_revision: u64,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Connection info for the header
    pub server_url: String,
    pub send_route: SendRoute,
}

impl App {
    pub fn new(config: &Config) -> Self {
        let client = RemoteClient::new(&config.server_url, config.send_route);

        Self {
            should_quit: false,
            input_mode: InputMode::Compose,
            session: ChatSession::new(Arc::new(client)),

            draft_cursor: 0,

            file_input: String::new(),
            file_input_cursor: 0,
            file_input_error: None,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            seen_revision: 0,

            animation_frame: 0,

            server_url: config.server_url.clone(),
            send_route: config.send_route,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.session.dispatcher().is_sending() || self.session.uploads().is_uploading()
    }

    /// Feed a finished network call into the session and keep the view in step.
    pub fn apply_sync(&mut self, event: SyncEvent) {
        self.session.apply(event);

        // The draft is cleared once a send completes.
        let draft_len = self.session.dispatcher().draft().chars().count();
        self.draft_cursor = self.draft_cursor.min(draft_len);

        let revision = self.session.store().revision();
        if revision != self.seen_revision {
            self.seen_revision = revision;
            self.scroll_chat_to_bottom();
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn open_file_prompt(&mut self) {
        if self.session.uploads().is_uploading() {
            return;
        }
        self.file_input = self
            .session
            .uploads()
            .selected()
            .map(|f| f.path().display().to_string())
            .unwrap_or_default();
        self.file_input_cursor = self.file_input.chars().count();
        self.file_input_error = None;
        self.input_mode = InputMode::FilePrompt;
    }

    pub fn close_file_prompt(&mut self) {
        self.file_input.clear();
        self.file_input_cursor = 0;
        self.file_input_error = None;
        self.input_mode = InputMode::Compose;
    }

    /// Estimated rendered rows of the timeline. The server decides how long
    /// the timeline is, so this saturates instead of overflowing.
    pub fn chat_line_count(&self) -> usize {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: usize = 0;

        for msg in self.session.store().current() {
            // Role line ("You:" or "Assistant:") and the blank line after
            total_lines = total_lines.saturating_add(2);
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                total_lines = total_lines.saturating_add(char_count.div_ceil(wrap_width).max(1));
            }
        }

        if self.session.dispatcher().is_sending() {
            total_lines = total_lines.saturating_add(2); // "Assistant:" + "Sending..."
        }

        total_lines
    }

    fn max_chat_scroll(&self) -> u16 {
        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };
        let max = self.chat_line_count().saturating_sub(visible_height as usize);
        u16::try_from(max).unwrap_or(u16::MAX)
    }

    pub fn scroll_chat_to_bottom(&mut self) {
        self.chat_scroll = self.max_chat_scroll();
    }

    pub fn scroll_chat_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_chat_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_chat_scroll());
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragchat_core::{Message, SelectedFile};

    fn test_app() -> App {
        App::new(&Config::new())
    }

    fn listed(messages: Vec<Message>) -> SyncEvent {
        SyncEvent::Listed { epoch: 1, result: Ok(messages) }
    }

    #[test]
    fn test_new_app_starts_composing() {
        let app = test_app();
        assert_eq!(app.input_mode, InputMode::Compose);
        assert_eq!(app.server_url, "http://127.0.0.1:8000");
        assert!(!app.is_busy());
    }

    #[test]
    fn test_snapshot_scrolls_to_bottom() {
        let mut app = test_app();
        app.chat_height = 4;
        app.chat_width = 40;

        let messages: Vec<Message> = (0..5).map(|i| Message::user(format!("msg {}", i))).collect();
        app.apply_sync(listed(messages));

        // 5 messages * 3 lines each, 4 visible
        assert_eq!(app.chat_line_count(), 15);
        assert_eq!(app.chat_scroll, 11);
        assert_eq!(app.seen_revision, 1);
    }

    #[test]
    fn test_exact_width_line_is_one_row() {
        let mut app = test_app();
        app.chat_width = 10;
        app.apply_sync(listed(vec![Message::assistant("a".repeat(10)), Message::user("b".repeat(11))]));

        // (role + 1 row + blank) + (role + 2 rows + blank)
        assert_eq!(app.chat_line_count(), 7);
    }

    #[test]
    fn test_long_timeline_saturates_scroll() {
        let mut app = test_app();
        app.chat_height = 10;
        app.chat_width = 40;

        let messages: Vec<Message> = (0..25_000).map(|i| Message::user(format!("m{}", i))).collect();
        app.apply_sync(listed(messages));

        assert_eq!(app.chat_line_count(), 75_000);
        assert_eq!(app.chat_scroll, u16::MAX);

        app.scroll_chat_down(10);
        assert_eq!(app.chat_scroll, u16::MAX);
        app.scroll_chat_up(5);
        assert_eq!(app.chat_scroll, u16::MAX - 5);
    }

    #[test]
    fn test_scroll_bounds() {
        let mut app = test_app();
        app.chat_height = 4;
        app.chat_width = 40;
        app.apply_sync(listed(vec![Message::user("a"), Message::assistant("b")]));

        app.scroll_chat_down(100);
        assert_eq!(app.chat_scroll, 2);
        app.scroll_chat_up(100);
        assert_eq!(app.chat_scroll, 0);
    }

    #[test]
    fn test_file_prompt_prefills_selection() {
        let mut app = test_app();
        app.session.uploads_mut().select(SelectedFile::new("/docs/a.pdf"));
        app.open_file_prompt();

        assert_eq!(app.input_mode, InputMode::FilePrompt);
        assert_eq!(app.file_input, "/docs/a.pdf");
        assert_eq!(app.file_input_cursor, 11);

        app.close_file_prompt();
        assert_eq!(app.input_mode, InputMode::Compose);
        assert!(app.file_input.is_empty());
    }
}
