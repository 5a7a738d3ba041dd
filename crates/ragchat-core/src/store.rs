//! The conversation timeline as last fetched from the server.

use crate::state::Message;

/// Holds the server's snapshot of the conversation.
///
/// The store never edits, merges or reorders what it is given: every
/// successful list wholly replaces the previous snapshot. `revision` bumps on
/// each replacement so views can tell when to redraw or re-scroll.
#[derive(Debug, Default, Clone)]
pub struct ConversationStore {
    messages: Vec<Message>,
    revision: u64,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.revision += 1;
    }

    pub fn current(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}
