//! Per-user conversation state. Held in memory only.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub sources: Option<Vec<String>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), sources: None }
    }

    pub fn assistant(content: impl Into<String>, sources: Option<Vec<String>>) -> Self {
        Self { role: Role::Assistant, content: content.into(), sources }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub title: String,
    pub messages: Vec<Message>,
}

pub const TITLE_CHARS: usize = 50;

#[derive(Debug, Clone, Default)]
pub struct Session {
    pub messages: Vec<Message>,
    pub indexed: bool,
    pub file_count: usize,
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub indexed: bool,
    pub file_count: usize,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.indexed { "RAG mode active" } else { "Chat mode active" };
        write!(f, "{mode}\nFiles indexed: {}", self.file_count)
    }
}

impl Session {
    pub fn new() -> Self { Self::default() }

    /// Clear the transcript. Saved conversations and the index stay.
    pub fn new_chat(&mut self) {
        self.messages.clear();
    }

    /// Start a turn: save a new conversation if the transcript is empty, then
    /// append the user message.
    pub fn begin_turn(&mut self, prompt: &str) {
        if self.messages.is_empty() {
            let title = prompt.chars().take(TITLE_CHARS).collect();
            self.conversations.push(Conversation { title, messages: Vec::new() });
        }
        self.messages.push(Message::user(prompt));
    }

    /// Append the assistant reply and refresh the latest conversation snapshot.
    pub fn record_answer(&mut self, text: &str, sources: Option<Vec<String>>) {
        self.messages.push(Message::assistant(text, sources));
        if let Some(last) = self.conversations.last_mut() {
            last.messages = self.messages.clone();
        }
    }

    /// Replace the transcript with saved conversation `index`. Returns false if out of range.
    pub fn open(&mut self, index: usize) -> bool {
        match self.conversations.get(index) {
            Some(c) => {
                self.messages = c.messages.clone();
                true
            }
            None => false,
        }
    }

    pub fn titles(&self) -> Vec<&str> {
        self.conversations.iter().map(|c| c.title.as_str()).collect()
    }

    pub fn status(&self) -> Status {
        Status { indexed: self.indexed, file_count: self.file_count }
    }
}
