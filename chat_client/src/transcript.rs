use chrono::{DateTime, Local};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: MessageId,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Local>,
    /// For bot replies, the user message whose round trip produced them.
    pub in_reply_to: Option<MessageId>,
}

impl ChatMessage {
    pub fn display_time(&self) -> String {
        self.timestamp.format("%H:%M").to_string()
    }

    pub fn to_line(&self) -> String {
        let name = match self.sender {
            Sender::User => "Kamu",
            Sender::Bot => "AI Assistant",
        };
        format!("[{}] {}: {}", self.display_time(), name, self.text)
    }
}

/// Append-only, insertion-ordered list of messages.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub(crate) fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
