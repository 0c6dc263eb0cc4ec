use crate::relay_client::Relay;
use crate::transcript::{ChatMessage, MessageId, Sender, Transcript};

use chrono::Local;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{instrument, Span};

pub const GREETING: &str =
    "Hai 👋 Apa kabar hari ini? Aku AI Assistant dari Sahabat Jiwa, teman yang siap mendengarkanmu kapan saja.";

/// Shown in place of a reply whenever the relay round trip fails.
pub const FALLBACK_REPLY: &str =
    "Maaf, terjadi kesalahan saat menghubungi server. Coba lagi nanti.";

pub const QUICK_REPLIES: [&str; 4] = [
    "Aku merasa cemas",
    "Susah tidur",
    "Overthinking terus",
    "Burnout kuliah",
];

pub struct ChatSession {
    relay: Arc<dyn Relay>,
    transcript: Mutex<Transcript>,
    input: Mutex<String>,
    next_id: AtomicU64,
    in_flight: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps the typing indicator on for as long as a round trip is alive,
/// including when the send future is dropped early.
struct TypingGuard<'a>(&'a AtomicUsize);

impl<'a> TypingGuard<'a> {
    fn start(in_flight: &'a AtomicUsize) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self(in_flight)
    }
}

impl Drop for TypingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ChatSession {
    pub fn new(relay: Arc<dyn Relay>) -> Self {
        let session = Self {
            relay,
            transcript: Mutex::new(Transcript::default()),
            input: Mutex::new(String::new()),
            next_id: AtomicU64::new(1),
            in_flight: AtomicUsize::new(0),
        };
        session.append(GREETING.to_string(), Sender::Bot, None);
        session
    }

    fn append(&self, text: String, sender: Sender, in_reply_to: Option<MessageId>) -> ChatMessage {
        let mut transcript = lock(&self.transcript);
        // id and position are taken under the same lock so ids follow transcript order
        let message = ChatMessage {
            id: MessageId(self.next_id.fetch_add(1, Ordering::SeqCst)),
            text,
            sender,
            timestamp: Local::now(),
            in_reply_to,
        };
        transcript.push(message.clone());
        message
    }

    /// Snapshot of the transcript in insertion order.
    pub fn messages(&self) -> Vec<ChatMessage> {
        lock(&self.transcript).messages().to_vec()
    }

    pub fn len(&self) -> usize {
        lock(&self.transcript).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.transcript).is_empty()
    }

    pub fn last_message(&self) -> Option<ChatMessage> {
        lock(&self.transcript).last().cloned()
    }

    pub fn is_typing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn set_input(&self, text: &str) {
        *lock(&self.input) = text.to_string();
    }

    pub fn input(&self) -> String {
        lock(&self.input).clone()
    }

    /// Sends whatever is in the input buffer.
    pub async fn submit(&self) -> Option<ChatMessage> {
        let text = self.input();
        self.send_message(&text).await
    }

    pub async fn quick_reply(&self, index: usize) -> Option<ChatMessage> {
        let topic = QUICK_REPLIES.get(index)?;
        self.set_input(topic);
        self.submit().await
    }

    /// Appends the user message, performs one relay round trip and appends
    /// its reply (or the fallback). Returns the bot message, or `None` when
    /// `text` is blank and nothing happened.
    #[instrument(skip_all, fields(user_id, reply_id, fallback))]
    pub async fn send_message(&self, text: &str) -> Option<ChatMessage> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let span = Span::current();
        let user_message = self.append(text.to_string(), Sender::User, None);
        span.record("user_id", user_message.id.0);
        lock(&self.input).clear();

        let _typing = TypingGuard::start(&self.in_flight);

        let (reply, fallback) = match self.relay.send(text).await {
            Ok(reply) => (reply, false),
            Err(e) => {
                tracing::error!("Error: {:?}", e);
                (FALLBACK_REPLY.to_string(), true)
            }
        };

        let bot_message = self.append(reply, Sender::Bot, Some(user_message.id));
        span.record("reply_id", bot_message.id.0);
        span.record("fallback", fallback);
        Some(bot_message)
    }
}
