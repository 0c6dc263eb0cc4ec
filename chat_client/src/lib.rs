pub mod relay_client;
pub mod repl;
pub mod session;
pub mod transcript;

pub use relay_client::{HttpClient, Relay};
pub use session::{ChatSession, FALLBACK_REPLY, GREETING, QUICK_REPLIES};
pub use transcript::{ChatMessage, MessageId, Sender, Transcript};
