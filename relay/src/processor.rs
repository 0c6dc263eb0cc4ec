use crate::{
    prompt::PromptTemplate, ChatRequest, FailureReason, ReplyOutcome, TextProvider,
};

use std::sync::Arc;
use std::time::Instant;
use tracing::{instrument, Span};

pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Clone)]
pub struct Processor {
    provider: Arc<dyn TextProvider>,
    prompt: Arc<PromptTemplate>,
    max_message_chars: Option<usize>,
}

impl Processor {
    pub fn new(provider: Arc<dyn TextProvider>, prompt: PromptTemplate) -> Self {
        Self {
            provider,
            prompt: Arc::new(prompt),
            max_message_chars: Some(DEFAULT_MAX_MESSAGE_CHARS),
        }
    }

    /// `0` lifts the cap.
    pub fn with_max_message_chars(mut self, limit: usize) -> Self {
        self.max_message_chars = (limit > 0).then_some(limit);
        self
    }

    #[instrument(skip_all, fields(message_chars, elapsed_time))]
    pub async fn process_request(&self, request: ChatRequest) -> ReplyOutcome {
        let span = Span::current();
        let length = request.message.chars().count();
        span.record("message_chars", length);

        if request.message.trim().is_empty() {
            return ReplyOutcome::Failed(FailureReason::EmptyMessage);
        }
        if let Some(limit) = self.max_message_chars {
            if length > limit {
                return ReplyOutcome::Failed(FailureReason::MessageTooLong { length, limit });
            }
        }

        let prompt = self.prompt.render(&request.message);

        let start_time = Instant::now();
        let result = self.provider.generate(&prompt).await;
        span.record("elapsed_time", start_time.elapsed().as_secs_f32());

        match result {
            Ok(reply) => {
                tracing::info!("SUCCESS");
                ReplyOutcome::Replied(reply)
            }
            Err(e) => ReplyOutcome::Failed(FailureReason::Provider(e)),
        }
    }
}
