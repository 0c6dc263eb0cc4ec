pub mod processor;
pub mod prompt;

use async_trait::async_trait;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tracing::instrument;

pub use processor::Processor;
pub use prompt::{Interpolation, PromptTemplate};

/// The only text a client ever sees when a chat request fails.
pub const FALLBACK_REPLY: &str = "Terjadi kesalahan di server.";

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    pub reply: String,
}

/// Text generation backend: takes a prompt, returns text, may fail.
#[async_trait]
pub trait TextProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

#[async_trait]
impl TextProvider for genai_client::Client {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        Ok(self.generate_content(prompt).await?)
    }
}

#[derive(Debug)]
pub enum ReplyOutcome {
    Replied(String),
    Failed(FailureReason),
}

#[derive(Debug, thiserror::Error)]
pub enum FailureReason {
    #[error("message is empty")]
    EmptyMessage,

    #[error("message has {length} characters, limit is {limit}")]
    MessageTooLong { length: usize, limit: usize },

    #[error("malformed request body: {0}")]
    MalformedRequest(String),

    #[error("provider call failed: {0:#}")]
    Provider(anyhow::Error),
}

impl FailureReason {
    pub fn status(&self) -> StatusCode {
        match self {
            FailureReason::EmptyMessage | FailureReason::MalformedRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            FailureReason::MessageTooLong { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            FailureReason::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The client sent something unusable; the relay itself is fine.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, FailureReason::Provider(_))
    }
}

impl IntoResponse for ReplyOutcome {
    fn into_response(self) -> Response {
        match self {
            ReplyOutcome::Replied(reply) => {
                (StatusCode::OK, Json(ChatResponse { reply })).into_response()
            }
            ReplyOutcome::Failed(reason) => {
                if reason.is_rejection() {
                    tracing::warn!("Rejected: {}", reason);
                } else {
                    tracing::error!("Error: {}", reason);
                }
                let body = ChatResponse {
                    reply: FALLBACK_REPLY.to_string(),
                };
                (reason.status(), Json(body)).into_response()
            }
        }
    }
}

pub fn app(processor: Processor) -> Router {
    Router::new()
        .route(
            "/chat",
            post(
                move |request: Result<Json<ChatRequest>, JsonRejection>| {
                    chat_handler(request, processor.clone())
                },
            ),
        )
        .layer(CorsLayer::permissive())
}

#[instrument(skip_all)]
async fn chat_handler(
    request: Result<Json<ChatRequest>, JsonRejection>,
    processor: Processor,
) -> ReplyOutcome {
    let request = match request {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return ReplyOutcome::Failed(FailureReason::MalformedRequest(rejection.body_text()))
        }
    };

    tracing::debug!("Processing request: {:?}", &request);

    processor.process_request(request).await
}
