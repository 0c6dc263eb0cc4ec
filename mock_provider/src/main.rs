use clap::Parser;
use genai_client::types::{
    Candidate, Content, ErrorDetail, ErrorResponse, GenerateContentRequest,
    GenerateContentResponse, Part,
};

use anyhow::Result;
use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::instrument;

const GENERATE_CONTENT: &str = ":generateContent";

#[derive(Clone, Debug)]
struct MockProvider {
    reply: String,
    fail: bool,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let body = ErrorResponse {
        error: ErrorDetail {
            code: status.as_u16(),
            message: message.to_string(),
            status: status.canonical_reason().map(|r| r.to_uppercase().replace(' ', "_")),
        },
    };
    (status, Json(body)).into_response()
}

#[instrument(skip_all, fields(model, prompt_chars, elapsed_time))]
async fn generate_content(
    Path(target): Path<String>,
    Json(request): Json<GenerateContentRequest>,
    provider: MockProvider,
) -> Response {
    let span = tracing::Span::current();
    let start_time = Instant::now();

    let Some(model) = target.strip_suffix(GENERATE_CONTENT) else {
        return error_response(StatusCode::NOT_FOUND, "unsupported model action");
    };
    span.record("model", model);

    let prompt_chars: usize = request
        .contents
        .iter()
        .flat_map(|content| content.parts.iter())
        .filter_map(|part| part.text.as_deref())
        .map(|text| text.chars().count())
        .sum();
    span.record("prompt_chars", prompt_chars);

    if provider.fail {
        tracing::warn!("Failing on purpose");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "mock provider failure");
    }

    let reply = GenerateContentResponse {
        candidates: vec![Candidate {
            content: Some(Content {
                role: Some("model".to_string()),
                parts: vec![Part {
                    text: Some(provider.reply.clone()),
                }],
            }),
            finish_reason: Some("STOP".to_string()),
        }],
        prompt_feedback: None,
    };

    span.record("elapsed_time", start_time.elapsed().as_secs_f32());
    tracing::info!("SUCCESS");
    Json(reply).into_response()
}

fn app(provider: MockProvider) -> Router {
    Router::new().route(
        "/v1beta/models/:target",
        post(
            move |target: Path<String>, request: Json<GenerateContentRequest>| {
                generate_content(target, request, provider.clone())
            },
        ),
    )
}

#[derive(Parser, Debug)]
struct Args {
    #[clap(short, long, default_value = "8090")]
    port: u16,
    #[clap(short, long, default_value = "Halo, aku di sini untukmu.")]
    reply: String,
    /// Answer every request with a provider error.
    #[clap(long)]
    fail: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    tracing::info!("Starting mock provider with Args={:?}", args);

    let addr = format!("127.0.0.1:{}", args.port);
    let listener = TcpListener::bind(&addr).await?;

    let provider = MockProvider {
        reply: args.reply,
        fail: args.fail,
    };

    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app(provider)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    fn request(path: &str) -> Request<Body> {
        let body = serde_json::to_string(&GenerateContentRequest::from_prompt("aku sedih")).unwrap();
        Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn provider(fail: bool) -> MockProvider {
        MockProvider {
            reply: "Halo".to_string(),
            fail,
        }
    }

    #[tokio::test]
    async fn answers_in_provider_format() {
        let response = app(provider(false))
            .oneshot(request("/v1beta/models/gemini-2.5-flash:generateContent"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let reply: GenerateContentResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(genai_client::reply_text(&reply).unwrap(), "Halo");
    }

    #[tokio::test]
    async fn fail_mode_and_unknown_action() {
        let response = app(provider(true))
            .oneshot(request("/v1beta/models/gemini-2.5-flash:generateContent"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = app(provider(false))
            .oneshot(request("/v1beta/models/gemini-2.5-flash:countTokens"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
