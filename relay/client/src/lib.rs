pub mod types;

use std::fmt::Debug;
use std::time::Duration;

use types::{ErrorResponse, GenerateContentRequest, GenerateContentResponse};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Finish reasons that mean the candidate was withheld instead of answered.
/// Every other reason keeps whatever text the candidate carries.
const BLOCKING_FINISH_REASONS: &[&str] = &["SAFETY", "RECITATION", "LANGUAGE"];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("provider api key is not configured")]
    MissingApiKey,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("prompt blocked by provider: {0}")]
    PromptBlocked(String),

    #[error("provider returned no candidates")]
    NoCandidates,

    #[error("candidate stopped early: {0}")]
    CandidateBlocked(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    api_key: Option<String>,
    url: String,
}

impl Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.url)
            .field("api_key_set", &self.api_key.is_some())
            .finish()
    }
}

impl Client {
    pub fn new(config: Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            api_key: config.api_key.filter(|key| !key.is_empty()),
            url: format!(
                "{}/v1beta/models/{}:generateContent",
                config.base_url.trim_end_matches('/'),
                config.model
            ),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Sends `prompt` as a single user turn and returns the reply text.
    pub async fn generate_content(&self, prompt: &str) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or(Error::MissingApiKey)?;

        let response = self
            .http
            .post(&self.url)
            .header(API_KEY_HEADER, api_key)
            .json(&GenerateContentRequest::from_prompt(prompt))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(error) => error.error.message,
                Err(_) => body,
            };
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        let response: GenerateContentResponse =
            serde_json::from_str(&body).map_err(|e| Error::InvalidResponse(e.to_string()))?;
        tracing::debug!("Provider response: {:?}", response);

        reply_text(&response)
    }
}

/// Concatenated text parts of the first candidate.
pub fn reply_text(response: &GenerateContentResponse) -> Result<String> {
    let Some(candidate) = response.candidates.first() else {
        return match response
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.clone())
        {
            Some(reason) => Err(Error::PromptBlocked(reason)),
            None => Err(Error::NoCandidates),
        };
    };

    if let Some(reason) = &candidate.finish_reason {
        if BLOCKING_FINISH_REASONS.contains(&reason.as_str()) {
            return Err(Error::CandidateBlocked(reason.clone()));
        }
    }

    let text = candidate
        .content
        .iter()
        .flat_map(|content| content.parts.iter())
        .filter_map(|part| part.text.as_deref())
        .collect::<String>();

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use tokio::net::TcpListener;
    use types::{Candidate, Content, Part, PromptFeedback};

    fn candidate(texts: &[&str], finish_reason: Option<&str>) -> Candidate {
        Candidate {
            content: Some(Content {
                role: Some("model".to_string()),
                parts: texts
                    .iter()
                    .map(|t| Part {
                        text: Some(t.to_string()),
                    })
                    .collect(),
            }),
            finish_reason: finish_reason.map(str::to_string),
        }
    }

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{}", address)
    }

    fn config(base_url: String, api_key: Option<&str>) -> Config {
        Config {
            api_key: api_key.map(str::to_string),
            base_url,
            ..Config::default()
        }
    }

    #[test]
    fn joins_text_parts_of_first_candidate() {
        let response = GenerateContentResponse {
            candidates: vec![
                candidate(&["Halo, ", "aku di sini."], Some("STOP")),
                candidate(&["ignored"], Some("STOP")),
            ],
            prompt_feedback: None,
        };
        assert_eq!(reply_text(&response).unwrap(), "Halo, aku di sini.");
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let response = GenerateContentResponse {
            candidates: vec![],
            prompt_feedback: Some(PromptFeedback {
                block_reason: Some("SAFETY".to_string()),
            }),
        };
        assert!(matches!(
            reply_text(&response),
            Err(Error::PromptBlocked(reason)) if reason == "SAFETY"
        ));
        assert!(matches!(
            reply_text(&GenerateContentResponse::default()),
            Err(Error::NoCandidates)
        ));
    }

    #[test]
    fn blocking_finish_reason_is_an_error() {
        let response = GenerateContentResponse {
            candidates: vec![candidate(&["partial"], Some("RECITATION"))],
            prompt_feedback: None,
        };
        assert!(matches!(
            reply_text(&response),
            Err(Error::CandidateBlocked(reason)) if reason == "RECITATION"
        ));

        let truncated = GenerateContentResponse {
            candidates: vec![candidate(&["long answer"], Some("MAX_TOKENS"))],
            prompt_feedback: None,
        };
        assert_eq!(reply_text(&truncated).unwrap(), "long answer");

        for reason in ["OTHER", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"] {
            let response = GenerateContentResponse {
                candidates: vec![candidate(&["still text"], Some(reason))],
                prompt_feedback: None,
            };
            assert_eq!(reply_text(&response).unwrap(), "still text", "{}", reason);
        }
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_request() {
        let client = Client::new(config("http://127.0.0.1:9".to_string(), Some(""))).unwrap();
        assert!(!client.has_api_key());
        assert!(matches!(
            client.generate_content("halo").await,
            Err(Error::MissingApiKey)
        ));
    }

    #[tokio::test]
    async fn posts_prompt_with_api_key() {
        let app = Router::new().route(
            "/v1beta/models/:target",
            post(
                |Path(target): Path<String>,
                 headers: HeaderMap,
                 Json(request): Json<GenerateContentRequest>| async move {
                    assert_eq!(target, "gemini-2.5-flash:generateContent");
                    assert_eq!(headers[API_KEY_HEADER], "secret");
                    let prompt = request.contents[0].parts[0].text.clone().unwrap();
                    Json(GenerateContentResponse {
                        candidates: vec![candidate(&["echo: ", prompt.as_str()], Some("STOP"))],
                        prompt_feedback: None,
                    })
                },
            ),
        );
        let client = Client::new(config(serve(app).await, Some("secret"))).unwrap();

        let reply = client.generate_content("aku sedih").await.unwrap();
        assert_eq!(reply, "echo: aku sedih");
    }

    #[tokio::test]
    async fn provider_error_message_is_surfaced() {
        let app = Router::new().route(
            "/v1beta/models/:target",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({
                        "error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}
                    })),
                )
            }),
        );
        let client = Client::new(config(serve(app).await, Some("bad"))).unwrap();

        match client.generate_content("halo").await {
            Err(Error::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let app = Router::new().route(
            "/v1beta/models/:target",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(GenerateContentResponse::default())
            }),
        );
        let client = Client::new(Config {
            timeout: Some(Duration::from_millis(100)),
            ..config(serve(app).await, Some("secret"))
        })
        .unwrap();

        match client.generate_content("halo").await {
            Err(Error::Network(e)) => assert!(e.is_timeout()),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn undecodable_body_is_invalid_response() {
        let app = Router::new().route("/v1beta/models/:target", post(|| async { "not json" }));
        let client = Client::new(config(serve(app).await, Some("secret"))).unwrap();

        assert!(matches!(
            client.generate_content("halo").await,
            Err(Error::InvalidResponse(_))
        ));
    }
}
