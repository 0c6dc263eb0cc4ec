use anyhow::{bail, Result};
use async_trait::async_trait;
use std::fmt::Debug;

#[derive(serde::Serialize, Debug)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(serde::Deserialize, Debug)]
struct ChatResponse {
    reply: String,
}

/// One round trip to the chat relay.
#[async_trait]
pub trait Relay: Send + Sync {
    async fn send(&self, message: &str) -> Result<String>;
}

pub struct HttpClient {
    client: reqwest::Client,
    url: String,
}

impl Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("url", &self.url)
            .finish()
    }
}

impl HttpClient {
    pub fn new(address: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("http://{}/chat", address),
        }
    }

    async fn send_request(&self, message: &str) -> Result<ChatResponse> {
        let response = self
            .client
            .post(&self.url)
            .json(&ChatRequest { message })
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("relay answered with status {}", response.status());
        }

        let response = response.json().await?;
        Ok(response)
    }
}

#[async_trait]
impl Relay for HttpClient {
    async fn send(&self, message: &str) -> Result<String> {
        Ok(self.send_request(message).await?.reply)
    }
}
