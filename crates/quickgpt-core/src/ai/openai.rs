use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::CompletionClient;
use crate::config::API_KEY_VAR;
use crate::error::{Error, Result};
use crate::state::ChatTurn;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

/// Chat-completions client. The API key is read from the environment on every
/// call so a rotated key takes effect without a restart.
///
/// A transport that fails to initialise is kept as an error and reported by
/// each request instead of stopping the application.
#[derive(Clone)]
pub struct OpenAIClient {
    client: std::result::Result<Client, String>,
    base_url: String,
    api_key_var: String,
}

impl OpenAIClient {
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                tracing::warn!("HTTP client unavailable: {e}");
                format!("HTTP client unavailable: {e}")
            });
        Self::with_transport(client, base_url)
    }

    fn with_transport(client: std::result::Result<Client, String>, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key_var: API_KEY_VAR.to_string(),
        }
    }

    /// Read the key from a different environment variable
    pub fn with_api_key_var(mut self, var: &str) -> Self {
        self.api_key_var = var.to_string();
        self
    }

    fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::MissingCredential { var: self.api_key_var.clone() })
    }
}

#[async_trait]
impl CompletionClient for OpenAIClient {
    async fn complete(&self, model: &str, messages: &[ChatTurn]) -> Result<String> {
        let client = self.client.as_ref().map_err(|e| Error::Network(e.clone()))?;
        let api_key = self.api_key()?;

        let request = OpenAIRequest {
            model,
            messages,
            temperature: 1.0,
        };

        let response = client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Upstream { status: status.as_u16(), body: text });
        }

        let status = response.status().as_u16();
        let openai_response: OpenAIResponse = response.json().await.map_err(|e| Error::Upstream {
            status,
            body: format!("malformed response: {e}"),
        })?;
        Ok(openai_response.choices.into_iter().next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}
