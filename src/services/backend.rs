use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when talking to the completion backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Request(reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Text completion capability used for scoring
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send a fully rendered prompt and return the raw model output
    async fn complete(&self, prompt: &str) -> Result<String, BackendError>;

    /// Cheap reachability check that does not run a completion
    async fn probe(&self) -> Result<(), BackendError>;
}

/// Generation parameters for chat completion requests
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.3,
            max_tokens: 2000,
            timeout: Duration::from_secs(60),
        }
    }
}

/// OpenAI-compatible chat completions client
///
/// Talks to `{base_url}/chat/completions` for scoring and `{base_url}/models`
/// for the health probe.
pub struct OpenAiBackend {
    base_url: String,
    api_key: String,
    options: CompletionOptions,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiBackend {
    /// Create a new backend client
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        options: CompletionOptions,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(BackendError::Request)?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            options,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.options.model
    }

    fn map_send_error(&self, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout(self.options.timeout)
        } else {
            BackendError::Request(err)
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read body".to_string());
        Err(BackendError::Api { status, body })
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.options.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.options.temperature,
            "max_tokens": self.options.max_tokens,
        });

        tracing::debug!("Requesting completion from {} (model: {})", url, self.options.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let completion: ChatCompletion = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout(self.options.timeout)
                } else {
                    BackendError::InvalidResponse(format!("Failed to parse completion: {}", e))
                }
            })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| BackendError::InvalidResponse("No content in completion choices".into()))
    }

    async fn probe(&self) -> Result<(), BackendError> {
        let url = format!("{}/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        Self::check_status(response).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(url: &str) -> OpenAiBackend {
        OpenAiBackend::new(url, "test_key", CompletionOptions::default()).unwrap()
    }

    #[test]
    fn test_backend_creation() {
        let client = OpenAiBackend::new(
            "https://api.openai.test/v1/",
            "test_key",
            CompletionOptions::default(),
        )
        .unwrap();

        assert_eq!(client.base_url, "https://api.openai.test/v1");
        assert_eq!(client.api_key, "test_key");
        assert_eq!(client.model(), "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test_key")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "gpt-3.5-turbo",
                "messages": [{"role": "user", "content": "score this"}],
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": "{\"match\": true}"}}]}"#)
            .create_async()
            .await;

        let output = backend(&server.url()).complete("score this").await.unwrap();

        assert_eq!(output, "{\"match\": true}");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_maps_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let err = backend(&server.url()).complete("score this").await.unwrap_err();

        assert!(matches!(err, BackendError::Api { status: 429, ref body } if body == "rate limited"));
    }

    #[tokio::test]
    async fn test_complete_rejects_empty_choices() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let err = backend(&server.url()).complete("score this").await.unwrap_err();

        assert!(matches!(err, BackendError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_probe() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/models")
            .with_status(200)
            .with_body(r#"{"data": []}"#)
            .create_async()
            .await;

        assert!(backend(&server.url()).probe().await.is_ok());
    }

    #[tokio::test]
    async fn test_probe_unreachable() {
        // Nothing listens on port 9 on a test host
        let result = backend("http://127.0.0.1:9").probe().await;
        assert!(result.is_err());
    }
}
