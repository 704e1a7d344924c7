use std::env;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use crate::error::GenerationError;
use crate::pacing::{DEFAULT_RPM, RequestPacer};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);
const MAX_ERROR_MESSAGE_CHARS: usize = 500;

#[derive(Clone, Debug)]
pub struct AiConfig {
    pub base_url: Url,
    pub api_key: String,
    pub model: String,
    pub rpm: u32,
    pub timeout: Duration,
}

impl AiConfig {
    /// Build a config for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::InvalidConfig` if the base URL is not an
    /// absolute http(s) URL or the key is blank.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, GenerationError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GenerationError::InvalidConfig("api key is blank".into()));
        }
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            api_key,
            model: model.into(),
            rpm: DEFAULT_RPM,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    #[must_use]
    pub fn with_rpm(mut self, rpm: u32) -> Self {
        self.rpm = rpm;
        self
    }

    /// Read `QUIZ_AI_*` variables. Returns `None` when no key is set or the
    /// base URL is unusable.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("QUIZ_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url = env::var("QUIZ_AI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let model = env::var("QUIZ_AI_MODEL")
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.into());
        let rpm = env::var("QUIZ_AI_RPM")
            .ok()
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_RPM);
        let timeout = env::var("QUIZ_AI_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS), Duration::from_secs);

        match Self::new(&base_url, api_key, model) {
            Ok(config) => Some(Self {
                timeout,
                ..config.with_rpm(rpm)
            }),
            Err(err) => {
                tracing::warn!(error = %err, "ignoring generation config from environment");
                None
            }
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.base_url.as_str().trim_end_matches('/')
        )
    }
}

fn parse_base_url(raw: &str) -> Result<Url, GenerationError> {
    let url = Url::parse(raw.trim())
        .map_err(|err| GenerationError::InvalidConfig(format!("base url {raw:?}: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(GenerationError::InvalidConfig(format!(
            "base url {raw:?} must use http or https"
        )));
    }
    Ok(url)
}

/// An image forwarded to the model as a data URI content part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageAttachment {
    pub mime_type: String,
    pub data_base64: String,
}

impl ImageAttachment {
    #[must_use]
    pub fn data_uri(&self) -> String {
        if self.data_base64.starts_with("data:") {
            return self.data_base64.clone();
        }
        let mime = if self.mime_type.trim().is_empty() {
            "image/png"
        } else {
            self.mime_type.trim()
        };
        format!("data:{mime};base64,{}", self.data_base64.trim())
    }
}

/// Chat-completions client shared by question generation and the text/vision
/// proxy. Every request waits on the shared pacer first.
#[derive(Clone)]
pub struct AiClient {
    client: Client,
    config: Option<AiConfig>,
    pacer: Arc<RequestPacer>,
}

impl AiClient {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(AiConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<AiConfig>) -> Self {
        let pacer = Arc::new(
            config
                .as_ref()
                .map_or_else(RequestPacer::default, |c| RequestPacer::from_rpm(c.rpm)),
        );
        Self::with_pacer(config, pacer)
    }

    #[must_use]
    pub fn with_pacer(config: Option<AiConfig>, pacer: Arc<RequestPacer>) -> Self {
        let timeout = config
            .as_ref()
            .map_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS), |c| c.timeout);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            config,
            pacer,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.config.as_ref().map(|c| c.model.as_str())
    }

    #[must_use]
    pub fn pacer(&self) -> &RequestPacer {
        &self.pacer
    }

    /// Send a system + user prompt and return the first choice's text.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` when the client is disabled, the provider
    /// answers with a non-success status, or the response has no content.
    pub async fn chat(&self, system: &str, prompt: &str) -> Result<String, GenerationError> {
        let messages = json!([
            { "role": "system", "content": system },
            { "role": "user", "content": prompt },
        ]);
        self.send(messages, 0.7).await
    }

    /// Forward a free-form prompt, optionally with an image.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`AiClient::chat`].
    pub async fn complete(
        &self,
        prompt: &str,
        image: Option<&ImageAttachment>,
    ) -> Result<String, GenerationError> {
        let content = match image {
            Some(image) => json!([
                { "type": "text", "text": prompt },
                { "type": "image_url", "image_url": { "url": image.data_uri() } },
            ]),
            None => Value::String(prompt.to_owned()),
        };
        let messages = json!([{ "role": "user", "content": content }]);
        self.send(messages, 0.2).await
    }

    async fn send(&self, messages: Value, temperature: f32) -> Result<String, GenerationError> {
        let config = self.config.as_ref().ok_or(GenerationError::Disabled)?;
        let payload = json!({
            "model": config.model,
            "messages": messages,
            "temperature": temperature,
        });

        self.pacer.acquire().await;
        tracing::debug!(model = %config.model, "sending chat completion request");

        let response = self
            .client
            .post(config.endpoint())
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        let response = check_status(response).await?;
        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_owned())
            .filter(|content| !content.is_empty())
            .ok_or(GenerationError::EmptyResponse)?;

        Ok(content)
    }
}

async fn check_status(response: Response) -> Result<Response, GenerationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map_or(DEFAULT_RETRY_AFTER, Duration::from_secs);
        tracing::warn!(retry_after_secs = retry_after.as_secs(), "generation provider rate limited");
        return Err(GenerationError::RateLimited { retry_after });
    }

    let body = response.text().await.unwrap_or_default();
    let message = provider_message(&body).unwrap_or_else(|| status.to_string());
    tracing::warn!(status = status.as_u16(), %message, "generation provider error");
    Err(GenerationError::HttpStatus {
        status: status.as_u16(),
        message,
    })
}

/// Extract `error.message` (or a top-level `message`) from an error body,
/// falling back to the raw text.
fn provider_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let from_json = serde_json::from_str::<Value>(trimmed).ok().and_then(|value| {
        value
            .pointer("/error/message")
            .or_else(|| value.get("message"))
            .or_else(|| value.get("error"))
            .and_then(Value::as_str)
            .map(str::to_owned)
    });
    Some(from_json.unwrap_or_else(|| trimmed.chars().take(MAX_ERROR_MESSAGE_CHARS).collect()))
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_rejects_non_http_urls() {
        assert!(matches!(
            AiConfig::new("ftp://example.com", "key", "m"),
            Err(GenerationError::InvalidConfig(_))
        ));
        assert!(matches!(
            AiConfig::new("not a url", "key", "m"),
            Err(GenerationError::InvalidConfig(_))
        ));
        assert!(matches!(
            AiConfig::new("https://example.com/v1", "  ", "m"),
            Err(GenerationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let config = AiConfig::new("https://example.com/v1/", "key", "m").unwrap();
        assert_eq!(config.endpoint(), "https://example.com/v1/chat/completions");
    }

    #[test]
    fn provider_message_prefers_json_error() {
        assert_eq!(
            provider_message(r#"{"error":{"message":"bad key"}}"#).as_deref(),
            Some("bad key")
        );
        assert_eq!(provider_message("plain failure").as_deref(), Some("plain failure"));
        assert_eq!(provider_message("  "), None);
    }

    #[test]
    fn data_uri_keeps_existing_prefix() {
        let raw = ImageAttachment {
            mime_type: "image/jpeg".into(),
            data_base64: "AAAA".into(),
        };
        assert_eq!(raw.data_uri(), "data:image/jpeg;base64,AAAA");

        let prefixed = ImageAttachment {
            mime_type: String::new(),
            data_base64: "data:image/gif;base64,BBBB".into(),
        };
        assert_eq!(prefixed.data_uri(), "data:image/gif;base64,BBBB");
    }

    #[tokio::test]
    async fn disabled_client_never_sends() {
        let client = AiClient::new(None);
        assert!(!client.enabled());
        assert!(matches!(
            client.chat("sys", "hi").await,
            Err(GenerationError::Disabled)
        ));
    }
}
