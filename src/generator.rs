use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::GeneratorConfig;
use crate::error::AppError;

/// Boundary to the external text/image model. Each call is a single request
/// with no retry; any failure comes back as `AppError::ExternalService`.
#[rocket::async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String, AppError>;

    /// Returns one base64-encoded square image.
    async fn generate_image(&self, prompt: &str) -> Result<String, AppError>;
}

pub type SharedGenerator = Arc<dyn ContentGenerator>;

/// Client for an OpenAI-compatible completion and image API.
#[derive(Clone)]
pub struct HttpGenerator {
    client: Client,
    config: GeneratorConfig,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// `negative_prompt` and `cfg_scale` are extensions some image backends
/// accept. OpenAI rejects unknown arguments, so they are only sent when
/// configured.
#[derive(Debug, Serialize)]
pub(crate) struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: String,
    response_format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cfg_scale: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    #[serde(default)]
    b64_json: Option<String>,
}

impl HttpGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, AppError>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(self.endpoint(path))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(upstream_error(status, &body));
        }

        Ok(response.json::<R>().await?)
    }

    pub(crate) fn chat_request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.text_model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
        }
    }

    pub(crate) fn image_request<'a>(&'a self, prompt: &'a str) -> ImageRequest<'a> {
        ImageRequest {
            model: &self.config.image_model,
            prompt,
            n: 1,
            size: format!("{0}x{0}", self.config.image_size),
            response_format: "b64_json",
            negative_prompt: self
                .config
                .negative_prompt
                .as_deref()
                .filter(|negative| !negative.trim().is_empty()),
            cfg_scale: self.config.cfg_scale,
        }
    }
}

pub(crate) fn upstream_error(status: reqwest::StatusCode, body: &str) -> AppError {
    AppError::ExternalService(format!(
        "Generator returned {}: {}",
        status,
        truncate(body, 300)
    ))
}

pub(crate) fn text_from(response: ChatResponse) -> Result<String, AppError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| AppError::ExternalService("Generator returned no text choices".to_string()))
}

pub(crate) fn image_from(response: ImageResponse) -> Result<String, AppError> {
    response
        .data
        .into_iter()
        .next()
        .and_then(|datum| datum.b64_json)
        .filter(|payload| !payload.is_empty())
        .ok_or_else(|| AppError::ExternalService("Generator returned no image payload".to_string()))
}

#[rocket::async_trait]
impl ContentGenerator for HttpGenerator {
    #[instrument(skip_all, fields(model = %self.config.text_model, prompt_len = prompt.len()))]
    async fn generate_text(&self, prompt: &str) -> Result<String, AppError> {
        let request = self.chat_request(prompt);
        let response: ChatResponse = self.post_json("chat/completions", &request).await?;
        let text = text_from(response)?;

        info!(response_len = text.len(), "Generated text");
        Ok(text)
    }

    #[instrument(skip_all, fields(model = %self.config.image_model))]
    async fn generate_image(&self, prompt: &str) -> Result<String, AppError> {
        let request = self.image_request(prompt);
        let response: ImageResponse = self.post_json("images/generations", &request).await?;
        let image = image_from(response)?;

        info!(payload_len = image.len(), "Generated image");
        Ok(image)
    }
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
