use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use pixelforge_core::prelude::*;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const DESCRIBE_INSTRUCTION: &str = "Describe this pixel art image in detail. Mention the main subject, \
    style, colors, important elements and their positions, and any notable feature. Be very specific.";

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub api_base: String,
    pub image_model: String,
    pub edit_model: String,
    pub vision_model: String,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: "https://api.openai.com/v1".to_string(),
            image_model: "dall-e-3".to_string(),
            edit_model: "gpt-image-1".to_string(),
            vision_model: "gpt-4o".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// [`ImageProvider`] talking to the OpenAI HTTP API.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(concat!("pixelforge/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to build HTTP client: {e}")))?;

        if config.api_key.is_empty() {
            warn!("OpenAI API key is empty, provider calls will fail");
        }

        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.api_base.trim_end_matches('/'))
    }

    fn ensure_configured(&self) -> Result<(), ProviderError> {
        if self.config.api_key.is_empty() {
            return Err(ProviderError::NotConfigured("OPENAI_API_KEY is not set".into()));
        }
        Ok(())
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, ProviderError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| ProviderError::Malformed(e.to_string()))
    }

    async fn first_image(&self, payload: &Value) -> Result<Bytes, ProviderError> {
        match first_image_source(payload)? {
            ImageSource::Inline(bytes) => Ok(bytes),
            ImageSource::Url(url) => self.download(&url).await,
        }
    }

    async fn download(&self, url: &str) -> Result<Bytes, ProviderError> {
        debug!("Downloading generated image");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Api {
                status: response.status().as_u16(),
                message: format!("image download from {url} failed"),
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))
    }
}

impl ImageProvider for OpenAiProvider {
    #[instrument(skip(self, prompt), fields(model = %self.config.image_model))]
    async fn generate(&self, prompt: &str) -> Result<Bytes, ProviderError> {
        self.ensure_configured()?;

        let mut body = json!({
            "model": self.config.image_model,
            "prompt": prompt,
            "n": 1,
            "size": "1024x1024",
        });
        // gpt-image models reject these and always answer with base64.
        if self.config.image_model.starts_with("dall-e") {
            body["quality"] = json!("standard");
            body["response_format"] = json!("b64_json");
        }

        let response = self
            .client
            .post(self.endpoint("images/generations"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let payload = Self::read_json(response).await?;
        let image = self.first_image(&payload).await?;
        info!(bytes = image.len(), "Image generated");
        Ok(image)
    }

    #[instrument(skip(self, image), fields(model = %self.config.vision_model))]
    async fn describe(&self, image: Bytes) -> Result<String, ProviderError> {
        self.ensure_configured()?;

        let data_url = format!("data:image/png;base64,{}", BASE64.encode(&image));
        let body = json!({
            "model": self.config.vision_model,
            "max_tokens": 500,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": DESCRIBE_INSTRUCTION },
                    { "type": "image_url", "image_url": { "url": data_url } }
                ]
            }]
        });

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let payload: ChatCompletion = serde_json::from_value(Self::read_json(response).await?)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let description = payload
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ProviderError::Malformed("empty image description".into()))?;

        debug!(length = description.len(), "Image described");
        Ok(description)
    }

    #[instrument(skip(self, image, prompt), fields(model = %self.config.edit_model))]
    async fn edit(&self, image: Bytes, prompt: &str) -> Result<Bytes, ProviderError> {
        self.ensure_configured()?;

        let part = Part::bytes(image.to_vec())
            .file_name("image.png")
            .mime_str("image/png")
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let form = Form::new()
            .text("model", self.config.edit_model.clone())
            .text("prompt", prompt.to_string())
            .text("n", "1")
            .text("size", "1024x1024")
            .part("image", part);

        let response = self
            .client
            .post(self.endpoint("images/edits"))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let payload = Self::read_json(response).await?;
        let edited = self.first_image(&payload).await?;
        info!(bytes = edited.len(), "Image edited");
        Ok(edited)
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, PartialEq)]
enum ImageSource {
    Inline(Bytes),
    Url(String),
}

fn first_image_source(payload: &Value) -> Result<ImageSource, ProviderError> {
    let rows = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::Malformed("response has no data array".into()))?;

    for row in rows {
        if let Some(b64) = row.get("b64_json").and_then(Value::as_str) {
            let bytes = BASE64
                .decode(b64.as_bytes())
                .map_err(|e| ProviderError::Malformed(format!("image base64 decode failed: {e}")))?;
            return Ok(ImageSource::Inline(Bytes::from(bytes)));
        }
        if let Some(url) = row.get("url").and_then(Value::as_str) {
            return Ok(ImageSource::Url(url.to_string()));
        }
    }

    Err(ProviderError::Malformed("response contains no image".into()))
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(300).collect())
}
