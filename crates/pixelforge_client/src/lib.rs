use bytes::Bytes;
use pixelforge_core::prelude::*;
use reqwest::{Client, RequestBuilder, StatusCode, multipart};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PixelforgeClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server returned error {status} ({code}): {message}")]
    Server {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, PixelforgeClientError>;

/// Body of a `PUT /api/pixel-arts/{id}`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Revise {
    pub changes: SettingsPatch,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub apply_changes_to_image: bool,
}

/// An image to run through the upload pipeline.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub file_name: String,
    pub data: Bytes,
    pub name: Option<String>,
    pub prompt: Option<String>,
    pub tags: Vec<String>,
    pub settings: SettingsPatch,
    pub contrast: Option<u8>,
    pub sharpness: Option<u8>,
}

impl Upload {
    pub async fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                PixelforgeClientError::Validation(format!("{} is not a file", path.display()))
            })?;
        let data = tokio::fs::read(path).await?;
        Ok(Self {
            file_name,
            data: data.into(),
            ..Default::default()
        })
    }

    fn into_form(self) -> Result<multipart::Form> {
        let mut form = multipart::Form::new().part(
            "file",
            multipart::Part::stream(self.data).file_name(self.file_name),
        );

        form = text(form, "name", self.name);
        form = text(form, "prompt", self.prompt);
        form = text(form, "tags", (!self.tags.is_empty()).then(|| self.tags.join(",")));
        form = text(form, "pixelSize", self.settings.pixel_size.map(|v| v.to_string()));
        form = text(form, "paletteId", self.settings.palette_id);
        form = text(form, "style", self.settings.style.map(enum_text).transpose()?);
        form = text(
            form,
            "backgroundType",
            self.settings.background_type.map(enum_text).transpose()?,
        );
        form = text(
            form,
            "animationType",
            self.settings.animation_type.map(enum_text).transpose()?,
        );
        form = text(form, "contrast", self.contrast.map(|v| v.to_string()));
        form = text(form, "sharpness", self.sharpness.map(|v| v.to_string()));
        Ok(form)
    }
}

fn text(form: multipart::Form, key: &'static str, value: Option<String>) -> multipart::Form {
    match value {
        Some(value) => form.text(key, value),
        None => form,
    }
}

/// The wire name of a settings enum, e.g. `retro` or `idle`.
fn enum_text<T: Serialize>(value: T) -> Result<String> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => Ok(s),
        _ => Err(PixelforgeClientError::Validation(
            "setting is not a plain string".into(),
        )),
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

fn server_error(status: StatusCode, body: &str) -> PixelforgeClientError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error, code }) => PixelforgeClientError::Server {
            status,
            code,
            message: error,
        },
        Err(_) => PixelforgeClientError::Server {
            status,
            code: "UNKNOWN".to_string(),
            message: body.to_string(),
        },
    }
}

#[derive(Serialize)]
struct GenerateBody<'a> {
    prompt: &'a str,
    settings: &'a SettingsPatch,
}

#[derive(Clone)]
pub struct PixelforgeClient {
    base_url: String,
    client: Client,
}

impl PixelforgeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response> {
        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(server_error(status, &text));
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        self.send(builder)
            .await?
            .json()
            .await
            .map_err(|e| PixelforgeClientError::Validation(format!("Failed to parse response: {e}")))
    }

    pub async fn generate(&self, prompt: &str, settings: &SettingsPatch) -> Result<Artifact> {
        let url = self.url("/api/pixel-arts/generate-from-prompt");
        self.json(self.client.post(url).json(&GenerateBody { prompt, settings }))
            .await
    }

    pub async fn upload(&self, upload: Upload) -> Result<Artifact> {
        let url = self.url("/api/pixel-arts/process-image");
        self.json(self.client.post(url).multipart(upload.into_form()?))
            .await
    }

    pub async fn revise(&self, id: &str, revise: &Revise) -> Result<Artifact> {
        let url = self.url(&format!("/api/pixel-arts/{id}"));
        self.json(self.client.put(url).json(revise)).await
    }

    pub async fn get(&self, id: &str) -> Result<Artifact> {
        let url = self.url(&format!("/api/pixel-arts/{id}"));
        self.json(self.client.get(url)).await
    }

    pub async fn list(&self, query: &ArtifactQuery) -> Result<ArtifactPage> {
        let url = self.url("/api/pixel-arts");
        self.json(self.client.get(url).query(query)).await
    }

    pub async fn history(&self, id: &str) -> Result<Vec<VersionSnapshot>> {
        let url = self.url(&format!("/api/pixel-arts/{id}/history"));
        self.json(self.client.get(url)).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let url = self.url(&format!("/api/pixel-arts/{id}"));
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    pub async fn palettes(&self) -> Result<Vec<Palette>> {
        self.json(self.client.get(self.url("/api/palettes"))).await
    }

    pub async fn palette(&self, id: &str) -> Result<Palette> {
        let url = self.url(&format!("/api/palettes/{id}"));
        self.json(self.client.get(url)).await
    }

    pub async fn create_palette(&self, palette: &Palette) -> Result<Palette> {
        let url = self.url("/api/palettes");
        self.json(self.client.post(url).json(palette)).await
    }

    pub async fn update_palette(&self, id: &str, patch: &PalettePatch) -> Result<Palette> {
        let url = self.url(&format!("/api/palettes/{id}"));
        self.json(self.client.put(url).json(patch)).await
    }

    pub async fn delete_palette(&self, id: &str) -> Result<()> {
        let url = self.url(&format!("/api/palettes/{id}"));
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    pub async fn preferences(&self) -> Result<UserPreferences> {
        self.json(self.client.get(self.url("/api/settings"))).await
    }

    pub async fn update_preferences(&self, patch: &PreferencesPatch) -> Result<UserPreferences> {
        self.json(self.client.put(self.url("/api/settings")).json(patch))
            .await
    }

    pub async fn reset_preferences(&self) -> Result<UserPreferences> {
        self.json(self.client.post(self.url("/api/settings/reset")))
            .await
    }

    /// Fetches an image by the absolute URL stored on an artifact.
    pub async fn download(&self, url: &str) -> Result<Bytes> {
        let response = self.send(self.client.get(url)).await?;
        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_keep_their_code() {
        let err = server_error(
            StatusCode::BAD_GATEWAY,
            r#"{"error":"Provider error: timeout","code":"PROVIDER_FAILURE"}"#,
        );
        match err {
            PixelforgeClientError::Server { status, code, message } => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(code, "PROVIDER_FAILURE");
                assert_eq!(message, "Provider error: timeout");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = server_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(err, PixelforgeClientError::Server { code, .. } if code == "UNKNOWN"));
    }

    #[test]
    fn enum_settings_use_their_wire_names() {
        assert_eq!(enum_text(PixelArtStyle::Isometric).unwrap(), "isometric");
        assert_eq!(enum_text(BackgroundType::Transparent).unwrap(), "transparent");
    }

    #[test]
    fn revisions_omit_an_absent_prompt() {
        let body = serde_json::to_value(Revise {
            changes: SettingsPatch {
                pixel_size: Some(16),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "changes": { "pixelSize": 16 }, "applyChangesToImage": false })
        );
    }
}
