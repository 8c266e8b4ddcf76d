use crate::state::AppState;

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use pixelforge_core::prelude::*;
use pixelforge_studio::{GenerateRequest, RevisionRequest, UploadRequest};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::error;

pub struct ApiError(anyhow::Error);

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        if let Some(err) = self.0.downcast_ref::<ForgeError>() {
            return match err {
                ForgeError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                ForgeError::InvalidPalette(_) => (StatusCode::BAD_REQUEST, "INVALID_PALETTE"),
                ForgeError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                ForgeError::Image(_) => (StatusCode::BAD_REQUEST, "INVALID_IMAGE"),
                ForgeError::Conflict { .. } => (StatusCode::CONFLICT, "CONFLICT"),
                ForgeError::Provider(_) => (StatusCode::BAD_GATEWAY, "PROVIDER_FAILURE"),
                ForgeError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_FAILURE"),
            };
        }
        match self.0.downcast_ref::<StorageError>() {
            Some(StorageError::NotFound(_)) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Some(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_FAILURE"),
            None => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!("Request failed: {:#}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string(), "code": code }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// GET /
pub async fn info() -> impl IntoResponse {
    Json(json!({
        "name": "pixelforge",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Pixel art generation and revision service",
    }))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// GET /api/palettes
pub async fn list_palettes<L: BlobStore, R: BlobStore, D, P: ImageProvider>(
    State(state): State<AppState<L, R, D, P>>,
) -> ApiResult<Json<Vec<Palette>>>
where
    D: ArtifactRepository + PreferencesRepository + PaletteRepository,
{
    Ok(Json(state.studio.palettes().await?))
}

/// POST /api/palettes
pub async fn create_palette<L: BlobStore, R: BlobStore, D, P: ImageProvider>(
    State(state): State<AppState<L, R, D, P>>,
    Json(palette): Json<Palette>,
) -> ApiResult<impl IntoResponse>
where
    D: ArtifactRepository + PreferencesRepository + PaletteRepository,
{
    let palette = state.studio.create_palette(palette).await?;
    Ok((StatusCode::CREATED, Json(palette)))
}

/// GET /api/palettes/{id}
pub async fn get_palette<L: BlobStore, R: BlobStore, D, P: ImageProvider>(
    State(state): State<AppState<L, R, D, P>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Palette>>
where
    D: ArtifactRepository + PreferencesRepository + PaletteRepository,
{
    Ok(Json(state.studio.palette(&id).await?))
}

/// PUT /api/palettes/{id}
pub async fn update_palette<L: BlobStore, R: BlobStore, D, P: ImageProvider>(
    State(state): State<AppState<L, R, D, P>>,
    Path(id): Path<String>,
    Json(patch): Json<PalettePatch>,
) -> ApiResult<Json<Palette>>
where
    D: ArtifactRepository + PreferencesRepository + PaletteRepository,
{
    Ok(Json(state.studio.update_palette(&id, &patch).await?))
}

/// DELETE /api/palettes/{id}
pub async fn delete_palette<L: BlobStore, R: BlobStore, D, P: ImageProvider>(
    State(state): State<AppState<L, R, D, P>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode>
where
    D: ArtifactRepository + PreferencesRepository + PaletteRepository,
{
    state.studio.delete_palette(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/pixel-arts
pub async fn list_pixel_arts<L: BlobStore, R: BlobStore, D, P: ImageProvider>(
    State(state): State<AppState<L, R, D, P>>,
    Query(query): Query<ArtifactQuery>,
) -> ApiResult<Json<ArtifactPage>>
where
    D: ArtifactRepository + PreferencesRepository + PaletteRepository,
{
    Ok(Json(state.studio.list(&query).await?))
}

#[derive(Deserialize)]
pub struct GenerateBody {
    pub prompt: String,
    /// Missing settings come from the user's preferences.
    #[serde(default)]
    pub settings: SettingsPatch,
}

/// POST /api/pixel-arts/generate-from-prompt
pub async fn generate_from_prompt<L: BlobStore, R: BlobStore, D, P: ImageProvider>(
    State(state): State<AppState<L, R, D, P>>,
    Json(body): Json<GenerateBody>,
) -> ApiResult<impl IntoResponse>
where
    D: ArtifactRepository + PreferencesRepository + PaletteRepository,
{
    let defaults = state.studio.preferences(&state.user_id).await?.art_settings();
    let artifact = state
        .studio
        .generate(GenerateRequest {
            prompt: body.prompt,
            settings: body.settings.apply_to(&defaults),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(artifact)))
}

fn form_value<T: DeserializeOwned>(field: &str, value: &str) -> Result<T, ForgeError> {
    serde_json::from_value(serde_json::Value::String(value.trim().to_ascii_lowercase()))
        .map_err(|_| ForgeError::Validation(format!("invalid {field}: '{value}'")))
}

fn form_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, ForgeError> {
    value
        .trim()
        .parse()
        .map_err(|_| ForgeError::Validation(format!("invalid {field}: '{value}'")))
}

fn percentage(field: &str, value: &str) -> Result<u8, ForgeError> {
    let parsed: u8 = form_number(field, value)?;
    if parsed > 100 {
        return Err(ForgeError::Validation(format!(
            "{field} must be between 0 and 100"
        )));
    }
    Ok(parsed)
}

/// POST /api/pixel-arts/process-image
///
/// Multipart form: `file` plus optional `name`, `pixelSize`, `style`,
/// `paletteId`, `contrast`, `sharpness`, `backgroundType`, `animationType`,
/// `prompt` and comma separated `tags`.
pub async fn process_image<L: BlobStore, R: BlobStore, D, P: ImageProvider>(
    State(state): State<AppState<L, R, D, P>>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse>
where
    D: ArtifactRepository + PreferencesRepository + PaletteRepository,
{
    let preferences = state.studio.preferences(&state.user_id).await?;
    let mut settings = preferences.art_settings();
    let mut contrast = preferences.contrast;
    let mut sharpness = preferences.sharpness;
    let mut file: Option<(String, Bytes)> = None;
    let mut name = None;
    let mut prompt = None;
    let mut tags = Vec::new();

    let invalid = |e: axum::extract::multipart::MultipartError| {
        ForgeError::Validation(format!("malformed multipart body: {}", e.body_text()))
    };

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let field_name = field.name().unwrap_or_default().to_string();
        if field_name == "file" {
            let file_name = field.file_name().unwrap_or("upload.png").to_string();
            let data = field.bytes().await.map_err(invalid)?;
            file = Some((file_name, data));
            continue;
        }

        let value = field.text().await.map_err(invalid)?;
        match field_name.as_str() {
            "name" => name = Some(value),
            "prompt" => prompt = Some(value),
            "tags" => {
                tags = value
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            "pixelSize" => settings.pixel_size = form_number("pixelSize", &value)?,
            "style" => settings.style = form_value("style", &value)?,
            "paletteId" => settings.palette_id = value.trim().to_string(),
            "backgroundType" => settings.background_type = form_value("backgroundType", &value)?,
            "animationType" => settings.animation_type = form_value("animationType", &value)?,
            "contrast" => contrast = percentage("contrast", &value)?,
            "sharpness" => sharpness = percentage("sharpness", &value)?,
            _ => {}
        }
    }

    let (file_name, data) =
        file.ok_or_else(|| ForgeError::Validation("missing 'file' field".into()))?;

    let artifact = state
        .studio
        .process_upload(UploadRequest {
            file_name,
            data,
            name,
            settings,
            contrast,
            sharpness,
            prompt,
            tags,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(artifact)))
}

/// GET /api/pixel-arts/{id}
pub async fn get_pixel_art<L: BlobStore, R: BlobStore, D, P: ImageProvider>(
    State(state): State<AppState<L, R, D, P>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Artifact>>
where
    D: ArtifactRepository + PreferencesRepository + PaletteRepository,
{
    Ok(Json(state.studio.get(&id).await?))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
    #[serde(default)]
    pub changes: SettingsPatch,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub apply_changes_to_image: bool,
}

/// PUT /api/pixel-arts/{id}
pub async fn update_pixel_art<L: BlobStore, R: BlobStore, D, P: ImageProvider>(
    State(state): State<AppState<L, R, D, P>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateBody>,
) -> ApiResult<Json<Artifact>>
where
    D: ArtifactRepository + PreferencesRepository + PaletteRepository,
{
    let revision = state
        .studio
        .revise(
            &id,
            RevisionRequest {
                changes: body.changes,
                prompt: body.prompt,
                apply_changes_to_image: body.apply_changes_to_image,
            },
        )
        .await?;
    Ok(Json(revision.artifact))
}

/// DELETE /api/pixel-arts/{id}
pub async fn delete_pixel_art<L: BlobStore, R: BlobStore, D, P: ImageProvider>(
    State(state): State<AppState<L, R, D, P>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode>
where
    D: ArtifactRepository + PreferencesRepository + PaletteRepository,
{
    state.studio.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/pixel-arts/{id}/history
pub async fn get_history<L: BlobStore, R: BlobStore, D, P: ImageProvider>(
    State(state): State<AppState<L, R, D, P>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<VersionSnapshot>>>
where
    D: ArtifactRepository + PreferencesRepository + PaletteRepository,
{
    Ok(Json(state.studio.history(&id).await?))
}

/// GET /api/settings
pub async fn get_settings<L: BlobStore, R: BlobStore, D, P: ImageProvider>(
    State(state): State<AppState<L, R, D, P>>,
) -> ApiResult<Json<UserPreferences>>
where
    D: ArtifactRepository + PreferencesRepository + PaletteRepository,
{
    Ok(Json(state.studio.preferences(&state.user_id).await?))
}

/// PUT /api/settings
pub async fn update_settings<L: BlobStore, R: BlobStore, D, P: ImageProvider>(
    State(state): State<AppState<L, R, D, P>>,
    Json(patch): Json<PreferencesPatch>,
) -> ApiResult<Json<UserPreferences>>
where
    D: ArtifactRepository + PreferencesRepository + PaletteRepository,
{
    Ok(Json(
        state
            .studio
            .update_preferences(&state.user_id, &patch)
            .await?,
    ))
}

/// POST /api/settings/reset
pub async fn reset_settings<L: BlobStore, R: BlobStore, D, P: ImageProvider>(
    State(state): State<AppState<L, R, D, P>>,
) -> ApiResult<Json<UserPreferences>>
where
    D: ArtifactRepository + PreferencesRepository + PaletteRepository,
{
    Ok(Json(state.studio.reset_preferences(&state.user_id).await?))
}

fn content_type(key: &str) -> &'static str {
    match key.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// GET /images/{*key}
///
/// Serves blobs of the local store.
pub async fn serve_image<L: BlobStore, R: BlobStore, D, P: ImageProvider>(
    State(state): State<AppState<L, R, D, P>>,
    Path(key): Path<String>,
) -> ApiResult<Response>
where
    D: ArtifactRepository + PreferencesRepository + PaletteRepository,
{
    let data = state.studio.assets().local().read_file(&key).await?;
    Ok(([(header::CONTENT_TYPE, content_type(&key))], data).into_response())
}
