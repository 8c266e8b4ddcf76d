use crate::{api, state::AppState};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use pixelforge_core::prelude::*;
use pixelforge_studio::Studio;
use tower_http::trace::TraceLayer;

/// The builder for the pixelforge HTTP API.
#[derive(Clone, Debug, Default)]
pub struct PixelforgeServer {
    config: PixelforgeServerConfig,
}

impl PixelforgeServer {
    pub fn new(config: PixelforgeServerConfig) -> Self {
        Self { config }
    }
}

#[derive(Clone, Debug)]
pub struct PixelforgeServerConfig {
    /// Owner of the stored preferences.
    ///
    /// Defaults to [`DEFAULT_USER`].
    pub user_id: String,
    /// Largest accepted request body, uploads included.
    ///
    /// Defaults to 20 MiB.
    pub max_body_bytes: usize,
}

impl Default for PixelforgeServerConfig {
    fn default() -> Self {
        Self {
            user_id: DEFAULT_USER.to_string(),
            max_body_bytes: 20 * 1024 * 1024,
        }
    }
}

impl PixelforgeServer {
    pub fn build<L, R, D, P>(self, studio: Studio<L, R, D, P>) -> Router
    where
        L: BlobStore,
        R: BlobStore,
        D: ArtifactRepository + PreferencesRepository + PaletteRepository,
        P: ImageProvider,
    {
        let PixelforgeServerConfig {
            user_id,
            max_body_bytes,
        } = self.config;
        let state = AppState { studio, user_id };

        Router::new()
            .route("/", get(api::info))
            .route("/health", get(api::health))
            .route(
                "/api/palettes",
                get(api::list_palettes).post(api::create_palette),
            )
            .route(
                "/api/palettes/{id}",
                get(api::get_palette)
                    .put(api::update_palette)
                    .delete(api::delete_palette),
            )
            .route("/api/pixel-arts", get(api::list_pixel_arts))
            .route(
                "/api/pixel-arts/generate-from-prompt",
                post(api::generate_from_prompt),
            )
            .route("/api/pixel-arts/process-image", post(api::process_image))
            .route(
                "/api/pixel-arts/{id}",
                get(api::get_pixel_art)
                    .put(api::update_pixel_art)
                    .delete(api::delete_pixel_art),
            )
            .route("/api/pixel-arts/{id}/history", get(api::get_history))
            .route(
                "/api/settings",
                get(api::get_settings).put(api::update_settings),
            )
            .route("/api/settings/reset", post(api::reset_settings))
            .route("/images/{*key}", get(api::serve_image))
            .layer(DefaultBodyLimit::max(max_body_bytes))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}
