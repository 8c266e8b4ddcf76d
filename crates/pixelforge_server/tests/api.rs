//! Drives the router end to end over the in-memory backends.

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode, header};
use http_body_util::BodyExt;
use pixelforge_core::palette::PaletteRegistry;
use pixelforge_mock::{MemoryRepository, MemoryStorage, ProviderCall, ScriptedProvider, solid_png};
use pixelforge_server::prelude::*;
use pixelforge_studio::{AssetStore, Studio, StudioConfig};
use serde_json::{Value, json};
use tower::ServiceExt;

const PUBLIC: &str = "http://localhost:8000";
const BOUNDARY: &str = "pixelforge-test-boundary";

fn app() -> (Router, ScriptedProvider) {
    let provider = ScriptedProvider::default();
    let studio = Studio::new(
        AssetStore::local_only(MemoryStorage::new(format!("{PUBLIC}/images/"))),
        MemoryRepository::new(),
        provider.clone(),
        PaletteRegistry::builtin(),
        StudioConfig::default(),
    );
    (PixelforgeServer::default().build(studio), provider)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    app.clone().oneshot(request.body(body).unwrap()).await.unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn multipart(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Body {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

async fn upload(app: &Router, body: Body) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/pixel-arts/process-image")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(body)
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn generate(app: &Router) -> Value {
    let response = send(
        app,
        Method::POST,
        "/api/pixel-arts/generate-from-prompt",
        Some(json!({ "prompt": "a lighthouse", "settings": { "paletteId": "nes" } })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn service_info_and_health() {
    let (app, _) = app();

    let info = body_json(send(&app, Method::GET, "/", None).await).await;
    assert_eq!(info["name"], "pixelforge");
    assert!(info["version"].is_string());

    let health = send(&app, Method::GET, "/health", None).await;
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn palettes_are_listed_and_fetched() {
    let (app, _) = app();

    let all = body_json(send(&app, Method::GET, "/api/palettes", None).await).await;
    assert_eq!(all.as_array().unwrap().len(), 5);

    let gameboy = body_json(send(&app, Method::GET, "/api/palettes/gameboy", None).await).await;
    assert_eq!(gameboy["colors"][0], "#0f380f");

    let missing = send(&app, Method::GET, "/api/palettes/vaporwave", None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(missing).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn generated_art_can_be_revised_and_inspected() {
    let (app, _) = app();
    let art = generate(&app).await;
    let id = art["id"].as_str().unwrap();

    assert_eq!(art["paletteId"], "nes");
    assert_eq!(art["pixelSize"], 8);
    assert_eq!(art["versionHistory"], json!([]));
    assert_eq!(art["revision"], 0);

    let revised = send(
        &app,
        Method::PUT,
        &format!("/api/pixel-arts/{id}"),
        Some(json!({
            "changes": { "style": "modern" },
            "prompt": "Añadir un título que diga 'Los Cabos'",
            "applyChangesToImage": true
        })),
    )
    .await;
    assert_eq!(revised.status(), StatusCode::OK);
    let revised = body_json(revised).await;
    assert_eq!(revised["style"], "modern");
    assert_eq!(revised["versionHistory"][0]["prompt"], "a lighthouse");
    assert_eq!(revised["versionHistory"][0]["changes"], json!({ "style": "modern" }));

    let history = body_json(
        send(&app, Method::GET, &format!("/api/pixel-arts/{id}/history"), None).await,
    )
    .await;
    assert_eq!(history.as_array().unwrap().len(), 1);

    let listed = body_json(send(&app, Method::GET, "/api/pixel-arts?q=LIGHT&limit=10", None).await).await;
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["items"][0]["id"], id);
}

#[tokio::test]
async fn errors_map_to_statuses_and_codes() {
    let (app, provider) = app();
    let art = generate(&app).await;
    let uri = format!("/api/pixel-arts/{}", art["id"].as_str().unwrap());

    provider.fail(ProviderCall::Edit);
    let failed = send(
        &app,
        Method::PUT,
        &uri,
        Some(json!({ "prompt": "add a boat", "applyChangesToImage": true })),
    )
    .await;
    assert_eq!(failed.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(failed).await["code"], "PROVIDER_FAILURE");

    let unchanged = body_json(send(&app, Method::GET, &uri, None).await).await;
    assert_eq!(unchanged, art);

    let no_prompt = send(&app, Method::PUT, &uri, Some(json!({ "applyChangesToImage": true }))).await;
    assert_eq!(no_prompt.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(no_prompt).await["code"], "VALIDATION_ERROR");

    let bad_palette = send(
        &app,
        Method::POST,
        "/api/pixel-arts/generate-from-prompt",
        Some(json!({ "prompt": "a cat", "settings": { "paletteId": "nope" } })),
    )
    .await;
    assert_eq!(bad_palette.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(bad_palette).await["code"], "INVALID_PALETTE");

    let missing = send(&app, Method::GET, "/api/pixel-arts/does-not-exist", None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metadata_updates_do_not_touch_the_image() {
    let (app, provider) = app();
    let art = generate(&app).await;
    let uri = format!("/api/pixel-arts/{}", art["id"].as_str().unwrap());

    let updated = body_json(
        send(
            &app,
            Method::PUT,
            &uri,
            Some(json!({ "changes": { "name": "Lighthouse", "tags": ["sea"] } })),
        )
        .await,
    )
    .await;

    assert_eq!(updated["name"], "Lighthouse");
    assert_eq!(updated["tags"], json!(["sea"]));
    assert_eq!(updated["imageUrl"], art["imageUrl"]);
    assert_eq!(updated["revision"], 1);
    assert_eq!(provider.calls().len(), 1);
}

#[tokio::test]
async fn uploads_are_processed_and_served() {
    let (app, _) = app();
    let png = solid_png(24, 24, [240, 240, 240, 255]);

    let created = upload(
        &app,
        multipart(
            &[
                ("name", "Snow"),
                ("paletteId", "cga"),
                ("pixelSize", "4"),
                ("style", "Minimalist"),
                ("tags", "winter, white ,"),
            ],
            Some(("snow.png", &png)),
        ),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let art = body_json(created).await;
    assert_eq!(art["name"], "Snow");
    assert_eq!(art["style"], "minimalist");
    assert_eq!(art["tags"], json!(["winter", "white"]));

    let path = art["imageUrl"].as_str().unwrap().strip_prefix(PUBLIC).unwrap();
    let image = send(&app, Method::GET, path, None).await;
    assert_eq!(image.status(), StatusCode::OK);
    assert_eq!(image.headers()[header::CONTENT_TYPE], "image/png");

    let missing = send(&app, Method::GET, "/images/images/nope.png", None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn uploads_are_validated() {
    let (app, _) = app();

    let no_file = upload(&app, multipart(&[("name", "x")], None)).await;
    assert_eq!(no_file.status(), StatusCode::BAD_REQUEST);

    let gif = upload(&app, multipart(&[], Some(("anim.gif", b"GIF89a")))).await;
    assert_eq!(gif.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(gif).await["code"], "VALIDATION_ERROR");

    let png = solid_png(8, 8, [0, 0, 0, 255]);
    let too_sharp = upload(&app, multipart(&[("sharpness", "140")], Some(("a.png", &png)))).await;
    assert_eq!(too_sharp.status(), StatusCode::BAD_REQUEST);

    let broken = upload(&app, multipart(&[], Some(("a.png", b"not really")))).await;
    assert_eq!(broken.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(broken).await["code"], "INVALID_IMAGE");
}

#[tokio::test]
async fn deleted_art_is_gone() {
    let (app, _) = app();
    let art = generate(&app).await;
    let uri = format!("/api/pixel-arts/{}", art["id"].as_str().unwrap());

    assert_eq!(
        send(&app, Method::DELETE, &uri, None).await.status(),
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        send(&app, Method::GET, &uri, None).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        send(&app, Method::DELETE, &uri, None).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn preferences_drive_generation_defaults() {
    let (app, _) = app();

    let prefs = body_json(send(&app, Method::GET, "/api/settings", None).await).await;
    assert_eq!(prefs["defaultPalette"], "gameboy");
    assert_eq!(prefs["theme"], "dark");

    let updated = body_json(
        send(
            &app,
            Method::PUT,
            "/api/settings",
            Some(json!({ "defaultPalette": "pico8", "pixelSize": 16 })),
        )
        .await,
    )
    .await;
    assert_eq!(updated["defaultPalette"], "pico8");

    let art = body_json(
        send(
            &app,
            Method::POST,
            "/api/pixel-arts/generate-from-prompt",
            Some(json!({ "prompt": "a robot" })),
        )
        .await,
    )
    .await;
    assert_eq!(art["paletteId"], "pico8");
    assert_eq!(art["pixelSize"], 16);

    let reset = body_json(send(&app, Method::POST, "/api/settings/reset", None).await).await;
    assert_eq!(reset["defaultPalette"], "gameboy");
    assert_eq!(reset["pixelSize"], 8);
}

#[tokio::test]
async fn custom_palettes_are_managed_over_http() {
    let (app, _) = app();
    let created = send(
        &app,
        Method::POST,
        "/api/palettes",
        Some(json!({ "id": "sunset", "name": "Sunset", "colors": ["#ff5e4d", "#2a1b3d"] })),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);

    let all = body_json(send(&app, Method::GET, "/api/palettes", None).await).await;
    assert_eq!(all.as_array().unwrap().len(), 6);

    let updated = send(
        &app,
        Method::PUT,
        "/api/palettes/sunset",
        Some(json!({ "name": "Dusk" })),
    )
    .await;
    assert_eq!(updated.status(), StatusCode::OK);
    let updated = body_json(updated).await;
    assert_eq!(updated["name"], "Dusk");
    assert_eq!(updated["colors"][1], "#2a1b3d");

    let builtin = send(
        &app,
        Method::PUT,
        "/api/palettes/nes",
        Some(json!({ "name": "Mine" })),
    )
    .await;
    assert_eq!(builtin.status(), StatusCode::BAD_REQUEST);

    let no_colors = send(
        &app,
        Method::POST,
        "/api/palettes",
        Some(json!({ "id": "broken", "name": "Broken", "colors": [] })),
    )
    .await;
    assert_eq!(no_colors.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(no_colors).await["code"], "INVALID_PALETTE");

    let art = body_json(
        send(
            &app,
            Method::POST,
            "/api/pixel-arts/generate-from-prompt",
            Some(json!({ "prompt": "a desert road", "settings": { "paletteId": "sunset" } })),
        )
        .await,
    )
    .await;
    let in_use = send(&app, Method::DELETE, "/api/palettes/sunset", None).await;
    assert_eq!(in_use.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(in_use).await["code"], "VALIDATION_ERROR");

    let art_uri = format!("/api/pixel-arts/{}", art["id"].as_str().unwrap());
    send(&app, Method::DELETE, &art_uri, None).await;
    assert_eq!(
        send(&app, Method::DELETE, "/api/palettes/sunset", None).await.status(),
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        send(&app, Method::GET, "/api/palettes/sunset", None).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn settings_are_checked_on_every_path() {
    let (app, _) = app();

    let zero = send(
        &app,
        Method::POST,
        "/api/pixel-arts/generate-from-prompt",
        Some(json!({ "prompt": "a cat", "settings": { "pixelSize": 0 } })),
    )
    .await;
    assert_eq!(zero.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(zero).await["code"], "VALIDATION_ERROR");

    let art = generate(&app).await;
    let uri = format!("/api/pixel-arts/{}", art["id"].as_str().unwrap());
    let unknown = send(
        &app,
        Method::PUT,
        &uri,
        Some(json!({ "changes": { "paletteId": "nope" } })),
    )
    .await;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(unknown).await["code"], "INVALID_PALETTE");

    let unchanged = body_json(send(&app, Method::GET, &uri, None).await).await;
    assert_eq!(unchanged["paletteId"], "nes");
    assert_eq!(unchanged["revision"], 0);
}
