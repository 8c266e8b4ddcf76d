use bytes::Bytes;
use pixelforge_core::prelude::*;
use pixelforge_mock::{
    MemoryRepository, MemoryStorage, ProviderCall, ScriptedProvider, solid_png,
};
use pixelforge_studio::*;

type TestStudio = Studio<MemoryStorage, MemoryStorage, MemoryRepository, ScriptedProvider>;

const LOCAL: &str = "http://localhost:8000/images/";
const CDN: &str = "https://cdn.example/pixelforge/";

struct Harness {
    studio: TestStudio,
    local: MemoryStorage,
    remote: MemoryStorage,
    provider: ScriptedProvider,
}

fn harness() -> Harness {
    let local = MemoryStorage::new(LOCAL);
    let remote = MemoryStorage::new(CDN);
    let provider = ScriptedProvider::default().with_description("A beach with two palm trees.");
    let studio = Studio::new(
        AssetStore::new(local.clone(), Some(remote.clone())),
        MemoryRepository::new(),
        provider.clone(),
        PaletteRegistry::builtin(),
        StudioConfig::default(),
    );
    Harness {
        studio,
        local,
        remote,
        provider,
    }
}

fn retro_gameboy() -> ArtSettings {
    ArtSettings {
        pixel_size: 8,
        style: PixelArtStyle::Retro,
        palette_id: "gameboy".to_string(),
        ..Default::default()
    }
}

async fn seed(h: &Harness) -> Artifact {
    h.studio
        .generate(GenerateRequest {
            prompt: "a beach at sunset".to_string(),
            settings: retro_gameboy(),
        })
        .await
        .unwrap()
}

fn edit_with(prompt: &str) -> RevisionRequest {
    RevisionRequest {
        prompt: Some(prompt.to_string()),
        apply_changes_to_image: true,
        ..Default::default()
    }
}

async fn stored_json(h: &Harness, id: &str) -> String {
    serde_json::to_string(&h.studio.get(id).await.unwrap()).unwrap()
}

#[tokio::test]
async fn generation_stores_a_quantized_artifact() {
    let h = harness();
    let art = h
        .studio
        .generate(GenerateRequest {
            prompt: "a brave knight holding a shiny sword and a shield".to_string(),
            settings: retro_gameboy(),
        })
        .await
        .unwrap();

    assert_eq!(art.name, "Generated from: a brave knight holding a shiny...");
    assert_eq!(art.tags, vec!["ai-generated", "prompt"]);
    assert!(art.version_history.is_empty());
    assert!(art.image.image_url.starts_with(CDN));
    assert_eq!((art.width, art.height), (64, 64));

    let png = h.studio.assets().fetch(&art.image.image_url).await.unwrap();
    let image = image::load_from_memory(&png).unwrap().to_rgba8();
    let gameboy = PaletteRegistry::builtin().resolve("gameboy").unwrap().clone();
    assert!(
        image
            .pixels()
            .all(|p| gameboy.colors.iter().any(|c| c.0 == [p[0], p[1], p[2]]))
    );

    let calls = h.provider.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].prompt.as_deref().unwrap().contains("#0f380f"));
}

#[tokio::test]
async fn blank_prompts_and_unknown_palettes_are_rejected() {
    let h = harness();
    let blank = h
        .studio
        .generate(GenerateRequest {
            prompt: "   ".to_string(),
            settings: retro_gameboy(),
        })
        .await;
    assert!(matches!(blank, Err(ForgeError::Validation(_))));

    let unknown = h
        .studio
        .generate(GenerateRequest {
            prompt: "a tree".to_string(),
            settings: ArtSettings {
                palette_id: "vaporwave".to_string(),
                ..retro_gameboy()
            },
        })
        .await;
    assert!(matches!(unknown, Err(ForgeError::InvalidPalette(_))));
    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn adding_a_title_archives_the_previous_version() {
    let h = harness();
    let before = seed(&h).await;

    h.provider.set_image(solid_png(64, 64, [15, 56, 15, 255]));
    let revision = h
        .studio
        .revise(&before.id, edit_with("Añadir un título que diga 'Los Cabos'"))
        .await
        .unwrap();
    let after = revision.artifact;

    assert_eq!(revision.intent, Some(Intent::AddText));
    assert_eq!(after.version_history.len(), 1);
    assert_eq!(after.version_history[0].prompt, before.prompt);
    assert_eq!(after.version_history[0].image, before.image);
    assert_ne!(after.image, before.image);
    assert_eq!(after.prompt.as_deref(), Some("Añadir un título que diga 'Los Cabos'"));
    assert_eq!(after.revision, before.revision + 1);
    assert!(after.updated_at >= before.updated_at);

    let calls = h.provider.calls();
    let kinds: Vec<_> = calls.iter().map(|c| c.call).collect();
    assert_eq!(
        kinds,
        vec![ProviderCall::Generate, ProviderCall::Describe, ProviderCall::Edit]
    );
    let edit_prompt = calls[2].prompt.as_deref().unwrap();
    assert!(edit_prompt.contains("A beach with two palm trees."));
    assert!(edit_prompt.contains("(add_text)"));
}

#[tokio::test]
async fn history_keeps_the_five_latest_versions() {
    let h = harness();
    let art = seed(&h).await;

    for i in 1..=5 {
        h.studio
            .revise(&art.id, edit_with(&format!("revision {i}")))
            .await
            .unwrap();
    }
    let full = h.studio.history(&art.id).await.unwrap();
    assert_eq!(full.len(), 5);
    assert_eq!(full[0].prompt.as_deref(), Some("a beach at sunset"));

    let last = h
        .studio
        .revise(&art.id, edit_with("revision 6"))
        .await
        .unwrap()
        .artifact;

    let prompts: Vec<_> = last
        .version_history
        .iter()
        .map(|s| s.prompt.clone().unwrap())
        .collect();
    assert_eq!(
        prompts,
        vec!["revision 1", "revision 2", "revision 3", "revision 4", "revision 5"]
    );
    assert_eq!(last.prompt.as_deref(), Some("revision 6"));
}

#[tokio::test]
async fn settings_changes_are_recorded_on_the_snapshot() {
    let h = harness();
    let art = seed(&h).await;

    let changes = SettingsPatch {
        palette_id: Some("pico8".to_string()),
        pixel_size: Some(4),
        ..Default::default()
    };
    let revised = h
        .studio
        .revise(
            &art.id,
            RevisionRequest {
                changes: changes.clone(),
                ..edit_with("make the sky a darker purple")
            },
        )
        .await
        .unwrap();

    assert_eq!(revised.intent, Some(Intent::ColorChange));
    assert_eq!(revised.artifact.settings.palette_id, "pico8");
    assert_eq!(revised.artifact.settings.pixel_size, 4);
    assert_eq!(revised.artifact.version_history[0].changes, changes);
}

#[tokio::test]
async fn failed_edits_leave_the_record_untouched() {
    let h = harness();
    let art = seed(&h).await;
    let snapshot = stored_json(&h, &art.id).await;

    h.provider.fail(ProviderCall::Edit);
    let err = h
        .studio
        .revise(&art.id, edit_with("quita el árbol"))
        .await
        .unwrap_err();
    assert!(matches!(err, ForgeError::Provider(_)));
    assert_eq!(stored_json(&h, &art.id).await, snapshot);

    h.provider.recover(ProviderCall::Edit);
    h.provider.fail(ProviderCall::Describe);
    assert!(matches!(
        h.studio.revise(&art.id, edit_with("quita el árbol")).await,
        Err(ForgeError::Provider(_))
    ));
    assert_eq!(stored_json(&h, &art.id).await, snapshot);
}

#[tokio::test]
async fn undecodable_provider_output_is_a_provider_failure() {
    let h = harness();
    let art = seed(&h).await;
    let snapshot = stored_json(&h, &art.id).await;

    h.provider.set_image(Bytes::from_static(b"<html>rate limited</html>"));
    assert!(matches!(
        h.studio.revise(&art.id, edit_with("add a dog")).await,
        Err(ForgeError::Provider(ProviderError::Malformed(_)))
    ));
    assert_eq!(stored_json(&h, &art.id).await, snapshot);
}

#[tokio::test]
async fn revisions_need_an_instruction_and_a_valid_palette() {
    let h = harness();
    let art = seed(&h).await;

    assert!(matches!(
        h.studio.revise(&art.id, edit_with("  ")).await,
        Err(ForgeError::Validation(_))
    ));

    let bad_palette = RevisionRequest {
        changes: SettingsPatch {
            palette_id: Some("nope".to_string()),
            ..Default::default()
        },
        ..edit_with("add a dog")
    };
    assert!(matches!(
        h.studio.revise(&art.id, bad_palette).await,
        Err(ForgeError::InvalidPalette(_))
    ));
    assert!(matches!(
        h.studio.revise("missing", edit_with("add a dog")).await,
        Err(ForgeError::NotFound(_))
    ));
    assert_eq!(h.provider.calls().len(), 1);
}

#[tokio::test]
async fn metadata_updates_skip_the_provider() {
    let h = harness();
    let art = seed(&h).await;

    let revised = h
        .studio
        .revise(
            &art.id,
            RevisionRequest {
                changes: SettingsPatch {
                    name: Some("Sunset".to_string()),
                    animation_type: Some(AnimationType::Floating),
                    ..Default::default()
                },
                prompt: Some("ignored".to_string()),
                apply_changes_to_image: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(revised.intent, None);
    let updated = revised.artifact;
    assert_eq!(updated.name, "Sunset");
    assert!(updated.is_animated);
    assert_eq!(updated.image, art.image);
    assert_eq!(updated.prompt, art.prompt);
    assert!(updated.version_history.is_empty());
    assert_eq!(h.provider.calls().len(), 1);
}

#[tokio::test]
async fn remote_outage_falls_back_to_local_storage() {
    let h = harness();
    h.remote.set_failing(true);

    let art = seed(&h).await;
    assert!(art.image.image_url.starts_with(LOCAL));
    assert_eq!(h.local.keys().len(), 2);

    // The asset can still be revised once the remote is back.
    h.remote.set_failing(false);
    let revised = h
        .studio
        .revise(&art.id, edit_with("add a dog"))
        .await
        .unwrap();
    assert_eq!(revised.backend, Some(StorageBackend::Remote));
}

#[tokio::test]
async fn total_storage_outage_aborts_the_revision() {
    let h = harness();
    let art = seed(&h).await;
    let snapshot = stored_json(&h, &art.id).await;

    h.remote.set_failing(true);
    h.local.set_failing(true);
    assert!(matches!(
        h.studio.revise(&art.id, edit_with("add a dog")).await,
        Err(ForgeError::Storage(_))
    ));
    assert_eq!(stored_json(&h, &art.id).await, snapshot);
}

#[tokio::test]
async fn uploads_are_pixelated_locally_without_a_prompt() {
    let h = harness();
    let art = h
        .studio
        .process_upload(UploadRequest {
            file_name: "photo.PNG".to_string(),
            data: solid_png(40, 24, [200, 30, 30, 255]),
            name: None,
            settings: ArtSettings {
                palette_id: "nes".to_string(),
                ..retro_gameboy()
            },
            contrast: 50,
            sharpness: 70,
            prompt: None,
            tags: vec!["upload".to_string()],
        })
        .await
        .unwrap();

    assert_eq!(art.name, "photo");
    assert_eq!((art.width, art.height), (40, 24));
    assert_eq!(art.tags, vec!["upload"]);
    assert!(art.prompt.is_none());
    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn uploads_fall_back_to_local_processing_when_the_provider_fails() {
    let h = harness();
    h.provider.fail(ProviderCall::Edit);

    let art = h
        .studio
        .process_upload(UploadRequest {
            file_name: "cat.jpg".to_string(),
            data: solid_png(32, 32, [90, 90, 90, 255]),
            name: Some("Cat".to_string()),
            settings: retro_gameboy(),
            contrast: 50,
            sharpness: 50,
            prompt: Some("make it a cyberpunk cat".to_string()),
            tags: Vec::new(),
        })
        .await
        .unwrap();

    assert_eq!(art.name, "Cat");
    assert_eq!(art.prompt.as_deref(), Some("make it a cyberpunk cat"));
    assert_eq!(h.provider.calls().len(), 1);
}

#[tokio::test]
async fn uploads_validate_format_and_content() {
    let h = harness();
    let request = |file_name: &str, data: Bytes| UploadRequest {
        file_name: file_name.to_string(),
        data,
        name: None,
        settings: retro_gameboy(),
        contrast: 50,
        sharpness: 70,
        prompt: None,
        tags: Vec::new(),
    };

    assert!(matches!(
        h.studio
            .process_upload(request("doc.gif", solid_png(8, 8, [0, 0, 0, 255])))
            .await,
        Err(ForgeError::Validation(_))
    ));
    assert!(matches!(
        h.studio
            .process_upload(request("fake.png", Bytes::from_static(b"not a png")))
            .await,
        Err(ForgeError::Image(_))
    ));
}

#[tokio::test]
async fn delete_removes_current_assets_but_keeps_history() {
    let h = harness();
    let art = seed(&h).await;
    h.provider.set_image(solid_png(64, 64, [15, 56, 15, 255]));
    let revised = h
        .studio
        .revise(&art.id, edit_with("add a boat"))
        .await
        .unwrap()
        .artifact;

    let deleted = h.studio.delete(&art.id).await.unwrap();
    assert_eq!(deleted.id, art.id);
    assert!(matches!(
        h.studio.get(&art.id).await,
        Err(ForgeError::NotFound(_))
    ));

    let remaining = h.remote.keys();
    assert_eq!(remaining.len(), 2);
    assert!(
        revised.version_history[0]
            .image
            .image_url
            .ends_with(&remaining[0])
    );

    assert!(matches!(
        h.studio.delete(&art.id).await,
        Err(ForgeError::NotFound(_))
    ));
}

#[tokio::test]
async fn listing_filters_by_tag() {
    let h = harness();
    seed(&h).await;
    seed(&h).await;

    let page = h
        .studio
        .list(&ArtifactQuery {
            tag: Some("ai-generated".to_string()),
            limit: 1,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 1);
}

#[tokio::test]
async fn preferences_default_update_and_reset() {
    let h = harness();
    let prefs = h.studio.preferences(DEFAULT_USER).await.unwrap();
    assert_eq!(prefs.default_palette, "gameboy");
    assert_eq!(prefs.sharpness, 70);

    let updated = h
        .studio
        .update_preferences(
            DEFAULT_USER,
            &PreferencesPatch {
                theme: Some("light".to_string()),
                default_palette: Some("moody".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.theme, "light");
    assert_eq!(h.studio.preferences(DEFAULT_USER).await.unwrap(), updated);

    assert!(matches!(
        h.studio
            .update_preferences(
                DEFAULT_USER,
                &PreferencesPatch {
                    default_palette: Some("nope".to_string()),
                    ..Default::default()
                },
            )
            .await,
        Err(ForgeError::InvalidPalette(_))
    ));

    let reset = h.studio.reset_preferences(DEFAULT_USER).await.unwrap();
    assert_eq!(reset.theme, "dark");
    assert_eq!(reset.created_at, prefs.created_at);
}

#[tokio::test]
async fn identical_artworks_do_not_share_files() {
    let h = harness();
    let first = seed(&h).await;
    let second = seed(&h).await;
    assert_ne!(first.image.image_url, second.image.image_url);

    h.studio.delete(&first.id).await.unwrap();
    let survivor = h.studio.get(&second.id).await.unwrap();
    assert!(
        h.studio
            .assets()
            .fetch(&survivor.image.image_url)
            .await
            .is_ok()
    );
    assert!(
        h.studio
            .assets()
            .fetch(&survivor.image.thumbnail_url)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn history_outlives_delete_when_the_edit_changed_nothing() {
    let h = harness();
    let art = seed(&h).await;
    // The provider answers the edit with the image it generated.
    let revised = h
        .studio
        .revise(&art.id, edit_with("keep it as it is"))
        .await
        .unwrap()
        .artifact;
    let archived = revised.version_history[0].image.clone();
    assert_eq!(archived, art.image);

    h.studio.delete(&art.id).await.unwrap();
    assert!(h.studio.assets().fetch(&archived.image_url).await.is_ok());
}

#[tokio::test]
async fn metadata_updates_check_the_palette() {
    let h = harness();
    let art = seed(&h).await;
    let before = stored_json(&h, &art.id).await;

    let unknown = RevisionRequest {
        changes: SettingsPatch {
            name: Some("Renamed".to_string()),
            palette_id: Some("nope".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(matches!(
        h.studio.revise(&art.id, unknown).await,
        Err(ForgeError::InvalidPalette(_))
    ));
    assert_eq!(stored_json(&h, &art.id).await, before);
}

#[tokio::test]
async fn pixel_size_must_be_positive() {
    let h = harness();
    let zero = ArtSettings {
        pixel_size: 0,
        ..retro_gameboy()
    };
    assert!(matches!(
        h.studio
            .generate(GenerateRequest {
                prompt: "a cat".to_string(),
                settings: zero,
            })
            .await,
        Err(ForgeError::Validation(_))
    ));
    assert!(h.provider.calls().is_empty());

    let art = seed(&h).await;
    let shrink = RevisionRequest {
        changes: SettingsPatch {
            pixel_size: Some(0),
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(matches!(
        h.studio.revise(&art.id, shrink).await,
        Err(ForgeError::Validation(_))
    ));
    assert_eq!(h.studio.get(&art.id).await.unwrap().settings.pixel_size, 8);
}

#[tokio::test]
async fn custom_palettes_can_be_created_used_and_removed() {
    let h = harness();
    let sunset = Palette {
        id: "sunset".to_string(),
        name: "Sunset".to_string(),
        colors: vec![Color::rgb(255, 94, 77), Color::rgb(42, 27, 61)],
    };
    h.studio.create_palette(sunset.clone()).await.unwrap();
    assert!(matches!(
        h.studio.create_palette(sunset.clone()).await,
        Err(ForgeError::Validation(_))
    ));
    assert_eq!(h.studio.palettes().await.unwrap().len(), 6);

    let renamed = h
        .studio
        .update_palette(
            "sunset",
            &PalettePatch {
                name: Some("Dusk".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Dusk");
    assert_eq!(renamed.colors, sunset.colors);
    assert!(matches!(
        h.studio
            .update_palette("nes", &PalettePatch::default())
            .await,
        Err(ForgeError::Validation(_))
    ));

    let art = h
        .studio
        .generate(GenerateRequest {
            prompt: "a desert road".to_string(),
            settings: ArtSettings {
                palette_id: "sunset".to_string(),
                ..retro_gameboy()
            },
        })
        .await
        .unwrap();
    assert_eq!(art.settings.palette_id, "sunset");
    assert!(matches!(
        h.studio.delete_palette("sunset").await,
        Err(ForgeError::Validation(_))
    ));

    h.studio.delete(&art.id).await.unwrap();
    h.studio.delete_palette("sunset").await.unwrap();
    assert!(matches!(
        h.studio.palette("sunset").await,
        Err(ForgeError::NotFound(_))
    ));
    assert!(matches!(
        h.studio.delete_palette("gameboy").await,
        Err(ForgeError::Validation(_))
    ));
}
