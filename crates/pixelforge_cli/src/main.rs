use clap::{Args, Parser, Subcommand};
use pixelforge_client::{PixelforgeClient, Revise, Upload};
use pixelforge_core::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pixelforge")]
#[command(about = "CLI for the pixelforge pixel art service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Server URL
    #[arg(short, long, env = "PIXELFORGE_URL", default_value = "http://localhost:8000")]
    url: String,
}

/// Rendering settings; anything left out falls back to server side defaults.
#[derive(Args)]
struct SettingsArgs {
    /// Palette id (e.g. "gameboy", "pico8")
    #[arg(long)]
    palette: Option<String>,

    /// Edge length of one pixel block
    #[arg(long)]
    pixel_size: Option<u32>,

    /// retro, modern, minimalist, dithered or isometric
    #[arg(long, value_parser = setting::<PixelArtStyle>)]
    style: Option<PixelArtStyle>,

    /// transparent, solid, gradient or pattern
    #[arg(long, value_parser = setting::<BackgroundType>)]
    background: Option<BackgroundType>,

    /// none, breathing, flickering or floating
    #[arg(long, value_parser = setting::<AnimationType>)]
    animation: Option<AnimationType>,
}

impl SettingsArgs {
    fn into_patch(self) -> SettingsPatch {
        SettingsPatch {
            pixel_size: self.pixel_size,
            style: self.style,
            palette_id: self.palette,
            background_type: self.background,
            animation_type: self.animation,
            ..Default::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate new pixel art from a text prompt
    Generate {
        prompt: String,
        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Convert a local image into pixel art
    Upload {
        path: PathBuf,
        #[arg(long)]
        name: Option<String>,
        /// Let the image model redraw the picture with this instruction
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// 0 to 100
        #[arg(long)]
        contrast: Option<u8>,
        /// 0 to 100
        #[arg(long)]
        sharpness: Option<u8>,
        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Change settings of an artwork, or edit its image
    Revise {
        id: String,
        /// Edit instruction, e.g. "add a title that says 'Los Cabos'"
        #[arg(short, long)]
        prompt: Option<String>,
        /// Redraw the image instead of only updating metadata
        #[arg(long)]
        apply: bool,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Show one artwork
    Get { id: String },
    /// List artworks
    List {
        #[arg(long)]
        tag: Option<String>,
        #[arg(long, value_parser = setting::<PixelArtStyle>)]
        style: Option<PixelArtStyle>,
        #[arg(long)]
        palette: Option<String>,
        /// Name search
        #[arg(short, long)]
        query: Option<String>,
        #[arg(long, default_value_t = 0)]
        skip: usize,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Show the previous versions of an artwork
    History { id: String },
    /// List palettes, or show one
    Palettes { id: Option<String> },
    /// Add a custom palette
    NewPalette {
        id: String,
        #[arg(long)]
        name: String,
        /// Colors as #rrggbb codes
        #[arg(required = true)]
        colors: Vec<Color>,
    },
    /// Rename a custom palette or replace its colors
    EditPalette {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, num_args = 1..)]
        colors: Option<Vec<Color>>,
    },
    /// Remove a custom palette that no artwork uses
    DeletePalette { id: String },
    /// Delete an artwork
    Delete { id: String },
    /// Save the image (or thumbnail) of an artwork to disk
    Download {
        id: String,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        thumbnail: bool,
    },
}

fn setting<T: DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_ascii_lowercase()))
        .map_err(|_| format!("unknown value '{value}'"))
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = PixelforgeClient::new(cli.url);

    match cli.command {
        Commands::Generate { prompt, settings } => {
            println!("🎨 Generating '{prompt}'...");
            let art = client.generate(&prompt, &settings.into_patch()).await?;
            println!("✅ Created {} ({})", art.id, art.image.image_url);
        }
        Commands::Upload {
            path,
            name,
            prompt,
            tags,
            contrast,
            sharpness,
            settings,
        } => {
            println!("⬆️ Uploading {path:?}...");
            let upload = Upload {
                name,
                prompt,
                tags,
                contrast,
                sharpness,
                settings: settings.into_patch(),
                ..Upload::from_path(&path).await?
            };
            let art = client.upload(upload).await?;
            println!("✅ Created {} ({})", art.id, art.image.image_url);
        }
        Commands::Revise {
            id,
            prompt,
            apply,
            name,
            tags,
            settings,
        } => {
            let revise = Revise {
                changes: SettingsPatch {
                    name,
                    tags,
                    ..settings.into_patch()
                },
                prompt,
                apply_changes_to_image: apply,
            };
            let art = client.revise(&id, &revise).await?;
            println!(
                "✅ Revised {} ({} earlier versions kept)",
                art.id,
                art.version_history.len()
            );
            println!("{}", art.image.image_url);
        }
        Commands::Get { id } => print_json(&client.get(&id).await?)?,
        Commands::List {
            tag,
            style,
            palette,
            query,
            skip,
            limit,
        } => {
            let page = client
                .list(&ArtifactQuery {
                    skip,
                    limit,
                    tag,
                    style,
                    palette_id: palette,
                    q: query,
                })
                .await?;
            for art in &page.items {
                println!("{}  {}  [{}]", art.id, art.name, art.tags.join(", "));
            }
            println!("{} of {} shown", page.items.len(), page.total);
        }
        Commands::History { id } => print_json(&client.history(&id).await?)?,
        Commands::Palettes { id: Some(id) } => print_json(&client.palette(&id).await?)?,
        Commands::Palettes { id: None } => {
            for palette in client.palettes().await? {
                println!("{:<10} {:<12} {}", palette.id, palette.name, palette.hex_codes());
            }
        }
        Commands::NewPalette { id, name, colors } => {
            let palette = Palette { id, name, colors };
            print_json(&client.create_palette(&palette).await?)?;
        }
        Commands::EditPalette { id, name, colors } => {
            let patch = PalettePatch { name, colors };
            print_json(&client.update_palette(&id, &patch).await?)?;
        }
        Commands::DeletePalette { id } => {
            client.delete_palette(&id).await?;
            println!("🗑️ Deleted palette {id}");
        }
        Commands::Delete { id } => {
            client.delete(&id).await?;
            println!("🗑️ Deleted {id}");
        }
        Commands::Download {
            id,
            output,
            thumbnail,
        } => {
            let art = client.get(&id).await?;
            let url = if thumbnail {
                &art.image.thumbnail_url
            } else {
                &art.image.image_url
            };
            println!("Downloading {url}...");

            let data = client.download(url).await?;
            if let Some(parent) = output.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&output, data).await?;

            println!("✅ Saved to {output:?}");
        }
    }

    Ok(())
}
