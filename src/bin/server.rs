use axum::Router;
use pixelforge::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Wires the studio over local storage plus an optional remote store.
fn app<R: BlobStore>(
    config: &ForgeConfig,
    assets: AssetStore<FileSystemStorage, R>,
) -> anyhow::Result<Router> {
    let provider = OpenAiProvider::new(OpenAiConfig {
        api_key: config.provider.api_key.clone(),
        image_model: config.provider.image_model.clone(),
        edit_model: config.provider.edit_model.clone(),
        vision_model: config.provider.vision_model.clone(),
        ..Default::default()
    })?;

    let studio = Studio::new(
        assets,
        FileSystemRepository::new(config.documents_dir()),
        provider,
        PaletteRegistry::builtin(),
        StudioConfig {
            quantize_output: config.quantize_output,
        },
    );

    Ok(PixelforgeServer::default().build(studio))
}

#[cfg(feature = "s3")]
async fn remote_store(bucket: &BucketConfig) -> S3Storage {
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    S3Storage::new(
        aws_sdk_s3::Client::new(&aws_config),
        bucket.bucket.clone(),
        Some(bucket.prefix.clone()),
        bucket.cdn_url.clone(),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pixelforge=debug,tower_http=info")),
        )
        .init();

    let config = ForgeConfig::from_env()?;
    let local = FileSystemStorage::new(config.assets_dir(), config.local_url_prefix());

    let app = match &config.bucket {
        #[cfg(feature = "s3")]
        Some(bucket) => {
            info!("Storing assets in bucket '{}'", bucket.bucket);
            let remote = remote_store(bucket).await;
            app(&config, AssetStore::new(local, Some(remote)))?
        }
        #[cfg(not(feature = "s3"))]
        Some(bucket) => {
            tracing::warn!(
                "USE_S3 is set but the s3 feature is disabled; bucket '{}' is ignored",
                bucket.bucket
            );
            app(&config, AssetStore::local_only(local))?
        }
        None => app(&config, AssetStore::local_only(local))?,
    };

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
