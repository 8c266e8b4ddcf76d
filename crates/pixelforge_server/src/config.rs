use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("Invalid value for {key}: '{value}' ({reason})")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Remote asset storage settings, present when `USE_S3` is enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketConfig {
    pub bucket: String,
    pub prefix: String,
    pub cdn_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub api_key: String,
    pub image_model: String,
    pub edit_model: String,
    pub vision_model: String,
}

/// Service configuration, read once at startup.
///
/// | Env Var                       | Default                 |
/// |-------------------------------|-------------------------|
/// | `HOST`                        | `0.0.0.0`               |
/// | `PORT`                        | `8000`                  |
/// | `PIXELFORGE_DATA_DIR`         | `./pixelforge_data`     |
/// | `PIXELFORGE_PUBLIC_URL`       | `http://localhost:8000` |
/// | `PIXELFORGE_QUANTIZE_OUTPUT`  | `true`                  |
/// | `OPENAI_API_KEY`              | empty                   |
/// | `OPENAI_IMAGE_MODEL`          | `dall-e-3`              |
/// | `OPENAI_EDIT_MODEL`           | `gpt-image-1`           |
/// | `OPENAI_VISION_MODEL`         | `gpt-4o`                |
/// | `USE_S3`                      | `false`                 |
/// | `PIXELFORGE_BUCKET`           | required with `USE_S3`  |
/// | `PIXELFORGE_BUCKET_PREFIX`    | `pixelforge/`           |
/// | `PIXELFORGE_CDN_URL`          | bucket URL              |
#[derive(Debug, Clone, PartialEq)]
pub struct ForgeConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub public_url: String,
    pub quantize_output: bool,
    pub provider: ProviderConfig,
    pub bucket: Option<BucketConfig>,
}

impl ForgeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let port = var("PORT", "8000");
        let port = port.parse::<u16>().map_err(|e| ConfigError {
            key: "PORT",
            value: port.clone(),
            reason: format!("{e}"),
        })?;

        let bucket = if parse_bool("USE_S3", &var("USE_S3", "false"))? {
            let bucket = var("PIXELFORGE_BUCKET", "");
            if bucket.is_empty() {
                return Err(ConfigError {
                    key: "PIXELFORGE_BUCKET",
                    value: bucket,
                    reason: "required when USE_S3 is enabled".into(),
                });
            }
            Some(BucketConfig {
                bucket,
                prefix: var("PIXELFORGE_BUCKET_PREFIX", "pixelforge/"),
                cdn_url: lookup("PIXELFORGE_CDN_URL").filter(|v| !v.trim().is_empty()),
            })
        } else {
            None
        };

        Ok(Self {
            host: var("HOST", "0.0.0.0"),
            port,
            data_dir: PathBuf::from(var("PIXELFORGE_DATA_DIR", "./pixelforge_data")),
            public_url: var("PIXELFORGE_PUBLIC_URL", "http://localhost:8000")
                .trim_end_matches('/')
                .to_string(),
            quantize_output: parse_bool(
                "PIXELFORGE_QUANTIZE_OUTPUT",
                &var("PIXELFORGE_QUANTIZE_OUTPUT", "true"),
            )?,
            provider: ProviderConfig {
                api_key: var("OPENAI_API_KEY", ""),
                image_model: var("OPENAI_IMAGE_MODEL", "dall-e-3"),
                edit_model: var("OPENAI_EDIT_MODEL", "gpt-image-1"),
                vision_model: var("OPENAI_VISION_MODEL", "gpt-4o"),
            },
            bucket,
        })
    }

    /// Prefix of the URLs under which local blobs are served.
    pub fn local_url_prefix(&self) -> String {
        format!("{}/images/", self.public_url)
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.data_dir.join("assets")
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.data_dir.join("db")
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError {
            key,
            value: value.to_string(),
            reason: "expected a boolean".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<ForgeConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ForgeConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_suit_local_development() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8000);
        assert!(cfg.quantize_output);
        assert!(cfg.bucket.is_none());
        assert_eq!(cfg.provider.edit_model, "gpt-image-1");
        assert_eq!(cfg.local_url_prefix(), "http://localhost:8000/images/");
    }

    #[test]
    fn bucket_settings_are_read_when_enabled() {
        let cfg = config(&[
            ("USE_S3", "true"),
            ("PIXELFORGE_BUCKET", "art"),
            ("PIXELFORGE_CDN_URL", "https://cdn.example"),
            ("PIXELFORGE_PUBLIC_URL", "https://forge.example/"),
        ])
        .unwrap();

        assert_eq!(
            cfg.bucket,
            Some(BucketConfig {
                bucket: "art".to_string(),
                prefix: "pixelforge/".to_string(),
                cdn_url: Some("https://cdn.example".to_string()),
            })
        );
        assert_eq!(cfg.local_url_prefix(), "https://forge.example/images/");
    }

    #[test]
    fn invalid_values_fail_with_the_offending_key() {
        let err = config(&[("PORT", "eighty")]).unwrap_err();
        assert_eq!(err.key, "PORT");

        let err = config(&[("PIXELFORGE_QUANTIZE_OUTPUT", "maybe")]).unwrap_err();
        assert_eq!(err.key, "PIXELFORGE_QUANTIZE_OUTPUT");

        let err = config(&[("USE_S3", "1")]).unwrap_err();
        assert_eq!(err.key, "PIXELFORGE_BUCKET");
    }
}
