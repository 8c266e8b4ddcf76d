use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use pixelforge_core::prelude::*;
use tracing::{debug, error, instrument};

/// Remote asset storage on an S3 compatible bucket, usually fronted by a CDN.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    prefix: String,
    url_prefix: String,
}

impl S3Storage {
    /// `public_base` is the CDN (or bucket website) origin objects are served
    /// from, e.g. `https://cdn.example.com`.
    pub fn new(
        client: Client,
        bucket: String,
        prefix: Option<String>,
        public_base: Option<String>,
    ) -> Self {
        let prefix = prefix.unwrap_or_default();
        let base = public_base
            .unwrap_or_else(|| format!("https://{bucket}.s3.amazonaws.com"));
        let url_prefix = format!("{}/{prefix}", base.trim_end_matches('/'));

        Self {
            client,
            bucket,
            prefix,
            url_prefix,
        }
    }

    fn key(&self, path: &str) -> String {
        if self.prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}{path}", self.prefix)
        }
    }

    fn content_type(path: &str) -> &'static str {
        match path.rsplit('.').next() {
            Some("png") => "image/png",
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            _ => "application/octet-stream",
        }
    }
}

impl BlobStore for S3Storage {
    #[instrument(skip(self, data), fields(bucket = %self.bucket, key))]
    async fn write_blob(&self, path: &str, data: Bytes) -> Result<bool, StorageError> {
        let key = self.key(path);
        tracing::Span::current().record("key", &key);

        let exists = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await;

        if exists.is_ok() {
            debug!("Blob already exists in S3");
            return Ok(false);
        }

        debug!("Uploading new blob to S3...");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(Self::content_type(path))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to upload blob: {e:?}");
                StorageError::Generic(format!("S3 Upload Error: {e:?}"))
            })?;

        debug!("Upload successful");
        Ok(true)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket, key))]
    async fn read_file(&self, path: &str) -> Result<Bytes, StorageError> {
        let key = self.key(path);
        tracing::Span::current().record("key", &key);

        debug!("Reading file from S3...");
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await;

        match res {
            Ok(output) => {
                let data = output.body.collect().await.map_err(|e| {
                    error!("Failed to stream body: {:?}", e);
                    StorageError::Generic(format!("Failed to stream S3 body: {}", e))
                })?;
                Ok(data.into_bytes())
            }
            Err(SdkError::ServiceError(err)) => {
                let inner = err.err();
                if inner.is_no_such_key() {
                    debug!("File not found in S3");
                    Err(StorageError::NotFound(path.to_string()))
                } else {
                    error!("S3 Service Error during read: {:?}", err);
                    Err(StorageError::Generic(format!(
                        "S3 Service Error: {:?}",
                        inner
                    )))
                }
            }
            Err(e) => {
                error!("Unexpected S3 Error: {:?}", e);
                Err(StorageError::Generic(format!("S3 Error: {:?}", e)))
            }
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let key = self.key(path);
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(err)) if err.err().is_not_found() => Ok(false),
            Err(SdkError::ServiceError(err)) => {
                error!("S3 Head Object Error: {:?}", err);
                Err(StorageError::Generic(format!(
                    "S3 Service Error: {:?}",
                    err
                )))
            }
            Err(e) => Err(StorageError::Generic(format!("S3 Error: {e}"))),
        }
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn delete_file(&self, path: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.key(path))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to delete object: {e:?}");
                StorageError::Generic(format!("S3 Delete Error: {e:?}"))
            })?;
        Ok(())
    }

    fn url_prefix(&self) -> &str {
        &self.url_prefix
    }
}
