//! S3 object store backend

use async_trait::async_trait;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use futures::stream::{self, StreamExt};

use super::{
    normalize_etag, ByteChunks, ObjectMetadata, ObjectRef, ObjectStore, ObjectStream, StoreConfig,
    StoreError, StoredObject,
};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Reads original images from a single S3 bucket
#[derive(Clone)]
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Wrap an existing client
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from configuration
    ///
    /// Static credentials win over the default provider chain when present.
    pub async fn from_config(config: &StoreConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(aws_credential_types::Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "kagami-config",
            ));
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        tracing::info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = config.endpoint.as_deref().unwrap_or("aws"),
            "S3 object store configured"
        );

        Self::new(S3Client::from_conf(s3_config), config.bucket.clone())
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn open(&self, key: &str, if_match: Option<&str>) -> Result<ObjectStream, StoreError> {
        let mut request = self.client.get_object().bucket(&self.bucket).key(key);
        if let Some(version) = if_match {
            request = request.if_match(format!("\"{}\"", version));
        }

        let output = request.send().await.map_err(|e| {
            let code = e.as_service_error().and_then(|se| se.code()).map(str::to_string);
            match code.as_deref() {
                Some("NoSuchKey") | Some("NotFound") => StoreError::NotFound(key.to_string()),
                Some("PreconditionFailed") => StoreError::VersionMismatch {
                    key: key.to_string(),
                    expected: if_match.unwrap_or_default().to_string(),
                },
                _ => StoreError::Unavailable(format!("S3 GetObject failed: {}", e)),
            }
        })?;

        let metadata = ObjectMetadata {
            object_ref: ObjectRef {
                key: key.to_string(),
                version: resolve_version(
                    output.e_tag(),
                    output.version_id(),
                    output.last_modified().map(|t| t.secs()),
                ),
            },
            content_type: output
                .content_type()
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string(),
            cache_control: output.cache_control().map(str::to_string),
            size: output.content_length().unwrap_or(0).max(0) as u64,
        };

        Ok(ObjectStream {
            metadata,
            body: body_chunks(output.body),
        })
    }
}

/// Adapt the SDK body into chunks; the stream ends after the first error
fn body_chunks(body: ByteStream) -> ByteChunks {
    stream::unfold(Some(body), |body| async move {
        let mut body = body?;
        match body.try_next().await {
            Ok(Some(chunk)) => Some((Ok(chunk), Some(body))),
            Ok(None) => None,
            Err(e) => Some((
                Err(StoreError::Unavailable(format!("Failed to read S3 body: {}", e))),
                None,
            )),
        }
    })
    .boxed()
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn head(&self, key: &str) -> Result<ObjectMetadata, StoreError> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|se| se.is_not_found()).unwrap_or(false) {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::Unavailable(format!("S3 HeadObject failed: {}", e))
                }
            })?;

        Ok(ObjectMetadata {
            object_ref: ObjectRef {
                key: key.to_string(),
                version: resolve_version(
                    output.e_tag(),
                    output.version_id(),
                    output.last_modified().map(|t| t.secs()),
                ),
            },
            content_type: output
                .content_type()
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string(),
            cache_control: output.cache_control().map(str::to_string),
            size: output.content_length().unwrap_or(0).max(0) as u64,
        })
    }

    async fn get(&self, key: &str) -> Result<ObjectStream, StoreError> {
        self.open(key, None).await
    }

    async fn get_version(&self, object: &ObjectRef) -> Result<StoredObject, StoreError> {
        self.open(&object.key, Some(&object.version))
            .await?
            .collect()
            .await
    }
}

/// Pick the most specific version identifier S3 returned
fn resolve_version(
    etag: Option<&str>,
    version_id: Option<&str>,
    last_modified_secs: Option<i64>,
) -> String {
    if let Some(etag) = etag {
        return normalize_etag(etag);
    }
    if let Some(version_id) = version_id {
        return version_id.to_string();
    }
    last_modified_secs
        .map(|secs| format!("mtime-{}", secs))
        .unwrap_or_default()
}
