// S3 object store and coordinator against LocalStack
//
// Covers what the in-memory store cannot: real ETags, HeadObject 404s and
// If-Match preconditions on GetObject.

use image::{DynamicImage, ImageFormat, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use testcontainers::{clients::Cli, RunnableImage};
use testcontainers_modules::localstack::LocalStack;

use kagami::cache::{CacheConfig, DerivativeCache};
use kagami::coordinator::{CacheStatus, CoordinatorOptions, RequestCoordinator};
use kagami::store::{ObjectStore, S3ObjectStore, StoreConfig, StoreError};
use kagami::transform::ImageTransformEngine;

const BUCKET: &str = "originals";

fn test_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, _| image::Rgba([x as u8, 0, 200, 255]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

fn store_config(endpoint: &str) -> StoreConfig {
    StoreConfig {
        bucket: BUCKET.to_string(),
        region: "us-east-1".to_string(),
        endpoint: Some(endpoint.to_string()),
        force_path_style: true,
        access_key: Some("test".to_string()),
        secret_key: Some("test".to_string()),
        timeout_ms: 5_000,
    }
}

// Helper: Start LocalStack and return a raw client for seeding
async fn setup_localstack(docker: &Cli) -> (testcontainers::Container<'_, LocalStack>, String, aws_sdk_s3::Client) {
    let localstack_image =
        RunnableImage::from(LocalStack::default()).with_env_var(("SERVICES", "s3"));

    let container = docker.run(localstack_image);
    let port = container.get_host_port_ipv4(4566);
    let endpoint = format!("http://127.0.0.1:{}", port);

    let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .endpoint_url(&endpoint)
        .region(aws_config::Region::new("us-east-1"))
        .credentials_provider(aws_credential_types::Credentials::new(
            "test", "test", None, None, "test",
        ))
        .load()
        .await;
    let s3_config = aws_sdk_s3::config::Builder::from(&config)
        .force_path_style(true)
        .build();
    let client = aws_sdk_s3::Client::from_conf(s3_config);

    client
        .create_bucket()
        .bucket(BUCKET)
        .send()
        .await
        .expect("Failed to create bucket");

    (container, endpoint, client)
}

async fn upload(client: &aws_sdk_s3::Client, key: &str, body: Vec<u8>, content_type: &str) {
    client
        .put_object()
        .bucket(BUCKET)
        .key(key)
        .content_type(content_type)
        .cache_control("public, max-age=120")
        .body(body.into())
        .send()
        .await
        .expect("Failed to upload object");
}

#[test]
#[ignore] // Requires Docker - run with: cargo test -- --ignored
fn test_s3_store_head_get_and_version_mismatch() {
    let docker = Cli::default();
    let runtime = tokio::runtime::Runtime::new().unwrap();

    runtime.block_on(async {
        let (_container, endpoint, client) = setup_localstack(&docker).await;
        upload(&client, "a.png", test_png(10, 10), "image/png").await;

        let store = S3ObjectStore::from_config(&store_config(&endpoint)).await;

        let meta = store.head("a.png").await.unwrap();
        assert!(!meta.object_ref.version.is_empty());
        assert!(!meta.object_ref.version.contains('"'));
        assert_eq!(meta.content_type, "image/png");
        assert_eq!(meta.cache_control.as_deref(), Some("public, max-age=120"));

        let object = store.get_version(&meta.object_ref).await.unwrap();
        assert_eq!(object.metadata.object_ref, meta.object_ref);
        assert_eq!(object.metadata.size, meta.size);

        let streamed = store.get("a.png").await.unwrap();
        assert_eq!(streamed.metadata.size, meta.size);
        assert_eq!(streamed.collect().await.unwrap().body, object.body);

        // Replace the object; the old version must no longer be readable
        upload(&client, "a.png", test_png(20, 20), "image/png").await;
        let err = store.get_version(&meta.object_ref).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionMismatch { .. }));

        assert_eq!(
            store.head("missing.png").await.unwrap_err(),
            StoreError::NotFound("missing.png".to_string())
        );
        assert_eq!(
            store.get("missing.png").await.unwrap_err(),
            StoreError::NotFound("missing.png".to_string())
        );
    });
}

#[test]
#[ignore] // Requires Docker - run with: cargo test -- --ignored
fn test_coordinator_resizes_from_s3() {
    let docker = Cli::default();
    let runtime = tokio::runtime::Runtime::new().unwrap();

    runtime.block_on(async {
        let (_container, endpoint, client) = setup_localstack(&docker).await;
        upload(&client, "photos/wide.png", test_png(400, 200), "image/png").await;

        let options = CoordinatorOptions::default();
        let coordinator = RequestCoordinator::new(
            Arc::new(S3ObjectStore::from_config(&store_config(&endpoint)).await),
            Arc::new(ImageTransformEngine::new(options.transform.clone())),
            DerivativeCache::new(&CacheConfig::default()),
            options,
        );

        let mut query = HashMap::new();
        query.insert("w".to_string(), "100".to_string());

        let first = coordinator.handle("photos/wide.png", &query).await.unwrap();
        let second = coordinator.handle("photos/wide.png", &query).await.unwrap();

        assert_eq!(first.cache_status, CacheStatus::Miss);
        assert_eq!(second.cache_status, CacheStatus::Hit);
        assert_eq!(first.cache_control, "public, max-age=120");
        let img = image::load_from_memory(first.body.as_bytes().unwrap()).unwrap();
        assert_eq!((img.width(), img.height()), (100, 50));

        let passthrough = coordinator
            .handle("photos/wide.png", &HashMap::new())
            .await
            .unwrap();
        assert_eq!(passthrough.cache_status, CacheStatus::Bypass);
        assert_eq!(passthrough.content_type, "image/png");
        let original = passthrough.body.collect().await.unwrap();
        assert_eq!(original.len() as u64, passthrough.content_length);
    });
}
