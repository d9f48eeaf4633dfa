// Configuration loading as the binary does it: file on disk, env substitution, validation

use std::io::Write;

use kagami::config::Config;
use kagami::coordinator::CoordinatorOptions;

const FULL_CONFIG: &str = r#"
server:
  address: "0.0.0.0"
  port: 8080
  threads: 8
  max_concurrent_requests: 2000
  default_cache_control: "public, max-age=600"
store:
  bucket: ${KAGAMI_IT_BUCKET}
  region: eu-west-1
  endpoint: "http://localhost:9000"
  force_path_style: true
  access_key: minio
  secret_key: minio123
  timeout_ms: 2000
transform:
  max_width: 2048
  max_height: 2048
  max_source_bytes: 10485760
  max_source_pixels: 25000000
  max_output_bytes: 5242880
  default_quality: 75
  timeout_ms: 4000
  max_concurrent: 2
cache:
  max_bytes: 134217728
  max_entry_bytes: 5242880
"#;

fn write_config(yaml: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

#[test]
fn test_full_config_round_trips_into_options() {
    std::env::set_var("KAGAMI_IT_BUCKET", "media-originals");
    let file = write_config(FULL_CONFIG);

    let config = Config::from_file(file.path()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.server.threads, 8);
    assert_eq!(config.store.bucket, "media-originals");
    assert!(config.store.force_path_style);
    assert_eq!(config.transform.max_concurrent, 2);
    assert_eq!(config.cache.max_entry_bytes, 5242880);

    let options = CoordinatorOptions::from_config(&config);
    assert_eq!(options.store_timeout.as_millis(), 2000);
    assert_eq!(options.default_cache_control, "public, max-age=600");
    assert_eq!(options.transform.default_quality, 75);
}

#[test]
fn test_store_without_bucket_is_rejected() {
    let file = write_config(
        r#"
server:
  address: "127.0.0.1"
  port: 8080
store:
  bucket: "   "
"#,
    );
    let config = Config::from_file(file.path()).unwrap();
    assert!(config.validate().unwrap_err().contains("bucket"));
}

#[test]
fn test_entry_limit_above_budget_rejected() {
    let file = write_config(
        r#"
server:
  address: "127.0.0.1"
  port: 8080
store:
  bucket: originals
cache:
  max_bytes: 1024
  max_entry_bytes: 4096
"#,
    );
    let config = Config::from_file(file.path()).unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn test_missing_store_section_fails_to_parse() {
    let file = write_config(
        r#"
server:
  address: "127.0.0.1"
  port: 8080
"#,
    );
    assert!(Config::from_file(file.path()).is_err());
}
