use std::env;
use std::fs::write;
use std::path::PathBuf;

use serial_test::serial;
use swatchwork::config::StorageConfig;
use swatchwork::load_config::load_config;
use tempfile::NamedTempFile;

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

/// A static config plus the env secret produces a complete Supabase config.
#[tokio::test]
#[serial]
async fn test_load_config_injects_supabase_key_from_env() {
    let file = config_file(
        r#"
storage:
  type: supabase
  base_url: https://project.supabase.co
  bucket: catalog
discovery:
  collections: [tees, dresses]
  fixed_layers: [0]
render:
  width: 1500
"#,
    );
    env::set_var("SUPABASE_KEY", "top-secret-test-key");

    let config = load_config(file.path()).expect("Config should load");

    let StorageConfig::Supabase(supabase) = &config.storage else {
        panic!("expected supabase storage");
    };
    assert_eq!(supabase.base_url, "https://project.supabase.co");
    assert_eq!(supabase.bucket, "catalog");
    assert_eq!(supabase.api_key.as_deref(), Some("top-secret-test-key"));

    assert_eq!(config.discovery.collections, vec!["tees", "dresses"]);
    assert_eq!(config.discovery.fixed_layers, vec![0]);
    assert_eq!(config.discovery.patterns_folder, "textures");
    assert_eq!(config.discovery.cache_ttl_secs, 1800);

    assert_eq!(config.render.width, 1500);
    assert_eq!(config.render.height, 2000);
    assert_eq!(config.render.max_dimension, 8000);
    assert!(config.render.parallel_fetch);

    env::remove_var("SUPABASE_KEY");
}

/// A missing key is not fatal: public buckets can be listed anonymously.
#[tokio::test]
#[serial]
async fn test_load_config_without_key_is_anonymous() {
    let file = config_file(
        "storage:\n  type: supabase\n  base_url: https://project.supabase.co\n  bucket: catalog\n",
    );
    env::remove_var("SUPABASE_KEY");

    let config = load_config(file.path()).expect("Config should load");
    let StorageConfig::Supabase(supabase) = config.storage else {
        panic!("expected supabase storage");
    };
    assert!(supabase.api_key.is_none());
}

#[tokio::test]
#[serial]
async fn test_load_config_local_storage_uses_defaults() {
    let file = config_file("storage:\n  type: local\n  root: ./catalog\n");

    let config = load_config(file.path()).expect("Config should load");

    let StorageConfig::Local(local) = &config.storage else {
        panic!("expected local storage");
    };
    assert_eq!(local.root, PathBuf::from("./catalog"));
    assert_eq!(config.discovery.cache_dir, PathBuf::from(".swatchwork-cache"));
    assert_eq!(config.render.output_dir, PathBuf::from("renders"));
    assert_eq!(config.render.preview_max_edge, 1024);
}

#[tokio::test]
#[serial]
async fn test_load_config_errors_for_invalid_file() {
    let file = config_file("not-yaml: [:::");

    let msg = load_config(file.path()).unwrap_err().to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[tokio::test]
#[serial]
async fn test_load_config_errors_for_missing_file() {
    let msg = load_config("/definitely/not/here.yaml").unwrap_err().to_string();
    assert!(msg.contains("Failed to read config file"), "got: {msg}");
}

#[tokio::test]
#[serial]
async fn test_load_config_rejects_zero_canvas() {
    let file = config_file("storage:\n  type: local\n  root: .\nrender:\n  height: 0\n");

    let msg = load_config(file.path()).unwrap_err().to_string();
    assert!(msg.contains("must be positive"), "got: {msg}");
}
