use std::fs;
use std::path::{Path, PathBuf};

use bidbridge::config::*;
use bidbridge::context::ServerContext;
use bidbridge::mcp::Domain;
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = BridgeConfig::default();
    assert_eq!(config.python, "python3");
    assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
    assert_eq!(config.max_output_bytes, 10 * 1024 * 1024);
    assert!(config.max_concurrent_calls > 0);
}

#[test]
fn test_missing_path_yields_defaults() {
    let config = load_config(None).unwrap();
    assert_eq!(config, BridgeConfig::default());
}

#[test]
fn test_load_partial_toml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bridge.toml");
    fs::write(
        &path,
        r#"
python = "/opt/venv/bin/python"
backend_root = "/srv/bid/backend"
timeout_ms = 45000
python_path = ["/srv/bid/vendor"]
"#,
    )
    .unwrap();

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.python, "/opt/venv/bin/python");
    assert_eq!(config.backend_root, Some(PathBuf::from("/srv/bid/backend")));
    assert_eq!(config.timeout_ms, 45_000);
    assert_eq!(config.python_path, vec![PathBuf::from("/srv/bid/vendor")]);
    assert_eq!(config.max_concurrent_calls, DEFAULT_MAX_CONCURRENT_CALLS);
}

#[test]
fn test_unreadable_config_is_error() {
    let dir = TempDir::new().unwrap();
    let err = load_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
}

#[test]
fn test_malformed_config_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bridge.toml");
    fs::write(&path, "timeout_ms = \"forever\"").unwrap();
    let err = load_config(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("failed to parse config file"));
}

#[test]
fn test_config_to_context() {
    let config = BridgeConfig {
        backend_root: Some(PathBuf::from("/srv/bid/backend")),
        python_path: vec![PathBuf::from("/srv/bid/vendor")],
        ..BridgeConfig::default()
    };
    let ctx = ServerContext::resolve(Domain::DocumentParser, &config, Path::new("/")).unwrap();

    let python_path = &ctx.env.iter().find(|(k, _)| k == "PYTHONPATH").unwrap().1;
    let entries: Vec<PathBuf> = std::env::split_paths(python_path).collect();
    assert_eq!(
        entries,
        vec![
            PathBuf::from("/srv/bid/backend"),
            PathBuf::from("/srv/bid/mcp-servers/document-parser/python"),
            PathBuf::from("/srv/bid/vendor"),
        ]
    );
    assert!(ctx
        .env
        .iter()
        .any(|(k, v)| k == "PYTHONIOENCODING" && v == "utf-8"));
}
