use std::fs;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use bidbridge::bridge::driver::driver_args;
use bidbridge::bridge::{ExternalWorker, SubprocessWorker};
use bidbridge::context::ServerContext;
use bidbridge::errors::BridgeError;
use bidbridge::mcp::{Domain, ToolDispatcher};
use serde_json::{json, Map, Value};
use tempfile::TempDir;

/// A class-based backend shaped like the real document parser.
const STUB_MODULE: &str = r#"
import os

print("stub_parser imported")


class StubParser:
    def __init__(self):
        self.calls = 0

    def get_document_info(self, file_path):
        if not os.path.exists(file_path):
            raise FileNotFoundError("File not found: " + file_path)
        return {"filename": os.path.basename(file_path), "size": os.path.getsize(file_path)}

    def extract_chapters(self, content, patterns=None):
        return {"content": content, "patterns": patterns}

    def _secret(self):
        return "hidden"
"#;

fn python_available() -> bool {
    Command::new("python3")
        .arg("--version")
        .output()
        .is_ok_and(|out| out.status.success())
}

struct StubBackend {
    dir: TempDir,
}

impl StubBackend {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("stub_parser.py"), STUB_MODULE).unwrap();
        fs::create_dir(dir.path().join("inputs")).unwrap();
        Self { dir }
    }

    fn worker(&self) -> SubprocessWorker {
        let ctx = ServerContext::with_command(
            Domain::DocumentParser,
            "python3",
            driver_args("stub_parser", "StubParser"),
            self.dir.path(),
        )
        .with_env("PYTHONPATH", self.dir.path().to_string_lossy())
        .with_env("PYTHONIOENCODING", "utf-8")
        .with_temp_dir(self.dir.path().join("inputs"))
        .with_timeout(Duration::from_secs(20));
        SubprocessWorker::new(Arc::new(ctx))
    }

    fn leftover_inputs(&self) -> usize {
        fs::read_dir(self.dir.path().join("inputs")).unwrap().count()
    }
}

fn args(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {}", other),
    }
}

#[tokio::test]
async fn test_driver_calls_class_method() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let backend = StubBackend::new();
    let doc = backend.dir.path().join("tender.pdf");
    fs::write(&doc, b"%PDF-1.4").unwrap();

    let info = backend
        .worker()
        .invoke("get_document_info", &args(json!({"file_path": doc.to_string_lossy()})))
        .await
        .unwrap();

    assert_eq!(info, json!({"filename": "tender.pdf", "size": 8}));
    assert_eq!(backend.leftover_inputs(), 0);
}

#[tokio::test]
async fn test_driver_passes_hostile_text_as_data() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let backend = StubBackend::new();
    let content = "'''\"\"\"); import os; os._exit(9) #\n第一章 \\ 总则";

    let echoed = backend
        .worker()
        .invoke("extract_chapters", &args(json!({"content": content})))
        .await
        .unwrap();

    assert_eq!(echoed["content"].as_str().unwrap(), content);
    assert!(echoed["patterns"].is_null());
}

#[tokio::test]
async fn test_driver_reports_exceptions_as_backend_errors() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let backend = StubBackend::new();

    let err = backend
        .worker()
        .invoke("get_document_info", &args(json!({"file_path": "/nonexistent.pdf"})))
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::Backend { .. }));
    assert_eq!(err.to_string(), "File not found: /nonexistent.pdf");
    assert_eq!(backend.leftover_inputs(), 0);
}

#[tokio::test]
async fn test_driver_rejects_private_and_missing_methods() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let backend = StubBackend::new();
    let worker = backend.worker();

    for method in ["_secret", "__init__", "drop_everything"] {
        let err = worker.invoke(method, &Map::new()).await.unwrap_err();
        assert_eq!(err.to_string(), format!("Unknown method: {}", method));
    }
}

#[tokio::test]
async fn test_dispatch_through_driver() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let backend = StubBackend::new();
    let dispatcher = ToolDispatcher::new(
        Domain::DocumentParser.catalog(),
        Arc::new(backend.worker()),
        2,
    );

    let result = dispatcher
        .dispatch("get_document_info", Some(json!({"file_path": "/nonexistent.pdf"})))
        .await;

    assert!(result.is_error);
    assert_eq!(result.text(), "Error: File not found: /nonexistent.pdf");
}
