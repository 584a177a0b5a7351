use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::errors::{BridgeError, Result};

use super::{head_excerpt, DECODE_EXCERPT_CHARS};

/// What the interpreter finds in its input file.
#[derive(Debug, Serialize)]
struct InvocationPayload<'a> {
    method: &'a str,
    args: &'a Map<String, Value>,
}

fn current_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// Writes `{method, args}` to a fresh temp file in `dir`.
///
/// The filename is `<prefix><millis>_<random>.json`, created exclusively so
/// concurrent calls never share a file. The file is removed when the
/// returned handle is dropped or closed.
pub fn encode(
    dir: &Path,
    prefix: &str,
    method: &str,
    args: &Map<String, Value>,
) -> Result<NamedTempFile> {
    let payload = serde_json::to_vec(&InvocationPayload { method, args }).map_err(|e| {
        BridgeError::ArgumentEncoding {
            message: format!("failed to serialize arguments for {}: {}", method, e),
        }
    })?;

    let stamped = format!("{}{}_", prefix, current_millis());
    let mut file = tempfile::Builder::new()
        .prefix(&stamped)
        .suffix(".json")
        .rand_bytes(10)
        .tempfile_in(dir)
        .map_err(|e| BridgeError::ArgumentEncoding {
            message: format!("failed to create input file in '{}': {}", dir.display(), e),
        })?;

    file.write_all(&payload)
        .and_then(|_| file.flush())
        .map_err(|e| BridgeError::ArgumentEncoding {
            message: format!(
                "failed to write input file '{}': {}",
                file.path().display(),
                e
            ),
        })?;

    Ok(file)
}

/// Decodes the interpreter's result from its stdout.
///
/// Only the last non-empty line is parsed, so the interpreter may print
/// diagnostics before its result. An `error` member yields
/// [`BridgeError::Backend`]; a `data` member is unwrapped; any other JSON
/// value is the result as-is.
pub fn decode(stdout: &str) -> Result<Value> {
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| BridgeError::Decode {
            message: "interpreter produced no output".to_string(),
            excerpt: String::new(),
        })?;

    let parsed: Value = serde_json::from_str(line).map_err(|e| BridgeError::Decode {
        message: e.to_string(),
        excerpt: head_excerpt(line, DECODE_EXCERPT_CHARS),
    })?;

    if let Some(error) = parsed.get("error").filter(|e| is_set(e)) {
        let message = match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(BridgeError::Backend { message });
    }

    match parsed {
        Value::Object(mut map) if map.contains_key("data") => {
            Ok(map.remove("data").unwrap_or(Value::Null))
        }
        other => Ok(other),
    }
}

fn is_set(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}
