//! Entry point for backends that expose a class instead of a script.
//!
//! The driver is a fixed program run with `python -c`. Everything that
//! varies (module, class, input file) arrives through `sys.argv`, so caller
//! content is never part of the source that gets executed.

use std::ffi::OsString;

/// Loads `{method, args}` from the input file, calls
/// `getattr(Class(), method)(**args)`, and prints the result as one JSON line.
/// Failures print `{"error": ...}` and exit 1, with the traceback on stderr.
pub const DRIVER_SOURCE: &str = r#"
import importlib
import json
import sys
import traceback


def fail(message):
    print(json.dumps({"error": message}, ensure_ascii=False))
    return 1


def main():
    if len(sys.argv) != 4:
        return fail("driver expects <module> <class> <input.json>")
    module_name, class_name, input_path = sys.argv[1:4]
    with open(input_path, encoding="utf-8") as fh:
        request = json.load(fh)
    method = request.get("method") or ""
    args = request.get("args") or {}
    try:
        target = getattr(importlib.import_module(module_name), class_name)()
        handler = None if method.startswith("_") else getattr(target, method, None)
        if not callable(handler):
            return fail("Unknown method: " + method)
        result = handler(**args)
    except Exception as exc:
        traceback.print_exc(file=sys.stderr)
        return fail(str(exc) or type(exc).__name__)
    print(json.dumps(result, ensure_ascii=False, default=str))
    return 0


sys.exit(main())
"#;

/// Interpreter arguments that run the driver against `module.class`.
/// The input file path is appended after these by the worker.
pub fn driver_args(module: &str, class: &str) -> Vec<OsString> {
    vec![
        OsString::from("-c"),
        OsString::from(DRIVER_SOURCE),
        OsString::from(module),
        OsString::from(class),
    ]
}
