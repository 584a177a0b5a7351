//! Cross-process bridge to the backend interpreter.
//!
//! Arguments travel to the interpreter as a JSON temp file whose path is
//! the only command-line argument; the result comes back as the last
//! non-empty line of the interpreter's stdout.

/// Temp-file argument encoding and stdout result decoding.
pub mod codec;

/// Fixed Python entry point for class-based backends.
pub mod driver;

/// Subprocess spawning with timeout, output capping, and group kill.
pub mod runner;

/// The `ExternalWorker` capability and its subprocess adapter.
pub mod worker;

pub use runner::{ProcessOutput, ProcessSpec};
pub use worker::{ExternalWorker, SubprocessWorker};

/// Maximum characters of interpreter stderr carried in an error message.
pub const STDERR_EXCERPT_CHARS: usize = 2_000;

/// Maximum characters of undecodable stdout carried in an error message.
pub const DECODE_EXCERPT_CHARS: usize = 200;

/// Keeps the first `max` bytes of `s` (backing off to a char boundary).
pub fn head_excerpt(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    format!("{}[... truncated, {} bytes total]", &s[..end], s.len())
}

/// Keeps the last `max` bytes of `s`. Interpreter tracebacks end with the
/// actual error, so stderr is cut from the front.
pub fn tail_excerpt(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) && start < s.len() {
        start += 1;
    }
    format!("[... {} bytes omitted]{}", start, &s[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_excerpts_untouched() {
        assert_eq!(head_excerpt("hello", 10), "hello");
        assert_eq!(tail_excerpt("hello", 10), "hello");
    }

    #[test]
    fn test_head_excerpt_respects_char_boundaries() {
        let s = "招标文件".repeat(100);
        let cut = head_excerpt(&s, 10);
        assert!(cut.starts_with("招标文"));
        assert!(cut.contains("truncated"));
    }

    #[test]
    fn test_tail_excerpt_keeps_final_line() {
        let mut s = "Traceback line\n".repeat(500);
        s.push_str("FileNotFoundError: File not found: /nonexistent.pdf");
        let cut = tail_excerpt(&s, 100);
        assert!(cut.ends_with("File not found: /nonexistent.pdf"));
        assert!(cut.starts_with("[..."));
        assert!(cut.len() < 200);
    }
}
