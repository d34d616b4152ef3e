//! Ready-made content transforms for [`ContentMutator`](crate::ContentMutator)
//!
//! All of them are pure: anything time dependent has to be computed by the
//! caller before the mutation starts and captured by value.

use crate::model::RevisionMarker;

/// Append `line` on its own line
///
/// A newline separator is inserted when the existing content does not already
/// end with one, and the appended line is always newline terminated.
pub fn append_line(content: &[u8], line: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + line.len() + 2);
    out.extend_from_slice(content);
    if !out.is_empty() && !out.ends_with(b"\n") {
        out.push(b'\n');
    }
    out.extend_from_slice(line.as_bytes());
    out.push(b'\n');
    out
}

/// The line appended by `--stamp`
pub fn stamp_line(timestamp: &str) -> String {
    format!("- Updated from API at {}", timestamp)
}

/// Leave existing content alone; create an empty file when absent
pub fn ensure_exists(content: &[u8], _marker: Option<&RevisionMarker>) -> Vec<u8> {
    content.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_line_to_empty() {
        assert_eq!(append_line(b"", "hello"), b"hello\n");
    }

    #[test]
    fn test_append_line_adds_missing_separator() {
        assert_eq!(append_line(b"# Title", "hello"), b"# Title\nhello\n");
    }

    #[test]
    fn test_append_line_keeps_existing_separator() {
        assert_eq!(append_line(b"# Title\n", "hello"), b"# Title\nhello\n");
    }

    #[test]
    fn test_stamp_line() {
        assert_eq!(
            stamp_line("2026-10-16T10:00:00+00:00"),
            "- Updated from API at 2026-10-16T10:00:00+00:00"
        );
    }
}
