//! POSIX path helpers for repository-relative paths
//!
//! These work on `/`-separated strings rather than `std::path`, since the
//! paths end up in generated bash on the CI runner, not on the local host.
//! A `/` inside a `${{ }}` span is part of the expression, not a separator.

use crate::expression::{CLOSE, OPEN};

/// Byte offsets of the `/` separators outside `${{ }}` spans
fn separators(path: &str) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut i = 0;
    while i < path.len() {
        if path.as_bytes()[i..].starts_with(OPEN.as_bytes()) {
            match path[i + OPEN.len()..].find(CLOSE) {
                Some(end) => {
                    i += OPEN.len() + end + CLOSE.len();
                    continue;
                }
                None => break,
            }
        }
        if path.as_bytes()[i] == b'/' {
            offsets.push(i);
        }
        i += 1;
    }
    offsets
}

fn segments(path: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for offset in separators(path) {
        parts.push(&path[start..offset]);
        start = offset + 1;
    }
    parts.push(&path[start..]);
    parts
}

/// Normalize a path lexically: collapse `//`, drop `.`, resolve `..`.
///
/// `""` becomes `"."`; a leading `..` is kept for relative paths and
/// dropped at the root.
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in segments(path) {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Everything before the last `/`, without trailing slashes (`""` when none)
pub fn dirname(path: &str) -> &str {
    match separators(path).last().copied() {
        Some(idx) => {
            let head = &path[..=idx];
            let trimmed = head.trim_end_matches('/');
            if trimmed.is_empty() {
                head
            } else {
                trimmed
            }
        }
        None => "",
    }
}
