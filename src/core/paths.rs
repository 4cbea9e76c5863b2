//! Path utilities for user-supplied file locations.
//!
//! Upload input arrives two ways: a typed path, or a drag-and-drop onto the
//! terminal, which most emulators deliver as a paste of the path with shell
//! quoting (single quotes, backslash escapes) or as a `file://` URI. Both
//! forms are cleaned here before validation.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Resolve a path to an absolute, normalized path.
///
/// Uses `fs::canonicalize` when the path exists (resolving symlinks);
/// otherwise makes it absolute against the CWD and resolves `..`/`.`
/// components syntactically.
#[must_use]
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    if let Ok(canonical) = std::fs::canonicalize(&absolute) {
        return canonical;
    }

    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                parts.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = parts.last() {
                    parts.pop();
                }
            }
        }
    }
    parts.into_iter().collect()
}

/// Clean a pasted/dropped path string into a usable path.
///
/// Handles the forms terminal emulators produce on drag-and-drop:
/// surrounding single or double quotes, backslash-escaped characters, and
/// `file://` URIs with percent-encoded bytes. Plain typed paths pass
/// through with only surrounding whitespace trimmed.
#[must_use]
pub fn clean_dropped_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();

    if let Some(uri) = trimmed.strip_prefix("file://") {
        // Drop an optional host part ("file://localhost/...").
        let path_part = uri.find('/').map_or("", |idx| &uri[idx..]);
        return PathBuf::from(percent_decode(path_part));
    }

    let unquoted = trimmed
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .or_else(|| {
            trimmed
                .strip_prefix('"')
                .and_then(|rest| rest.strip_suffix('"'))
        });
    if let Some(inner) = unquoted {
        return PathBuf::from(inner);
    }

    if trimmed.contains('\\') {
        let mut out = String::with_capacity(trimmed.len());
        let mut chars = trimmed.chars();
        while let Some(ch) = chars.next() {
            if ch == '\\' {
                match chars.next() {
                    Some(escaped) => out.push(escaped),
                    None => out.push('\\'),
                }
            } else {
                out.push(ch);
            }
        }
        return PathBuf::from(out);
    }

    PathBuf::from(trimmed)
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = &input[i + 1..i + 3];
            if let Ok(value) = u8::from_str_radix(hex, 16) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
