//! Resource path canonicalization.
//!
//! Permission rules address resources by directory-style paths. Every path is
//! normalized to an absolute form with a trailing slash before any prefix
//! comparison, so `/objects`, `objects/` and `/x/../objects` all match the
//! same rules.

/// Resolve `path` against the root `/`, collapsing `.` and `..` segments,
/// and append a trailing slash.
///
/// Relative and malformed inputs resolve from the root, so `""` and `"."`
/// both become `"/"`. `..` never escapes the root.
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", segments.join("/"))
    }
}

/// Express `path` relative to a mount point.
///
/// `prefix` is normalized first; if `path` starts with it, the prefix is
/// stripped (plus one leading slash left behind by the cut). One trailing
/// slash is stripped from the result. A `path` that does not start with the
/// prefix comes back unchanged apart from the trailing slash, so callers
/// must not assume the result got shorter.
pub fn relativize(path: &str, prefix: &str) -> String {
    let prefix = normalize(prefix);

    let mut start = 0;
    if path.starts_with(&prefix) {
        start = prefix.len();
        if path[start..].starts_with('/') {
            start += 1;
        }
    }

    let mut end = path.len();
    if path.ends_with('/') && end > start {
        end -= 1;
    }

    path[start..end].to_string()
}
