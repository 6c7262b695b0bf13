//! Remote (POSIX) path helpers.
//!
//! Remote paths are plain strings. The only normalisation applied is
//! trimming trailing slashes; nothing is canonicalised.

/// Trim trailing slashes, keeping a lone `/` intact.
pub fn trim_trailing_slash(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// Join a directory and a child segment with exactly one `/`.
pub fn join(dir: &str, child: &str) -> String {
    let dir = trim_trailing_slash(dir);
    let child = child.trim_start_matches('/');
    if dir.is_empty() {
        return child.to_string();
    }
    if dir.ends_with('/') {
        format!("{}{}", dir, child)
    } else {
        format!("{}/{}", dir, child)
    }
}

/// Parent directory of a remote path, or `None` for `/` and bare names.
pub fn parent(path: &str) -> Option<&str> {
    let path = trim_trailing_slash(path);
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// True when `path` lies strictly below `root` (segment-wise, not prefix-wise).
pub fn is_strict_descendant(path: &str, root: &str) -> bool {
    let path_segments = segments(path);
    let root_segments = segments(root);

    if path_segments.iter().any(|s| *s == "..") {
        return false;
    }

    path_segments.len() > root_segments.len()
        && path_segments.iter().zip(root_segments.iter()).all(|(a, b)| a == b)
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}
