//! Shell escaping and quoting utilities.

/// Escape a value for use inside single quotes.
/// Replaces `'` with `'\''` (end quote, escaped quote, start quote).
pub fn escape_single_quote_content(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// Quote a path for shell execution (always quotes).
pub fn quote_path(path: &str) -> String {
    format!("'{}'", escape_single_quote_content(path))
}

/// Quote a directory and append an unquoted glob suffix, e.g. `'/srv/app'/*`.
///
/// The suffix is left outside the quotes so the remote shell expands it.
pub fn quote_path_glob(dir: &str, glob_suffix: &str) -> String {
    format!("{}/{}", quote_path(dir), glob_suffix)
}
