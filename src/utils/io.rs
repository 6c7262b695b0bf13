//! Local file I/O with consistent error handling.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

fn io_error(e: std::io::Error, operation: &str) -> Error {
    Error::internal_io(e.to_string(), Some(operation.to_string()))
}

pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| io_error(e, operation))
}

/// Parse a JSON file, reporting parse failures as `config.invalid_json`.
pub fn read_json<T: DeserializeOwned>(path: &Path, operation: &str) -> Result<T> {
    let content = read_file(path, operation)?;
    serde_json::from_str(&content).map_err(|e| Error::config_invalid_json(path.display().to_string(), e))
}

/// Write via a sibling `.tmp` file and rename, creating parent directories.
pub fn write_file_atomic(path: &Path, content: &str, operation: &str) -> Result<()> {
    let invalid = || {
        Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        )
    };
    let parent = path.parent().ok_or_else(invalid)?;
    let filename = path.file_name().ok_or_else(invalid)?;

    fs::create_dir_all(parent).map_err(|e| io_error(e, operation))?;

    let tmp_path = parent.join(format!("{}.tmp", filename.to_string_lossy()));
    fs::write(&tmp_path, content).map_err(|e| io_error(e, &format!("{} (write temp)", operation)))?;
    fs::rename(&tmp_path, path).map_err(|e| io_error(e, &format!("{} (rename)", operation)))?;

    Ok(())
}

/// Pretty-printed JSON, written atomically.
pub fn write_json<T: Serialize>(path: &Path, value: &T, operation: &str) -> Result<()> {
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| Error::internal_json(e.to_string(), Some(operation.to_string())))?;
    write_file_atomic(path, &content, operation)
}
