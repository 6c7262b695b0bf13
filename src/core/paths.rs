use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Base dropship config directory (~/.config/dropship/ on all platforms).
///
/// `DROPSHIP_CONFIG_DIR` overrides the location.
pub fn dropship() -> Result<PathBuf> {
    if let Ok(dir) = env::var("DROPSHIP_CONFIG_DIR") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(&dir).to_string()));
        }
    }

    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("dropship"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("dropship"))
    }
}

/// Global dropship.json config file path
pub fn dropship_json() -> Result<PathBuf> {
    Ok(dropship()?.join("dropship.json"))
}

/// Connection profiles directory
pub fn profiles() -> Result<PathBuf> {
    Ok(dropship()?.join("profiles"))
}

/// Connection profile file path
pub fn profile(name: &str) -> Result<PathBuf> {
    Ok(profiles()?.join(format!("{}.json", name)))
}
