//! Local deploy sources.
//!
//! A package is either a directory or a `.zip` file. Zips are expanded into
//! a temporary directory that lives as long as the [`PreparedSource`]. An
//! optional sub-directory (typically `dist`) then selects what gets deployed.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::error::{Error, Result};

/// A resolved local directory ready for upload.
#[derive(Debug)]
pub struct PreparedSource {
    root: PathBuf,
    package: PathBuf,
    subdir: Option<String>,
    // Dropped last; removes the extracted zip.
    _extracted: Option<TempDir>,
}

impl PreparedSource {
    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn package(&self) -> &Path {
        &self.package
    }

    pub fn subdir(&self) -> Option<&str> {
        self.subdir.as_deref()
    }

    pub fn was_extracted(&self) -> bool {
        self._extracted.is_some()
    }
}

/// `.`, `/` and empty all mean the package root.
pub fn normalize_subdir(subdir: Option<&str>) -> Option<String> {
    let subdir = subdir?.trim();
    let trimmed = subdir.trim_matches('/');
    if trimmed.is_empty() || trimmed == "." {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn is_zip(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

/// Resolve `package` (directory or zip) plus `subdir` to an uploadable directory.
pub fn prepare(package: &Path, subdir: Option<&str>) -> Result<PreparedSource> {
    if !package.exists() {
        return Err(Error::package_not_found(package.display().to_string()));
    }

    let (base, extracted) = if is_zip(package) {
        let temp = tempfile::Builder::new()
            .prefix("dropship-package-")
            .tempdir()
            .map_err(|e| Error::internal_io(e.to_string(), Some("create extraction directory".to_string())))?;
        let count = extract_zip(package, temp.path())?;
        log_status!("package", "Extracted {} entries from {}", count, package.display());
        (temp.path().to_path_buf(), Some(temp))
    } else if package.is_dir() {
        (package.to_path_buf(), None)
    } else {
        return Err(Error::validation_invalid_argument(
            "local_path",
            format!("Expected a directory or .zip file: {}", package.display()),
            Some(package.display().to_string()),
            None,
        ));
    };

    let subdir = normalize_subdir(subdir);
    let root = match &subdir {
        Some(sub) => {
            if sub.split('/').any(|segment| segment == "..") {
                return Err(Error::validation_invalid_argument(
                    "subdir",
                    "Sub-directory cannot contain '..'",
                    Some(sub.clone()),
                    None,
                ));
            }
            let candidate = base.join(sub);
            if !candidate.is_dir() {
                return Err(Error::package_subdir_not_found(sub.clone()));
            }
            log_status!("package", "Using sub-directory {}", sub);
            candidate
        }
        None => base,
    };

    Ok(PreparedSource {
        root,
        package: package.to_path_buf(),
        subdir,
        _extracted: extracted,
    })
}

/// Expand `zip_path` into `dest`. Entries that would land outside `dest`
/// are rejected. Returns the number of entries written.
pub fn extract_zip(zip_path: &Path, dest: &Path) -> Result<usize> {
    let invalid = |e: &dyn std::fmt::Display| {
        Error::package_invalid_archive(zip_path.display().to_string(), e.to_string())
    };

    let file = File::open(zip_path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("open {}", zip_path.display()))))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| invalid(&e))?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| invalid(&e))?;

        let relative = match entry.enclosed_name() {
            Some(path) => path.to_path_buf(),
            None => {
                return Err(invalid(&format!("entry escapes the archive root: {}", entry.name())));
            }
        };
        let out_path = dest.join(&relative);
        let io_err = |e: io::Error| Error::internal_io(e.to_string(), Some(format!("extract {}", relative.display())));

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(io_err)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut out = File::create(&out_path).map_err(io_err)?;
        io::copy(&mut entry, &mut out).map_err(io_err)?;

        if let Some(mode) = entry.unix_mode() {
            apply_mode(&out_path, mode).map_err(io_err)?;
        }
    }

    Ok(archive.len())
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777))
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
