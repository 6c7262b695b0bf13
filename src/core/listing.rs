//! Read-side queries used to populate project and backup choices.

use crate::archive;
use crate::error::Result;
use crate::remote_fs::{self, DirectoryEntry};
use crate::ssh::Session;
use crate::utils::validation;

/// Project directories under `projects_root`, sorted by name.
pub fn projects(session: &Session, projects_root: &str) -> Result<Vec<String>> {
    remote_fs::list_project_directories(session, projects_root)
}

/// Backup names for `project`, newest first.
///
/// An empty list may also mean the backup root could not be listed.
pub fn backups(session: &Session, backup_root: &str, project: &str) -> Result<Vec<String>> {
    validation::require_project_name(project)?;
    Ok(archive::list_backups(session, backup_root, project))
}

/// Attributed entries of any remote directory, directories first.
pub fn entries(session: &Session, path: &str) -> Result<Vec<DirectoryEntry>> {
    remote_fs::list_directory_detailed(session, path)
}
