//! Backup archives of project directories on the remote host.
//!
//! Archives are gzip-compressed tarballs whose single top-level entry is the
//! project directory, so extracting into the projects root recreates exactly
//! that directory.

use chrono::{Local, NaiveDateTime};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::remote_fs::{self, PathKind};
use crate::ssh::{Outcome, Session};
use crate::utils::{remote_path, shell, validation};

pub const ARCHIVE_SUFFIX: &str = ".tar.gz";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// A created backup archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    /// `<project>_<YYYYMMDD_HHMMSS>.tar.gz`
    pub name: String,
    pub path: String,
    pub project: String,
}

/// Archive file name for `project` taken at `at`.
pub fn backup_name(project: &str, at: NaiveDateTime) -> String {
    format!("{}_{}{}", project, at.format(TIMESTAMP_FORMAT), ARCHIVE_SUFFIX)
}

/// Back up `projects_root/project` into `backup_root` using the local clock.
pub fn create_backup(
    session: &Session,
    projects_root: &str,
    project: &str,
    backup_root: &str,
) -> Result<BackupRecord> {
    create_backup_at(session, projects_root, project, backup_root, Local::now().naive_local())
}

pub fn create_backup_at(
    session: &Session,
    projects_root: &str,
    project: &str,
    backup_root: &str,
    at: NaiveDateTime,
) -> Result<BackupRecord> {
    validation::require_project_name(project)?;

    let projects_root = remote_path::trim_trailing_slash(projects_root);
    let backup_root = remote_path::trim_trailing_slash(backup_root);
    let source = remote_path::join(projects_root, project);

    if !remote_fs::path_exists(session, &source, PathKind::Directory) {
        return Err(Error::backup_source_not_found(source));
    }

    remote_fs::ensure_directory(session, backup_root)?;

    let name = backup_name(project, at);
    let archive_path = remote_path::join(backup_root, &name);

    if remote_fs::path_exists(session, &archive_path, PathKind::File) {
        return Err(Error::backup_name_collision(archive_path));
    }

    log_status!("backup", "Archiving {} -> {}", source, archive_path);
    let command = format!(
        "tar -czf {} -C {} {}",
        shell::quote_path(&archive_path),
        shell::quote_path(projects_root),
        shell::quote_path(project)
    );
    let result = session.execute(&command);

    // tar's own signal is not trusted; the file must now exist.
    if !remote_fs::path_exists(session, &archive_path, PathKind::File) {
        return Err(Error::backup_verification_failed(
            archive_path,
            result.stderr_trimmed(),
        ));
    }

    tracing::info!(project, archive = %archive_path, "backup created");

    Ok(BackupRecord {
        name,
        path: archive_path,
        project: project.to_string(),
    })
}

/// Replace `target` with the contents of `archive_path`.
///
/// The target directory is removed entirely first and must be gone before
/// the archive is extracted into the target's parent.
pub fn restore_backup(
    session: &Session,
    archive_path: &str,
    target: &str,
    min_target_len: usize,
) -> Result<()> {
    validation::require_safe_target(target, min_target_len)?;
    let parent = require_parent(target)?;

    // Extracting over a surviving target would merge stale files into it.
    let removal = remote_fs::remove_tree(session, target);
    if remote_fs::path_exists(session, target, PathKind::Directory) {
        return Err(removal.into_error(format!("Target still exists after removal: {}", target)));
    }

    let extract = extract_archive(session, archive_path, parent);

    if !remote_fs::path_exists(session, target, PathKind::Directory) {
        let stderr = match extract {
            Outcome::Failed(stderr) => stderr,
            _ => String::new(),
        };
        return Err(Error::backup_verification_failed(target, stderr));
    }

    Ok(())
}

/// `tar -xzf` into `dest_dir`.
pub fn extract_archive(session: &Session, archive_path: &str, dest_dir: &str) -> Outcome {
    let command = format!(
        "tar -xzf {} -C {}",
        shell::quote_path(archive_path),
        shell::quote_path(dest_dir)
    );
    session.execute(&command).outcome(None)
}

pub(crate) fn require_parent(target: &str) -> Result<&str> {
    remote_path::parent(target).ok_or_else(|| {
        Error::validation_invalid_argument(
            "target",
            format!("Cannot determine parent directory of '{}'", target),
            None,
            None,
        )
    })
}

/// Backups for `project`, newest first.
///
/// Any listing error yields an empty list, so "empty" may also mean
/// "could not list".
pub fn list_backups(session: &Session, backup_root: &str, project: &str) -> Vec<String> {
    let backup_root = remote_path::trim_trailing_slash(backup_root);
    let command = format!("ls -1 {}", shell::quote_path(backup_root));
    let result = session.execute(&command);

    if !result.stderr_trimmed().is_empty() {
        tracing::warn!(
            backup_root,
            stderr = result.stderr_trimmed(),
            "backup listing failed, reporting none"
        );
        return Vec::new();
    }

    select_backups(result.stdout.lines(), project)
}

/// Keep names prefixed `<project>_`, sorted newest first.
pub fn select_backups<'a>(names: impl IntoIterator<Item = &'a str>, project: &str) -> Vec<String> {
    let prefix = format!("{}_", project);
    let mut backups: Vec<String> = names
        .into_iter()
        .map(str::trim)
        .filter(|name| name.starts_with(&prefix))
        .map(str::to_string)
        .collect();
    backups.sort_by(|a, b| b.cmp(a));
    backups.dedup();
    backups
}
