//! Rollback orchestration: `Validating -> Clearing -> Extracting -> Verifying`.
//!
//! Every check that can refuse the operation runs in `Validating`, before the
//! live target is touched. A failed verification is terminal; there is no
//! second attempt.

use serde::Serialize;

use crate::archive::{self, ARCHIVE_SUFFIX};
use crate::error::{Error, Result};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::remote_fs::{self, PathKind};
use crate::ssh::{Outcome, Session};
use crate::utils::{remote_path, validation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RollbackState {
    Idle,
    Validating,
    Clearing,
    Extracting,
    Verifying,
    Succeeded,
    Failed,
}

impl RollbackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RollbackState::Idle => "Idle",
            RollbackState::Validating => "Validating",
            RollbackState::Clearing => "Clearing",
            RollbackState::Extracting => "Extracting",
            RollbackState::Verifying => "Verifying",
            RollbackState::Succeeded => "Succeeded",
            RollbackState::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RollbackRequest<'a> {
    pub project: &'a str,
    /// File name inside `backup_root`, e.g. `shop_20240102_030405.tar.gz`.
    pub backup_name: &'a str,
    pub projects_root: &'a str,
    pub backup_root: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackReport {
    pub state: RollbackState,
    pub message: String,
    pub project: String,
    pub target: String,
    pub archive: String,
}

pub fn rollback(
    session: &Session,
    request: &RollbackRequest<'_>,
    min_target_len: usize,
    progress: &dyn ProgressSink,
) -> Result<RollbackReport> {
    let fail = |state: RollbackState, err: Error| {
        let err = err.at_step(state.as_str());
        tracing::error!(step = state.as_str(), code = err.code.as_str(), "rollback failed: {}", err);
        progress.emit(ProgressEvent::new(
            "rollback",
            RollbackState::Failed.as_str(),
            Some(format!("{}: {}", state.as_str(), err.message)),
        ));
        err
    };
    let enter = |state: RollbackState, message: Option<String>| {
        progress.emit(ProgressEvent::new("rollback", state.as_str(), message));
    };

    enter(RollbackState::Validating, None);
    let (target, archive_path) =
        validate(session, request, min_target_len).map_err(|e| fail(RollbackState::Validating, e))?;
    let parent = archive::require_parent(&target).map_err(|e| fail(RollbackState::Validating, e))?;

    enter(RollbackState::Clearing, Some(target.clone()));
    let removal = remote_fs::remove_tree(session, &target);
    if remote_fs::path_exists(session, &target, PathKind::Directory) {
        return Err(fail(
            RollbackState::Clearing,
            removal.into_error(format!("Target still exists after removal: {}", target)),
        ));
    }

    enter(RollbackState::Extracting, Some(archive_path.clone()));
    let extraction = archive::extract_archive(session, &archive_path, parent);

    enter(RollbackState::Verifying, None);
    if !remote_fs::path_exists(session, &target, PathKind::Directory) {
        let stderr = match extraction {
            Outcome::Failed(stderr) => stderr,
            _ => String::new(),
        };
        return Err(fail(
            RollbackState::Verifying,
            Error::rollback_verification_failed(&target, stderr),
        ));
    }

    let message = format!("Restored {} from {}", target, request.backup_name);
    enter(RollbackState::Succeeded, Some(message.clone()));
    tracing::info!(target = %target, archive = %archive_path, "rollback succeeded");

    Ok(RollbackReport {
        state: RollbackState::Succeeded,
        message,
        project: request.project.to_string(),
        target,
        archive: archive_path,
    })
}

/// Returns `(target, archive_path)`. Issues only read-only probes.
fn validate(
    session: &Session,
    request: &RollbackRequest<'_>,
    min_target_len: usize,
) -> Result<(String, String)> {
    validation::require_project_name(request.project)?;
    require_backup_name(request.project, request.backup_name)?;

    let projects_root = remote_path::trim_trailing_slash(request.projects_root);
    let target = remote_path::join(projects_root, request.project);
    validation::require_safe_target(&target, min_target_len)?;
    validation::require_within_root(&target, projects_root)?;

    let archive_path = remote_path::join(request.backup_root, request.backup_name);
    if !remote_fs::path_exists(session, &archive_path, PathKind::File) {
        return Err(Error::remote_path_not_found(&archive_path, None)
            .with_hint(format!("List available backups with: dropship backups {}", request.project)));
    }

    Ok((target, archive_path))
}

/// A backup name must belong to `project` and be a bare archive file name.
pub fn require_backup_name(project: &str, backup_name: &str) -> Result<()> {
    let belongs = backup_name.starts_with(&format!("{}_", project));
    let bare = !backup_name.contains('/') && backup_name.ends_with(ARCHIVE_SUFFIX);

    if !belongs || !bare {
        return Err(Error::validation_invalid_argument(
            "backup",
            format!(
                "'{}' is not a backup of '{}' (expected {}_<YYYYMMDD_HHMMSS>{})",
                backup_name, project, project, ARCHIVE_SUFFIX
            ),
            Some(backup_name.to_string()),
            None,
        ));
    }
    Ok(())
}
