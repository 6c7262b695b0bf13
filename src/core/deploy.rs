//! Deployment orchestration.
//!
//! `Preparing -> BackingUp -> Uploading -> PreservingConfig -> Swapping ->
//! CleaningUp -> Succeeded`, any state may end in `Failed`. A deploy never
//! touches the live target before a fresh backup has been verified.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::archive::{self, BackupRecord};
use crate::defaults::DeployDefaults;
use crate::error::{Error, Result};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::remote_fs::{self, PathKind};
use crate::ssh::{Outcome, Session};
use crate::utils::{remote_path, validation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeployState {
    Idle,
    Preparing,
    BackingUp,
    Uploading,
    PreservingConfig,
    Swapping,
    CleaningUp,
    Succeeded,
    Failed,
}

impl DeployState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployState::Idle => "Idle",
            DeployState::Preparing => "Preparing",
            DeployState::BackingUp => "BackingUp",
            DeployState::Uploading => "Uploading",
            DeployState::PreservingConfig => "PreservingConfig",
            DeployState::Swapping => "Swapping",
            DeployState::CleaningUp => "CleaningUp",
            DeployState::Succeeded => "Succeeded",
            DeployState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for DeployState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to deploy and where.
#[derive(Debug, Clone)]
pub struct DeployRequest<'a> {
    pub project: &'a str,
    /// Already-resolved local directory; archive expansion happens before this.
    pub source: &'a Path,
    pub projects_root: &'a str,
    pub backup_root: &'a str,
}

/// One deploy attempt. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentPlan {
    pub project: String,
    pub source: PathBuf,
    pub target: String,
    pub staging: String,
}

impl DeploymentPlan {
    /// Validate the request and derive target and staging paths.
    ///
    /// Runs before any remote command is issued.
    pub fn prepare(
        request: &DeployRequest<'_>,
        settings: &DeployDefaults,
        epoch_seconds: i64,
    ) -> Result<Self> {
        validation::require_project_name(request.project)?;

        if !request.source.is_dir() {
            return Err(Error::validation_invalid_argument(
                "source",
                format!("Local source is not a directory: {}", request.source.display()),
                None,
                None,
            ));
        }

        let projects_root = remote_path::trim_trailing_slash(request.projects_root);
        let target = remote_path::join(projects_root, request.project);
        validation::require_safe_target(&target, settings.min_target_path_len)?;
        validation::require_within_root(&target, projects_root)?;

        Ok(Self {
            project: request.project.to_string(),
            source: request.source.to_path_buf(),
            target,
            staging: staging_path(&settings.staging_root, request.project, epoch_seconds),
        })
    }
}

/// `{staging_root}/{project}_new_{epoch}`
pub fn staging_path(staging_root: &str, project: &str, epoch_seconds: i64) -> String {
    remote_path::join(staging_root, &format!("{}_new_{}", project, epoch_seconds))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployReport {
    pub state: DeployState,
    pub message: String,
    pub plan: DeploymentPlan,
    pub backup: BackupRecord,
    pub uploaded_files: usize,
    pub preserved_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_warning: Option<String>,
}

/// Deploy using the local clock for the staging name and backup timestamp.
pub fn deploy(
    session: &Session,
    request: &DeployRequest<'_>,
    settings: &DeployDefaults,
    progress: &dyn ProgressSink,
) -> Result<DeployReport> {
    deploy_at(session, request, settings, progress, Local::now())
}

pub fn deploy_at(
    session: &Session,
    request: &DeployRequest<'_>,
    settings: &DeployDefaults,
    progress: &dyn ProgressSink,
    started_at: DateTime<Local>,
) -> Result<DeployReport> {
    let run = Run { progress };

    run.enter(DeployState::Preparing, None);
    let plan = DeploymentPlan::prepare(request, settings, started_at.timestamp())
        .map_err(|e| run.fail(DeployState::Preparing, e))?;

    run.enter(DeployState::BackingUp, None);
    let backup = archive::create_backup_at(
        session,
        request.projects_root,
        &plan.project,
        request.backup_root,
        started_at.naive_local(),
    )
    .map_err(|e| run.fail(DeployState::BackingUp, e))?;

    run.enter(
        DeployState::Uploading,
        Some(format!("{} -> {}", plan.source.display(), plan.staging)),
    );
    let uploaded_files = match remote_fs::upload_directory_recursive(session, &plan.source, &plan.staging) {
        Ok(count) => count,
        Err(err) => {
            discard_staging(session, &plan.staging);
            return Err(run.fail(DeployState::Uploading, err.with_detail("backup", backup.name.clone())));
        }
    };

    run.enter(DeployState::PreservingConfig, None);
    let preserved_files = match preserve_files(session, &plan, &settings.preserve_files) {
        Ok(preserved) => preserved,
        Err(err) => {
            discard_staging(session, &plan.staging);
            return Err(run.fail(DeployState::PreservingConfig, err.with_detail("backup", backup.name.clone())));
        }
    };

    run.enter(DeployState::Swapping, Some(format!("{} -> {}", plan.staging, plan.target)));
    swap(session, &plan).map_err(|e| {
        let err = e
            .with_detail("backup", backup.name.clone())
            .with_detail("staging", plan.staging.clone())
            .with_hint(format!(
                "The live target may be empty or partial. Restore it with: dropship rollback {} {}",
                plan.project, backup.name
            ));
        run.fail(DeployState::Swapping, err)
    })?;

    run.enter(DeployState::CleaningUp, None);
    let cleanup_warning = match remote_fs::remove_tree(session, &plan.staging).outcome {
        Outcome::Failed(stderr) => {
            tracing::warn!(staging = %plan.staging, stderr = %stderr, "staging cleanup failed");
            Some(format!("Could not remove staging directory {}: {}", plan.staging, stderr))
        }
        _ => None,
    };

    let message = format!(
        "Deployed {} to {} (backup {})",
        plan.project, plan.target, backup.name
    );
    run.enter(DeployState::Succeeded, Some(message.clone()));
    tracing::info!(project = %plan.project, target = %plan.target, backup = %backup.name, "deploy succeeded");

    Ok(DeployReport {
        state: DeployState::Succeeded,
        message,
        plan,
        backup,
        uploaded_files,
        preserved_files,
        cleanup_warning,
    })
}

struct Run<'a> {
    progress: &'a dyn ProgressSink,
}

impl Run<'_> {
    fn enter(&self, state: DeployState, message: Option<String>) {
        tracing::debug!(state = state.as_str(), "deploy state");
        self.progress.emit(ProgressEvent::new("deploy", state.as_str(), message));
    }

    fn fail(&self, state: DeployState, err: Error) -> Error {
        let err = err.at_step(state.as_str());
        tracing::error!(step = state.as_str(), code = err.code.as_str(), "deploy failed: {}", err);
        self.progress.emit(ProgressEvent::new(
            "deploy",
            DeployState::Failed.as_str(),
            Some(format!("{}: {}", state, err.message)),
        ));
        err
    }
}

fn preserve_files(session: &Session, plan: &DeploymentPlan, files: &[String]) -> Result<Vec<String>> {
    let mut preserved = Vec::new();

    for file in files {
        let live = remote_path::join(&plan.target, file);
        if !remote_fs::path_exists(session, &live, PathKind::File) {
            tracing::warn!(file = %live, "no existing file to preserve, deploying without it");
            continue;
        }

        let staged = remote_path::join(&plan.staging, file);
        if let Some(parent) = remote_path::parent(&staged) {
            remote_fs::ensure_directory(session, parent)?;
        }

        let copy = remote_fs::copy_file(session, &live, &staged);
        if !copy.outcome.is_confirmed() {
            return Err(copy.into_error(format!("Failed to preserve {}", live)));
        }
        preserved.push(file.clone());
    }

    Ok(preserved)
}

/// Clear the live target and repopulate it from staging.
///
/// Not atomic: between the clear and the copy the target is empty.
fn swap(session: &Session, plan: &DeploymentPlan) -> Result<()> {
    remote_fs::ensure_directory(session, &plan.target)?;

    let clear = remote_fs::clear_directory(session, &plan.target);
    if clear.outcome.is_failed() {
        return Err(clear.into_error(format!("Failed to clear {}", plan.target)));
    }

    let copy = remote_fs::copy_contents(session, &plan.staging, &plan.target);
    if !copy.outcome.is_confirmed() {
        return Err(copy.into_error(format!("Failed to copy {} into {}", plan.staging, plan.target)));
    }
    Ok(())
}

fn discard_staging(session: &Session, staging: &str) {
    if let Outcome::Failed(stderr) = remote_fs::remove_tree(session, staging).outcome {
        tracing::warn!(staging, stderr = %stderr, "could not discard staging directory");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::Defaults;
    use crate::error::ErrorCode;

    fn settings() -> DeployDefaults {
        Defaults::default().deploy
    }

    #[test]
    fn staging_path_embeds_epoch() {
        assert_eq!(staging_path("/tmp", "shop", 1704164645), "/tmp/shop_new_1704164645");
        assert_eq!(staging_path("/tmp/", "shop", 1), "/tmp/shop_new_1");
    }

    #[test]
    fn prepare_rejects_target_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let request = DeployRequest {
            project: "..",
            source: dir.path(),
            projects_root: "/srv/apps",
            backup_root: "/srv/backups",
        };
        let err = DeploymentPlan::prepare(&request, &settings(), 0).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationInvalidArgument);
    }

    #[test]
    fn prepare_rejects_short_target() {
        let dir = tempfile::tempdir().unwrap();
        let request = DeployRequest {
            project: "a",
            source: dir.path(),
            projects_root: "/",
            backup_root: "/srv/backups",
        };
        let err = DeploymentPlan::prepare(&request, &settings(), 0).unwrap_err();
        assert_eq!(err.code, ErrorCode::SafetyUnsafeTargetPath);
    }

    #[test]
    fn prepare_rejects_missing_source() {
        let request = DeployRequest {
            project: "shop",
            source: Path::new("/definitely/not/here"),
            projects_root: "/srv/apps",
            backup_root: "/srv/backups",
        };
        assert!(DeploymentPlan::prepare(&request, &settings(), 0).is_err());
    }

    #[test]
    fn prepare_builds_plan() {
        let dir = tempfile::tempdir().unwrap();
        let request = DeployRequest {
            project: "shop",
            source: dir.path(),
            projects_root: "/srv/apps/",
            backup_root: "/srv/backups",
        };
        let plan = DeploymentPlan::prepare(&request, &settings(), 42).unwrap();
        assert_eq!(plan.target, "/srv/apps/shop");
        assert_eq!(plan.staging, "/tmp/shop_new_42");
    }
}
