mod common;

use chrono::NaiveDate;
use std::fs;

use common::{local_session, progress_recorder, snapshot, write_tree, Remote};
use dropship::archive;
use dropship::progress::NoProgress;
use dropship::rollback::{self, RollbackRequest, RollbackState};
use dropship::ErrorCode;

fn backed_up_shop(remote: &Remote) -> String {
    write_tree(
        &remote.project_dir("shop"),
        &[("index.html", "v1"), ("assets/app.js", "v1"), ("config.json", "{}")],
    );
    let (session, _) = local_session();
    let at = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    archive::create_backup_at(&session, &remote.projects_root, "shop", &remote.backup_root, at)
        .unwrap()
        .name
}

#[test]
fn rollback_replaces_target_with_archive_contents() {
    let remote = Remote::new();
    let backup = backed_up_shop(&remote);
    let v1 = snapshot(&remote.project_dir("shop"));

    // A later deploy changed things, including a file the backup never had.
    write_tree(&remote.project_dir("shop"), &[("index.html", "v2"), ("new.js", "v2")]);

    let (session, _) = local_session();
    let (states, sink) = progress_recorder();
    let request = RollbackRequest {
        project: "shop",
        backup_name: &backup,
        projects_root: &remote.projects_root,
        backup_root: &remote.backup_root,
    };
    let report = rollback::rollback(&session, &request, 5, &sink).unwrap();

    assert_eq!(report.state, RollbackState::Succeeded);
    assert_eq!(snapshot(&remote.project_dir("shop")), v1);
    assert_eq!(
        *states.lock().unwrap(),
        vec!["Validating", "Clearing", "Extracting", "Verifying", "Succeeded"]
    );
}

#[test]
fn missing_archive_is_refused_before_clearing() {
    let remote = Remote::new();
    backed_up_shop(&remote);
    let before = snapshot(&remote.project_dir("shop"));

    let (session, audit) = local_session();
    let request = RollbackRequest {
        project: "shop",
        backup_name: "shop_19990101_000000.tar.gz",
        projects_root: &remote.projects_root,
        backup_root: &remote.backup_root,
    };
    let err = rollback::rollback(&session, &request, 5, &NoProgress).unwrap_err();

    assert_eq!(err.code, ErrorCode::RemotePathNotFound);
    assert_eq!(err.step(), Some("Validating"));
    assert_eq!(snapshot(&remote.project_dir("shop")), before);
    assert!(!audit.commands().iter().any(|c| c.starts_with("rm ")));
}

#[test]
fn corrupt_archive_fails_verification() {
    let remote = Remote::new();
    write_tree(&remote.project_dir("shop"), &[("index.html", "v1")]);
    fs::create_dir_all(&remote.backup_root).unwrap();
    fs::write(
        format!("{}/shop_20240101_000000.tar.gz", remote.backup_root),
        "not a tarball",
    )
    .unwrap();

    let (session, _) = local_session();
    let request = RollbackRequest {
        project: "shop",
        backup_name: "shop_20240101_000000.tar.gz",
        projects_root: &remote.projects_root,
        backup_root: &remote.backup_root,
    };
    let err = rollback::rollback(&session, &request, 5, &NoProgress).unwrap_err();

    assert_eq!(err.code, ErrorCode::RollbackVerificationFailed);
    assert_eq!(err.step(), Some("Verifying"));
}

#[test]
fn short_targets_are_refused_without_commands() {
    let (session, audit) = local_session();

    for (project, root) in [("a", "/"), ("ab", ""), ("x", "/s")] {
        let backup_name = format!("{}_20240101_000000.tar.gz", project);
        let request = RollbackRequest {
            project,
            backup_name: &backup_name,
            projects_root: root,
            backup_root: "/srv/backups",
        };
        let err = rollback::rollback(&session, &request, 5, &NoProgress).unwrap_err();
        assert_eq!(err.code, ErrorCode::SafetyUnsafeTargetPath, "{} under {:?}", project, root);
    }
    assert!(audit.commands().is_empty());
}

#[test]
fn backups_of_other_projects_are_refused() {
    let (session, audit) = local_session();
    let request = RollbackRequest {
        project: "shop",
        backup_name: "admin_20240101_000000.tar.gz",
        projects_root: "/srv/apps",
        backup_root: "/srv/backups",
    };
    let err = rollback::rollback(&session, &request, 5, &NoProgress).unwrap_err();

    assert_eq!(err.code, ErrorCode::ValidationInvalidArgument);
    assert!(audit.commands().is_empty());
}
