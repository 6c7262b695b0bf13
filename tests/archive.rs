mod common;

use chrono::NaiveDate;
use std::fs;
use std::path::Path;

use common::{local_session, session_over, snapshot, write_tree, FaultyTransport, Remote};
use dropship::archive;
use dropship::ErrorCode;

fn jan_2() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(3, 4, 5)
        .unwrap()
}

#[test]
fn backup_then_restore_reproduces_the_tree() {
    let remote = Remote::new();
    let project = remote.project_dir("shop");
    write_tree(
        &project,
        &[
            ("index.html", "<h1>shop</h1>"),
            ("assets/app.js", "console.log(1)"),
            ("assets/img/logo.svg", "<svg/>"),
            (".htaccess", "Deny from all"),
            ("config.json", "{\"api\":\"prod\"}"),
        ],
    );
    fs::create_dir_all(project.join("empty")).unwrap();
    let before = snapshot(&project);

    let (session, _) = local_session();
    let record =
        archive::create_backup_at(&session, &remote.projects_root, "shop", &remote.backup_root, jan_2())
            .unwrap();

    fs::remove_dir_all(&project).unwrap();
    archive::restore_backup(&session, &record.path, &remote.project_path("shop"), 5).unwrap();

    assert_eq!(snapshot(&project), before);
}

#[test]
fn shop_backup_is_named_from_its_timestamp() {
    let remote = Remote::new();
    write_tree(&remote.project_dir("shop"), &[("index.html", "hi")]);

    let (session, _) = local_session();
    let record =
        archive::create_backup_at(&session, &remote.projects_root, "shop", &remote.backup_root, jan_2())
            .unwrap();

    assert_eq!(record.name, "shop_20240102_030405.tar.gz");
    assert!(Path::new(&remote.backup_root).join(&record.name).is_file());
}

#[test]
fn backup_of_missing_project_fails_without_creating_an_archive() {
    let remote = Remote::new();
    let (session, audit) = local_session();

    let err = archive::create_backup_at(&session, &remote.projects_root, "ghost", &remote.backup_root, jan_2())
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::BackupSourceNotFound);
    assert!(!audit.commands().iter().any(|c| c.starts_with("tar ")));
}

#[test]
fn same_second_backup_refuses_to_overwrite() {
    let remote = Remote::new();
    write_tree(&remote.project_dir("shop"), &[("index.html", "v1")]);
    let (session, _) = local_session();

    archive::create_backup_at(&session, &remote.projects_root, "shop", &remote.backup_root, jan_2()).unwrap();
    let err = archive::create_backup_at(&session, &remote.projects_root, "shop", &remote.backup_root, jan_2())
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::BackupNameCollision);
}

#[test]
fn invalid_project_names_are_rejected_before_any_command() {
    let remote = Remote::new();
    let (session, audit) = local_session();

    for name in ["", "..", "a/b"] {
        let err = archive::create_backup_at(&session, &remote.projects_root, name, &remote.backup_root, jan_2())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationInvalidArgument);
    }
    assert!(audit.commands().is_empty());
}

#[test]
fn restore_refuses_short_targets_without_issuing_commands() {
    let (session, audit) = local_session();

    for target in ["", "/", "/srv", "/a/b"] {
        let err = archive::restore_backup(&session, "/srv/backups/x_1.tar.gz", target, 5).unwrap_err();
        assert_eq!(err.code, ErrorCode::SafetyUnsafeTargetPath, "target {:?}", target);
    }
    assert!(audit.commands().is_empty());
}

#[test]
fn restore_refuses_to_extract_over_a_target_that_survived_removal() {
    let remote = Remote::new();
    let project = remote.project_dir("shop");
    write_tree(&project, &[("index.html", "v1")]);

    let (session, _) = local_session();
    let record =
        archive::create_backup_at(&session, &remote.projects_root, "shop", &remote.backup_root, jan_2())
            .unwrap();

    write_tree(&project, &[("index.html", "v2"), ("stale.js", "v2")]);
    let before = snapshot(&project);

    let (faulty, audit) = session_over(Box::new(FaultyTransport::failing_commands("rm -rf")));
    let err = archive::restore_backup(&faulty, &record.path, &remote.project_path("shop"), 5).unwrap_err();

    assert_eq!(err.code, ErrorCode::RemoteCommandFailed);
    assert!(err.details["command"].as_str().unwrap().starts_with("rm -rf "));
    assert!(!audit.commands().iter().any(|c| c.starts_with("tar ")));
    assert_eq!(snapshot(&project), before);
}

#[test]
fn restore_of_missing_archive_fails_verification() {
    let remote = Remote::new();
    let (session, _) = local_session();
    let missing = format!("{}/shop_20240101_000000.tar.gz", remote.backup_root);

    let err = archive::restore_backup(&session, &missing, &remote.project_path("shop"), 5).unwrap_err();
    assert_eq!(err.code, ErrorCode::BackupVerificationFailed);
}

#[test]
fn list_backups_filters_by_project_newest_first() {
    let remote = Remote::new();
    write_tree(
        Path::new(&remote.backup_root),
        &[
            ("shop_20240101_000000.tar.gz", ""),
            ("shop_20240102_030405.tar.gz", ""),
            ("other_20240103_000000.tar.gz", ""),
        ],
    );
    let (session, _) = local_session();

    assert_eq!(
        archive::list_backups(&session, &remote.backup_root, "shop"),
        vec!["shop_20240102_030405.tar.gz", "shop_20240101_000000.tar.gz"]
    );
}

#[test]
fn list_backups_of_unreadable_root_is_empty() {
    let remote = Remote::new();
    let (session, _) = local_session();

    let missing = format!("{}/nope", remote.backup_root);
    assert!(archive::list_backups(&session, &missing, "shop").is_empty());
}
