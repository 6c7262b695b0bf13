use dropship::profile::{self, ProfileChanges};
use dropship::ErrorCode;

// One test per binary: the config directory is process-wide state.
#[test]
fn profile_lifecycle_in_isolated_config_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var("DROPSHIP_CONFIG_DIR", dir.path());

    let err = profile::upsert(
        "prod",
        ProfileChanges {
            host: Some("example.com".to_string()),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationMissingArgument);

    let created = profile::upsert(
        "prod",
        ProfileChanges {
            host: Some("example.com".to_string()),
            user: Some("deploy".to_string()),
            projects_root: Some("/srv/apps".to_string()),
            backup_root: Some("/srv/backups".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(created.created);
    assert_eq!(created.profile.port, 22);
    assert_eq!(created.profile.default_subdir, "dist");

    let updated = profile::upsert(
        "prod",
        ProfileChanges {
            port: Some(2222),
            default_subdir: Some("html".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(!updated.created);
    assert_eq!(updated.updated_fields, vec!["defaultSubdir", "port"]);

    let loaded = profile::load("prod").unwrap();
    assert_eq!(loaded.port, 2222);
    assert_eq!(loaded.host, "example.com");

    let raw = std::fs::read_to_string(dir.path().join("profiles").join("prod.json")).unwrap();
    assert!(!raw.contains("password"));

    assert_eq!(profile::list().unwrap().len(), 1);

    profile::delete("prod").unwrap();
    assert_eq!(profile::load("prod").unwrap_err().code, ErrorCode::ProfileNotFound);
}
