use clap::Args;
use serde::Serialize;

use dropship::archive::{self, BackupRecord};

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct BackupArgs {
    /// Project name
    pub project: String,
}

#[derive(Serialize)]
pub struct BackupOutput {
    command: &'static str,
    backup: BackupRecord,
}

pub fn run(args: BackupArgs, global: &GlobalArgs) -> CmdResult<BackupOutput> {
    let remote = super::connect(global)?;
    let backup = archive::create_backup(
        &remote.session,
        &remote.profile.projects_root,
        &args.project,
        &remote.profile.backup_root,
    )?;

    Ok((
        BackupOutput {
            command: "backup.create",
            backup,
        },
        0,
    ))
}
