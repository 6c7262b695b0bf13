use clap::Args;
use serde::Serialize;

use dropship::listing;

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct BackupsArgs {
    /// Project name
    pub project: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupsOutput {
    command: &'static str,
    project: String,
    backup_root: String,
    /// Newest first. Empty can also mean the backup root was unreadable.
    backups: Vec<String>,
}

pub fn run(args: BackupsArgs, global: &GlobalArgs) -> CmdResult<BackupsOutput> {
    let remote = super::connect(global)?;
    let backups = listing::backups(&remote.session, &remote.profile.backup_root, &args.project)?;

    Ok((
        BackupsOutput {
            command: "backups.list",
            project: args.project,
            backup_root: remote.profile.backup_root.clone(),
            backups,
        },
        0,
    ))
}
