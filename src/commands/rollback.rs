use clap::Args;
use serde::Serialize;

use dropship::rollback::{self, RollbackReport, RollbackRequest};

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct RollbackArgs {
    /// Project name
    pub project: String,

    /// Backup archive name, as printed by `dropship backups`
    pub backup_name: String,
}

#[derive(Serialize)]
pub struct RollbackOutput {
    command: &'static str,
    #[serde(flatten)]
    report: RollbackReport,
}

pub fn run(args: RollbackArgs, global: &GlobalArgs) -> CmdResult<RollbackOutput> {
    let remote = super::connect(global)?;
    let request = RollbackRequest {
        project: &args.project,
        backup_name: &args.backup_name,
        projects_root: &remote.profile.projects_root,
        backup_root: &remote.profile.backup_root,
    };

    let report = rollback::rollback(
        &remote.session,
        &request,
        remote.defaults.deploy.min_target_path_len,
        &super::print_progress,
    )?;

    Ok((
        RollbackOutput {
            command: "rollback.run",
            report,
        },
        0,
    ))
}
