use clap::Args;
use serde::Serialize;

use dropship::listing;

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct ProjectsArgs {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectsOutput {
    command: &'static str,
    projects_root: String,
    projects: Vec<String>,
}

pub fn run(_args: ProjectsArgs, global: &GlobalArgs) -> CmdResult<ProjectsOutput> {
    let remote = super::connect(global)?;
    let projects = listing::projects(&remote.session, &remote.profile.projects_root)?;

    Ok((
        ProjectsOutput {
            command: "projects.list",
            projects_root: remote.profile.projects_root.clone(),
            projects,
        },
        0,
    ))
}
