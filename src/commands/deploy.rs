use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use dropship::deploy::{self, DeployReport, DeployRequest};
use dropship::package;
use dropship::progress::ProgressEvent;
use dropship::Error;

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct DeployArgs {
    /// Project name (directory under the profile's projects root)
    pub project: String,

    /// Local directory or .zip package
    pub local_path: PathBuf,

    /// Sub-directory of the package to deploy ("." for the package root)
    #[arg(long)]
    pub subdir: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOutput {
    command: &'static str,
    package: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    subdir: Option<String>,
    #[serde(flatten)]
    report: DeployReport,
}

pub fn run(args: DeployArgs, global: &GlobalArgs) -> CmdResult<DeployOutput> {
    let remote = super::connect(global)?;

    let subdir = args
        .subdir
        .clone()
        .unwrap_or_else(|| remote.profile.default_subdir.clone());
    let source = package::prepare(&args.local_path, Some(&subdir))?;

    let profile = remote.profile;
    let settings = remote.defaults.deploy;
    let shared = remote.session.into_shared();

    // The orchestration runs on a worker holding the session lock; this
    // thread only renders progress.
    let (tx, rx) = mpsc::channel::<ProgressEvent>();
    let worker = {
        let shared = shared.clone();
        let project = args.project.clone();
        let source_path = source.path().to_path_buf();
        thread::spawn(move || {
            shared.with(|session| {
                let request = DeployRequest {
                    project: &project,
                    source: &source_path,
                    projects_root: &profile.projects_root,
                    backup_root: &profile.backup_root,
                };
                deploy::deploy(session, &request, &settings, &tx)
            })
        })
    };

    for event in rx {
        super::print_progress(event);
    }

    let report = worker
        .join()
        .map_err(|_| Error::internal_unexpected("deploy worker panicked"))?
        .and_then(|result| result)?;

    Ok((
        DeployOutput {
            command: "deploy.run",
            package: source.package().display().to_string(),
            subdir: source.subdir().map(str::to_string),
            report,
        },
        0,
    ))
}
