use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;
mod tty;

use commands::{backup, backups, deploy, ls, profile, projects, rollback};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "dropship")]
#[command(version = VERSION)]
#[command(about = "Deploy, back up and roll back static bundles on a remote host over SSH")]
struct Cli {
    /// Connection profile to use
    #[arg(long, global = true, default_value = "default")]
    profile: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage connection profiles
    Profile(profile::ProfileArgs),
    /// List project directories under the projects root
    Projects(projects::ProjectsArgs),
    /// List backups of a project, newest first
    Backups(backups::BackupsArgs),
    /// Create a backup archive of a project
    Backup(backup::BackupArgs),
    /// Back up, upload and swap in a new version of a project
    Deploy(deploy::DeployArgs),
    /// Restore a project from a backup archive
    Rollback(rollback::RollbackArgs),
    /// Show a remote directory with sizes and modification times
    Ls(ls::LsArgs),
}

fn main() -> std::process::ExitCode {
    dropship::telemetry::init_logging();

    let cli = Cli::parse();
    let global = GlobalArgs {
        profile: cli.profile,
    };

    let (json_result, exit_code) = commands::run_json(cli.command, &global);

    if let Err(err) = output::print_json_result(json_result) {
        eprintln!("{}", err);
        return std::process::ExitCode::from(1);
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
