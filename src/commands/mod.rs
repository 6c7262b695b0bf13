use dropship::defaults::{self, Defaults};
use dropship::profile::Profile;
use dropship::ssh::Session;

pub type CmdResult<T> = dropship::Result<(T, i32)>;

pub(crate) struct GlobalArgs {
    pub profile: String,
}

/// Everything a remote command needs: the profile, effective defaults, and
/// an open session.
pub(crate) struct Remote {
    pub profile: Profile,
    pub defaults: Defaults,
    pub session: Session,
}

pub(crate) fn connect(global: &GlobalArgs) -> dropship::Result<Remote> {
    let profile = dropship::profile::load(&global.profile)?;
    let defaults = defaults::load_defaults();
    let options = profile.to_connect_options(&defaults)?;

    tracing::debug!(profile = %profile.name, endpoint = %options.endpoint(), "connecting");
    let session = Session::connect(&options)?;

    Ok(Remote {
        profile,
        defaults,
        session,
    })
}

/// Progress lines for orchestrations, printed as each state is entered.
pub(crate) fn print_progress(event: dropship::progress::ProgressEvent) {
    match &event.message {
        Some(message) => crate::tty::status(&format!("[{}] {}: {}", event.operation, event.state, message)),
        None => crate::tty::status(&format!("[{}] {}", event.operation, event.state)),
    }
}

pub mod backup;
pub mod backups;
pub mod deploy;
pub mod ls;
pub mod profile;
pub mod projects;
pub mod rollback;

macro_rules! dispatch {
    ($args:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args))
    };
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (dropship::Result<serde_json::Value>, i32) {
    crate::tty::status("dropship is working...");

    match command {
        // Local-only commands
        crate::Commands::Profile(args) => dispatch!(args, profile),

        // Commands that open a session
        crate::Commands::Projects(args) => dispatch!(args, global, projects),
        crate::Commands::Backups(args) => dispatch!(args, global, backups),
        crate::Commands::Backup(args) => dispatch!(args, global, backup),
        crate::Commands::Deploy(args) => dispatch!(args, global, deploy),
        crate::Commands::Rollback(args) => dispatch!(args, global, rollback),
        crate::Commands::Ls(args) => dispatch!(args, global, ls),
    }
}
