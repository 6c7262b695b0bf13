use clap::{Args, Subcommand};
use serde::Serialize;

use dropship::keychain;
use dropship::profile::{self, Profile, ProfileChanges};

use super::CmdResult;

#[derive(Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileOutput {
    command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<Profile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profiles: Option<Vec<Profile>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    has_password: Option<bool>,
}

#[derive(Args)]
pub struct ProfileArgs {
    #[command(subcommand)]
    command: ProfileCommand,
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Create or update a connection profile
    Set {
        /// Profile name
        name: String,
        /// SSH host
        #[arg(long)]
        host: Option<String>,
        /// SSH port (default: 22)
        #[arg(long)]
        port: Option<u16>,
        /// SSH username
        #[arg(long)]
        user: Option<String>,
        /// Private key file; pass an empty string to unset
        #[arg(long)]
        identity_file: Option<String>,
        /// Prompt for a password and store it in the system keychain
        #[arg(long)]
        ask_password: bool,
        /// Remote directory holding the project directories
        #[arg(long)]
        projects_root: Option<String>,
        /// Remote directory for backup archives
        #[arg(long)]
        backup_root: Option<String>,
        /// Package sub-directory deployed by default (default: dist)
        #[arg(long)]
        subdir: Option<String>,
    },
    /// Display a profile
    Show {
        /// Profile name
        name: String,
    },
    /// List all profiles
    List,
    /// Remove a profile and its stored password
    Delete {
        /// Profile name
        name: String,
    },
}

pub fn run(args: ProfileArgs) -> CmdResult<ProfileOutput> {
    match args.command {
        ProfileCommand::Set {
            name,
            host,
            port,
            user,
            identity_file,
            ask_password,
            projects_root,
            backup_root,
            subdir,
        } => {
            let result = profile::upsert(
                &name,
                ProfileChanges {
                    host,
                    port,
                    user,
                    identity_file,
                    projects_root,
                    backup_root,
                    default_subdir: subdir,
                },
            )?;

            let mut updated = result.updated_fields;
            if ask_password {
                let password = crate::tty::prompt_password(&format!("Password for {}: ", name))?;
                if password.is_empty() {
                    keychain::delete_password(&name)?;
                } else {
                    keychain::store_password(&name, &password)?;
                }
                updated.push("password".to_string());
            }

            Ok((
                ProfileOutput {
                    command: "profile.set".to_string(),
                    name: Some(name.clone()),
                    has_password: Some(has_password(&name)),
                    profile: Some(result.profile),
                    created: Some(result.created),
                    updated: Some(updated),
                    ..Default::default()
                },
                0,
            ))
        }
        ProfileCommand::Show { name } => {
            let profile = profile::load(&name)?;
            Ok((
                ProfileOutput {
                    command: "profile.show".to_string(),
                    name: Some(name.clone()),
                    has_password: Some(has_password(&name)),
                    profile: Some(profile),
                    ..Default::default()
                },
                0,
            ))
        }
        ProfileCommand::List => Ok((
            ProfileOutput {
                command: "profile.list".to_string(),
                profiles: Some(profile::list()?),
                ..Default::default()
            },
            0,
        )),
        ProfileCommand::Delete { name } => {
            profile::delete(&name)?;
            Ok((
                ProfileOutput {
                    command: "profile.delete".to_string(),
                    name: Some(name),
                    ..Default::default()
                },
                0,
            ))
        }
    }
}

fn has_password(name: &str) -> bool {
    keychain::get_password(name).map(|p| p.is_some()).unwrap_or(false)
}
