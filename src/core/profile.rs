//! Connection profiles.
//!
//! A profile bundles everything needed to reach one host and find its
//! projects. Profiles are JSON files under `~/.config/dropship/profiles/`;
//! passwords are kept in the keychain, never in the file.

use serde::{Deserialize, Serialize};
use std::fs;

use crate::defaults::{self, Defaults};
use crate::error::{Error, Result};
use crate::keychain;
use crate::paths;
use crate::ssh::{ConnectOptions, Credential};
use crate::utils::{io, validation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(skip_deserializing, default)]
    pub name: String,
    pub host: String,
    #[serde(default = "defaults::default_ssh_port")]
    pub port: u16,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
    pub projects_root: String,
    pub backup_root: String,
    /// Package sub-directory deployed when none is given.
    #[serde(default = "default_subdir")]
    pub default_subdir: String,
}

fn default_subdir() -> String {
    "dist".to_string()
}

impl Profile {
    pub fn is_valid(&self) -> bool {
        !self.host.is_empty() && !self.user.is_empty()
    }

    /// Build transport options, resolving the credential.
    ///
    /// An identity file wins over a stored password; with neither, the local
    /// ssh agent and configuration are used.
    pub fn to_connect_options(&self, defaults: &Defaults) -> Result<ConnectOptions> {
        let credential = match &self.identity_file {
            Some(path) if !path.trim().is_empty() => {
                Credential::IdentityFile(shellexpand::tilde(path).to_string())
            }
            _ => match keychain::get_password(&self.name) {
                Ok(Some(password)) => Credential::Password(password),
                Ok(None) => Credential::Agent,
                Err(err) => {
                    tracing::debug!(profile = %self.name, error = %err, "keychain unavailable, using agent");
                    Credential::Agent
                }
            },
        };

        Ok(ConnectOptions::with_defaults(
            self.host.clone(),
            self.port,
            self.user.clone(),
            credential,
            defaults,
        ))
    }
}

pub fn validate_name(name: &str) -> Result<&str> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !name.starts_with('.');

    if !valid {
        return Err(Error::validation_invalid_argument(
            "profile",
            "Profile names may only contain letters, digits, '-', '_' and '.'",
            Some(name.to_string()),
            None,
        ));
    }
    Ok(name)
}

// ============================================================================
// CRUD
// ============================================================================

pub fn load(name: &str) -> Result<Profile> {
    validate_name(name)?;
    let path = paths::profile(name)?;
    if !path.exists() {
        return Err(Error::profile_not_found(name));
    }

    let mut profile: Profile = io::read_json(&path, &format!("read profile {}", name))?;
    profile.name = name.to_string();
    Ok(profile)
}

/// All profiles, sorted by name. Unreadable files are skipped.
pub fn list() -> Result<Vec<Profile>> {
    let dir = paths::profiles()?;
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(&dir)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("read {}", dir.display()))))?;

    let mut profiles: Vec<Profile> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .filter_map(|path| {
            let name = path.file_stem()?.to_string_lossy().to_string();
            match load(&name) {
                Ok(profile) => Some(profile),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable profile");
                    None
                }
            }
        })
        .collect();

    profiles.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(profiles)
}

pub fn save(profile: &Profile) -> Result<()> {
    validate_name(&profile.name)?;
    if !profile.is_valid() {
        return Err(Error::validation_missing_argument(vec![
            "host".to_string(),
            "user".to_string(),
        ]));
    }
    let path = paths::profile(&profile.name)?;
    io::write_json(&path, profile, &format!("write profile {}", profile.name))
}

pub fn exists(name: &str) -> bool {
    paths::profile(name).map(|p| p.exists()).unwrap_or(false)
}

/// Remove the profile file and any stored password.
pub fn delete(name: &str) -> Result<()> {
    validate_name(name)?;
    let path = paths::profile(name)?;
    if !path.exists() {
        return Err(Error::profile_not_found(name));
    }

    fs::remove_file(&path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("delete {}", path.display()))))?;

    if let Err(err) = keychain::delete_password(name) {
        tracing::debug!(profile = name, error = %err, "no keychain entry removed");
    }
    Ok(())
}

// ============================================================================
// Operations
// ============================================================================

/// Field changes for [`upsert`]; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub identity_file: Option<String>,
    pub projects_root: Option<String>,
    pub backup_root: Option<String>,
    pub default_subdir: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertResult {
    pub profile: Profile,
    pub created: bool,
    pub updated_fields: Vec<String>,
}

/// Create a profile or update fields of an existing one.
///
/// A new profile needs host, user, projects root and backup root.
pub fn upsert(name: &str, mut changes: ProfileChanges) -> Result<UpsertResult> {
    validate_name(name)?;
    changes.host = non_empty(changes.host, "host")?;
    changes.user = non_empty(changes.user, "user")?;
    changes.projects_root = non_empty(changes.projects_root, "projects_root")?;
    changes.backup_root = non_empty(changes.backup_root, "backup_root")?;

    let existing = if exists(name) { Some(load(name)?) } else { None };
    let created = existing.is_none();

    let mut profile = match existing {
        Some(profile) => profile,
        None => {
            let mut missing = Vec::new();
            if changes.host.is_none() {
                missing.push("host".to_string());
            }
            if changes.user.is_none() {
                missing.push("user".to_string());
            }
            if changes.projects_root.is_none() {
                missing.push("projects_root".to_string());
            }
            if changes.backup_root.is_none() {
                missing.push("backup_root".to_string());
            }
            if !missing.is_empty() {
                return Err(Error::validation_missing_argument(missing));
            }

            Profile {
                name: name.to_string(),
                host: String::new(),
                port: defaults::load_defaults().ssh.default_port,
                user: String::new(),
                identity_file: None,
                projects_root: String::new(),
                backup_root: String::new(),
                default_subdir: default_subdir(),
            }
        }
    };

    let mut updated = Vec::new();
    let mut apply = |field: &str, value: Option<String>, slot: &mut String| {
        if let Some(value) = value {
            *slot = value;
            updated.push(field.to_string());
        }
    };
    apply("host", changes.host, &mut profile.host);
    apply("user", changes.user, &mut profile.user);
    apply("projectsRoot", changes.projects_root, &mut profile.projects_root);
    apply("backupRoot", changes.backup_root, &mut profile.backup_root);
    apply("defaultSubdir", changes.default_subdir, &mut profile.default_subdir);

    if let Some(port) = changes.port {
        profile.port = port;
        updated.push("port".to_string());
    }
    if let Some(identity_file) = changes.identity_file {
        profile.identity_file = (!identity_file.trim().is_empty()).then_some(identity_file);
        updated.push("identityFile".to_string());
    }

    save(&profile)?;

    Ok(UpsertResult {
        profile,
        created,
        updated_fields: updated,
    })
}

/// Trim a provided field, refusing one that is blank.
fn non_empty(value: Option<String>, field: &str) -> Result<Option<String>> {
    value
        .map(|v| {
            validation::require_non_empty(&v, field, &format!("{} cannot be empty", field))
                .map(str::to_string)
        })
        .transpose()
}
