//! Remote filesystem operations.
//!
//! A thin semantic layer over [`Session`]: every operation here is one or a
//! few shell commands with quoted paths, plus a decision about how much to
//! trust what came back.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use crate::error::{Error, RemoteCommandFailedDetails, Result};
use crate::ssh::{Outcome, Session};
use crate::utils::{remote_path, shell};

const EXISTS_SENTINEL: &str = "__dropship_exists__";
const DONE_SENTINEL: &str = "__dropship_done__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Directory,
}

impl PathKind {
    fn test_flag(self) -> &'static str {
        match self {
            PathKind::File => "-f",
            PathKind::Directory => "-d",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    pub is_directory: bool,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
}

/// Directories first, then files; each group by name.
pub fn entry_order(a: &DirectoryEntry, b: &DirectoryEntry) -> Ordering {
    b.is_directory
        .cmp(&a.is_directory)
        .then_with(|| a.name.cmp(&b.name))
}

/// True only when the remote test echoes the sentinel.
///
/// Transport errors and unexpected output both read as `false`.
pub fn path_exists(session: &Session, path: &str, kind: PathKind) -> bool {
    let command = format!(
        "[ {} {} ] && echo {}",
        kind.test_flag(),
        shell::quote_path(path),
        EXISTS_SENTINEL
    );
    session.execute(&command).has_sentinel(EXISTS_SENTINEL)
}

/// `mkdir -p`; only fails when error text appears and the directory is
/// still missing afterwards.
pub fn ensure_directory(session: &Session, path: &str) -> Result<()> {
    let command = format!("mkdir -p {}", shell::quote_path(path));
    let result = session.execute(&command);

    if let Outcome::Failed(stderr) = result.outcome(None) {
        if !path_exists(session, path, PathKind::Directory) {
            return Err(Error::remote_command_failed(
                format!("Failed to create remote directory {}", path),
                RemoteCommandFailedDetails {
                    command,
                    stdout: result.stdout,
                    stderr,
                },
            ));
        }
    }

    Ok(())
}

/// Names of directories immediately under `root`, sorted.
pub fn list_project_directories(session: &Session, root: &str) -> Result<Vec<String>> {
    let root = remote_path::trim_trailing_slash(root);
    let command = format!("ls -1p {}", shell::quote_path_glob(root, ""));
    let result = session.execute(&command);
    let stderr = result.stderr_trimmed();

    if stderr.contains("No such file") {
        return Err(Error::remote_path_not_found(root, Some(stderr.to_string())));
    }
    if !stderr.is_empty() && result.stdout_trimmed().is_empty() {
        return Err(Error::remote_list_failed(root, stderr));
    }

    Ok(parse_project_listing(&result.stdout))
}

pub(crate) fn parse_project_listing(output: &str) -> Vec<String> {
    let mut projects: Vec<String> = output
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_suffix('/'))
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(str::to_string)
        .collect();
    projects.sort();
    projects
}

/// Attributed listing of `path`, directories first.
pub fn list_directory_detailed(session: &Session, path: &str) -> Result<Vec<DirectoryEntry>> {
    if !session.transfer_ready() {
        return Err(Error::remote_list_failed(path, "transfer channel is not open"));
    }

    let path = if path.trim().is_empty() { "." } else { path };
    let command = format!(
        "find {} -mindepth 1 -maxdepth 1 -printf '%y\\t%s\\t%T@\\t%f\\n'",
        shell::quote_path(path)
    );
    let result = session.execute(&command);
    let stderr = result.stderr_trimmed();

    if stderr.contains("No such file") {
        return Err(Error::remote_path_not_found(path, Some(stderr.to_string())));
    }
    if !stderr.is_empty() && result.stdout_trimmed().is_empty() {
        return Err(Error::remote_list_failed(path, stderr));
    }

    Ok(parse_detailed_listing(&result.stdout))
}

/// Parse `find -printf '%y\t%s\t%T@\t%f\n'` output; malformed lines are skipped.
pub(crate) fn parse_detailed_listing(output: &str) -> Vec<DirectoryEntry> {
    let mut entries: Vec<DirectoryEntry> = output
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(4, '\t');
            let kind = parts.next()?;
            let size = parts.next()?.parse::<u64>().ok()?;
            let mtime = parts.next()?;
            let name = parts.next()?;
            if name.is_empty() {
                return None;
            }

            let seconds = mtime.split('.').next()?.parse::<i64>().ok()?;
            let modified_at = DateTime::<Utc>::from_timestamp(seconds, 0)?;

            Some(DirectoryEntry {
                name: name.to_string(),
                is_directory: kind == "d",
                size_bytes: size,
                modified_at,
            })
        })
        .collect();

    entries.sort_by(entry_order);
    entries
}

/// A mutating command as it was sent, with what came back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executed {
    pub command: String,
    pub outcome: Outcome,
}

impl Executed {
    fn run(session: &Session, command: String, sentinel: Option<&str>) -> Self {
        let outcome = session.execute(&command).outcome(sentinel);
        Self { command, outcome }
    }

    /// Error text for a step that did not confirm.
    pub fn failure_text(&self) -> String {
        match &self.outcome {
            Outcome::Failed(stderr) => stderr.clone(),
            _ => "no confirmation received".to_string(),
        }
    }

    /// `remote.command_failed` naming the exact command line that ran.
    pub fn into_error(self, message: impl Into<String>) -> Error {
        let stderr = self.failure_text();
        Error::remote_command_failed(
            message,
            RemoteCommandFailedDetails {
                command: self.command,
                stdout: String::new(),
                stderr,
            },
        )
    }
}

/// `rm -rf` on the path itself.
pub fn remove_tree(session: &Session, path: &str) -> Executed {
    Executed::run(session, format!("rm -rf {}", shell::quote_path(path)), None)
}

/// Remove everything inside `dir`, dotfiles included, keeping `dir`.
pub fn clear_directory(session: &Session, dir: &str) -> Executed {
    let command = format!(
        "rm -rf {} {} {}",
        shell::quote_path_glob(dir, "*"),
        shell::quote_path_glob(dir, ".[!.]*"),
        shell::quote_path_glob(dir, "..?*")
    );
    Executed::run(session, command, None)
}

/// Copy the contents of `from` into `to`; confirmed only by sentinel.
pub fn copy_contents(session: &Session, from: &str, to: &str) -> Executed {
    let command = format!(
        "cp -R {} {} && echo {}",
        shell::quote_path_glob(from, "."),
        shell::quote_path_glob(to, ""),
        DONE_SENTINEL
    );
    Executed::run(session, command, Some(DONE_SENTINEL))
}

/// Copy one file over another; confirmed only by sentinel.
pub fn copy_file(session: &Session, from: &str, to: &str) -> Executed {
    let command = format!(
        "cp -f {} {} && echo {}",
        shell::quote_path(from),
        shell::quote_path(to),
        DONE_SENTINEL
    );
    Executed::run(session, command, Some(DONE_SENTINEL))
}

/// Mirror a local tree under `remote_dir`, depth-first.
///
/// Not resumable: on error the remote side is left partially populated and
/// the caller discards it.
pub fn upload_directory_recursive(session: &Session, local_dir: &Path, remote_dir: &str) -> Result<usize> {
    if !local_dir.is_dir() {
        return Err(Error::validation_invalid_argument(
            "source",
            format!("Local source is not a directory: {}", local_dir.display()),
            None,
            None,
        ));
    }

    ensure_directory(session, remote_dir)?;
    upload_tree(session, local_dir, remote_dir)
}

fn upload_tree(session: &Session, local_dir: &Path, remote_dir: &str) -> Result<usize> {
    let mut entries: Vec<_> = fs::read_dir(local_dir)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("read {}", local_dir.display()))))?
        .collect::<std::io::Result<_>>()
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("read {}", local_dir.display()))))?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut uploaded = 0;
    for entry in entries {
        let local_path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        let remote_path = remote_path::join(remote_dir, &name);

        let file_type = entry
            .file_type()
            .map_err(|e| Error::internal_io(e.to_string(), Some(format!("stat {}", local_path.display()))))?;

        if file_type.is_dir() {
            ensure_directory(session, &remote_path)?;
            uploaded += upload_tree(session, &local_path, &remote_path)?;
        } else if local_path.is_file() {
            session.upload_file(&local_path, &remote_path)?;
            uploaded += 1;
        }
    }

    Ok(uploaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, is_directory: bool) -> DirectoryEntry {
        DirectoryEntry {
            name: name.to_string(),
            is_directory,
            size_bytes: 0,
            modified_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        }
    }

    #[test]
    fn project_listing_keeps_only_directories() {
        let output = "assets/\nindex.html\nshop/\nadmin/\n";
        assert_eq!(parse_project_listing(output), vec!["admin", "assets", "shop"]);
    }

    #[test]
    fn detailed_listing_parses_find_output() {
        let output = "f\t1024\t1704164645.1234567890\tindex.html\nd\t4096\t1704164600.0\tassets\n";
        let entries = parse_detailed_listing(output);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "assets");
        assert!(entries[0].is_directory);
        assert_eq!(entries[1].name, "index.html");
        assert_eq!(entries[1].size_bytes, 1024);
        assert_eq!(entries[1].modified_at.timestamp(), 1704164645);
    }

    #[test]
    fn detailed_listing_keeps_tabs_in_names_and_skips_garbage() {
        let output = "f\t1\t0\tweird\tname\nnot a line\nf\tx\t0\tbad-size\n";
        let entries = parse_detailed_listing(output);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "weird\tname");
    }

    #[test]
    fn directories_sort_before_files_for_any_input_order() {
        let base = vec![
            entry("b.js", false),
            entry("zeta", true),
            entry("a.css", false),
            entry("alpha", true),
            entry("index.html", false),
            entry("Media", true),
        ];

        let expected: Vec<&str> = vec!["Media", "alpha", "zeta", "a.css", "b.js", "index.html"];

        // Every rotation and its reverse.
        for shift in 0..base.len() {
            for reverse in [false, true] {
                let mut input = base.clone();
                input.rotate_left(shift);
                if reverse {
                    input.reverse();
                }
                input.sort_by(entry_order);
                let names: Vec<&str> = input.iter().map(|e| e.name.as_str()).collect();
                assert_eq!(names, expected);
            }
        }
    }

    #[test]
    fn failed_step_reports_the_command_it_ran() {
        let executed = Executed {
            command: "rm -rf '/srv/apps/shop'/* '/srv/apps/shop'/.[!.]*".to_string(),
            outcome: Outcome::Failed("rm: Permission denied".to_string()),
        };
        let err = executed.into_error("Failed to clear /srv/apps/shop");

        assert_eq!(err.code, crate::error::ErrorCode::RemoteCommandFailed);
        assert_eq!(err.details["command"], "rm -rf '/srv/apps/shop'/* '/srv/apps/shop'/.[!.]*");
        assert_eq!(err.details["stderr"], "rm: Permission denied");

        let silent = Executed {
            command: "cp -f a b".to_string(),
            outcome: Outcome::Ambiguous,
        };
        assert_eq!(silent.failure_text(), "no confirmation received");
    }

    #[test]
    fn entries_serialise_with_rfc3339_timestamps() {
        let value = serde_json::to_value(entry("assets", true)).unwrap();
        assert_eq!(value["name"], "assets");
        assert_eq!(value["isDirectory"], true);
        assert_eq!(value["modifiedAt"], "1970-01-01T00:00:00Z");
    }
}
