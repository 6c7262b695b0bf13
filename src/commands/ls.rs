use clap::Args;
use serde::Serialize;

use dropship::listing;
use dropship::remote_fs::DirectoryEntry;

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct LsArgs {
    /// Remote directory (default: the profile's projects root)
    pub path: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LsEntry {
    #[serde(flatten)]
    entry: DirectoryEntry,
    size: String,
}

#[derive(Serialize)]
pub struct LsOutput {
    command: &'static str,
    path: String,
    entries: Vec<LsEntry>,
}

pub fn run(args: LsArgs, global: &GlobalArgs) -> CmdResult<LsOutput> {
    let remote = super::connect(global)?;
    let path = args
        .path
        .unwrap_or_else(|| remote.profile.projects_root.clone());

    let entries = listing::entries(&remote.session, &path)?
        .into_iter()
        .map(|entry| LsEntry {
            size: if entry.is_directory {
                "-".to_string()
            } else {
                human_size(entry.size_bytes)
            },
            entry,
        })
        .collect();

    Ok((
        LsOutput {
            command: "ls",
            path,
            entries,
        },
        0,
    ))
}

/// `1536` -> `1.5 KB`
fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}
