#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dropship::defaults::{Defaults, DeployDefaults};
use dropship::error::{Error, Result, TransferFailedDetails};
use dropship::progress::ProgressEvent;
use dropship::ssh::{AuditEvent, AuditSink, CommandResult, LocalTransport, Session, Transport};
use tempfile::TempDir;

/// A scratch "remote" filesystem: projects, backups and staging roots.
pub struct Remote {
    pub dir: TempDir,
    pub projects_root: String,
    pub backup_root: String,
    pub staging_root: String,
}

impl Remote {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let projects = dir.path().join("apps");
        let staging = dir.path().join("tmp");
        fs::create_dir_all(&projects).unwrap();
        fs::create_dir_all(&staging).unwrap();

        Self {
            projects_root: path_str(&projects),
            backup_root: path_str(&dir.path().join("backups")),
            staging_root: path_str(&staging),
            dir,
        }
    }

    pub fn project_dir(&self, project: &str) -> PathBuf {
        Path::new(&self.projects_root).join(project)
    }

    pub fn project_path(&self, project: &str) -> String {
        path_str(&self.project_dir(project))
    }

    pub fn settings(&self) -> DeployDefaults {
        let mut settings = Defaults::default().deploy;
        settings.staging_root = self.staging_root.clone();
        settings
    }

    pub fn staging_entries(&self) -> Vec<String> {
        fs::read_dir(&self.staging_root)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect()
    }
}

pub fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

/// Relative path -> contents (`None` for directories).
pub fn snapshot(root: &Path) -> BTreeMap<String, Option<Vec<u8>>> {
    let mut out = BTreeMap::new();
    collect(root, root, &mut out);
    out
}

fn collect(root: &Path, dir: &Path, out: &mut BTreeMap<String, Option<Vec<u8>>>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        let relative = path.strip_prefix(root).unwrap().to_string_lossy().to_string();
        if path.is_dir() {
            out.insert(relative, None);
            collect(root, &path, out);
        } else {
            out.insert(relative, Some(fs::read(&path).unwrap()));
        }
    }
}

/// Audit sink that keeps every command line.
#[derive(Default)]
pub struct RecordingAudit {
    pub commands: Mutex<Vec<String>>,
}

impl RecordingAudit {
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl AuditSink for RecordingAudit {
    fn record(&self, event: &AuditEvent<'_>) {
        if let AuditEvent::Command { command, .. } = event {
            self.commands.lock().unwrap().push(command.to_string());
        }
    }
}

pub fn local_session() -> (Session, Arc<RecordingAudit>) {
    session_over(Box::new(LocalTransport::new()))
}

pub fn session_over(transport: Box<dyn Transport + Send>) -> (Session, Arc<RecordingAudit>) {
    let audit = Arc::new(RecordingAudit::default());
    let session = Session::from_transport(transport).with_audit(audit.clone());
    (session, audit)
}

/// Local transport with injected failures.
pub struct FaultyTransport {
    inner: LocalTransport,
    /// Uploads after this many successful ones fail.
    pub fail_upload_after: Option<usize>,
    /// Commands starting with this prefix are not run and report an error.
    pub fail_command_prefix: Option<&'static str>,
    uploads: AtomicUsize,
}

impl FaultyTransport {
    pub fn failing_uploads_after(count: usize) -> Self {
        Self {
            inner: LocalTransport::new(),
            fail_upload_after: Some(count),
            fail_command_prefix: None,
            uploads: AtomicUsize::new(0),
        }
    }

    pub fn failing_commands(prefix: &'static str) -> Self {
        Self {
            inner: LocalTransport::new(),
            fail_upload_after: None,
            fail_command_prefix: Some(prefix),
            uploads: AtomicUsize::new(0),
        }
    }
}

impl Transport for FaultyTransport {
    fn execute(&self, command: &str) -> CommandResult {
        if let Some(prefix) = self.fail_command_prefix {
            if command.starts_with(prefix) {
                return CommandResult::new("", format!("{}: simulated failure", prefix));
            }
        }
        self.inner.execute(command)
    }

    fn upload_file(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        let done = self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.fail_upload_after.is_some_and(|limit| done >= limit) {
            return Err(Error::transfer_failed(TransferFailedDetails {
                local_path: local_path.display().to_string(),
                remote_path: remote_path.to_string(),
                error: "connection reset by peer".to_string(),
            }));
        }
        self.inner.upload_file(local_path, remote_path)
    }

    fn transfer_ready(&self) -> bool {
        self.inner.transfer_ready()
    }

    fn endpoint(&self) -> String {
        "faulty".to_string()
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

/// Collects progress states in order.
pub fn progress_recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(ProgressEvent)) {
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let states = states.clone();
        move |event: ProgressEvent| states.lock().unwrap().push(event.state.to_string())
    };
    (states, sink)
}
