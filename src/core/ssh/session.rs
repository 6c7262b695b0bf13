use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{is_local_host, CommandResult, ConnectOptions, LocalTransport, SshTransport, Transport};
use crate::error::{Error, Result};

/// Something worth auditing that happened on a session.
#[derive(Debug)]
pub enum AuditEvent<'a> {
    Command {
        endpoint: &'a str,
        command: &'a str,
        result: &'a CommandResult,
    },
    Upload {
        endpoint: &'a str,
        local_path: &'a Path,
        remote_path: &'a str,
        error: Option<&'a Error>,
    },
}

/// Receives every command and upload a session performs.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent<'_>);
}

/// Default sink: one `tracing` event per command, stderr at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, event: &AuditEvent<'_>) {
        match event {
            AuditEvent::Command {
                endpoint,
                command,
                result,
            } => {
                tracing::info!(target: "dropship::audit", endpoint, command, "executing");
                if !result.stdout_trimmed().is_empty() {
                    tracing::info!(target: "dropship::audit", endpoint, stdout = result.stdout_trimmed());
                }
                if !result.stderr_trimmed().is_empty() {
                    tracing::warn!(target: "dropship::audit", endpoint, stderr = result.stderr_trimmed());
                }
            }
            AuditEvent::Upload {
                endpoint,
                local_path,
                remote_path,
                error,
            } => match error {
                None => tracing::debug!(
                    target: "dropship::audit",
                    endpoint,
                    local = %local_path.display(),
                    remote = remote_path,
                    "uploaded"
                ),
                Some(err) => tracing::warn!(
                    target: "dropship::audit",
                    endpoint,
                    local = %local_path.display(),
                    remote = remote_path,
                    error = %err,
                    "upload failed"
                ),
            },
        }
    }
}

/// One live connection. Commands run strictly one at a time, in issue order.
pub struct Session {
    transport: Box<dyn Transport + Send>,
    audit: Arc<dyn AuditSink>,
    endpoint: String,
}

impl Session {
    /// Open a session, using local execution for loopback hosts.
    pub fn connect(options: &ConnectOptions) -> Result<Self> {
        if is_local_host(&options.host) {
            log_status!("ssh", "Host '{}' is local, using local execution", options.host);
            return Ok(Self::from_transport(Box::new(LocalTransport::new())));
        }

        let transport = SshTransport::connect(options)?;
        Ok(Self::from_transport(Box::new(transport)))
    }

    pub fn from_transport(transport: Box<dyn Transport + Send>) -> Self {
        let endpoint = transport.endpoint();
        Self {
            transport,
            audit: Arc::new(TracingAudit),
            endpoint,
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn execute(&self, command: &str) -> CommandResult {
        let result = self.transport.execute(command);
        self.audit.record(&AuditEvent::Command {
            endpoint: &self.endpoint,
            command,
            result: &result,
        });
        result
    }

    pub fn upload_file(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        let result = self.transport.upload_file(local_path, remote_path);
        self.audit.record(&AuditEvent::Upload {
            endpoint: &self.endpoint,
            local_path,
            remote_path,
            error: result.as_ref().err(),
        });
        result
    }

    pub fn transfer_ready(&self) -> bool {
        self.transport.transfer_ready()
    }

    pub fn close(&mut self) {
        self.transport.close();
    }

    pub fn into_shared(self) -> SharedSession {
        SharedSession::new(self)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// A session shared between workers.
///
/// Each multi-step operation must hold the guard from [`SharedSession::lock`]
/// for its whole run so two orchestrations never interleave commands.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, Session>> {
        self.inner
            .lock()
            .map_err(|_| Error::internal_unexpected("session lock poisoned by a panicked operation"))
    }

    /// Run `op` with exclusive use of the session.
    pub fn with<R>(&self, op: impl FnOnce(&Session) -> R) -> Result<R> {
        let guard = self.lock()?;
        Ok(op(&guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        commands: Mutex<Vec<String>>,
    }

    impl AuditSink for Recorder {
        fn record(&self, event: &AuditEvent<'_>) {
            if let AuditEvent::Command { command, .. } = event {
                self.commands.lock().unwrap().push(command.to_string());
            }
        }
    }

    /// Flags any moment where two commands are in flight at once.
    struct OverlapDetector {
        busy: Arc<AtomicBool>,
        overlaps: Arc<AtomicUsize>,
    }

    impl Transport for OverlapDetector {
        fn execute(&self, _command: &str) -> CommandResult {
            if self.busy.swap(true, Ordering::SeqCst) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            thread::sleep(Duration::from_millis(2));
            self.busy.store(false, Ordering::SeqCst);
            CommandResult::default()
        }
        fn upload_file(&self, _local_path: &Path, _remote_path: &str) -> Result<()> {
            Ok(())
        }
        fn transfer_ready(&self) -> bool {
            true
        }
        fn endpoint(&self) -> String {
            "test".to_string()
        }
        fn close(&mut self) {}
    }

    #[test]
    fn every_command_is_audited_in_order() {
        let recorder = Arc::new(Recorder::default());
        let session = Session::from_transport(Box::new(LocalTransport::new()))
            .with_audit(recorder.clone());

        session.execute("echo one");
        session.execute("echo two");

        assert_eq!(
            *recorder.commands.lock().unwrap(),
            vec!["echo one".to_string(), "echo two".to_string()]
        );
    }

    #[test]
    fn shared_session_serialises_multi_step_operations() {
        let overlaps = Arc::new(AtomicUsize::new(0));
        let session = Session::from_transport(Box::new(OverlapDetector {
            busy: Arc::new(AtomicBool::new(false)),
            overlaps: overlaps.clone(),
        }))
        .into_shared();

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let shared = session.clone();
                thread::spawn(move || {
                    shared
                        .with(|s| {
                            for _ in 0..5 {
                                s.execute("step");
                            }
                        })
                        .unwrap();
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn close_is_idempotent() {
        let mut session = Session::from_transport(Box::new(LocalTransport::new()));
        session.close();
        session.close();
        assert!(!session.transfer_ready());
    }
}
