//! Remote-execution transport.
//!
//! A [`Transport`] is one authenticated channel pair: command execution and
//! file transfer. [`Session`] wraps a transport with an audit sink and is the
//! only handle the rest of the crate talks to.

mod client;
mod session;

use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::defaults::Defaults;
use crate::error::Result;

pub use client::{execute_local_command, is_local_host, LocalTransport, SshTransport};
pub use session::{AuditEvent, AuditSink, Session, SharedSession, TracingAudit};

/// Captured output of one remote invocation.
///
/// There is deliberately no exit status: success is inferred from sentinel
/// output or a follow-up existence probe, never from an empty stderr alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
}

/// Tri-state reading of a [`CommandResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The expected sentinel was echoed.
    Confirmed,
    /// Error text was produced and no sentinel confirmed success.
    Failed(String),
    /// Nothing either way; callers decide how optimistic to be.
    Ambiguous,
}

impl Outcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Outcome::Confirmed)
    }

    /// Optimistic reading used for low-stakes steps: only explicit error text fails.
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

impl CommandResult {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub(crate) fn transport_error(message: impl Into<String>) -> Self {
        Self::new(String::new(), message)
    }

    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    pub fn stderr_trimmed(&self) -> &str {
        self.stderr.trim()
    }

    /// Exact match of the trimmed stdout against a sentinel.
    pub fn has_sentinel(&self, sentinel: &str) -> bool {
        self.stdout_trimmed() == sentinel
    }

    pub fn outcome(&self, sentinel: Option<&str>) -> Outcome {
        if let Some(sentinel) = sentinel {
            if self.has_sentinel(sentinel) {
                return Outcome::Confirmed;
            }
        }
        if !self.stderr_trimmed().is_empty() {
            return Outcome::Failed(self.stderr_trimmed().to_string());
        }
        Outcome::Ambiguous
    }
}

/// One command channel plus one transfer channel to a host.
pub trait Transport {
    /// Run a command line and block until both output streams are drained.
    fn execute(&self, command: &str) -> CommandResult;

    /// Copy a local file to a remote path, blocking until fully written.
    fn upload_file(&self, local_path: &Path, remote_path: &str) -> Result<()>;

    /// Whether the file-transfer channel is usable.
    fn transfer_ready(&self) -> bool;

    /// `user@host:port` style label for logs.
    fn endpoint(&self) -> String;

    /// Release both channels. Must be idempotent.
    fn close(&mut self);
}

/// How to authenticate the connection.
#[derive(Clone)]
pub enum Credential {
    /// Whatever the local ssh configuration and agent provide.
    Agent,
    IdentityFile(String),
    Password(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Agent => write!(f, "Agent"),
            Credential::IdentityFile(path) => f.debug_tuple("IdentityFile").field(path).finish(),
            Credential::Password(_) => write!(f, "Password(***)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub credential: Credential,
    pub connect_timeout: Duration,
    pub server_alive_interval: u64,
    pub scp_flags: Vec<String>,
}

impl ConnectOptions {
    pub fn new(host: impl Into<String>, port: u16, user: impl Into<String>, credential: Credential) -> Self {
        Self::with_defaults(host, port, user, credential, &crate::defaults::load_defaults())
    }

    pub fn with_defaults(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        credential: Credential,
        defaults: &Defaults,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            credential,
            connect_timeout: Duration::from_secs(defaults.ssh.connect_timeout_secs),
            server_alive_interval: defaults.ssh.server_alive_interval,
            scp_flags: defaults.deploy.scp_flags.clone(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}
