use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::TempDir;

use super::{CommandResult, ConnectOptions, Credential, Transport};
use crate::error::{ConnectFailedDetails, Error, Result, TransferFailedDetails};
use crate::utils::shell;

const READY_SENTINEL: &str = "__dropship_ready__";

/// OpenSSH client running in ControlMaster mode.
///
/// `connect` authenticates once and leaves a backgrounded master process
/// listening on a private control socket. Every later `ssh`/`scp`/`sftp`
/// invocation multiplexes over that socket, so commands reuse the single
/// authenticated connection and never prompt again.
pub struct SshTransport {
    pub host: String,
    pub user: String,
    pub port: u16,
    scp_flags: Vec<String>,
    control_dir: Option<TempDir>,
    control_path: PathBuf,
    exec_open: bool,
    transfer_open: bool,
}

impl SshTransport {
    pub fn connect(options: &ConnectOptions) -> Result<Self> {
        if let Credential::IdentityFile(path) = &options.credential {
            let expanded = shellexpand::tilde(path).to_string();
            if !Path::new(&expanded).exists() {
                return Err(Error::ssh_identity_file_not_found(expanded));
            }
        }

        let control_dir = tempfile::Builder::new()
            .prefix("dropship-ssh-")
            .tempdir()
            .map_err(|e| Error::internal_io(e.to_string(), Some("create control dir".to_string())))?;
        let control_path = control_dir.path().join("ctl");

        let mut transport = Self {
            host: options.host.clone(),
            user: options.user.clone(),
            port: options.port,
            scp_flags: options.scp_flags.clone(),
            control_dir: Some(control_dir),
            control_path,
            exec_open: false,
            transfer_open: false,
        };

        if let Err(err) = transport.start_master(options) {
            transport.close();
            return Err(err);
        }

        let probe = transport.run_muxed(&format!("echo {}", READY_SENTINEL));
        if !probe.has_sentinel(READY_SENTINEL) {
            transport.close();
            return Err(Error::ssh_connect_failed(connect_details(
                options,
                format!("execution channel check failed: {}", probe.stderr_trimmed()),
            )));
        }
        transport.exec_open = true;

        if let Err(stderr) = transport.probe_transfer() {
            transport.close();
            return Err(Error::ssh_connect_failed(connect_details(
                options,
                format!("transfer channel check failed: {}", stderr),
            )));
        }
        transport.transfer_open = true;

        log_status!("ssh", "Connected to {}", options.endpoint());
        Ok(transport)
    }

    fn start_master(&self, options: &ConnectOptions) -> Result<()> {
        let log_path = self.control_path.with_extension("log");
        let log = File::create(&log_path).map_err(|e| {
            Error::internal_io(e.to_string(), Some("create ssh master log".to_string()))
        })?;

        let mut cmd = match &options.credential {
            Credential::Password(password) => {
                let mut cmd = Command::new("sshpass");
                cmd.arg("-e").arg("ssh").env("SSHPASS", password);
                cmd
            }
            _ => Command::new("ssh"),
        };

        cmd.args(build_master_args(options, &self.control_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(log);

        // -f backgrounds the master once authenticated, so status() returns.
        let status = cmd.status().map_err(|e| {
            Error::ssh_connect_failed(connect_details(options, format!("failed to launch ssh: {}", e)))
        })?;

        if status.success() {
            return Ok(());
        }

        let stderr = fs::read_to_string(&log_path).unwrap_or_default();
        let password_rejected = matches!(options.credential, Credential::Password(_))
            && status.code() == Some(SSHPASS_WRONG_PASSWORD);
        let details = connect_details(options, stderr.trim().to_string());

        if password_rejected || is_auth_failure(&stderr) {
            Err(Error::ssh_auth_failed(details))
        } else {
            Err(Error::ssh_connect_failed(details))
        }
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    fn mux_options(&self) -> Vec<String> {
        vec![
            "-o".to_string(),
            format!("ControlPath={}", self.control_path.display()),
            "-o".to_string(),
            "ControlMaster=no".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
        ]
    }

    fn run_muxed(&self, command: &str) -> CommandResult {
        let mut args = self.mux_options();
        args.push("-p".to_string());
        args.push(self.port.to_string());
        args.push(self.destination());
        args.push(command.to_string());

        let output = Command::new("ssh").args(&args).stdin(Stdio::null()).output();

        match output {
            Ok(out) => CommandResult {
                stdout: String::from_utf8_lossy(&out.stdout).to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).to_string(),
            },
            Err(e) => CommandResult::transport_error(format!("SSH error: {}", e)),
        }
    }

    fn probe_transfer(&self) -> std::result::Result<(), String> {
        let mut args = self.mux_options();
        args.extend(["-q".to_string(), "-b".to_string(), "-".to_string()]);
        args.push("-P".to_string());
        args.push(self.port.to_string());
        args.push(self.destination());

        let mut child = Command::new("sftp")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("failed to launch sftp: {}", e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(b"pwd\n")
                .map_err(|e| format!("failed to write sftp batch: {}", e))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| format!("sftp did not finish: {}", e))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
        }
    }
}

impl Transport for SshTransport {
    fn execute(&self, command: &str) -> CommandResult {
        if !self.exec_open {
            return CommandResult::transport_error("SSH session is closed");
        }
        self.run_muxed(command)
    }

    fn upload_file(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        let failure = |error: String| {
            Error::transfer_failed(TransferFailedDetails {
                local_path: local_path.display().to_string(),
                remote_path: remote_path.to_string(),
                error,
            })
        };

        if !self.transfer_open {
            return Err(failure("transfer channel is closed".to_string()));
        }

        let mut args: Vec<String> = self.scp_flags.clone();
        args.push("-q".to_string());
        args.extend(self.mux_options());
        args.push("-P".to_string());
        args.push(self.port.to_string());
        args.push(local_path.to_string_lossy().to_string());
        args.push(format!("{}:{}", self.destination(), shell::quote_path(remote_path)));

        match Command::new("scp").args(&args).stdin(Stdio::null()).output() {
            Ok(out) if out.status.success() => Ok(()),
            Ok(out) => Err(failure(String::from_utf8_lossy(&out.stderr).trim().to_string())),
            Err(e) => Err(failure(e.to_string())),
        }
    }

    fn transfer_ready(&self) -> bool {
        self.transfer_open
    }

    fn endpoint(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }

    fn close(&mut self) {
        let Some(control_dir) = self.control_dir.take() else {
            return;
        };

        if self.control_path.exists() {
            let _ = Command::new("ssh")
                .arg("-o")
                .arg(format!("ControlPath={}", self.control_path.display()))
                .arg("-O")
                .arg("exit")
                .arg(self.destination())
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
        }

        self.exec_open = false;
        self.transfer_open = false;
        drop(control_dir);
    }
}

impl Drop for SshTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// sshpass exit status for a rejected password.
const SSHPASS_WRONG_PASSWORD: i32 = 5;

fn build_master_args(options: &ConnectOptions, control_path: &Path) -> Vec<String> {
    let mut args = vec![
        "-M".to_string(),
        "-N".to_string(),
        "-f".to_string(),
        "-o".to_string(),
        format!("ControlPath={}", control_path.display()),
        "-o".to_string(),
        "ControlPersist=yes".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", options.connect_timeout.as_secs().max(1)),
        "-o".to_string(),
        format!("ServerAliveInterval={}", options.server_alive_interval),
        "-o".to_string(),
        "ServerAliveCountMax=3".to_string(),
        "-o".to_string(),
        "StrictHostKeyChecking=accept-new".to_string(),
    ];

    match &options.credential {
        Credential::Agent => {
            args.extend(["-o".to_string(), "BatchMode=yes".to_string()]);
        }
        Credential::IdentityFile(path) => {
            args.extend(["-o".to_string(), "BatchMode=yes".to_string()]);
            args.extend([
                "-o".to_string(),
                "IdentitiesOnly=yes".to_string(),
                "-i".to_string(),
                shellexpand::tilde(path).to_string(),
            ]);
        }
        Credential::Password(_) => {
            args.extend([
                "-o".to_string(),
                "PreferredAuthentications=password,keyboard-interactive".to_string(),
                "-o".to_string(),
                "PubkeyAuthentication=no".to_string(),
                "-o".to_string(),
                "NumberOfPasswordPrompts=1".to_string(),
            ]);
        }
    }

    args.push("-p".to_string());
    args.push(options.port.to_string());
    args.push(format!("{}@{}", options.user, options.host));
    args
}

fn connect_details(options: &ConnectOptions, stderr: String) -> ConnectFailedDetails {
    ConnectFailedDetails {
        host: options.host.clone(),
        port: options.port,
        user: options.user.clone(),
        stderr,
    }
}

fn is_auth_failure(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    [
        "permission denied",
        "authentication failed",
        "too many authentication failures",
        "no supported authentication methods",
    ]
    .iter()
    .any(|p| stderr.contains(p))
}

/// Runs commands on this machine instead of over SSH.
///
/// Chosen automatically for `localhost`, `127.0.0.1`, and `::1`.
pub struct LocalTransport {
    open: bool,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self { open: true }
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for LocalTransport {
    fn execute(&self, command: &str) -> CommandResult {
        if !self.open {
            return CommandResult::transport_error("local session is closed");
        }
        execute_local_command(command)
    }

    fn upload_file(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        if !self.open {
            return Err(Error::transfer_failed(TransferFailedDetails {
                local_path: local_path.display().to_string(),
                remote_path: remote_path.to_string(),
                error: "local session is closed".to_string(),
            }));
        }

        fs::copy(local_path, remote_path).map(|_| ()).map_err(|e| {
            Error::transfer_failed(TransferFailedDetails {
                local_path: local_path.display().to_string(),
                remote_path: remote_path.to_string(),
                error: e.to_string(),
            })
        })
    }

    fn transfer_ready(&self) -> bool {
        self.open
    }

    fn endpoint(&self) -> String {
        "local".to_string()
    }

    fn close(&mut self) {
        self.open = false;
    }
}

pub fn execute_local_command(command: &str) -> CommandResult {
    #[cfg(windows)]
    let mut cmd = {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    };

    #[cfg(not(windows))]
    let mut cmd = {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    };

    match cmd.stdin(Stdio::null()).output() {
        Ok(out) => CommandResult {
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
        },
        Err(e) => CommandResult::transport_error(format!("Command error: {}", e)),
    }
}

/// Check if a host address refers to the local machine.
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}
