use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationMissingArgument,
    ValidationInvalidArgument,
    ValidationInvalidJson,

    ProfileNotFound,

    SshAuthFailed,
    SshConnectFailed,
    SshIdentityFileNotFound,

    RemotePathNotFound,
    RemoteListFailed,
    RemoteCommandFailed,

    BackupSourceNotFound,
    BackupVerificationFailed,
    BackupNameCollision,

    TransferFailed,

    SafetyUnsafeTargetPath,

    RollbackVerificationFailed,

    PackageNotFound,
    PackageInvalidArchive,
    PackageSubdirNotFound,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",
            ErrorCode::ValidationInvalidJson => "validation.invalid_json",

            ErrorCode::ProfileNotFound => "profile.not_found",

            ErrorCode::SshAuthFailed => "ssh.auth_failed",
            ErrorCode::SshConnectFailed => "ssh.connect_failed",
            ErrorCode::SshIdentityFileNotFound => "ssh.identity_file_not_found",

            ErrorCode::RemotePathNotFound => "remote.path_not_found",
            ErrorCode::RemoteListFailed => "remote.list_failed",
            ErrorCode::RemoteCommandFailed => "remote.command_failed",

            ErrorCode::BackupSourceNotFound => "backup.source_not_found",
            ErrorCode::BackupVerificationFailed => "backup.verification_failed",
            ErrorCode::BackupNameCollision => "backup.name_collision",

            ErrorCode::TransferFailed => "transfer.failed",

            ErrorCode::SafetyUnsafeTargetPath => "safety.unsafe_target_path",

            ErrorCode::RollbackVerificationFailed => "rollback.verification_failed",

            ErrorCode::PackageNotFound => "package.not_found",
            ErrorCode::PackageInvalidArchive => "package.invalid_archive",
            ErrorCode::PackageSubdirNotFound => "package.subdir_not_found",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectFailedDetails {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCommandFailedDetails {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePathDetails {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferFailedDetails {
    pub local_path: String,
    pub remote_path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsafeTargetDetails {
    pub path: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projects_root: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        Self::new(
            ErrorCode::ValidationMissingArgument,
            "Missing required argument",
            serde_json::json!({ "args": args }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let problem = problem.into();
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.clone(),
            id,
            tried,
        });

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            format!("Invalid argument: {}", problem),
            details,
        )
    }

    pub fn validation_invalid_json(err: serde_json::Error, context: Option<String>) -> Self {
        let details = serde_json::json!({
            "error": err.to_string(),
            "context": context,
        });

        Self::new(ErrorCode::ValidationInvalidJson, "Invalid JSON", details)
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = serde_json::json!({
            "key": key.into(),
            "value": value,
            "problem": problem.into(),
        });

        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            details,
        )
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        let details = serde_json::json!({
            "path": path.into(),
            "error": err.to_string(),
        });

        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            details,
        )
    }

    pub fn profile_not_found(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(
            ErrorCode::ProfileNotFound,
            format!("Connection profile '{}' not found", name),
            serde_json::json!({ "id": name }),
        )
        .with_hint("Run 'dropship profile set <name> --host ... --user ...' to create one")
    }

    pub fn ssh_auth_failed(details: ConnectFailedDetails) -> Self {
        let message = format!(
            "Authentication failed for {}@{}:{}",
            details.user, details.host, details.port
        );
        Self::new(ErrorCode::SshAuthFailed, message, to_details(details))
    }

    pub fn ssh_connect_failed(details: ConnectFailedDetails) -> Self {
        let message = format!(
            "Could not connect to {}@{}:{}",
            details.user, details.host, details.port
        );
        let mut err = Self::new(ErrorCode::SshConnectFailed, message, to_details(details));
        err.retryable = Some(true);
        err
    }

    pub fn ssh_identity_file_not_found(identity_file: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::SshIdentityFileNotFound,
            "SSH identity file not found",
            serde_json::json!({ "identityFile": identity_file.into() }),
        )
    }

    pub fn remote_path_not_found(path: impl Into<String>, stderr: Option<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::RemotePathNotFound,
            format!("Remote path does not exist: {}", path),
            to_details(RemotePathDetails { path, stderr }),
        )
    }

    pub fn remote_list_failed(path: impl Into<String>, stderr: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::RemoteListFailed,
            format!("Failed to list remote directory: {}", path),
            to_details(RemotePathDetails {
                path,
                stderr: Some(stderr.into()),
            }),
        )
    }

    pub fn remote_command_failed(
        message: impl Into<String>,
        details: RemoteCommandFailedDetails,
    ) -> Self {
        Self::new(ErrorCode::RemoteCommandFailed, message, to_details(details))
    }

    pub fn backup_source_not_found(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::BackupSourceNotFound,
            format!("Project directory does not exist: {}", path),
            to_details(RemotePathDetails { path, stderr: None }),
        )
    }

    pub fn backup_verification_failed(path: impl Into<String>, stderr: impl Into<String>) -> Self {
        let path = path.into();
        let stderr = stderr.into();
        Self::new(
            ErrorCode::BackupVerificationFailed,
            format!("Post-check did not confirm {}", path),
            to_details(RemotePathDetails {
                path,
                stderr: (!stderr.is_empty()).then_some(stderr),
            }),
        )
    }

    pub fn backup_name_collision(path: impl Into<String>) -> Self {
        let path = path.into();
        let mut err = Self::new(
            ErrorCode::BackupNameCollision,
            format!("Backup archive already exists: {}", path),
            to_details(RemotePathDetails { path, stderr: None }),
        );
        err.retryable = Some(true);
        err
    }

    pub fn transfer_failed(details: TransferFailedDetails) -> Self {
        let message = format!(
            "Upload failed: {} -> {}",
            details.local_path, details.remote_path
        );
        Self::new(ErrorCode::TransferFailed, message, to_details(details))
    }

    pub fn unsafe_target_path(details: UnsafeTargetDetails) -> Self {
        let message = format!("Refusing destructive operation on '{}'", details.path);
        Self::new(ErrorCode::SafetyUnsafeTargetPath, message, to_details(details))
    }

    pub fn rollback_verification_failed(path: impl Into<String>, stderr: impl Into<String>) -> Self {
        let path = path.into();
        let stderr = stderr.into();
        Self::new(
            ErrorCode::RollbackVerificationFailed,
            format!("Restored directory not found after extraction: {}", path),
            to_details(RemotePathDetails {
                path,
                stderr: (!stderr.is_empty()).then_some(stderr),
            }),
        )
    }

    pub fn package_not_found(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::PackageNotFound,
            format!("Local package not found: {}", path),
            serde_json::json!({ "path": path }),
        )
    }

    pub fn package_invalid_archive(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::PackageInvalidArchive,
            "Local package is not a readable zip archive",
            serde_json::json!({ "path": path.into(), "error": error.into() }),
        )
    }

    pub fn package_subdir_not_found(subdir: impl Into<String>) -> Self {
        let subdir = subdir.into();
        Self::new(
            ErrorCode::PackageSubdirNotFound,
            format!("Sub-directory '{}' not found in package", subdir),
            serde_json::json!({ "subdir": subdir }),
        )
        .with_hint("Pass --subdir . to deploy the package root")
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalIoError,
            "IO error",
            to_details(InternalIoErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalJsonError,
            "JSON error",
            serde_json::json!({ "error": error.into(), "context": context }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::internal_unexpected(message)
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// Attach one extra key to `details`, wrapping non-object details.
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        if !self.details.is_object() {
            let previous = std::mem::take(&mut self.details);
            self.details = if previous.is_null() {
                serde_json::json!({})
            } else {
                serde_json::json!({ "context": previous })
            };
        }
        if let Value::Object(map) = &mut self.details {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    /// Record the orchestration state the error surfaced in.
    pub fn at_step(self, step: &str) -> Self {
        self.with_detail("step", step)
    }

    pub fn step(&self) -> Option<&str> {
        self.details.get("step").and_then(Value::as_str)
    }
}
