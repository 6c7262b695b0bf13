//! Input validation primitives.
//!
//! Besides the generic helpers, this holds the guards every destructive
//! remote operation runs before issuing a command: project-name checks and
//! the target-path safety threshold.

use crate::error::{Error, Result, UnsafeTargetDetails};
use crate::utils::remote_path;

/// Require a string to be non-empty after trimming.
///
/// Returns a reference to the trimmed string on success.
pub fn require_non_empty<'a>(value: &'a str, field: &str, message: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(Error::validation_invalid_argument(field, message, None, None))
    } else {
        Ok(trimmed)
    }
}

/// Validate a project name: a single path segment, never `.`/`..`.
pub fn require_project_name(name: &str) -> Result<&str> {
    let problem = if name.is_empty() {
        Some("Project name cannot be empty")
    } else if name == "." || name == ".." {
        Some("Project name cannot be a relative path segment")
    } else if name.contains('/') || name.contains('\0') {
        Some("Project name must be a single path segment")
    } else if name.trim() != name {
        Some("Project name cannot have leading or trailing whitespace")
    } else {
        None
    };

    match problem {
        Some(problem) => Err(Error::validation_invalid_argument(
            "project",
            problem,
            Some(name.to_string()),
            None,
        )),
        None => Ok(name),
    }
}

/// Refuse dangerously short target paths.
///
/// This is a length threshold, not a containment check; see
/// [`require_within_root`] for the stronger guard.
pub fn require_safe_target(path: &str, min_len: usize) -> Result<()> {
    if path.chars().count() < min_len {
        return Err(Error::unsafe_target_path(UnsafeTargetDetails {
            path: path.to_string(),
            problem: format!("Target path is shorter than {} characters", min_len),
            min_length: Some(min_len),
            projects_root: None,
        }));
    }
    Ok(())
}

/// Refuse targets that are not strictly below the configured projects root.
pub fn require_within_root(path: &str, projects_root: &str) -> Result<()> {
    if !remote_path::is_strict_descendant(path, projects_root) {
        return Err(Error::unsafe_target_path(UnsafeTargetDetails {
            path: path.to_string(),
            problem: "Target path is not inside the projects root".to_string(),
            min_length: None,
            projects_root: Some(projects_root.to_string()),
        }));
    }
    Ok(())
}
