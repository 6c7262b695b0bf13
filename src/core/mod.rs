// Domain modules
pub mod archive;
pub mod deploy;
pub mod listing;
pub mod package;
pub mod profile;
pub mod progress;
pub mod remote_fs;
pub mod rollback;
pub mod ssh;

// Ambient modules
pub mod defaults;
pub mod error;
pub mod keychain;
pub mod paths;
pub mod telemetry;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
