//! Generic utility primitives with zero domain knowledge.
//!
//! - `io` - Local file reads and atomic JSON writes
//! - `remote_path` - POSIX path joining and containment checks
//! - `shell` - Shell escaping and quoting
//! - `validation` - Input and target-path validation helpers

pub mod io;
pub mod remote_path;
pub mod shell;
pub mod validation;
