//! Shared utilities for the cw workspace daemon.

/// Environment variable readers.
pub mod env;
/// Filesystem utilities.
pub mod fs;
/// Process table scanning, killing and detached spawn.
pub mod process;
