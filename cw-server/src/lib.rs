//! # cw-server
//!
//! Control core of the cw workspace daemon. It registers user projects,
//! schedules their builds under a global concurrency cap, supervises the
//! per-project file-watcher child processes, and reports status and queue
//! ranks to the portal.
//!
//! The daemon is wired together in `main`; everything here is also driven
//! directly by the integration tests.

pub mod bus;
pub mod ipc;
pub mod layout;
pub mod lifecycle;
pub mod scheduler;
pub mod status;
pub mod store;
pub mod watcher;
