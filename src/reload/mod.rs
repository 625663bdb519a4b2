//! Live reload of the credential file.
//!
//! The watcher turns file-system events into `ReloadSignal`s on a bounded
//! queue; the coordinator drains that queue and swaps freshly loaded
//! mappings into the store. Both stop on the shared cancellation token.

pub mod coordinator;
pub mod watcher;

pub use coordinator::ReloadCoordinator;
pub use watcher::{ReloadWatcher, WatchError, WatchScope};

/// "The credential file may have changed."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadSignal;
