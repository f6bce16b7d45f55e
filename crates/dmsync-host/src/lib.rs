//! # dmsync-host
//!
//! An in-process DM-script host for running dmsync sessions without the
//! microscopy application.
//!
//! [`ScriptHost`] interprets the DM-script subset dmsync generates (plus the
//! usual control flow, arithmetic and `TagGroup` functions) and keeps its own
//! persistent global tags, so generated scripts can be run, inspected and
//! debugged offline.
//!
//! ## Example
//!
//! ```ignore
//! use dmsync_host::ScriptHost;
//! use dmsync_runtime::{SyncSession, TypeSpecifier};
//!
//! let host = ScriptHost::new();
//! let guard = SyncSession::new()
//!     .expose("a", 10)
//!     .expose("b", 20)
//!     .script_text("number c = a + b;")
//!     .read("c", TypeSpecifier::Integer)
//!     .run(&host)?;
//! assert_eq!(guard.get("c")?.as_integer(), Some(30));
//! ```

mod error;
mod host;
mod lexer;
mod parser;
mod runner;

pub use error::{Error, Result};

use dmsync_runtime::{HostBridge, HostError, TagGroup, TagValue, WaitHandle};
use host::HostState;
use std::sync::Arc;
use std::thread::JoinHandle;

/// DM-script host running scripts in-process.
///
/// Clones share the same persistent tags.
#[derive(Debug, Clone, Default)]
pub struct ScriptHost {
    state: Arc<HostState>,
}

impl ScriptHost {
    /// Create a host with empty persistent tags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and run `script` to completion.
    pub fn run(&self, script: &str) -> Result<()> {
        runner::run(&self.state, script)
    }

    /// Text the scripts wrote with `Result()` so far.
    pub fn output(&self) -> String {
        self.state.output().clone()
    }

    /// Return and clear the text written with `Result()`.
    pub fn take_output(&self) -> String {
        std::mem::take(&mut *self.state.output())
    }

    /// Labels of the top-level persistent tags.
    pub fn global_keys(&self) -> Vec<String> {
        self.state
            .persistent()
            .labels()
            .map(str::to_string)
            .collect()
    }

    /// Snapshot of the persistent tags.
    pub fn persistent_tags(&self) -> TagGroup {
        self.state.persistent().clone()
    }
}

impl HostBridge for ScriptHost {
    fn execute_script(&self, script: &str) -> std::result::Result<(), HostError> {
        self.run(script).map_err(|err| {
            tracing::warn!("script failed: {}", err);
            HostError::from(err)
        })
    }

    fn read_global(&self, key: &str) -> std::result::Result<Option<TagValue>, HostError> {
        Ok(self.state.persistent().get(key).cloned())
    }

    fn write_global(&self, key: &str, value: TagValue) -> std::result::Result<(), HostError> {
        self.state.persistent().set(key, value);
        Ok(())
    }

    fn delete_global(&self, key: &str) -> std::result::Result<(), HostError> {
        self.state.persistent().remove(key);
        Ok(())
    }

    fn execute_script_async(
        &self,
        script: &str,
    ) -> std::result::Result<Box<dyn WaitHandle>, HostError> {
        let host = self.clone();
        let script = script.to_string();
        let handle = std::thread::spawn(move || host.execute_script(&script));
        Ok(Box::new(ThreadHandle(handle)))
    }
}

/// Script running on a background thread.
struct ThreadHandle(JoinHandle<std::result::Result<(), HostError>>);

impl WaitHandle for ThreadHandle {
    fn wait(self: Box<Self>) -> std::result::Result<(), HostError> {
        self.0
            .join()
            .unwrap_or_else(|_| Err(HostError::from(Error::Panicked)))
    }
}
