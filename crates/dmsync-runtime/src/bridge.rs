//! The narrow interface to the application hosting the DM-script interpreter.
//!
//! The engine only ever talks to the host through [`HostBridge`]: execute a
//! script, and read, write or delete a value in the persistent global tags.
//! Everything else about the host is opaque.

use dmsync_format::TagValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error categories a host reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostErrorCode {
    /// The script failed to compile or threw while running.
    ScriptError,
    /// The host is not reachable.
    Unavailable,
    /// Accessing the global tags failed.
    StoreError,
    /// The host does not offer the requested capability.
    Unsupported,
}

/// Error information from the host.
///
/// Hosts report a category and, at best, a generic message. Only the code is
/// meant to be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostError {
    /// Error code.
    pub code: HostErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl HostError {
    /// Create a new host error.
    pub fn new(code: HostErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for HostError {}

/// Access to a DM-script host.
pub trait HostBridge {
    /// Run `script` to completion.
    fn execute_script(&self, script: &str) -> Result<(), HostError>;

    /// Read the persistent global tag `key`, `None` if it does not exist.
    fn read_global(&self, key: &str) -> Result<Option<TagValue>, HostError>;

    /// Create or replace the persistent global tag `key`.
    fn write_global(&self, key: &str, value: TagValue) -> Result<(), HostError>;

    /// Delete the persistent global tag `key`. Deleting a missing key succeeds.
    fn delete_global(&self, key: &str) -> Result<(), HostError>;

    /// Submit `script` for execution without waiting for it.
    ///
    /// Hosts without background execution keep the default, which refuses.
    fn execute_script_async(&self, script: &str) -> Result<Box<dyn WaitHandle>, HostError> {
        let _ = script;
        Err(HostError::new(
            HostErrorCode::Unsupported,
            "asynchronous execution is not supported by this host",
        ))
    }
}

/// Completion handle of an asynchronously submitted script.
pub trait WaitHandle: Send {
    /// Block until the host signals that the script finished.
    fn wait(self: Box<Self>) -> Result<(), HostError>;
}
