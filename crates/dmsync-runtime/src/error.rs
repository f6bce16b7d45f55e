use crate::bridge::HostError;
use thiserror::Error;

/// Errors raised while planning, running or reading back a synchronization.
#[derive(Debug, Error)]
pub enum Error {
    /// Type mapping or value conversion failed.
    #[error("format error: {0}")]
    Format(#[from] dmsync_format::Error),

    /// A requested variable was not written back by the script.
    #[error("variable `{0}` was not written back by the script")]
    MissingVariable(String),

    /// Some requested variables were not written back and all were required.
    #[error("variables not written back by the script: {}", .0.join(", "))]
    MissingVariables(Vec<String>),

    /// The name was never requested for read-back.
    #[error("`{0}` is not a synchronized variable")]
    KeyNotFound(String),

    /// The host rejected the script. Hosts only report a category, so the
    /// contained error carries no detail about the failing statement.
    #[error("script execution failed ({0}); the host reports no further detail")]
    ScriptExecutionFailed(HostError),

    /// Deleting shared store keys failed during cleanup.
    #[error("could not remove {} shared store key(s): {}", .keys.len(), .keys.join(", "))]
    CleanupPartialFailure {
        /// Keys that are still present.
        keys: Vec<String>,
    },

    /// Two names map to the same script identifier.
    #[error("variable `{name}` collides with `{other}`")]
    DuplicateVariable {
        /// The rejected name.
        name: String,
        /// The name it collides with.
        other: String,
    },

    /// The name uses the prefix reserved for generated code.
    #[error("`{0}` uses the reserved prefix `__dmsync_`")]
    ReservedName(String),

    /// A store access through the host bridge failed.
    #[error("host error: {0}")]
    Host(HostError),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid options file.
    #[error("config error: {0}")]
    Config(String),
}

/// Result type for dmsync-runtime operations.
pub type Result<T> = std::result::Result<T, Error>;
