use dmsync_runtime::{HostError, HostErrorCode};
use thiserror::Error;

/// Errors from compiling or running a script.
#[derive(Error, Debug)]
pub enum Error {
    /// The script text could not be parsed.
    #[error("syntax error on line {line}: {message}")]
    Syntax {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        message: String,
    },

    /// A statement failed while running.
    #[error("runtime error on line {line}: {message}")]
    Runtime {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        message: String,
    },

    /// The script called `Throw`.
    #[error("script threw: {0}")]
    Thrown(String),

    /// The background thread running the script died.
    #[error("script thread panicked")]
    Panicked,
}

impl From<Error> for HostError {
    fn from(err: Error) -> Self {
        let code = match err {
            Error::Panicked => HostErrorCode::Unavailable,
            _ => HostErrorCode::ScriptError,
        };
        HostError::new(code, err.to_string())
    }
}

/// Result type for dmsync-host operations.
pub type Result<T> = std::result::Result<T, Error>;
