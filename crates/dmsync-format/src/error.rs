use crate::TypeSpecifier;
use thiserror::Error;

/// Errors raised while mapping types or converting values.
#[derive(Debug, Error)]
pub enum Error {
    /// A type name or host type has no DM-script counterpart.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// A container to encode references itself.
    #[error("cyclic value at {path}")]
    Cyclic {
        /// Location of the container that closes the cycle.
        path: String,
    },

    /// A value does not fit the declared type.
    #[error("type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Location of the offending value.
        path: String,
        /// The declared type.
        expected: TypeSpecifier,
        /// Description of what was actually there.
        found: String,
    },

    /// An integer the target tag or `number` cannot hold exactly.
    #[error("integer {value} at {path} is out of range (limit {limit})")]
    OutOfRange {
        /// Location of the offending value.
        path: String,
        /// The integer.
        value: i64,
        /// Largest magnitude allowed at this position.
        limit: i64,
    },

    /// A variable name escapes to an empty identifier.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}

impl Error {
    pub(crate) fn mismatch(
        path: &str,
        expected: TypeSpecifier,
        found: impl Into<String>,
    ) -> Self {
        Error::TypeMismatch {
            path: path.to_string(),
            expected,
            found: found.into(),
        }
    }
}

/// Result type for dmsync-format operations.
pub type Result<T> = std::result::Result<T, Error>;
