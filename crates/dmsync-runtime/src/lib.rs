//! # dmsync-runtime
//!
//! Synchronizes variables between a host program and DM-script.
//!
//! This crate provides:
//! - The [`HostBridge`] interface to the application running DM-script
//! - Script planning: exposed values become declarations, requested
//!   variables are copied into the persistent tags under private keys
//! - [`SyncSession`], which executes the combined script, reads the
//!   variables back and always removes the private keys again
//!
//! ## Example
//!
//! ```ignore
//! use dmsync_runtime::{SyncSession, TypeSpecifier, Value};
//!
//! let sum = SyncSession::new()
//!     .expose("a", 10)
//!     .expose("b", 20)
//!     .script_text("number c = a + b;")
//!     .read("c", TypeSpecifier::Integer)
//!     .with(&host, |vars| vars.get("c").ok().and_then(Value::as_integer))?;
//! assert_eq!(sum, Some(30));
//! ```

mod bridge;
mod config;
mod error;
mod plan;
mod session;
mod source;
mod view;

pub use bridge::{HostBridge, HostError, HostErrorCode, WaitHandle};
pub use config::{default_debug_file, SyncOptions, DEFAULT_DEBUG_FILE_NAME};
pub use error::{Error, Result};
pub use plan::{
    build_postamble, build_preamble, validate_names, ExposedValue, RetrievalRequest, RunTag,
    RESERVED_PREFIX,
};
pub use session::{
    synchronize, CleanupReport, PendingSync, Phase, PlannedRead, RenderedScript, SyncGuard,
    SyncSession,
};
pub use source::{strip_ignore_blocks, ScriptSource, IGNORE_END, IGNORE_START};
pub use view::SynchronizedVars;

// Re-export the data layer for convenience
pub use dmsync_format::{
    decode_standalone, decode_typed, encode_standalone, escape_identifier, escape_string,
    from_tag_group, host_type, script_type_name, script_type_name_for, to_tag_group, List, Map,
    Tag, TagGroup, TagValue, TypeDef, TypeSpecifier, Value, MAX_EXACT_INTEGER,
};
