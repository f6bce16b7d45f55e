//! Script generation around the user's fragments.
//!
//! The preamble declares the exposed values as script variables, the
//! postamble copies the requested variables into the persistent tags under
//! keys private to one [`RunTag`].

use crate::{Error, Result};
use chrono::Utc;
use dmsync_format::{escape_identifier, escape_string, script_type_name, ScriptEncoder};
use dmsync_format::{TypeDef, TypeSpecifier, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Prefix of every identifier the generated code declares.
pub const RESERVED_PREFIX: &str = "__dmsync_";

const STORE_VAR: &str = "__dmsync_store";

static RUN_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique namespace for the shared store keys of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunTag(String);

impl RunTag {
    /// Generate a fresh tag from the current time, the process id and a
    /// process-wide counter.
    pub fn generate() -> Self {
        let seq = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!(
            "dmsync-{}-{}-{}",
            Utc::now().timestamp_millis(),
            std::process::id(),
            seq
        ))
    }

    /// The tag text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shared store key holding the variable `name` for this run.
    pub fn key(&self, name: &str) -> String {
        format!("{}.{}", self.0, escape_identifier(name))
    }
}

impl fmt::Display for RunTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A host value made available to the script as a variable.
#[derive(Debug, Clone)]
pub struct ExposedValue {
    /// Variable name, escaped when declared.
    pub name: String,
    /// The value.
    pub value: Value,
    /// Declared type, [`TypeSpecifier::Any`] to infer it from the value.
    pub ty: TypeSpecifier,
}

impl ExposedValue {
    /// Expose `value` with an inferred type.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::typed(name, value, TypeSpecifier::Any)
    }

    /// Expose `value` declared as `ty`.
    pub fn typed(name: impl Into<String>, value: impl Into<Value>, ty: TypeSpecifier) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ty,
        }
    }

    /// The type the variable is declared and read back with.
    pub fn effective_type(&self) -> TypeSpecifier {
        match self.ty {
            TypeSpecifier::Any => TypeSpecifier::of(&self.value),
            declared => declared,
        }
    }
}

/// A script variable to read back after execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalRequest {
    /// Script variable name.
    pub name: String,
    /// Host type to decode into, down to nested elements if needed.
    pub ty: TypeDef,
}

impl RetrievalRequest {
    /// Request `name` decoded as `ty`.
    pub fn new(name: impl Into<String>, ty: impl Into<TypeDef>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// Check that `names` are usable as distinct script identifiers.
///
/// DM-script identifiers are case-insensitive, so two names collide when
/// their escaped forms only differ in case.
pub fn validate_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for name in names {
        let ident = escape_identifier(name);
        if ident.is_empty() {
            return Err(dmsync_format::Error::InvalidIdentifier(name.to_string()).into());
        }
        let folded = ident.to_ascii_lowercase();
        if folded.starts_with(RESERVED_PREFIX) {
            return Err(Error::ReservedName(name.to_string()));
        }
        if let Some(other) = seen.insert(folded, name) {
            return Err(Error::DuplicateVariable {
                name: name.to_string(),
                other: other.to_string(),
            });
        }
    }
    Ok(())
}

/// Script declaring every exposed value, in order.
pub fn build_preamble(exposed: &[ExposedValue]) -> Result<String> {
    if exposed.is_empty() {
        return Ok(String::new());
    }
    let mut encoder = ScriptEncoder::new(RESERVED_PREFIX);
    for value in exposed {
        encoder.declare(&value.name, &value.value, value.ty)?;
    }
    Ok(format!(
        "// Setting variables from host values\n{}",
        encoder.into_script()
    ))
}

/// Script storing every requested variable under its private key.
///
/// Keys are addressed by label; positions in the persistent tags change
/// whenever another run removes its keys. A request for a variable the
/// executed script never declared makes the host fail at the corresponding
/// statement.
pub fn build_postamble(requests: &[RetrievalRequest], run_tag: &RunTag) -> Result<String> {
    if requests.is_empty() {
        return Ok(String::new());
    }
    let mut lines = vec![
        "// Synchronizing variables through the persistent tags".to_string(),
        format!("TagGroup {STORE_VAR} = GetPersistentTagGroup();"),
    ];
    for request in requests {
        // integers are stored as doubles, decoding rejects non-integral values
        let tag_type = match request.ty.root() {
            TypeSpecifier::Integer => "Double",
            ty => script_type_name(ty, false)?,
        };
        let ident = escape_identifier(&request.name);
        let key = escape_string(&run_tag.key(&request.name));
        lines.push(format!(
            "{STORE_VAR}.TagGroupSetTagAs{tag_type}(\"{key}\", {ident});"
        ));
    }
    Ok(lines.join("\n"))
}
