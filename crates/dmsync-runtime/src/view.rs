use crate::{Error, Result};
use dmsync_format::{TypeDef, Value};

/// One requested variable and what was read back for it.
#[derive(Debug, Clone)]
struct Entry {
    name: String,
    ty: TypeDef,
    value: Option<Value>,
}

/// Read-only view of the variables read back from a script.
///
/// Variables keep the order in which they were requested. A variable the
/// script never wrote back is recorded as missing rather than given a
/// default value.
#[derive(Debug, Clone, Default)]
pub struct SynchronizedVars {
    entries: Vec<Entry>,
}

impl SynchronizedVars {
    pub(crate) fn push(&mut self, name: &str, ty: TypeDef, value: Option<Value>) {
        self.entries.push(Entry {
            name: name.to_string(),
            ty,
            value,
        });
    }

    /// Value of the variable `name`.
    ///
    /// Fails with [`Error::KeyNotFound`] if `name` was not requested and with
    /// [`Error::MissingVariable`] if the script did not write it back.
    pub fn get(&self, name: &str) -> Result<&Value> {
        let entry = self
            .entry(name)
            .ok_or_else(|| Error::KeyNotFound(name.to_string()))?;
        entry
            .value
            .as_ref()
            .ok_or_else(|| Error::MissingVariable(entry.name.clone()))
    }

    /// Value of the variable `name`, `None` if it is missing or unknown.
    pub fn try_get(&self, name: &str) -> Option<&Value> {
        self.entry(name).and_then(|entry| entry.value.as_ref())
    }

    /// Type the variable `name` was requested with.
    pub fn requested_type(&self, name: &str) -> Option<&TypeDef> {
        self.entry(name).map(|entry| &entry.ty)
    }

    /// Whether `name` was requested.
    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Whether `name` was requested but not written back.
    pub fn is_missing(&self, name: &str) -> bool {
        self.entry(name).is_some_and(|entry| entry.value.is_none())
    }

    /// Names of requested variables that were not written back.
    pub fn missing(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.value.is_none())
            .map(|entry| entry.name.as_str())
            .collect()
    }

    /// Requested names, in request order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// Variables that were read back, in request order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.value.as_ref().map(|value| (entry.name.as_str(), value)))
    }

    /// Number of requested variables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was requested.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.name == name)
    }
}
