//! Host-native values exchanged with DM-script.
//!
//! Containers are shared handles: cloning a [`List`] or [`Map`] clones the
//! reference, not the contents, so a container can end up (directly or
//! indirectly) inside itself. The codec detects such cycles instead of
//! recursing forever.

use crate::{Error, Result};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A host-native value.
#[derive(Clone)]
pub enum Value {
    /// Whole number.
    Integer(i64),
    /// Floating point number, including infinities and NaN.
    Real(f64),
    /// Truth value.
    Boolean(bool),
    /// Character string.
    Text(String),
    /// Ordered sequence.
    List(List),
    /// Mapping with string keys, iterated in key order.
    Map(Map),
}

/// Shared, mutable ordered sequence of values.
#[derive(Clone, Default)]
pub struct List(Arc<RwLock<Vec<Value>>>);

/// Shared, mutable mapping from string keys to values.
#[derive(Clone, Default)]
pub struct Map(Arc<RwLock<BTreeMap<String, Value>>>);

impl List {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value.
    pub fn push(&self, value: impl Into<Value>) {
        self.write().push(value.into());
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the list has no elements.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Element at `index`.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.read().get(index).cloned()
    }

    /// Snapshot of the elements (nested containers stay shared).
    pub fn to_vec(&self) -> Vec<Value> {
        self.read().clone()
    }

    /// Whether both handles point to the same list.
    pub fn ptr_eq(&self, other: &List) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Value>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Value>> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Map {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value at `key`.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.write().insert(key.into(), value.into())
    }

    /// Value at `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Snapshot of the entries in key order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Whether both handles point to the same map.
    pub fn ptr_eq(&self, other: &Map) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Value>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Value>> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Value {
    /// Build a list value from its elements.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let list = List::new();
        for item in items {
            list.push(item);
        }
        Value::List(list)
    }

    /// Build a map value from key/value pairs.
    pub fn map<I, K, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Value>,
    {
        let map = Map::new();
        for (key, value) in entries {
            map.insert(key, value);
        }
        Value::Map(map)
    }

    /// Integer content.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric content, widening integers.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Real(x) => Some(*x),
            _ => None,
        }
    }

    /// Boolean content.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Text content.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// List handle.
    pub fn as_list(&self) -> Option<&List> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    /// Map handle.
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Short description of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Boolean(_) => "boolean",
            Value::Text(_) => "text",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Convert a JSON document. `null` has no DM-script counterpart.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        Ok(match json {
            serde_json::Value::Null => return Err(Error::UnsupportedType("null".to_string())),
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Real(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                let list = List::new();
                for item in items {
                    list.push(Value::from_json(item)?);
                }
                Value::List(list)
            }
            serde_json::Value::Object(entries) => {
                let map = Map::new();
                for (key, item) in entries {
                    map.insert(key, Value::from_json(item)?);
                }
                Value::Map(map)
            }
        })
    }

    /// Convert to a JSON document. Non-finite reals become `null`.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        self.to_json_at(&mut Vec::new(), "$")
    }

    fn to_json_at(&self, open: &mut Vec<usize>, path: &str) -> Result<serde_json::Value> {
        Ok(match self {
            Value::Integer(n) => serde_json::Value::from(*n),
            Value::Real(x) => serde_json::Number::from_f64(*x)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::List(list) => {
                enter(open, list.id(), path)?;
                let mut items = Vec::with_capacity(list.len());
                for (i, item) in list.to_vec().iter().enumerate() {
                    items.push(item.to_json_at(open, &format!("{path}[{i}]"))?);
                }
                open.pop();
                serde_json::Value::Array(items)
            }
            Value::Map(map) => {
                enter(open, map.id(), path)?;
                let mut object = serde_json::Map::new();
                for (key, item) in map.entries() {
                    let json = item.to_json_at(open, &format!("{path}.{key}"))?;
                    object.insert(key, json);
                }
                open.pop();
                serde_json::Value::Object(object)
            }
        })
    }
}

/// Push `id` onto the stack of open containers, failing if it is already open.
pub(crate) fn enter(open: &mut Vec<usize>, id: usize, path: &str) -> Result<()> {
    if open.contains(&id) {
        return Err(Error::Cyclic {
            path: path.to_string(),
        });
    }
    open.push(id);
    Ok(())
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => a.ptr_eq(b) || a.to_vec() == b.to_vec(),
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b) || a.entries() == b.entries(),
            _ => false,
        }
    }
}

thread_local! {
    static DEBUG_OPEN: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Formats a container unless it is already being formatted further up.
fn debug_container(
    id: usize,
    f: &mut fmt::Formatter<'_>,
    body: impl FnOnce(&mut fmt::Formatter<'_>) -> fmt::Result,
) -> fmt::Result {
    let cyclic = DEBUG_OPEN.with(|open| {
        let mut open = open.borrow_mut();
        if open.contains(&id) {
            true
        } else {
            open.push(id);
            false
        }
    });
    if cyclic {
        return f.write_str("<cycle>");
    }
    let result = body(f);
    DEBUG_OPEN.with(|open| open.borrow_mut().retain(|&open_id| open_id != id));
    result
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_container(self.id(), f, |f| f.debug_list().entries(self.to_vec()).finish())
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_container(self.id(), f, |f| f.debug_map().entries(self.entries()).finish())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            Value::Real(x) => write!(f, "{x:?}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::List(list) => list.fmt(f),
            Value::Map(map) => map.fmt(f),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n.into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Real(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<List> for Value {
    fn from(list: List) -> Self {
        Value::List(list)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::list(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn containers_share_on_clone() {
        let list = List::new();
        let alias = list.clone();
        alias.push(1);
        assert_eq!(list.len(), 1);
        assert!(list.ptr_eq(&alias));
    }

    #[test]
    fn json_conversion_keeps_integers() {
        let value = Value::from_json(json!({"a": 1, "b": [1.5, "x", true]})).unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map.get("a"), Some(Value::Integer(1)));
        assert_eq!(
            map.get("b"),
            Some(Value::list(vec![
                Value::Real(1.5),
                Value::from("x"),
                Value::Boolean(true)
            ]))
        );
        assert_eq!(value.to_json().unwrap(), json!({"a": 1, "b": [1.5, "x", true]}));
    }

    #[test]
    fn json_null_is_rejected() {
        assert!(matches!(
            Value::from_json(json!([1, null])),
            Err(Error::UnsupportedType(_))
        ));
    }

    #[test]
    fn debug_output_survives_cycles() {
        let map = Map::new();
        map.insert("self", map.clone());
        let text = format!("{:?}", Value::Map(map.clone()));
        assert_eq!(text, r#"{"self": <cycle>}"#);
        assert!(matches!(
            Value::Map(map).to_json(),
            Err(Error::Cyclic { .. })
        ));
    }
}
