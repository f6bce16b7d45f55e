use crate::{Error, Result, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Host-side type category of a synchronized value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeSpecifier {
    /// Whole number.
    Integer,
    /// Floating point number.
    Real,
    /// Truth value.
    Boolean,
    /// Character string.
    Text,
    /// Ordered sequence (a DM-script `TagList`).
    List,
    /// Keyed mapping (a DM-script `TagGroup`).
    Group,
    /// No declared type; decoding follows the stored value.
    Any,
}

struct TypeEntry {
    ty: TypeSpecifier,
    /// Type used in `TagGroup*As<type>` calls.
    tag_type: &'static str,
    /// Keyword used to declare a script variable.
    declaration: &'static str,
    /// Accepted aliases, compared case-insensitively.
    names: &'static [&'static str],
}

const TYPE_MAP: &[TypeEntry] = &[
    TypeEntry {
        ty: TypeSpecifier::Integer,
        tag_type: "Long",
        declaration: "number",
        names: &["integer", "int", "long", "short", "uint16", "uint32"],
    },
    TypeEntry {
        ty: TypeSpecifier::Real,
        tag_type: "Double",
        declaration: "number",
        names: &[
            "real",
            "float",
            "double",
            "decimal",
            "realnumber",
            "number",
        ],
    },
    TypeEntry {
        ty: TypeSpecifier::Boolean,
        tag_type: "Boolean",
        declaration: "number",
        names: &["boolean", "bool"],
    },
    TypeEntry {
        ty: TypeSpecifier::Text,
        tag_type: "String",
        declaration: "string",
        names: &["text", "string", "str"],
    },
    TypeEntry {
        ty: TypeSpecifier::Group,
        tag_type: "TagGroup",
        declaration: "TagGroup",
        names: &["group", "taggroup", "dict", "map", "mapping"],
    },
    TypeEntry {
        ty: TypeSpecifier::List,
        tag_type: "TagGroup",
        declaration: "TagGroup",
        names: &["list", "taglist", "sequence", "tuple"],
    },
];

fn type_entry(ty: TypeSpecifier) -> Option<&'static TypeEntry> {
    TYPE_MAP.iter().find(|def| def.ty == ty)
}

impl TypeSpecifier {
    /// Infer the category of a host value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Integer(_) => TypeSpecifier::Integer,
            Value::Real(_) => TypeSpecifier::Real,
            Value::Boolean(_) => TypeSpecifier::Boolean,
            Value::Text(_) => TypeSpecifier::Text,
            Value::List(_) => TypeSpecifier::List,
            Value::Map(_) => TypeSpecifier::Group,
        }
    }

    /// Whether values of this type are stored in a `TagGroup` container.
    pub fn is_container(self) -> bool {
        matches!(self, TypeSpecifier::List | TypeSpecifier::Group)
    }

    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            TypeSpecifier::Integer => "integer",
            TypeSpecifier::Real => "real",
            TypeSpecifier::Boolean => "boolean",
            TypeSpecifier::Text => "text",
            TypeSpecifier::List => "list",
            TypeSpecifier::Group => "group",
            TypeSpecifier::Any => "any",
        }
    }
}

impl fmt::Display for TypeSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TypeSpecifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        host_type(s)
    }
}

/// Get the DM-script type name for `ty`.
///
/// With `for_declaration` the keyword used to declare a variable is returned
/// (booleans declare as `number`); otherwise the name used in
/// `TagGroupSetTagAs<type>` style calls (`Boolean`, `Long`, ...). Lists and
/// groups both map to `TagGroup`.
pub fn script_type_name(ty: TypeSpecifier, for_declaration: bool) -> Result<&'static str> {
    let def = type_entry(ty).ok_or_else(|| Error::UnsupportedType(ty.to_string()))?;
    Ok(if for_declaration {
        def.declaration
    } else {
        def.tag_type
    })
}

/// Like [`script_type_name`], resolving `name` through the alias table first.
pub fn script_type_name_for(name: &str, for_declaration: bool) -> Result<&'static str> {
    script_type_name(host_type(name)?, for_declaration)
}

/// Resolve a type name or alias (case-insensitive) to its host category.
pub fn host_type(name: &str) -> Result<TypeSpecifier> {
    let lowered = name.trim().to_ascii_lowercase();
    if lowered == "any" || lowered == "auto" {
        return Ok(TypeSpecifier::Any);
    }

    TYPE_MAP
        .iter()
        .find(|def| def.names.contains(&lowered.as_str()))
        .map(|def| def.ty)
        .ok_or_else(|| Error::UnsupportedType(name.to_string()))
}
