//! Structure definitions for read-back values.
//!
//! A stored `TagGroup` does not say whether it was built as a list or a
//! group, nor which numeric type its elements had. A [`TypeDef`] fixes both
//! for every position the caller cares about.

use crate::types::host_type;
use crate::{Error, Result, TypeSpecifier};

/// Expected type of a value, optionally down to every nested element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDef {
    /// A single category. Containers given this way decode their elements
    /// from the stored tags.
    Scalar(TypeSpecifier),
    /// A `TagList` whose elements at the given indices have these types.
    List(Vec<TypeDef>),
    /// A `TagGroup` whose tags with the given labels have these types.
    Group(Vec<(String, TypeDef)>),
}

impl TypeDef {
    /// List definition, one entry per index.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeDef>,
    {
        TypeDef::List(items.into_iter().map(Into::into).collect())
    }

    /// Group definition from label/type pairs.
    pub fn group<I, K, T>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<TypeDef>,
    {
        TypeDef::Group(
            fields
                .into_iter()
                .map(|(key, ty)| (key.into(), ty.into()))
                .collect(),
        )
    }

    /// Category of the outermost value.
    pub fn root(&self) -> TypeSpecifier {
        match self {
            TypeDef::Scalar(ty) => *ty,
            TypeDef::List(_) => TypeSpecifier::List,
            TypeDef::Group(_) => TypeSpecifier::Group,
        }
    }

    /// Read a definition from JSON: a type name, an array of definitions or
    /// an object mapping labels to definitions.
    ///
    /// `{"name": "text", "shape": ["int", "int"]}`
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::String(name) => host_type(name).map(TypeDef::Scalar),
            serde_json::Value::Array(items) => items
                .iter()
                .map(TypeDef::from_json)
                .collect::<Result<Vec<_>>>()
                .map(TypeDef::List),
            serde_json::Value::Object(fields) => fields
                .iter()
                .map(|(key, item)| Ok((key.clone(), TypeDef::from_json(item)?)))
                .collect::<Result<Vec<_>>>()
                .map(TypeDef::Group),
            other => Err(Error::UnsupportedType(other.to_string())),
        }
    }

    /// Parse a type name, or a JSON definition when `text` starts with `[`
    /// or `{`.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            let json: serde_json::Value = serde_json::from_str(trimmed)
                .map_err(|err| Error::UnsupportedType(format!("{trimmed} ({err})")))?;
            Self::from_json(&json)
        } else {
            host_type(trimmed).map(TypeDef::Scalar)
        }
    }
}

impl From<TypeSpecifier> for TypeDef {
    fn from(ty: TypeSpecifier) -> Self {
        TypeDef::Scalar(ty)
    }
}

impl PartialEq<TypeSpecifier> for TypeDef {
    fn eq(&self, other: &TypeSpecifier) -> bool {
        matches!(self, TypeDef::Scalar(ty) if ty == other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_definitions_nest() {
        let def = TypeDef::from_json(&json!({"name": "str", "shape": ["int", "Double"]})).unwrap();
        assert_eq!(
            def,
            TypeDef::group([
                ("name", TypeDef::from(TypeSpecifier::Text)),
                (
                    "shape",
                    TypeDef::list([TypeSpecifier::Integer, TypeSpecifier::Real])
                ),
            ])
        );
        assert_eq!(def.root(), TypeSpecifier::Group);
    }

    #[test]
    fn parse_accepts_names_and_json() {
        assert_eq!(TypeDef::parse(" Long ").unwrap(), TypeSpecifier::Integer);
        assert_eq!(
            TypeDef::parse("[\"text\", \"any\"]").unwrap(),
            TypeDef::list([TypeSpecifier::Text, TypeSpecifier::Any])
        );
        assert!(matches!(
            TypeDef::parse("{\"a\": 3}"),
            Err(Error::UnsupportedType(_))
        ));
        assert!(matches!(TypeDef::parse("[1,"), Err(Error::UnsupportedType(_))));
    }
}
