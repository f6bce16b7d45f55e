//! Conversion between host values and DM-script.
//!
//! Two directions are covered:
//!
//! - [`ScriptEncoder`] turns host values into DM-script statements that
//!   declare a variable holding an equivalent value.
//! - [`encode_standalone`] / [`decode_standalone`] convert between host values
//!   and already materialized [`TagGroup`]s, e.g. values read back from the
//!   persistent tags.
//!
//! Lists and groups look the same once stored in a `TagGroup`, so decoding
//! always takes the expected type from the caller. [`decode_typed`] follows a
//! [`TypeDef`] down to every nested element; positions it leaves open fall
//! back to the stored tag types and the list flag recorded on the container.
//!
//! Integers are only encoded where they survive unchanged: nested elements
//! become `Long` tags and must fit 32 bits, top-level values become DM-script
//! `number`s and must stay within [`MAX_EXACT_INTEGER`].

use crate::escape::{escape_identifier, escape_string};
use crate::types::script_type_name;
use crate::value::enter;
use crate::{Error, Result, TagGroup, TagValue, TypeDef, TypeSpecifier, Value};

/// Largest integer magnitude a DM-script `number` holds exactly.
pub const MAX_EXACT_INTEGER: i64 = 1 << 53;

/// Integers at the top level are stored in a double.
fn check_exact(n: i64, path: &str) -> Result<()> {
    if n.unsigned_abs() <= MAX_EXACT_INTEGER.unsigned_abs() {
        Ok(())
    } else {
        Err(Error::OutOfRange {
            path: path.to_string(),
            value: n,
            limit: MAX_EXACT_INTEGER,
        })
    }
}

/// Nested integers are stored in a `Long` tag.
fn check_long(n: i64, path: &str) -> Result<i32> {
    i32::try_from(n).map_err(|_| Error::OutOfRange {
        path: path.to_string(),
        value: n,
        limit: i32::MAX.into(),
    })
}

/// Generates DM-script declarations for host values.
///
/// Temporaries needed for nested containers are named `<prefix><n>` and a
/// single index variable `<prefix>index` is declared the first time a group
/// entry is written.
#[derive(Debug, Clone)]
pub struct ScriptEncoder {
    prefix: String,
    counter: usize,
    index_declared: bool,
    lines: Vec<String>,
}

/// Script lines produced for one declaration, committed only on success.
struct Emitter<'a> {
    prefix: &'a str,
    counter: usize,
    index_declared: bool,
    lines: Vec<String>,
    open: Vec<usize>,
}

impl ScriptEncoder {
    /// Create an encoder whose generated names start with `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: 0,
            index_declared: false,
            lines: Vec::new(),
        }
    }

    /// Declare the script variable `name` holding `value`.
    ///
    /// `ty` is the declared type; [`TypeSpecifier::Any`] infers it from the
    /// value. Nothing is emitted when an error is returned.
    pub fn declare(&mut self, name: &str, value: &Value, ty: TypeSpecifier) -> Result<()> {
        let ident = escape_identifier(name);
        if ident.is_empty() {
            return Err(Error::InvalidIdentifier(name.to_string()));
        }
        let ty = check_declared(name, value, ty)?;

        let mut emitter = Emitter {
            prefix: &self.prefix,
            counter: self.counter,
            index_declared: self.index_declared,
            lines: Vec::new(),
            open: Vec::new(),
        };
        emitter.declare(&ident, value, ty, name)?;

        self.counter = emitter.counter;
        self.index_declared = emitter.index_declared;
        self.lines.append(&mut emitter.lines);
        Ok(())
    }

    /// Lines generated so far.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Consume the encoder, returning the generated script.
    pub fn into_script(self) -> String {
        self.lines.join("\n")
    }
}

impl Emitter<'_> {
    fn declare(&mut self, ident: &str, value: &Value, ty: TypeSpecifier, path: &str) -> Result<()> {
        let keyword = script_type_name(ty, true)?;
        match value {
            Value::List(list) => {
                enter(&mut self.open, list.id(), path)?;
                self.lines
                    .push(format!("{keyword} {ident} = NewTagList();"));
                for (i, item) in list.to_vec().iter().enumerate() {
                    let item_path = format!("{path}[{i}]");
                    let (tag_type, expr) = self.element(item, &item_path)?;
                    self.lines.push(format!(
                        "{ident}.TagGroupInsertTagAs{tag_type}(infinity(), {expr});"
                    ));
                }
                self.open.pop();
            }
            Value::Map(map) => {
                enter(&mut self.open, map.id(), path)?;
                let declared_at = self.lines.len();
                self.lines
                    .push(format!("{keyword} {ident} = NewTagGroup();"));
                for (key, item) in map.entries() {
                    let item_path = format!("{path}.{key}");
                    let (tag_type, expr) = self.element(&item, &item_path)?;
                    let index = self.index_var(declared_at);
                    self.lines.push(format!(
                        "{index} = {ident}.TagGroupCreateNewLabeledTag(\"{}\");",
                        escape_string(&key)
                    ));
                    self.lines.push(format!(
                        "{ident}.TagGroupSetIndexedTagAs{tag_type}({index}, {expr});"
                    ));
                }
                self.open.pop();
            }
            scalar => {
                if let (Value::Integer(n), TypeSpecifier::Integer) = (scalar, ty) {
                    check_exact(*n, path)?;
                }
                let literal = scalar_literal(scalar);
                self.lines.push(format!("{keyword} {ident} = {literal};"));
            }
        }
        Ok(())
    }

    /// Returns the tag type and expression for a container element, declaring
    /// a temporary first if the element is itself a container.
    fn element(&mut self, value: &Value, path: &str) -> Result<(&'static str, String)> {
        match value {
            Value::List(_) | Value::Map(_) => {
                let temp = format!("{}{}", self.prefix, self.counter);
                self.counter += 1;
                self.declare(&temp, value, TypeSpecifier::of(value), path)?;
                Ok(("TagGroup", temp))
            }
            Value::Integer(n) => {
                check_long(*n, path)?;
                Ok(("Long", n.to_string()))
            }
            scalar => Ok((scalar_tag_type(scalar), scalar_literal(scalar))),
        }
    }

    /// Name of the shared index variable; declared in front of the line at
    /// `declared_at` on first use.
    fn index_var(&mut self, declared_at: usize) -> String {
        let index = format!("{}index", self.prefix);
        if !self.index_declared {
            self.lines.insert(declared_at, format!("number {index};"));
            self.index_declared = true;
        }
        index
    }
}

/// Validate a declared type against the value, resolving `Any`.
fn check_declared(path: &str, value: &Value, declared: TypeSpecifier) -> Result<TypeSpecifier> {
    let actual = TypeSpecifier::of(value);
    let compatible = match declared {
        TypeSpecifier::Any => return Ok(actual),
        TypeSpecifier::Real => matches!(
            actual,
            TypeSpecifier::Integer | TypeSpecifier::Real | TypeSpecifier::Boolean
        ),
        TypeSpecifier::Integer => {
            matches!(actual, TypeSpecifier::Integer | TypeSpecifier::Boolean)
        }
        other => other == actual,
    };
    if compatible {
        Ok(declared)
    } else {
        Err(Error::mismatch(path, declared, value.kind()))
    }
}

/// Tag type used when a scalar is stored inside a container.
fn scalar_tag_type(value: &Value) -> &'static str {
    match value {
        Value::Integer(_) => "Long",
        Value::Real(_) => "Double",
        Value::Boolean(_) => "Boolean",
        Value::Text(_) => "String",
        Value::List(_) | Value::Map(_) => "TagGroup",
    }
}

/// DM-script literal for a scalar value.
pub fn scalar_literal(value: &Value) -> String {
    match value {
        Value::Integer(n) => n.to_string(),
        Value::Real(x) => real_literal(*x),
        Value::Boolean(b) => u8::from(*b).to_string(),
        Value::Text(s) => format!("\"{}\"", escape_string(s)),
        Value::List(_) | Value::Map(_) => String::new(),
    }
}

fn real_literal(x: f64) -> String {
    if x.is_nan() {
        "(infinity() - infinity())".to_string()
    } else if x.is_infinite() {
        if x > 0.0 {
            "infinity()".to_string()
        } else {
            "-infinity()".to_string()
        }
    } else {
        // shortest representation that parses back to the same bits
        format!("{x:?}")
    }
}

/// Convert a host value into a tag value.
///
/// Scalars become single tags, lists and maps become [`TagGroup`]s (created
/// as list or group respectively).
pub fn encode_standalone(value: &Value, ty: TypeSpecifier) -> Result<TagValue> {
    let ty = check_declared("$", value, ty)?;
    encode_at(value, ty, &mut Vec::new(), "$", false)
}

/// Convert a host list or map into a [`TagGroup`].
pub fn to_tag_group(value: &Value) -> Result<TagGroup> {
    match encode_standalone(value, TypeSpecifier::Any)? {
        TagValue::Group(group) => Ok(group),
        other => Err(Error::mismatch("$", TypeSpecifier::Group, other.type_name())),
    }
}

fn encode_at(
    value: &Value,
    ty: TypeSpecifier,
    open: &mut Vec<usize>,
    path: &str,
    nested: bool,
) -> Result<TagValue> {
    Ok(match value {
        Value::Integer(n) if ty == TypeSpecifier::Real => TagValue::Double(*n as f64),
        Value::Integer(n) if nested => TagValue::Long(check_long(*n, path)?),
        Value::Integer(n) => match i32::try_from(*n) {
            Ok(long) => TagValue::Long(long),
            Err(_) => {
                check_exact(*n, path)?;
                TagValue::Double(*n as f64)
            }
        },
        Value::Real(x) => TagValue::Double(*x),
        Value::Boolean(b) => match ty {
            TypeSpecifier::Integer => TagValue::Long(i32::from(*b)),
            TypeSpecifier::Real => TagValue::Double(f64::from(u8::from(*b))),
            _ => TagValue::Boolean(*b),
        },
        Value::Text(s) => TagValue::String(s.clone()),
        Value::List(list) => {
            enter(open, list.id(), path)?;
            let mut group = TagGroup::new_list();
            for (i, item) in list.to_vec().iter().enumerate() {
                let item_path = format!("{path}[{i}]");
                group.push(encode_at(item, TypeSpecifier::of(item), open, &item_path, true)?);
            }
            open.pop();
            TagValue::Group(group)
        }
        Value::Map(map) => {
            enter(open, map.id(), path)?;
            let mut group = TagGroup::new();
            for (key, item) in map.entries() {
                let item_path = format!("{path}.{key}");
                let tag = encode_at(&item, TypeSpecifier::of(&item), open, &item_path, true)?;
                group.set(key, tag);
            }
            open.pop();
            TagValue::Group(group)
        }
    })
}

/// Convert a tag value read from DM-script into a host value of type `ty`.
pub fn decode_standalone(tag: &TagValue, ty: TypeSpecifier) -> Result<Value> {
    decode_at(tag, ty, "$")
}

/// Convert a [`TagGroup`] into a host list or map.
///
/// `ty` must be [`TypeSpecifier::List`], [`TypeSpecifier::Group`] or
/// [`TypeSpecifier::Any`] (which follows the group's list flag).
pub fn from_tag_group(group: &TagGroup, ty: TypeSpecifier) -> Result<Value> {
    decode_group(group, ty, "$")
}

/// Like [`decode_standalone`], reporting mismatches relative to `path`.
pub fn decode_at(tag: &TagValue, ty: TypeSpecifier, path: &str) -> Result<Value> {
    let mismatch = || Error::mismatch(path, ty, tag.to_string());

    match ty {
        TypeSpecifier::Any => Ok(match tag {
            TagValue::Short(n) => Value::Integer((*n).into()),
            TagValue::Long(n) => Value::Integer((*n).into()),
            TagValue::UInt16(n) => Value::Integer((*n).into()),
            TagValue::UInt32(n) => Value::Integer((*n).into()),
            TagValue::Float(x) => Value::Real((*x).into()),
            TagValue::Double(x) => Value::Real(*x),
            TagValue::Boolean(b) => Value::Boolean(*b),
            TagValue::String(s) => Value::Text(s.clone()),
            TagValue::Group(group) => decode_group(group, ty, path)?,
        }),
        TypeSpecifier::Integer => match tag {
            TagValue::Short(n) => Ok(Value::Integer((*n).into())),
            TagValue::Long(n) => Ok(Value::Integer((*n).into())),
            TagValue::UInt16(n) => Ok(Value::Integer((*n).into())),
            TagValue::UInt32(n) => Ok(Value::Integer((*n).into())),
            TagValue::Float(_) | TagValue::Double(_) => {
                let x = tag.as_number().ok_or_else(mismatch)?;
                integral(x).map(Value::Integer).ok_or_else(mismatch)
            }
            _ => Err(mismatch()),
        },
        TypeSpecifier::Real => tag.as_number().map(Value::Real).ok_or_else(mismatch),
        TypeSpecifier::Boolean => match tag {
            TagValue::Boolean(b) => Ok(Value::Boolean(*b)),
            other => other
                .as_number()
                .map(|x| Value::Boolean(x != 0.0))
                .ok_or_else(mismatch),
        },
        TypeSpecifier::Text => match tag {
            TagValue::String(s) => Ok(Value::Text(s.clone())),
            _ => Err(mismatch()),
        },
        TypeSpecifier::List | TypeSpecifier::Group => match tag {
            TagValue::Group(group) => decode_group(group, ty, path),
            _ => Err(mismatch()),
        },
    }
}

/// Convert a tag value into a host value shaped like `def`.
///
/// Elements a [`TypeDef::List`] or [`TypeDef::Group`] names must exist;
/// elements it does not name are left out of the result.
pub fn decode_typed(tag: &TagValue, def: &TypeDef, path: &str) -> Result<Value> {
    match def {
        TypeDef::Scalar(ty) => decode_at(tag, *ty, path),
        TypeDef::List(items) => {
            let group = container(tag, def, path)?;
            let values = items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let item_path = format!("{path}[{i}]");
                    match group.get_index(i) {
                        Some(tag) => decode_typed(&tag.value, item, &item_path),
                        None => Err(Error::mismatch(&item_path, item.root(), "no tag")),
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::list(values))
        }
        TypeDef::Group(fields) => {
            let group = container(tag, def, path)?;
            let entries = fields
                .iter()
                .map(|(key, item)| {
                    let item_path = format!("{path}.{key}");
                    match group.get(key) {
                        Some(tag) => Ok((key.clone(), decode_typed(tag, item, &item_path)?)),
                        None => Err(Error::mismatch(&item_path, item.root(), "no tag")),
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::map(entries))
        }
    }
}

fn container<'t>(tag: &'t TagValue, def: &TypeDef, path: &str) -> Result<&'t TagGroup> {
    match tag {
        TagValue::Group(group) => Ok(group),
        other => Err(Error::mismatch(path, def.root(), other.to_string())),
    }
}

fn decode_group(group: &TagGroup, ty: TypeSpecifier, path: &str) -> Result<Value> {
    let as_list = match ty {
        TypeSpecifier::List => true,
        TypeSpecifier::Group => false,
        TypeSpecifier::Any => group.is_list(),
        other => {
            return Err(Error::mismatch(path, other, if group.is_list() {
                "TagList"
            } else {
                "TagGroup"
            }))
        }
    };

    if as_list {
        let items = group
            .iter()
            .enumerate()
            .map(|(i, tag)| decode_at(&tag.value, TypeSpecifier::Any, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::list(items))
    } else {
        let entries = group
            .iter()
            .enumerate()
            .map(|(i, tag)| {
                let key = tag.label.clone().unwrap_or_else(|| i.to_string());
                let value = decode_at(&tag.value, TypeSpecifier::Any, &format!("{path}.{key}"))?;
                Ok((key, value))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::map(entries))
    }
}

/// Exact integer value of `x`, if it has one within `i64` range.
fn integral(x: f64) -> Option<i64> {
    // 2^63 is exactly representable; anything at or above it overflows
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if x.is_finite() && x.fract() == 0.0 && x >= -LIMIT && x < LIMIT {
        Some(x as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Map;

    fn encode(name: &str, value: &Value) -> Result<String> {
        let mut encoder = ScriptEncoder::new("__t_");
        encoder.declare(name, value, TypeSpecifier::Any)?;
        Ok(encoder.into_script())
    }

    #[test]
    fn scalars_declare_with_literals() {
        assert_eq!(encode("a", &Value::Integer(10)).unwrap(), "number a = 10;");
        assert_eq!(encode("x", &Value::Real(0.5)).unwrap(), "number x = 0.5;");
        assert_eq!(encode("flag", &Value::Boolean(true)).unwrap(), "number flag = 1;");
        assert_eq!(
            encode("s", &Value::from("a \"b\"")).unwrap(),
            r#"string s = "a \"b\"";"#
        );
        assert_eq!(
            encode("inf", &Value::Real(f64::NEG_INFINITY)).unwrap(),
            "number inf = -infinity();"
        );
    }

    #[test]
    fn list_appends_in_order() {
        let script = encode("headlines", &Value::list(["Section 1", "Section 2"])).unwrap();
        assert_eq!(
            script,
            [
                "TagGroup headlines = NewTagList();",
                "headlines.TagGroupInsertTagAsString(infinity(), \"Section 1\");",
                "headlines.TagGroupInsertTagAsString(infinity(), \"Section 2\");",
            ]
            .join("\n")
        );
    }

    #[test]
    fn map_uses_labeled_tags_and_booleans() {
        let value = Value::map([("on", Value::Boolean(true)), ("n", Value::Integer(2))]);
        let script = encode("opts", &value).unwrap();
        assert_eq!(
            script,
            [
                "number __t_index;",
                "TagGroup opts = NewTagGroup();",
                "__t_index = opts.TagGroupCreateNewLabeledTag(\"n\");",
                "opts.TagGroupSetIndexedTagAsLong(__t_index, 2);",
                "__t_index = opts.TagGroupCreateNewLabeledTag(\"on\");",
                "opts.TagGroupSetIndexedTagAsBoolean(__t_index, 1);",
            ]
            .join("\n")
        );
    }

    #[test]
    fn nested_containers_use_temporaries() {
        let value = Value::list(vec![Value::list([1, 2]), Value::from("x")]);
        let script = encode("outer", &value).unwrap();
        assert!(script.contains("TagGroup __t_0 = NewTagList();"));
        assert!(script.contains("__t_0.TagGroupInsertTagAsLong(infinity(), 2);"));
        assert!(script.contains("outer.TagGroupInsertTagAsTagGroup(infinity(), __t_0);"));
    }

    #[test]
    fn direct_cycle_is_rejected_without_output() {
        let map = Map::new();
        map.insert("a", 1);
        map.insert("me", map.clone());

        let mut encoder = ScriptEncoder::new("__t_");
        let err = encoder
            .declare("m", &Value::Map(map), TypeSpecifier::Any)
            .unwrap_err();
        assert!(matches!(err, Error::Cyclic { ref path } if path == "m.me"));
        assert!(encoder.lines().is_empty());
    }

    #[test]
    fn shared_but_acyclic_values_are_fine() {
        let inner = Value::list([1]);
        let value = Value::list(vec![inner.clone(), inner]);
        assert!(encode("twice", &value).is_ok());
    }

    #[test]
    fn declared_type_must_fit_value() {
        let mut encoder = ScriptEncoder::new("__t_");
        assert!(matches!(
            encoder.declare("a", &Value::Integer(1), TypeSpecifier::Text),
            Err(Error::TypeMismatch { .. })
        ));
        encoder
            .declare("b", &Value::Integer(1), TypeSpecifier::Real)
            .unwrap();
        assert!(matches!(
            encoder.declare("", &Value::Integer(1), TypeSpecifier::Any),
            Err(Error::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn integer_decode_rejects_fractions() {
        assert_eq!(
            decode_standalone(&TagValue::Double(3.0), TypeSpecifier::Integer).unwrap(),
            Value::Integer(3)
        );
        assert!(matches!(
            decode_standalone(&TagValue::Double(2.5), TypeSpecifier::Integer),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            decode_standalone(&TagValue::Double(f64::INFINITY), TypeSpecifier::Integer),
            Err(Error::TypeMismatch { .. })
        ));
        assert_eq!(
            decode_standalone(&TagValue::Double(f64::INFINITY), TypeSpecifier::Real).unwrap(),
            Value::Real(f64::INFINITY)
        );
    }

    #[test]
    fn requested_type_decides_list_or_group() {
        let mut group = TagGroup::new();
        group.set("b", TagValue::Long(2));
        group.set("a", TagValue::Long(1));

        let as_list = from_tag_group(&group, TypeSpecifier::List).unwrap();
        assert_eq!(as_list, Value::list([2, 1]));

        let as_map = from_tag_group(&group, TypeSpecifier::Group).unwrap();
        assert_eq!(as_map, Value::map([("a", 1), ("b", 2)]));

        let mut list = TagGroup::new_list();
        list.push(TagValue::String("x".into()));
        assert_eq!(
            from_tag_group(&list, TypeSpecifier::Group).unwrap(),
            Value::map([("0", "x")])
        );
        assert_eq!(
            from_tag_group(&list, TypeSpecifier::Any).unwrap(),
            Value::list(["x"])
        );
    }

    #[test]
    fn scalar_requested_for_container_is_a_mismatch() {
        let tag = TagValue::Group(TagGroup::new_list());
        assert!(matches!(
            decode_standalone(&tag, TypeSpecifier::Text),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn integers_that_would_change_are_rejected() {
        let nested = Value::list([Value::Integer(1 << 40)]);
        assert!(matches!(
            encode("big", &nested),
            Err(Error::OutOfRange { ref path, limit, .. }) if path == "big[0]" && limit == i32::MAX as i64
        ));
        assert!(matches!(
            encode_standalone(&nested, TypeSpecifier::List),
            Err(Error::OutOfRange { .. })
        ));

        assert_eq!(encode("n", &Value::Integer(1 << 53)).unwrap(), "number n = 9007199254740992;");
        assert!(matches!(
            encode("n", &Value::Integer(i64::MAX)),
            Err(Error::OutOfRange { value: i64::MAX, .. })
        ));
        // a declared real is allowed to round
        let mut encoder = ScriptEncoder::new("__t_");
        encoder
            .declare("r", &Value::Integer(i64::MAX), TypeSpecifier::Real)
            .unwrap();
    }

    #[test]
    fn typed_decoding_follows_the_definition() {
        let mut sizes = TagGroup::new();
        sizes.set("w", TagValue::Double(512.0));
        sizes.set("h", TagValue::Double(256.0));
        let mut list = TagGroup::new_list();
        list.push(TagValue::String("scan".into()));
        list.push(TagValue::Group(sizes));
        list.push(TagValue::Double(0.5));

        let def = TypeDef::list([
            TypeDef::from(TypeSpecifier::Text),
            TypeDef::group([("w", TypeSpecifier::Integer), ("h", TypeSpecifier::Integer)]),
        ]);
        let value = decode_typed(&TagValue::Group(list.clone()), &def, "v").unwrap();
        assert_eq!(
            value,
            Value::list(vec![
                Value::from("scan"),
                Value::map([("h", 256), ("w", 512)]),
            ])
        );

        // untyped, the same doubles stay reals
        let untyped = decode_at(&TagValue::Group(list.clone()), TypeSpecifier::List, "v").unwrap();
        assert_eq!(
            untyped.as_list().unwrap().to_vec()[1],
            Value::map([("h", 256.0), ("w", 512.0)])
        );

        let too_long = TypeDef::list([TypeSpecifier::Text; 4]);
        assert!(matches!(
            decode_typed(&TagValue::Group(list), &too_long, "v"),
            Err(Error::TypeMismatch { ref path, .. }) if path == "v[1]"
        ));
    }

    #[test]
    fn typed_group_requires_named_tags() {
        let mut group = TagGroup::new();
        group.set("a", TagValue::Long(1));
        let def = TypeDef::group([("a", TypeSpecifier::Integer), ("b", TypeSpecifier::Text)]);
        assert!(matches!(
            decode_typed(&TagValue::Group(group), &def, "g"),
            Err(Error::TypeMismatch { ref path, ref found, .. }) if path == "g.b" && found == "no tag"
        ));
        assert!(matches!(
            decode_typed(&TagValue::Long(1), &def, "g"),
            Err(Error::TypeMismatch { expected: TypeSpecifier::Group, .. })
        ));
    }
}
