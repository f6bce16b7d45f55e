use dmsync_format::{
    decode_standalone, decode_typed, encode_standalone, from_tag_group, to_tag_group, Error,
    List, Map, TagGroup, TagValue, TypeDef, TypeSpecifier, Value, MAX_EXACT_INTEGER,
};
use proptest::prelude::*;

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(|n| Value::Integer(n.into())),
        any::<i64>().prop_map(Value::Integer),
        any::<f64>().prop_map(Value::Real),
        any::<bool>().prop_map(Value::Boolean),
        "\\PC{0,12}".prop_map(Value::Text),
    ]
}

fn nested() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::list),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Value::map),
        ]
    })
}

/// Whether every integer in `value` can be stored without change.
fn storable(value: &Value, nested: bool) -> bool {
    match value {
        Value::Integer(n) if nested => i32::try_from(*n).is_ok(),
        Value::Integer(n) => n.unsigned_abs() <= MAX_EXACT_INTEGER.unsigned_abs(),
        Value::List(list) => list.to_vec().iter().all(|item| storable(item, true)),
        Value::Map(map) => map.entries().iter().all(|(_, item)| storable(item, true)),
        _ => true,
    }
}

proptest! {
    #[test]
    fn values_survive_a_round_trip(value in nested()) {
        let ty = TypeSpecifier::of(&value);
        match encode_standalone(&value, ty) {
            Ok(tag) => {
                prop_assert!(storable(&value, false));
                let decoded = decode_standalone(&tag, ty).unwrap();
                prop_assert_eq!(decoded, value);
            }
            Err(Error::OutOfRange { .. }) => prop_assert!(!storable(&value, false)),
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    #[test]
    fn integers_round_trip_through_real_tags(n in -(1i64 << 53)..(1i64 << 53)) {
        let tag = TagValue::Double(n as f64);
        prop_assert_eq!(
            decode_standalone(&tag, TypeSpecifier::Integer).unwrap(),
            Value::Integer(n)
        );
    }
}

#[test]
fn list_becomes_tag_list() {
    let group = to_tag_group(&Value::list(vec![Value::from(1), Value::from("a")])).unwrap();
    assert!(group.is_list());
    assert_eq!(group.len(), 2);
    assert_eq!(group.get_index(0).unwrap().value, TagValue::Long(1));
    assert_eq!(
        group.get_index(1).unwrap().value,
        TagValue::String("a".to_string())
    );
}

#[test]
fn large_integers_fall_back_to_double_tags() {
    let tag = encode_standalone(&Value::Integer(1 << 40), TypeSpecifier::Integer).unwrap();
    assert_eq!(tag, TagValue::Double((1u64 << 40) as f64));
    assert_eq!(
        decode_standalone(&tag, TypeSpecifier::Integer).unwrap(),
        Value::Integer(1 << 40)
    );
}

#[test]
fn nested_large_integers_are_refused() {
    let value = Value::list([Value::Integer(1 << 40)]);
    assert!(matches!(
        encode_standalone(&value, TypeSpecifier::List),
        Err(Error::OutOfRange { ref path, .. }) if path == "$[0]"
    ));
    assert!(matches!(
        encode_standalone(&Value::Integer(i64::MIN), TypeSpecifier::Integer),
        Err(Error::OutOfRange { .. })
    ));
}

#[test]
fn definition_restores_integers_stored_as_doubles() {
    let mut list = TagGroup::new_list();
    list.push(TagValue::Double(1_099_511_627_776.0));
    list.push(TagValue::Double(2.5));
    let def = TypeDef::list([TypeSpecifier::Integer, TypeSpecifier::Real]);
    assert_eq!(
        decode_typed(&TagValue::Group(list), &def, "$").unwrap(),
        Value::list(vec![Value::Integer(1 << 40), Value::Real(2.5)])
    );
}

#[test]
fn nested_group_keeps_structure() {
    let value = Value::map([
        ("name", Value::from("scan")),
        ("shape", Value::list([512, 512])),
        ("meta", Value::map([("ok", true)])),
    ]);
    let group = to_tag_group(&value).unwrap();
    assert!(!group.is_list());
    assert_eq!(group.labels().collect::<Vec<_>>(), vec!["meta", "name", "shape"]);

    let decoded = from_tag_group(&group, TypeSpecifier::Group).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn cyclic_list_is_rejected() {
    let list = List::new();
    list.push(1);
    let holder = Map::new();
    holder.insert("list", list.clone());
    list.push(holder);

    let err = encode_standalone(&Value::List(list), TypeSpecifier::List).unwrap_err();
    assert!(matches!(err, Error::Cyclic { .. }));
}

#[test]
fn booleans_widen_when_declared_numeric() {
    assert_eq!(
        encode_standalone(&Value::Boolean(true), TypeSpecifier::Integer).unwrap(),
        TagValue::Long(1)
    );
    assert!(matches!(
        encode_standalone(&Value::from("1"), TypeSpecifier::Integer),
        Err(Error::TypeMismatch { .. })
    ));
}
