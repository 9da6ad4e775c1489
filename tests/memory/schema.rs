//! Integration tests for fact type schemas and field readers.

use ember_foundation::{ErrorKind, Type, Value};
use ember_memory::{FactTypeSchema, FieldSchema};

#[test]
fn map_fields_read_entries() {
    let schema = FactTypeSchema::new("Person")
        .with_field("id", Type::Int)
        .with_field("nick", Type::option(Type::String));
    let person = Value::record([("id", Value::Int(4))]);

    assert_eq!(schema.field_position("nick"), Some(1));
    let id = schema.field("id").unwrap();
    assert_eq!(id.extract(&person).unwrap(), Value::Int(4));
    // Missing entries read as nil, which an optional field accepts.
    assert_eq!(
        schema.field("nick").unwrap().extract(&person).unwrap(),
        Value::Nil
    );
}

#[test]
fn badly_typed_fields_are_rejected() {
    let field = FieldSchema::new("age", Type::Int);
    let err = field
        .extract(&Value::record([("age", Value::from("old"))]))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TypeMismatch { .. }));
}

#[test]
fn custom_readers_parse_other_shapes() {
    // Facts given as "name,age" strings.
    let schema = FactTypeSchema::new("Row").with_field_reader("age", Type::Int, |v| {
        v.as_str()
            .and_then(|s| s.split(',').nth(1))
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map_or(Value::Nil, Value::Int)
    });

    let age = schema.field("age").unwrap();
    assert_eq!(age.extract(&Value::from("ann, 31")).unwrap(), Value::Int(31));
    assert!(age.extract(&Value::from("bob")).is_err());
}
