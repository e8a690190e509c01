use super::*;
use crate::types::TypeDef;

#[derive(Debug)]
struct Widget(TypeId);

impl RuntimeObject for Widget {
    fn runtime_type(&self) -> TypeId {
        self.0
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn test_runtime_types() {
    assert_eq!(Value::from(true).runtime_type(), Some(TypeId::BOOLEAN));
    assert_eq!(Value::from(7).runtime_type(), Some(TypeId::INT));
    assert_eq!(Value::from(7i64).runtime_type(), Some(TypeId::LONG));
    assert_eq!(Value::from("x").runtime_type(), Some(TypeId::STRING));
    assert_eq!(Value::Null.runtime_type(), None);
    assert_eq!(Value::Void.runtime_type(), None);
}

#[test]
fn test_null_is_never_an_instance_but_conforms_to_references() {
    let universe = TypeUniverse::new();
    assert!(!Value::Null.is_instance_of(TypeId::OBJECT, &universe));
    assert!(Value::Null.conforms_to(TypeId::STRING, &universe));
    assert!(!Value::Null.conforms_to(TypeId::INT, &universe));
    assert!(!Value::Null.conforms_to(TypeId::VOID, &universe));
    assert!(Value::Void.conforms_to(TypeId::VOID, &universe));
}

#[test]
fn test_objects_use_their_runtime_type() {
    let universe = TypeUniverse::new();
    let ty = universe
        .define(TypeDef::class("app", "Widget").extends(TypeId::OBJECT))
        .expect("define");
    let value = Value::object(Arc::new(Widget(ty)));
    assert!(value.is_instance_of(ty, &universe));
    assert!(value.is_instance_of(TypeId::OBJECT, &universe));
    assert!(!value.is_instance_of(TypeId::STRING, &universe));
}

#[test]
fn test_object_equality_is_identity() {
    let shared: ObjectRef = Arc::new(Widget(TypeId::OBJECT));
    let a = Value::object(Arc::clone(&shared));
    let b = Value::object(shared);
    let c = Value::object(Arc::new(Widget(TypeId::OBJECT)));
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(Value::from("s"), Value::from("s".to_string()));
    assert_ne!(Value::Int(1), Value::Long(1));
}

#[test]
fn test_accessors() {
    assert_eq!(Value::from("abc").as_str(), Some("abc"));
    assert_eq!(Value::from(3).as_int(), Some(3));
    assert_eq!(Value::from(false).as_bool(), Some(false));
    assert_eq!(Value::Null.as_str(), None);
    assert!(Value::Null.is_null());
}
