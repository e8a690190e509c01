//! Dynamic values passed through proxy call sites.

use crate::types::TypeId;
use crate::universe::TypeUniverse;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A heap object that can travel inside a [`Value`].
///
/// Synthesized proxy instances implement this so they can be handed to
/// `equals` and friends like any other argument.
pub trait RuntimeObject: Any + Send + Sync + fmt::Debug {
    /// The object's dynamic type.
    fn runtime_type(&self) -> TypeId;

    fn as_any(&self) -> &dyn Any;
}

pub type ObjectRef = Arc<dyn RuntimeObject>;

#[derive(Clone, Debug, Default)]
pub enum Value {
    /// Result of a `void` method.
    #[default]
    Void,
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Str(Arc<str>),
    Object(ObjectRef),
}

impl Value {
    pub fn object(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }

    /// Dynamic type of the value; `None` for `Void` and `Null`.
    pub fn runtime_type(&self) -> Option<TypeId> {
        match self {
            Value::Void | Value::Null => None,
            Value::Bool(_) => Some(TypeId::BOOLEAN),
            Value::Int(_) => Some(TypeId::INT),
            Value::Long(_) => Some(TypeId::LONG),
            Value::Double(_) => Some(TypeId::DOUBLE),
            Value::Str(_) => Some(TypeId::STRING),
            Value::Object(obj) => Some(obj.runtime_type()),
        }
    }

    /// `instanceof` semantics: `null` is an instance of nothing.
    pub fn is_instance_of(&self, ty: TypeId, universe: &TypeUniverse) -> bool {
        self.runtime_type()
            .is_some_and(|actual| universe.is_assignable(actual, ty))
    }

    /// Cast semantics: like `is_instance_of`, but `null` passes for any
    /// reference type and `Void` only conforms to `void`.
    pub fn conforms_to(&self, ty: TypeId, universe: &TypeUniverse) -> bool {
        match self {
            Value::Void => ty == TypeId::VOID,
            Value::Null => ty != TypeId::VOID && !universe.is_primitive(ty),
            _ => self.is_instance_of(ty, universe),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

/// Objects compare by identity, everything else by value.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<i64> for Value {
    fn from(l: i64) -> Self {
        Value::Long(l)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

#[cfg(test)]
#[path = "../tests/value_tests.rs"]
mod tests;
