//! Type and method definitions.
//!
//! Types are registered once in a [`TypeUniverse`](crate::TypeUniverse) and
//! referenced everywhere else by their `TypeId`. Definitions are immutable
//! after registration.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

// =============================================================================
// TypeId - Interned Type Handle
// =============================================================================

/// Handle to a registered type.
///
/// Ids below [`TypeId::FIRST_USER`] are reserved for the built-in types that
/// every universe registers on creation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub u32);

impl TypeId {
    /// Sentinel for "no type".
    pub const INVALID: Self = Self(0);

    pub const VOID: Self = Self(1);
    pub const BOOLEAN: Self = Self(2);
    pub const INT: Self = Self(3);
    pub const LONG: Self = Self(4);
    pub const DOUBLE: Self = Self(5);

    /// Root of every reference type.
    pub const OBJECT: Self = Self(6);
    pub const CHAR_SEQUENCE: Self = Self(7);
    pub const STRING: Self = Self(8);
    pub const NUMBER: Self = Self(9);

    pub const THROWABLE: Self = Self(10);
    pub const EXCEPTION: Self = Self(11);
    pub const RUNTIME_EXCEPTION: Self = Self(12);
    pub const ILLEGAL_STATE: Self = Self(13);
    pub const UNSUPPORTED_OPERATION: Self = Self(14);
    pub const CLASS_CAST: Self = Self(15);

    pub const CLASS: Self = Self(16);
    pub const METHOD_TYPE: Self = Self(17);
    pub const METHOD_HANDLE: Self = Self(18);
    /// Static type of the link strategy slot in synthesized classes.
    pub const BOOTSTRAP: Self = Self(19);

    /// First id handed out for user-defined types.
    pub const FIRST_USER: u32 = 64;

    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

// =============================================================================
// TypeKind / Visibility
// =============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Value types (`boolean`, `int`, ...). Never assignable to anything
    /// but themselves.
    Primitive,
    /// Method contracts only; the things proxies implement.
    Interface,
    /// Concrete types, including payload types and synthesized proxies.
    Class,
}

/// Visibility of a type outside its namespace.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    #[default]
    Public,
    /// Only types in the same namespace may reference it.
    Namespace,
}

// =============================================================================
// MethodType
// =============================================================================

/// Return type plus ordered parameter types.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodType {
    pub ret: TypeId,
    pub params: SmallVec<[TypeId; 4]>,
}

impl MethodType {
    pub fn new(ret: TypeId, params: impl IntoIterator<Item = TypeId>) -> Self {
        Self {
            ret,
            params: params.into_iter().collect(),
        }
    }

    /// `()` returning `ret`.
    pub fn nullary(ret: TypeId) -> Self {
        Self {
            ret,
            params: SmallVec::new(),
        }
    }

    /// The same type with `leading` prepended to the parameter list.
    ///
    /// Call sites use this to pass instance state as an implicit first argument.
    pub fn with_leading(&self, leading: TypeId) -> Self {
        let mut params = SmallVec::with_capacity(self.params.len() + 1);
        params.push(leading);
        params.extend(self.params.iter().copied());
        Self {
            ret: self.ret,
            params,
        }
    }

    /// The same parameters with a different return type.
    pub fn with_return(&self, ret: TypeId) -> Self {
        Self {
            ret,
            params: self.params.clone(),
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

// =============================================================================
// MethodDecl
// =============================================================================

/// A method as declared by an interface or class.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<TypeId>,
    pub ret: TypeId,
    /// Declared checked exception types.
    pub throws: Vec<TypeId>,
}

impl MethodDecl {
    pub fn new(name: impl Into<String>, params: impl IntoIterator<Item = TypeId>, ret: TypeId) -> Self {
        Self {
            name: name.into(),
            params: params.into_iter().collect(),
            ret,
            throws: Vec::new(),
        }
    }

    pub fn throws(mut self, exceptions: impl IntoIterator<Item = TypeId>) -> Self {
        self.throws.extend(exceptions);
        self
    }

    pub fn method_type(&self) -> MethodType {
        MethodType::new(self.ret, self.params.iter().copied())
    }
}

// =============================================================================
// TypeDef
// =============================================================================

/// Complete definition of a registered type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDef {
    pub namespace: String,
    /// Simple name, unique within the namespace.
    pub name: String,
    pub kind: TypeKind,
    pub visibility: Visibility,
    /// Direct supertypes (superclass and/or implemented interfaces).
    pub supertypes: Vec<TypeId>,
    /// Methods declared directly on this type.
    pub methods: Vec<MethodDecl>,
}

impl TypeDef {
    fn new(kind: TypeKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            kind,
            visibility: Visibility::Public,
            supertypes: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn interface(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(TypeKind::Interface, namespace, name)
    }

    pub fn class(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(TypeKind::Class, namespace, name)
    }

    pub fn primitive(name: impl Into<String>) -> Self {
        Self::new(TypeKind::Primitive, "", name)
    }

    pub fn extends(mut self, supertype: TypeId) -> Self {
        self.supertypes.push(supertype);
        self
    }

    pub fn method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }

    /// Mark the type as visible only inside its own namespace.
    pub fn restricted(mut self) -> Self {
        self.visibility = Visibility::Namespace;
        self
    }

    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn is_primitive(&self) -> bool {
        self.kind == TypeKind::Primitive
    }
}
