//! Concurrent type registry.
//!
//! `TypeUniverse` owns every `TypeDef` and answers the structural questions
//! the proxy machinery needs: assignability, inherited interface methods,
//! namespaces and visibility. It is `DashMap`-backed so factories on
//! different threads can register types and query them without a global lock.

use crate::types::{MethodDecl, MethodType, TypeDef, TypeId, TypeKind};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use indexmap::IndexSet;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::trace;

/// Namespace of the built-in reference types.
pub const LANG_NAMESPACE: &str = "lang";
/// Namespace of the linkage types.
pub const INVOKE_NAMESPACE: &str = "lang.invoke";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    #[error("type `{name}` is already defined")]
    DuplicateType { name: String },
    #[error("unknown type id {0:?}")]
    UnknownType(TypeId),
    #[error("no type named `{0}`")]
    UnknownName(String),
    #[error("`{name}` cannot extend `{supertype}`")]
    InvalidSupertype { name: String, supertype: String },
}

pub struct TypeUniverse {
    /// `TypeId` -> definition
    defs: DashMap<TypeId, Arc<TypeDef>>,
    /// Qualified name -> `TypeId`
    names: DashMap<String, TypeId>,
    next_id: AtomicU32,
}

impl Default for TypeUniverse {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeUniverse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeUniverse")
            .field("types", &self.defs.len())
            .finish()
    }
}

impl TypeUniverse {
    /// Create a universe with the built-in types registered.
    pub fn new() -> Self {
        let universe = Self {
            defs: DashMap::new(),
            names: DashMap::new(),
            next_id: AtomicU32::new(TypeId::FIRST_USER),
        };
        universe.register_builtins();
        universe
    }

    fn register_builtins(&self) {
        let object = TypeId::OBJECT;
        self.insert_builtin(TypeId::VOID, TypeDef::primitive("void"));
        self.insert_builtin(TypeId::BOOLEAN, TypeDef::primitive("boolean"));
        self.insert_builtin(TypeId::INT, TypeDef::primitive("int"));
        self.insert_builtin(TypeId::LONG, TypeDef::primitive("long"));
        self.insert_builtin(TypeId::DOUBLE, TypeDef::primitive("double"));

        self.insert_builtin(
            object,
            TypeDef::class(LANG_NAMESPACE, "Object")
                .method(MethodDecl::new("equals", [object], TypeId::BOOLEAN))
                .method(MethodDecl::new("hashCode", [], TypeId::INT))
                .method(MethodDecl::new("toString", [], TypeId::STRING)),
        );
        self.insert_builtin(
            TypeId::CHAR_SEQUENCE,
            TypeDef::interface(LANG_NAMESPACE, "CharSequence")
                .method(MethodDecl::new("length", [], TypeId::INT)),
        );
        self.insert_builtin(
            TypeId::STRING,
            TypeDef::class(LANG_NAMESPACE, "String")
                .extends(object)
                .extends(TypeId::CHAR_SEQUENCE),
        );
        self.insert_builtin(
            TypeId::NUMBER,
            TypeDef::class(LANG_NAMESPACE, "Number").extends(object),
        );

        let throwables = [
            (TypeId::THROWABLE, "Throwable", object),
            (TypeId::EXCEPTION, "Exception", TypeId::THROWABLE),
            (TypeId::RUNTIME_EXCEPTION, "RuntimeException", TypeId::EXCEPTION),
            (TypeId::ILLEGAL_STATE, "IllegalStateException", TypeId::RUNTIME_EXCEPTION),
            (
                TypeId::UNSUPPORTED_OPERATION,
                "UnsupportedOperationException",
                TypeId::RUNTIME_EXCEPTION,
            ),
            (TypeId::CLASS_CAST, "ClassCastException", TypeId::RUNTIME_EXCEPTION),
        ];
        for (id, name, parent) in throwables {
            self.insert_builtin(id, TypeDef::class(LANG_NAMESPACE, name).extends(parent));
        }

        self.insert_builtin(TypeId::CLASS, TypeDef::class(LANG_NAMESPACE, "Class").extends(object));
        self.insert_builtin(
            TypeId::METHOD_TYPE,
            TypeDef::class(INVOKE_NAMESPACE, "MethodType").extends(object),
        );
        self.insert_builtin(
            TypeId::METHOD_HANDLE,
            TypeDef::class(INVOKE_NAMESPACE, "MethodHandle").extends(object),
        );
        self.insert_builtin(
            TypeId::BOOTSTRAP,
            TypeDef::interface(INVOKE_NAMESPACE, "Bootstrap"),
        );
    }

    fn insert_builtin(&self, id: TypeId, def: TypeDef) {
        self.names.insert(def.qualified_name(), id);
        self.defs.insert(id, Arc::new(def));
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a new type and return its id.
    ///
    /// Supertypes and every type mentioned by the declared methods must
    /// already be registered. Interfaces may only extend interfaces and
    /// nothing may extend a primitive.
    pub fn define(&self, def: TypeDef) -> Result<TypeId, TypeError> {
        for &supertype in &def.supertypes {
            let parent = self.get(supertype).ok_or(TypeError::UnknownType(supertype))?;
            let allowed = match def.kind {
                TypeKind::Primitive => false,
                TypeKind::Interface => parent.is_interface(),
                TypeKind::Class => !parent.is_primitive(),
            };
            if !allowed {
                return Err(TypeError::InvalidSupertype {
                    name: def.qualified_name(),
                    supertype: parent.qualified_name(),
                });
            }
        }
        for method in &def.methods {
            let referenced = method
                .params
                .iter()
                .chain(std::iter::once(&method.ret))
                .chain(method.throws.iter());
            for &ty in referenced {
                if !self.contains(ty) {
                    return Err(TypeError::UnknownType(ty));
                }
            }
        }

        let qualified = def.qualified_name();
        match self.names.entry(qualified.clone()) {
            Entry::Occupied(_) => Err(TypeError::DuplicateType { name: qualified }),
            Entry::Vacant(slot) => {
                let id = TypeId(self.next_id.fetch_add(1, Ordering::SeqCst));
                trace!(type_id = id.0, name = %qualified, kind = ?def.kind, "TypeUniverse::define");
                self.defs.insert(id, Arc::new(def));
                slot.insert(id);
                Ok(id)
            }
        }
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn get(&self, id: TypeId) -> Option<Arc<TypeDef>> {
        self.defs.get(&id).map(|r| Arc::clone(r.value()))
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.defs.contains_key(&id)
    }

    /// Resolve a qualified name (`namespace.Name`).
    pub fn lookup(&self, qualified: &str) -> Option<TypeId> {
        self.names.get(qualified).map(|r| *r.value())
    }

    pub fn resolve(&self, qualified: &str) -> Result<TypeId, TypeError> {
        self.lookup(qualified)
            .ok_or_else(|| TypeError::UnknownName(qualified.to_string()))
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Qualified name, or a placeholder for unknown ids.
    pub fn type_name(&self, id: TypeId) -> String {
        self.get(id)
            .map(|def| def.qualified_name())
            .unwrap_or_else(|| format!("<unknown #{}>", id.0))
    }

    fn simple_name(&self, id: TypeId) -> String {
        self.get(id)
            .map(|def| def.name.clone())
            .unwrap_or_else(|| format!("#{}", id.0))
    }

    /// Render a method type as `(A, B)R` using simple names.
    pub fn render_method_type(&self, ty: &MethodType) -> String {
        let params: Vec<String> = ty.params.iter().map(|&p| self.simple_name(p)).collect();
        format!("({}){}", params.join(", "), self.simple_name(ty.ret))
    }

    pub fn namespace_of(&self, id: TypeId) -> Option<String> {
        self.get(id).map(|def| def.namespace.clone())
    }

    pub fn is_interface(&self, id: TypeId) -> bool {
        self.get(id).is_some_and(|def| def.is_interface())
    }

    pub fn is_primitive(&self, id: TypeId) -> bool {
        self.get(id).is_some_and(|def| def.is_primitive())
    }

    // =========================================================================
    // Relations
    // =========================================================================

    /// Whether `sub` reaches `sup` through declared supertypes (reflexive).
    pub fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        if sub == sup {
            return true;
        }
        let mut seen = FxHashSet::default();
        let mut queue = VecDeque::from([sub]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            let Some(def) = self.get(current) else {
                continue;
            };
            for &parent in &def.supertypes {
                if parent == sup {
                    return true;
                }
                queue.push_back(parent);
            }
        }
        false
    }

    /// Whether a value of type `from` may be used where `to` is expected.
    ///
    /// Primitives are only assignable to themselves; every reference type
    /// (interfaces included) is assignable to `Object`.
    pub fn is_assignable(&self, from: TypeId, to: TypeId) -> bool {
        if from == to {
            return true;
        }
        if self.is_primitive(from) || self.is_primitive(to) {
            return false;
        }
        if to == TypeId::OBJECT {
            return self.contains(from);
        }
        self.is_subtype(from, to)
    }

    /// Every method an interface exposes, its own first, then inherited
    /// ones in breadth-first order. Identical declarations reached along
    /// several paths appear once.
    pub fn methods_of(&self, id: TypeId) -> Result<Vec<MethodDecl>, TypeError> {
        let root = self.get(id).ok_or(TypeError::UnknownType(id))?;
        let mut methods: IndexSet<MethodDecl> = root.methods.iter().cloned().collect();
        let mut seen = FxHashSet::default();
        seen.insert(id);
        let mut queue: VecDeque<TypeId> = root.supertypes.iter().copied().collect();
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            let def = self.get(current).ok_or(TypeError::UnknownType(current))?;
            methods.extend(def.methods.iter().cloned());
            queue.extend(def.supertypes.iter().copied());
        }
        Ok(methods.into_iter().collect())
    }
}

#[cfg(test)]
#[path = "../tests/universe_tests.rs"]
mod tests;
