//! Link strategies.
//!
//! A `Bootstrap<S>` is consulted the first time a call site of a proxy class
//! is invoked. It receives a `LinkRequest` naming the class, the method and
//! the site signature (state type leading) and answers with a
//! `MethodHandle<S>`, or `None` when it has no implementation; the site then
//! binds a handler that always fails with `Fault::UnsupportedOperation`.
//!
//! `DefaultMethods` provides the object-method implementations most
//! strategies delegate to before looking at their own handlers.

use crate::error::Fault;
use crate::payload::Payload;
use crate::runtime::{ProxyClass, ProxyInstance};
use indy_types::{MethodType, TypeId, TypeUniverse, Value};
use rustc_hash::FxHashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

// =============================================================================
// MethodHandle
// =============================================================================

/// Handler body: the instance state followed by the declared arguments.
pub type HandlerFn<S> = dyn Fn(&S, &[Value]) -> Result<Value, Fault> + Send + Sync;

/// A typed, shareable handler.
///
/// The method type includes the state type as its first parameter, matching
/// the call-site signature it is bound to.
pub struct MethodHandle<S> {
    ty: MethodType,
    target: Arc<HandlerFn<S>>,
}

impl<S> Clone for MethodHandle<S> {
    fn clone(&self) -> Self {
        Self {
            ty: self.ty.clone(),
            target: Arc::clone(&self.target),
        }
    }
}

impl<S> fmt::Debug for MethodHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodHandle").field("ty", &self.ty).finish()
    }
}

impl<S: 'static> MethodHandle<S> {
    pub fn new<F>(ty: MethodType, target: F) -> Self
    where
        F: Fn(&S, &[Value]) -> Result<Value, Fault> + Send + Sync + 'static,
    {
        Self {
            ty,
            target: Arc::new(target),
        }
    }

    /// A handler ignoring its arguments and returning `value`.
    pub fn constant(ty: MethodType, value: Value) -> Self {
        Self::new(ty, move |_, _| Ok(value.clone()))
    }

    pub fn method_type(&self) -> &MethodType {
        &self.ty
    }

    /// Call the handler. `args` excludes the leading state.
    pub fn invoke(&self, state: &S, args: &[Value]) -> Result<Value, Fault> {
        (self.target)(state, args)
    }

    /// View this handler at `site`, if its type can be adapted.
    ///
    /// The state type must match exactly. Site parameters must be assignable
    /// to the handler's, and the handler's return type to the site's; a
    /// `void` site discards any result.
    pub fn as_type(&self, site: &MethodType, universe: &TypeUniverse) -> Option<Self> {
        if self.ty == *site {
            return Some(self.clone());
        }
        if self.ty.arity() != site.arity() || self.ty.params.first() != site.params.first() {
            return None;
        }
        let params_fit = site
            .params
            .iter()
            .zip(&self.ty.params)
            .skip(1)
            .all(|(&from, &to)| universe.is_assignable(from, to));
        if !params_fit {
            return None;
        }
        let discard = site.ret == TypeId::VOID;
        if !discard && !universe.is_assignable(self.ty.ret, site.ret) {
            return None;
        }
        let target = Arc::clone(&self.target);
        Some(Self::new(site.clone(), move |state: &S, args: &[Value]| {
            let result = target(state, args)?;
            Ok(if discard { Value::Void } else { result })
        }))
    }
}

// =============================================================================
// Bootstrap
// =============================================================================

/// A link strategy for proxies carrying `S`.
pub trait Bootstrap<S: Payload>: Send + Sync {
    /// Universe type of the payload.
    fn state_type(&self) -> TypeId;

    /// Resolve a call site. Must be side-effect free: concurrent first calls
    /// may consult the strategy more than once for the same site.
    fn bootstrap(&self, request: &LinkRequest<'_, S>) -> Option<MethodHandle<S>>;
}

/// Everything a strategy learns about the call site it resolves.
pub struct LinkRequest<'a, S: Payload> {
    class: &'a ProxyClass<S>,
    name: &'a str,
    signature: &'a MethodType,
}

impl<'a, S: Payload> LinkRequest<'a, S> {
    pub(crate) fn new(class: &'a ProxyClass<S>, name: &'a str, signature: &'a MethodType) -> Self {
        Self {
            class,
            name,
            signature,
        }
    }

    pub fn proxy_class(&self) -> &'a ProxyClass<S> {
        self.class
    }

    pub fn universe(&self) -> &'a TypeUniverse {
        self.class.universe()
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Site signature, state type leading.
    pub fn signature(&self) -> &'a MethodType {
        self.signature
    }

    /// Whether this request is for `name` with exactly `signature`.
    pub fn is(&self, name: &str, signature: &MethodType) -> bool {
        self.name == name && self.signature == signature
    }

    pub fn defaults(&self) -> DefaultMethods<S> {
        DefaultMethods::new(self.class)
    }
}

impl<S: Payload> fmt::Debug for LinkRequest<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkRequest")
            .field("class", &self.class.name())
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish()
    }
}

// =============================================================================
// DefaultMethods
// =============================================================================

/// Default object-method handlers for one proxy class.
pub struct DefaultMethods<S> {
    class: TypeId,
    state_type: TypeId,
    universe: Arc<TypeUniverse>,
    _state: PhantomData<fn(&S)>,
}

impl<S: Payload> DefaultMethods<S> {
    pub fn new(class: &ProxyClass<S>) -> Self {
        Self {
            class: class.id(),
            state_type: class.state_type(),
            universe: Arc::clone(class.universe()),
            _state: PhantomData,
        }
    }

    /// `toString (S)String`: the payload's display form.
    pub fn to_string(&self) -> MethodHandle<S> {
        MethodHandle::new(
            MethodType::new(TypeId::STRING, [self.state_type]),
            |state: &S, _: &[Value]| Ok(Value::from(state.to_string())),
        )
    }

    /// `hashCode (S)int`: the payload's hash.
    pub fn hash_code(&self) -> MethodHandle<S> {
        MethodHandle::new(
            MethodType::new(TypeId::INT, [self.state_type]),
            |state: &S, _: &[Value]| Ok(Value::Int(state.hash_code())),
        )
    }

    /// `equals (S, Object)boolean`: true iff the argument is an instance of
    /// the same proxy class carrying an equal payload. Never fails.
    pub fn equals(&self) -> MethodHandle<S> {
        let class = self.class;
        MethodHandle::new(
            MethodType::new(TypeId::BOOLEAN, [self.state_type, TypeId::OBJECT]),
            move |state: &S, args: &[Value]| {
                let equal = args
                    .first()
                    .and_then(Value::as_object)
                    .and_then(|other| other.as_any().downcast_ref::<ProxyInstance<S>>())
                    .is_some_and(|other| other.class_id() == class && other.state() == state);
                Ok(Value::Bool(equal))
            },
        )
    }

    /// A handler for `name` at `signature` that always fails.
    pub fn unsupported(&self, name: &str, signature: &MethodType) -> MethodHandle<S> {
        let method = name.to_string();
        let return_type = self.universe.type_name(signature.ret);
        MethodHandle::new(signature.clone(), move |_: &S, _: &[Value]| {
            Err(Fault::UnsupportedOperation {
                method: method.clone(),
                return_type: return_type.clone(),
            })
        })
    }

    /// The default handler for an object method, if `request` asks for one.
    pub fn implementation_of(&self, request: &LinkRequest<'_, S>) -> Option<MethodHandle<S>> {
        let state = self.state_type;
        match request.name() {
            "toString" if *request.signature() == MethodType::new(TypeId::STRING, [state]) => {
                Some(self.to_string())
            }
            "hashCode" if *request.signature() == MethodType::new(TypeId::INT, [state]) => {
                Some(self.hash_code())
            }
            "equals"
                if *request.signature()
                    == MethodType::new(TypeId::BOOLEAN, [state, TypeId::OBJECT]) =>
            {
                Some(self.equals())
            }
            _ => None,
        }
    }
}

// =============================================================================
// FnBootstrap
// =============================================================================

/// A strategy backed by a table of named handlers.
///
/// Resolution order: object-method defaults, then the first registered
/// handler for the name whose type adapts to the site, then unresolved.
pub struct FnBootstrap<S> {
    state_type: TypeId,
    handlers: FxHashMap<String, Vec<MethodHandle<S>>>,
}

impl<S: Payload> FnBootstrap<S> {
    pub fn new(state_type: TypeId) -> Self {
        Self {
            state_type,
            handlers: FxHashMap::default(),
        }
    }

    /// Register a handler for `name`. Its method type must lead with the
    /// state type.
    pub fn handler(mut self, name: impl Into<String>, handle: MethodHandle<S>) -> Self {
        self.handlers.entry(name.into()).or_default().push(handle);
        self
    }

    /// Register a closure typed `(S, params..)ret`.
    pub fn function<F>(
        self,
        name: impl Into<String>,
        ret: TypeId,
        params: impl IntoIterator<Item = TypeId>,
        target: F,
    ) -> Self
    where
        F: Fn(&S, &[Value]) -> Result<Value, Fault> + Send + Sync + 'static,
    {
        let ty = MethodType::new(ret, params).with_leading(self.state_type);
        self.handler(name, MethodHandle::new(ty, target))
    }
}

impl<S: Payload> Bootstrap<S> for FnBootstrap<S> {
    fn state_type(&self) -> TypeId {
        self.state_type
    }

    fn bootstrap(&self, request: &LinkRequest<'_, S>) -> Option<MethodHandle<S>> {
        if let Some(default) = request.defaults().implementation_of(request) {
            return Some(default);
        }
        self.handlers.get(request.name())?.iter().find_map(|handle| {
            handle.as_type(request.signature(), request.universe())
        })
    }
}

#[cfg(test)]
#[path = "tests/bootstrap_tests.rs"]
mod tests;
