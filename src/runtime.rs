//! Executing loaded proxy classes.
//!
//! `ProxyClass<S>` pairs a `LoadedClass` with its call sites and runs the
//! method bodies the synthesizer emitted on a small operand stack. Instances
//! are `ProxyInstance<S>` objects handed out as `Proxy<S>` handles; they can
//! travel inside a `Value` like any other runtime object, which is what the
//! default `equals` relies on.

use crate::bootstrap::{Bootstrap, LinkRequest, MethodHandle};
use crate::call_site::CallSite;
use crate::error::Fault;
use crate::payload::Payload;
use crate::synth::STRATEGY_NOT_ASSIGNED;
use indy_classfile::{
    CONSTRUCTOR_NAME, Insn, LinkageError, LoadedClass, LoadedMethod, STATE_FIELD, STRATEGY_FIELD,
    StaticValue,
};
use indy_types::{MethodDecl, MethodType, ObjectRef, RuntimeObject, TypeId, TypeUniverse, Value};
use smallvec::SmallVec;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

/// Strategy as stored in the class's static slot.
type StrategyRef<S> = Arc<dyn Bootstrap<S>>;

// =============================================================================
// ProxyClass
// =============================================================================

pub struct ProxyClass<S: Payload> {
    loaded: Arc<LoadedClass>,
    universe: Arc<TypeUniverse>,
    state_field: u16,
    state_type: TypeId,
    call_sites: Vec<CallSite<S>>,
}

impl<S: Payload> fmt::Debug for ProxyClass<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyClass")
            .field("name", &self.loaded.name())
            .field("call_sites", &self.call_sites)
            .finish()
    }
}

impl<S: Payload> ProxyClass<S> {
    /// Wrap a loaded proxy class. The strategy is installed separately.
    pub fn new(loaded: Arc<LoadedClass>, universe: Arc<TypeUniverse>) -> Result<Self, LinkageError> {
        let no_state = || LinkageError::NoSuchField {
            class: loaded.name().to_string(),
            field: STATE_FIELD.to_string(),
        };
        let state_field = loaded.field_index(STATE_FIELD).ok_or_else(no_state)?;
        let state_type = loaded
            .fields()
            .get(state_field as usize)
            .map(|f| f.ty)
            .ok_or_else(no_state)?;
        let call_sites = loaded
            .call_sites()
            .iter()
            .map(|site| CallSite::new(site.name.clone(), site.ty.clone()))
            .collect();
        Ok(Self {
            loaded,
            universe,
            state_field,
            state_type,
            call_sites,
        })
    }

    pub fn id(&self) -> TypeId {
        self.loaded.id()
    }

    pub fn name(&self) -> &str {
        self.loaded.name()
    }

    pub fn namespace(&self) -> &str {
        self.loaded.namespace()
    }

    pub fn loaded(&self) -> &Arc<LoadedClass> {
        &self.loaded
    }

    pub fn universe(&self) -> &Arc<TypeUniverse> {
        &self.universe
    }

    pub fn state_type(&self) -> TypeId {
        self.state_type
    }

    pub fn call_sites(&self) -> &[CallSite<S>] {
        &self.call_sites
    }

    /// Number of call sites bound so far.
    pub fn linked_sites(&self) -> usize {
        self.call_sites.iter().filter(|site| site.is_linked()).count()
    }

    /// Store the strategy in the class's static slot. Allowed once.
    pub fn install(&self, strategy: StrategyRef<S>) -> Result<(), LinkageError> {
        self.loaded.set_static(STRATEGY_FIELD, Arc::new(strategy))?;
        trace!(class = %self.name(), "ProxyClass::install");
        Ok(())
    }

    pub fn is_installed(&self) -> bool {
        self.loaded
            .field_index(STRATEGY_FIELD)
            .and_then(|index| self.loaded.get_static(index))
            .is_some()
    }

    /// Run the `<init>(Object)void` constructor on `payload`.
    pub fn instantiate(self: &Arc<Self>, payload: S) -> Result<Proxy<S>, Fault> {
        let constructor = self
            .loaded
            .constructor()
            .map_err(|err| Fault::Linkage(err.to_string()))?;
        self.construct(constructor, payload)
    }

    /// Run constructor `index` on `payload`.
    pub fn construct(self: &Arc<Self>, index: u16, payload: S) -> Result<Proxy<S>, Fault> {
        let method = self.method(index)?;
        if method.name != CONSTRUCTOR_NAME {
            return Err(self.no_such_method(&method.name, &method.ty));
        }
        let mut frame = Frame::new(self, None, method, vec![Operand::Payload(payload)]);
        frame.run()?;
        let state = frame
            .constructed
            .take()
            .ok_or_else(|| Fault::IllegalState("constructor did not store the state".to_string()))?;
        Ok(Proxy(Arc::new(ProxyInstance {
            class: Arc::clone(self),
            state,
        })))
    }

    /// Invoke instance method `index` on `this`.
    pub(crate) fn call(&self, this: &ProxyInstance<S>, index: u16, args: &[Value]) -> Result<Value, Fault> {
        let method = self.method(index)?;
        if method.is_static() || method.name == CONSTRUCTOR_NAME {
            return Err(self.no_such_method(&method.name, &method.ty));
        }
        let operands = args.iter().cloned().map(Operand::Value).collect();
        let mut frame = Frame::new(self, Some(this), method, operands);
        match frame.run()? {
            Operand::Value(value) => Ok(value),
            other => Err(Fault::Linkage(format!(
                "`{}` returned a {} instead of a value",
                method.name,
                other.kind()
            ))),
        }
    }

    /// Run the link entry point for call site `site`.
    ///
    /// A handler that cannot be adapted to the site still links it: the site
    /// is bound to a handle that fails every call with the same
    /// `Fault::Linkage`, so the strategy is not consulted again.
    fn link(&self, site: u16) -> Result<MethodHandle<S>, Fault> {
        let call_site = self.call_site(site)?;
        let entry = self
            .loaded
            .link_entry()
            .ok_or_else(|| Fault::Linkage(format!("`{}` has no link entry point", self.name())))?;
        let args = vec![
            Operand::Value(Value::from(call_site.name())),
            Operand::Signature(call_site.signature().clone()),
        ];
        let mut frame = Frame::new(self, None, entry, args);
        let Operand::Handle(handle) = frame.run()? else {
            return Err(Fault::Linkage("link entry point did not return a handler".to_string()));
        };
        if let Some(adapted) = handle.as_type(call_site.signature(), &self.universe) {
            return Ok(adapted);
        }
        let fault = Fault::Linkage(format!(
            "handler {} cannot be adapted to call site `{}` {}",
            self.universe.render_method_type(handle.method_type()),
            call_site.name(),
            self.universe.render_method_type(call_site.signature()),
        ));
        warn!(class = %self.name(), site, %fault, "binding call site to a linkage failure");
        Ok(MethodHandle::new(
            call_site.signature().clone(),
            move |_: &S, _: &[Value]| Err(fault.clone()),
        ))
    }

    /// Consult the installed strategy; `Link` instruction body.
    fn resolve(&self, strategy: Option<&StaticValue>, name: &str, signature: &MethodType) -> Result<MethodHandle<S>, Fault> {
        let slot = strategy.ok_or_else(|| Fault::IllegalState(STRATEGY_NOT_ASSIGNED.to_string()))?;
        let strategy = slot
            .downcast_ref::<StrategyRef<S>>()
            .ok_or_else(|| Fault::Linkage(format!("`{}` holds a strategy for another payload type", self.name())))?;
        let request = LinkRequest::new(self, name, signature);
        trace!(
            class = %self.name(),
            method = name,
            signature = %self.universe.render_method_type(signature),
            "ProxyClass::resolve consulting strategy"
        );
        Ok(match strategy.bootstrap(&request) {
            Some(handle) => handle,
            None => {
                trace!(class = %self.name(), method = name, "ProxyClass::resolve unresolved");
                request.defaults().unsupported(name, signature)
            }
        })
    }

    fn method(&self, index: u16) -> Result<&LoadedMethod, Fault> {
        self.loaded
            .method(index)
            .ok_or_else(|| Fault::Linkage(format!("`{}` has no method #{index}", self.name())))
    }

    fn call_site(&self, index: u16) -> Result<&CallSite<S>, Fault> {
        self.call_sites
            .get(index as usize)
            .ok_or_else(|| Fault::Linkage(format!("`{}` has no call site #{index}", self.name())))
    }

    fn no_such_method(&self, name: &str, ty: &MethodType) -> Fault {
        Fault::NoSuchMethod {
            class: self.name().to_string(),
            method: format!("{name}{}", self.universe.render_method_type(ty)),
        }
    }

    fn class_cast(&self, value: &Value, expected: TypeId) -> Fault {
        Fault::ClassCast {
            expected: self.universe.type_name(expected),
            found: match value.runtime_type() {
                Some(ty) => self.universe.type_name(ty),
                None if value.is_null() => "null".to_string(),
                None => "void".to_string(),
            },
        }
    }
}

// =============================================================================
// Interpreter
// =============================================================================

enum Operand<'a, S> {
    Value(Value),
    /// The receiver, constructed or under construction.
    This,
    /// The receiver's payload.
    State(&'a S),
    /// Constructor argument, moved into the new instance.
    Payload(S),
    Static(Option<&'a StaticValue>),
    Class,
    Signature(MethodType),
    Handle(MethodHandle<S>),
}

impl<S> Operand<'_, S> {
    fn kind(&self) -> &'static str {
        match self {
            Operand::Value(_) => "value",
            Operand::This => "receiver",
            Operand::State(_) => "state",
            Operand::Payload(_) => "payload",
            Operand::Static(_) => "static",
            Operand::Class => "class",
            Operand::Signature(_) => "method type",
            Operand::Handle(_) => "method handle",
        }
    }

    fn is_null(&self) -> bool {
        matches!(self, Operand::Static(None) | Operand::Value(Value::Null))
    }
}

struct Frame<'a, S: Payload> {
    class: &'a ProxyClass<S>,
    this: Option<&'a ProxyInstance<S>>,
    method: &'a LoadedMethod,
    args: Vec<Operand<'a, S>>,
    /// State stored by a running constructor.
    constructed: Option<S>,
}

impl<'a, S: Payload> Frame<'a, S> {
    fn new(
        class: &'a ProxyClass<S>,
        this: Option<&'a ProxyInstance<S>>,
        method: &'a LoadedMethod,
        args: Vec<Operand<'a, S>>,
    ) -> Self {
        Self {
            class,
            this,
            method,
            args,
            constructed: None,
        }
    }

    fn fault(&self, message: impl fmt::Display) -> Fault {
        Fault::Linkage(format!("{}.{}: {message}", self.class.name(), self.method.name))
    }

    fn pop(&self, stack: &mut SmallVec<[Operand<'a, S>; 8]>) -> Result<Operand<'a, S>, Fault> {
        stack.pop().ok_or_else(|| self.fault("operand stack underflow"))
    }

    fn load_arg(&mut self, index: u16) -> Result<Operand<'a, S>, Fault> {
        let slot = self
            .args
            .get_mut(index as usize)
            .ok_or_else(|| Fault::Linkage(format!("argument {index} out of range")))?;
        Ok(match slot {
            Operand::Value(value) => Operand::Value(value.clone()),
            Operand::Signature(ty) => Operand::Signature(ty.clone()),
            Operand::Payload(_) => std::mem::replace(slot, Operand::Value(Value::Null)),
            other => {
                return Err(Fault::Linkage(format!("cannot load a {} argument", other.kind())));
            }
        })
    }

    fn receiver(&self, operand: Operand<'a, S>) -> Result<(), Fault> {
        match operand {
            Operand::This => Ok(()),
            other => Err(self.fault(format_args!("expected receiver, found {}", other.kind()))),
        }
    }

    fn check_cast(&self, operand: &Operand<'a, S>, target: TypeId) -> Result<(), Fault> {
        let universe = self.class.universe();
        match operand {
            Operand::Value(value) if value.conforms_to(target, universe) => Ok(()),
            Operand::Value(value) => Err(self.class.class_cast(value, target)),
            Operand::Payload(_) | Operand::State(_)
                if universe.is_assignable(self.class.state_type(), target) =>
            {
                Ok(())
            }
            other => Err(Fault::ClassCast {
                expected: universe.type_name(target),
                found: other.kind().to_string(),
            }),
        }
    }

    fn throw(&self, exception: u16, message: &str) -> Fault {
        let ty = self.class.loaded.type_at(exception);
        if ty == TypeId::ILLEGAL_STATE {
            Fault::IllegalState(message.to_string())
        } else {
            Fault::thrown(self.class.universe().type_name(ty), message)
        }
    }

    fn run(&mut self) -> Result<Operand<'a, S>, Fault> {
        let class = self.class;
        let loaded: &'a LoadedClass = &class.loaded;
        let method: &'a LoadedMethod = self.method;
        let mut stack: SmallVec<[Operand<'a, S>; 8]> = SmallVec::new();

        for insn in method.code.iter() {
            match insn {
                Insn::LoadThis => stack.push(Operand::This),
                Insn::LoadArg(index) => {
                    let operand = self.load_arg(*index)?;
                    stack.push(operand);
                }
                Insn::LoadClass => stack.push(Operand::Class),
                Insn::GetField(field) => {
                    let receiver = self.pop(&mut stack)?;
                    self.receiver(receiver)?;
                    if *field != class.state_field {
                        return Err(self.fault(format_args!("no readable field #{field}")));
                    }
                    let this = self
                        .this
                        .ok_or_else(|| Fault::IllegalState("state read before construction".to_string()))?;
                    stack.push(Operand::State(&this.state));
                }
                Insn::PutField(field) => {
                    let value = self.pop(&mut stack)?;
                    let receiver = self.pop(&mut stack)?;
                    self.receiver(receiver)?;
                    match value {
                        Operand::Payload(payload)
                            if *field == class.state_field
                                && self.this.is_none()
                                && self.constructed.is_none() =>
                        {
                            self.constructed = Some(payload);
                        }
                        _ => return Err(Fault::IllegalState("state is assigned once, by the constructor".to_string())),
                    }
                }
                Insn::GetStatic(field) => stack.push(Operand::Static(loaded.get_static(*field))),
                Insn::IfNullThrow { exception, message } => {
                    let operand = self.pop(&mut stack)?;
                    if operand.is_null() {
                        return Err(self.throw(*exception, message));
                    }
                }
                Insn::CheckCast(target) => {
                    let operand = self.pop(&mut stack)?;
                    self.check_cast(&operand, loaded.type_at(*target))?;
                    stack.push(operand);
                }
                Insn::InvokeDynamic(index) => {
                    let site = class.call_site(*index)?;
                    let arity = site.signature().arity();
                    if stack.len() < arity {
                        return Err(self.fault("operand stack underflow"));
                    }
                    let mut operands = stack.drain(stack.len() - arity..);
                    let Some(Operand::State(state)) = operands.next() else {
                        return Err(self.fault("call site invoked without state"));
                    };
                    let args = operands
                        .map(|operand| match operand {
                            Operand::Value(value) => Ok(value),
                            other => Err(Fault::Linkage(format!("cannot pass a {} to a handler", other.kind()))),
                        })
                        .collect::<Result<SmallVec<[Value; 4]>, _>>()?;
                    let handle = site.get_or_link(|| class.link(*index))?;
                    let result = handle.invoke(state, &args)?;
                    let ret = site.signature().ret;
                    if ret != TypeId::VOID {
                        if !result.conforms_to(ret, class.universe()) {
                            return Err(class.class_cast(&result, ret));
                        }
                        stack.push(Operand::Value(result));
                    }
                }
                Insn::InvokeVirtual(target) => {
                    let callee = class.method(*target)?;
                    let arity = callee.ty.arity();
                    if stack.len() < arity + 1 {
                        return Err(self.fault("operand stack underflow"));
                    }
                    let args = stack
                        .drain(stack.len() - arity..)
                        .map(|operand| match operand {
                            Operand::Value(value) => Ok(value),
                            other => Err(Fault::Linkage(format!("cannot pass a {} to a method", other.kind()))),
                        })
                        .collect::<Result<SmallVec<[Value; 4]>, _>>()?;
                    let receiver = self.pop(&mut stack)?;
                    self.receiver(receiver)?;
                    let this = self
                        .this
                        .ok_or_else(|| Fault::IllegalState("method invoked before construction".to_string()))?;
                    let result = class.call(this, *target, &args)?;
                    if callee.ty.ret != TypeId::VOID {
                        stack.push(Operand::Value(result));
                    }
                }
                Insn::Link => {
                    let signature = self.pop(&mut stack)?;
                    let name = self.pop(&mut stack)?;
                    let owner = self.pop(&mut stack)?;
                    let strategy = self.pop(&mut stack)?;
                    let (Operand::Static(strategy), Operand::Class, Operand::Value(Value::Str(name)), Operand::Signature(signature)) =
                        (strategy, owner, name, signature)
                    else {
                        return Err(self.fault("malformed link request"));
                    };
                    let handle = class.resolve(strategy, &name, &signature)?;
                    stack.push(Operand::Handle(handle));
                }
                Insn::Return => return self.pop(&mut stack),
                Insn::ReturnVoid => return Ok(Operand::Value(Value::Void)),
            }
        }
        Err(self.fault("code does not end with a return"))
    }
}

// =============================================================================
// Instances
// =============================================================================

/// One proxy object: its class plus exclusively owned state.
pub struct ProxyInstance<S: Payload> {
    class: Arc<ProxyClass<S>>,
    state: S,
}

impl<S: Payload> ProxyInstance<S> {
    pub fn class_id(&self) -> TypeId {
        self.class.id()
    }

    pub fn state(&self) -> &S {
        &self.state
    }
}

impl<S: Payload> fmt::Debug for ProxyInstance<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyInstance")
            .field("class", &self.class.name())
            .field("state", &self.state)
            .finish()
    }
}

impl<S: Payload> RuntimeObject for ProxyInstance<S> {
    fn runtime_type(&self) -> TypeId {
        self.class.id()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Handle to a proxy instance. Clones alias the same instance.
pub struct Proxy<S: Payload>(Arc<ProxyInstance<S>>);

impl<S: Payload> Clone for Proxy<S> {
    fn clone(&self) -> Self {
        Proxy(Arc::clone(&self.0))
    }
}

impl<S: Payload> fmt::Debug for Proxy<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<S: Payload> Proxy<S> {
    pub fn state(&self) -> &S {
        &self.0.state
    }

    pub fn proxy_class(&self) -> &Arc<ProxyClass<S>> {
        &self.0.class
    }

    /// This instance as a runtime value.
    pub fn to_value(&self) -> Value {
        let object: ObjectRef = self.0.clone();
        Value::Object(object)
    }

    pub fn is_instance_of(&self, ty: TypeId) -> bool {
        self.0.class.universe().is_assignable(self.0.class.id(), ty)
    }

    /// Invoke the public method `name` with exactly `ty`.
    pub fn invoke(&self, name: &str, ty: &MethodType, args: &[Value]) -> Result<Value, Fault> {
        let class = &self.0.class;
        let loaded = class.loaded();
        let index = loaded
            .find_method(name, ty)
            .filter(|&index| loaded.method(index).is_some_and(|m| !m.is_static() && m.name != CONSTRUCTOR_NAME))
            .ok_or_else(|| class.no_such_method(name, ty))?;
        if args.len() != ty.arity() {
            return Err(Fault::WrongArity {
                method: name.to_string(),
                expected: ty.arity(),
                found: args.len(),
            });
        }
        for (arg, &param) in args.iter().zip(&ty.params) {
            if !arg.conforms_to(param, class.universe()) {
                return Err(class.class_cast(arg, param));
            }
        }
        class.call(&self.0, index, args)
    }

    /// Typed access through one of the implemented interfaces.
    pub fn view(&self, interface: TypeId) -> Result<InterfaceView<'_, S>, Fault> {
        if !self.is_instance_of(interface) {
            let universe = self.0.class.universe();
            return Err(Fault::ClassCast {
                expected: universe.type_name(interface),
                found: self.0.class.name().to_string(),
            });
        }
        Ok(InterfaceView {
            proxy: self,
            interface,
        })
    }

    /// `equals(Object)boolean`. Primitive and void arguments are never equal
    /// to a proxy.
    pub fn equals(&self, other: &Value) -> Result<bool, Fault> {
        if !other.conforms_to(TypeId::OBJECT, self.0.class.universe()) {
            return Ok(false);
        }
        let ty = MethodType::new(TypeId::BOOLEAN, [TypeId::OBJECT]);
        let result = self.invoke("equals", &ty, std::slice::from_ref(other))?;
        result.as_bool().ok_or_else(|| self.0.class.class_cast(&result, TypeId::BOOLEAN))
    }

    /// `hashCode()int`
    pub fn hash_code(&self) -> Result<i32, Fault> {
        let result = self.invoke("hashCode", &MethodType::nullary(TypeId::INT), &[])?;
        result.as_int().ok_or_else(|| self.0.class.class_cast(&result, TypeId::INT))
    }

    /// `toString()String`
    pub fn to_display_string(&self) -> Result<String, Fault> {
        let result = self.invoke("toString", &MethodType::nullary(TypeId::STRING), &[])?;
        match result.as_str() {
            Some(s) => Ok(s.to_string()),
            None if result.is_null() => Ok("null".to_string()),
            None => Err(self.0.class.class_cast(&result, TypeId::STRING)),
        }
    }
}

/// A proxy seen through one interface. Calls resolve against the
/// interface's own declarations, so covariant bridges are used where the
/// interface asks for a wider return type.
pub struct InterfaceView<'p, S: Payload> {
    proxy: &'p Proxy<S>,
    interface: TypeId,
}

impl<S: Payload> fmt::Debug for InterfaceView<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceView")
            .field("interface", &self.interface)
            .field("proxy", self.proxy)
            .finish()
    }
}

impl<S: Payload> InterfaceView<'_, S> {
    pub fn interface(&self) -> TypeId {
        self.interface
    }

    /// Call the most specific declaration of `name` that accepts `args`.
    /// Declarations sharing a parameter list resolve to the first one, which
    /// is the interface's own before anything inherited.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, Fault> {
        let class = self.proxy.proxy_class();
        let universe = class.universe();
        let mut candidates = universe.methods_of(self.interface).unwrap_or_default();
        candidates.extend(universe.methods_of(TypeId::OBJECT).unwrap_or_default());
        candidates.retain(|decl| {
            decl.name == name
                && decl.params.len() == args.len()
                && args.iter().zip(&decl.params).all(|(arg, &p)| arg.conforms_to(p, universe))
        });
        if candidates.is_empty() {
            return Err(Fault::NoSuchMethod {
                class: universe.type_name(self.interface),
                method: name.to_string(),
            });
        }
        let at_least_as_specific = |a: &MethodDecl, b: &MethodDecl| {
            a.params.iter().zip(&b.params).all(|(&pa, &pb)| universe.is_assignable(pa, pb))
        };
        let decl = candidates
            .iter()
            .find(|&a| candidates.iter().all(|b| at_least_as_specific(a, b)))
            .ok_or_else(|| Fault::AmbiguousMethod {
                class: universe.type_name(self.interface),
                method: name.to_string(),
            })?;
        self.proxy.invoke(name, &decl.method_type(), args)
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
