//! Proxy type synthesis.
//!
//! A `TypeDescriptor` is the complete, immutable description of one proxy
//! class. `lower` turns it into a `ClassImage` the class backend can encode
//! and load:
//!
//! ```text
//! fields:   strategy  private static   (link strategy, write-once)
//!           state     private          (payload, set by the constructor)
//! <init>(Object)void                   guard strategy, cast + store payload
//! m(P..)R                              state, args -> call site `m (S, P..)R`
//! m(P..)A   bridge, one per extra A    this, args -> m(P..)R, cast to A
//! $link(String, MethodType)MethodHandle  ask the strategy for a handler
//! ```

use crate::contract::{MergedContracts, MergedMethod};
use crate::error::ConfigError;
use indy_classfile::{
    Access, CONSTRUCTOR_NAME, CallSiteImage, ClassImage, Descriptor, FieldImage, Insn,
    LINK_ENTRY_NAME, MethodImage, STATE_FIELD, STRATEGY_FIELD,
};
use indy_types::{MethodDecl, TypeError, TypeId, TypeUniverse};
use tracing::debug;

/// Message of the exception the constructor throws when no strategy is
/// installed.
pub const STRATEGY_NOT_ASSIGNED: &str = "strategy not assigned";

#[derive(Clone, Debug)]
pub struct TypeDescriptor {
    pub name: String,
    pub namespace: String,
    pub state_type: TypeId,
    pub interfaces: Vec<TypeId>,
    pub methods: Vec<MergedMethod>,
    /// `<init>(Object)void`
    pub constructor: MethodDecl,
    /// `$link(String, MethodType)MethodHandle`
    pub link_entry: MethodDecl,
}

impl TypeDescriptor {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        state_type: TypeId,
        interfaces: &[TypeId],
        merged: &MergedContracts,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            state_type,
            interfaces: interfaces.to_vec(),
            methods: merged.iter().cloned().collect(),
            constructor: MethodDecl::new(CONSTRUCTOR_NAME, [TypeId::OBJECT], TypeId::VOID),
            link_entry: MethodDecl::new(
                LINK_ENTRY_NAME,
                [TypeId::STRING, TypeId::METHOD_TYPE],
                TypeId::METHOD_HANDLE,
            ),
        }
    }

    /// Lower to a loadable class image.
    pub fn lower(&self, universe: &TypeUniverse) -> Result<ClassImage, ConfigError> {
        let mut lowering = Lowering {
            universe,
            image: ClassImage::new(self.name.clone(), self.namespace.clone()),
        };
        lowering.image.super_class = lowering.ty(TypeId::OBJECT)?;
        for &interface in &self.interfaces {
            let index = lowering.ty(interface)?;
            lowering.image.interfaces.push(index);
        }

        let strategy_ty = lowering.ty(TypeId::BOOTSTRAP)?;
        let strategy = lowering.image.add_field(FieldImage {
            name: STRATEGY_FIELD.to_string(),
            ty: strategy_ty,
            access: Access::PRIVATE | Access::STATIC,
        });
        let state_ty = lowering.ty(self.state_type)?;
        let state = lowering.image.add_field(FieldImage {
            name: STATE_FIELD.to_string(),
            ty: state_ty,
            access: Access::PRIVATE,
        });
        let fields = Fields { strategy, state, state_ty };

        lowering.constructor(&self.constructor, &fields)?;
        for method in &self.methods {
            let concrete = lowering.concrete(method, &fields)?;
            for alt in method.bridge_returns() {
                lowering.bridge(method, concrete, alt)?;
            }
        }
        let link_entry = lowering.link_entry(&self.link_entry, &fields)?;
        lowering.image.link_entry = link_entry;

        let image = lowering.image;
        debug!(
            class = %image.name,
            methods = image.methods.len(),
            call_sites = image.call_sites.len(),
            "TypeDescriptor::lower"
        );
        Ok(image)
    }
}

struct Fields {
    strategy: u16,
    state: u16,
    state_ty: u16,
}

struct Lowering<'u> {
    universe: &'u TypeUniverse,
    image: ClassImage,
}

impl Lowering<'_> {
    /// Pool index of a universe type.
    fn ty(&mut self, id: TypeId) -> Result<u16, ConfigError> {
        let def = self.universe.get(id).ok_or(TypeError::UnknownType(id))?;
        Ok(self.image.intern_type(&def.qualified_name()))
    }

    fn descriptor(&mut self, ret: TypeId, params: &[TypeId]) -> Result<Descriptor, ConfigError> {
        Ok(Descriptor {
            ret: self.ty(ret)?,
            params: params
                .iter()
                .map(|&p| self.ty(p))
                .collect::<Result<_, _>>()?,
        })
    }

    fn returns(&self, ret: TypeId) -> Insn {
        if ret == TypeId::VOID { Insn::ReturnVoid } else { Insn::Return }
    }

    fn constructor(&mut self, decl: &MethodDecl, fields: &Fields) -> Result<u16, ConfigError> {
        let descriptor = self.descriptor(decl.ret, &decl.params)?;
        let illegal_state = self.ty(TypeId::ILLEGAL_STATE)?;
        Ok(self.image.add_method(MethodImage {
            name: decl.name.clone(),
            descriptor,
            access: Access::PUBLIC,
            throws: Vec::new(),
            max_stack: 2,
            code: vec![
                Insn::GetStatic(fields.strategy),
                Insn::IfNullThrow {
                    exception: illegal_state,
                    message: STRATEGY_NOT_ASSIGNED.to_string(),
                },
                Insn::LoadThis,
                Insn::LoadArg(0),
                Insn::CheckCast(fields.state_ty),
                Insn::PutField(fields.state),
                Insn::ReturnVoid,
            ],
        }))
    }

    fn concrete(&mut self, method: &MergedMethod, fields: &Fields) -> Result<u16, ConfigError> {
        let params = method.params();
        let descriptor = self.descriptor(method.ret, params)?;
        let mut site_params = Vec::with_capacity(params.len() + 1);
        site_params.push(fields.state_ty);
        site_params.extend(descriptor.params.iter().copied());
        let site = self.image.add_call_site(CallSiteImage {
            name: method.name().to_string(),
            descriptor: Descriptor {
                ret: descriptor.ret,
                params: site_params,
            },
        });
        let throws = method
            .exceptions
            .iter()
            .map(|&ex| self.ty(ex))
            .collect::<Result<Vec<_>, _>>()?;

        let mut code = Vec::with_capacity(params.len() + 4);
        code.push(Insn::LoadThis);
        code.push(Insn::GetField(fields.state));
        code.extend((0..params.len() as u16).map(Insn::LoadArg));
        code.push(Insn::InvokeDynamic(site));
        code.push(self.returns(method.ret));

        Ok(self.image.add_method(MethodImage {
            name: method.name().to_string(),
            descriptor,
            access: Access::PUBLIC,
            throws,
            max_stack: params.len() as u16 + 1,
            code,
        }))
    }

    fn bridge(&mut self, method: &MergedMethod, concrete: u16, ret: TypeId) -> Result<u16, ConfigError> {
        let params = method.params();
        let descriptor = self.descriptor(ret, params)?;
        let throws = method
            .exceptions
            .iter()
            .map(|&ex| self.ty(ex))
            .collect::<Result<Vec<_>, _>>()?;

        let mut code = Vec::with_capacity(params.len() + 4);
        code.push(Insn::LoadThis);
        code.extend((0..params.len() as u16).map(Insn::LoadArg));
        code.push(Insn::InvokeVirtual(concrete));
        code.push(Insn::CheckCast(descriptor.ret));
        code.push(self.returns(ret));

        Ok(self.image.add_method(MethodImage {
            name: method.name().to_string(),
            descriptor,
            access: Access::PUBLIC | Access::BRIDGE | Access::SYNTHETIC,
            throws,
            max_stack: params.len() as u16 + 1,
            code,
        }))
    }

    fn link_entry(&mut self, decl: &MethodDecl, fields: &Fields) -> Result<u16, ConfigError> {
        let descriptor = self.descriptor(decl.ret, &decl.params)?;
        Ok(self.image.add_method(MethodImage {
            name: decl.name.clone(),
            descriptor,
            access: Access::PRIVATE | Access::STATIC | Access::SYNTHETIC,
            throws: Vec::new(),
            max_stack: 4,
            code: vec![
                Insn::GetStatic(fields.strategy),
                Insn::LoadClass,
                Insn::LoadArg(0),
                Insn::LoadArg(1),
                Insn::Link,
                Insn::Return,
            ],
        }))
    }
}

/// Describe and lower a proxy class in one step.
pub fn synthesize(
    universe: &TypeUniverse,
    name: &str,
    namespace: &str,
    state_type: TypeId,
    interfaces: &[TypeId],
    merged: &MergedContracts,
) -> Result<ClassImage, ConfigError> {
    TypeDescriptor::new(name, namespace, state_type, interfaces, merged).lower(universe)
}

#[cfg(test)]
#[path = "tests/synth_tests.rs"]
mod tests;
