//! In-memory class images.
//!
//! Types are referenced through a per-image pool of qualified names so the
//! encoded bytes do not depend on the `TypeId` numbering of the universe that
//! produced them. The loader resolves the pool when the class is defined.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Name of the instance constructor.
pub const CONSTRUCTOR_NAME: &str = "<init>";
/// Name of the static method consulted when a call site is first linked.
pub const LINK_ENTRY_NAME: &str = "$link";
/// Static field holding the installed link strategy.
pub const STRATEGY_FIELD: &str = "strategy";
/// Instance field holding the payload.
pub const STATE_FIELD: &str = "state";

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Access: u16 {
        const PUBLIC = 1 << 0;
        const PRIVATE = 1 << 1;
        const STATIC = 1 << 2;
        /// Covariant forwarding stub.
        const BRIDGE = 1 << 3;
        const SYNTHETIC = 1 << 4;
    }
}

/// Method descriptor in terms of type-pool indices.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Descriptor {
    pub ret: u16,
    pub params: Vec<u16>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldImage {
    pub name: String,
    pub ty: u16,
    pub access: Access,
}

/// Instruction set of synthesized method bodies.
///
/// Operands live on a small stack. Every method ends with exactly one
/// `Return` or `ReturnVoid`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Insn {
    /// Push the receiver.
    LoadThis,
    /// Push the n-th declared parameter.
    LoadArg(u16),
    /// Push the class being executed.
    LoadClass,
    /// Pop a receiver, push the value of an instance field.
    GetField(u16),
    /// Pop a value and a receiver, store the value into the field.
    PutField(u16),
    /// Push the value of a static field (null when unassigned).
    GetStatic(u16),
    /// Pop a value; if it is null, throw `exception` with `message`.
    IfNullThrow { exception: u16, message: String },
    /// Check the top of stack against a pooled type.
    CheckCast(u16),
    /// Pop the site's arguments and invoke through call site n.
    InvokeDynamic(u16),
    /// Pop arguments and a receiver and invoke method n of this class directly.
    InvokeVirtual(u16),
    /// Pop strategy, class, name and method type; push the resolved handler.
    Link,
    Return,
    ReturnVoid,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodImage {
    pub name: String,
    pub descriptor: Descriptor,
    pub access: Access,
    /// Declared exception types (pool indices).
    pub throws: Vec<u16>,
    pub max_stack: u16,
    pub code: Vec<Insn>,
}

/// A dynamically linked call site referenced by `InvokeDynamic`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSiteImage {
    pub name: String,
    pub descriptor: Descriptor,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassImage {
    /// Qualified class name.
    pub name: String,
    pub namespace: String,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub type_pool: Vec<String>,
    pub fields: Vec<FieldImage>,
    pub methods: Vec<MethodImage>,
    pub call_sites: Vec<CallSiteImage>,
    /// Index of the link entry point in `methods`.
    pub link_entry: u16,
}

impl ClassImage {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            super_class: 0,
            interfaces: Vec::new(),
            type_pool: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            call_sites: Vec::new(),
            link_entry: 0,
        }
    }

    /// Pool index for a qualified type name, adding it if needed.
    pub fn intern_type(&mut self, qualified: &str) -> u16 {
        if let Some(index) = self.type_pool.iter().position(|t| t == qualified) {
            return index as u16;
        }
        self.type_pool.push(qualified.to_string());
        (self.type_pool.len() - 1) as u16
    }

    pub fn type_at(&self, index: u16) -> Option<&str> {
        self.type_pool.get(index as usize).map(String::as_str)
    }

    pub fn add_field(&mut self, field: FieldImage) -> u16 {
        self.fields.push(field);
        (self.fields.len() - 1) as u16
    }

    pub fn add_method(&mut self, method: MethodImage) -> u16 {
        self.methods.push(method);
        (self.methods.len() - 1) as u16
    }

    pub fn add_call_site(&mut self, site: CallSiteImage) -> u16 {
        self.call_sites.push(site);
        (self.call_sites.len() - 1) as u16
    }

    pub fn field_index(&self, name: &str) -> Option<u16> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .map(|i| i as u16)
    }

    /// Simple name: the part after the namespace.
    pub fn simple_name(&self) -> &str {
        self.name
            .strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(&self.name)
    }

    /// `name(descriptor)` label used in diagnostics.
    pub fn method_label(&self, method: &MethodImage) -> String {
        let render = |index: &u16| self.type_at(*index).unwrap_or("?").to_string();
        let params: Vec<String> = method.descriptor.params.iter().map(render).collect();
        format!(
            "{}({}){}",
            method.name,
            params.join(", "),
            render(&method.descriptor.ret)
        )
    }
}
