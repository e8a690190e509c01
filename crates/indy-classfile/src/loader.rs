//! Class loading scope.
//!
//! A `ClassLoader` installs encoded class images into a shared
//! `TypeUniverse` and keeps the executable `LoadedClass` handles. Names are
//! unique per loader; `reserve_name` hands out the first free sequential name
//! atomically so concurrent factory builds never race on naming.

use crate::codec::decode;
use crate::error::LinkageError;
use crate::image::{Access, CONSTRUCTOR_NAME, ClassImage, Descriptor, Insn};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use indy_types::{MethodDecl, MethodType, TypeDef, TypeError, TypeId, TypeUniverse};
use once_cell::sync::OnceCell;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Value stored in a static field slot.
pub type StaticValue = Arc<dyn Any + Send + Sync>;

enum ClassSlot {
    /// Name handed out by `reserve_name`, class not yet defined.
    Reserved,
    Defined(Arc<LoadedClass>),
}

pub struct ClassLoader {
    universe: Arc<TypeUniverse>,
    classes: DashMap<String, ClassSlot>,
}

impl fmt::Debug for ClassLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassLoader")
            .field("classes", &self.classes.len())
            .finish()
    }
}

impl ClassLoader {
    pub fn new(universe: Arc<TypeUniverse>) -> Self {
        Self {
            universe,
            classes: DashMap::new(),
        }
    }

    pub fn universe(&self) -> &Arc<TypeUniverse> {
        &self.universe
    }

    /// Whether `name` is defined or reserved in this loader or names any
    /// type of the universe.
    pub fn is_taken(&self, name: &str) -> bool {
        self.classes.contains_key(name) || self.universe.lookup(name).is_some()
    }

    /// Reserve and return the first free `<namespace>.<prefix>$<n>`.
    pub fn reserve_name(&self, namespace: &str, prefix: &str) -> String {
        let mut index = 0usize;
        loop {
            let name = if namespace.is_empty() {
                format!("{prefix}${index}")
            } else {
                format!("{namespace}.{prefix}${index}")
            };
            if self.universe.lookup(&name).is_none() {
                if let Entry::Vacant(slot) = self.classes.entry(name.clone()) {
                    slot.insert(ClassSlot::Reserved);
                    trace!(name = %name, "ClassLoader::reserve_name");
                    return name;
                }
            }
            index += 1;
        }
    }

    pub fn find_class(&self, name: &str) -> Option<Arc<LoadedClass>> {
        self.classes.get(name).and_then(|slot| match slot.value() {
            ClassSlot::Defined(class) => Some(Arc::clone(class)),
            ClassSlot::Reserved => None,
        })
    }

    /// Decode `bytes`, register the class in the universe and return the
    /// executable handle.
    pub fn define_class(&self, name: &str, bytes: &[u8]) -> Result<Arc<LoadedClass>, LinkageError> {
        let image = decode(bytes)?;
        if image.name != name {
            return Err(LinkageError::NameMismatch {
                expected: name.to_string(),
                found: image.name,
            });
        }
        if let Some(slot) = self.classes.get(name) {
            if matches!(slot.value(), ClassSlot::Defined(_)) {
                return Err(LinkageError::DuplicateClass(name.to_string()));
            }
        }

        let class = Arc::new(self.link(image)?);
        debug!(
            class = %class.name,
            type_id = class.id.0,
            methods = class.methods.len(),
            call_sites = class.call_sites.len(),
            "ClassLoader::define_class"
        );
        self.classes
            .insert(name.to_string(), ClassSlot::Defined(Arc::clone(&class)));
        Ok(class)
    }

    /// Resolve the type pool, register the class type and build method tables.
    fn link(&self, image: ClassImage) -> Result<LoadedClass, LinkageError> {
        let universe = &self.universe;
        let mut pool: Vec<Option<TypeId>> = Vec::with_capacity(image.type_pool.len());
        for qualified in &image.type_pool {
            if *qualified == image.name {
                pool.push(None);
                continue;
            }
            let id = universe
                .lookup(qualified)
                .ok_or_else(|| LinkageError::NoClassDefFound {
                    class: image.name.clone(),
                    missing: qualified.clone(),
                })?;
            pool.push(Some(id));
        }
        let resolve_external = |index: u16| -> Result<TypeId, LinkageError> {
            pool.get(index as usize)
                .copied()
                .flatten()
                .ok_or_else(|| LinkageError::IncompatibleClassChange {
                    class: image.name.clone(),
                    message: format!("type index {index} does not name an external type"),
                })
        };

        let super_class = resolve_external(image.super_class)?;
        let mut interfaces = Vec::with_capacity(image.interfaces.len());
        for &index in &image.interfaces {
            let id = resolve_external(index)?;
            if !universe.is_interface(id) {
                return Err(LinkageError::IncompatibleClassChange {
                    class: image.name.clone(),
                    message: format!("`{}` is not an interface", universe.type_name(id)),
                });
            }
            interfaces.push(id);
        }

        // The class type itself: public instance methods become its declared
        // methods so `methods_of`-style queries see them.
        let mut declared = Vec::new();
        for method in &image.methods {
            if method.name == CONSTRUCTOR_NAME
                || method.access.intersects(Access::STATIC | Access::BRIDGE | Access::PRIVATE)
            {
                continue;
            }
            let ty = resolve_descriptor_external(&pool, &method.descriptor, &image.name)?;
            let throws = method
                .throws
                .iter()
                .map(|&t| resolve_external(t))
                .collect::<Result<Vec<_>, _>>()?;
            declared.push(MethodDecl::new(method.name.clone(), ty.params.iter().copied(), ty.ret).throws(throws));
        }
        let mut def = TypeDef::class(image.namespace.clone(), image.simple_name().to_string())
            .extends(super_class);
        for &iface in &interfaces {
            def = def.extends(iface);
        }
        def.methods = declared;
        let id = universe.define(def).map_err(|err| match err {
            TypeError::DuplicateType { name } => LinkageError::DuplicateClass(name),
            other => LinkageError::Type(other),
        })?;

        let types: Vec<TypeId> = pool.iter().map(|t| t.unwrap_or(id)).collect();
        let resolve = |index: u16| types.get(index as usize).copied().unwrap_or(TypeId::INVALID);
        let resolve_descriptor = |d: &Descriptor| MethodType::new(resolve(d.ret), d.params.iter().map(|&p| resolve(p)));

        let fields = image
            .fields
            .iter()
            .map(|f| LoadedField {
                name: f.name.clone(),
                ty: resolve(f.ty),
                access: f.access,
                value: OnceCell::new(),
            })
            .collect();

        let mut method_index = FxHashMap::default();
        let mut methods = Vec::with_capacity(image.methods.len());
        for (index, method) in image.methods.iter().enumerate() {
            let ty = resolve_descriptor(&method.descriptor);
            method_index.insert((method.name.clone(), ty.clone()), index as u16);
            methods.push(LoadedMethod {
                name: method.name.clone(),
                ty,
                access: method.access,
                throws: method.throws.iter().map(|&t| resolve(t)).collect(),
                max_stack: method.max_stack,
                code: method.code.clone().into(),
            });
        }

        let call_sites = image
            .call_sites
            .iter()
            .map(|site| SiteDescriptor {
                name: site.name.clone(),
                ty: resolve_descriptor(&site.descriptor),
            })
            .collect();

        Ok(LoadedClass {
            id,
            name: image.name.clone(),
            namespace: image.namespace.clone(),
            interfaces,
            types,
            fields,
            methods,
            method_index,
            call_sites,
            link_entry: image.link_entry,
        })
    }
}

fn resolve_descriptor_external(
    pool: &[Option<TypeId>],
    descriptor: &Descriptor,
    class: &str,
) -> Result<MethodType, LinkageError> {
    let lookup = |index: u16| {
        pool.get(index as usize)
            .copied()
            .flatten()
            .ok_or_else(|| LinkageError::IncompatibleClassChange {
                class: class.to_string(),
                message: format!("public method refers to type index {index}"),
            })
    };
    let ret = lookup(descriptor.ret)?;
    let params = descriptor
        .params
        .iter()
        .map(|&p| lookup(p))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(MethodType::new(ret, params))
}

// =============================================================================
// LoadedClass
// =============================================================================

#[derive(Debug)]
pub struct LoadedMethod {
    pub name: String,
    pub ty: MethodType,
    pub access: Access,
    pub throws: Vec<TypeId>,
    pub max_stack: u16,
    pub code: Arc<[Insn]>,
}

impl LoadedMethod {
    pub fn is_static(&self) -> bool {
        self.access.contains(Access::STATIC)
    }

    pub fn is_bridge(&self) -> bool {
        self.access.contains(Access::BRIDGE)
    }
}

/// Resolved call-site identity: method name plus full site signature
/// (state type leading).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SiteDescriptor {
    pub name: String,
    pub ty: MethodType,
}

pub struct LoadedField {
    pub name: String,
    pub ty: TypeId,
    pub access: Access,
    /// Static value; written at most once.
    value: OnceCell<StaticValue>,
}

impl fmt::Debug for LoadedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedField")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("access", &self.access)
            .field("assigned", &self.value.get().is_some())
            .finish()
    }
}

/// An executable class installed by a `ClassLoader`.
#[derive(Debug)]
pub struct LoadedClass {
    id: TypeId,
    name: String,
    namespace: String,
    interfaces: Vec<TypeId>,
    types: Vec<TypeId>,
    fields: Vec<LoadedField>,
    methods: Vec<LoadedMethod>,
    method_index: FxHashMap<(String, MethodType), u16>,
    call_sites: Vec<SiteDescriptor>,
    link_entry: u16,
}

impl LoadedClass {
    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn interfaces(&self) -> &[TypeId] {
        &self.interfaces
    }

    /// Resolved type-pool entry.
    pub fn type_at(&self, index: u16) -> TypeId {
        self.types
            .get(index as usize)
            .copied()
            .unwrap_or(TypeId::INVALID)
    }

    pub fn methods(&self) -> &[LoadedMethod] {
        &self.methods
    }

    pub fn method(&self, index: u16) -> Option<&LoadedMethod> {
        self.methods.get(index as usize)
    }

    /// Exact lookup by name and method type.
    pub fn find_method(&self, name: &str, ty: &MethodType) -> Option<u16> {
        self.method_index.get(&(name.to_string(), ty.clone())).copied()
    }

    /// The `<init>(Object)void` constructor.
    pub fn constructor(&self) -> Result<u16, LinkageError> {
        let ty = MethodType::new(TypeId::VOID, [TypeId::OBJECT]);
        self.find_method(CONSTRUCTOR_NAME, &ty)
            .ok_or_else(|| LinkageError::NoSuchMethod {
                class: self.name.clone(),
                method: format!("{CONSTRUCTOR_NAME}(Object)void"),
            })
    }

    pub fn link_entry(&self) -> Option<&LoadedMethod> {
        self.method(self.link_entry)
    }

    pub fn call_sites(&self) -> &[SiteDescriptor] {
        &self.call_sites
    }

    pub fn call_site(&self, index: u16) -> Option<&SiteDescriptor> {
        self.call_sites.get(index as usize)
    }

    pub fn fields(&self) -> &[LoadedField] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<u16> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .map(|i| i as u16)
    }

    /// Assign a static field. Each static field can be written once.
    pub fn set_static(&self, name: &str, value: StaticValue) -> Result<(), LinkageError> {
        let field = self
            .fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| LinkageError::NoSuchField {
                class: self.name.clone(),
                field: name.to_string(),
            })?;
        if !field.access.contains(Access::STATIC) {
            return Err(LinkageError::FieldNotStatic {
                class: self.name.clone(),
                field: name.to_string(),
            });
        }
        field
            .value
            .set(value)
            .map_err(|_| LinkageError::AlreadyAssigned {
                class: self.name.clone(),
                field: name.to_string(),
            })?;
        trace!(class = %self.name, field = name, "LoadedClass::set_static");
        Ok(())
    }

    /// Current value of a static field; `None` while unassigned.
    pub fn get_static(&self, index: u16) -> Option<&StaticValue> {
        self.fields
            .get(index as usize)
            .filter(|f| f.access.contains(Access::STATIC))
            .and_then(|f| f.value.get())
    }
}

#[cfg(test)]
#[path = "../tests/loader_tests.rs"]
mod tests;
