//! Structural verification of class images.
//!
//! Run before loading when the proxy factory is configured to verify. The
//! verifier never stops at the first problem; it reports every violation it
//! can find so a broken synthesizer change shows its whole footprint.

use crate::codec::decode;
use crate::error::Violation;
use crate::image::{Access, CONSTRUCTOR_NAME, ClassImage, Descriptor, Insn, LINK_ENTRY_NAME, MethodImage};
use indy_types::{TypeId, TypeUniverse};
use rustc_hash::FxHashSet;

/// Decode and verify encoded class bytes.
pub fn verify(bytes: &[u8], universe: &TypeUniverse) -> Vec<Violation> {
    match decode(bytes) {
        Ok(image) => verify_image(&image, universe),
        Err(err) => vec![Violation::class(err.to_string())],
    }
}

/// Pool entry as seen by the verifier.
#[derive(Copy, Clone, PartialEq, Eq)]
enum PoolEntry {
    Known(TypeId),
    /// The class under verification.
    This,
    Missing,
}

struct Verifier<'a> {
    image: &'a ClassImage,
    universe: &'a TypeUniverse,
    pool: Vec<PoolEntry>,
    violations: Vec<Violation>,
}

pub fn verify_image(image: &ClassImage, universe: &TypeUniverse) -> Vec<Violation> {
    let pool = image
        .type_pool
        .iter()
        .map(|name| {
            if *name == image.name {
                PoolEntry::This
            } else {
                universe
                    .lookup(name)
                    .map_or(PoolEntry::Missing, PoolEntry::Known)
            }
        })
        .collect();
    let mut verifier = Verifier {
        image,
        universe,
        pool,
        violations: Vec::new(),
    };
    verifier.check_pool();
    verifier.check_header();
    verifier.check_fields();
    verifier.check_call_sites();
    verifier.check_methods();
    verifier.violations
}

impl<'a> Verifier<'a> {
    fn class_violation(&mut self, message: String) {
        self.violations.push(Violation::class(message));
    }

    fn entry(&self, index: u16) -> Option<PoolEntry> {
        self.pool.get(index as usize).copied()
    }

    fn is_type(&self, index: u16, ty: TypeId) -> bool {
        self.entry(index) == Some(PoolEntry::Known(ty))
    }

    fn valid_index(&self, index: u16) -> bool {
        (index as usize) < self.pool.len()
    }

    fn valid_descriptor(&self, descriptor: &Descriptor) -> bool {
        self.valid_index(descriptor.ret) && descriptor.params.iter().all(|&p| self.valid_index(p))
    }

    fn check_pool(&mut self) {
        let image = self.image;
        for (index, name) in image.type_pool.iter().enumerate() {
            if self.pool[index] == PoolEntry::Missing {
                self.class_violation(format!("type pool entry {index} names unknown type `{name}`"));
            }
        }
    }

    fn check_header(&mut self) {
        if self.image.name.is_empty() {
            self.class_violation("class has no name".to_string());
        }
        if !self.valid_index(self.image.super_class) {
            self.class_violation(format!(
                "super class index {} out of range",
                self.image.super_class
            ));
        }
        let image = self.image;
        let mut seen = FxHashSet::default();
        for &iface in &image.interfaces {
            match self.entry(iface) {
                None => self.class_violation(format!("interface index {iface} out of range")),
                Some(PoolEntry::Known(id)) => {
                    if !self.universe.is_interface(id) {
                        self.class_violation(format!(
                            "`{}` is not an interface",
                            self.universe.type_name(id)
                        ));
                    }
                    if !seen.insert(id) {
                        self.class_violation(format!(
                            "interface `{}` listed twice",
                            self.universe.type_name(id)
                        ));
                    }
                }
                Some(PoolEntry::This) => {
                    self.class_violation("class lists itself as an interface".to_string())
                }
                Some(PoolEntry::Missing) => {}
            }
        }
    }

    fn check_fields(&mut self) {
        let image = self.image;
        let mut names = FxHashSet::default();
        for field in &image.fields {
            if !names.insert(field.name.as_str()) {
                self.class_violation(format!("duplicate field `{}`", field.name));
            }
            if !self.valid_index(field.ty) {
                self.class_violation(format!("field `{}` has invalid type index", field.name));
            }
        }
    }

    fn check_call_sites(&mut self) {
        let image = self.image;
        for (index, site) in image.call_sites.iter().enumerate() {
            if !self.valid_descriptor(&site.descriptor) {
                self.class_violation(format!("call site {index} `{}` has invalid descriptor", site.name));
            }
            if site.descriptor.params.is_empty() {
                self.class_violation(format!(
                    "call site {index} `{}` does not take the state argument",
                    site.name
                ));
            }
        }
    }

    fn check_methods(&mut self) {
        let image = self.image;
        let mut signatures = FxHashSet::default();
        let mut constructors = 0usize;
        for method in &image.methods {
            let label = image.method_label(method);
            if !signatures.insert((method.name.as_str(), &method.descriptor)) {
                self.violations
                    .push(Violation::method(&label, "duplicate method signature"));
            }
            if method.name == CONSTRUCTOR_NAME {
                constructors += 1;
                if method.access.contains(Access::STATIC) || !self.is_type(method.descriptor.ret, TypeId::VOID) {
                    self.violations
                        .push(Violation::method(&label, "constructor must be an instance method returning void"));
                }
            }
            if !self.valid_descriptor(&method.descriptor) {
                self.violations
                    .push(Violation::method(&label, "invalid descriptor"));
                continue;
            }
            for &thrown in &method.throws {
                match self.entry(thrown) {
                    Some(PoolEntry::Known(id)) if self.universe.is_assignable(id, TypeId::THROWABLE) => {}
                    _ => self
                        .violations
                        .push(Violation::method(&label, format!("declares non-throwable type index {thrown}"))),
                }
            }
            self.check_code(method, &label);
        }
        if constructors != 1 {
            self.class_violation(format!("expected exactly one constructor, found {constructors}"));
        }

        match image.methods.get(image.link_entry as usize) {
            None => self.class_violation(format!("link entry index {} out of range", image.link_entry)),
            Some(entry) => {
                if entry.name != LINK_ENTRY_NAME || !entry.access.contains(Access::STATIC) {
                    self.class_violation(format!(
                        "link entry `{}` must be the static `{LINK_ENTRY_NAME}` method",
                        entry.name
                    ));
                }
            }
        }
    }

    /// Simulate operand stack depth through a method body.
    fn check_code(&mut self, method: &MethodImage, label: &str) {
        let image = self.image;
        let is_static = method.access.contains(Access::STATIC);
        let is_link_entry = method.name == LINK_ENTRY_NAME;
        let returns_void = self.is_type(method.descriptor.ret, TypeId::VOID);
        let arity = method.descriptor.params.len();

        if method.code.is_empty() {
            self.violations.push(Violation::method(label, "empty code"));
            return;
        }

        let mut errors: Vec<String> = Vec::new();
        let mut depth: usize = 0;
        let mut max_depth: usize = 0;
        let last = method.code.len() - 1;
        for (pc, insn) in method.code.iter().enumerate() {
            let mut fail = |message: String| errors.push(format!("pc {pc}: {message}"));
            let (pops, pushes): (usize, usize) = match insn {
                Insn::LoadThis => {
                    if is_static {
                        fail("`LoadThis` in static method".to_string());
                    }
                    (0, 1)
                }
                Insn::LoadArg(n) => {
                    if *n as usize >= arity {
                        fail(format!("argument {n} out of range (arity {arity})"));
                    }
                    (0, 1)
                }
                Insn::LoadClass => (0, 1),
                Insn::GetField(f) | Insn::PutField(f) => {
                    match image.fields.get(*f as usize) {
                        None => fail(format!("field {f} out of range")),
                        Some(field) if field.access.contains(Access::STATIC) => {
                            fail(format!("instance access to static field `{}`", field.name))
                        }
                        Some(_) => {}
                    }
                    if matches!(insn, Insn::GetField(_)) { (1, 1) } else { (2, 0) }
                }
                Insn::GetStatic(f) => {
                    match image.fields.get(*f as usize) {
                        None => fail(format!("field {f} out of range")),
                        Some(field) if !field.access.contains(Access::STATIC) => {
                            fail(format!("static access to instance field `{}`", field.name))
                        }
                        Some(_) => {}
                    }
                    (0, 1)
                }
                Insn::IfNullThrow { exception, .. } => {
                    if (*exception as usize) >= self.pool.len() {
                        fail(format!("exception type index {exception} out of range"));
                    }
                    (1, 0)
                }
                Insn::CheckCast(t) => {
                    if (*t as usize) >= self.pool.len() {
                        fail(format!("cast type index {t} out of range"));
                    }
                    (1, 1)
                }
                Insn::InvokeDynamic(site) => match image.call_sites.get(*site as usize) {
                    None => {
                        fail(format!("call site {site} out of range"));
                        (0, 1)
                    }
                    Some(site) => {
                        let pushes = usize::from(!self.is_type(site.descriptor.ret, TypeId::VOID));
                        (site.descriptor.params.len(), pushes)
                    }
                },
                Insn::InvokeVirtual(target) => match image.methods.get(*target as usize) {
                    None => {
                        fail(format!("method {target} out of range"));
                        (0, 1)
                    }
                    Some(callee) => {
                        if callee.access.contains(Access::STATIC) || callee.name == CONSTRUCTOR_NAME {
                            fail(format!("`{}` is not a virtual method", callee.name));
                        }
                        if callee.access.contains(Access::BRIDGE) {
                            fail(format!("bridge `{}` invoked directly", callee.name));
                        }
                        let pushes = usize::from(!self.is_type(callee.descriptor.ret, TypeId::VOID));
                        (callee.descriptor.params.len() + 1, pushes)
                    }
                },
                Insn::Link => {
                    if !is_link_entry {
                        fail("`Link` outside the link entry point".to_string());
                    }
                    (4, 1)
                }
                Insn::Return | Insn::ReturnVoid => {
                    if pc != last {
                        fail("return before end of code".to_string());
                    }
                    let wants_value = matches!(insn, Insn::Return);
                    if wants_value == returns_void {
                        fail("return kind does not match descriptor".to_string());
                    }
                    (usize::from(wants_value), 0)
                }
            };

            if depth < pops {
                fail(format!("stack underflow (depth {depth}, needs {pops})"));
                depth = 0;
            } else {
                depth -= pops;
            }
            depth += pushes;
            max_depth = max_depth.max(depth);
        }
        self.violations
            .extend(errors.into_iter().map(|message| Violation::method(label, message)));

        if !matches!(method.code[last], Insn::Return | Insn::ReturnVoid) {
            self.violations
                .push(Violation::method(label, "code does not end with a return"));
        } else if depth != 0 {
            self.violations
                .push(Violation::method(label, format!("{depth} values left on the stack")));
        }
        if max_depth > method.max_stack as usize {
            self.violations.push(Violation::method(
                label,
                format!("max stack {} below required {max_depth}", method.max_stack),
            ));
        }
    }
}

#[cfg(test)]
#[path = "../tests/verify_tests.rs"]
mod tests;
