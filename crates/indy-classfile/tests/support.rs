//! Shared fixtures for the class file tests.

use crate::image::{
    Access, CONSTRUCTOR_NAME, CallSiteImage, ClassImage, Descriptor, FieldImage, Insn,
    LINK_ENTRY_NAME, MethodImage, STATE_FIELD, STRATEGY_FIELD,
};
use indy_types::{MethodDecl, TypeDef, TypeId, TypeUniverse};
use std::sync::Arc;

/// A universe with `app.Greeter { greet(String) -> String }`.
pub(crate) fn greeter_universe() -> (Arc<TypeUniverse>, TypeId) {
    let universe = Arc::new(TypeUniverse::new());
    let greeter = universe
        .define(
            TypeDef::interface("app", "Greeter")
                .method(MethodDecl::new("greet", [TypeId::STRING], TypeId::STRING)),
        )
        .expect("define Greeter");
    (universe, greeter)
}

/// A well-formed proxy-shaped class implementing `app.Greeter`.
pub(crate) fn greeter_image(name: &str) -> ClassImage {
    let mut image = ClassImage::new(name, "app");
    let object = image.intern_type("lang.Object");
    let void = image.intern_type("void");
    let string = image.intern_type("lang.String");
    let bootstrap = image.intern_type("lang.invoke.Bootstrap");
    let method_type = image.intern_type("lang.invoke.MethodType");
    let method_handle = image.intern_type("lang.invoke.MethodHandle");
    let illegal_state = image.intern_type("lang.IllegalStateException");
    let greeter = image.intern_type("app.Greeter");

    image.super_class = object;
    image.interfaces.push(greeter);
    let strategy = image.add_field(FieldImage {
        name: STRATEGY_FIELD.to_string(),
        ty: bootstrap,
        access: Access::PRIVATE | Access::STATIC,
    });
    let state = image.add_field(FieldImage {
        name: STATE_FIELD.to_string(),
        ty: string,
        access: Access::PRIVATE,
    });

    image.add_method(MethodImage {
        name: CONSTRUCTOR_NAME.to_string(),
        descriptor: Descriptor {
            ret: void,
            params: vec![object],
        },
        access: Access::PUBLIC,
        throws: vec![],
        max_stack: 2,
        code: vec![
            Insn::GetStatic(strategy),
            Insn::IfNullThrow {
                exception: illegal_state,
                message: "strategy not assigned".to_string(),
            },
            Insn::LoadThis,
            Insn::LoadArg(0),
            Insn::CheckCast(string),
            Insn::PutField(state),
            Insn::ReturnVoid,
        ],
    });

    let site = image.add_call_site(CallSiteImage {
        name: "greet".to_string(),
        descriptor: Descriptor {
            ret: string,
            params: vec![string, string],
        },
    });
    image.add_method(MethodImage {
        name: "greet".to_string(),
        descriptor: Descriptor {
            ret: string,
            params: vec![string],
        },
        access: Access::PUBLIC,
        throws: vec![],
        max_stack: 2,
        code: vec![
            Insn::LoadThis,
            Insn::GetField(state),
            Insn::LoadArg(0),
            Insn::InvokeDynamic(site),
            Insn::Return,
        ],
    });

    image.link_entry = image.add_method(MethodImage {
        name: LINK_ENTRY_NAME.to_string(),
        descriptor: Descriptor {
            ret: method_handle,
            params: vec![string, method_type],
        },
        access: Access::PRIVATE | Access::STATIC | Access::SYNTHETIC,
        throws: vec![],
        max_stack: 4,
        code: vec![
            Insn::GetStatic(strategy),
            Insn::LoadClass,
            Insn::LoadArg(0),
            Insn::LoadArg(1),
            Insn::Link,
            Insn::Return,
        ],
    });
    image
}
