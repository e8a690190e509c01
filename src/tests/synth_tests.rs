use super::*;
use crate::contract::merge_contracts;
use crate::test_fixtures::say_hello_interfaces;
use indy_classfile::{decode, emit, verify, verify_image};
use indy_types::TypeDef;

fn say_hello_image(universe: &TypeUniverse) -> ClassImage {
    let (first, second) = say_hello_interfaces(universe);
    let merged = merge_contracts(universe, &[first, second]).expect("merge");
    synthesize(universe, "app.IndyProxy$0", "app", TypeId::STRING, &[first, second], &merged)
        .expect("synthesize")
}

fn methods_named<'i>(image: &'i ClassImage, name: &str) -> Vec<&'i MethodImage> {
    image.methods.iter().filter(|m| m.name == name).collect()
}

#[test]
fn test_layout_of_say_hello_proxy() {
    let universe = TypeUniverse::new();
    let image = say_hello_image(&universe);

    assert_eq!(image.name, "app.IndyProxy$0");
    assert_eq!(image.namespace, "app");
    assert_eq!(image.type_at(image.super_class), Some("lang.Object"));
    let interfaces: Vec<_> = image.interfaces.iter().filter_map(|&i| image.type_at(i)).collect();
    assert_eq!(interfaces, ["app.Interface1", "app.Interface2"]);

    let fields: Vec<_> = image.fields.iter().map(|f| (f.name.as_str(), f.access)).collect();
    assert_eq!(
        fields,
        [
            (STRATEGY_FIELD, Access::PRIVATE | Access::STATIC),
            (STATE_FIELD, Access::PRIVATE)
        ]
    );

    // constructor + 3 object methods + sayHello + 1 bridge + link entry
    assert_eq!(image.methods.len(), 7);
    assert_eq!(image.call_sites.len(), 4);
    let link_entry = &image.methods[image.link_entry as usize];
    assert_eq!(link_entry.name, LINK_ENTRY_NAME);
    assert!(link_entry.access.contains(Access::STATIC));
}

#[test]
fn test_constructor_guards_strategy_and_stores_state() {
    let universe = TypeUniverse::new();
    let image = say_hello_image(&universe);
    let constructors = methods_named(&image, CONSTRUCTOR_NAME);
    assert_eq!(constructors.len(), 1);
    let ctor = constructors[0];
    assert_eq!(ctor.descriptor.params.len(), 1);
    assert_eq!(image.type_at(ctor.descriptor.params[0]), Some("lang.Object"));
    assert!(matches!(
        &ctor.code[1],
        Insn::IfNullThrow { message, .. } if message == STRATEGY_NOT_ASSIGNED
    ));
    let state_ty = image.fields[1].ty;
    assert!(ctor.code.contains(&Insn::CheckCast(state_ty)));
}

#[test]
fn test_concrete_method_dispatches_through_call_site() {
    let universe = TypeUniverse::new();
    let image = say_hello_image(&universe);
    let say_hello = methods_named(&image, "sayHello");
    assert_eq!(say_hello.len(), 2);

    let concrete = say_hello
        .iter()
        .find(|m| !m.access.contains(Access::BRIDGE))
        .expect("concrete");
    assert_eq!(image.type_at(concrete.descriptor.ret), Some("lang.String"));
    let Some(Insn::InvokeDynamic(site)) = concrete.code.iter().find(|i| matches!(i, Insn::InvokeDynamic(_))) else {
        panic!("no call site in {:?}", concrete.code);
    };
    let site = &image.call_sites[*site as usize];
    assert_eq!(site.name, "sayHello");
    let params: Vec<_> = site.descriptor.params.iter().filter_map(|&p| image.type_at(p)).collect();
    assert_eq!(params, ["lang.String"]);
    assert_eq!(image.type_at(site.descriptor.ret), Some("lang.String"));
}

#[test]
fn test_bridge_forwards_to_concrete_method() {
    let universe = TypeUniverse::new();
    let image = say_hello_image(&universe);
    let bridge = methods_named(&image, "sayHello")
        .into_iter()
        .find(|m| m.access.contains(Access::BRIDGE))
        .expect("bridge");
    assert_eq!(image.type_at(bridge.descriptor.ret), Some("lang.Object"));
    let Some(Insn::InvokeVirtual(target)) = bridge.code.iter().find(|i| matches!(i, Insn::InvokeVirtual(_))) else {
        panic!("bridge does not forward: {:?}", bridge.code);
    };
    let target = &image.methods[*target as usize];
    assert_eq!(target.name, "sayHello");
    assert!(!target.access.contains(Access::BRIDGE));
    assert!(!bridge.code.iter().any(|i| matches!(i, Insn::InvokeDynamic(_))));
}

#[test]
fn test_intersected_exceptions_are_declared() {
    let universe = TypeUniverse::new();
    let io = universe
        .define(TypeDef::class("app", "IoError").extends(TypeId::EXCEPTION))
        .expect("IoError");
    let reader = universe
        .define(
            TypeDef::interface("app", "Reader")
                .method(MethodDecl::new("read", [TypeId::INT], TypeId::STRING).throws([io])),
        )
        .expect("Reader");
    let merged = merge_contracts(&universe, &[reader]).expect("merge");
    let image = synthesize(&universe, "app.IndyProxy$0", "app", TypeId::STRING, &[reader], &merged)
        .expect("synthesize");
    let read = methods_named(&image, "read")[0];
    let throws: Vec<_> = read.throws.iter().filter_map(|&t| image.type_at(t)).collect();
    assert_eq!(throws, ["app.IoError"]);
    assert_eq!(read.max_stack, 2);
}

#[test]
fn test_synthesized_image_verifies_and_round_trips() {
    let universe = TypeUniverse::new();
    let image = say_hello_image(&universe);
    assert!(verify_image(&image, &universe).is_empty(), "{:?}", verify_image(&image, &universe));
    let bytes = emit(&image).expect("emit");
    assert!(verify(&bytes, &universe).is_empty());
    assert_eq!(decode(&bytes).expect("decode"), image);
}

#[test]
fn test_void_methods_return_void() {
    let universe = TypeUniverse::new();
    let sink = universe
        .define(TypeDef::interface("app", "Sink").method(MethodDecl::new("accept", [TypeId::STRING, TypeId::INT], TypeId::VOID)))
        .expect("Sink");
    let merged = merge_contracts(&universe, &[sink]).expect("merge");
    let image = synthesize(&universe, "app.IndyProxy$0", "app", TypeId::STRING, &[sink], &merged)
        .expect("synthesize");
    let accept = methods_named(&image, "accept")[0];
    assert_eq!(accept.code.last(), Some(&Insn::ReturnVoid));
    assert_eq!(accept.max_stack, 3);
    assert!(verify_image(&image, &universe).is_empty());
}

#[test]
fn test_unknown_state_type_is_rejected() {
    let universe = TypeUniverse::new();
    let merged = merge_contracts(&universe, &[]).expect("merge");
    let err = synthesize(&universe, "app.IndyProxy$0", "app", TypeId(4242), &[], &merged)
        .expect_err("unknown state");
    assert!(matches!(err, ConfigError::UnknownType(_)));
}
