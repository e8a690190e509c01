use super::*;
use crate::types::Visibility;
use rayon::prelude::*;

fn greeter(universe: &TypeUniverse) -> TypeId {
    universe
        .define(
            TypeDef::interface("app", "Greeter")
                .method(MethodDecl::new("greet", [TypeId::STRING], TypeId::STRING)),
        )
        .expect("define Greeter")
}

#[test]
fn test_builtins_are_registered() {
    let universe = TypeUniverse::new();
    assert_eq!(universe.lookup("lang.Object"), Some(TypeId::OBJECT));
    assert_eq!(universe.lookup("lang.String"), Some(TypeId::STRING));
    assert_eq!(universe.lookup("int"), Some(TypeId::INT));
    assert!(universe.is_primitive(TypeId::BOOLEAN));
    assert!(universe.is_interface(TypeId::CHAR_SEQUENCE));

    let object = universe.get(TypeId::OBJECT).expect("object");
    let names: Vec<&str> = object.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["equals", "hashCode", "toString"]);
}

#[test]
fn test_define_assigns_user_ids() {
    let universe = TypeUniverse::new();
    let id = greeter(&universe);
    assert!(id.0 >= TypeId::FIRST_USER);
    assert_eq!(universe.lookup("app.Greeter"), Some(id));
    assert_eq!(universe.type_name(id), "app.Greeter");
    assert_eq!(universe.namespace_of(id).as_deref(), Some("app"));
}

#[test]
fn test_define_rejects_duplicates() {
    let universe = TypeUniverse::new();
    greeter(&universe);
    let err = universe
        .define(TypeDef::interface("app", "Greeter"))
        .expect_err("duplicate");
    assert_eq!(
        err,
        TypeError::DuplicateType {
            name: "app.Greeter".to_string()
        }
    );
}

#[test]
fn test_interface_cannot_extend_class() {
    let universe = TypeUniverse::new();
    let err = universe
        .define(TypeDef::interface("app", "Bad").extends(TypeId::STRING))
        .expect_err("interface extending class");
    assert!(matches!(err, TypeError::InvalidSupertype { .. }));
}

#[test]
fn test_define_rejects_unknown_method_types() {
    let universe = TypeUniverse::new();
    let err = universe
        .define(TypeDef::interface("app", "Dangling").method(MethodDecl::new(
            "get",
            [],
            TypeId(9999),
        )))
        .expect_err("unknown return type");
    assert_eq!(err, TypeError::UnknownType(TypeId(9999)));
}

#[test]
fn test_assignability() {
    let universe = TypeUniverse::new();
    assert!(universe.is_assignable(TypeId::STRING, TypeId::OBJECT));
    assert!(universe.is_assignable(TypeId::STRING, TypeId::CHAR_SEQUENCE));
    assert!(!universe.is_assignable(TypeId::OBJECT, TypeId::STRING));
    assert!(universe.is_assignable(TypeId::INT, TypeId::INT));
    assert!(!universe.is_assignable(TypeId::INT, TypeId::OBJECT));
    assert!(!universe.is_assignable(TypeId::INT, TypeId::LONG));
    assert!(universe.is_assignable(TypeId::CHAR_SEQUENCE, TypeId::OBJECT));
    assert!(universe.is_assignable(
        TypeId::UNSUPPORTED_OPERATION,
        TypeId::THROWABLE
    ));
}

#[test]
fn test_methods_of_includes_inherited() {
    let universe = TypeUniverse::new();
    let base = greeter(&universe);
    let child = universe
        .define(
            TypeDef::interface("app", "LoudGreeter")
                .extends(base)
                .method(MethodDecl::new("shout", [], TypeId::VOID)),
        )
        .expect("define child");
    let diamond = universe
        .define(
            TypeDef::interface("app", "Diamond")
                .extends(child)
                .extends(base),
        )
        .expect("define diamond");

    let names: Vec<String> = universe
        .methods_of(diamond)
        .expect("methods")
        .into_iter()
        .map(|m| m.name)
        .collect();
    assert_eq!(names, ["shout", "greet"]);
}

#[test]
fn test_restricted_visibility() {
    let universe = TypeUniverse::new();
    let id = universe
        .define(TypeDef::interface("secret", "Hidden").restricted())
        .expect("define");
    let def = universe.get(id).expect("def");
    assert_eq!(def.visibility, Visibility::Namespace);
    assert!(!def.is_public());
}

#[test]
fn test_render_method_type() {
    let universe = TypeUniverse::new();
    let ty = MethodType::new(TypeId::OBJECT, [TypeId::STRING, TypeId::INT]);
    assert_eq!(universe.render_method_type(&ty), "(String, int)Object");
    assert_eq!(
        universe.render_method_type(&ty.with_leading(TypeId::LONG)),
        "(long, String, int)Object"
    );
}

#[test]
fn test_concurrent_define_same_name_has_one_winner() {
    let universe = TypeUniverse::new();
    let results: Vec<Result<TypeId, TypeError>> = (0..64)
        .into_par_iter()
        .map(|_| universe.define(TypeDef::interface("race", "Once")))
        .collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(universe.lookup("race.Once").is_some());
}
