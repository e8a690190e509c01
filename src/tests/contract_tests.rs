use super::*;
use crate::test_fixtures::say_hello_interfaces;
use indy_types::TypeDef;

fn key(name: &str, params: &[TypeId]) -> SignatureKey {
    SignatureKey {
        name: name.to_string(),
        params: params.iter().copied().collect(),
    }
}

/// `app.IoError` and `app.TimeoutError`, both checked exceptions.
fn exceptions(universe: &TypeUniverse) -> (TypeId, TypeId) {
    let io = universe
        .define(TypeDef::class("app", "IoError").extends(TypeId::EXCEPTION))
        .expect("IoError");
    let timeout = universe
        .define(TypeDef::class("app", "TimeoutError").extends(TypeId::EXCEPTION))
        .expect("TimeoutError");
    (io, timeout)
}

#[test]
fn test_object_methods_are_always_present() {
    let universe = TypeUniverse::new();
    let merged = merge_contracts(&universe, &[]).expect("merge");
    assert_eq!(merged.len(), 3);
    assert_eq!(merged.get(&key("equals", &[TypeId::OBJECT])).map(|m| m.ret), Some(TypeId::BOOLEAN));
    assert_eq!(merged.get(&key("hashCode", &[])).map(|m| m.ret), Some(TypeId::INT));
    assert_eq!(merged.get(&key("toString", &[])).map(|m| m.ret), Some(TypeId::STRING));
    assert_eq!(merged.bridge_count(), 0);
}

#[test]
fn test_covariant_returns_narrow_and_record_alternatives() {
    let universe = TypeUniverse::new();
    let (first, second) = say_hello_interfaces(&universe);
    let merged = merge_contracts(&universe, &[second, first]).expect("merge");

    let say_hello = merged.find("sayHello").expect("sayHello");
    assert_eq!(say_hello.ret, TypeId::STRING);
    assert_eq!(
        say_hello.alternative_returns,
        BTreeSet::from([TypeId::OBJECT, TypeId::STRING])
    );
    assert_eq!(say_hello.bridge_returns().collect::<Vec<_>>(), vec![TypeId::OBJECT]);
    assert_eq!(merged.bridge_count(), 1);
}

#[test]
fn test_merge_is_order_independent() {
    let universe = TypeUniverse::new();
    let (first, second) = say_hello_interfaces(&universe);
    let forward = merge_contracts(&universe, &[first, second]).expect("forward");
    let backward = merge_contracts(&universe, &[second, first]).expect("backward");
    assert_eq!(forward, backward);
}

#[test]
fn test_unrelated_return_types_are_rejected() {
    let universe = TypeUniverse::new();
    let thing = universe.define(TypeDef::class("app", "Thing")).expect("Thing");
    let a = universe
        .define(TypeDef::interface("app", "A").method(MethodDecl::new("m", [], TypeId::INT)))
        .expect("A");
    let b = universe
        .define(TypeDef::interface("app", "B").method(MethodDecl::new("m", [], thing)))
        .expect("B");

    let err = merge_contracts(&universe, &[a, b]).expect_err("incompatible");
    assert_eq!(
        err,
        ConfigError::IncompatibleReturnTypes {
            method: "m".to_string(),
            existing: "int".to_string(),
            requested: "app.Thing".to_string(),
        }
    );
    assert!(merge_contracts(&universe, &[b, a]).is_err());
}

#[test]
fn test_exception_sets_are_intersected() {
    let universe = TypeUniverse::new();
    let (io, timeout) = exceptions(&universe);
    let throwing = universe
        .define(
            TypeDef::interface("app", "Throwing")
                .method(MethodDecl::new("m", [], TypeId::VOID).throws([io, timeout])),
        )
        .expect("Throwing");
    let io_only = universe
        .define(TypeDef::interface("app", "IoOnly").method(MethodDecl::new("m", [], TypeId::VOID).throws([io])))
        .expect("IoOnly");
    let silent = universe
        .define(TypeDef::interface("app", "Silent").method(MethodDecl::new("m", [], TypeId::VOID)))
        .expect("Silent");

    let merged = merge_contracts(&universe, &[throwing, io_only]).expect("merge");
    assert_eq!(merged.find("m").map(|m| m.exceptions.clone()), Some(BTreeSet::from([io])));

    let merged = merge_contracts(&universe, &[throwing, silent]).expect("merge");
    assert!(merged.find("m").is_some_and(|m| m.exceptions.is_empty()));

    let merged = merge_contracts(&universe, &[silent, throwing]).expect("merge");
    assert!(merged.find("m").is_some_and(|m| m.exceptions.is_empty()));
}

#[test]
fn test_duplicate_contribution_is_idempotent() {
    let universe = TypeUniverse::new();
    let decl = MethodDecl::new("size", [], TypeId::INT).throws([TypeId::EXCEPTION]);
    let mut merger = ContractMerger::new(&universe);
    merger.add(&decl).expect("first");
    let once = merger.finish();

    let mut merger = ContractMerger::new(&universe);
    merger.add(&decl).expect("first");
    merger.add(&decl).expect("second");
    assert_eq!(merger.finish(), once);
}

#[test]
fn test_inherited_interface_methods_are_merged() {
    let universe = TypeUniverse::new();
    let base = universe
        .define(TypeDef::interface("app", "Base").method(MethodDecl::new("name", [], TypeId::CHAR_SEQUENCE)))
        .expect("Base");
    let derived = universe
        .define(
            TypeDef::interface("app", "Derived")
                .extends(base)
                .method(MethodDecl::new("name", [], TypeId::STRING)),
        )
        .expect("Derived");

    let merged = merge_contracts(&universe, &[derived]).expect("merge");
    let name = merged.find("name").expect("name");
    assert_eq!(name.ret, TypeId::STRING);
    assert_eq!(
        name.alternative_returns,
        BTreeSet::from([TypeId::CHAR_SEQUENCE, TypeId::STRING])
    );
}

#[test]
fn test_overloads_stay_separate() {
    let universe = TypeUniverse::new();
    let iface = universe
        .define(
            TypeDef::interface("app", "Overloaded")
                .method(MethodDecl::new("put", [TypeId::INT], TypeId::VOID))
                .method(MethodDecl::new("put", [TypeId::STRING], TypeId::VOID)),
        )
        .expect("Overloaded");
    let merged = merge_contracts(&universe, &[iface]).expect("merge");
    assert!(merged.get(&key("put", &[TypeId::INT])).is_some());
    assert!(merged.get(&key("put", &[TypeId::STRING])).is_some());
    assert_eq!(merged.len(), 5);
}

#[test]
fn test_classes_are_not_interfaces() {
    let universe = TypeUniverse::new();
    let err = merge_contracts(&universe, &[TypeId::STRING]).expect_err("class");
    assert_eq!(err, ConfigError::NotAnInterface("lang.String".to_string()));
}
