use super::*;
use crate::bootstrap::FnBootstrap;
use crate::config::VerifyMode;
use crate::error::Fault;
use crate::test_fixtures::{Counting, hello_strategy, new_loader, say_hello_interfaces};
use indy_types::{MethodDecl, MethodType, TypeDef, Value};

#[test]
fn test_build_say_hello_factory() {
    let loader = new_loader();
    let (first, second) = say_hello_interfaces(loader.universe());
    let factory = create_proxy_factory(&loader, hello_strategy(), &[first, second]).expect("factory");

    assert_eq!(factory.class_name(), "app.IndyProxy$0");
    assert_eq!(factory.interfaces(), [first, second]);
    assert!(factory.proxy_class().is_installed());
    assert!(loader.find_class("app.IndyProxy$0").is_some());

    let proxy = factory.create("foo".to_string()).expect("instance");
    assert_eq!(
        proxy.invoke("sayHello", &MethodType::nullary(TypeId::STRING), &[]),
        Ok(Value::from("hello foo"))
    );
}

#[test]
fn test_each_factory_gets_its_own_class() {
    let loader = new_loader();
    let (first, second) = say_hello_interfaces(loader.universe());
    let a = IndyProxy::<String>::build(&loader, hello_strategy(), &[first, second]).expect("a");
    let b = IndyProxy::<String>::build(&loader, hello_strategy(), &[first]).expect("b");
    assert_eq!(a.class_name(), "app.IndyProxy$0");
    assert_eq!(b.class_name(), "app.IndyProxy$1");
    assert_ne!(a.proxy_class().id(), b.proxy_class().id());
}

#[test]
fn test_public_interfaces_use_default_namespace() {
    let loader = new_loader();
    let greeter = loader
        .universe()
        .define(TypeDef::interface("shop", "Greeter").method(MethodDecl::new("sayHello", [], TypeId::STRING)))
        .expect("Greeter");
    let other = loader
        .universe()
        .define(TypeDef::interface("misc", "Marker"))
        .expect("Marker");
    let factory = IndyProxy::<String>::build(&loader, hello_strategy(), &[greeter, other]).expect("factory");
    assert_eq!(factory.class_name(), "indy_proxy.proxies.IndyProxy$0");
    assert_eq!(factory.proxy_class().namespace(), "indy_proxy.proxies");
}

#[test]
fn test_options_choose_namespace_and_prefix() {
    let loader = new_loader();
    let options = ProxyOptions {
        verify: VerifyMode::Always,
        default_namespace: "gen.proxies".to_string(),
        class_prefix: "Shim".to_string(),
    };
    let universe = loader.universe();
    let a = universe.define(TypeDef::interface("north", "A")).expect("A");
    let b = universe.define(TypeDef::interface("south", "B")).expect("B");
    let factory = IndyProxy::<String>::build_with(&loader, hello_strategy(), &[a, b], &options).expect("factory");
    assert_eq!(factory.class_name(), "gen.proxies.Shim$0");
    let proxy = factory.create("x".to_string()).expect("instance");
    assert_eq!(proxy.to_display_string(), Ok("x".to_string()));
}

#[test]
fn test_verification_mode_does_not_change_behavior() {
    for verify in [VerifyMode::Always, VerifyMode::Never, VerifyMode::Auto] {
        let loader = new_loader();
        let (first, second) = say_hello_interfaces(loader.universe());
        let options = ProxyOptions {
            verify,
            ..ProxyOptions::default()
        };
        let factory = IndyProxy::<String>::build_with(&loader, hello_strategy(), &[first, second], &options)
            .expect("factory");
        let proxy = factory.create("foo".to_string()).expect("instance");
        assert_eq!(proxy.hash_code(), Ok(crate::payload::string_hash("foo")));
    }
}

#[test]
fn test_incompatible_contracts_fail_before_naming() {
    let loader = new_loader();
    let universe = loader.universe();
    let thing = universe.define(TypeDef::class("app", "Thing")).expect("Thing");
    let a = universe
        .define(TypeDef::interface("app", "A").method(MethodDecl::new("m", [], TypeId::INT)))
        .expect("A");
    let b = universe
        .define(TypeDef::interface("app", "B").method(MethodDecl::new("m", [], thing)))
        .expect("B");

    let err = IndyProxy::<String>::build(&loader, hello_strategy(), &[a, b]).expect_err("incompatible");
    assert!(matches!(
        err,
        ProxyError::Config(ConfigError::IncompatibleReturnTypes { .. })
    ));
    // no name was consumed
    let factory = IndyProxy::<String>::build(&loader, hello_strategy(), &[a]).expect("factory");
    assert_eq!(factory.class_name(), "indy_proxy.proxies.IndyProxy$0");
}

#[test]
fn test_unknown_state_type_is_rejected() {
    let loader = new_loader();
    let err = IndyProxy::<String>::build(&loader, FnBootstrap::<String>::new(TypeId(4242)), &[])
        .expect_err("unknown state");
    assert!(matches!(err, ProxyError::Config(ConfigError::UnknownType(_))));
}

#[test]
fn test_classes_cannot_be_proxied() {
    let loader = new_loader();
    let err = IndyProxy::<String>::build(&loader, hello_strategy(), &[TypeId::STRING]).expect_err("class");
    assert_eq!(
        err,
        ProxyError::Config(ConfigError::NotAnInterface("lang.String".to_string()))
    );
}

#[test]
fn test_strategy_is_consulted_lazily() {
    let loader = new_loader();
    let (first, second) = say_hello_interfaces(loader.universe());
    let (strategy, consulted) = Counting::new(hello_strategy());
    let factory = IndyProxy::<String>::build(&loader, strategy, &[first, second]).expect("factory");
    let proxy = factory.create("foo".to_string()).expect("instance");
    assert_eq!(consulted.load(std::sync::atomic::Ordering::SeqCst), 0);

    for _ in 0..100 {
        proxy
            .invoke("sayHello", &MethodType::nullary(TypeId::STRING), &[])
            .expect("sayHello");
    }
    assert_eq!(consulted.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
fn test_instantiation_errors_are_wrapped() {
    let err = ProxyError::Instantiation {
        source: Fault::IllegalState("strategy not assigned".to_string()),
    };
    assert_eq!(err.to_string(), "failed to instantiate proxy: illegal state: strategy not assigned");
}
