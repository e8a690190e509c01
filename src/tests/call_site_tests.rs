use super::*;
use indy_types::{TypeId, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

fn site() -> CallSite<String> {
    CallSite::new("sayHello", MethodType::new(TypeId::STRING, [TypeId::STRING]))
}

fn constant(text: &str) -> MethodHandle<String> {
    MethodHandle::constant(MethodType::new(TypeId::STRING, [TypeId::STRING]), Value::from(text))
}

#[test]
fn test_new_site_is_unlinked() {
    let site = site();
    assert_eq!(site.name(), "sayHello");
    assert_eq!(site.signature().arity(), 1);
    assert!(!site.is_linked());
    assert!(site.target().is_none());
}

#[test]
fn test_links_once_and_caches_target() {
    let site = site();
    let calls = AtomicUsize::new(0);
    for _ in 0..10 {
        let handle = site
            .get_or_link(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(constant("first"))
            })
            .expect("link");
        assert_eq!(handle.invoke(&String::new(), &[]), Ok(Value::from("first")));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(site.is_linked());
}

#[test]
fn test_failed_link_leaves_site_unlinked() {
    let site = site();
    let err = site
        .get_or_link(|| Err(Fault::Linkage("no handler".to_string())))
        .expect_err("link fails");
    assert_eq!(err, Fault::Linkage("no handler".to_string()));
    assert!(!site.is_linked());

    let handle = site.get_or_link(|| Ok(constant("retry"))).expect("second attempt");
    assert_eq!(handle.invoke(&String::new(), &[]), Ok(Value::from("retry")));
}

#[test]
fn test_linked_handler_is_not_replaced() {
    let site = site();
    site.get_or_link(|| Ok(constant("first"))).expect("link");
    let handle = site.get_or_link(|| Ok(constant("second"))).expect("cached");
    assert_eq!(handle.invoke(&String::new(), &[]), Ok(Value::from("first")));
}

#[test]
fn test_concurrent_first_links_converge() {
    let site = site();
    std::thread::scope(|scope| {
        for i in 0..8 {
            let site = &site;
            scope.spawn(move || {
                let text = format!("thread {i}");
                site.get_or_link(|| Ok(constant(&text))).expect("link");
            });
        }
    });
    let winner = site.target().expect("linked").invoke(&String::new(), &[]);
    for _ in 0..4 {
        let again = site
            .get_or_link(|| Ok(constant("late")))
            .expect("cached")
            .invoke(&String::new(), &[]);
        assert_eq!(again, winner);
    }
}
