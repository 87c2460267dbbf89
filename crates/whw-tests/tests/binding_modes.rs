//! Minimal and system-interface bindings run the same store.

use whw::StdSystem;
use whw_runtime::{BindingMode, Errno, NoSystem, StoreError};
use whw_tests::Harness;

fn hello(h: &mut Harness) {
    assert_eq!(h.put(8, b"hello"), 5);
    assert_eq!(h.get(8, 5), Ok(b"hello".to_vec()));
}

#[test]
fn minimal_binding_needs_no_setup() {
    let mut h = Harness::new(32);
    assert_eq!(h.instance.mode(), BindingMode::Minimal);
    assert!(h.instance.is_ready());
    hello(&mut h);
}

#[test]
fn system_binding_rejects_calls_before_initialize() {
    let mut h = Harness::with_extent(BindingMode::SystemInterface, 32, 128);
    assert!(!h.instance.is_ready());
    assert_eq!(h.put(8, b"hello"), StoreError::InvalidHandle.code());
    assert_eq!(h.get(8, 5), Err(-2));
    let base = h.base;
    assert_eq!(h.instance.init(&mut h.memory, base, 128), -2);
}

#[test]
fn system_binding_after_initialize() {
    let mut h = Harness::with_extent(BindingMode::SystemInterface, 32, 128);
    let mut sys = StdSystem::new(
        vec!["store".into(), "--flag".into()],
        vec![("HOME".into(), "/root".into())],
        Vec::new(),
    );
    h.instance.initialize(&mut sys).unwrap();
    assert_eq!(h.instance.globals.argc, 2);
    assert_eq!(h.instance.globals.argv_buf_size, 13);
    assert_eq!(h.instance.globals.environ_count, 1);
    assert_eq!(h.instance.globals.environ_buf_size, 11);

    let base = h.base;
    assert_eq!(h.instance.init(&mut h.memory, base, 128), 0);
    hello(&mut h);
    // Extent window is usable too.
    assert_eq!(h.put(40, b"extent"), 6);
    assert_eq!(h.get(40, 6), Ok(b"extent".to_vec()));
}

#[test]
fn failed_initialize_keeps_rejecting() {
    let mut h = Harness::with_extent(BindingMode::SystemInterface, 32, 0);
    assert_eq!(h.instance.initialize(&mut NoSystem), Err(Errno::NOSYS));
    assert_eq!(h.put(8, b"hello"), -2);
}

#[test]
fn both_bindings_store_identical_bytes() {
    let mut minimal = Harness::new(32);
    let mut system = Harness::with_extent(BindingMode::SystemInterface, 32, 0);
    system
        .instance
        .initialize(&mut StdSystem::new(Vec::new(), Vec::new(), Vec::new()))
        .unwrap();

    hello(&mut minimal);
    hello(&mut system);
    let len = 40 + 32;
    assert_eq!(minimal.bytes(minimal.base, len), system.bytes(system.base, len));
}
