//! Process-wide default builder
//!
//! Tests in this file share one default builder, so each takes SERIAL first.

use field_layout::{global, Axis, Field, LayoutError};
use parking_lot::Mutex;

static SERIAL: Mutex<()> = Mutex::new(());

#[test]
fn test_finalize_installs_fresh_builder() {
    let _guard = SERIAL.lock();
    global::reset();

    let node = global::declare_node(global::root(), &[Axis::I], &[8]).unwrap();
    let x = Field::of::<f32>("x");
    global::place(node, &[&x]).unwrap();
    assert!(global::pending());

    let tree = global::finalize().unwrap();
    assert!(!global::pending());
    assert_eq!(x.tree_id(), Some(tree.id()));
    x.set(&[7], 3.0f32).unwrap();
    assert_eq!(x.get::<f32>(&[7]).unwrap(), 3.0);

    // handles from the previous builder are stale
    assert!(matches!(
        global::declare_node(node, &[Axis::J], &[2]),
        Err(LayoutError::ForeignNode { .. })
    ));
    assert!(global::declare_node(global::root(), &[Axis::J], &[2]).is_ok());
    global::reset();
}

#[test]
fn test_failed_finalize_keeps_pending_declarations() {
    let _guard = SERIAL.lock();
    global::reset();

    let root = global::root();
    let short = global::declare_node(root, &[Axis::I], &[4]).unwrap();
    let long = global::declare_node(root, &[Axis::I], &[8]).unwrap();
    global::place(short, &[&Field::of::<u8>("a")]).unwrap();
    global::place(long, &[&Field::of::<u8>("b")]).unwrap();

    assert!(matches!(global::finalize(), Err(LayoutError::StructuralMismatch { .. })));
    assert!(global::pending());
    // the old handles still belong to the current builder
    assert!(global::declare_node(short, &[Axis::J], &[2]).is_ok());

    global::reset();
    assert!(!global::pending());
    assert!(matches!(
        global::declare_node(short, &[Axis::J], &[2]),
        Err(LayoutError::ForeignNode { .. })
    ));
}

#[test]
fn test_materialize_and_destroy_all() {
    let _guard = SERIAL.lock();
    global::reset();
    global::destroy_all().unwrap();

    assert_eq!(global::materialize().unwrap(), None);

    let node = global::declare_node(global::root(), &[Axis::I, Axis::J], &[4, 4]).unwrap();
    let density = Field::of::<f64>("density");
    global::place(node, &[&density]).unwrap();
    let first = global::materialize().unwrap().unwrap();

    let energy = Field::of::<f32>("energy");
    global::place(global::root(), &[&energy]).unwrap();
    let second = global::materialize().unwrap().unwrap();
    assert_ne!(first, second);
    assert_eq!(global::materialized_trees(), vec![first, second]);

    // registry-owned trees keep their fields usable
    density.set(&[3, 3], 0.5f64).unwrap();
    energy.set(&[], 2.0f32).unwrap();
    assert_eq!(density.get::<f64>(&[3, 3]).unwrap(), 0.5);

    assert_eq!(global::destroy_all().unwrap(), 2);
    assert!(global::materialized_trees().is_empty());
    assert!(matches!(density.get::<f64>(&[0, 0]), Err(LayoutError::UseAfterDestroy { .. })));
    assert!(matches!(energy.get::<f32>(&[]), Err(LayoutError::UseAfterDestroy { .. })));
    assert_eq!(global::destroy_all().unwrap(), 0);
}

#[test]
fn test_first_access_materializes_pending_fields() {
    let _guard = SERIAL.lock();
    global::reset();
    global::destroy_all().unwrap();

    let node = global::declare_node(global::root(), &[Axis::I], &[16]).unwrap();
    let pressure = Field::of::<f32>("pressure");
    global::place(node, &[&pressure]).unwrap();
    assert!(pressure.is_placed());
    assert!(!pressure.is_bound());
    assert!(!pressure.is_live());

    pressure.set(&[15], 9.5f32).unwrap();
    assert!(pressure.is_bound());
    assert!(!global::pending());
    assert_eq!(global::materialized_trees(), vec![pressure.tree_id().unwrap()]);
    assert_eq!(pressure.get::<f32>(&[15]).unwrap(), 9.5);

    // a field from a private builder is never materialized behind its back
    let mut builder = field_layout::Builder::new();
    let private = Field::of::<f32>("private");
    let node = builder.declare_node(builder.root(), &[Axis::I], &[4]).unwrap();
    builder.place(node, &[&private]).unwrap();
    assert!(matches!(private.get::<f32>(&[0]), Err(LayoutError::Unbound { .. })));
    assert!(!builder.is_spent());

    assert_eq!(global::destroy_all().unwrap(), 1);
}

#[test]
fn test_reset_frees_pending_fields() {
    let _guard = SERIAL.lock();
    global::reset();

    let node = global::declare_node(global::root(), &[Axis::I], &[4]).unwrap();
    let x = Field::of::<u16>("x");
    global::place(node, &[&x]).unwrap();
    assert!(x.is_placed());

    global::reset();
    assert!(!x.is_placed());
    assert!(matches!(x.get::<u16>(&[0]), Err(LayoutError::Unbound { .. })));

    let node = global::declare_node(global::root(), &[Axis::I], &[4]).unwrap();
    global::place(node, &[&x]).unwrap();
    assert_eq!(global::finalize().unwrap().resolve(&x, &[3]).unwrap(), 6);
}
