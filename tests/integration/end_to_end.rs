//! Watch live calls, persist them, and reconstruct tests from the archive.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use serde::{Deserialize, Serialize};
use slothwatch::reconstruct::extract_container;
use slothwatch::snapshot::read_container;
use slothwatch::{
    describe, restore, CapturedPanic, ConvertConfig, Converter, Invocation, SerializerRegistry,
    SessionState, WatchConfig, Watcher,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Ledger {
    n: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    amount: u32,
}

impl Ledger {
    fn absorb(&mut self, entry: &Entry) -> u32 {
        self.n += entry.amount;
        self.n
    }
}

fn f(x: i64) -> i64 {
    x * 2
}

fn divide(a: i32, b: i32) -> i32 {
    if b == 0 {
        panic!("attempt to divide by zero");
    }
    a / b
}

fn watcher(dir: &Path) -> Watcher {
    let config = WatchConfig {
        instance_id: "e2e".to_string(),
        snapshot_id: Some("e2e_pack".to_string()),
        initial_state: SessionState::Watching,
        output_dir: dir.to_path_buf(),
        ..WatchConfig::default()
    };
    let mut serializers = SerializerRegistry::with_defaults();
    serializers.register::<Ledger>().register::<Entry>();
    Watcher::from_config(&config, serializers).expect("watching session")
}

#[test]
fn free_function_call_becomes_generic_equality_test() {
    let dir = tempfile::tempdir().unwrap();
    let watcher = watcher(dir.path());
    let target = describe!(f(x = 1_i64));

    let x = 5_i64;
    assert_eq!(watcher.call(&target, Invocation::new().arg(&x), || f(x)), 10);
    let archive = watcher.session().lock().stop().unwrap();
    assert_eq!(archive, dir.path().join("e2e_pack.zip"));

    let container = extract_container(&read_container(&archive).unwrap()).unwrap();
    assert_eq!(container.instance_id, "e2e");
    assert_eq!(container.records.len(), 1);
    let record = &container.records[0];
    assert_eq!(record.function_name, "f");
    assert_eq!(record.arguments.len(), 1);
    assert_eq!(record.arguments[0].name, "x");
    assert!(record.arguments[0].is_primitive);
    assert_eq!(record.arguments[0].value, "5");
    assert_eq!(record.results[0].name, "ret_0");
    assert_eq!(record.results[0].value, "10");
    assert!(record
        .call_stack
        .ends_with("f@integration_tests::integration::end_to_end"));

    let out_dir = dir.path().join("generated");
    let output = Converter::new(ConvertConfig::default())
        .convert_file(&archive, &out_dir)
        .unwrap();

    let test = fs::read_to_string(&output.test_file).unwrap();
    assert!(test.contains("use integration_tests::integration::end_to_end::f;"));
    assert!(test.contains("f(sl::val_f_1_x())"));
    assert!(test.contains("let test_result = sl::res_f_1_ret_0();"));
    assert!(test.contains("assert_eq!(run_result, test_result);"));

    let data = fs::read_to_string(&output.data_file).unwrap();
    assert!(data.contains("pub fn val_f_1_x() -> i64 {\n    5_i64\n}"));
    assert!(data.contains("pub fn res_f_1_ret_0() -> i64 {\n    10_i64\n}"));
}

#[test]
fn default_parameter_is_recorded_when_omitted() {
    let dir = tempfile::tempdir().unwrap();
    let watcher = watcher(dir.path());
    let target = describe!(f(x = 1_i64));

    assert_eq!(watcher.call(&target, Invocation::new(), || f(1)), 2);

    let session = watcher.session().lock();
    let record = &session.container().unwrap().records[0];
    assert_eq!(record.arguments[0].value, "1");
}

#[test]
fn method_receiver_roundtrips_through_archive() {
    let dir = tempfile::tempdir().unwrap();
    let watcher = watcher(dir.path());
    let target = describe!(Ledger => absorb(&entry));

    let mut ledger = Ledger { n: 12 };
    let entry = Entry { amount: 3 };
    let pending = watcher.enter(&target, Invocation::new().on(&ledger).arg(&entry));
    let total = pending.run(|| ledger.absorb(&entry));
    assert_eq!(total, 15);

    let archive = watcher.session().lock().stop().unwrap();
    let container = extract_container(&read_container(&archive).unwrap()).unwrap();
    let record = &container.records[0];

    assert_eq!(record.class_name, "Ledger");
    assert_eq!(restore::<Ledger>(&record.class_snapshot), Ledger { n: 12 });
    assert_eq!(restore::<Entry>(&record.arguments[0].value), entry);

    let sources = Converter::default().render("e2e_pack", &container).unwrap();
    assert!(sources
        .data_source
        .contains(
            "pub fn cls_absorb_1_Ledger() -> integration_tests::integration::end_to_end::Ledger {"
        ));
    assert!(sources
        .test_source
        .contains("receiver.absorb(&sl::val_absorb_1_entry())"));
}

#[test]
fn panicking_call_is_recorded_and_still_panics() {
    let dir = tempfile::tempdir().unwrap();
    let watcher = watcher(dir.path());
    let target = describe!(divide(a, b));

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        watcher.call(&target, Invocation::new().arg(&1_i32).arg(&0_i32), || divide(1, 0))
    }));
    assert!(outcome.is_err());

    let archive = watcher.session().lock().stop().unwrap();
    let container = extract_container(&read_container(&archive).unwrap()).unwrap();
    let record = &container.records[0];
    assert_eq!(record.additional_info, "panicked: attempt to divide by zero");
    assert_eq!(
        restore::<CapturedPanic>(&record.results[0].value),
        CapturedPanic::new("attempt to divide by zero")
    );

    let sources = Converter::default().render("e2e_pack", &container).unwrap();
    assert!(sources.test_source.contains("run_result.expect_panicked();"));
    assert!(sources
        .data_source
        .contains("pub fn res_divide_1_ret_0() -> slothwatch::replay::CapturedPanic {"));
}

#[test]
fn records_follow_completion_order() {
    let dir = tempfile::tempdir().unwrap();
    let watcher = watcher(dir.path());
    let outer = describe!(outer());
    let inner = describe!(f(x));

    // `outer` completes after the `inner` call it makes.
    watcher.call(&outer, Invocation::new(), || {
        let x = 2_i64;
        watcher.call(&inner, Invocation::new().arg(&x), || f(x))
    });

    let session = watcher.session().lock();
    let names: Vec<&str> = session
        .container()
        .unwrap()
        .records
        .iter()
        .map(|r| r.function_name.as_str())
        .collect();
    assert_eq!(names, vec!["f", "outer"]);
}
