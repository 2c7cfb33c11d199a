//! Converter output checked in next to the functions it was captured from.
//!
//! The generated pair is compiled into this suite, so its tests run here too.
//! After a deliberate change to the generated code, regenerate both files from
//! `Converter::render` output.

pub mod calc;

#[path = "test_sloth_golden.rs"]
mod test_sloth_golden;

use std::panic::{self, AssertUnwindSafe};

use slothwatch::snapshot::SnapshotContainer;
use slothwatch::{
    Comparator, ConvertConfig, Converter, Invocation, Recorder, SerializerRegistry, Session,
    SessionState, WatchConfig, Watcher,
};

use calc::{Entry, Ledger};

const PACK: &str = "golden";

/// Watch one call of each shape and return the session's container.
fn capture() -> SnapshotContainer {
    let dir = tempfile::tempdir().unwrap();
    let config = WatchConfig {
        instance_id: PACK.to_string(),
        initial_state: SessionState::Watching,
        output_dir: dir.path().to_path_buf(),
        capture_call_stack: false,
        ..WatchConfig::default()
    };
    let mut serializers = SerializerRegistry::with_defaults();
    serializers.register::<Ledger>().register::<Entry>();
    let recorder = Recorder::new(serializers)
        .with_call_stack(false)
        .with_working_dir(env!("CARGO_MANIFEST_DIR"));
    let watcher = Watcher::new(Session::from_config(&config).unwrap().shared(), recorder);

    let x = 5_i64;
    watcher.call(&calc::double_target(), Invocation::new().arg(&x), || calc::double(x));

    let x = 1.5_f64;
    watcher.call(&calc::scale_target(), Invocation::new().arg(&x), || calc::scale(x, 2.0));

    let mut ledger = Ledger { n: 12 };
    let entry = Entry { amount: 3 };
    let target = calc::absorb_target();
    watcher
        .enter(&target, Invocation::new().on(&ledger).arg(&entry))
        .run(|| ledger.absorb(&entry));

    let x = 7_i64;
    watcher.call_tuple(&calc::split_target(), Invocation::new().arg(&x), || calc::split(x));

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        watcher.call(
            &calc::divide_target(),
            Invocation::new().arg(&1_i32).arg(&0_i32),
            || calc::divide(1, 0),
        )
    }));
    assert!(outcome.is_err());

    watcher.call(&calc::touch_target(), Invocation::new(), calc::touch);

    let mut container = watcher.session().lock().container().cloned().unwrap();
    container.session_id = "1700000000".to_string();
    container
}

fn converter() -> Converter {
    let mut config = ConvertConfig {
        crate_name: Some("crate".to_string()),
        ..ConvertConfig::default()
    };
    config
        .comparators
        .insert(
            "f64",
            Comparator::Function("crate::integration::golden::calc::close_enough".to_string()),
        )
        .insert("u32", Comparator::PartialEq);
    Converter::new(config)
}

#[test]
fn rendered_sources_match_checked_in_files() {
    let container = capture();
    assert_eq!(container.len(), 6);

    let sources = converter().render(PACK, &container).unwrap();

    assert_eq!(sources.test_source, include_str!("test_sloth_golden.rs"));
    assert_eq!(
        sources.data_source,
        include_str!("sloth_test_parval_golden.rs")
    );
}
