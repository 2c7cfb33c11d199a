//! Integration tests for the `slothwatch` binary.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use slothwatch::snapshot::{
    classify, write_container, Borrow, InvocationRecord, SnapshotContainer, ValueRole,
    ValueSnapshot,
};

fn slothwatch_bin() -> Command {
    Command::cargo_bin("slothwatch").expect("slothwatch binary")
}

fn literal(name: &str, role: ValueRole, value: i64) -> ValueSnapshot {
    let c = classify(&value, Borrow::Owned);
    ValueSnapshot {
        name: name.to_string(),
        type_tag: c.type_tag(),
        is_primitive: true,
        value: value.to_string(),
        role,
        note: String::new(),
    }
}

/// Write a one-record archive named `<snapshot_id>.zip` into `dir`.
fn write_archive(dir: &Path, snapshot_id: &str) -> PathBuf {
    let mut container = SnapshotContainer::new("cli", snapshot_id, "1700000000");
    container.push(InvocationRecord {
        run_id: 0,
        scope_path: "demo.src.calc".to_string(),
        class_name: String::new(),
        class_snapshot: String::new(),
        function_name: "f".to_string(),
        call_stack: "main@demo -> f@demo::calc".to_string(),
        arguments: vec![literal("x", ValueRole::Income, 5)],
        results: vec![literal("ret_0", ValueRole::Result, 10)],
        additional_info: String::new(),
    });
    write_container(dir, &container).expect("write archive")
}

#[test]
fn convert_writes_and_prints_both_files() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(dir.path(), "1700000000");
    let out_dir = dir.path().join("out");

    slothwatch_bin()
        .current_dir(dir.path())
        .args(["convert", archive.to_str().unwrap(), "-d", out_dir.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("test_sloth_1700000000.rs"))
        .stdout(predicate::str::contains("sloth_test_parval_1700000000.rs"));

    let test = fs::read_to_string(out_dir.join("test_sloth_1700000000.rs")).unwrap();
    assert!(test.contains("use demo::calc::f;"));
    assert!(out_dir.join("sloth_test_parval_1700000000.rs").exists());
}

#[test]
fn convert_crate_name_rebases_paths() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(dir.path(), "pack");

    slothwatch_bin()
        .current_dir(dir.path())
        .args(["convert", archive.to_str().unwrap(), "--crate-name", "crate"])
        .assert()
        .success();

    let test = fs::read_to_string(dir.path().join("test_sloth_pack.rs")).unwrap();
    assert!(test.contains("use crate::calc::f;"));
}

#[test]
fn convert_strict_fails_without_comparator() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(dir.path(), "strict");

    slothwatch_bin()
        .current_dir(dir.path())
        .args(["convert", archive.to_str().unwrap(), "--strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no comparator configured"));

    assert!(!dir.path().join("test_sloth_strict.rs").exists());
}

#[test]
fn convert_reads_comparators_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(dir.path(), "cfg");
    let config = dir.path().join("slothwatch.toml");
    fs::write(&config, "[comparators]\n\"i64\" = \"fn:demo::close\"\n").unwrap();

    slothwatch_bin()
        .current_dir(dir.path())
        .args([
            "convert",
            archive.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
            "--strict",
        ])
        .assert()
        .success();

    let test = fs::read_to_string(dir.path().join("test_sloth_cfg.rs")).unwrap();
    assert!(test.contains("assert!(demo::close(&run_result, &test_result));"));
}

#[test]
fn convert_rejects_corrupt_archive() {
    let dir = tempfile::tempdir().unwrap();
    let bogus = dir.path().join("bogus.zip");
    fs::write(&bogus, b"plainly not a zip").unwrap();

    slothwatch_bin()
        .current_dir(dir.path())
        .args(["convert", bogus.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("converting"));
}

#[test]
fn inspect_lists_records() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(dir.path(), "listing");

    slothwatch_bin()
        .args(["inspect", archive.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("snapshot listing (instance cli"))
        .stdout(predicate::str::contains("f@demo.src.calc  args=1 results=1"));
}
