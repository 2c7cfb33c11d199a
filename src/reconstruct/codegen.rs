//! Per-record generation of a test routine and its data functions.

use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::config::ConvertConfig;
use crate::error::ReconstructionError;
use crate::replay::CapturedPanic;
use crate::snapshot::classify::{Borrow, Primitive, TypeDescriptor};
use crate::snapshot::model::{InvocationRecord, ValueSnapshot};
use crate::snapshot::recorder::short_type_name;
use crate::snapshot::serializer::decode_blob;

/// Module name the test file mounts the data file under.
pub const DATA_ALIAS: &str = "sl";

/// Source text of one `#[test]` function.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TestFragment(pub String);

/// Source text of the data functions backing one test.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataFragment(pub String);

impl TestFragment {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl DataFragment {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A value ready to be written as a data function.
struct Materialized {
    fn_name: String,
    rust_type: String,
    recorded_type: String,
    borrow: Borrow,
}

/// Generate the test and data fragments for one record.
pub fn reconstruct(
    record: &InvocationRecord,
    config: &ConvertConfig,
) -> Result<(TestFragment, DataFragment), ReconstructionError> {
    let id = record.ident();
    let context = format!("record {id}");
    // Types from the watched crate follow `crate_name` like the import paths do.
    let rename = config
        .crate_name
        .as_deref()
        .zip(target_frame_module(record).and_then(crate_root));
    let mut data = String::new();
    let mut test = String::new();

    let _ = writeln!(
        data,
        "// ===== {}: {}@{}\n",
        record.run_id, record.function_name, record.scope_path
    );

    let mut call_args = Vec::new();
    for argument in &record.arguments {
        if argument.name == "self" {
            continue;
        }
        let fn_name = format!("val_{id}_{}", argument.name);
        let value = materialize(&mut data, fn_name, argument, config, rename, &context)?;
        call_args.push(format!(
            "{}{DATA_ALIAS}::{}()",
            value.borrow.prefix(),
            value.fn_name
        ));
    }
    let call_args = call_args.join(", ");

    let _ = writeln!(test, "#[test]\nfn test_{id}() {{");

    if record.is_method() {
        let receiver_type = receiver_type(record, config.crate_name.as_deref());
        let fn_name = format!("cls_{id}_{}", record.class_name);
        let blob = checked_blob(&record.class_snapshot, &context, "class_dump")?;
        write_data_fn(
            &mut data,
            &fn_name,
            &receiver_type,
            &format!("{}::<{receiver_type}>({blob:?})", config.restore_fn),
        );
        let _ = writeln!(
            test,
            "    let run_result = slothwatch::replay::run(|| {{\n        \
             let mut receiver = {DATA_ALIAS}::{fn_name}();\n        \
             receiver.{}({call_args})\n    }});",
            record.function_name
        );
    } else {
        let module = function_module(record, config.crate_name.as_deref());
        let _ = writeln!(test, "    use {module}::{};\n", record.function_name);
        let _ = writeln!(
            test,
            "    let run_result = slothwatch::replay::run(|| {}({call_args}));",
            record.function_name
        );
    }
    test.push('\n');

    let mut expected = Vec::with_capacity(record.results.len());
    for result in &record.results {
        let fn_name = format!("res_{id}_{}", result.name);
        expected.push(materialize(&mut data, fn_name, result, config, rename, &context)?);
    }

    match expected.as_slice() {
        [] => {
            test.push_str("    let () = run_result.expect_returned();\n");
        }
        [single] => {
            let outcome = if single.recorded_type == std::any::type_name::<CapturedPanic>() {
                "expect_panicked"
            } else {
                "expect_returned"
            };
            let _ = writeln!(test, "    let run_result = run_result.{outcome}();");
            let _ = writeln!(test, "    let test_result = {DATA_ALIAS}::{}();", single.fn_name);
            write_assertion(&mut test, single, "run_result", "test_result", config, &context)?;
        }
        many => {
            let calls: Vec<String> = many
                .iter()
                .map(|v| format!("{DATA_ALIAS}::{}()", v.fn_name))
                .collect();
            test.push_str("    let run_result = run_result.expect_returned();\n");
            let _ = writeln!(test, "    let test_result = ({});", calls.join(", "));
            for (i, value) in many.iter().enumerate() {
                write_assertion(
                    &mut test,
                    value,
                    &format!("run_result.{i}"),
                    &format!("test_result.{i}"),
                    config,
                    &context,
                )?;
            }
        }
    }
    test.push_str("}\n");

    Ok((TestFragment(test), DataFragment(data)))
}

fn write_assertion(
    test: &mut String,
    value: &Materialized,
    actual: &str,
    expected: &str,
    config: &ConvertConfig,
    context: &str,
) -> Result<(), ReconstructionError> {
    let selection = config
        .comparators
        .select(&value.recorded_type, &value.rust_type, context)?;
    if selection.fallback {
        let _ = writeln!(
            test,
            "    // no comparator configured for `{}`; comparing with PartialEq",
            value.rust_type
        );
    }
    let _ = writeln!(test, "    {}", selection.comparator.assertion(actual, expected));
    Ok(())
}

fn materialize(
    data: &mut String,
    fn_name: String,
    snapshot: &ValueSnapshot,
    config: &ConvertConfig,
    rename: Option<(&str, &str)>,
    record_context: &str,
) -> Result<Materialized, ReconstructionError> {
    let context = format!("{record_context}, value `{}`", snapshot.name);
    let descriptor =
        TypeDescriptor::decode(&snapshot.type_tag).map_err(|e| ReconstructionError::TypeTag {
            context: context.clone(),
            message: e.to_string(),
        })?;
    let rust_type = match rename {
        Some((to, from)) => replace_crate(&rust_type_name(&descriptor.name), from, to),
        None => rust_type_name(&descriptor.name),
    };

    let body = if snapshot.is_primitive {
        let primitive = Primitive::parse(&descriptor.name, &snapshot.value).ok_or_else(|| {
            ReconstructionError::InvalidField {
                context: context.clone(),
                field: "par_value".to_string(),
                value: snapshot.value.clone(),
            }
        })?;
        primitive.to_rust_literal()
    } else {
        let blob = checked_blob(&snapshot.value, &context, "par_value")?;
        format!("{}::<{rust_type}>({blob:?})", config.restore_fn)
    };

    write_data_fn(data, &fn_name, &rust_type, &body);
    Ok(Materialized {
        fn_name,
        rust_type,
        recorded_type: descriptor.name,
        borrow: descriptor.borrow,
    })
}

fn write_data_fn(data: &mut String, name: &str, rust_type: &str, body: &str) {
    let _ = writeln!(data, "pub fn {name}() -> {rust_type} {{\n    {body}\n}}\n");
}

/// Validate a base64 blob and return it without line wrapping.
fn checked_blob(blob: &str, context: &str, field: &str) -> Result<String, ReconstructionError> {
    if blob.trim().is_empty() {
        return Err(ReconstructionError::MissingField {
            context: context.to_string(),
            field: field.to_string(),
        });
    }
    decode_blob(blob).map_err(|source| ReconstructionError::Base64 {
        context: context.to_string(),
        source,
    })?;
    Ok(blob.chars().filter(|c| !c.is_whitespace()).collect())
}

/// Module that defines a free function, as a Rust path.
///
/// The target frame of the call stack (`name@module`) is exact; the dotted
/// scope path is the fallback.
pub fn function_module(record: &InvocationRecord, crate_name: Option<&str>) -> String {
    match target_frame_module(record) {
        Some(module) => rebase(module, crate_name),
        None => scope_module_path(&record.scope_path, crate_name),
    }
}

/// Full path of a method's receiver type.
pub fn receiver_type(record: &InvocationRecord, crate_name: Option<&str>) -> String {
    match target_frame_module(record) {
        Some(owner) if short_type_name(owner) == record.class_name => {
            rust_type_name(&rebase(owner, crate_name))
        }
        _ => format!(
            "{}::{}",
            scope_module_path(&record.scope_path, crate_name),
            record.class_name
        ),
    }
}

/// Leading crate segment of a module or type path.
fn crate_root(path: &str) -> Option<&str> {
    let (root, _) = path.split_once("::")?;
    (!root.is_empty() && !root.contains(['<', ' '])).then_some(root)
}

fn target_frame_module(record: &InvocationRecord) -> Option<&str> {
    let last = record.call_stack.rsplit(" -> ").next()?;
    let (function, module) = last.split_once('@')?;
    (function == record.function_name && !module.is_empty()).then_some(module)
}

/// Swap the leading crate of `path` for `crate_name`, including inside
/// generic arguments (`demo::Wrapper<demo::Inner>`).
fn rebase(path: &str, crate_name: Option<&str>) -> String {
    let Some(root) = crate_name else {
        return path.to_string();
    };
    match path.split_once("::") {
        Some((first, _)) => replace_crate(path, first, root),
        None => root.to_string(),
    }
}

/// Replace every path rooted at crate `from` with one rooted at `to`.
fn replace_crate(path: &str, from: &str, to: &str) -> String {
    let prefix = format!("{from}::");
    let mut out = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(c) = rest.chars().next() {
        let at_boundary = out
            .chars()
            .last()
            .map_or(true, |prev| !(prev.is_alphanumeric() || prev == '_' || prev == ':'));
        if at_boundary && rest.starts_with(&prefix) {
            out.push_str(to);
            out.push_str("::");
            rest = &rest[prefix.len()..];
        } else {
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    out
}

/// Dotted scope path (`demo.src.calc`) to a module path (`demo::calc`).
///
/// Segments after the last `src` are kept and a trailing `lib`, `main` or
/// `mod` is dropped. The root is `crate_name`, else the segment before
/// `src`, else `crate`.
pub fn scope_module_path(scope: &str, crate_name: Option<&str>) -> String {
    let segments: Vec<&str> = scope.split('.').filter(|s| !s.is_empty()).collect();
    let src = segments.iter().rposition(|s| *s == "src");

    let (root_hint, mut rest) = match src {
        Some(idx) => (
            idx.checked_sub(1).map(|i| segments[i]),
            segments[idx + 1..].to_vec(),
        ),
        None => (None, segments),
    };
    if matches!(rest.last(), Some(&"lib" | &"main" | &"mod")) {
        rest.pop();
    }

    let root = match (crate_name, root_hint) {
        (Some(name), _) => name.to_string(),
        (None, Some(hint)) => hint.replace('-', "_"),
        (None, None) => "crate".to_string(),
    };
    std::iter::once(root.as_str())
        .chain(rest)
        .collect::<Vec<_>>()
        .join("::")
}

fn std_path() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(^|[^A-Za-z0-9_:])((?:alloc|core|std)::[A-Za-z0-9_:]*[A-Za-z0-9_])")
            .expect("std path regex")
    })
}

const SHORT_NAMES: &[(&str, &str)] = &[
    ("alloc::string::String", "String"),
    ("alloc::vec::Vec", "Vec"),
    ("alloc::boxed::Box", "Box"),
    ("core::option::Option", "Option"),
    ("core::result::Result", "Result"),
    ("std::collections::hash::map::HashMap", "std::collections::HashMap"),
    ("std::collections::hash::set::HashSet", "std::collections::HashSet"),
    ("alloc::collections::btree::map::BTreeMap", "std::collections::BTreeMap"),
    ("alloc::collections::btree::set::BTreeSet", "std::collections::BTreeSet"),
    ("alloc::collections::vec_deque::VecDeque", "std::collections::VecDeque"),
];

/// A `std::any::type_name` string as it should appear in source.
pub fn rust_type_name(type_name: &str) -> String {
    std_path()
        .replace_all(type_name, |caps: &Captures<'_>| {
            let path = &caps[2];
            let rendered = SHORT_NAMES
                .iter()
                .find(|(long, _)| *long == path)
                .map(|(_, short)| short.to_string())
                .or_else(|| path.strip_prefix("alloc::").map(|rest| format!("std::{rest}")))
                .or_else(|| path.strip_prefix("core::").map(|rest| format!("std::{rest}")))
                .unwrap_or_else(|| path.to_string());
            format!("{}{rendered}", &caps[1])
        })
        .into_owned()
}
