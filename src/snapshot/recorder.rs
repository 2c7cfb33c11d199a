//! Turns one intercepted call into an [`InvocationRecord`].
//!
//! Rust has no runtime signature reflection, so every watched function ships a
//! [`FunctionDescriptor`]: its name, where it is defined, and the ordered
//! parameter table (with optional defaults) that supplied arguments are bound
//! against.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::CaptureError;
use crate::replay::CapturedPanic;
use crate::snapshot::classify::{classify, Borrow, Watched};
use crate::snapshot::model::{InvocationRecord, ValueRole, ValueSnapshot};
use crate::snapshot::serializer::{encode_blob, SerializerRegistry};
use crate::snapshot::stack::{render_call_stack, BacktraceProbe, Frame, StackProbe};

/// One declared parameter. Its position is its index in the descriptor.
#[derive(Clone)]
pub struct ParamSpec {
    pub name: String,
    pub borrow: Borrow,
    pub default: Option<Arc<dyn Watched + Send + Sync>>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            borrow: Borrow::Owned,
            default: None,
        }
    }

    pub fn borrowed(mut self, borrow: Borrow) -> Self {
        self.borrow = borrow;
        self
    }

    pub fn with_default<T: Watched + Send + Sync>(mut self, default: T) -> Self {
        self.default = Some(Arc::new(default));
        self
    }
}

impl fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamSpec")
            .field("name", &self.name)
            .field("borrow", &self.borrow)
            .field("default", &self.default.as_ref().map(|d| (**d).type_name()))
            .finish()
    }
}

/// Static description of a watched function or method.
#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    pub name: String,
    /// Source file as reported by `file!()`.
    pub file: String,
    /// Defining module as reported by `module_path!()`.
    pub module_path: String,
    /// Full type name of the receiver type, for methods.
    pub owner: Option<String>,
    pub params: Vec<ParamSpec>,
}

impl FunctionDescriptor {
    pub fn new(
        name: impl Into<String>,
        file: impl Into<String>,
        module_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            module_path: module_path.into(),
            owner: None,
            params: Vec::new(),
        }
    }

    /// Mark this as a method of `T`.
    pub fn method_of<T: 'static>(mut self) -> Self {
        self.owner = Some(std::any::type_name::<T>().to_string());
        self
    }

    pub fn param(self, name: impl Into<String>) -> Self {
        self.with_param(ParamSpec::new(name))
    }

    pub fn param_ref(self, name: impl Into<String>) -> Self {
        self.with_param(ParamSpec::new(name).borrowed(Borrow::Shared))
    }

    pub fn param_mut(self, name: impl Into<String>) -> Self {
        self.with_param(ParamSpec::new(name).borrowed(Borrow::Mut))
    }

    pub fn param_default<T: Watched + Send + Sync>(
        self,
        name: impl Into<String>,
        default: T,
    ) -> Self {
        self.with_param(ParamSpec::new(name).with_default(default))
    }

    pub fn with_param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Frame used as the last entry of a record's call stack.
    pub fn frame(&self) -> Frame {
        match &self.owner {
            Some(owner) => Frame::new(&self.name, owner),
            None => Frame::new(&self.name, &self.module_path),
        }
    }
}

/// Arguments as supplied at one call site.
#[derive(Default)]
pub struct Invocation<'a> {
    receiver: Option<&'a dyn Watched>,
    positional: Vec<&'a dyn Watched>,
    keyword: Vec<(&'a str, &'a dyn Watched)>,
}

impl<'a> Invocation<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the receiver instance (`self`) of a method call.
    pub fn on(mut self, receiver: &'a dyn Watched) -> Self {
        self.receiver = Some(receiver);
        self
    }

    pub fn arg(mut self, value: &'a dyn Watched) -> Self {
        self.positional.push(value);
        self
    }

    pub fn kwarg(mut self, name: &'a str, value: &'a dyn Watched) -> Self {
        self.keyword.push((name, value));
        self
    }
}

/// Argument and receiver snapshots taken before the call runs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoundArguments {
    pub class_name: String,
    pub class_snapshot: String,
    pub arguments: Vec<ValueSnapshot>,
}

/// What the watched call produced.
pub enum CallResult<'a> {
    /// A non-tuple value, recorded as `ret_0`.
    Single(&'a dyn Watched),
    /// Tuple elements in position order; `()` is the empty tuple.
    Tuple(Vec<&'a dyn Watched>),
    Panicked(&'a CapturedPanic),
}

pub struct Recorder {
    serializers: SerializerRegistry,
    probe: Arc<dyn StackProbe>,
    capture_call_stack: bool,
    working_dir: PathBuf,
}

impl fmt::Debug for Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("serializers", &self.serializers)
            .field("capture_call_stack", &self.capture_call_stack)
            .field("working_dir", &self.working_dir)
            .finish()
    }
}

impl Recorder {
    pub fn new(serializers: SerializerRegistry) -> Self {
        Self {
            serializers,
            probe: Arc::new(BacktraceProbe),
            capture_call_stack: true,
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn StackProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_call_stack(mut self, enabled: bool) -> Self {
        self.capture_call_stack = enabled;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn serializers(&self) -> &SerializerRegistry {
        &self.serializers
    }

    /// Bind supplied arguments against the parameter table and snapshot them.
    ///
    /// Must run before the call, while the arguments are still intact.
    pub fn bind(
        &self,
        target: &FunctionDescriptor,
        invocation: &Invocation<'_>,
    ) -> Result<BoundArguments, CaptureError> {
        let binding_error = |reason: String| CaptureError::Binding {
            function: target.name.clone(),
            reason,
        };

        let params = &target.params;
        if invocation.positional.len() > params.len() {
            return Err(binding_error(format!(
                "takes {} arguments but {} were given",
                params.len(),
                invocation.positional.len()
            )));
        }

        let mut slots: Vec<Option<&dyn Watched>> = vec![None; params.len()];
        for (slot, value) in slots.iter_mut().zip(&invocation.positional) {
            *slot = Some(*value);
        }
        for (name, value) in &invocation.keyword {
            let idx = params
                .iter()
                .position(|p| p.name == *name)
                .ok_or_else(|| binding_error(format!("unexpected keyword argument `{name}`")))?;
            if slots[idx].is_some() {
                return Err(binding_error(format!("multiple values for `{name}`")));
            }
            slots[idx] = Some(*value);
        }

        let mut arguments = Vec::with_capacity(params.len());
        for (param, slot) in params.iter().zip(slots) {
            let value = match slot {
                Some(value) => value,
                None => match param.default.as_deref() {
                    Some(default) => default as &dyn Watched,
                    None => {
                        return Err(binding_error(format!(
                            "missing argument `{}`",
                            param.name
                        )))
                    }
                },
            };
            arguments.push(self.snapshot_value(
                &param.name,
                value,
                param.borrow,
                ValueRole::Income,
                "",
            )?);
        }

        let (class_name, class_snapshot) = match (invocation.receiver, &target.owner) {
            (Some(receiver), owner) => {
                let owner = owner.as_deref().unwrap_or_else(|| receiver.type_name());
                (short_type_name(owner), self.serializers.snapshot(receiver)?)
            }
            (None, Some(_)) => return Err(CaptureError::MissingReceiver(target.name.clone())),
            (None, None) => (String::new(), String::new()),
        };

        Ok(BoundArguments {
            class_name,
            class_snapshot,
            arguments,
        })
    }

    /// Assemble the record once the call has returned or panicked.
    pub fn capture(
        &self,
        target: &FunctionDescriptor,
        bound: BoundArguments,
        result: CallResult<'_>,
        note: &str,
    ) -> Result<InvocationRecord, CaptureError> {
        let results = match result {
            CallResult::Single(value) => vec![self.snapshot_value(
                "ret_0",
                value,
                Borrow::Owned,
                ValueRole::Result,
                note,
            )?],
            CallResult::Tuple(values) => values
                .into_iter()
                .enumerate()
                .map(|(i, value)| {
                    self.snapshot_value(
                        &format!("ret_{i}"),
                        value,
                        Borrow::Owned,
                        ValueRole::Result,
                        if i == 0 { note } else { "" },
                    )
                })
                .collect::<Result<Vec<_>, _>>()?,
            CallResult::Panicked(panic) => vec![panic_snapshot(panic, note)?],
        };

        let callers = if self.capture_call_stack {
            self.probe.frames()
        } else {
            Vec::new()
        };

        let record = InvocationRecord {
            run_id: 0,
            scope_path: scope_path(&self.working_dir, Path::new(&target.file)),
            class_name: bound.class_name,
            class_snapshot: bound.class_snapshot,
            function_name: target.name.clone(),
            call_stack: render_call_stack(&callers, &target.frame()),
            arguments: bound.arguments,
            results,
            additional_info: note.to_string(),
        };

        tracing::debug!(
            function = %record.function_name,
            scope = %record.scope_path,
            arguments = record.arguments.len(),
            results = record.results.len(),
            "captured invocation"
        );
        Ok(record)
    }

    fn snapshot_value(
        &self,
        name: &str,
        value: &dyn Watched,
        borrow: Borrow,
        role: ValueRole,
        note: &str,
    ) -> Result<ValueSnapshot, CaptureError> {
        let classification = classify(value, borrow);
        let literal = match classification.primitive {
            Some(primitive) => primitive.literal_text(),
            None => self.serializers.snapshot(value)?,
        };
        Ok(ValueSnapshot {
            name: name.to_string(),
            type_tag: classification.type_tag(),
            is_primitive: classification.is_primitive(),
            value: literal,
            role,
            note: note.to_string(),
        })
    }
}

fn panic_snapshot(panic: &CapturedPanic, note: &str) -> Result<ValueSnapshot, CaptureError> {
    let classification = classify(panic, Borrow::Owned);
    let bytes = serde_json::to_vec(panic).map_err(|e| CaptureError::Serializer {
        type_name: classification.descriptor.name.clone(),
        message: e.to_string(),
    })?;
    Ok(ValueSnapshot {
        name: "ret_0".to_string(),
        type_tag: classification.type_tag(),
        is_primitive: false,
        value: encode_blob(&bytes),
        role: ValueRole::Result,
        note: note.to_string(),
    })
}

/// Last path segment of a type name, ignoring generic arguments.
pub fn short_type_name(type_name: &str) -> String {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Dotted module location of `source_file` relative to `working_dir`.
///
/// The shared leading components are dropped and the file extension removed,
/// so `/work/proj` + `/work/proj/src/calc.rs` gives `src.calc`. A relative
/// `file!()` path shares nothing with an absolute working dir and is kept whole.
pub fn scope_path(working_dir: &Path, source_file: &Path) -> String {
    let stripped = source_file.with_extension("");
    let here: Vec<Component<'_>> = working_dir.components().collect();
    let there: Vec<Component<'_>> = stripped.components().collect();

    let common = here
        .iter()
        .zip(&there)
        .take_while(|(a, b)| a == b)
        .count();
    let unique = if common >= there.len() {
        &there[..]
    } else {
        &there[common..]
    };

    unique
        .iter()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::classify::TypeDescriptor;
    use crate::snapshot::serializer::restore;
    use crate::snapshot::stack::FixedProbe;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        n: u32,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Table {
        rows: Vec<i64>,
    }

    fn recorder() -> Recorder {
        let mut serializers = SerializerRegistry::with_defaults();
        serializers.register::<Counter>().register::<Table>();
        Recorder::new(serializers)
            .with_working_dir("/work/demo")
            .with_probe(Arc::new(FixedProbe(vec![Frame::new("main", "demo")])))
    }

    fn f_descriptor() -> FunctionDescriptor {
        FunctionDescriptor::new("f", "/work/demo/src/calc.rs", "demo::calc").param_default("x", 1_i64)
    }

    #[test]
    fn free_function_call_is_recorded() {
        let recorder = recorder();
        let target = f_descriptor();

        let bound = recorder
            .bind(&target, &Invocation::new().arg(&5_i64))
            .unwrap();
        let record = recorder
            .capture(&target, bound, CallResult::Single(&10_i64), "")
            .unwrap();

        assert_eq!(record.scope_path, "src.calc");
        assert_eq!(record.class_name, "");
        assert_eq!(record.class_snapshot, "");
        assert_eq!(record.call_stack, "main@demo -> f@demo::calc");

        assert_eq!(record.arguments.len(), 1);
        let x = &record.arguments[0];
        assert_eq!((x.name.as_str(), x.value.as_str()), ("x", "5"));
        assert!(x.is_primitive);
        assert_eq!(x.role, ValueRole::Income);

        assert_eq!(record.results.len(), 1);
        let ret = &record.results[0];
        assert_eq!((ret.name.as_str(), ret.value.as_str()), ("ret_0", "10"));
        assert_eq!(ret.role, ValueRole::Result);
        assert_eq!(TypeDescriptor::decode(&ret.type_tag).unwrap().name, "i64");
    }

    #[test]
    fn defaults_fill_missing_arguments() {
        let recorder = recorder();
        let bound = recorder.bind(&f_descriptor(), &Invocation::new()).unwrap();
        assert_eq!(bound.arguments[0].value, "1");
    }

    #[test]
    fn keyword_arguments_bind_by_name_in_declared_order() {
        let recorder = recorder();
        let target = FunctionDescriptor::new("g", "src/g.rs", "demo")
            .param("a")
            .param_ref("table")
            .param_default("flag", false);
        let table = Table { rows: vec![1, 2] };

        let bound = recorder
            .bind(
                &target,
                &Invocation::new().kwarg("table", &table).kwarg("a", &3_u8),
            )
            .unwrap();

        let names: Vec<&str> = bound.arguments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a", "table", "flag"]);
        assert!(!bound.arguments[1].is_primitive);
        assert_eq!(restore::<Table>(&bound.arguments[1].value), table);
        let descriptor = TypeDescriptor::decode(&bound.arguments[1].type_tag).unwrap();
        assert_eq!(descriptor.borrow, Borrow::Shared);
    }

    #[test]
    fn binding_mismatches_are_capture_errors() {
        let recorder = recorder();
        let target = FunctionDescriptor::new("h", "src/h.rs", "demo").param("a");

        let too_many = recorder.bind(&target, &Invocation::new().arg(&1_i32).arg(&2_i32));
        assert!(matches!(too_many, Err(CaptureError::Binding { .. })));

        let unknown = recorder.bind(&target, &Invocation::new().kwarg("b", &1_i32));
        assert!(matches!(unknown, Err(CaptureError::Binding { .. })));

        let twice = recorder.bind(&target, &Invocation::new().arg(&1_i32).kwarg("a", &2_i32));
        assert!(matches!(twice, Err(CaptureError::Binding { .. })));

        let missing = recorder.bind(&target, &Invocation::new());
        assert!(matches!(missing, Err(CaptureError::Binding { .. })));
    }

    #[test]
    fn method_receiver_is_snapshotted_and_excluded_from_arguments() {
        let recorder = recorder();
        let target = FunctionDescriptor::new("absorb", "src/counter.rs", "demo::counter")
            .method_of::<Counter>()
            .param("table");
        let counter = Counter { n: 12 };
        let table = Table { rows: vec![4] };

        let bound = recorder
            .bind(&target, &Invocation::new().on(&counter).arg(&table))
            .unwrap();

        assert_eq!(bound.class_name, "Counter");
        assert_eq!(bound.arguments.len(), 1);
        assert_eq!(restore::<Counter>(&bound.class_snapshot).n, 12);
    }

    #[test]
    fn method_without_receiver_fails() {
        let recorder = recorder();
        let target = FunctionDescriptor::new("absorb", "src/counter.rs", "demo::counter")
            .method_of::<Counter>();
        let err = recorder.bind(&target, &Invocation::new()).unwrap_err();
        assert!(matches!(err, CaptureError::MissingReceiver(_)));
    }

    #[test]
    fn unserializable_argument_fails_binding() {
        struct Opaque;
        let recorder = recorder();
        let target = FunctionDescriptor::new("o", "src/o.rs", "demo").param("v");
        let err = recorder
            .bind(&target, &Invocation::new().arg(&Opaque))
            .unwrap_err();
        assert!(matches!(err, CaptureError::Unserializable(_)));
    }

    #[test]
    fn tuple_results_expand_positionally() {
        let recorder = recorder();
        let target = FunctionDescriptor::new("split", "src/s.rs", "demo");
        let bound = recorder.bind(&target, &Invocation::new()).unwrap();
        let table = Table { rows: vec![] };

        let record = recorder
            .capture(
                &target,
                bound,
                CallResult::Tuple(vec![&table as &dyn Watched, &2_i32, &true]),
                "",
            )
            .unwrap();

        let names: Vec<&str> = record.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["ret_0", "ret_1", "ret_2"]);
        assert!(!record.results[0].is_primitive);
        assert_eq!(record.results[2].value, "true");
    }

    #[test]
    fn unit_result_has_no_entries() {
        let recorder = recorder();
        let target = FunctionDescriptor::new("touch", "src/t.rs", "demo");
        let bound = recorder.bind(&target, &Invocation::new()).unwrap();
        let record = recorder
            .capture(&target, bound, CallResult::Tuple(Vec::new()), "")
            .unwrap();
        assert!(record.results.is_empty());
    }

    #[test]
    fn panic_is_recorded_as_single_result_with_note() {
        let recorder = recorder();
        let target = FunctionDescriptor::new("boom", "src/b.rs", "demo");
        let bound = recorder.bind(&target, &Invocation::new()).unwrap();
        let panic = CapturedPanic::new("division by zero");

        let record = recorder
            .capture(
                &target,
                bound,
                CallResult::Panicked(&panic),
                "panicked: division by zero",
            )
            .unwrap();

        assert_eq!(record.results.len(), 1);
        assert_eq!(record.results[0].note, "panicked: division by zero");
        assert_eq!(record.additional_info, "panicked: division by zero");
        assert_eq!(restore::<CapturedPanic>(&record.results[0].value), panic);
    }

    #[test]
    fn scope_path_handles_relative_and_absolute_files() {
        let cwd = Path::new("/work/demo");
        assert_eq!(scope_path(cwd, Path::new("/work/demo/src/calc.rs")), "src.calc");
        assert_eq!(scope_path(cwd, Path::new("src/calc.rs")), "src.calc");
        assert_eq!(
            scope_path(cwd, Path::new("/work/other/src/lib.rs")),
            "other.src.lib"
        );
        assert_eq!(scope_path(cwd, Path::new("./src/main.rs")), "src.main");
    }

    #[test]
    fn short_type_name_strips_path_and_generics() {
        assert_eq!(short_type_name("demo::counter::Counter"), "Counter");
        assert_eq!(short_type_name("demo::Wrapper<demo::Inner>"), "Wrapper");
        assert_eq!(short_type_name("Plain"), "Plain");
    }
}
