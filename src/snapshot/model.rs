use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Recorder activity state. The wire codes match the `SLOTH_STATE` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Watching,
    /// Capture is suppressed; calls pass through unrecorded.
    Testing,
}

impl SessionState {
    pub fn code(self) -> &'static str {
        match self {
            SessionState::Idle => "0",
            SessionState::Watching => "1",
            SessionState::Testing => "2",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Idle => "idle",
            SessionState::Watching => "watching",
            SessionState::Testing => "testing",
        };
        f.write_str(label)
    }
}

impl FromStr for SessionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "idle" => Ok(SessionState::Idle),
            "1" | "watching" => Ok(SessionState::Watching),
            "2" | "testing" => Ok(SessionState::Testing),
            other => Err(format!("unknown session state `{other}`")),
        }
    }
}

/// Whether a snapshot went into the call or came out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueRole {
    Income,
    Result,
}

impl ValueRole {
    /// Code written to `par_state`.
    pub fn code(self) -> &'static str {
        match self {
            ValueRole::Result => "0",
            ValueRole::Income => "1",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "0" => Some(ValueRole::Result),
            "1" => Some(ValueRole::Income),
            other if other.eq_ignore_ascii_case("result") => Some(ValueRole::Result),
            other if other.eq_ignore_ascii_case("income") => Some(ValueRole::Income),
            _ => None,
        }
    }
}

/// One captured argument or result value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSnapshot {
    pub name: String,
    /// Encoded [`TypeDescriptor`](crate::snapshot::classify::TypeDescriptor).
    pub type_tag: String,
    pub is_primitive: bool,
    /// Literal text for primitives, base64 serializer output otherwise.
    pub value: String,
    pub role: ValueRole,
    pub note: String,
}

/// The capture of one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationRecord {
    /// Assigned by [`SnapshotContainer::push`]; zero until then.
    pub run_id: u64,
    pub scope_path: String,
    pub class_name: String,
    pub class_snapshot: String,
    pub function_name: String,
    pub call_stack: String,
    pub arguments: Vec<ValueSnapshot>,
    pub results: Vec<ValueSnapshot>,
    pub additional_info: String,
}

impl InvocationRecord {
    pub fn is_method(&self) -> bool {
        !self.class_name.is_empty()
    }

    /// `functionName_runId`, the per-record identifier used in generated code.
    pub fn ident(&self) -> String {
        format!("{}_{}", self.function_name, self.run_id)
    }
}

/// An ordered batch of records plus the session metadata it was taken under.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SnapshotContainer {
    pub instance_id: String,
    pub snapshot_id: String,
    pub session_id: String,
    pub records: Vec<InvocationRecord>,
}

impl SnapshotContainer {
    pub fn new(
        instance_id: impl Into<String>,
        snapshot_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            snapshot_id: snapshot_id.into(),
            session_id: session_id.into(),
            records: Vec::new(),
        }
    }

    /// Append a record, stamping it with the next run id. Returns that id.
    pub fn push(&mut self, mut record: InvocationRecord) -> u64 {
        let run_id = self.records.last().map(|r| r.run_id).unwrap_or(0) + 1;
        record.run_id = run_id;
        self.records.push(record);
        run_id
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
