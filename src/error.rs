//! Error taxonomy for capture, persistence and reconstruction.
//!
//! Capture failures are swallowed (logged) by the interception shim so the
//! watched program keeps running. Everything on the conversion side is loud.

use std::path::PathBuf;

use crate::snapshot::model::SessionState;

/// A single invocation could not be recorded.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("no serializer registered for type `{0}`")]
    Unserializable(String),

    #[error("serializer failed for `{type_name}`: {message}")]
    Serializer { type_name: String, message: String },

    #[error("argument binding failed for `{function}`: {reason}")]
    Binding { function: String, reason: String },

    #[error("method `{0}` was invoked without a receiver")]
    MissingReceiver(String),

    #[error("`{function}` returns the tuple `{type_name}`; watch it with `call_tuple`")]
    TupleResult { function: String, type_name: String },
}

/// Writing a snapshot container failed. Fatal to the current flush.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("document error: {0}")]
    Document(String),
}

/// The container could not be opened or its document is malformed.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("xml syntax error at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    #[error("unexpected root element `{found}` (expected `{expected}`)")]
    Root { expected: String, found: String },

    #[error("list node `{list}` contains `{found}` (expected `{expected}`)")]
    ListChild {
        list: String,
        expected: String,
        found: String,
    },

    #[error("record node `{parent}` has duplicate child `{child}`")]
    DuplicateChild { parent: String, child: String },

    #[error("document ended inside `{0}`")]
    Truncated(String),

    #[error("document contains no root element")]
    Empty,
}

/// A record in an otherwise well-formed document is unusable.
#[derive(Debug, thiserror::Error)]
pub enum ReconstructionError {
    #[error("{context}: missing required field `{field}`")]
    MissingField { context: String, field: String },

    #[error("{context}: field `{field}` is not a list node")]
    NotAList { context: String, field: String },

    #[error("{context}: invalid value `{value}` for `{field}`")]
    InvalidField {
        context: String,
        field: String,
        value: String,
    },

    #[error("{context}: bad base64 payload: {source}")]
    Base64 {
        context: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("{context}: bad type tag: {message}")]
    TypeTag { context: String, message: String },

    #[error("{context}: no comparator configured for type `{type_name}`")]
    NoComparator { context: String, type_name: String },
}

/// Illegal session state transitions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        state: SessionState,
        action: &'static str,
    },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// `slothwatch.toml` could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value `{value}` for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Failure of a whole container-to-tests conversion run.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Reconstruction(#[from] ReconstructionError),

    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive name `{0}` has no usable file stem")]
    ArchiveName(PathBuf),
}
