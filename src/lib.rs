//! Record live calls of selected functions into snapshot archives, then
//! reconstruct regression tests from those archives offline.

pub mod config;
pub mod error;
pub mod reconstruct;
pub mod replay;
pub mod snapshot;
pub mod watch;

pub use config::{Config, ConvertConfig, WatchConfig};
pub use error::{
    CaptureError, ConfigError, ConvertError, ParseError, PersistenceError, ReconstructionError,
    SessionError,
};
pub use reconstruct::{Comparator, ComparatorTable, Converter, FallbackPolicy};
pub use replay::{CapturedPanic, Outcome};
pub use snapshot::serializer::{restore, try_restore};
pub use snapshot::{
    FunctionDescriptor, Invocation, Recorder, SerializerRegistry, Session, SessionState,
    SharedSession,
};
pub use watch::{PendingCall, TupleResults, Watcher};
