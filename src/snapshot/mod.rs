//! Capture side: classification, recording, the session and its container.

pub mod classify;
pub mod container;
pub mod model;
pub mod recorder;
pub mod serializer;
pub mod session;
pub mod stack;
pub mod tree;

pub use classify::{classify, Borrow, Primitive, TypeDescriptor, Watched};
pub use container::write_container;
pub use model::{InvocationRecord, SessionState, SnapshotContainer, ValueRole, ValueSnapshot};
pub use recorder::{CallResult, FunctionDescriptor, Invocation, ParamSpec, Recorder};
pub use serializer::{ObjectSerializer, SerializerRegistry};
pub use session::{Session, SharedSession};
pub use tree::{read_container, Node, NodeBody};
