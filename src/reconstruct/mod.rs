//! Offline side: container tree to typed records to generated tests.

pub mod codegen;
pub mod comparator;
pub mod converter;
pub mod document;

pub use codegen::{reconstruct, DataFragment, TestFragment};
pub use comparator::{Comparator, ComparatorTable, FallbackPolicy};
pub use converter::{pack_name, ConvertOutput, Converter, GeneratedSources};
pub use document::extract_container;
