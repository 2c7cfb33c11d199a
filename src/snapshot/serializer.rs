//! Pluggable object serialization for opaque values.
//!
//! The recorder only ever talks to [`ObjectSerializer`]; which concrete codec
//! handles a type is decided by the [`SerializerRegistry`], keyed by the type
//! name recorded in the value's type descriptor.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use base64::engine::general_purpose;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CaptureError;
use crate::replay::CapturedPanic;
use crate::snapshot::classify::Watched;

#[derive(Debug, thiserror::Error)]
pub enum SerializerError {
    #[error("value is not a `{expected}`")]
    TypeMismatch { expected: &'static str },
    #[error("codec error: {0}")]
    Codec(String),
}

/// Converts a runtime object to bytes and back.
pub trait ObjectSerializer: Send + Sync {
    fn serialize(&self, value: &dyn Any) -> Result<Vec<u8>, SerializerError>;
    fn deserialize(&self, bytes: &[u8]) -> Result<Box<dyn Any>, SerializerError>;
}

/// `serde_json` codec for a single concrete type.
pub struct JsonSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSerializer<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ObjectSerializer for JsonSerializer<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    fn serialize(&self, value: &dyn Any) -> Result<Vec<u8>, SerializerError> {
        let value = value
            .downcast_ref::<T>()
            .ok_or(SerializerError::TypeMismatch {
                expected: std::any::type_name::<T>(),
            })?;
        serde_json::to_vec(value).map_err(|e| SerializerError::Codec(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Box<dyn Any>, SerializerError> {
        let value: T =
            serde_json::from_slice(bytes).map_err(|e| SerializerError::Codec(e.to_string()))?;
        Ok(Box::new(value))
    }
}

/// Serializers keyed by `std::any::type_name`.
#[derive(Clone, Default)]
pub struct SerializerRegistry {
    by_type: HashMap<String, Arc<dyn ObjectSerializer>>,
}

impl fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.by_type.keys().collect();
        names.sort();
        f.debug_struct("SerializerRegistry")
            .field("types", &names)
            .finish()
    }
}

impl SerializerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with `String` and the captured-panic type.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register::<String>().register::<CapturedPanic>();
        registry
    }

    /// Register the JSON codec for `T`.
    pub fn register<T>(&mut self) -> &mut Self
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        self.register_with(
            std::any::type_name::<T>(),
            Arc::new(JsonSerializer::<T>::new()),
        )
    }

    /// Tuple types are refused; tuple results expand into one value per
    /// element instead of a single blob.
    pub fn register_with(
        &mut self,
        type_name: impl Into<String>,
        serializer: Arc<dyn ObjectSerializer>,
    ) -> &mut Self {
        let type_name = type_name.into();
        if is_tuple_type(&type_name) {
            tracing::warn!(type_name = %type_name, "tuple types cannot be registered");
            return self;
        }
        self.by_type.insert(type_name, serializer);
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&Arc<dyn ObjectSerializer>> {
        self.by_type.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.by_type.contains_key(type_name)
    }

    /// Serialize a watched value and base64-encode it.
    pub fn snapshot(&self, value: &dyn Watched) -> Result<String, CaptureError> {
        let type_name = value.type_name();
        let serializer = self
            .get(type_name)
            .ok_or_else(|| CaptureError::Unserializable(type_name.to_string()))?;
        let bytes = serializer
            .serialize(value.as_any())
            .map_err(|e| CaptureError::Serializer {
                type_name: type_name.to_string(),
                message: e.to_string(),
            })?;
        Ok(encode_blob(&bytes))
    }

    /// Inverse of [`snapshot`](Self::snapshot) for a known type name.
    pub fn restore(&self, type_name: &str, blob: &str) -> Result<Box<dyn Any>, RestoreError> {
        let serializer = self
            .get(type_name)
            .ok_or_else(|| RestoreError::Unregistered(type_name.to_string()))?;
        let bytes = decode_blob(blob)?;
        Ok(serializer.deserialize(&bytes)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    #[error("bad base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload does not decode: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Serializer(#[from] SerializerError),
    #[error("no serializer registered for `{0}`")]
    Unregistered(String),
}

/// `(A, B)` style names; the unit type is not a tuple here.
pub fn is_tuple_type(type_name: &str) -> bool {
    type_name.starts_with('(') && type_name != "()"
}

pub fn encode_blob(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

pub fn decode_blob(blob: &str) -> Result<Vec<u8>, base64::DecodeError> {
    // Blobs may be wrapped across lines by other producers.
    let compact: String = blob.chars().filter(|c| !c.is_whitespace()).collect();
    general_purpose::STANDARD.decode(compact)
}

/// Decode a blob written by the default JSON codec.
pub fn try_restore<T: DeserializeOwned>(blob: &str) -> Result<T, RestoreError> {
    let bytes = decode_blob(blob)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Like [`try_restore`], for generated test data.
///
/// # Panics
///
/// Panics when the blob does not decode into `T`; inside a generated test
/// that is the desired failure.
pub fn restore<T: DeserializeOwned>(blob: &str) -> T {
    match try_restore(blob) {
        Ok(value) => value,
        Err(err) => panic!(
            "captured value does not restore as `{}`: {err}",
            std::any::type_name::<T>()
        ),
    }
}
