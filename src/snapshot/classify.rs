//! Value classification: primitive literal vs. opaque serialized object.
//!
//! Only the exact scalar types listed in [`Primitive`] are literal-representable.
//! A newtype around `f64` is opaque, even though it behaves like a number.

use std::any::Any;

use base64::engine::general_purpose;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// A value that can cross the capture boundary.
///
/// Implemented for every `'static` type; the trait only exists so that a
/// `&dyn Watched` carries its concrete type name alongside the `Any` view.
pub trait Watched: Any {
    fn type_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> Watched for T {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

macro_rules! primitives {
    ($($variant:ident => $ty:ident),* $(,)?) => {
        /// A scalar captured by value.
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub enum Primitive {
            $($variant($ty)),*
        }

        impl Primitive {
            /// Exact-type match against the supported scalars.
            pub fn from_any(value: &dyn Any) -> Option<Self> {
                $(
                    if let Some(v) = value.downcast_ref::<$ty>() {
                        return Some(Primitive::$variant(*v));
                    }
                )*
                None
            }

            pub fn type_name(&self) -> &'static str {
                match self {
                    $(Primitive::$variant(_) => stringify!($ty)),*
                }
            }

            /// Rebuild a primitive from its type name and stored literal text.
            pub fn parse(type_name: &str, text: &str) -> Option<Self> {
                let lowered;
                let text = if type_name == "bool" {
                    lowered = text.trim().to_ascii_lowercase();
                    lowered.as_str()
                } else {
                    text.trim()
                };
                match type_name {
                    $(stringify!($ty) => text.parse::<$ty>().ok().map(Primitive::$variant),)*
                    _ => None,
                }
            }

            /// Text stored in `par_value`.
            pub fn literal_text(&self) -> String {
                match self {
                    $(Primitive::$variant(v) => format!("{:?}", v)),*
                }
            }
        }
    };
}

primitives! {
    Bool => bool,
    I8 => i8,
    I16 => i16,
    I32 => i32,
    I64 => i64,
    I128 => i128,
    Isize => isize,
    U8 => u8,
    U16 => u16,
    U32 => u32,
    U64 => u64,
    U128 => u128,
    Usize => usize,
    F32 => f32,
    F64 => f64,
}

impl Primitive {
    /// A typed Rust expression producing this exact value.
    pub fn to_rust_literal(&self) -> String {
        match *self {
            Primitive::Bool(v) => v.to_string(),
            Primitive::F32(v) => float_literal(v as f64, "f32"),
            Primitive::F64(v) => float_literal(v, "f64"),
            other => format!("{}_{}", other.literal_text(), other.type_name()),
        }
    }
}

fn float_literal(v: f64, ty: &str) -> String {
    if v.is_nan() {
        format!("{ty}::NAN")
    } else if v == f64::INFINITY {
        format!("{ty}::INFINITY")
    } else if v == f64::NEG_INFINITY {
        format!("{ty}::NEG_INFINITY")
    } else if ty == "f32" {
        format!("{:?}_{ty}", v as f32)
    } else {
        format!("{v:?}_{ty}")
    }
}

/// How a parameter is handed to the watched function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Borrow {
    #[default]
    Owned,
    Shared,
    Mut,
}

impl Borrow {
    pub fn is_owned(&self) -> bool {
        matches!(self, Borrow::Owned)
    }

    /// Expression prefix used when passing the value.
    pub fn prefix(&self) -> &'static str {
        match self {
            Borrow::Owned => "",
            Borrow::Shared => "&",
            Borrow::Mut => "&mut ",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TypeTagError {
    #[error("not base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("not a type descriptor: {0}")]
    Json(#[from] serde_json::Error),
}

/// The recorded identity of a value's runtime type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Borrow::is_owned")]
    pub borrow: Borrow,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, borrow: Borrow) -> Self {
        Self {
            name: name.into(),
            borrow,
        }
    }

    pub fn of<T: Any>() -> Self {
        Self::new(std::any::type_name::<T>(), Borrow::Owned)
    }

    /// Encode as an opaque type tag (`par_type`).
    pub fn encode(&self) -> String {
        // Serializing a struct of strings into a Vec cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        general_purpose::STANDARD.encode(json)
    }

    pub fn decode(tag: &str) -> Result<Self, TypeTagError> {
        let bytes = general_purpose::STANDARD.decode(tag.trim())?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Result of [`classify`].
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub descriptor: TypeDescriptor,
    pub primitive: Option<Primitive>,
}

impl Classification {
    pub fn type_tag(&self) -> String {
        self.descriptor.encode()
    }

    pub fn is_primitive(&self) -> bool {
        self.primitive.is_some()
    }
}

/// Classify a value. Never fails: anything non-primitive is opaque.
pub fn classify(value: &dyn Watched, borrow: Borrow) -> Classification {
    Classification {
        descriptor: TypeDescriptor::new(value.type_name(), borrow),
        primitive: Primitive::from_any(value.as_any()),
    }
}
