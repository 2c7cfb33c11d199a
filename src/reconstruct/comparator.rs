//! Type-directed equality for generated assertions.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ReconstructionError;

/// How a generated test compares the actual value with the recorded one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparator {
    /// `assert_eq!(actual, expected)`
    PartialEq,
    /// `assert!(actual.<method>(&expected))`
    Method(String),
    /// `assert!(<path>(&actual, &expected))`
    Function(String),
}

impl Comparator {
    /// Render the assertion statement.
    pub fn assertion(&self, actual: &str, expected: &str) -> String {
        match self {
            Comparator::PartialEq => format!("assert_eq!({actual}, {expected});"),
            Comparator::Method(method) => format!("assert!({actual}.{method}(&{expected}));"),
            Comparator::Function(path) => format!("assert!({path}(&{actual}, &{expected}));"),
        }
    }
}

impl FromStr for Comparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if matches!(s, "eq" | "==" | "partial_eq" | "partial-eq") {
            return Ok(Comparator::PartialEq);
        }
        if let Some(method) = s.strip_prefix("method:") {
            let method = method.trim();
            if is_ident(method) {
                return Ok(Comparator::Method(method.to_string()));
            }
            return Err(format!("`{method}` is not a method name"));
        }
        if let Some(path) = s.strip_prefix("fn:") {
            let path = path.trim();
            if !path.is_empty() && path.split("::").all(is_ident) {
                return Ok(Comparator::Function(path.to_string()));
            }
            return Err(format!("`{path}` is not a function path"));
        }
        Err("expected `eq`, `method:<name>` or `fn:<path>`".to_string())
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparator::PartialEq => f.write_str("eq"),
            Comparator::Method(method) => write!(f, "method:{method}"),
            Comparator::Function(path) => write!(f, "fn:{path}"),
        }
    }
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// What to do for a type with no configured comparator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// Use `PartialEq` and say so in the generated code.
    #[default]
    #[serde(alias = "eq")]
    PartialEq,
    /// Fail the conversion.
    Reject,
}

/// The comparator picked for one result position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub comparator: Comparator,
    /// True when no entry matched and the fallback was applied.
    pub fallback: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparatorTable {
    entries: BTreeMap<String, Comparator>,
    fallback: FallbackPolicy,
}

impl ComparatorTable {
    pub fn new(fallback: FallbackPolicy) -> Self {
        Self {
            entries: BTreeMap::new(),
            fallback,
        }
    }

    pub fn insert(&mut self, type_name: impl Into<String>, comparator: Comparator) -> &mut Self {
        self.entries.insert(type_name.into(), comparator);
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&Comparator> {
        self.entries.get(type_name)
    }

    pub fn fallback(&self) -> FallbackPolicy {
        self.fallback
    }

    pub fn set_fallback(&mut self, fallback: FallbackPolicy) {
        self.fallback = fallback;
    }

    /// Look up `type_name` (as recorded, then as rendered in Rust source).
    pub fn select(
        &self,
        type_name: &str,
        rust_type: &str,
        context: &str,
    ) -> Result<Selection, ReconstructionError> {
        if let Some(comparator) = self.get(type_name).or_else(|| self.get(rust_type)) {
            return Ok(Selection {
                comparator: comparator.clone(),
                fallback: false,
            });
        }
        match self.fallback {
            FallbackPolicy::PartialEq => Ok(Selection {
                comparator: Comparator::PartialEq,
                fallback: true,
            }),
            FallbackPolicy::Reject => Err(ReconstructionError::NoComparator {
                context: context.to_string(),
                type_name: type_name.to_string(),
            }),
        }
    }
}
