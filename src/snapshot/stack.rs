//! Human-readable caller chains for invocation records.

use std::backtrace::Backtrace;
use std::sync::OnceLock;

use regex::Regex;

/// Crate paths that never belong to the watched program. Bare runtime
/// symbols (`rust_begin_unwind`, `__libc_start_main`) have no module and are
/// dropped by [`Frame::from_symbol`].
const RUNTIME_CRATES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "test::",
    "backtrace::",
    "slothwatch::",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub function: String,
    pub module: String,
}

impl Frame {
    pub fn new(function: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            module: module.into(),
        }
    }

    /// Split a demangled symbol (`demo::calc::double`) into a frame.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let split = last_top_level_separator(symbol)?;
        let module = &symbol[..split];
        let function = &symbol[split + 2..];
        if module.is_empty() || function.is_empty() {
            return None;
        }
        Some(Self::new(function, module))
    }

    pub fn render(&self) -> String {
        format!("{}@{}", self.function, self.module)
    }
}

/// Source of the active caller frames, outermost first.
pub trait StackProbe: Send + Sync {
    fn frames(&self) -> Vec<Frame>;
}

/// Walks the real call stack with `std::backtrace`.
///
/// Without debug symbols this yields nothing and the rendered stack is just
/// the target frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct BacktraceProbe;

impl StackProbe for BacktraceProbe {
    fn frames(&self) -> Vec<Frame> {
        parse_backtrace(&Backtrace::force_capture().to_string())
    }
}

/// A probe that reports a fixed caller chain.
#[derive(Debug, Default, Clone)]
pub struct FixedProbe(pub Vec<Frame>);

impl StackProbe for FixedProbe {
    fn frames(&self) -> Vec<Frame> {
        self.0.clone()
    }
}

fn frame_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\d+:\s+(\S.*?)\s*$").expect("frame line regex"))
}

fn hash_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"::h[0-9a-f]{16}$").expect("hash suffix regex"))
}

/// Parse `Backtrace` display output into program frames, outermost first.
pub fn parse_backtrace(text: &str) -> Vec<Frame> {
    let mut frames: Vec<Frame> = text
        .lines()
        .filter_map(|line| frame_line().captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .map(|symbol| hash_suffix().replace(&symbol, "").into_owned())
        .filter(|symbol| is_program_symbol(symbol))
        .filter_map(|symbol| Frame::from_symbol(&symbol))
        .collect();
    frames.reverse();
    frames
}

fn is_program_symbol(symbol: &str) -> bool {
    if let Some(rest) = symbol.strip_prefix('<') {
        // `<Self as Trait>::method`: judge by the implementing type.
        let self_ty = rest.split(" as ").next().unwrap_or(rest);
        if !self_ty.contains("::") {
            return false;
        }
        return !RUNTIME_CRATES.iter().any(|p| self_ty.starts_with(p));
    }
    !RUNTIME_CRATES.iter().any(|p| symbol.starts_with(p))
}

fn last_top_level_separator(symbol: &str) -> Option<usize> {
    let bytes = symbol.as_bytes();
    let mut depth = 0i32;
    let mut found = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' => depth -= 1,
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                found = Some(i);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    found
}

/// Render callers outermost first, with the target appended last.
pub fn render_call_stack(callers: &[Frame], target: &Frame) -> String {
    callers
        .iter()
        .chain(std::iter::once(target))
        .map(Frame::render)
        .collect::<Vec<_>>()
        .join(" -> ")
}
