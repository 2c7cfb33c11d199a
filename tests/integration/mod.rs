//! Integration tests for slothwatch
//!
//! These tests drive the public API and the binary end to end.

pub mod cli;
pub mod end_to_end;
pub mod golden;
