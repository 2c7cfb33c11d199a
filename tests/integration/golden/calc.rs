//! Functions watched to produce the checked-in generated files.

use serde::{Deserialize, Serialize};
use slothwatch::{describe, FunctionDescriptor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    pub n: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub amount: u32,
}

impl Ledger {
    pub fn absorb(&mut self, entry: &Entry) -> u32 {
        self.n += entry.amount;
        self.n
    }
}

pub fn double(x: i64) -> i64 {
    x * 2
}

pub fn scale(x: f64, factor: f64) -> f64 {
    x * factor
}

pub fn split(x: i64) -> (i64, bool) {
    (x / 2, x % 2 == 0)
}

pub fn divide(a: i32, b: i32) -> i32 {
    if b == 0 {
        panic!("attempt to divide by zero");
    }
    a / b
}

pub fn touch() {}

/// Float comparator named in the converter config.
pub fn close_enough(actual: &f64, expected: &f64) -> bool {
    (actual - expected).abs() < 1e-9
}

pub fn double_target() -> FunctionDescriptor {
    describe!(double(x))
}

pub fn scale_target() -> FunctionDescriptor {
    describe!(scale(x, factor = 2.0_f64))
}

pub fn absorb_target() -> FunctionDescriptor {
    describe!(Ledger => absorb(&entry))
}

pub fn split_target() -> FunctionDescriptor {
    describe!(split(x))
}

pub fn divide_target() -> FunctionDescriptor {
    describe!(divide(a, b))
}

pub fn touch_target() -> FunctionDescriptor {
    describe!(touch())
}
