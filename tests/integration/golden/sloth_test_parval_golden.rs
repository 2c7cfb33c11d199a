//! Values captured in snapshot `golden` (instance `golden`, session 1700000000).
#![allow(dead_code, non_snake_case, clippy::approx_constant)]

// ===== 1: double@tests.integration.golden.calc

pub fn val_double_1_x() -> i64 {
    5_i64
}

pub fn res_double_1_ret_0() -> i64 {
    10_i64
}

// ===== 2: scale@tests.integration.golden.calc

pub fn val_scale_2_x() -> f64 {
    1.5_f64
}

pub fn val_scale_2_factor() -> f64 {
    2.0_f64
}

pub fn res_scale_2_ret_0() -> f64 {
    3.0_f64
}

// ===== 3: absorb@tests.integration.golden.calc

pub fn val_absorb_3_entry() -> crate::integration::golden::calc::Entry {
    slothwatch::restore::<crate::integration::golden::calc::Entry>("eyJhbW91bnQiOjN9")
}

pub fn cls_absorb_3_Ledger() -> crate::integration::golden::calc::Ledger {
    slothwatch::restore::<crate::integration::golden::calc::Ledger>("eyJuIjoxMn0=")
}

pub fn res_absorb_3_ret_0() -> u32 {
    15_u32
}

// ===== 4: split@tests.integration.golden.calc

pub fn val_split_4_x() -> i64 {
    7_i64
}

pub fn res_split_4_ret_0() -> i64 {
    3_i64
}

pub fn res_split_4_ret_1() -> bool {
    false
}

// ===== 5: divide@tests.integration.golden.calc

pub fn val_divide_5_a() -> i32 {
    1_i32
}

pub fn val_divide_5_b() -> i32 {
    0_i32
}

pub fn res_divide_5_ret_0() -> slothwatch::replay::CapturedPanic {
    slothwatch::restore::<slothwatch::replay::CapturedPanic>("eyJtZXNzYWdlIjoiYXR0ZW1wdCB0byBkaXZpZGUgYnkgemVybyJ9")
}

// ===== 6: touch@tests.integration.golden.calc

