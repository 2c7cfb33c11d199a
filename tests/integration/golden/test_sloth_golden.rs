//! Regression tests reconstructed from snapshot `golden` by slothwatch.
#![allow(unused_mut, non_snake_case, clippy::let_unit_value)]

#[path = "sloth_test_parval_golden.rs"]
mod sl;

#[test]
fn test_double_1() {
    use crate::integration::golden::calc::double;

    let run_result = slothwatch::replay::run(|| double(sl::val_double_1_x()));

    let run_result = run_result.expect_returned();
    let test_result = sl::res_double_1_ret_0();
    // no comparator configured for `i64`; comparing with PartialEq
    assert_eq!(run_result, test_result);
}

#[test]
fn test_scale_2() {
    use crate::integration::golden::calc::scale;

    let run_result = slothwatch::replay::run(|| scale(sl::val_scale_2_x(), sl::val_scale_2_factor()));

    let run_result = run_result.expect_returned();
    let test_result = sl::res_scale_2_ret_0();
    assert!(crate::integration::golden::calc::close_enough(&run_result, &test_result));
}

#[test]
fn test_absorb_3() {
    let run_result = slothwatch::replay::run(|| {
        let mut receiver = sl::cls_absorb_3_Ledger();
        receiver.absorb(&sl::val_absorb_3_entry())
    });

    let run_result = run_result.expect_returned();
    let test_result = sl::res_absorb_3_ret_0();
    assert_eq!(run_result, test_result);
}

#[test]
fn test_split_4() {
    use crate::integration::golden::calc::split;

    let run_result = slothwatch::replay::run(|| split(sl::val_split_4_x()));

    let run_result = run_result.expect_returned();
    let test_result = (sl::res_split_4_ret_0(), sl::res_split_4_ret_1());
    // no comparator configured for `i64`; comparing with PartialEq
    assert_eq!(run_result.0, test_result.0);
    // no comparator configured for `bool`; comparing with PartialEq
    assert_eq!(run_result.1, test_result.1);
}

#[test]
fn test_divide_5() {
    use crate::integration::golden::calc::divide;

    let run_result = slothwatch::replay::run(|| divide(sl::val_divide_5_a(), sl::val_divide_5_b()));

    let run_result = run_result.expect_panicked();
    let test_result = sl::res_divide_5_ret_0();
    // no comparator configured for `slothwatch::replay::CapturedPanic`; comparing with PartialEq
    assert_eq!(run_result, test_result);
}

#[test]
fn test_touch_6() {
    use crate::integration::golden::calc::touch;

    let run_result = slothwatch::replay::run(|| touch());

    let () = run_result.expect_returned();
}

