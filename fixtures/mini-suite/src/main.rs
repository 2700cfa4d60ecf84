//! A small test suite exercised by `tests/harness.rs` out-of-process.
//!
//! Not part of the `taut` library itself — just a handful of tests chosen
//! to demonstrate `check!`/`require!` decomposition, `generate!` crossing,
//! `--generate` overrides and `check_throws!`, so the integration test has
//! something real to assert exit codes and stdout against.

fn sum(a: i32, b: i32) -> i32 {
    a + b
}

#[taut::test("math/sum_is_wrong")]
fn sum_is_wrong() {
    let (a, b) = (2, 3);
    taut::check!(sum(a, b) == $[7]);
}

#[taut::test("math/sum_is_right")]
fn sum_is_right() {
    let (a, b) = (2, 5);
    taut::require!(sum(a, b) == $[7]);
}

#[taut::test("generators/cross_product")]
fn cross_product() {
    let x = taut::generate!("x", vec![10, 20, 30]);
    let y = taut::generate!("y", vec!["a", "b"]);
    taut::log!("visiting x={x} y={y}");
    taut::check!($[x] > 0 && !y.is_empty());
}

#[taut::test("exceptions/expected_panic")]
fn expected_panic() {
    taut::require_throws!(panic!("boom"));
}

#[taut::test("exceptions/missing_panic_is_reported")]
fn missing_panic_is_reported() {
    taut::check_throws!(());
}

fn main() {
    std::process::exit(taut::cli::main().report());
}
