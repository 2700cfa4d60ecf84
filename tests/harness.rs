//! Drives the `mini-suite` fixture binary out-of-process, the way
//! `assert_cmd`'s own tests drive a real CLI: no unit-level shortcuts, just
//! exit codes and stdout substrings a user would actually see.

use assert_cmd::Command;
use predicates::prelude::*;

fn mini_suite() -> Command {
    Command::cargo_bin("mini-suite").expect("mini-suite binary should be built by cargo test")
}

#[test]
fn failing_check_reports_decomposed_value_and_exit_code_one() {
    mini_suite()
        .args(["-i", "math/sum_is_wrong"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("CHECK failed"))
        .stdout(predicate::str::contains("7"));
}

#[test]
fn passing_require_reports_exit_code_zero() {
    mini_suite()
        .args(["-i", "math/sum_is_right"])
        .assert()
        .code(0);
}

#[test]
fn generator_cross_product_runs_without_failures() {
    mini_suite()
        .args(["-i", "generators/cross_product"])
        .assert()
        .code(0);
}

#[test]
fn generate_override_pins_a_single_value() {
    mini_suite()
        .args(["-i", "generators/cross_product", "-g", "generators/cross_product//x{=10},y{=a}"])
        .assert()
        .code(0);
}

#[test]
fn expected_panic_is_caught_and_passes() {
    mini_suite()
        .args(["-i", "exceptions/expected_panic"])
        .assert()
        .code(0);
}

#[test]
fn missing_panic_is_reported_as_a_failure() {
    mini_suite()
        .args(["-i", "exceptions/missing_panic_is_reported"])
        .assert()
        .code(1);
}

#[test]
fn no_matching_tests_is_exit_code_two() {
    mini_suite()
        .args(["-i", "nothing/matches/this"])
        .assert()
        .code(2);
}

#[test]
fn malformed_generate_flag_is_exit_code_three() {
    mini_suite()
        .args(["--generate", "no-separator-here"])
        .assert()
        .code(3);
}

#[test]
fn help_generate_prints_grammar_and_exits_zero() {
    mini_suite()
        .arg("--help-generate")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("--generate"));
}
