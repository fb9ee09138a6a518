//! Constant folding through the full pipeline.

mod common;

use common::{int_constant, run_sema, string_constant};
use swgc::report::DiagnosticId;
use swgc::sema::types::Sign;

#[test]
fn folds_integer_arithmetic_with_precedence() {
    let (compiler, exit) = run_sema(&[("fold.swg", "const x = 1 + 2 * 3\n")]);
    assert_eq!(exit, 0);
    assert_eq!(compiler.reporter().error_count(), 0);

    // Concretization picks signed 32-bit.
    let (value, bits, sign) = int_constant(&compiler, "x");
    assert_eq!(value, 7);
    assert_eq!(bits, 32);
    assert_eq!(sign, Sign::Signed);
}

#[test]
fn folds_through_parens_and_unary() {
    let (compiler, exit) = run_sema(&[("fold.swg", "const x = -(1 + 2) * 3\n")]);
    assert_eq!(exit, 0);
    let (value, _, _) = int_constant(&compiler, "x");
    assert_eq!(value, -9);
}

#[test]
fn folds_bitwise_and_shifts() {
    let source = "const a = 0xF0 | 0x0F\nconst b = 1 << 10\nconst c = 0xFF & 0x0F\nconst d = 256 >> 4\n";
    let (compiler, exit) = run_sema(&[("bits.swg", source)]);
    assert_eq!(exit, 0);
    assert_eq!(int_constant(&compiler, "a").0, 0xFF);
    assert_eq!(int_constant(&compiler, "b").0, 1024);
    assert_eq!(int_constant(&compiler, "c").0, 0x0F);
    assert_eq!(int_constant(&compiler, "d").0, 16);
}

#[test]
fn folds_float_arithmetic() {
    let (compiler, exit) = run_sema(&[("floats.swg", "const f = 1.5 + 2.5\n")]);
    assert_eq!(exit, 0);
    match common::constant_of(&compiler, "f") {
        swgc::sema::constants::ConstantValue::Float { bits, repr } => {
            // Unsized floats concretize to f32.
            assert_eq!(bits, 32);
            assert_eq!(f64::from_bits(repr), 4.0);
        }
        other => panic!("unexpected constant {other:?}"),
    }
}

#[test]
fn folds_string_concatenation() {
    let (compiler, exit) = run_sema(&[("concat.swg", "const s = \"ab\" ++ \"cd\"\nconst n = 1 ++ 2\n")]);
    assert_eq!(exit, 0);
    assert_eq!(string_constant(&compiler, "s"), "abcd");
    assert_eq!(string_constant(&compiler, "n"), "12");
}

#[test]
fn folds_relational_and_logical() {
    let source = "const a = 1 < 2\nconst b = true and not false\nconst c = 3 == 4 or 5 >= 5\n";
    let (compiler, exit) = run_sema(&[("rel.swg", source)]);
    assert_eq!(exit, 0);
    assert!(common::constant_of(&compiler, "a").get_bool());
    assert!(common::constant_of(&compiler, "b").get_bool());
    assert!(common::constant_of(&compiler, "c").get_bool());
}

#[test]
fn chained_constants_fold_in_order() {
    let source = "const a = 2\nconst b = a * a\nconst c = b + a\n";
    let (compiler, exit) = run_sema(&[("chain.swg", source)]);
    assert_eq!(exit, 0);
    assert_eq!(int_constant(&compiler, "b").0, 4);
    assert_eq!(int_constant(&compiler, "c").0, 6);
}

#[test]
fn division_by_zero_is_reported() {
    let (compiler, exit) = run_sema(&[("div.swg", "const x = 1 / 0\n")]);
    assert_eq!(exit, 1);
    assert!(compiler
        .reporter()
        .has_diag(DiagnosticId::SemaErrDivisionZero));
}

#[test]
fn float_division_by_zero_is_reported() {
    let (compiler, exit) = run_sema(&[("div.swg", "const x = 1.0 / 0.0\n")]);
    assert_eq!(exit, 1);
    assert!(compiler
        .reporter()
        .has_diag(DiagnosticId::SemaErrDivisionZero));
}

#[test]
fn modulo_by_zero_is_reported() {
    let (compiler, exit) = run_sema(&[("mod.swg", "const x = 10 % 0\n")]);
    assert_eq!(exit, 1);
    assert!(compiler
        .reporter()
        .has_diag(DiagnosticId::SemaErrDivisionZero));
}
