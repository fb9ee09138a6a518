//! Overflow and range diagnostics during folding and initialization.

mod common;

use common::{int_constant, run_sema};
use swgc::report::{DiagArg, DiagnosticId};

#[test]
fn literal_overflow_names_type_and_value() {
    let (compiler, exit) = run_sema(&[("ovf.swg", "const x: s8 = 200\n")]);
    assert_eq!(exit, 1);
    let diags = compiler.reporter().diagnostics();
    let diag = diags
        .iter()
        .find(|d| d.id == DiagnosticId::SemaErrLiteralOverflow)
        .expect("literal overflow reported");
    assert_eq!(diag.arg(DiagArg::Type), Some("s8"));
    assert_eq!(diag.arg(DiagArg::Value), Some("200"));
}

#[test]
fn in_range_initialization_adopts_the_declared_type() {
    let (compiler, exit) = run_sema(&[("ok.swg", "const x: s8 = 100\n")]);
    assert_eq!(exit, 0);
    let (value, bits, _) = int_constant(&compiler, "x");
    assert_eq!(value, 100);
    assert_eq!(bits, 8);
}

#[test]
fn signed_add_overflow_without_wrap_is_an_error() {
    let source = "const a: s8 = 100\nconst b = a + a\n";
    let (compiler, exit) = run_sema(&[("add.swg", source)]);
    assert_eq!(exit, 1);
    assert!(compiler
        .reporter()
        .has_diag(DiagnosticId::SemaErrIntegerOverflow));
}

#[test]
fn signed_add_overflow_with_wrap_succeeds() {
    let source = "const a: s8 = 100\nconst b = a +#wrap a\n";
    let (compiler, exit) = run_sema(&[("wrap.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
    // 100 + 100 wraps to -56 in 8 bits.
    let (value, _, _) = int_constant(&compiler, "b");
    assert_eq!(value as i8 as i64, -56);
}

#[test]
fn wrap_modifier_on_floats_is_rejected() {
    let (compiler, exit) = run_sema(&[("badmod.swg", "const x = 1.0 +#wrap 2.0\n")]);
    assert_eq!(exit, 1);
    assert!(compiler
        .reporter()
        .has_diag(DiagnosticId::SemaErrModifierOnlyInteger));
}

#[test]
fn wrap_modifier_is_rejected_on_division() {
    let (compiler, exit) = run_sema(&[("badmod.swg", "const x = 6 /#wrap 2\n")]);
    assert_eq!(exit, 1);
    assert!(compiler
        .reporter()
        .has_diag(DiagnosticId::SemaErrModifierUnsupported));
}

#[test]
fn negative_shift_is_reported() {
    let (compiler, exit) = run_sema(&[("shift.swg", "const x = 1 << -1\n")]);
    assert_eq!(exit, 1);
    assert!(compiler
        .reporter()
        .has_diag(DiagnosticId::SemaErrNegativeShift));
}

#[test]
fn oversized_right_shift_overflows() {
    let source = "const a: u64 = 1\nconst x = a >> 70\n";
    let (compiler, exit) = run_sema(&[("shift.swg", source)]);
    assert_eq!(exit, 1);
    assert!(compiler
        .reporter()
        .has_diag(DiagnosticId::SemaErrIntegerOverflow));
}

#[test]
fn unary_minus_overflow_detected() {
    // -(s64::MIN) does not fit.
    let source = "const a: s64 = -9223372036854775807\nconst b = a - 1\nconst c = -b\n";
    let (compiler, exit) = run_sema(&[("neg.swg", source)]);
    assert_eq!(exit, 1);
    assert!(compiler
        .reporter()
        .has_diag(DiagnosticId::SemaErrIntegerOverflow));
}
