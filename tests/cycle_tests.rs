//! Deadlock resolution: cyclic constant dependencies are detected, reported
//! once, and withdrawn so nothing stays parked.

mod common;

use common::{find_symbol, run_sema};
use swgc::report::DiagnosticId;

#[test]
fn two_constant_cycle_reports_once_and_ignores_both() {
    let (compiler, exit) = run_sema(&[("cycle.swg", "const A = B + 1\nconst B = A + 1\n")]);
    assert_eq!(exit, 1);

    // Exactly one grouped cycle diagnostic.
    assert_eq!(
        compiler
            .reporter()
            .count_diag(DiagnosticId::SemaErrCyclicDependency),
        1
    );

    // Both participants withdrawn.
    let a = find_symbol(&compiler, "A");
    let b = find_symbol(&compiler, "B");
    assert!(compiler.symbol(a).is_ignored());
    assert!(compiler.symbol(b).is_ignored());

    // No cascade errors about A or B.
    assert_eq!(
        compiler
            .reporter()
            .count_diag(DiagnosticId::SemaErrSymNotTyped),
        0
    );
    assert_eq!(
        compiler
            .reporter()
            .count_diag(DiagnosticId::SemaErrUnknownSymbol),
        0
    );
}

#[test]
fn self_cycle_is_detected() {
    let (compiler, exit) = run_sema(&[("selfcycle.swg", "const S = S + 1\n")]);
    assert_eq!(exit, 1);
    assert_eq!(
        compiler
            .reporter()
            .count_diag(DiagnosticId::SemaErrCyclicDependency),
        1
    );
    assert!(compiler.symbol(find_symbol(&compiler, "S")).is_ignored());
}

#[test]
fn cycle_across_files() {
    let (compiler, exit) = run_sema(&[
        ("a.swg", "const A = B + 1\n"),
        ("b.swg", "const B = A + 1\n"),
    ]);
    assert_eq!(exit, 1);
    assert_eq!(
        compiler
            .reporter()
            .count_diag(DiagnosticId::SemaErrCyclicDependency),
        1
    );
}

#[test]
fn dependents_of_cycle_members_are_dismissed_silently() {
    let source = "const A = B + 1\nconst B = A + 1\nconst C = A + 1\n";
    let (compiler, exit) = run_sema(&[("cycle.swg", source)]);
    assert_eq!(exit, 1);
    // The only error is the cycle itself; C resolves silently against the
    // withdrawn A.
    assert_eq!(compiler.reporter().error_count(), 1);
}

#[test]
fn healthy_sibling_constants_still_complete() {
    let source = "const A = B + 1\nconst B = A + 1\nconst OK = 5\n";
    let (compiler, exit) = run_sema(&[("cycle.swg", source)]);
    assert_eq!(exit, 1);
    assert_eq!(common::int_constant(&compiler, "OK").0, 5);
}
