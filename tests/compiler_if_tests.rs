//! Compile-time branching: the losing branch's declarations are withdrawn
//! and later references resolve against the winner.

mod common;

use common::{int_constant, run_sema};
use swgc::report::DiagnosticId;

#[test]
fn losing_branch_symbols_are_withdrawn() {
    let source = "#if false {\n    const Z = 1\n} #else {\n    const Z = 2\n}\nconst USE = Z\n";
    let (compiler, exit) = run_sema(&[("cif.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());

    // The surviving Z carries the else-branch value, and references see it.
    assert_eq!(int_constant(&compiler, "Z").0, 2);
    assert_eq!(int_constant(&compiler, "USE").0, 2);
}

#[test]
fn taken_branch_wins() {
    let source = "#if true {\n    const Z = 1\n} #else {\n    const Z = 2\n}\nconst USE = Z\n";
    let (compiler, exit) = run_sema(&[("cif.swg", source)]);
    assert_eq!(exit, 0);
    assert_eq!(int_constant(&compiler, "USE").0, 1);
}

#[test]
fn condition_can_depend_on_constants() {
    let source = "const FLAG = 1 < 2\n#if FLAG {\n    const V = 10\n} #else {\n    const V = 20\n}\n";
    let (compiler, exit) = run_sema(&[("cif.swg", source)]);
    assert_eq!(exit, 0);
    assert_eq!(int_constant(&compiler, "V").0, 10);
}

#[test]
fn non_bool_condition_is_an_error() {
    let (compiler, exit) = run_sema(&[("cif.swg", "#if 1 {\n    const V = 10\n}\n")]);
    assert_eq!(exit, 1);
    assert!(compiler.reporter().has_diag(DiagnosticId::SemaErrInvalidType));
}

#[test]
fn chained_else_if() {
    let source = "#if false {\n    const V = 1\n} #else #if true {\n    const V = 2\n} #else {\n    const V = 3\n}\n";
    let (compiler, exit) = run_sema(&[("cif.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
    assert_eq!(int_constant(&compiler, "V").0, 2);
}

#[test]
fn defined_query_true_when_symbol_exists() {
    let source = "const K = 1\nconst HAS = #defined(K)\nconst MISSING = #defined(nope)\n";
    let (compiler, exit) = run_sema(&[("defined.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
    assert!(common::constant_of(&compiler, "HAS").get_bool());
    assert!(!common::constant_of(&compiler, "MISSING").get_bool());
}

#[test]
fn defined_gates_compiler_if() {
    let source = "#if #defined(nothing) {\n    const V = 1\n} #else {\n    const V = 2\n}\n";
    let (compiler, exit) = run_sema(&[("defined.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
    assert_eq!(int_constant(&compiler, "V").0, 2);
}
