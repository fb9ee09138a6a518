//! Cross-file symbol resolution: dependent constants wake after the
//! defining file completes, regardless of scheduling order.

mod common;

use common::{int_constant, run_sema};
use swgc::report::DiagnosticId;

#[test]
fn const_waits_for_other_file() {
    let (compiler, exit) = run_sema(&[
        ("a.swg", "const K = 41\n"),
        ("b.swg", "const L = K + 1\n"),
    ]);
    assert_eq!(exit, 0);
    assert_eq!(compiler.reporter().error_count(), 0);
    assert_eq!(int_constant(&compiler, "K").0, 41);
    assert_eq!(int_constant(&compiler, "L").0, 42);
}

#[test]
fn wait_order_is_independent_of_file_order() {
    // Same program, defining file last.
    let (compiler, exit) = run_sema(&[
        ("b.swg", "const L = K + 1\n"),
        ("a.swg", "const K = 41\n"),
    ]);
    assert_eq!(exit, 0);
    assert_eq!(int_constant(&compiler, "L").0, 42);
}

#[test]
fn chains_across_three_files() {
    let (compiler, exit) = run_sema(&[
        ("c.swg", "const C = B * 2\n"),
        ("b.swg", "const B = A + 1\n"),
        ("a.swg", "const A = 10\n"),
    ]);
    assert_eq!(exit, 0);
    assert_eq!(int_constant(&compiler, "C").0, 22);
}

#[test]
fn unknown_symbol_is_reported_at_fixed_point() {
    let (compiler, exit) = run_sema(&[("a.swg", "const X = missing + 1\n")]);
    assert_eq!(exit, 1);
    assert!(compiler
        .reporter()
        .has_diag(DiagnosticId::SemaErrUnknownSymbol));
}

#[test]
fn duplicate_across_files_is_reported() {
    let (compiler, exit) = run_sema(&[
        ("a.swg", "const X = 1\n"),
        ("b.swg", "const X = 2\n"),
    ]);
    assert_eq!(exit, 1);
    assert!(compiler
        .reporter()
        .has_diag(DiagnosticId::SemaErrAlreadyDefined));
}

#[test]
fn many_files_resolve_concurrently() {
    // A diamond of dependencies over eight files.
    let sources: Vec<(String, String)> = (0..8)
        .map(|i| {
            let name = format!("f{i}.swg");
            let text = if i == 0 {
                "const V0 = 1\n".to_string()
            } else {
                format!("const V{} = V{} + 1\n", i, i - 1)
            };
            (name, text)
        })
        .collect();
    let borrowed: Vec<(&str, &str)> = sources
        .iter()
        .map(|(n, t)| (n.as_str(), t.as_str()))
        .collect();
    let (compiler, exit) = run_sema(&borrowed);
    assert_eq!(exit, 0);
    assert_eq!(int_constant(&compiler, "V7").0, 8);
}
