//! The in-source verification harness: expected diagnostics are consumed,
//! unraised expectations fail the build.

mod common;

use common::run_sema;
use swgc::report::DiagnosticId;

#[test]
fn expected_error_is_consumed() {
    let source = "const x: s8 = 200 // expected-error {{ overflow }}\n";
    let (compiler, exit) = run_sema(&[("exp.swg", source)]);
    // The diagnostic was raised and matched: the compile is clean.
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
    assert_eq!(compiler.reporter().error_count(), 0);
}

#[test]
fn expected_error_matches_by_id_name() {
    let source = "const x = 1 / 0 // expected-error {{ sema_err_division_zero }}\n";
    let (_compiler, exit) = run_sema(&[("exp.swg", source)]);
    assert_eq!(exit, 0);
}

#[test]
fn unraised_expectation_fails() {
    let source = "const x = 1 // expected-error {{ overflow }}\n";
    let (compiler, exit) = run_sema(&[("exp.swg", source)]);
    assert_eq!(exit, 1);
    assert!(compiler
        .reporter()
        .has_diag(DiagnosticId::UnittestErrNotRaised));
}

#[test]
fn unexpected_error_still_fails() {
    let source = "const x: s8 = 200\n";
    let (compiler, exit) = run_sema(&[("exp.swg", source)]);
    assert_eq!(exit, 1);
    assert!(compiler
        .reporter()
        .has_diag(DiagnosticId::SemaErrLiteralOverflow));
}

#[test]
fn expected_warning_is_consumed() {
    let source = "#warning \"careful\" // expected-warning {{ careful }}\n";
    let (compiler, exit) = run_sema(&[("warn.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
    assert_eq!(compiler.reporter().warning_count(), 0);
}

#[test]
fn relative_location_constraint() {
    // The error is on the next line relative to the directive.
    let source = "// expected-error@+1 {{ overflow }}\nconst x: s8 = 200\n";
    let (_compiler, exit) = run_sema(&[("loc.swg", source)]);
    assert_eq!(exit, 0);
}

#[test]
fn anywhere_location_constraint() {
    let source = "// expected-error@* {{ division }}\nconst a = 1\nconst x = 1 / 0\n";
    let (_compiler, exit) = run_sema(&[("loc.swg", source)]);
    assert_eq!(exit, 0);
}

#[test]
fn wrong_location_does_not_match() {
    // Directive constrained to a line without the error.
    let source = "// expected-error@+5 {{ overflow }}\nconst x: s8 = 200\n";
    let (compiler, exit) = run_sema(&[("loc.swg", source)]);
    assert_eq!(exit, 1);
    // The real error surfaces and the expectation is unraised.
    assert!(compiler
        .reporter()
        .has_diag(DiagnosticId::SemaErrLiteralOverflow));
    assert!(compiler
        .reporter()
        .has_diag(DiagnosticId::UnittestErrNotRaised));
}

#[test]
fn lex_only_option_stops_the_pipeline() {
    // Undefined symbols after lexing never surface because sema never runs.
    let source = "// swc-option lex-only\nconst x = missing_symbol\n";
    let (compiler, exit) = run_sema(&[("lexonly.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
    assert_eq!(compiler.reporter().error_count(), 0);
}

#[test]
fn expected_lexer_error_is_consumed() {
    // No trailing newline: the string literal runs into end of file.
    let source = "// expected-error@+1 {{ unclosed }}\nconst s = \"abc";
    let (_compiler, exit) = run_sema(&[("lex.swg", source)]);
    assert_eq!(exit, 0);
}

#[test]
fn syntax_command_checks_directives() {
    let source = "const = 1 // expected-error {{ expected }}\n";
    let (compiler, exit) = swgc::compiler::compile_sources(
        common::options(swgc::compiler::Command::Syntax),
        &[("syn.swg", source)],
    );
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
}

#[test]
fn compiler_error_directive_fires() {
    let source = "#error \"boom\" // expected-error {{ boom }}\n";
    let (_compiler, exit) = run_sema(&[("err.swg", source)]);
    assert_eq!(exit, 0);
}

#[test]
fn compiler_assert_failure_fires() {
    let source = "#assert 1 == 2 // expected-error {{ assert }}\n";
    let (_compiler, exit) = run_sema(&[("assert.swg", source)]);
    assert_eq!(exit, 0);
}

#[test]
fn compiler_assert_success_is_silent() {
    let source = "#assert 1 + 1 == 2\n";
    let (compiler, exit) = run_sema(&[("assert.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
}
