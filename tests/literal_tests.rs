//! Literal parsing and folding edge cases.

mod common;

use common::{constant_of, int_constant, run_sema, string_constant};
use swgc::report::DiagnosticId;
use swgc::sema::constants::ConstantValue;
use swgc::sema::types::Sign;

#[test]
fn hex_literal_at_u64_max_parses() {
    let (compiler, exit) = run_sema(&[("hex.swg", "const x = 0xFFFFFFFFFFFFFFFF\n")]);
    assert_eq!(exit, 0);
    // Unsigned unsized, concretized to u64.
    let (value, bits, sign) = int_constant(&compiler, "x");
    assert_eq!(value as u64, u64::MAX);
    assert_eq!(bits, 64);
    assert_eq!(sign, Sign::Unsigned);
}

#[test]
fn hex_literal_past_u64_max_is_too_big() {
    let (compiler, exit) = run_sema(&[("hex.swg", "const x = 0x10000000000000000\n")]);
    assert_eq!(exit, 1);
    assert!(compiler
        .reporter()
        .has_diag(DiagnosticId::SemaErrNumberTooBig));
}

#[test]
fn decimal_overflow_is_too_big() {
    let (compiler, exit) = run_sema(&[("dec.swg", "const x = 99999999999999999999999999\n")]);
    assert_eq!(exit, 1);
    assert!(compiler
        .reporter()
        .has_diag(DiagnosticId::SemaErrNumberTooBig));
}

#[test]
fn binary_literal_is_unsigned() {
    let (compiler, exit) = run_sema(&[("bin.swg", "const x = 0b1010_1010\n")]);
    assert_eq!(exit, 0);
    let (value, _, _) = int_constant(&compiler, "x");
    assert_eq!(value, 0xAA);
}

#[test]
fn separators_are_skipped() {
    let (compiler, exit) = run_sema(&[("sep.swg", "const x = 1_000_000\n")]);
    assert_eq!(exit, 0);
    assert_eq!(int_constant(&compiler, "x").0, 1_000_000);
}

#[test]
fn float_with_exponent() {
    let (compiler, exit) = run_sema(&[("float.swg", "const f: f64 = 1.5e2\n")]);
    assert_eq!(exit, 0);
    match constant_of(&compiler, "f") {
        ConstantValue::Float { bits, repr } => {
            assert_eq!(bits, 64);
            assert_eq!(f64::from_bits(repr), 150.0);
        }
        other => panic!("unexpected constant {other:?}"),
    }
}

#[test]
fn float_negative_exponent() {
    let (compiler, exit) = run_sema(&[("float.swg", "const f: f64 = 25e-1\n")]);
    assert_eq!(exit, 0);
    match constant_of(&compiler, "f") {
        ConstantValue::Float { repr, .. } => assert_eq!(f64::from_bits(repr), 2.5),
        other => panic!("unexpected constant {other:?}"),
    }
}

#[test]
fn plain_string_is_copied_verbatim() {
    let (compiler, exit) = run_sema(&[("str.swg", "const s = \"hello world\"\n")]);
    assert_eq!(exit, 0);
    assert_eq!(string_constant(&compiler, "s"), "hello world");
}

#[test]
fn escaped_string_decodes_sequences() {
    let source = r#"const s = "a\nb\tc\x41\u00E9""#;
    let (compiler, exit) = run_sema(&[("str.swg", &format!("{source}\n"))]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
    assert_eq!(string_constant(&compiler, "s"), "a\nb\tcA\u{E9}");
}

#[test]
fn raw_string_keeps_backslashes() {
    let source = "const s = r\"a\\nb\"\n";
    let (compiler, exit) = run_sema(&[("str.swg", source)]);
    assert_eq!(exit, 0);
    assert_eq!(string_constant(&compiler, "s"), "a\\nb");
}

#[test]
fn character_literals() {
    let source = "const a = 'x'\nconst b = '\\n'\nconst c = '\\x41'\nconst d = '\\u00E9'\n";
    let (compiler, exit) = run_sema(&[("chr.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
    assert_eq!(constant_of(&compiler, "a"), ConstantValue::Char('x'));
    assert_eq!(constant_of(&compiler, "b"), ConstantValue::Char('\n'));
    assert_eq!(constant_of(&compiler, "c"), ConstantValue::Char('A'));
    assert_eq!(constant_of(&compiler, "d"), ConstantValue::Char('\u{E9}'));
}

#[test]
fn bool_null_undefined() {
    let source = "const t = true\nconst f = false\nconst n = null\nconst u = undefined\n";
    let (compiler, exit) = run_sema(&[("misc.swg", source)]);
    assert_eq!(exit, 0);
    assert_eq!(constant_of(&compiler, "t"), ConstantValue::Bool(true));
    assert_eq!(constant_of(&compiler, "f"), ConstantValue::Bool(false));
    assert_eq!(constant_of(&compiler, "n"), ConstantValue::Null);
    assert_eq!(constant_of(&compiler, "u"), ConstantValue::Undefined);
}

#[test]
fn aggregate_literal_folds_to_constant() {
    let (compiler, exit) = run_sema(&[("agg.swg", "const p = { 1, 2, 3 }\n")]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
    match constant_of(&compiler, "p") {
        ConstantValue::Aggregate { members, .. } => assert_eq!(members.len(), 3),
        other => panic!("unexpected constant {other:?}"),
    }
}

#[test]
fn multiline_string() {
    let source = "const s = \"\"\"ab\ncd\"\"\"\n";
    let (compiler, exit) = run_sema(&[("ml.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
    assert_eq!(string_constant(&compiler, "s"), "ab\ncd");
}
