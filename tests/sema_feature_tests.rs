//! Declarations, functions, namespaces, user types and casts.

mod common;

use common::{constant_of, find_symbol, find_symbol_in, int_constant, namespace_of, run_sema};
use swgc::report::DiagnosticId;
use swgc::sema::constants::ConstantValue;
use swgc::sema::symbol::{SymbolKind, SymbolState};
use swgc::sema::types::Sign;

#[test]
fn function_declares_and_completes() {
    let source = "func add(a: s32, b: s32) -> s32 {\n    return a + b\n}\n";
    let (compiler, exit) = run_sema(&[("fn.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());

    let sym = find_symbol(&compiler, "add");
    let symbol = compiler.symbol(sym);
    assert_eq!(symbol.kind(), SymbolKind::Function);
    assert_eq!(symbol.state(), SymbolState::SemaCompleted);
    assert_eq!(symbol.abi_signature(), Some("fn(s32, s32) -> s32"));
}

#[test]
fn call_checks_arity() {
    let source = "func one(a: s32) -> s32 {\n    return a\n}\nfunc caller() -> s32 {\n    return one(1, 2)\n}\n";
    let (compiler, exit) = run_sema(&[("call.swg", source)]);
    assert_eq!(exit, 1);
    assert!(compiler
        .reporter()
        .has_diag(DiagnosticId::SemaErrArgumentCount));
}

#[test]
fn call_argument_overflow_is_checked() {
    let source = "func takes8(a: s8) -> s8 {\n    return a\n}\nfunc caller() -> s8 {\n    return takes8(300)\n}\n";
    let (compiler, exit) = run_sema(&[("call.swg", source)]);
    assert_eq!(exit, 1);
    assert!(compiler
        .reporter()
        .has_diag(DiagnosticId::SemaErrLiteralOverflow));
}

#[test]
fn calling_a_constant_is_not_callable() {
    let source = "const k = 1\nfunc f() -> s32 {\n    return k()\n}\n";
    let (compiler, exit) = run_sema(&[("call.swg", source)]);
    assert_eq!(exit, 1);
    assert!(compiler.reporter().has_diag(DiagnosticId::SemaErrNotCallable));
}

#[test]
fn namespace_members_resolve_within() {
    let source = "namespace math {\n    const A = 2\n    const B = A + 1\n}\n";
    let (compiler, exit) = run_sema(&[("ns.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());

    let ns = namespace_of(&compiler, "math");
    let b = find_symbol_in(&compiler, ns, "B");
    assert!(b.is_valid());
    let cst = compiler.symbol(b).cst_ref();
    assert!(cst.is_valid());
    match compiler.constants().get(cst) {
        ConstantValue::Int { v, .. } => assert_eq!(v, 3),
        other => panic!("unexpected constant {other:?}"),
    }
}

#[test]
fn namespaces_merge_across_files() {
    let (compiler, exit) = run_sema(&[
        ("a.swg", "namespace util {\n    const A = 1\n}\n"),
        ("b.swg", "namespace util {\n    const B = A + 1\n}\n"),
    ]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
    let ns = namespace_of(&compiler, "util");
    let b = find_symbol_in(&compiler, ns, "B");
    let cst = compiler.symbol(b).cst_ref();
    match compiler.constants().get(cst) {
        ConstantValue::Int { v, .. } => assert_eq!(v, 2),
        other => panic!("unexpected constant {other:?}"),
    }
}

#[test]
fn struct_builds_an_aggregate_type() {
    let source = "struct Point {\n    x: s32,\n    y: s32\n}\n#assert @sizeof(Point) == 8\n";
    let (compiler, exit) = run_sema(&[("struct.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
    let sym = find_symbol(&compiler, "Point");
    assert_eq!(compiler.symbol(sym).state(), SymbolState::SemaCompleted);
}

#[test]
fn enum_values_autoincrement() {
    let source = "enum Color {\n    Red,\n    Green,\n    Blue\n}\n#assert @countof(Color) == 3\n";
    let (compiler, exit) = run_sema(&[("enum.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());

    let sym = find_symbol(&compiler, "Color");
    let blue = find_symbol_in(&compiler, sym, "Blue");
    let cst = compiler.symbol(blue).cst_ref();
    match compiler.constants().get(cst) {
        ConstantValue::EnumValue { value, .. } => match compiler.constants().get(value) {
            ConstantValue::Int { v, .. } => assert_eq!(v, 2),
            other => panic!("unexpected inner constant {other:?}"),
        },
        other => panic!("unexpected constant {other:?}"),
    }
}

#[test]
fn alias_resolves_to_target() {
    let source = "alias Int = s32\nconst v: Int = 5\n";
    let (compiler, exit) = run_sema(&[("alias.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
    let (value, bits, sign) = int_constant(&compiler, "v");
    assert_eq!(value, 5);
    assert_eq!(bits, 32);
    assert_eq!(sign, Sign::Signed);
}

#[test]
fn explicit_casts_fold() {
    let source = "const a = cast(u8) 200\nconst b = cast(s64) 3\nconst c = cast(f64) 1\nconst d = cast(u8) 1000 // expected-error {{ overflow }}\n";
    let (compiler, exit) = run_sema(&[("cast.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
    assert_eq!(int_constant(&compiler, "a").0, 200);
    assert_eq!(int_constant(&compiler, "b").0, 3);
    match constant_of(&compiler, "c") {
        ConstantValue::Float { bits, repr } => {
            assert_eq!(bits, 64);
            assert_eq!(f64::from_bits(repr), 1.0);
        }
        other => panic!("unexpected constant {other:?}"),
    }
}

#[test]
fn float_to_int_explicit_cast_truncates() {
    let source = "const a = cast(s32) 3.9\n";
    let (compiler, exit) = run_sema(&[("cast.swg", source)]);
    assert_eq!(exit, 0);
    assert_eq!(int_constant(&compiler, "a").0, 3);
}

#[test]
fn sizeof_builtin_types() {
    let source = "#assert @sizeof(s32) == 4\n#assert @sizeof(u64) == 8\n#assert @sizeof(bool) == 1\n#assert @sizeof(f64) == 8\n";
    let (compiler, exit) = run_sema(&[("sizeof.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
}

#[test]
fn pointer_arithmetic_in_functions() {
    let source = "func advance(p: *s32, n: s64) -> *s32 {\n    return p + n\n}\nfunc distance(a: *s32, b: *s32) -> s64 {\n    return a - b\n}\n";
    let (compiler, exit) = run_sema(&[("ptr.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
}

#[test]
fn adding_two_pointers_is_rejected() {
    let source = "func bad(a: *s32, b: *s32) -> *s32 {\n    return a + b\n}\n";
    let (compiler, exit) = run_sema(&[("ptr.swg", source)]);
    assert_eq!(exit, 1);
    assert!(compiler
        .reporter()
        .has_diag(DiagnosticId::SemaErrBinaryOperandType));
}

#[test]
fn enum_bitwise_requires_flags_capability() {
    let source = "enum Plain {\n    A,\n    B\n}\nfunc f(x: Plain, y: Plain) -> s32 {\n    return cast(s32) (x | y)\n}\n";
    let (compiler, exit) = run_sema(&[("enum.swg", source)]);
    assert_eq!(exit, 1);
    assert!(compiler
        .reporter()
        .has_diag(DiagnosticId::SemaErrInvalidOpEnum));
}

#[test]
fn flags_enum_allows_bitwise() {
    let source = "enum Mode #flags : u32 {\n    Read = 1,\n    Write = 2\n}\nfunc f(x: Mode, y: Mode) -> u32 {\n    return cast(u32) (x | y)\n}\n";
    let (compiler, exit) = run_sema(&[("enum.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
}

#[test]
fn locals_and_control_flow_typecheck() {
    let source = "func clamp(n: s32) -> s32 {\n    var limit: s32 = 100\n    if n > limit {\n        return limit\n    }\n    while false {\n        break\n    }\n    return n\n}\n";
    let (compiler, exit) = run_sema(&[("stmt.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
}

#[test]
fn non_bool_condition_is_rejected() {
    let source = "func f(n: s32) -> s32 {\n    if n {\n        return 1\n    }\n    return 0\n}\n";
    let (compiler, exit) = run_sema(&[("stmt.swg", source)]);
    assert_eq!(exit, 1);
    assert!(compiler.reporter().has_diag(DiagnosticId::SemaErrInvalidType));
}

#[test]
fn access_modifier_global_is_applied() {
    let source = "#global public\nconst K = 1\n";
    let (compiler, exit) = run_sema(&[("acc.swg", source)]);
    assert_eq!(exit, 0);
    let sym = find_symbol(&compiler, "K");
    assert_eq!(
        compiler.symbol(sym).access(),
        swgc::sema::symbol::SymbolAccess::Public
    );
}
