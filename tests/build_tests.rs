//! Codegen handoff: scheduling, dependency waits, and completion.

mod common;

use common::{find_symbol, run_build};
use swgc::sema::symbol::SymbolState;

#[test]
fn build_completes_a_function() {
    let source = "func answer() -> s32 {\n    return 42\n}\n";
    let (compiler, exit) = run_build(&[("build.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());

    let sym = find_symbol(&compiler, "answer");
    assert_eq!(compiler.symbol(sym).state(), SymbolState::CodeGenCompleted);
}

#[test]
fn callee_is_scheduled_and_completed() {
    let source = "func add(a: s32, b: s32) -> s32 {\n    return a + b\n}\nfunc main() -> s32 {\n    return add(1, 2)\n}\n";
    let (compiler, exit) = run_build(&[("build.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());

    for name in ["add", "main"] {
        let sym = find_symbol(&compiler, name);
        assert_eq!(
            compiler.symbol(sym).state(),
            SymbolState::CodeGenCompleted,
            "{name} not completed"
        );
    }

    // The call edge was recorded.
    let main_sym = find_symbol(&compiler, "main");
    let deps = compiler.symbol(main_sym).call_dependencies();
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0], find_symbol(&compiler, "add"));
}

#[test]
fn mutual_recursion_completes() {
    // Completion only needs callees at pre-solved, so a call cycle settles.
    let source = "func even(n: s32) -> bool {\n    if n == 0 {\n        return true\n    }\n    return odd(n - 1)\n}\nfunc odd(n: s32) -> bool {\n    if n == 0 {\n        return false\n    }\n    return even(n - 1)\n}\n";
    let (compiler, exit) = run_build(&[("rec.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());

    for name in ["even", "odd"] {
        let sym = find_symbol(&compiler, name);
        assert_eq!(
            compiler.symbol(sym).state(),
            SymbolState::CodeGenCompleted,
            "{name} not completed"
        );
    }
}

#[test]
fn self_recursion_completes() {
    let source = "func fact(n: s32) -> s32 {\n    if n <= 1 {\n        return 1\n    }\n    return n * fact(n - 1)\n}\n";
    let (compiler, exit) = run_build(&[("fact.swg", source)]);
    assert_eq!(exit, 0, "{:?}", compiler.reporter().diagnostics());
    let sym = find_symbol(&compiler, "fact");
    assert_eq!(compiler.symbol(sym).state(), SymbolState::CodeGenCompleted);
}

#[test]
fn sema_command_does_not_schedule_codegen() {
    let source = "func f() -> s32 {\n    return 1\n}\n";
    let (compiler, exit) = common::run_sema(&[("nocg.swg", source)]);
    assert_eq!(exit, 0);
    let sym = find_symbol(&compiler, "f");
    assert_eq!(compiler.symbol(sym).state(), SymbolState::SemaCompleted);
}

#[test]
fn functions_with_errors_do_not_reach_codegen() {
    let source = "func bad() -> s32 {\n    return missing\n}\n";
    let (compiler, exit) = run_build(&[("bad.swg", source)]);
    assert_eq!(exit, 1);
    let sym = find_symbol(&compiler, "bad");
    assert!(compiler.symbol(sym).state() < SymbolState::CodeGenPreSolved);
}
