//! Shared helpers for the end-to-end tests.
#![allow(dead_code)]

use std::sync::Arc;

use swgc::compiler::{compile_sources, Command, CompileOptions, Compiler};
use swgc::core::SymbolRef;
use swgc::sema::constants::ConstantValue;
use swgc::sema::symbol::SymbolKind;
use swgc::sema::types::Sign;

pub fn options(command: Command) -> CompileOptions {
    CompileOptions {
        command,
        threads: 4,
        verify: true,
    }
}

pub fn run_sema(sources: &[(&str, &str)]) -> (Arc<Compiler>, i32) {
    compile_sources(options(Command::Sema), sources)
}

#[allow(dead_code)]
pub fn run_build(sources: &[(&str, &str)]) -> (Arc<Compiler>, i32) {
    compile_sources(options(Command::Build), sources)
}

/// First live symbol with the given name in the module namespace.
pub fn find_symbol(compiler: &Compiler, name: &str) -> SymbolRef {
    let ns = compiler.files()[0].module_ns();
    find_symbol_in(compiler, ns, name)
}

pub fn find_symbol_in(compiler: &Compiler, owner: SymbolRef, name: &str) -> SymbolRef {
    let id = compiler.identifiers().intern(name);
    let map = compiler
        .symbol(owner)
        .sym_map()
        .expect("owner symbol has a map");
    let candidates = map.read().get(id);
    for sym in &candidates {
        if !compiler.symbol(*sym).is_ignored() {
            return *sym;
        }
    }
    candidates.first().copied().unwrap_or(SymbolRef::INVALID)
}

#[allow(dead_code)]
pub fn namespace_of(compiler: &Compiler, name: &str) -> SymbolRef {
    let sym = find_symbol(compiler, name);
    assert!(sym.is_valid(), "namespace {name} not found");
    assert_eq!(compiler.symbol(sym).kind(), SymbolKind::Namespace);
    sym
}

/// Folded constant of a module-level const.
pub fn constant_of(compiler: &Compiler, name: &str) -> ConstantValue {
    let sym = find_symbol(compiler, name);
    assert!(sym.is_valid(), "symbol {name} not found");
    let cst = compiler.symbol(sym).cst_ref();
    assert!(cst.is_valid(), "symbol {name} has no constant");
    compiler.constants().get(cst)
}

#[allow(dead_code)]
pub fn int_constant(compiler: &Compiler, name: &str) -> (i64, u8, Sign) {
    match constant_of(compiler, name) {
        ConstantValue::Int { bits, sign, v } => (v as i64, bits, sign),
        other => panic!("{name} is not an integer constant: {other:?}"),
    }
}

#[allow(dead_code)]
pub fn string_constant(compiler: &Compiler, name: &str) -> String {
    match constant_of(compiler, name) {
        ConstantValue::Str(s) => s.to_string(),
        other => panic!("{name} is not a string constant: {other:?}"),
    }
}
