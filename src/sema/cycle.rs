//! Deadlock resolution over the waits-for graph.
//!
//! After the driver reaches a quiescent point, parked jobs are walked: each
//! contributes a (waiter symbol -> awaited symbol) edge. Strongly connected
//! components are cycles; every participant is withdrawn and one grouped
//! diagnostic names the cycle. Remaining parked waiters become concrete
//! unresolved errors.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;

use crate::compiler::Compiler;
use crate::core::SymbolRef;
use crate::jobs::{TaskState, WaitKind};
use crate::report::diagnostic::{DiagArg, Diagnostic, DiagnosticId};

pub fn check(compiler: &Compiler) {
    let waiting = compiler.jobs().waiting_states(compiler.client());

    let mut graph: DiGraph<SymbolRef, ()> = DiGraph::new();
    let mut nodes: FxHashMap<SymbolRef, NodeIndex> = FxHashMap::default();
    // First wait location per waiter symbol, for reporting.
    let mut locs: FxHashMap<SymbolRef, TaskState> = FxHashMap::default();

    let mut node_of = |graph: &mut DiGraph<SymbolRef, ()>, sym: SymbolRef| -> NodeIndex {
        *nodes.entry(sym).or_insert_with(|| graph.add_node(sym))
    };

    for (_, state) in &waiting {
        if state.waiter_symbol.is_valid() && state.symbol.is_valid() {
            let from = node_of(&mut graph, state.waiter_symbol);
            let to = node_of(&mut graph, state.symbol);
            graph.add_edge(from, to, ());
            locs.entry(state.waiter_symbol).or_insert_with(|| state.clone());
        }
    }

    for component in tarjan_scc(&graph) {
        let is_cycle = component.len() > 1
            || (component.len() == 1 && graph.contains_edge(component[0], component[0]));
        if !is_cycle {
            continue;
        }
        let cycle: Vec<SymbolRef> = component.iter().map(|n| graph[*n]).collect();
        report_cycle(compiler, &cycle, &locs);
    }

    // Whatever still waits and is not a cycle victim becomes an unresolved
    // error with a concrete message.
    for (_, state) in &waiting {
        if state.symbol.is_valid() && compiler.symbol(state.symbol).is_ignored() {
            // Dismissed silently; the waiter resolves on the final wake.
            continue;
        }
        report_unresolved(compiler, state);
    }
}

fn symbol_display_name(compiler: &Compiler, sym: SymbolRef) -> String {
    compiler.identifiers().name(compiler.symbol(sym).name())
}

fn report_cycle(
    compiler: &Compiler,
    cycle: &[SymbolRef],
    locs: &FxHashMap<SymbolRef, TaskState>,
) {
    // Withdraw every participant first so their waiters resolve silently.
    for &sym in cycle {
        compiler.set_ignored(sym);
    }

    let first = cycle[0];
    let Some(state) = locs.get(&first) else {
        return;
    };

    let file = if state.src_view.is_valid() {
        compiler.view(state.src_view).file_ref()
    } else {
        crate::core::FileRef::INVALID
    };
    let mut diag = Diagnostic::new(DiagnosticId::SemaErrCyclicDependency, file);
    diag.add_argument(DiagArg::Value, symbol_display_name(compiler, first));
    if state.src_view.is_valid() && state.tok.is_valid() {
        diag.add_span(compiler.token_location(state.src_view, state.tok));
    }

    // One note per link inside the cycle.
    for &sym in cycle {
        let Some(link_state) = locs.get(&sym) else {
            continue;
        };
        if link_state.symbol.is_valid() && cycle.contains(&link_state.symbol) {
            let note = diag.add_note(DiagnosticId::SemaNoteCyclicDependencyLink);
            note.args.push((
                DiagArg::Value,
                symbol_display_name(compiler, link_state.symbol),
            ));
            if link_state.src_view.is_valid() && link_state.tok.is_valid() {
                note.spans
                    .push(compiler.token_location(link_state.src_view, link_state.tok));
            }
        }
    }

    compiler.report(diag);
}

fn report_unresolved(compiler: &Compiler, state: &TaskState) {
    let (id, arg) = match state.kind {
        WaitKind::Identifier => (
            DiagnosticId::SemaErrUnknownSymbol,
            compiler.identifiers().name(state.id),
        ),
        WaitKind::SymDeclared => (
            DiagnosticId::SemaErrSymNotDeclared,
            symbol_display_name(compiler, state.symbol),
        ),
        WaitKind::SymTyped => (
            DiagnosticId::SemaErrSymNotTyped,
            symbol_display_name(compiler, state.symbol),
        ),
        WaitKind::SymCompleted | WaitKind::TypeCompleted | WaitKind::CodeGenDep => (
            DiagnosticId::SemaErrSymNotCompleted,
            symbol_display_name(compiler, state.symbol),
        ),
        // Resolved by the driver before cycle detection runs.
        WaitKind::CompilerDefined | WaitKind::ImplRegistrations | WaitKind::None => return,
    };

    let file = if state.src_view.is_valid() {
        compiler.view(state.src_view).file_ref()
    } else {
        crate::core::FileRef::INVALID
    };
    let mut diag = Diagnostic::new(id, file);
    diag.add_argument(DiagArg::Sym, arg);
    if state.src_view.is_valid() && state.tok.is_valid() {
        diag.add_span(compiler.token_location(state.src_view, state.tok));
    }
    compiler.report(diag);
}
