//! Code-generation handoff.
//!
//! Sema hands completed functions to `CodeGenJob`. The job waits for its
//! function and every direct callee to finish sema, schedules missing
//! callee jobs, lowers the body through the (external) generator core, and
//! completes once all callees are at least pre-solved, so mutually
//! recursive functions terminate.

use std::sync::Arc;

use crate::compiler::Compiler;
use crate::core::{AstNodeRef, FileRef, SymbolRef};
use crate::jobs::{Job, JobPriority, JobResult, TaskContext, WaitKind};
use crate::sema::symbol::SymbolState;

pub struct CodeGenJob {
    ctx: TaskContext,
    compiler: Arc<Compiler>,
    func: SymbolRef,
    root: AstNodeRef,
}

impl CodeGenJob {
    pub fn new(
        compiler: Arc<Compiler>,
        func: SymbolRef,
        root: AstNodeRef,
        file: FileRef,
    ) -> Self {
        Self {
            ctx: TaskContext {
                file,
                ..TaskContext::default()
            },
            compiler,
            func,
            root,
        }
    }

    fn wait_state(&mut self, kind: WaitKind, sym: SymbolRef) -> JobResult {
        let state = &mut self.ctx.state;
        state.kind = kind;
        state.symbol = sym;
        state.waiter_symbol = self.func;
        state.node = self.root;
        let symbol = self.compiler.symbol(self.func);
        state.src_view = symbol.src_view();
        state.tok = symbol.tok();
        JobResult::Sleep
    }

    fn exec(&mut self) -> JobResult {
        let compiler = self.compiler.clone();
        let symbol = compiler.symbol(self.func);
        if symbol.is_ignored() {
            return JobResult::Done;
        }
        let deps = symbol.call_dependencies();

        // Sema must be done for the function and each direct callee.
        if symbol.state() < SymbolState::SemaCompleted {
            return self.wait_state(WaitKind::SymCompleted, self.func);
        }
        for &dep in &deps {
            let dep_symbol = compiler.symbol(dep);
            if dep_symbol.is_ignored() {
                continue;
            }
            if dep_symbol.state() < SymbolState::SemaCompleted {
                return self.wait_state(WaitKind::SymCompleted, dep);
            }
        }

        // Schedule callees that nobody scheduled yet.
        for &dep in &deps {
            let dep_symbol = compiler.symbol(dep);
            if dep_symbol.is_ignored() || !dep_symbol.try_mark_codegen_scheduled() {
                continue;
            }
            let dep_root = dep_symbol.decl_node();
            if dep_root.is_invalid() {
                continue;
            }
            let job = CodeGenJob::new(compiler.clone(), dep, dep_root, self.ctx.file);
            compiler
                .jobs()
                .enqueue(Box::new(job), JobPriority::Normal, compiler.client());
        }

        // Lower the body, then bind the JIT entry.
        if symbol.state() < SymbolState::CodeGenPreSolved {
            lower_function(&compiler, self.func, self.root);
            compiler.transition(self.func, SymbolState::CodeGenPreSolved);
            ensure_jit_entry(&compiler, self.func);
        }

        // Completion needs every callee at least pre-solved.
        for &dep in &deps {
            let dep_symbol = compiler.symbol(dep);
            if dep_symbol.is_ignored() {
                continue;
            }
            if dep_symbol.state() < SymbolState::CodeGenPreSolved {
                return self.wait_state(WaitKind::CodeGenDep, dep);
            }
        }

        compiler.transition(self.func, SymbolState::CodeGenCompleted);
        JobResult::Done
    }
}

impl Job for CodeGenJob {
    fn run(&mut self) -> JobResult {
        self.ctx.state.reset();
        self.exec()
    }

    fn ctx(&self) -> &TaskContext {
        &self.ctx
    }

    fn ctx_mut(&mut self) -> &mut TaskContext {
        &mut self.ctx
    }

    fn kind_name(&self) -> &'static str {
        "codegen"
    }
}

/// Stand-in for the external generator core: walks the body and reports the
/// op count through the log.
fn lower_function(compiler: &Compiler, func: SymbolRef, root: AstNodeRef) {
    let mut count = 0usize;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        count += 1;
        for child in compiler.ast().children(node) {
            stack.push(child);
        }
    }
    log::debug!(
        "codegen lowered {} ({} nodes)",
        compiler.identifiers().name(compiler.symbol(func).name()),
        count
    );
}

/// Stand-in for JIT entry binding.
fn ensure_jit_entry(compiler: &Compiler, func: SymbolRef) {
    log::trace!(
        "jit entry bound for {}",
        compiler.identifiers().name(compiler.symbol(func).name())
    );
}
