//! Sema core: the re-entrant driver for the declaration and use passes.
//!
//! A `Sema` owns its traversal cursor, scope chain, frame stack and
//! deferred-pop ledger. It runs inside a `SemaJob`; any hook may suspend by
//! recording a wait key in the job's `TaskContext` and returning `Pause`.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::ast::{AstVisit, AstVisitor, Flow, NodeSemaFlags, VisitStatus};
use crate::compiler::Compiler;
use crate::core::{
    AstNodeRef, ConstantRef, FileRef, IdentifierRef, SourceViewRef, SymbolRef, TokenRef, TypeRef,
};
use crate::jobs::{Job, JobResult, TaskContext, WaitKind};
use crate::lexer::SourceFile;
use crate::report::diagnostic::DiagnosticId;
use crate::sema::frame::{DeferredPops, PopKind, PopTicket, SemaFrame};
use crate::sema::scope::{ScopeFlags, SemaScope};
use crate::sema::symbol::{Symbol, SymbolKind, SymbolState};
use crate::sema::{decl_pass, error, expr_pass};

/// Annotation view of a node with substitutes resolved and the type derived
/// from the constant when one is set.
#[derive(Copy, Clone, Debug)]
pub struct NodeView {
    pub node: AstNodeRef,
    pub cst: ConstantRef,
    pub type_ref: TypeRef,
    pub sym: SymbolRef,
    pub flags: NodeSemaFlags,
}

impl NodeView {
    pub fn is_value(&self) -> bool {
        self.flags.contains(NodeSemaFlags::VALUE_EXPR) || self.cst.is_valid()
    }
}

pub struct Sema {
    compiler: Arc<Compiler>,
    root: AstNodeRef,
    decl_pass: bool,
    visit: AstVisit,
    scopes: Vec<SemaScope>,
    frames: Vec<SemaFrame>,
    pops: DeferredPops,
    src_view: SourceViewRef,
    file: FileRef,
    /// Duplicate-report suppression: the token this job last reported at.
    last_reported: (SourceViewRef, TokenRef),
    /// Top-level children already handed to ad-hoc jobs.
    spawned: rustc_hash::FxHashSet<AstNodeRef>,
}

impl Sema {
    pub fn for_file(compiler: Arc<Compiler>, file: &SourceFile, decl_pass: bool) -> Self {
        let root = file.root();
        let src_view = file.src_view().unwrap_or(SourceViewRef::INVALID);
        let ns = file.module_ns();
        let map = compiler
            .symbol(ns)
            .sym_map()
            .expect("module namespace owns a map");
        let mut visit = AstVisit::default();
        visit.start(root);
        Self {
            compiler,
            root,
            decl_pass,
            visit,
            scopes: vec![SemaScope::new(ScopeFlags::TOP_LEVEL, map, ns)],
            frames: vec![SemaFrame::default()],
            pops: DeferredPops::default(),
            src_view,
            file: file.file_ref(),
            last_reported: (SourceViewRef::INVALID, TokenRef::INVALID),
            spawned: Default::default(),
        }
    }

    /// Child sema over one top-level subtree, inheriting the parent's scope
    /// chain and current frame.
    pub fn for_subtree(parent: &Sema, root: AstNodeRef) -> Self {
        let mut visit = AstVisit::default();
        visit.start(root);
        Self {
            compiler: parent.compiler.clone(),
            root,
            decl_pass: parent.decl_pass,
            visit,
            scopes: parent.scopes.clone(),
            frames: vec![parent.frame().clone()],
            pops: DeferredPops::default(),
            src_view: parent.src_view,
            file: parent.file,
            last_reported: (SourceViewRef::INVALID, TokenRef::INVALID),
            spawned: Default::default(),
        }
    }

    // ----- accessors -----

    pub fn compiler(&self) -> &Arc<Compiler> {
        &self.compiler
    }

    pub fn is_decl_pass(&self) -> bool {
        self.decl_pass
    }

    pub fn root(&self) -> AstNodeRef {
        self.root
    }

    pub fn file(&self) -> FileRef {
        self.file
    }

    pub fn src_view_ref(&self) -> SourceViewRef {
        self.src_view
    }

    pub fn frame(&self) -> &SemaFrame {
        self.frames.last().expect("frame stack is never empty")
    }

    pub fn frame_mut(&mut self) -> &mut SemaFrame {
        self.frames.last_mut().expect("frame stack is never empty")
    }

    pub fn cur_scope(&self) -> &SemaScope {
        self.scopes.last().expect("scope chain is never empty")
    }

    pub fn token_text(&self, node: AstNodeRef) -> String {
        let base = self.compiler.ast().base(node);
        if base.src_view.is_invalid() {
            return String::new();
        }
        self.compiler
            .view(base.src_view)
            .token_text(base.tok)
            .to_string()
    }

    pub fn token_id(&self, node: AstNodeRef) -> crate::lexer::TokenId {
        let base = self.compiler.ast().base(node);
        if base.src_view.is_invalid() {
            return crate::lexer::TokenId::Invalid;
        }
        self.compiler.view(base.src_view).token(base.tok).id
    }

    pub fn intern_node_name(&self, node: AstNodeRef) -> IdentifierRef {
        self.compiler.identifiers().intern(&self.token_text(node))
    }

    // ----- annotations -----

    pub fn view_of(&self, node: AstNodeRef) -> NodeView {
        let ast = self.compiler.ast();
        let resolved = ast.resolve(node);
        let sema = ast.sema(resolved);
        let mut type_ref = sema.type_ref;
        if sema.cst_ref.is_valid() {
            let value = self.compiler.constants().get(sema.cst_ref);
            type_ref = value.type_of(self.compiler.types());
        } else if type_ref.is_invalid() && sema.sym_ref.is_valid() {
            type_ref = self.compiler.symbol(sema.sym_ref).type_ref();
        }
        NodeView {
            node: resolved,
            cst: sema.cst_ref,
            type_ref,
            sym: sema.sym_ref,
            flags: sema.flags,
        }
    }

    pub fn set_constant(&self, node: AstNodeRef, cst: ConstantRef) {
        let ast = self.compiler.ast();
        ast.set_constant(node, cst);
        ast.add_sema_flags(node, NodeSemaFlags::VALUE_EXPR);
    }

    pub fn set_type(&self, node: AstNodeRef, type_ref: TypeRef) {
        let ast = self.compiler.ast();
        ast.set_type(node, type_ref);
        ast.add_sema_flags(node, NodeSemaFlags::VALUE_EXPR);
    }

    pub fn set_symbol(&self, node: AstNodeRef, sym: SymbolRef) {
        self.compiler.ast().set_symbol(node, sym);
    }

    pub fn set_substitute(&self, node: AstNodeRef, other: AstNodeRef) {
        self.compiler.ast().set_substitute(node, other);
    }

    // ----- scopes, frames, deferred pops -----

    pub fn push_frame(&mut self, frame: SemaFrame) {
        self.frames.push(frame);
    }

    pub fn push_frame_pop_on_post_node(&mut self, frame: SemaFrame, node: AstNodeRef) {
        let expected = self.frames.len();
        self.frames.push(frame);
        self.pops.push(PopTicket {
            kind: PopKind::Frame,
            node,
            child: AstNodeRef::INVALID,
            expected_len: expected,
        });
    }

    pub fn push_frame_pop_on_post_child(
        &mut self,
        frame: SemaFrame,
        node: AstNodeRef,
        child: AstNodeRef,
    ) {
        let expected = self.frames.len();
        self.frames.push(frame);
        self.pops.push(PopTicket {
            kind: PopKind::Frame,
            node,
            child,
            expected_len: expected,
        });
    }

    pub fn push_scope_pop_on_post_node(&mut self, scope: SemaScope, node: AstNodeRef) {
        let expected = self.scopes.len();
        self.scopes.push(scope);
        self.pops.push(PopTicket {
            kind: PopKind::Scope,
            node,
            child: AstNodeRef::INVALID,
            expected_len: expected,
        });
    }

    fn process_pops(&mut self, node: AstNodeRef, child: AstNodeRef) {
        let tickets: Vec<PopTicket> = self.pops.take_matching(node, child).collect();
        for ticket in tickets {
            match ticket.kind {
                PopKind::Frame => {
                    self.frames.pop();
                    debug_assert_eq!(self.frames.len(), ticket.expected_len);
                }
                PopKind::Scope => {
                    self.scopes.pop();
                    debug_assert_eq!(self.scopes.len(), ticket.expected_len);
                }
            }
        }
    }

    /// Unwinds every outstanding ticket after a `Stop`/`Error`, and marks
    /// the owning symbol withdrawn so dependents stop retrying.
    fn cleanup_on_error(&mut self) {
        let tickets = self.pops.drain_all();
        for ticket in tickets.into_iter().rev() {
            match ticket.kind {
                PopKind::Frame => {
                    self.frames.pop();
                }
                PopKind::Scope => {
                    self.scopes.pop();
                }
            }
        }
        let owner = self.guess_current_symbol();
        if owner.is_valid() {
            let symbol = self.compiler.symbol(owner);
            if symbol.kind() != SymbolKind::Namespace && symbol.kind() != SymbolKind::Module {
                symbol.add_flag(crate::sema::symbol::SymbolFlags::HAS_ERROR);
                self.compiler.set_ignored(owner);
            }
        }
    }

    // ----- name resolution -----

    /// Scope-chain lookup. Ignored symbols are filtered as-if-absent; the
    /// flag reports whether any were seen so callers can dismiss silently.
    pub fn lookup(&self, id: IdentifierRef) -> (SmallVec<[SymbolRef; 2]>, bool) {
        let mut saw_ignored = false;
        for scope in self.scopes.iter().rev() {
            let candidates = scope.map.read().get(id);
            if candidates.is_empty() {
                continue;
            }
            let mut live: SmallVec<[SymbolRef; 2]> = SmallVec::new();
            for sym in candidates {
                if self.compiler.symbol(sym).is_ignored() {
                    saw_ignored = true;
                } else {
                    live.push(sym);
                }
            }
            if !live.is_empty() || saw_ignored {
                return (live, saw_ignored);
            }
        }
        (SmallVec::new(), saw_ignored)
    }

    /// Registers a declarable in the current scope. Reports duplicates
    /// (functions may overload each other). Check and insert run under one
    /// write lock so concurrent files cannot both slip past the check.
    pub fn declare_symbol(
        &mut self,
        ctx: &mut TaskContext,
        node: AstNodeRef,
        kind: SymbolKind,
    ) -> Result<SymbolRef, Flow> {
        let name = self.token_text(node);
        let name_id = self.compiler.identifiers().intern(&name);
        let base = self.compiler.ast().base(node);

        // Staged declarations (compiler-if branches) may coexist with a
        // same-named symbol; the losing branch withdraws later.
        let staged = self.frame().staging != u32::MAX;
        let access = self.frame().access;

        let mut duplicate = SymbolRef::INVALID;
        let sym_ref = {
            let map_arc = self.cur_scope().map.clone();
            let mut map = map_arc.write();
            if !staged {
                for existing in map.get(name_id) {
                    let other = self.compiler.symbol(existing);
                    if other.is_ignored() {
                        continue;
                    }
                    if kind == SymbolKind::Function && other.kind() == SymbolKind::Function {
                        continue;
                    }
                    duplicate = existing;
                    break;
                }
            }
            if duplicate.is_valid() {
                SymbolRef::INVALID
            } else {
                let symbol =
                    Symbol::new(kind, name_id, base.tok, base.src_view, node, access);
                let sym_ref = self.compiler.symbol_store().add(symbol);
                map.insert(name_id, sym_ref);
                sym_ref
            }
        };
        if duplicate.is_valid() {
            return Err(error::raise_already_defined(self, ctx, node, &name, duplicate));
        }

        let staging = self.frame().staging;
        if staging != u32::MAX {
            self.compiler.staging_add(staging, sym_ref);
        }

        self.set_symbol(node, sym_ref);
        self.compiler.notify_identifier(name_id);
        Ok(sym_ref)
    }

    /// Atomic find-or-create for namespaces: same-named namespaces merge,
    /// a clash with another symbol kind is a duplicate.
    pub fn find_or_create_namespace(
        &mut self,
        ctx: &mut TaskContext,
        node: AstNodeRef,
    ) -> Result<(SymbolRef, bool), Flow> {
        let name = self.token_text(node);
        let name_id = self.compiler.identifiers().intern(&name);
        let base = self.compiler.ast().base(node);
        let access = self.frame().access;

        let mut duplicate = SymbolRef::INVALID;
        let (sym_ref, created) = {
            let map_arc = self.cur_scope().map.clone();
            let mut map = map_arc.write();
            let mut found = SymbolRef::INVALID;
            for existing in map.get(name_id) {
                let other = self.compiler.symbol(existing);
                if other.is_ignored() {
                    continue;
                }
                if other.kind() == SymbolKind::Namespace {
                    found = existing;
                } else {
                    duplicate = existing;
                }
                break;
            }
            if found.is_valid() || duplicate.is_valid() {
                (found, false)
            } else {
                let symbol = Symbol::new(
                    SymbolKind::Namespace,
                    name_id,
                    base.tok,
                    base.src_view,
                    node,
                    access,
                );
                let sym_ref = self.compiler.symbol_store().add(symbol);
                map.insert(name_id, sym_ref);
                (sym_ref, true)
            }
        };
        if duplicate.is_valid() {
            return Err(error::raise_already_defined(self, ctx, node, &name, duplicate));
        }

        self.set_symbol(node, sym_ref);
        if created {
            self.compiler.notify_identifier(name_id);
        }
        Ok((sym_ref, created))
    }

    /// Symbol on whose behalf this job is working, for waits-for edges.
    pub fn guess_current_symbol(&self) -> SymbolRef {
        let owner = self.frame().owner;
        if owner.is_valid() {
            return owner;
        }
        let root_sym = self.compiler.ast().sema(self.root).sym_ref;
        if root_sym.is_valid() {
            return root_sym;
        }
        SymbolRef::INVALID
    }

    // ----- waits -----

    fn fill_wait(
        &self,
        ctx: &mut TaskContext,
        kind: WaitKind,
        node: AstNodeRef,
        tok: TokenRef,
    ) {
        let state = &mut ctx.state;
        state.kind = kind;
        state.node = node;
        state.src_view = self.src_view;
        state.tok = tok;
        state.waiter_symbol = self.guess_current_symbol();
    }

    pub fn wait_identifier(
        &self,
        ctx: &mut TaskContext,
        id: IdentifierRef,
        node: AstNodeRef,
    ) -> Flow {
        let tok = self.compiler.ast().base(node).tok;
        self.fill_wait(ctx, WaitKind::Identifier, node, tok);
        ctx.state.id = id;
        Flow::Pause
    }

    pub fn wait_compiler_defined(
        &self,
        ctx: &mut TaskContext,
        id: IdentifierRef,
        node: AstNodeRef,
    ) -> Flow {
        let tok = self.compiler.ast().base(node).tok;
        self.fill_wait(ctx, WaitKind::CompilerDefined, node, tok);
        ctx.state.id = id;
        Flow::Pause
    }

    pub fn wait_impl_registrations(&self, ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
        let tok = self.compiler.ast().base(node).tok;
        self.fill_wait(ctx, WaitKind::ImplRegistrations, node, tok);
        Flow::Pause
    }

    pub fn wait_declared(&self, ctx: &mut TaskContext, sym: SymbolRef, node: AstNodeRef) -> Flow {
        let tok = self.compiler.ast().base(node).tok;
        self.fill_wait(ctx, WaitKind::SymDeclared, node, tok);
        ctx.state.symbol = sym;
        Flow::Pause
    }

    pub fn wait_typed(&self, ctx: &mut TaskContext, sym: SymbolRef, node: AstNodeRef) -> Flow {
        let tok = self.compiler.ast().base(node).tok;
        self.fill_wait(ctx, WaitKind::SymTyped, node, tok);
        ctx.state.symbol = sym;
        Flow::Pause
    }

    pub fn wait_completed(&self, ctx: &mut TaskContext, sym: SymbolRef, node: AstNodeRef) -> Flow {
        let tok = self.compiler.ast().base(node).tok;
        self.fill_wait(ctx, WaitKind::SymCompleted, node, tok);
        ctx.state.symbol = sym;
        Flow::Pause
    }

    /// Waits until a symbol reaches at least the given lifecycle stage,
    /// dismissing silently when the symbol was withdrawn.
    pub fn wait_symbol_at_least(
        &self,
        ctx: &mut TaskContext,
        sym: SymbolRef,
        state: SymbolState,
        node: AstNodeRef,
    ) -> Flow {
        let symbol = self.compiler.symbol(sym);
        if symbol.is_ignored() {
            ctx.silent = true;
            return Flow::Stop;
        }
        if symbol.state() >= state {
            return Flow::Continue;
        }
        match state {
            SymbolState::Declared => self.wait_declared(ctx, sym, node),
            SymbolState::Typed => self.wait_typed(ctx, sym, node),
            _ => self.wait_completed(ctx, sym, node),
        }
    }

    // ----- duplicate-report suppression -----

    pub fn just_reported(&self, src_view: SourceViewRef, tok: TokenRef) -> bool {
        self.last_reported == (src_view, tok)
    }

    pub fn mark_reported(&mut self, src_view: SourceViewRef, tok: TokenRef) {
        self.last_reported = (src_view, tok);
    }

    // ----- execution -----

    pub fn exec(&mut self, ctx: &mut TaskContext) -> JobResult {
        ctx.state.reset();
        let compiler = self.compiler.clone();
        loop {
            let mut visit = std::mem::take(&mut self.visit);
            let status = {
                let mut hooks = Hooks { sema: self, ctx };
                visit.step(compiler.ast(), &mut hooks)
            };
            self.visit = visit;
            match status {
                VisitStatus::Running => continue,
                VisitStatus::Paused => return JobResult::Sleep,
                VisitStatus::Done | VisitStatus::Stopped | VisitStatus::Errored => {
                    self.scopes.clear();
                    return JobResult::Done;
                }
            }
        }
    }

    // ----- hook dispatch -----

    fn pre_node(&mut self, ctx: &mut TaskContext, node: AstNodeRef, entering: bool) -> Flow {
        if self.decl_pass {
            decl_pass::pre_decl(self, ctx, node, entering)
        } else {
            expr_pass::pre_node(self, ctx, node, entering)
        }
    }

    fn pre_child(
        &mut self,
        ctx: &mut TaskContext,
        node: AstNodeRef,
        child: AstNodeRef,
        entering: bool,
    ) -> Flow {
        if self.decl_pass {
            return decl_pass::pre_decl_child(self, ctx, node, child, entering);
        }

        // Top-level declarations run in their own ad-hoc jobs; the subtree
        // is skipped here whether the job was spawned eagerly (file and
        // namespace bodies) or lazily (compiler-if branches).
        if self.cur_scope().is_top_level()
            && self.compiler.ast().kind(child).spawns_sema_job()
        {
            self.spawn_child_job(child);
            return Flow::SkipChildren;
        }

        expr_pass::pre_node_child(self, ctx, node, child, entering)
    }

    /// Enqueues an ad-hoc sema job for one top-level declaration, once.
    pub(crate) fn spawn_child_job(&mut self, child: AstNodeRef) {
        if !self.spawned.insert(child) {
            return;
        }
        let job = SemaJob::for_subtree_job(self, child);
        self.compiler.jobs().enqueue(
            Box::new(job),
            crate::jobs::JobPriority::Normal,
            self.compiler.client(),
        );
    }

    /// Eagerly hands every declaration child of a top-level container to
    /// its own job, so a directive that waits on a later sibling cannot
    /// starve it. Compiler-if branches are excluded: their children must
    /// not run before the condition picks the winner.
    pub(crate) fn spawn_top_level_children(&mut self, node: AstNodeRef) {
        if self.decl_pass || !self.cur_scope().is_top_level() {
            return;
        }
        // Branch blocks carry a staging payload; leave them lazy.
        if self.compiler.ast().sema(node).payload != u32::MAX {
            return;
        }
        for child in self.compiler.ast().children(node) {
            if self.compiler.ast().kind(child).spawns_sema_job() {
                self.spawn_child_job(child);
            }
        }
    }

    fn post_child(
        &mut self,
        ctx: &mut TaskContext,
        node: AstNodeRef,
        child: AstNodeRef,
        entering: bool,
    ) -> Flow {
        if self.decl_pass {
            decl_pass::post_decl_child(self, ctx, node, child, entering)
        } else {
            expr_pass::post_node_child(self, ctx, node, child, entering)
        }
    }

    fn post_node(&mut self, ctx: &mut TaskContext, node: AstNodeRef, entering: bool) -> Flow {
        if self.decl_pass {
            decl_pass::post_decl(self, ctx, node, entering)
        } else {
            expr_pass::post_node(self, ctx, node, entering)
        }
    }
}

struct Hooks<'a> {
    sema: &'a mut Sema,
    ctx: &'a mut TaskContext,
}

impl AstVisitor for Hooks<'_> {
    fn pre_node(&mut self, node: AstNodeRef, entering: bool) -> Flow {
        self.sema.pre_node(self.ctx, node, entering)
    }

    fn pre_child(&mut self, node: AstNodeRef, child: AstNodeRef, entering: bool) -> Flow {
        self.sema.pre_child(self.ctx, node, child, entering)
    }

    fn post_child(&mut self, node: AstNodeRef, child: AstNodeRef, entering: bool) -> Flow {
        let flow = self.sema.post_child(self.ctx, node, child, entering);
        if matches!(flow, Flow::Continue | Flow::SkipChildren) {
            self.sema.process_pops(node, child);
        }
        flow
    }

    fn post_node(&mut self, node: AstNodeRef, entering: bool) -> Flow {
        let flow = self.sema.post_node(self.ctx, node, entering);
        if matches!(flow, Flow::Continue | Flow::SkipChildren) {
            self.sema.process_pops(node, AstNodeRef::INVALID);
        }
        flow
    }

    fn error_cleanup(&mut self, _active: &[AstNodeRef]) {
        self.sema.cleanup_on_error();
    }
}

/// A sema traversal scheduled on the job manager.
pub struct SemaJob {
    ctx: TaskContext,
    sema: Sema,
}

impl SemaJob {
    pub fn for_file(compiler: Arc<Compiler>, file: Arc<SourceFile>, decl_pass: bool) -> Self {
        let sema = Sema::for_file(compiler, &file, decl_pass);
        let ctx = TaskContext {
            file: file.file_ref(),
            ..TaskContext::default()
        };
        Self { ctx, sema }
    }

    pub fn for_subtree_job(parent: &Sema, root: AstNodeRef) -> Self {
        let sema = Sema::for_subtree(parent, root);
        let ctx = TaskContext {
            file: parent.file(),
            ..TaskContext::default()
        };
        Self { ctx, sema }
    }

    pub fn sema(&self) -> &Sema {
        &self.sema
    }
}

impl Job for SemaJob {
    fn run(&mut self) -> JobResult {
        let mut ctx = std::mem::take(&mut self.ctx);
        let result = self.sema.exec(&mut ctx);
        self.ctx = ctx;
        result
    }

    fn ctx(&self) -> &TaskContext {
        &self.ctx
    }

    fn ctx_mut(&mut self) -> &mut TaskContext {
        &mut self.ctx
    }

    fn kind_name(&self) -> &'static str {
        "sema"
    }
}

/// Invalid-type convenience shared by directive and expression hooks.
pub(crate) fn expect_bool_constant(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
) -> Result<bool, Flow> {
    let view = sema.view_of(node);
    if view.cst.is_invalid() {
        return Err(error::raise_at_node(
            sema,
            ctx,
            DiagnosticId::SemaErrExprNotConst,
            node,
        ));
    }
    let value = sema.compiler().constants().get(view.cst);
    if !value.is_bool() {
        let wanted = sema.compiler().types().ty_bool();
        return Err(error::raise_invalid_type(sema, ctx, node, view.type_ref, wanted));
    }
    Ok(value.get_bool())
}
