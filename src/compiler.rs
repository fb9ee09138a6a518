//! Compiler instance: the shared stores every job works against, and the
//! phase drivers that pump the job manager to a fixed point.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};

use crate::ast::AstStore;
use crate::core::{AstNodeRef, FileRef, IdentifierRef, SourceViewRef, SymbolRef, TokenRef};
use crate::jobs::{JobClientId, JobManager, JobPriority, WaitKey, WaitKind};
use crate::lexer::{SourceFile, SourceView};
use crate::parser::ParseJob;
use crate::report::diagnostic::{Diagnostic, DiagnosticId, Reporter, SourceLocation};
use crate::sema::constants::ConstantPool;
use crate::sema::cycle;
use crate::sema::interner::IdentifierPool;
use crate::sema::symbol::{
    Symbol, SymbolAccess, SymbolFlags, SymbolKind, SymbolState, SymbolStore,
};
use crate::sema::types::TypePool;
use crate::sema::SemaJob;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Command {
    /// Parse only, then check verify directives.
    Syntax,
    /// Parse only.
    Format,
    /// Parse + declaration pass + use pass.
    Sema,
    /// Full pipeline through codegen scheduling.
    Build,
}

#[derive(Clone, Debug)]
pub struct CompileOptions {
    pub command: Command,
    pub threads: usize,
    /// Enables in-source `expected-error` / `swc-option` directives.
    pub verify: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            command: Command::Sema,
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            verify: true,
        }
    }
}

pub struct Compiler {
    options: CompileOptions,
    jobs: Arc<JobManager>,
    ast: AstStore,
    types: TypePool,
    constants: ConstantPool,
    identifiers: IdentifierPool,
    symbols: SymbolStore,
    files: RwLock<Vec<Arc<SourceFile>>>,
    views: RwLock<Vec<Arc<SourceView>>>,
    reporter: Reporter,
    /// Compiler-if branch staging lists, addressed by node payload.
    staging: Mutex<Vec<Vec<SymbolRef>>>,
    /// Set by any state transition; cleared and tested by the driver
    /// between waitAll rounds.
    changed: AtomicBool,
    /// One-shot impl-registration barrier; opens between the decl and use
    /// phases.
    impls_registered: AtomicBool,
    client: JobClientId,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Arc<Self> {
        Arc::new(Self {
            options,
            jobs: Arc::new(JobManager::new()),
            ast: AstStore::new(),
            types: TypePool::new(),
            constants: ConstantPool::new(),
            identifiers: IdentifierPool::new(),
            symbols: SymbolStore::new(),
            files: RwLock::new(Vec::new()),
            views: RwLock::new(Vec::new()),
            reporter: Reporter::new(),
            staging: Mutex::new(Vec::new()),
            changed: AtomicBool::new(false),
            impls_registered: AtomicBool::new(false),
            client: 1,
        })
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn command(&self) -> Command {
        self.options.command
    }

    pub fn jobs(&self) -> &Arc<JobManager> {
        &self.jobs
    }

    pub fn client(&self) -> JobClientId {
        self.client
    }

    pub fn ast(&self) -> &AstStore {
        &self.ast
    }

    pub fn types(&self) -> &TypePool {
        &self.types
    }

    pub fn constants(&self) -> &ConstantPool {
        &self.constants
    }

    pub fn identifiers(&self) -> &IdentifierPool {
        &self.identifiers
    }

    pub fn symbol_store(&self) -> &SymbolStore {
        &self.symbols
    }

    pub fn symbol(&self, sym: SymbolRef) -> Arc<Symbol> {
        self.symbols.get(sym)
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    // ----- files and views -----

    pub fn add_file(&self, path: PathBuf) -> Arc<SourceFile> {
        let mut files = self.files.write();
        let file = Arc::new(SourceFile::new(FileRef::new(files.len() as u32), path));
        files.push(file.clone());
        file
    }

    /// Registers an in-memory file, used by tests and tooling.
    pub fn add_file_with_content(&self, name: &str, text: &str) -> Arc<SourceFile> {
        let file = self.add_file(PathBuf::from(name));
        file.set_content(text);
        file
    }

    pub fn files(&self) -> Vec<Arc<SourceFile>> {
        self.files.read().clone()
    }

    pub fn file(&self, file_ref: FileRef) -> Arc<SourceFile> {
        self.files.read()[file_ref.index()].clone()
    }

    /// Expands inputs into source files; directories are walked for
    /// `*.swg` / `*.swgs`.
    pub fn collect_files(&self, inputs: &[PathBuf]) -> Result<()> {
        for input in inputs {
            if input.is_dir() {
                let walker = globwalk::GlobWalkerBuilder::from_patterns(
                    input,
                    &["**/*.swg", "**/*.swgs"],
                )
                .build()
                .with_context(|| format!("walking {}", input.display()))?;
                let mut found: Vec<PathBuf> =
                    walker.filter_map(|e| e.ok()).map(|e| e.into_path()).collect();
                found.sort();
                for path in found {
                    self.add_file(path);
                }
            } else {
                self.add_file(input.clone());
            }
        }
        Ok(())
    }

    pub fn register_view(&self, view: SourceView) -> SourceViewRef {
        let mut views = self.views.write();
        let r = SourceViewRef::new(views.len() as u32);
        views.push(Arc::new(view));
        r
    }

    pub fn view(&self, view_ref: SourceViewRef) -> Arc<SourceView> {
        self.views.read()[view_ref.index()].clone()
    }

    // ----- shared state -----

    pub fn set_changed(&self) {
        self.changed.store(true, Ordering::Release);
    }

    pub fn take_changed(&self) -> bool {
        self.changed.swap(false, Ordering::AcqRel)
    }

    pub fn impls_registered(&self) -> bool {
        self.impls_registered.load(Ordering::Acquire)
    }

    fn open_impl_barrier(&self) {
        self.impls_registered.store(true, Ordering::Release);
        self.jobs.notify(WaitKey::ImplRegistrations);
        self.set_changed();
    }

    /// Advances a symbol's lifecycle and posts ledger wakes for every stage
    /// now satisfied.
    pub fn transition(&self, sym: SymbolRef, state: SymbolState) {
        let symbol = self.symbols.get(sym);
        if !symbol.advance_state(state) {
            return;
        }
        self.set_changed();
        for stage in [
            SymbolState::Declared,
            SymbolState::Typed,
            SymbolState::SemaCompleted,
            SymbolState::CodeGenPreSolved,
            SymbolState::CodeGenCompleted,
        ] {
            if stage <= state {
                self.jobs.notify(WaitKey::Symbol(sym, stage));
            }
        }
    }

    /// Withdraws a symbol and wakes anything parked on its transitions so
    /// dependents can resolve the dismissal.
    pub fn set_ignored(&self, sym: SymbolRef) {
        let symbol = self.symbols.get(sym);
        symbol.add_flag(SymbolFlags::IGNORED);
        self.set_changed();
        for stage in [
            SymbolState::Declared,
            SymbolState::Typed,
            SymbolState::SemaCompleted,
            SymbolState::CodeGenPreSolved,
            SymbolState::CodeGenCompleted,
        ] {
            self.jobs.notify(WaitKey::Symbol(sym, stage));
        }
        if symbol.name().is_valid() {
            self.jobs.notify(WaitKey::Identifier(symbol.name()));
        }
    }

    /// Called after a symbol lands in a map so identifier waiters retry.
    pub fn notify_identifier(&self, id: IdentifierRef) {
        self.set_changed();
        self.jobs.notify(WaitKey::Identifier(id));
    }

    // ----- compiler-if staging -----

    pub fn alloc_staging(&self) -> u32 {
        let mut staging = self.staging.lock();
        staging.push(Vec::new());
        (staging.len() - 1) as u32
    }

    pub fn staging_add(&self, id: u32, sym: SymbolRef) {
        self.staging.lock()[id as usize].push(sym);
    }

    pub fn staging_take(&self, id: u32) -> Vec<SymbolRef> {
        std::mem::take(&mut self.staging.lock()[id as usize])
    }

    // ----- diagnostics -----

    /// Reports a diagnostic, letting the file's verify directives consume it
    /// first when verification is enabled.
    pub fn report(&self, diag: Diagnostic) {
        if self.options.verify && diag.file.is_valid() {
            let file = self.file(diag.file);
            if file.verify().lock().match_diag(&diag) {
                log::debug!("expected diagnostic matched: {}", diag.id.as_str());
                return;
            }
        }
        if diag.severity == crate::report::Severity::Error && diag.file.is_valid() {
            self.file(diag.file).set_has_error();
        }
        self.reporter.report(diag);
    }

    pub fn token_location(&self, view_ref: SourceViewRef, tok: TokenRef) -> SourceLocation {
        if view_ref.is_invalid() {
            return SourceLocation {
                path: String::new(),
                line: 0,
                col: 0,
                len: 0,
            };
        }
        let view = self.view(view_ref);
        let lc = view.token_line_col(tok);
        let (_, len) = view.token_span(view.token(tok));
        SourceLocation {
            path: self.file(view.file_ref()).path().display().to_string(),
            line: lc.line,
            col: lc.col,
            len,
        }
    }

    pub fn node_location(&self, node: AstNodeRef) -> SourceLocation {
        let base = self.ast.base(node);
        self.token_location(base.src_view, base.tok)
    }

    // ----- drivers -----

    /// Runs the configured command over the collected files. Returns the
    /// process exit code: zero iff no error diagnostic.
    pub fn drive(self: &Arc<Self>) -> i32 {
        for file in self.files() {
            let job = ParseJob::new(self.clone(), file);
            self.jobs
                .enqueue(Box::new(job), JobPriority::Normal, self.client);
        }
        self.jobs.wait_all(self.client);

        match self.command() {
            Command::Syntax => self.verify_untouched(),
            Command::Format => {}
            Command::Sema | Command::Build => {
                self.run_sema();
                self.verify_untouched();
            }
        }

        if self.reporter.has_errors() {
            1
        } else {
            0
        }
    }

    fn run_sema(self: &Arc<Self>) {
        let files: Vec<_> = self
            .files()
            .into_iter()
            .filter(|f| {
                let Some(view_ref) = f.src_view() else {
                    return false;
                };
                !self.view(view_ref).must_skip() && f.root().is_valid()
            })
            .collect();
        if files.is_empty() {
            return;
        }

        // One module namespace shared by every file; named after the first
        // input.
        let module_name = files[0]
            .path()
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "main".to_string());
        let module_sym = self.symbols.add(Symbol::new(
            SymbolKind::Module,
            IdentifierRef::INVALID,
            TokenRef::INVALID,
            SourceViewRef::INVALID,
            AstNodeRef::INVALID,
            SymbolAccess::Public,
        ));
        let ns_id = self.identifiers.intern(&module_name);
        let ns_sym = self.symbols.add(Symbol::new(
            SymbolKind::Namespace,
            ns_id,
            TokenRef::INVALID,
            SourceViewRef::INVALID,
            AstNodeRef::INVALID,
            SymbolAccess::Public,
        ));
        if let Some(map) = self.symbols.get(module_sym).sym_map() {
            map.write().insert(ns_id, ns_sym);
        }

        // Declaration pass, one job per file.
        for file in &files {
            file.set_module_ns(ns_sym);
            let job = SemaJob::for_file(self.clone(), file.clone(), true);
            self.jobs
                .enqueue(Box::new(job), JobPriority::Normal, self.client);
        }
        self.jobs.wait_all(self.client);

        // All declaration passes done: impl registrations are complete.
        self.open_impl_barrier();

        // Use pass.
        for file in &files {
            let job = SemaJob::for_file(self.clone(), file.clone(), false);
            self.jobs
                .enqueue(Box::new(job), JobPriority::Normal, self.client);
        }
        self.sema_wait_done();
    }

    /// Resolution rounds until a fixed point: wake while anything changed,
    /// then default pending `#defined` queries to false, then detect cycles
    /// and let dismissed waiters finish.
    fn sema_wait_done(self: &Arc<Self>) {
        loop {
            self.jobs.wait_all(self.client);

            if self.take_changed() {
                self.jobs.wake_all(self.client);
                continue;
            }

            if self.resolve_compiler_defined() {
                self.jobs.wake_all(self.client);
                continue;
            }

            break;
        }

        cycle::check(self);

        // Cycle victims woke their waiters; give every dismissed job one
        // final run so nothing stays parked on an ignored symbol.
        self.jobs.wake_all(self.client);
        self.jobs.wait_all(self.client);
    }

    /// `#defined(x)` queries still parked after quiescence resolve to false.
    fn resolve_compiler_defined(&self) -> bool {
        let mut resolved = false;
        for (id, state) in self.jobs.waiting_states(self.client) {
            if state.kind == WaitKind::CompilerDefined {
                self.ast.set_constant(state.node, self.constants.cst_false());
                self.jobs.wake(id);
                resolved = true;
            }
        }
        resolved
    }

    /// Raises `unittest_err_not_raised` for expected-diagnostic directives
    /// nothing matched.
    fn verify_untouched(&self) {
        if !self.options.verify {
            return;
        }
        for file in self.files() {
            if file.src_view().is_none() {
                continue;
            }
            let path = file.path().display().to_string();
            let untouched: Vec<(u32, String)> = {
                let verify = file.verify().lock();
                verify
                    .untouched()
                    .map(|d| (d.my_line, d.matches.clone()))
                    .collect()
            };
            for (line, matches) in untouched {
                let mut diag = Diagnostic::new(DiagnosticId::UnittestErrNotRaised, file.file_ref());
                diag.add_span(SourceLocation {
                    path: path.clone(),
                    line,
                    col: 1,
                    len: 0,
                });
                diag.add_argument(crate::report::DiagArg::Value, matches);
                // Do not let the verifier consume its own failure.
                self.reporter.report(diag);
            }
        }
    }

    pub fn shutdown(&self) {
        self.jobs.shutdown();
    }
}

/// One-call entry used by the CLI: collect, start workers, drive, shut down.
pub fn compile(options: CompileOptions, inputs: &[PathBuf]) -> Result<(Arc<Compiler>, i32)> {
    let threads = options.threads;
    let compiler = Compiler::new(options);
    compiler.jobs().start(threads);
    compiler.collect_files(inputs)?;
    let exit = compiler.drive();
    compiler.shutdown();
    Ok((compiler, exit))
}

/// Test/tooling entry over in-memory sources `(name, text)`.
pub fn compile_sources(options: CompileOptions, sources: &[(&str, &str)]) -> (Arc<Compiler>, i32) {
    let threads = options.threads;
    let compiler = Compiler::new(options);
    compiler.jobs().start(threads);
    for (name, text) in sources {
        compiler.add_file_with_content(name, text);
    }
    let exit = compiler.drive();
    compiler.shutdown();
    (compiler, exit)
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("files", &self.files.read().len())
            .field("symbols", &self.symbols.len())
            .finish()
    }
}

