//! Schedulable work units.

pub mod manager;

pub use manager::JobManager;

use crate::core::{AstNodeRef, FileRef, IdentifierRef, SourceViewRef, SymbolRef, TokenRef};
use crate::sema::symbol::SymbolState;

pub type JobClientId = u32;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct JobId(pub u32);

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[repr(u8)]
pub enum JobPriority {
    High = 0,
    Normal = 1,
    Low = 2,
}

/// What a job's run returned to the manager.
pub enum JobResult {
    /// Finished; dependents are woken.
    Done,
    /// Yielded; parked unless a wake arrived while running.
    Sleep,
    /// Parked until the given job completes.
    SleepOn(JobId),
    /// Enqueue the child at the given priority, then sleep on it.
    SpawnAndSleep(Box<dyn Job>, JobPriority),
}

/// Structured wait reason recorded when sema or codegen pauses. The manager
/// keys its dependency ledger on it and the cycle detector walks it.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum WaitKind {
    #[default]
    None,
    /// Wait for some symbol with this name to appear in scope.
    Identifier,
    /// Wait on the one-shot `#defined` resolution barrier.
    CompilerDefined,
    /// Wait for the global impl-registration barrier.
    ImplRegistrations,
    SymDeclared,
    SymTyped,
    SymCompleted,
    TypeCompleted,
    /// Codegen waiting for a callee to reach `CodeGenPreSolved`.
    CodeGenDep,
}

#[derive(Clone, Debug, Default)]
pub struct TaskState {
    pub kind: WaitKind,
    pub node: AstNodeRef,
    pub src_view: SourceViewRef,
    pub tok: TokenRef,
    pub id: IdentifierRef,
    pub symbol: SymbolRef,
    /// Symbol on whose behalf the job waits (edge source in the waits-for
    /// graph).
    pub waiter_symbol: SymbolRef,
}

impl TaskState {
    pub fn reset(&mut self) {
        *self = TaskState::default();
    }
}

/// Ledger key derived from a parked job's wait state.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum WaitKey {
    Identifier(IdentifierRef),
    Symbol(SymbolRef, SymbolState),
    CompilerDefined,
    ImplRegistrations,
}

impl TaskState {
    pub fn wait_key(&self) -> Option<WaitKey> {
        match self.kind {
            WaitKind::None => None,
            WaitKind::Identifier => Some(WaitKey::Identifier(self.id)),
            WaitKind::CompilerDefined => Some(WaitKey::CompilerDefined),
            WaitKind::ImplRegistrations => Some(WaitKey::ImplRegistrations),
            WaitKind::SymDeclared => Some(WaitKey::Symbol(self.symbol, SymbolState::Declared)),
            WaitKind::SymTyped => Some(WaitKey::Symbol(self.symbol, SymbolState::Typed)),
            WaitKind::SymCompleted | WaitKind::TypeCompleted => {
                Some(WaitKey::Symbol(self.symbol, SymbolState::SemaCompleted))
            }
            WaitKind::CodeGenDep => {
                Some(WaitKey::Symbol(self.symbol, SymbolState::CodeGenPreSolved))
            }
        }
    }
}

/// Per-job context. Contexts are never shared between jobs.
#[derive(Clone, Debug, Default)]
pub struct TaskContext {
    pub state: TaskState,
    /// Suppress diagnostics (duplicate-adjacent or dismissed waits).
    pub silent: bool,
    pub has_error: bool,
    pub has_warning: bool,
    pub file: FileRef,
}

pub trait Job: Send {
    fn run(&mut self) -> JobResult;
    fn ctx(&self) -> &TaskContext;
    fn ctx_mut(&mut self) -> &mut TaskContext;
    fn kind_name(&self) -> &'static str {
        "job"
    }
}
