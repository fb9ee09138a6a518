//! Symbols, lifecycle states, and symbol maps.
//!
//! A symbol's lifecycle is a monotonic atomic progression; only the owning
//! job transitions it, observers wait on transitions through the job
//! manager's ledger. `Ignored` is a withdrawal flag: lookups treat ignored
//! symbols as absent, and waiters on them resolve silently.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use bitflags::bitflags;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::core::{AstNodeRef, ConstantRef, IdentifierRef, SourceViewRef, SymbolRef, TokenRef, TypeRef};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(u8)]
pub enum SymbolState {
    Declared = 0,
    Typed = 1,
    SemaCompleted = 2,
    CodeGenPreSolved = 3,
    CodeGenCompleted = 4,
}

impl SymbolState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => SymbolState::Declared,
            1 => SymbolState::Typed,
            2 => SymbolState::SemaCompleted,
            3 => SymbolState::CodeGenPreSolved,
            _ => SymbolState::CodeGenCompleted,
        }
    }
}

bitflags! {
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
    pub struct SymbolFlags: u32 {
        /// Withdrawn (cycle victim or losing compiler-if branch). Treated as
        /// as-if-absent by lookup.
        const IGNORED            = 1 << 0;
        /// Enum carries the flags capability (`#flags`).
        const ENUM_FLAGS         = 1 << 1;
        /// A codegen job has been scheduled for this function.
        const CODEGEN_SCHEDULED  = 1 << 2;
        /// Errors were reported while analyzing this symbol.
        const HAS_ERROR          = 1 << 3;
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SymbolAccess {
    Public,
    Internal,
    Private,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SymbolKind {
    Module,
    Namespace,
    Function,
    Variable,
    Struct,
    Union,
    Enum,
    Interface,
    Alias,
}

impl SymbolKind {
    pub fn is_type(self) -> bool {
        matches!(
            self,
            SymbolKind::Struct
                | SymbolKind::Union
                | SymbolKind::Enum
                | SymbolKind::Interface
                | SymbolKind::Alias
        )
    }

    pub fn owns_children(self) -> bool {
        matches!(
            self,
            SymbolKind::Module
                | SymbolKind::Namespace
                | SymbolKind::Struct
                | SymbolKind::Enum
                | SymbolKind::Interface
        )
    }
}

pub type SymbolMapRef = Arc<RwLock<SymbolMap>>;

/// Maps names to overload sets.
#[derive(Default)]
pub struct SymbolMap {
    map: FxHashMap<IdentifierRef, SmallVec<[SymbolRef; 2]>>,
}

impl SymbolMap {
    pub fn insert(&mut self, name: IdentifierRef, sym: SymbolRef) {
        self.map.entry(name).or_default().push(sym);
    }

    pub fn get(&self, name: IdentifierRef) -> SmallVec<[SymbolRef; 2]> {
        self.map.get(&name).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

pub struct Symbol {
    kind: SymbolKind,
    name: IdentifierRef,
    tok: TokenRef,
    src_view: SourceViewRef,
    decl_node: AstNodeRef,
    access: SymbolAccess,

    state: AtomicU8,
    flags: AtomicU32,
    /// Declared/computed type; `u32::MAX` until `Typed`.
    type_ref: AtomicU32,
    /// Folded constant for const variables and enum values.
    cst_ref: AtomicU32,

    /// Child symbol map for owner kinds (modules, namespaces, aggregates).
    map: Option<SymbolMapRef>,
    /// Direct call dependencies of a function body.
    calls: Mutex<SmallVec<[SymbolRef; 4]>>,
    /// Normalized ABI signature, computed at sema completion.
    abi: OnceLock<String>,
}

impl Symbol {
    pub fn new(
        kind: SymbolKind,
        name: IdentifierRef,
        tok: TokenRef,
        src_view: SourceViewRef,
        decl_node: AstNodeRef,
        access: SymbolAccess,
    ) -> Self {
        Self {
            kind,
            name,
            tok,
            src_view,
            decl_node,
            access,
            state: AtomicU8::new(SymbolState::Declared as u8),
            flags: AtomicU32::new(0),
            type_ref: AtomicU32::new(u32::MAX),
            cst_ref: AtomicU32::new(u32::MAX),
            map: kind.owns_children().then(SymbolMapRef::default),
            calls: Mutex::new(SmallVec::new()),
            abi: OnceLock::new(),
        }
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    pub fn name(&self) -> IdentifierRef {
        self.name
    }

    pub fn tok(&self) -> TokenRef {
        self.tok
    }

    pub fn src_view(&self) -> SourceViewRef {
        self.src_view
    }

    pub fn decl_node(&self) -> AstNodeRef {
        self.decl_node
    }

    pub fn access(&self) -> SymbolAccess {
        self.access
    }

    pub fn state(&self) -> SymbolState {
        SymbolState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Monotonic transition; returns true when the state advanced.
    pub fn advance_state(&self, new: SymbolState) -> bool {
        self.state.fetch_max(new as u8, Ordering::AcqRel) < new as u8
    }

    pub fn flags(&self) -> SymbolFlags {
        SymbolFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    pub fn add_flag(&self, flag: SymbolFlags) {
        self.flags.fetch_or(flag.bits(), Ordering::AcqRel);
    }

    /// Idempotent scheduling guard for codegen jobs.
    pub fn try_mark_codegen_scheduled(&self) -> bool {
        let prev = self
            .flags
            .fetch_or(SymbolFlags::CODEGEN_SCHEDULED.bits(), Ordering::AcqRel);
        prev & SymbolFlags::CODEGEN_SCHEDULED.bits() == 0
    }

    pub fn is_ignored(&self) -> bool {
        self.flags().contains(SymbolFlags::IGNORED)
    }

    pub fn is_enum_flags(&self) -> bool {
        self.flags().contains(SymbolFlags::ENUM_FLAGS)
    }

    pub fn type_ref(&self) -> TypeRef {
        let raw = self.type_ref.load(Ordering::Acquire);
        if raw == u32::MAX {
            TypeRef::INVALID
        } else {
            TypeRef::new(raw)
        }
    }

    pub fn set_type_ref(&self, type_ref: TypeRef) {
        self.type_ref.store(type_ref.get(), Ordering::Release);
    }

    pub fn cst_ref(&self) -> ConstantRef {
        let raw = self.cst_ref.load(Ordering::Acquire);
        if raw == u32::MAX {
            ConstantRef::INVALID
        } else {
            ConstantRef::new(raw)
        }
    }

    pub fn set_cst_ref(&self, cst: ConstantRef) {
        self.cst_ref.store(cst.get(), Ordering::Release);
    }

    pub fn sym_map(&self) -> Option<SymbolMapRef> {
        self.map.clone()
    }

    pub fn add_call_dependency(&self, callee: SymbolRef) {
        let mut calls = self.calls.lock();
        if !calls.contains(&callee) {
            calls.push(callee);
        }
    }

    pub fn call_dependencies(&self) -> SmallVec<[SymbolRef; 4]> {
        self.calls.lock().clone()
    }

    pub fn set_abi_signature(&self, sig: String) {
        let _ = self.abi.set(sig);
    }

    pub fn abi_signature(&self) -> Option<&str> {
        self.abi.get().map(|s| s.as_str())
    }
}

/// Arena of symbols addressed by `SymbolRef`.
#[derive(Default)]
pub struct SymbolStore {
    symbols: RwLock<Vec<Arc<Symbol>>>,
}

impl SymbolStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, symbol: Symbol) -> SymbolRef {
        let mut symbols = self.symbols.write();
        let r = SymbolRef::new(symbols.len() as u32);
        symbols.push(Arc::new(symbol));
        r
    }

    pub fn get(&self, sym: SymbolRef) -> Arc<Symbol> {
        self.symbols.read()[sym.index()].clone()
    }

    pub fn len(&self) -> usize {
        self.symbols.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(kind: SymbolKind) -> Symbol {
        Symbol::new(
            kind,
            IdentifierRef::new(0),
            TokenRef::INVALID,
            SourceViewRef::INVALID,
            AstNodeRef::INVALID,
            SymbolAccess::Public,
        )
    }

    #[test]
    fn lifecycle_is_monotonic() {
        let s = sym(SymbolKind::Variable);
        assert_eq!(s.state(), SymbolState::Declared);
        assert!(s.advance_state(SymbolState::Typed));
        assert!(s.advance_state(SymbolState::SemaCompleted));
        // Going backwards is a no-op.
        assert!(!s.advance_state(SymbolState::Typed));
        assert_eq!(s.state(), SymbolState::SemaCompleted);
    }

    #[test]
    fn codegen_scheduling_is_idempotent() {
        let s = sym(SymbolKind::Function);
        assert!(s.try_mark_codegen_scheduled());
        assert!(!s.try_mark_codegen_scheduled());
    }

    #[test]
    fn owner_kinds_have_maps() {
        assert!(sym(SymbolKind::Namespace).sym_map().is_some());
        assert!(sym(SymbolKind::Variable).sym_map().is_none());
    }

    #[test]
    fn overload_sets() {
        let map = SymbolMap::default();
        let mut map = map;
        let name = IdentifierRef::new(3);
        map.insert(name, SymbolRef::new(0));
        map.insert(name, SymbolRef::new(1));
        assert_eq!(map.get(name).len(), 2);
        assert!(map.get(IdentifierRef::new(9)).is_empty());
    }
}
