//! Scopes: nested symbol maps walked during name resolution.

use bitflags::bitflags;

use crate::core::SymbolRef;
use crate::sema::symbol::SymbolMapRef;

bitflags! {
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
    pub struct ScopeFlags: u32 {
        const TOP_LEVEL = 1 << 0;
        const LOCAL     = 1 << 1;
        const FUNCTION  = 1 << 2;
        const NAMESPACE = 1 << 3;
    }
}

/// One level of the scope chain. Scopes are per-sema (cloned into child
/// jobs); the symbol maps they point at are shared.
#[derive(Clone)]
pub struct SemaScope {
    pub flags: ScopeFlags,
    pub map: SymbolMapRef,
    /// Symbol owning this scope (namespace, function), when any.
    pub owner: SymbolRef,
}

impl SemaScope {
    pub fn new(flags: ScopeFlags, map: SymbolMapRef, owner: SymbolRef) -> Self {
        Self { flags, map, owner }
    }

    pub fn is_top_level(&self) -> bool {
        self.flags.contains(ScopeFlags::TOP_LEVEL)
    }
}
