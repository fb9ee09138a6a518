//! Sema activation frames and the deferred-pop ledger.
//!
//! Because a traversal may suspend and resume at any node boundary, scope
//! and frame lifetimes cannot ride on RAII guards. Pushes instead record a
//! ticket keyed to the `post_node` or `post_child` hook of the pushing
//! node; the sema pops when the matching hook completes and asserts the
//! stack depths line up.

use crate::core::{AstNodeRef, SymbolRef, TypeRef};
use crate::sema::symbol::SymbolAccess;

/// Per-activation environment pushed down the AST descent.
#[derive(Clone, Debug)]
pub struct SemaFrame {
    /// Expected type pushed down from a parent (declared variable type for
    /// an initializer, parameter type for an argument).
    pub binding_type: TypeRef,
    pub access: SymbolAccess,
    /// Compiler-if staging list collecting symbols declared in a branch,
    /// `u32::MAX` when not inside a branch.
    pub staging: u32,
    /// Current owning symbol (function or namespace being analyzed).
    pub owner: SymbolRef,
}

impl Default for SemaFrame {
    fn default() -> Self {
        Self {
            binding_type: TypeRef::INVALID,
            access: SymbolAccess::Internal,
            staging: u32::MAX,
            owner: SymbolRef::INVALID,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PopKind {
    Frame,
    Scope,
}

/// A scheduled release of one stacked frame or scope.
#[derive(Copy, Clone, Debug)]
pub struct PopTicket {
    pub kind: PopKind,
    pub node: AstNodeRef,
    /// When valid, the ticket fires after `post_child(node, child)`;
    /// otherwise after `post_node(node)`.
    pub child: AstNodeRef,
    /// Expected stack length after the pop, asserted at pop time.
    pub expected_len: usize,
}

#[derive(Default)]
pub struct DeferredPops {
    tickets: Vec<PopTicket>,
}

impl DeferredPops {
    pub fn push(&mut self, ticket: PopTicket) {
        self.tickets.push(ticket);
    }

    /// Drains tickets matching the completed hook, innermost first.
    pub fn take_matching(
        &mut self,
        node: AstNodeRef,
        child: AstNodeRef,
    ) -> impl Iterator<Item = PopTicket> + '_ {
        let mut matched = Vec::new();
        while let Some(last) = self.tickets.last() {
            if last.node == node && last.child == child {
                matched.push(self.tickets.pop().expect("ticket present"));
            } else {
                break;
            }
        }
        matched.into_iter()
    }

    /// Everything still outstanding, for the error-cleanup path.
    pub fn drain_all(&mut self) -> Vec<PopTicket> {
        std::mem::take(&mut self.tickets)
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }
}
