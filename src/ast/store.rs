//! Sharded AST store.
//!
//! Nodes live in 8 shards; the shard for a new node is picked from the
//! current worker-thread index to reduce contention. Creation takes the
//! exclusive shard lock and the reference is published only after the entry
//! is fully constructed, so concurrent readers never observe a torn node.

use std::cell::Cell;

use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::ast::node::{AstBase, AstKind, NodeSema, NodeSemaFlags};
use crate::core::store::SpanStore;
use crate::core::{AstNodeRef, ConstantRef, SpanRef, SymbolRef, TypeRef, SHARD_COUNT};

thread_local! {
    static WORKER_SHARD: Cell<usize> = const { Cell::new(0) };
}

/// Installs the shard used for node allocations on this thread. Called by
/// the job manager when a worker starts.
pub fn set_worker_shard(index: usize) {
    WORKER_SHARD.with(|s| s.set(index % SHARD_COUNT));
}

pub fn worker_shard() -> usize {
    WORKER_SHARD.with(|s| s.get())
}

#[derive(Clone, Debug)]
pub struct AstEntry {
    pub base: AstBase,
    pub kind: AstKind,
    pub sema: NodeSema,
}

#[derive(Default)]
struct AstShard {
    entries: Vec<AstEntry>,
    spans: SpanStore,
}

pub struct AstStore {
    shards: [RwLock<AstShard>; SHARD_COUNT],
}

impl AstStore {
    pub fn new() -> Self {
        let store = Self {
            shards: Default::default(),
        };
        // Slot (0, 0) holds the reserved invalid node so that raw value 0
        // stays an invalid reference.
        store.shards[0].write().entries.push(AstEntry {
            base: AstBase::new(crate::core::TokenRef::INVALID, crate::core::SourceViewRef::INVALID),
            kind: AstKind::Invalid,
            sema: NodeSema::default(),
        });
        store
    }

    /// Allocates a node in the current worker's shard.
    pub fn make_node(&self, base: AstBase, kind: AstKind) -> AstNodeRef {
        let shard_index = worker_shard();
        let mut shard = self.shards[shard_index].write();
        let local = shard.entries.len() as u32;
        shard.entries.push(AstEntry {
            base,
            kind,
            sema: NodeSema::default(),
        });
        AstNodeRef::pack(shard_index, local)
    }

    /// Copies an ordered child list into the current worker's span store.
    /// Empty lists stay `SpanRef::INVALID`.
    pub fn push_span(&self, children: &[AstNodeRef]) -> SpanRef {
        if children.is_empty() {
            return SpanRef::INVALID;
        }
        let shard_index = worker_shard();
        let mut shard = self.shards[shard_index].write();
        let raw: SmallVec<[u32; 16]> = children.iter().map(|r| r.get()).collect();
        let head = shard.spans.push_span(&raw);
        // Heads are stored off by one so the first span of shard 0 does not
        // collide with the reserved invalid reference.
        SpanRef::pack(shard_index, head + 1)
    }

    pub fn span(&self, span: SpanRef) -> Vec<AstNodeRef> {
        if span.is_invalid() {
            return Vec::new();
        }
        let shard = self.shards[span.shard()].read();
        shard
            .spans
            .read_span(span.local() as u32 - 1)
            .into_iter()
            .map(AstNodeRef::from_raw)
            .collect()
    }

    pub fn entry(&self, node: AstNodeRef) -> AstEntry {
        debug_assert!(node.is_valid());
        let shard = self.shards[node.shard()].read();
        shard.entries[node.local()].clone()
    }

    pub fn base(&self, node: AstNodeRef) -> AstBase {
        let shard = self.shards[node.shard()].read();
        shard.entries[node.local()].base
    }

    pub fn kind(&self, node: AstNodeRef) -> AstKind {
        let shard = self.shards[node.shard()].read();
        shard.entries[node.local()].kind
    }

    pub fn sema(&self, node: AstNodeRef) -> NodeSema {
        let shard = self.shards[node.shard()].read();
        shard.entries[node.local()].sema
    }

    pub fn with_entry_mut<R>(&self, node: AstNodeRef, f: impl FnOnce(&mut AstEntry) -> R) -> R {
        let mut shard = self.shards[node.shard()].write();
        f(&mut shard.entries[node.local()])
    }

    pub fn set_flag(&self, node: AstNodeRef, flag: crate::ast::node::AstFlags) {
        self.with_entry_mut(node, |e| e.base.flags |= flag);
    }

    pub fn set_type(&self, node: AstNodeRef, type_ref: TypeRef) {
        self.with_entry_mut(node, |e| e.sema.type_ref = type_ref);
    }

    pub fn set_constant(&self, node: AstNodeRef, cst_ref: ConstantRef) {
        self.with_entry_mut(node, |e| e.sema.cst_ref = cst_ref);
    }

    pub fn set_symbol(&self, node: AstNodeRef, sym: SymbolRef) {
        self.with_entry_mut(node, |e| e.sema.sym_ref = sym);
    }

    pub fn set_substitute(&self, node: AstNodeRef, other: AstNodeRef) {
        self.with_entry_mut(node, |e| e.sema.substitute = other);
    }

    pub fn set_payload(&self, node: AstNodeRef, payload: u32) {
        self.with_entry_mut(node, |e| e.sema.payload = payload);
    }

    pub fn add_sema_flags(&self, node: AstNodeRef, flags: NodeSemaFlags) {
        self.with_entry_mut(node, |e| e.sema.flags |= flags);
    }

    /// Follows the substitute chain to the node whose annotations count.
    pub fn resolve(&self, node: AstNodeRef) -> AstNodeRef {
        let mut cur = node;
        loop {
            let sub = self.sema(cur).substitute;
            if sub.is_invalid() {
                return cur;
            }
            cur = sub;
        }
    }

    /// Children of a node in declaration order, with span lists resolved and
    /// invalid (absent) slots dropped.
    pub fn children(&self, node: AstNodeRef) -> SmallVec<[AstNodeRef; 8]> {
        let kind = self.kind(node);
        let mut out: SmallVec<[AstNodeRef; 8]> = SmallVec::new();
        let mut push = |r: AstNodeRef| {
            if r.is_valid() {
                out.push(r);
            }
        };
        match kind {
            AstKind::File { globals, children } => {
                for r in self.span(globals) {
                    push(r);
                }
                for r in self.span(children) {
                    push(r);
                }
            }
            AstKind::AggregateLiteral { children } | AstKind::Block { children } => {
                for r in self.span(children) {
                    push(r);
                }
            }
            AstKind::ParenExpr { expr } | AstKind::UnaryExpr { expr } | AstKind::ExprStmt { expr } => {
                push(expr)
            }
            AstKind::BinaryExpr { left, right }
            | AstKind::LogicalExpr { left, right }
            | AstKind::RelationalExpr { left, right } => {
                push(left);
                push(right);
            }
            AstKind::CastExpr { type_node, expr } => {
                push(type_node);
                push(expr);
            }
            AstKind::CallExpr { callee, args } => {
                push(callee);
                for r in self.span(args) {
                    push(r);
                }
            }
            AstKind::IntrinsicExpr { args } => {
                for r in self.span(args) {
                    push(r);
                }
            }
            AstKind::PointerType { elem } | AstKind::SliceType { elem } => push(elem),
            AstKind::ArrayType { dim, elem } => {
                push(dim);
                push(elem);
            }
            AstKind::VarDecl {
                type_node, init, ..
            } => {
                push(type_node);
                push(init);
            }
            AstKind::ParamDecl { type_node } => push(type_node),
            AstKind::FuncDecl {
                params,
                ret_type,
                body,
            } => {
                for r in self.span(params) {
                    push(r);
                }
                push(ret_type);
                push(body);
            }
            AstKind::StructDecl { members }
            | AstKind::UnionDecl { members }
            | AstKind::InterfaceDecl { members }
            | AstKind::ImplDecl { members } => {
                for r in self.span(members) {
                    push(r);
                }
            }
            AstKind::EnumDecl {
                underlying, values, ..
            } => {
                push(underlying);
                for r in self.span(values) {
                    push(r);
                }
            }
            AstKind::EnumValueDecl { init } => push(init),
            AstKind::AliasDecl { target } => push(target),
            AstKind::NamespaceDecl { body } => push(body),
            AstKind::IfStmt {
                cond,
                then_block,
                else_block,
            } => {
                push(cond);
                push(then_block);
                push(else_block);
            }
            AstKind::WhileStmt { cond, body } => {
                push(cond);
                push(body);
            }
            AstKind::ForStmt {
                init,
                cond,
                post,
                body,
            } => {
                push(init);
                push(cond);
                push(post);
                push(body);
            }
            AstKind::ForeachStmt { expr, body } => {
                push(expr);
                push(body);
            }
            AstKind::SwitchStmt { expr, cases } => {
                push(expr);
                for r in self.span(cases) {
                    push(r);
                }
            }
            AstKind::CaseStmt { exprs, body } => {
                for r in self.span(exprs) {
                    push(r);
                }
                push(body);
            }
            AstKind::ReturnStmt { expr } => push(expr),
            AstKind::CompilerIf {
                cond,
                then_block,
                else_block,
            } => {
                push(cond);
                push(then_block);
                push(else_block);
            }
            AstKind::CompilerDiagnostic { arg } => push(arg),
            AstKind::Invalid
            | AstKind::BoolLiteral
            | AstKind::IntegerLiteral
            | AstKind::BinaryLiteral
            | AstKind::HexaLiteral
            | AstKind::FloatLiteral
            | AstKind::CharacterLiteral
            | AstKind::StringLiteral
            | AstKind::NullLiteral
            | AstKind::UndefinedLiteral
            | AstKind::IdentifierExpr
            | AstKind::TypeExpr { .. }
            | AstKind::BreakStmt
            | AstKind::ContinueStmt
            | AstKind::CompilerDefined
            | AstKind::CompilerLiteral
            | AstKind::CompilerGlobal { .. } => {}
        }
        out
    }
}

impl Default for AstStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AstNodeRef {
    fn from_raw(raw: u32) -> Self {
        // Raw values round-trip through the span store.
        let shard = (raw >> crate::core::SHARD_PAYLOAD_BITS) as usize;
        let local = raw & crate::core::SHARD_PAYLOAD_MASK;
        AstNodeRef::pack(shard, local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SourceViewRef, TokenRef};

    fn base() -> AstBase {
        AstBase::new(TokenRef::new(0), SourceViewRef::new(0))
    }

    #[test]
    fn node_zero_is_reserved() {
        let store = AstStore::new();
        let n = store.make_node(base(), AstKind::BoolLiteral);
        assert!(n.is_valid());
        assert_ne!(n.get(), 0);
    }

    #[test]
    fn children_resolve_spans_in_order() {
        let store = AstStore::new();
        let a = store.make_node(base(), AstKind::IntegerLiteral);
        let b = store.make_node(base(), AstKind::IntegerLiteral);
        let span = store.push_span(&[a, b]);
        let block = store.make_node(base(), AstKind::Block { children: span });
        assert_eq!(store.children(block).as_slice(), &[a, b]);
    }

    #[test]
    fn substitute_chain_resolves() {
        let store = AstStore::new();
        let inner = store.make_node(base(), AstKind::IntegerLiteral);
        let outer = store.make_node(base(), AstKind::ParenExpr { expr: inner });
        store.set_substitute(outer, inner);
        assert_eq!(store.resolve(outer), inner);
        assert_eq!(store.resolve(inner), inner);
    }
}
