//! Declaration pass: registers every declarable into scopes so sibling
//! files can resolve names while bodies are still being analyzed.

use crate::ast::{AstKind, Flow, GlobalMode};
use crate::core::AstNodeRef;
use crate::jobs::TaskContext;
use crate::sema::scope::{ScopeFlags, SemaScope};
use crate::sema::sema::Sema;
use crate::sema::symbol::{SymbolAccess, SymbolFlags, SymbolKind, SymbolState};

pub(crate) fn pre_decl(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    _entering: bool,
) -> Flow {
    let kind = sema.compiler().ast().kind(node);
    match kind {
        AstKind::File { .. } | AstKind::Block { .. } | AstKind::CompilerIf { .. } => Flow::Continue,

        AstKind::NamespaceDecl { .. } => push_namespace(sema, ctx, node),

        AstKind::CompilerGlobal { mode } => {
            apply_global_mode(sema, mode);
            Flow::Continue
        }

        AstKind::VarDecl { .. } => declare_and_skip(sema, ctx, node, SymbolKind::Variable),
        AstKind::FuncDecl { .. } => declare_and_skip(sema, ctx, node, SymbolKind::Function),
        AstKind::StructDecl { .. } => declare_and_skip(sema, ctx, node, SymbolKind::Struct),
        AstKind::UnionDecl { .. } => declare_and_skip(sema, ctx, node, SymbolKind::Union),
        AstKind::EnumDecl { is_flags, .. } => {
            match sema.declare_symbol(ctx, node, SymbolKind::Enum) {
                Ok(sym) => {
                    if is_flags {
                        sema.compiler().symbol(sym).add_flag(SymbolFlags::ENUM_FLAGS);
                    }
                    Flow::SkipChildren
                }
                Err(flow) => flow,
            }
        }
        AstKind::InterfaceDecl { .. } => declare_and_skip(sema, ctx, node, SymbolKind::Interface),
        AstKind::AliasDecl { .. } => declare_and_skip(sema, ctx, node, SymbolKind::Alias),

        // Impl blocks contribute registrations, not names; the barrier opens
        // once every file's declaration pass is done.
        AstKind::ImplDecl { .. } => Flow::SkipChildren,

        // Nothing declarable below expressions or statements.
        _ => Flow::SkipChildren,
    }
}

fn declare_and_skip(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    kind: SymbolKind,
) -> Flow {
    match sema.declare_symbol(ctx, node, kind) {
        Ok(_) => Flow::SkipChildren,
        Err(flow) => flow,
    }
}

pub(crate) fn apply_global_mode(sema: &mut Sema, mode: GlobalMode) {
    let access = match mode {
        GlobalMode::AccessPublic => SymbolAccess::Public,
        GlobalMode::AccessInternal => SymbolAccess::Internal,
        GlobalMode::AccessPrivate => SymbolAccess::Private,
    };
    sema.frame_mut().access = access;
}

/// Finds or creates the namespace symbol and enters its scope; the scope
/// and frame pop when the matching `post_node` runs. Same-named namespaces
/// merge, including across files.
pub(crate) fn push_namespace(sema: &mut Sema, ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
    let (ns, created) = match sema.find_or_create_namespace(ctx, node) {
        Ok(pair) => pair,
        Err(flow) => return flow,
    };
    if created {
        sema.compiler().transition(ns, SymbolState::Typed);
        sema.compiler().transition(ns, SymbolState::SemaCompleted);
    }

    let map = sema
        .compiler()
        .symbol(ns)
        .sym_map()
        .expect("namespace owns a map");
    // Namespace bodies stay top-level: their declarations spawn child jobs
    // and land in the namespace map.
    let scope = SemaScope::new(ScopeFlags::TOP_LEVEL | ScopeFlags::NAMESPACE, map, ns);
    sema.push_scope_pop_on_post_node(scope, node);

    let mut frame = sema.frame().clone();
    frame.owner = ns;
    sema.push_frame_pop_on_post_node(frame, node);

    Flow::Continue
}

pub(crate) fn pre_decl_child(
    sema: &mut Sema,
    _ctx: &mut TaskContext,
    node: AstNodeRef,
    child: AstNodeRef,
    _entering: bool,
) -> Flow {
    if let AstKind::CompilerIf {
        cond,
        then_block,
        else_block,
    } = sema.compiler().ast().kind(node)
    {
        if child == cond {
            // No declarables inside the condition.
            return Flow::SkipChildren;
        }
        // Each branch declares into a staging list so the use pass can
        // withdraw the losing side.
        if child == then_block || child == else_block {
            let staging = sema.compiler().alloc_staging();
            sema.compiler().ast().set_payload(child, staging);
            let mut frame = sema.frame().clone();
            frame.staging = staging;
            sema.push_frame_pop_on_post_child(frame, node, child);
        }
    }
    Flow::Continue
}

pub(crate) fn post_decl_child(
    _sema: &mut Sema,
    _ctx: &mut TaskContext,
    _node: AstNodeRef,
    _child: AstNodeRef,
    _entering: bool,
) -> Flow {
    Flow::Continue
}

pub(crate) fn post_decl(
    _sema: &mut Sema,
    _ctx: &mut TaskContext,
    _node: AstNodeRef,
    _entering: bool,
) -> Flow {
    Flow::Continue
}
