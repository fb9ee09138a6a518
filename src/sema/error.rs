//! Diagnostic construction helpers for the analyzer.

use crate::ast::Flow;
use crate::core::{AstNodeRef, SourceViewRef, SymbolRef, TokenRef, TypeRef};
use crate::jobs::TaskContext;
use crate::report::diagnostic::{DiagArg, Diagnostic, DiagnosticId};
use crate::sema::sema::Sema;

/// Builds a diagnostic anchored at a token, with the standard token
/// arguments attached.
pub fn report_at_token(
    sema: &Sema,
    id: DiagnosticId,
    src_view: SourceViewRef,
    tok: TokenRef,
) -> Diagnostic {
    let compiler = sema.compiler();
    let mut diag = Diagnostic::new(id, sema.file());
    if src_view.is_valid() && tok.is_valid() {
        let view = compiler.view(src_view);
        let token = *view.token(tok);
        diag.add_argument(DiagArg::Tok, view.token_text(tok));
        diag.add_argument(DiagArg::TokFam, token.id.family());
        diag.add_argument(DiagArg::ATokFam, token.id.a_family());
        diag.add_span(compiler.token_location(src_view, tok));
    }
    diag
}

/// Builds a diagnostic anchored at a node's origin token.
pub fn report_at_node(sema: &Sema, id: DiagnosticId, node: AstNodeRef) -> Diagnostic {
    let base = sema.compiler().ast().base(node);
    report_at_token(sema, id, base.src_view, base.tok)
}

/// Reports and stops. Duplicate reports against the token just reported by
/// this job are silenced.
pub fn raise_at_node(sema: &mut Sema, ctx: &mut TaskContext, id: DiagnosticId, node: AstNodeRef) -> Flow {
    let diag = report_at_node(sema, id, node);
    raise(sema, ctx, diag, node)
}

pub fn raise(sema: &mut Sema, ctx: &mut TaskContext, diag: Diagnostic, node: AstNodeRef) -> Flow {
    let base = sema.compiler().ast().base(node);
    if ctx.silent || sema.just_reported(base.src_view, base.tok) {
        return Flow::Stop;
    }
    sema.mark_reported(base.src_view, base.tok);
    ctx.has_error = true;
    sema.compiler().report(diag);
    Flow::Stop
}

pub fn raise_invalid_type(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    got: TypeRef,
    wanted: TypeRef,
) -> Flow {
    let mut diag = report_at_node(sema, DiagnosticId::SemaErrInvalidType, node);
    let types = sema.compiler().types();
    diag.add_argument(DiagArg::Type, types.name(got));
    diag.add_argument(DiagArg::RequestedType, types.name(wanted));
    raise(sema, ctx, diag, node)
}

pub fn raise_binary_operand_type(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    op_node: AstNodeRef,
    value_node: AstNodeRef,
    got: TypeRef,
) -> Flow {
    let mut diag = report_at_node(sema, DiagnosticId::SemaErrBinaryOperandType, op_node);
    diag.add_argument(DiagArg::Type, sema.compiler().types().name(got));
    diag.add_span(sema.compiler().node_location(value_node));
    raise(sema, ctx, diag, op_node)
}

pub fn raise_div_zero(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    op_node: AstNodeRef,
    value_node: AstNodeRef,
    type_ref: TypeRef,
) -> Flow {
    let mut diag = report_at_node(sema, DiagnosticId::SemaErrDivisionZero, op_node);
    diag.add_argument(DiagArg::Type, sema.compiler().types().name(type_ref));
    diag.add_span(sema.compiler().node_location(value_node));
    raise(sema, ctx, diag, op_node)
}

pub fn raise_literal_overflow(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    value: String,
    target: TypeRef,
) -> Flow {
    let mut diag = report_at_node(sema, DiagnosticId::SemaErrLiteralOverflow, node);
    diag.add_argument(DiagArg::Type, sema.compiler().types().name(target));
    diag.add_argument(DiagArg::Value, value);
    raise(sema, ctx, diag, node)
}

pub fn raise_already_defined(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    name: &str,
    other: SymbolRef,
) -> Flow {
    let mut diag = report_at_node(sema, DiagnosticId::SemaErrAlreadyDefined, node);
    diag.add_argument(DiagArg::Sym, name);
    let other_sym = sema.compiler().symbol(other);
    if other_sym.src_view().is_valid() && other_sym.tok().is_valid() {
        let loc = sema
            .compiler()
            .token_location(other_sym.src_view(), other_sym.tok());
        diag.add_note(DiagnosticId::SemaNoteOtherDefinition).spans.push(loc);
    }
    raise(sema, ctx, diag, node)
}

pub fn raise_internal(sema: &mut Sema, ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
    raise_at_node(sema, ctx, DiagnosticId::SemaErrInternal, node)
}

// ----- checks -----

/// Value-expression check: the node must produce a value.
pub fn check_is_value_expr(sema: &mut Sema, ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
    let view = sema.view_of(node);
    if view.is_value() {
        return Flow::Continue;
    }
    raise_at_node(sema, ctx, DiagnosticId::SemaErrNotValueExpr, node)
}

/// The node must carry a folded constant.
pub fn check_is_constant(sema: &mut Sema, ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
    if sema.view_of(node).cst.is_valid() {
        return Flow::Continue;
    }
    raise_at_node(sema, ctx, DiagnosticId::SemaErrExprNotConst, node)
}

/// Rejects modifiers outside the allowed set, pointing at the offending
/// modifier token.
pub fn check_modifiers(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    mods: crate::ast::ModifierFlags,
    allowed: crate::ast::ModifierFlags,
) -> Flow {
    use crate::ast::ModifierFlags;
    use crate::lexer::TokenId;

    let unsupported = mods & !allowed;
    if unsupported.is_empty() {
        return Flow::Continue;
    }

    let base = sema.compiler().ast().base(node);
    let tok_id = if unsupported.contains(ModifierFlags::WRAP) {
        TokenId::ModifierWrap
    } else if unsupported.contains(ModifierFlags::PROMOTE) {
        TokenId::ModifierPromote
    } else if unsupported.contains(ModifierFlags::BIT) {
        TokenId::ModifierBit
    } else {
        TokenId::ModifierUnConst
    };

    let mut diag = report_at_node(sema, DiagnosticId::SemaErrModifierUnsupported, node);
    if base.src_view.is_valid() {
        let view = sema.compiler().view(base.src_view);
        let mdf = view.find_right_from(base.tok, &[tok_id]);
        diag.add_argument(DiagArg::What, view.token_text(mdf));
        diag.add_span(sema.compiler().token_location(base.src_view, mdf));
    }
    raise(sema, ctx, diag, node)
}
