//! Compile-time directives: `#if`, `#assert`, `#error`, `#warning`,
//! `#print`, `#defined`, `#file`, `#line`.

use crate::ast::{AstKind, Flow};
use crate::core::AstNodeRef;
use crate::jobs::TaskContext;
use crate::lexer::TokenId;
use crate::report::diagnostic::{DiagArg, DiagnosticId};
use crate::sema::constants::{ConstantValue, IntValue};
use crate::sema::error;
use crate::sema::sema::{expect_bool_constant, Sema};
use crate::sema::types::Sign;

/// Use pass, child gate: the condition runs first; the losing branch is
/// skipped entirely.
pub(crate) fn compiler_if_pre_child(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    child: AstNodeRef,
) -> Flow {
    let AstKind::CompilerIf {
        cond,
        then_block,
        else_block,
    } = sema.compiler().ast().kind(node)
    else {
        return Flow::Continue;
    };
    if child == cond {
        return Flow::Continue;
    }

    // The condition must be a compile-time bool by now.
    let taken = match expect_bool_constant(sema, ctx, cond) {
        Ok(v) => v,
        Err(flow) => return flow,
    };

    if child == then_block && !taken {
        return Flow::SkipChildren;
    }
    if child == else_block && taken {
        return Flow::SkipChildren;
    }
    Flow::Continue
}

/// Use pass completion: the losing branch's staged symbols are withdrawn.
pub(crate) fn compiler_if_post(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
) -> Flow {
    let AstKind::CompilerIf {
        cond,
        then_block,
        else_block,
    } = sema.compiler().ast().kind(node)
    else {
        return Flow::Continue;
    };

    let taken = match expect_bool_constant(sema, ctx, cond) {
        Ok(v) => v,
        Err(flow) => return flow,
    };

    let ignored_block = if taken { else_block } else { then_block };
    if ignored_block.is_invalid() {
        return Flow::Continue;
    }

    let staging = sema.compiler().ast().sema(ignored_block).payload;
    if staging != u32::MAX {
        for sym in sema.compiler().staging_take(staging) {
            sema.compiler().set_ignored(sym);
        }
    }
    Flow::Continue
}

/// `#assert expr`, `#error "..."`, `#warning "..."`, `#print expr`.
pub(crate) fn diagnostic_post(sema: &mut Sema, ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
    let AstKind::CompilerDiagnostic { arg } = sema.compiler().ast().kind(node) else {
        return Flow::Continue;
    };

    crate::flow_verify!(error::check_is_constant(sema, ctx, arg));
    let view = sema.view_of(arg);
    let value = sema.compiler().constants().get(view.cst);

    match sema.token_id(node) {
        TokenId::CompilerAssert => {
            if !value.is_bool() {
                let wanted = sema.compiler().types().ty_bool();
                return error::raise_invalid_type(sema, ctx, arg, view.type_ref, wanted);
            }
            if !value.get_bool() {
                return error::raise_at_node(sema, ctx, DiagnosticId::SemaErrCompilerAssert, node);
            }
            Flow::Continue
        }
        TokenId::CompilerError => {
            if !value.is_string() {
                let wanted = sema.compiler().types().ty_string();
                return error::raise_invalid_type(sema, ctx, arg, view.type_ref, wanted);
            }
            let mut diag = error::report_at_node(sema, DiagnosticId::SemaErrCompilerError, node);
            diag.add_argument(DiagArg::Because, value.get_string());
            error::raise(sema, ctx, diag, node)
        }
        TokenId::CompilerWarning => {
            if !value.is_string() {
                let wanted = sema.compiler().types().ty_string();
                return error::raise_invalid_type(sema, ctx, arg, view.type_ref, wanted);
            }
            let mut diag =
                error::report_at_node(sema, DiagnosticId::SemaWarnCompilerWarning, node);
            diag.add_argument(DiagArg::Because, value.get_string());
            sema.compiler().report(diag);
            Flow::Continue
        }
        TokenId::CompilerPrint => {
            let constants = sema.compiler().constants();
            println!("{}", value.to_display_string(constants));
            Flow::Continue
        }
        _ => error::raise_internal(sema, ctx, node),
    }
}

/// `#defined(name)`: true once any symbol with the name is in scope; parks
/// on the one-shot barrier otherwise and the driver defaults it to false.
pub(crate) fn defined_post(sema: &mut Sema, ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
    // The driver resolves parked queries by writing the constant directly.
    if sema.compiler().ast().sema(node).has_constant() {
        return Flow::Continue;
    }

    let id = sema.intern_node_name(node);
    let (candidates, _) = sema.lookup(id);
    if !candidates.is_empty() {
        let cst = sema.compiler().constants().cst_true();
        sema.set_constant(node, cst);
        return Flow::Continue;
    }
    sema.wait_compiler_defined(ctx, id, node)
}

/// `#file` / `#line` literals.
pub(crate) fn literal_post(sema: &mut Sema, ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
    match sema.token_id(node) {
        TokenId::CompilerFile => {
            let path = sema
                .compiler()
                .file(sema.file())
                .path()
                .display()
                .to_string();
            let cst = sema
                .compiler()
                .constants()
                .add(ConstantValue::make_string(&path));
            sema.set_constant(node, cst);
            Flow::Continue
        }
        TokenId::CompilerLine => {
            let loc = sema.compiler().node_location(node);
            let cst = sema.compiler().constants().add(ConstantValue::make_int_unsized(
                IntValue::unsigned(loc.line as u64),
                Sign::Unsigned,
            ));
            sema.set_constant(node, cst);
            Flow::Continue
        }
        _ => error::raise_internal(sema, ctx, node),
    }
}
