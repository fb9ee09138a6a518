//! Use pass: name resolution, type checking, constant folding, casts, and
//! symbol completion.

use smallvec::SmallVec;

use crate::ast::{AstKind, Flow, ModifierFlags, NodeSemaFlags, TypeExprKind};
use crate::core::{AstNodeRef, ConstantRef, SymbolRef, TypeRef};
use crate::jobs::TaskContext;
use crate::lexer::TokenId;
use crate::report::diagnostic::{DiagArg, DiagnosticId};
use crate::sema::cast::{
    cast_allowed, cast_constant, concretize_constant, CastContext, CastFailure, CastFlags,
    CastKind, CastQuery,
};
use crate::sema::constants::{ConstantValue, IntValue};
use crate::sema::error;
use crate::sema::scope::{ScopeFlags, SemaScope};
use crate::sema::sema::{NodeView, Sema};
use crate::sema::symbol::{SymbolKind, SymbolState};
use crate::sema::types::{AggregateKind, PointerKind, Sign, TypeInfo};
use crate::sema::{decl_pass, directive, literal};

// ---------------------------------------------------------------- pre_node

pub(crate) fn pre_node(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    _entering: bool,
) -> Flow {
    let kind = sema.compiler().ast().kind(node);
    match kind {
        AstKind::BoolLiteral => literal::bool_literal(sema, ctx, node),
        AstKind::IntegerLiteral => literal::integer_literal(sema, ctx, node),
        AstKind::BinaryLiteral => literal::radix_literal(sema, ctx, node, false),
        AstKind::HexaLiteral => literal::radix_literal(sema, ctx, node, true),
        AstKind::FloatLiteral => literal::float_literal(sema, ctx, node),
        AstKind::CharacterLiteral => literal::character_literal(sema, ctx, node),
        AstKind::StringLiteral => literal::string_literal(sema, ctx, node),
        AstKind::NullLiteral => literal::null_literal(sema, ctx, node),
        AstKind::UndefinedLiteral => literal::undefined_literal(sema, ctx, node),

        AstKind::NamespaceDecl { .. } => decl_pass::push_namespace(sema, ctx, node),
        AstKind::CompilerGlobal { mode } => {
            decl_pass::apply_global_mode(sema, mode);
            Flow::Continue
        }

        AstKind::VarDecl { .. } => var_decl_pre(sema, ctx, node),
        AstKind::FuncDecl { .. } => func_decl_pre(sema, ctx, node),
        AstKind::StructDecl { .. } | AstKind::UnionDecl { .. } => {
            aggregate_decl_pre(sema, ctx, node)
        }
        AstKind::EnumDecl { .. } => enum_decl_pre(sema, ctx, node),
        AstKind::InterfaceDecl { .. } => interface_decl_pre(sema, ctx, node),
        AstKind::ImplDecl { .. } => {
            if sema.compiler().impls_registered() {
                Flow::Continue
            } else {
                sema.wait_impl_registrations(ctx, node)
            }
        }

        AstKind::File { globals, .. } => {
            // Access modifiers apply before any child job copies the frame.
            for global in sema.compiler().ast().span(globals) {
                if let AstKind::CompilerGlobal { mode } = sema.compiler().ast().kind(global) {
                    decl_pass::apply_global_mode(sema, mode);
                }
            }
            sema.spawn_top_level_children(node);
            Flow::Continue
        }

        AstKind::Block { .. } => {
            // Namespace bodies stay in the namespace scope; everything else
            // opens a local scope.
            if sema.cur_scope().is_top_level() {
                sema.spawn_top_level_children(node);
                Flow::Continue
            } else {
                let scope = SemaScope::new(
                    ScopeFlags::LOCAL,
                    Default::default(),
                    sema.cur_scope().owner,
                );
                sema.push_scope_pop_on_post_node(scope, node);
                Flow::Continue
            }
        }

        _ => Flow::Continue,
    }
}

fn node_symbol(sema: &Sema, node: AstNodeRef) -> SymbolRef {
    sema.compiler().ast().sema(node).sym_ref
}

/// Shared pre hook for declarations: skip withdrawn or already completed
/// symbols, declare local ones on the fly.
fn decl_pre_common(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    kind: SymbolKind,
) -> Result<Option<SymbolRef>, Flow> {
    let mut sym = node_symbol(sema, node);
    if sym.is_invalid() {
        // Local declaration the decl pass never saw (function bodies).
        sym = match sema.declare_symbol(ctx, node, kind) {
            Ok(s) => s,
            Err(flow) => return Err(flow),
        };
    }
    let symbol = sema.compiler().symbol(sym);
    if symbol.is_ignored() || symbol.state() >= SymbolState::SemaCompleted {
        return Ok(None);
    }
    Ok(Some(sym))
}

fn var_decl_pre(sema: &mut Sema, ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
    match decl_pre_common(sema, ctx, node, SymbolKind::Variable) {
        Ok(Some(_)) => Flow::Continue,
        Ok(None) => Flow::SkipChildren,
        Err(flow) => flow,
    }
}

fn func_decl_pre(sema: &mut Sema, ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
    let sym = match decl_pre_common(sema, ctx, node, SymbolKind::Function) {
        Ok(Some(sym)) => sym,
        Ok(None) => return Flow::SkipChildren,
        Err(flow) => return flow,
    };

    // Parameters and locals live in a function scope.
    let scope = SemaScope::new(
        ScopeFlags::FUNCTION | ScopeFlags::LOCAL,
        Default::default(),
        sym,
    );
    sema.push_scope_pop_on_post_node(scope, node);

    let mut frame = sema.frame().clone();
    frame.owner = sym;
    sema.push_frame_pop_on_post_node(frame, node);
    Flow::Continue
}

fn aggregate_decl_pre(sema: &mut Sema, ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
    let kind = match sema.compiler().ast().kind(node) {
        AstKind::UnionDecl { .. } => SymbolKind::Union,
        _ => SymbolKind::Struct,
    };
    let sym = match decl_pre_common(sema, ctx, node, kind) {
        Ok(Some(sym)) => sym,
        Ok(None) => return Flow::SkipChildren,
        Err(flow) => return flow,
    };

    // Members declare into the aggregate's own map. Unions do not own a
    // child map, so they get a detached local one.
    let map = sema
        .compiler()
        .symbol(sym)
        .sym_map()
        .unwrap_or_default();
    let scope = SemaScope::new(ScopeFlags::LOCAL, map, sym);
    sema.push_scope_pop_on_post_node(scope, node);

    let mut frame = sema.frame().clone();
    frame.owner = sym;
    sema.push_frame_pop_on_post_node(frame, node);
    Flow::Continue
}

fn enum_decl_pre(sema: &mut Sema, ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
    let sym = match decl_pre_common(sema, ctx, node, SymbolKind::Enum) {
        Ok(Some(sym)) => sym,
        Ok(None) => return Flow::SkipChildren,
        Err(flow) => return flow,
    };
    let map = sema
        .compiler()
        .symbol(sym)
        .sym_map()
        .unwrap_or_default();
    let scope = SemaScope::new(ScopeFlags::LOCAL, map, sym);
    sema.push_scope_pop_on_post_node(scope, node);
    Flow::Continue
}

fn interface_decl_pre(sema: &mut Sema, ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
    let sym = match decl_pre_common(sema, ctx, node, SymbolKind::Interface) {
        Ok(Some(sym)) => sym,
        Ok(None) => return Flow::SkipChildren,
        Err(flow) => return flow,
    };
    let map = sema
        .compiler()
        .symbol(sym)
        .sym_map()
        .unwrap_or_default();
    let scope = SemaScope::new(ScopeFlags::LOCAL, map, sym);
    sema.push_scope_pop_on_post_node(scope, node);
    Flow::Continue
}

// --------------------------------------------------------------- pre_child

pub(crate) fn pre_node_child(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    child: AstNodeRef,
    _entering: bool,
) -> Flow {
    match sema.compiler().ast().kind(node) {
        AstKind::CompilerIf { .. } => directive::compiler_if_pre_child(sema, ctx, node, child),

        // The initializer sees the declared type as its binding type.
        AstKind::VarDecl {
            type_node, init, ..
        } => {
            if child == init && type_node.is_valid() {
                let declared = type_value_of(sema, type_node);
                if let Some(declared) = declared {
                    let mut frame = sema.frame().clone();
                    frame.binding_type = declared;
                    sema.push_frame_pop_on_post_child(frame, node, child);
                }
            }
            Flow::Continue
        }

        // Parameters and return type are resolved before the body; the
        // function becomes `Typed` at that point.
        AstKind::FuncDecl {
            params,
            ret_type,
            body,
        } => {
            if child == body {
                return func_body_pre(sema, ctx, node, params, ret_type);
            }
            Flow::Continue
        }

        _ => Flow::Continue,
    }
}

fn func_body_pre(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    params: crate::core::SpanRef,
    ret_type: AstNodeRef,
) -> Flow {
    let sym = node_symbol(sema, node);
    if sym.is_invalid() {
        return error::raise_internal(sema, ctx, node);
    }
    let symbol = sema.compiler().symbol(sym);
    if symbol.state() >= SymbolState::Typed {
        return Flow::Continue;
    }

    let mut param_types: Vec<TypeRef> = Vec::new();
    for param in sema.compiler().ast().span(params) {
        let param_sym = node_symbol(sema, param);
        if param_sym.is_invalid() {
            return error::raise_internal(sema, ctx, param);
        }
        param_types.push(sema.compiler().symbol(param_sym).type_ref());
    }

    let ret = if ret_type.is_valid() {
        match type_value_of(sema, ret_type) {
            Some(t) => t,
            None => return error::raise_at_node(sema, ctx, DiagnosticId::SynErrExpectedType, ret_type),
        }
    } else {
        sema.compiler().types().ty_void()
    };

    let lambda = sema.compiler().types().add(TypeInfo::Lambda {
        params: param_types.into_boxed_slice(),
        ret,
        variadic: false,
    });
    symbol.set_type_ref(lambda);
    sema.compiler().transition(sym, SymbolState::Typed);
    Flow::Continue
}

// -------------------------------------------------------------- post_child

pub(crate) fn post_node_child(
    _sema: &mut Sema,
    _ctx: &mut TaskContext,
    _node: AstNodeRef,
    _child: AstNodeRef,
    _entering: bool,
) -> Flow {
    Flow::Continue
}

// --------------------------------------------------------------- post_node

pub(crate) fn post_node(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    _entering: bool,
) -> Flow {
    let kind = sema.compiler().ast().kind(node);
    match kind {
        AstKind::IdentifierExpr => identifier_post(sema, ctx, node),
        AstKind::ParenExpr { expr } => {
            sema.set_substitute(node, sema.compiler().ast().resolve(expr));
            Flow::Continue
        }
        AstKind::UnaryExpr { expr } => unary_post(sema, ctx, node, expr),
        AstKind::BinaryExpr { left, right } => binary_post(sema, ctx, node, left, right),
        AstKind::LogicalExpr { left, right } => logical_post(sema, ctx, node, left, right),
        AstKind::RelationalExpr { left, right } => relational_post(sema, ctx, node, left, right),
        AstKind::CastExpr { type_node, expr } => cast_post(sema, ctx, node, type_node, expr),
        AstKind::CallExpr { callee, args } => call_post(sema, ctx, node, callee, args),
        AstKind::IntrinsicExpr { args } => intrinsic_post(sema, ctx, node, args),
        AstKind::AggregateLiteral { children } => aggregate_literal_post(sema, ctx, node, children),

        AstKind::TypeExpr { kind } => type_expr_post(sema, ctx, node, kind),
        AstKind::PointerType { elem } => wrap_type_post(sema, ctx, node, elem, WrapType::Pointer),
        AstKind::SliceType { elem } => wrap_type_post(sema, ctx, node, elem, WrapType::Slice),
        AstKind::ArrayType { dim, elem } => array_type_post(sema, ctx, node, dim, elem),

        AstKind::VarDecl {
            is_const,
            type_node,
            init,
        } => var_decl_post(sema, ctx, node, is_const, type_node, init),
        AstKind::ParamDecl { type_node } => param_decl_post(sema, ctx, node, type_node),
        AstKind::FuncDecl { body, .. } => func_decl_post(sema, ctx, node, body),
        AstKind::StructDecl { members } => {
            aggregate_decl_post(sema, ctx, node, members, AggregateKind::Struct)
        }
        AstKind::UnionDecl { members } => {
            aggregate_decl_post(sema, ctx, node, members, AggregateKind::Union)
        }
        AstKind::EnumDecl {
            underlying, values, ..
        } => enum_decl_post(sema, ctx, node, underlying, values),
        AstKind::InterfaceDecl { .. } | AstKind::ImplDecl { .. } => {
            complete_simple_decl(sema, node)
        }
        AstKind::AliasDecl { target } => alias_decl_post(sema, ctx, node, target),

        AstKind::IfStmt { cond, .. }
        | AstKind::WhileStmt { cond, .. } => condition_check(sema, ctx, cond),
        AstKind::ForStmt { cond, .. } => {
            if cond.is_valid() {
                condition_check(sema, ctx, cond)
            } else {
                Flow::Continue
            }
        }
        AstKind::ForeachStmt { expr, .. } => error::check_is_value_expr(sema, ctx, expr),
        AstKind::ReturnStmt { expr } => return_post(sema, ctx, node, expr),

        AstKind::CompilerIf { .. } => directive::compiler_if_post(sema, ctx, node),
        AstKind::CompilerDiagnostic { .. } => directive::diagnostic_post(sema, ctx, node),
        AstKind::CompilerDefined => directive::defined_post(sema, ctx, node),
        AstKind::CompilerLiteral => directive::literal_post(sema, ctx, node),

        _ => Flow::Continue,
    }
}

// ------------------------------------------------------------- identifiers

fn identifier_post(sema: &mut Sema, ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
    // Already annotated: resumed after the value arrived, or a second run.
    let sem = sema.compiler().ast().sema(node);
    if sem.has_constant() || sem.has_type() || sem.has_symbol() || sem.has_substitute() {
        return Flow::Continue;
    }

    let id = sema.intern_node_name(node);
    let (candidates, saw_ignored) = sema.lookup(id);
    if candidates.is_empty() {
        if saw_ignored {
            // Withdrawn symbol: dismiss silently, cascade suppressed.
            ctx.silent = true;
            return Flow::Stop;
        }
        return sema.wait_identifier(ctx, id, node);
    }
    if candidates.len() > 1 {
        let all_functions = candidates
            .iter()
            .all(|&s| sema.compiler().symbol(s).kind() == SymbolKind::Function);
        if !all_functions {
            // Same-named symbols can only coexist while compiler-if
            // branches are undecided; wait for withdrawal to settle the
            // set. A set that never settles surfaces at the fixed point.
            return sema.wait_identifier(ctx, id, node);
        }
    }

    let sym = candidates[0];
    let symbol = sema.compiler().symbol(sym);
    match symbol.kind() {
        SymbolKind::Variable => {
            crate::flow_verify!(sema.wait_symbol_at_least(ctx, sym, SymbolState::Typed, node));
            let symbol = sema.compiler().symbol(sym);
            let cst = symbol.cst_ref();
            if cst.is_valid() {
                sema.set_constant(node, cst);
            } else {
                sema.set_type(node, symbol.type_ref());
                sema.compiler()
                    .ast()
                    .add_sema_flags(node, NodeSemaFlags::LVALUE);
            }
            Flow::Continue
        }
        SymbolKind::Function | SymbolKind::Namespace | SymbolKind::Module => {
            sema.set_symbol(node, sym);
            Flow::Continue
        }
        SymbolKind::Struct
        | SymbolKind::Union
        | SymbolKind::Enum
        | SymbolKind::Interface
        | SymbolKind::Alias => {
            crate::flow_verify!(sema.wait_symbol_at_least(ctx, sym, SymbolState::Typed, node));
            let type_ref = sema.compiler().symbol(sym).type_ref();
            let cst = sema
                .compiler()
                .constants()
                .add(ConstantValue::TypeValue(type_ref));
            sema.set_constant(node, cst);
            Flow::Continue
        }
    }
}

// ------------------------------------------------------------- expressions

/// The wrapped type of a type expression, when resolved.
fn type_value_of(sema: &Sema, node: AstNodeRef) -> Option<TypeRef> {
    let view = sema.view_of(node);
    if view.cst.is_invalid() {
        return None;
    }
    match sema.compiler().constants().get(view.cst) {
        ConstantValue::TypeValue(t) => Some(t),
        _ => None,
    }
}

fn emit_cast_failure(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    failure: CastFailure,
) -> Flow {
    let types = sema.compiler().types();
    let mut diag = error::report_at_node(sema, failure.diag_id, node);
    match failure.diag_id {
        DiagnosticId::SemaErrLiteralOverflow => {
            diag.add_argument(DiagArg::Type, types.name(failure.dst));
            diag.add_argument(DiagArg::Value, failure.value);
        }
        _ => {
            diag.add_argument(DiagArg::Type, types.name(failure.src));
            diag.add_argument(DiagArg::RequestedType, types.name(failure.dst));
            if !failure.value.is_empty() {
                diag.add_argument(DiagArg::Value, failure.value);
            }
        }
    }
    error::raise(sema, ctx, diag, node)
}

fn modifier_cast_flags(mods: ModifierFlags) -> CastFlags {
    let mut flags = CastFlags::empty();
    if mods.contains(ModifierFlags::WRAP) {
        flags |= CastFlags::NO_OVERFLOW;
    }
    if mods.contains(ModifierFlags::BIT) {
        flags |= CastFlags::BIT_CAST;
    }
    if mods.contains(ModifierFlags::UN_CONST) {
        flags |= CastFlags::UN_CONST;
    }
    flags
}

fn unary_post(sema: &mut Sema, ctx: &mut TaskContext, node: AstNodeRef, expr: AstNodeRef) -> Flow {
    crate::flow_verify!(error::check_is_value_expr(sema, ctx, expr));
    let view = sema.view_of(expr);
    let op = sema.token_id(node);
    let types = sema.compiler().types();
    let type_info = types.get(TypeInfo::unalias(types, view.type_ref));

    match op {
        TokenId::SymMinus => {
            if !type_info.is_scalar_numeric() {
                return error::raise_binary_operand_type(sema, ctx, node, expr, view.type_ref);
            }
            if view.cst.is_valid() {
                let value = sema.compiler().constants().get(view.cst);
                let folded = match value {
                    ConstantValue::Int { bits, v, .. } => {
                        let (neg, overflow) = IntValue { v, signed: true }.neg();
                        if overflow && bits != 0 {
                            return error::raise_at_node(
                                sema,
                                ctx,
                                DiagnosticId::SemaErrIntegerOverflow,
                                node,
                            );
                        }
                        if overflow {
                            return error::raise_at_node(
                                sema,
                                ctx,
                                DiagnosticId::SemaErrNumberTooBig,
                                node,
                            );
                        }
                        ConstantValue::make_int(neg, bits, Sign::Signed)
                    }
                    ConstantValue::Float { bits, repr } => {
                        ConstantValue::make_float(-f64::from_bits(repr), bits)
                    }
                    _ => return error::raise_internal(sema, ctx, node),
                };
                let cst = sema.compiler().constants().add(folded);
                sema.set_constant(node, cst);
            } else {
                sema.set_type(node, view.type_ref);
            }
            Flow::Continue
        }
        TokenId::KwdNot => bool_not(sema, ctx, node, expr, view),
        TokenId::SymTilde => {
            if !type_info.is_int() {
                return error::raise_binary_operand_type(sema, ctx, node, expr, view.type_ref);
            }
            if view.cst.is_valid() {
                let value = sema.compiler().constants().get(view.cst);
                if let ConstantValue::Int { bits, sign, v } = value {
                    let inverted = IntValue {
                        v,
                        signed: sign == Sign::Signed,
                    }
                    .bit_not()
                    .normalize_to(bits, sign == Sign::Signed);
                    let cst = sema
                        .compiler()
                        .constants()
                        .add(ConstantValue::make_int(inverted, bits, sign));
                    sema.set_constant(node, cst);
                    return Flow::Continue;
                }
                return error::raise_internal(sema, ctx, node);
            }
            sema.set_type(node, view.type_ref);
            Flow::Continue
        }
        _ => error::raise_internal(sema, ctx, node),
    }
}

fn bool_not(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    expr: AstNodeRef,
    view: NodeView,
) -> Flow {
    let ty_bool = sema.compiler().types().ty_bool();
    if view.cst.is_valid() {
        let value = sema.compiler().constants().get(view.cst);
        if !value.is_bool() {
            return error::raise_invalid_type(sema, ctx, expr, view.type_ref, ty_bool);
        }
        let cst = sema.compiler().constants().cst_bool(!value.get_bool());
        sema.set_constant(node, cst);
        return Flow::Continue;
    }
    if view.type_ref != ty_bool {
        return error::raise_invalid_type(sema, ctx, expr, view.type_ref, ty_bool);
    }
    sema.set_type(node, ty_bool);
    Flow::Continue
}

/// Converts an enum-typed operand view to its underlying type, unwrapping
/// enum-value constants.
fn convert_enum_to_underlying(sema: &Sema, view: &mut NodeView) {
    let types = sema.compiler().types();
    if let TypeInfo::Enum { underlying, .. } = types.get(TypeInfo::unalias(types, view.type_ref)) {
        view.type_ref = underlying;
        if view.cst.is_valid() {
            if let ConstantValue::EnumValue { value, .. } = sema.compiler().constants().get(view.cst)
            {
                view.cst = value;
            }
        }
    }
}

struct BinOp {
    arith: bool,
    bitwise: bool,
    shift: bool,
    concat: bool,
}

fn classify_op(op: TokenId) -> Option<BinOp> {
    let mut cls = BinOp {
        arith: false,
        bitwise: false,
        shift: false,
        concat: false,
    };
    match op {
        TokenId::SymPlus | TokenId::SymMinus | TokenId::SymAsterisk | TokenId::SymSlash
        | TokenId::SymPercent => cls.arith = true,
        TokenId::SymAmpersand | TokenId::SymPipe | TokenId::SymCircumflex => cls.bitwise = true,
        TokenId::SymGreaterGreater | TokenId::SymLowerLower => cls.shift = true,
        TokenId::SymPlusPlus => cls.concat = true,
        _ => return None,
    }
    Some(cls)
}

fn binary_post(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    left: AstNodeRef,
    right: AstNodeRef,
) -> Flow {
    crate::flow_verify!(error::check_is_value_expr(sema, ctx, left));
    crate::flow_verify!(error::check_is_value_expr(sema, ctx, right));
    sema.compiler()
        .ast()
        .add_sema_flags(node, NodeSemaFlags::VALUE_EXPR);

    let op = sema.token_id(node);
    let Some(cls) = classify_op(op) else {
        return error::raise_internal(sema, ctx, node);
    };
    let mods = sema.compiler().ast().base(node).modifiers;

    // `++` concatenation folds constants to a string.
    if cls.concat {
        crate::flow_verify!(error::check_modifiers(
            sema,
            ctx,
            node,
            mods,
            ModifierFlags::empty()
        ));
        crate::flow_verify!(error::check_is_constant(sema, ctx, left));
        crate::flow_verify!(error::check_is_constant(sema, ctx, right));
        let constants = sema.compiler().constants();
        let mut text = constants.get(sema.view_of(left).cst).to_display_string(constants);
        text.push_str(&constants.get(sema.view_of(right).cst).to_display_string(constants));
        let cst = constants.add(ConstantValue::make_string(&text));
        sema.set_constant(node, cst);
        return Flow::Continue;
    }

    let mut left_view = sema.view_of(left);
    let mut right_view = sema.view_of(right);
    let compiler = sema.compiler().clone();
    let types = compiler.types();

    // Enum operands: `| & ^` need the flags capability; arithmetic and
    // shifts convert to the underlying type.
    for (view, other_node) in [(&mut left_view, left), (&mut right_view, right)] {
        let resolved = TypeInfo::unalias(types, view.type_ref);
        if let TypeInfo::Enum { sym, .. } = types.get(resolved) {
            if cls.bitwise && !sema.compiler().symbol(sym).is_enum_flags() {
                let mut diag =
                    error::report_at_node(sema, DiagnosticId::SemaErrInvalidOpEnum, node);
                diag.add_argument(DiagArg::Type, sema.compiler().types().name(view.type_ref));
                diag.add_span(sema.compiler().node_location(other_node));
                return error::raise(sema, ctx, diag, node);
            }
            convert_enum_to_underlying(sema, view);
        }
    }

    // Modifier legality per operator family.
    let allowed = match op {
        TokenId::SymSlash | TokenId::SymPercent => ModifierFlags::PROMOTE,
        TokenId::SymPlus | TokenId::SymMinus | TokenId::SymAsterisk => {
            ModifierFlags::WRAP | ModifierFlags::PROMOTE
        }
        _ => ModifierFlags::empty(),
    };
    crate::flow_verify!(error::check_modifiers(sema, ctx, node, mods, allowed));

    let left_info = types.get(TypeInfo::unalias(types, left_view.type_ref));
    let right_info = types.get(TypeInfo::unalias(types, right_view.type_ref));

    // Pointer arithmetic carveouts.
    if cls.arith && (left_info.is_pointer() || right_info.is_pointer()) {
        return pointer_arith(sema, ctx, node, op, &left_view, &right_view);
    }

    // Operand domains.
    if cls.arith {
        if !left_info.is_scalar_numeric() {
            return error::raise_binary_operand_type(sema, ctx, node, left, left_view.type_ref);
        }
        if !right_info.is_scalar_numeric() {
            return error::raise_binary_operand_type(sema, ctx, node, right, right_view.type_ref);
        }
    } else if cls.bitwise || cls.shift {
        if !left_info.is_int() {
            return error::raise_binary_operand_type(sema, ctx, node, left, left_view.type_ref);
        }
        if !right_info.is_int() {
            return error::raise_binary_operand_type(sema, ctx, node, right, right_view.type_ref);
        }
    }

    // Wrap/promote only make sense on integers.
    if mods.intersects(ModifierFlags::WRAP | ModifierFlags::PROMOTE) && !left_info.is_int() {
        let base = sema.compiler().ast().base(node);
        let view = sema.compiler().view(base.src_view);
        let mdf = view.find_right_from(
            base.tok,
            &[TokenId::ModifierWrap, TokenId::ModifierPromote],
        );
        let mut diag = error::report_at_token(
            sema,
            DiagnosticId::SemaErrModifierOnlyInteger,
            base.src_view,
            mdf,
        );
        diag.add_argument(DiagArg::Type, types.name(left_view.type_ref));
        return error::raise(sema, ctx, diag, node);
    }

    // Division and modulo by a constant zero.
    if matches!(op, TokenId::SymSlash | TokenId::SymPercent) && right_view.cst.is_valid() {
        let rhs = sema.compiler().constants().get(right_view.cst);
        let zero = match &rhs {
            ConstantValue::Int { v, .. } => *v == 0,
            ConstantValue::Float { repr, .. } => f64::from_bits(*repr) == 0.0,
            _ => false,
        };
        if zero {
            return error::raise_div_zero(sema, ctx, node, right, left_view.type_ref);
        }
    }

    let Some(promoted) = types.promote(left_view.type_ref, right_view.type_ref) else {
        return error::raise_binary_operand_type(sema, ctx, node, right, right_view.type_ref);
    };

    // Constant folding when both sides are known.
    if left_view.cst.is_valid() && right_view.cst.is_valid() {
        return fold_binary(sema, ctx, node, op, mods, promoted, left_view, right_view);
    }

    sema.set_type(node, promoted);
    Flow::Continue
}

fn pointer_arith(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    op: TokenId,
    left_view: &NodeView,
    right_view: &NodeView,
) -> Flow {
    let types = sema.compiler().types();
    let left_info = types.get(TypeInfo::unalias(types, left_view.type_ref));
    let right_info = types.get(TypeInfo::unalias(types, right_view.type_ref));

    let result = match (op, left_info.is_pointer(), right_info.is_pointer()) {
        // ptr + int, int + ptr, ptr - int keep the pointer type.
        (TokenId::SymPlus, true, false) if right_info.is_int() => Some(left_view.type_ref),
        (TokenId::SymPlus, false, true) if left_info.is_int() => Some(right_view.type_ref),
        (TokenId::SymMinus, true, false) if right_info.is_int() => Some(left_view.type_ref),
        // ptr - ptr yields s64.
        (TokenId::SymMinus, true, true) => Some(types.ty_int(64, Sign::Signed)),
        _ => None,
    };

    match result {
        Some(type_ref) => {
            sema.set_type(node, type_ref);
            Flow::Continue
        }
        None => error::raise_binary_operand_type(
            sema,
            ctx,
            node,
            node,
            if left_info.is_pointer() {
                right_view.type_ref
            } else {
                left_view.type_ref
            },
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn fold_binary(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    op: TokenId,
    mods: ModifierFlags,
    promoted: TypeRef,
    left_view: NodeView,
    right_view: NodeView,
) -> Flow {
    let compiler = sema.compiler().clone();
    let types = compiler.types();
    let constants = compiler.constants();

    // Bring both constants to the promoted type.
    let mut cast_ctx = CastContext::new(CastKind::Promotion).with_flags(modifier_cast_flags(mods));
    let Some(lhs) = cast_constant(&compiler, &mut cast_ctx, left_view.cst, promoted) else {
        let failure = cast_ctx.failure.take().expect("failure recorded");
        return emit_cast_failure(sema, ctx, node, failure);
    };
    let mut cast_ctx = CastContext::new(CastKind::Promotion).with_flags(modifier_cast_flags(mods));
    let Some(rhs) = cast_constant(&compiler, &mut cast_ctx, right_view.cst, promoted) else {
        let failure = cast_ctx.failure.take().expect("failure recorded");
        return emit_cast_failure(sema, ctx, node, failure);
    };

    let promoted_info = types.get(promoted);

    if promoted_info.is_float() {
        let a = constants.get(lhs).get_float();
        let b = constants.get(rhs).get_float();
        let value = match op {
            TokenId::SymPlus => a + b,
            TokenId::SymMinus => a - b,
            TokenId::SymAsterisk => a * b,
            TokenId::SymSlash => a / b,
            _ => return error::raise_internal(sema, ctx, node),
        };
        let cst = constants.add(if promoted_info.float_bits() == 0 {
            ConstantValue::make_float_unsized(value)
        } else {
            ConstantValue::make_float(value, promoted_info.float_bits())
        });
        sema.set_constant(node, cst);
        return Flow::Continue;
    }

    if !promoted_info.is_int() {
        return error::raise_internal(sema, ctx, node);
    }

    let bits = promoted_info.int_bits();
    let sign = promoted_info.int_sign();
    let wrap = mods.contains(ModifierFlags::WRAP);
    // Unsized literal arithmetic is signed.
    let signed = sign == Sign::Signed || bits == 0;

    let mut a = constants.get(lhs).get_int();
    let mut b = constants.get(rhs).get_int();
    a.signed = signed;
    b.signed = signed;

    let (value, mut overflow) = match op {
        TokenId::SymPlus => a.add(b),
        TokenId::SymMinus => a.sub(b),
        TokenId::SymAsterisk => a.mul(b),
        TokenId::SymSlash => a.div(b),
        TokenId::SymPercent => a.rem(b),
        TokenId::SymAmpersand => (a.bit_and(b), false),
        TokenId::SymPipe => (a.bit_or(b), false),
        TokenId::SymCircumflex => (a.bit_xor(b), false),
        TokenId::SymGreaterGreater | TokenId::SymLowerLower => {
            if b.is_negative() {
                let mut diag =
                    error::report_at_node(sema, DiagnosticId::SemaErrNegativeShift, node);
                diag.add_argument(
                    DiagArg::Right,
                    constants.get(rhs).to_display_string(constants),
                );
                return error::raise(sema, ctx, diag, node);
            }
            if op == TokenId::SymGreaterGreater {
                a.shr(b.v)
            } else {
                a.shl(b.v)
            }
        }
        _ => return error::raise_internal(sema, ctx, node),
    };

    // Result must also fit the promoted width.
    if !overflow && bits != 0 && !value.fits(bits, signed) {
        overflow = true;
    }

    if overflow && bits != 0 && !wrap {
        let mut diag = error::report_at_node(sema, DiagnosticId::SemaErrIntegerOverflow, node);
        diag.add_argument(DiagArg::Type, types.name(promoted));
        diag.add_argument(DiagArg::Left, constants.get(lhs).to_display_string(constants));
        diag.add_argument(DiagArg::Right, constants.get(rhs).to_display_string(constants));
        return error::raise(sema, ctx, diag, node);
    }

    let value = value.normalize_to(bits, signed);
    let cst = constants.add(if bits == 0 {
        ConstantValue::make_int_unsized(value, sign)
    } else {
        ConstantValue::make_int(value, bits, sign)
    });
    sema.set_constant(node, cst);
    Flow::Continue
}

fn logical_post(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    left: AstNodeRef,
    right: AstNodeRef,
) -> Flow {
    crate::flow_verify!(error::check_is_value_expr(sema, ctx, left));
    crate::flow_verify!(error::check_is_value_expr(sema, ctx, right));

    let ty_bool = sema.compiler().types().ty_bool();
    for operand in [left, right] {
        let view = sema.view_of(operand);
        if view.cst.is_valid() {
            if !sema.compiler().constants().get(view.cst).is_bool() {
                return error::raise_invalid_type(sema, ctx, operand, view.type_ref, ty_bool);
            }
        } else if view.type_ref != ty_bool {
            return error::raise_invalid_type(sema, ctx, operand, view.type_ref, ty_bool);
        }
    }

    let left_view = sema.view_of(left);
    let right_view = sema.view_of(right);
    if left_view.cst.is_valid() && right_view.cst.is_valid() {
        let constants = sema.compiler().constants();
        let a = constants.get(left_view.cst).get_bool();
        let b = constants.get(right_view.cst).get_bool();
        let value = match sema.token_id(node) {
            TokenId::KwdAnd => a && b,
            TokenId::KwdOr => a || b,
            _ => return error::raise_internal(sema, ctx, node),
        };
        let cst = constants.cst_bool(value);
        sema.set_constant(node, cst);
        return Flow::Continue;
    }

    sema.set_type(node, ty_bool);
    Flow::Continue
}

fn relational_post(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    left: AstNodeRef,
    right: AstNodeRef,
) -> Flow {
    crate::flow_verify!(error::check_is_value_expr(sema, ctx, left));
    crate::flow_verify!(error::check_is_value_expr(sema, ctx, right));

    let op = sema.token_id(node);
    let equality = matches!(op, TokenId::SymEqualEqual | TokenId::SymBangEqual);

    let mut left_view = sema.view_of(left);
    let mut right_view = sema.view_of(right);
    convert_enum_to_underlying(sema, &mut left_view);
    convert_enum_to_underlying(sema, &mut right_view);

    let compiler = sema.compiler().clone();
    let types = compiler.types();
    let constants = compiler.constants();

    if left_view.cst.is_valid() && right_view.cst.is_valid() {
        let a = constants.get(left_view.cst);
        let b = constants.get(right_view.cst);

        // Same-kind non-numeric equality.
        if equality && !a.is_int() && !a.is_float() {
            let value = match op {
                TokenId::SymEqualEqual => a == b,
                _ => a != b,
            };
            let cst = constants.cst_bool(value);
            sema.set_constant(node, cst);
            return Flow::Continue;
        }

        let Some(promoted) = types.promote(left_view.type_ref, right_view.type_ref) else {
            return error::raise_binary_operand_type(sema, ctx, node, right, right_view.type_ref);
        };
        let mut cast_ctx = CastContext::new(CastKind::Promotion);
        let Some(lhs) = cast_constant(&compiler, &mut cast_ctx, left_view.cst, promoted) else {
            let failure = cast_ctx.failure.take().expect("failure recorded");
            return emit_cast_failure(sema, ctx, node, failure);
        };
        let mut cast_ctx = CastContext::new(CastKind::Promotion);
        let Some(rhs) = cast_constant(&compiler, &mut cast_ctx, right_view.cst, promoted) else {
            let failure = cast_ctx.failure.take().expect("failure recorded");
            return emit_cast_failure(sema, ctx, node, failure);
        };

        let promoted_info = types.get(promoted);
        let ordering = if promoted_info.is_float() {
            constants
                .get(lhs)
                .get_float()
                .partial_cmp(&constants.get(rhs).get_float())
        } else {
            let signed =
                promoted_info.int_sign() == Sign::Signed || promoted_info.int_bits() == 0;
            let a = constants.get(lhs).get_int();
            let b = constants.get(rhs).get_int();
            Some(if signed {
                (a.v as i64).cmp(&(b.v as i64))
            } else {
                a.v.cmp(&b.v)
            })
        };
        let Some(ordering) = ordering else {
            let cst = constants.cst_bool(op == TokenId::SymBangEqual);
            sema.set_constant(node, cst);
            return Flow::Continue;
        };

        let value = match op {
            TokenId::SymEqualEqual => ordering.is_eq(),
            TokenId::SymBangEqual => !ordering.is_eq(),
            TokenId::SymLower => ordering.is_lt(),
            TokenId::SymLowerEqual => ordering.is_le(),
            TokenId::SymGreater => ordering.is_gt(),
            TokenId::SymGreaterEqual => ordering.is_ge(),
            _ => return error::raise_internal(sema, ctx, node),
        };
        let cst = constants.cst_bool(value);
        sema.set_constant(node, cst);
        return Flow::Continue;
    }

    // Non-constant comparison: the operands must share a promotion.
    if types.promote(left_view.type_ref, right_view.type_ref).is_none()
        && !(equality && left_view.type_ref == right_view.type_ref)
    {
        return error::raise_binary_operand_type(sema, ctx, node, right, right_view.type_ref);
    }
    sema.set_type(node, types.ty_bool());
    Flow::Continue
}

fn cast_post(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    type_node: AstNodeRef,
    expr: AstNodeRef,
) -> Flow {
    let Some(dst) = type_value_of(sema, type_node) else {
        return error::raise_at_node(sema, ctx, DiagnosticId::SynErrExpectedType, type_node);
    };
    crate::flow_verify!(error::check_is_value_expr(sema, ctx, expr));

    let compiler = sema.compiler().clone();
    let mods = compiler.ast().base(node).modifiers;
    let view = sema.view_of(expr);

    if view.cst.is_valid() {
        let mut cast_ctx = CastContext::new(CastKind::Explicit)
            .with_flags(modifier_cast_flags(mods))
            .with_constant(view.cst);
        match cast_constant(&compiler, &mut cast_ctx, view.cst, dst) {
            Some(out) => {
                sema.set_constant(node, out);
                Flow::Continue
            }
            None => {
                let failure = cast_ctx.failure.take().expect("failure recorded");
                emit_cast_failure(sema, ctx, node, failure)
            }
        }
    } else {
        let mut cast_ctx = CastContext::new(CastKind::Explicit).with_flags(modifier_cast_flags(mods));
        match cast_allowed(&compiler, &mut cast_ctx, view.type_ref, dst) {
            CastQuery::Ok | CastQuery::RequiresConstCheck => {
                sema.set_type(node, dst);
                Flow::Continue
            }
            CastQuery::Fail => {
                let failure = cast_ctx.failure.take().expect("failure recorded");
                emit_cast_failure(sema, ctx, node, failure)
            }
        }
    }
}

fn call_post(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    callee: AstNodeRef,
    args: crate::core::SpanRef,
) -> Flow {
    let callee_view = sema.view_of(callee);
    if callee_view.sym.is_invalid() {
        return error::raise_at_node(sema, ctx, DiagnosticId::SemaErrNotCallable, callee);
    }
    let callee_sym = callee_view.sym;
    let symbol = sema.compiler().symbol(callee_sym);
    if symbol.kind() != SymbolKind::Function {
        return error::raise_at_node(sema, ctx, DiagnosticId::SemaErrNotCallable, callee);
    }

    crate::flow_verify!(sema.wait_symbol_at_least(ctx, callee_sym, SymbolState::Typed, node));

    let compiler = sema.compiler().clone();
    let types = compiler.types();
    let fn_type = compiler.symbol(callee_sym).type_ref();
    let TypeInfo::Lambda { params, ret, .. } = types.get(fn_type) else {
        return error::raise_internal(sema, ctx, node);
    };

    let arg_nodes = compiler.ast().span(args);
    if arg_nodes.len() != params.len() {
        let mut diag = error::report_at_node(sema, DiagnosticId::SemaErrArgumentCount, node);
        diag.add_argument(DiagArg::Value, arg_nodes.len().to_string());
        diag.add_argument(DiagArg::RequestedType, params.len().to_string());
        return error::raise(sema, ctx, diag, node);
    }

    for (arg, &param) in arg_nodes.iter().zip(params.iter()) {
        crate::flow_verify!(error::check_is_value_expr(sema, ctx, *arg));
        let arg_view = sema.view_of(*arg);
        if arg_view.cst.is_valid() {
            let mut cast_ctx = CastContext::new(CastKind::Parameter).with_constant(arg_view.cst);
            if cast_constant(&compiler, &mut cast_ctx, arg_view.cst, param).is_none() {
                let failure = cast_ctx.failure.take().expect("failure recorded");
                return emit_cast_failure(sema, ctx, *arg, failure);
            }
        } else {
            let mut cast_ctx = CastContext::new(CastKind::Parameter);
            if cast_allowed(&compiler, &mut cast_ctx, arg_view.type_ref, param) == CastQuery::Fail {
                let failure = cast_ctx.failure.take().expect("failure recorded");
                return emit_cast_failure(sema, ctx, *arg, failure);
            }
        }
    }

    // Record the call edge for codegen scheduling.
    let owner = sema.frame().owner;
    if owner.is_valid() && compiler.symbol(owner).kind() == SymbolKind::Function {
        compiler.symbol(owner).add_call_dependency(callee_sym);
    }

    sema.set_type(node, ret);
    Flow::Continue
}

fn intrinsic_post(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    args: crate::core::SpanRef,
) -> Flow {
    let arg_nodes = sema.compiler().ast().span(args);
    let Some(&arg) = arg_nodes.first() else {
        return error::raise_internal(sema, ctx, node);
    };
    let types = sema.compiler().types();

    match sema.token_id(node) {
        TokenId::IntrinsicSizeOf => {
            let target = match type_value_of(sema, arg) {
                Some(t) => t,
                None => sema.view_of(arg).type_ref,
            };
            if target.is_invalid() {
                return error::raise_at_node(sema, ctx, DiagnosticId::SynErrExpectedType, arg);
            }
            let ty_u64 = types.ty_int(64, Sign::Unsigned);
            let Some(size) = types.get(TypeInfo::unalias(types, target)).byte_size(types) else {
                return error::raise_invalid_type(sema, ctx, arg, target, ty_u64);
            };
            let cst = sema.compiler().constants().add(ConstantValue::make_int_unsized(
                IntValue::unsigned(size),
                Sign::Unsigned,
            ));
            sema.set_constant(node, cst);
            Flow::Continue
        }
        TokenId::IntrinsicCountOf => {
            let count = match type_value_of(sema, arg) {
                Some(t) => match types.get(TypeInfo::unalias(types, t)) {
                    TypeInfo::Array { dim, .. } => Some(dim as u64),
                    TypeInfo::Aggregate { members, .. } => Some(members.len() as u64),
                    TypeInfo::Enum { sym, .. } => {
                        let map = sema.compiler().symbol(sym).sym_map();
                        map.map(|m| m.read().len() as u64)
                    }
                    _ => None,
                },
                None => {
                    let view = sema.view_of(arg);
                    if view.cst.is_valid() {
                        match sema.compiler().constants().get(view.cst) {
                            ConstantValue::Aggregate { members, .. } => Some(members.len() as u64),
                            ConstantValue::Str(s) => Some(s.len() as u64),
                            _ => None,
                        }
                    } else {
                        None
                    }
                }
            };
            let Some(count) = count else {
                return error::raise_at_node(sema, ctx, DiagnosticId::SemaErrInvalidType, arg);
            };
            let cst = sema.compiler().constants().add(ConstantValue::make_int_unsized(
                IntValue::unsigned(count),
                Sign::Unsigned,
            ));
            sema.set_constant(node, cst);
            Flow::Continue
        }
        _ => error::raise_internal(sema, ctx, node),
    }
}

fn aggregate_literal_post(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    children: crate::core::SpanRef,
) -> Flow {
    let child_nodes = sema.compiler().ast().span(children);
    let mut member_csts: SmallVec<[ConstantRef; 8]> = SmallVec::new();
    let mut member_types: SmallVec<[TypeRef; 8]> = SmallVec::new();
    let mut all_const = true;

    for &child in &child_nodes {
        crate::flow_verify!(error::check_is_value_expr(sema, ctx, child));
        let view = sema.view_of(child);
        if view.cst.is_valid() {
            // Concretize literal members so the aggregate type is stable.
            let Some(concrete) = concretize_constant(sema.compiler(), view.cst) else {
                return error::raise_at_node(sema, ctx, DiagnosticId::SemaErrLiteralTooBig, child);
            };
            member_csts.push(concrete);
            let value = sema.compiler().constants().get(concrete);
            member_types.push(value.type_of(sema.compiler().types()));
        } else {
            all_const = false;
            member_types.push(view.type_ref);
        }
    }

    let members: Box<[(crate::core::IdentifierRef, TypeRef)]> = member_types
        .iter()
        .map(|t| (crate::core::IdentifierRef::INVALID, *t))
        .collect();
    let agg_type = sema.compiler().types().add(TypeInfo::Aggregate {
        kind: AggregateKind::Struct,
        sym: SymbolRef::INVALID,
        members,
    });

    if all_const {
        let cst = sema.compiler().constants().add(ConstantValue::Aggregate {
            type_ref: agg_type,
            members: member_csts.into_iter().collect(),
        });
        sema.set_constant(node, cst);
    } else {
        sema.set_type(node, agg_type);
    }
    Flow::Continue
}

// ------------------------------------------------------------------- types

enum WrapType {
    Pointer,
    Slice,
}

fn type_expr_post(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    kind: TypeExprKind,
) -> Flow {
    let types = sema.compiler().types();
    let type_ref = match kind {
        TypeExprKind::Builtin => match sema.token_id(node) {
            TokenId::TypeS8 => types.ty_int(8, Sign::Signed),
            TokenId::TypeS16 => types.ty_int(16, Sign::Signed),
            TokenId::TypeS32 => types.ty_int(32, Sign::Signed),
            TokenId::TypeS64 => types.ty_int(64, Sign::Signed),
            TokenId::TypeU8 => types.ty_int(8, Sign::Unsigned),
            TokenId::TypeU16 => types.ty_int(16, Sign::Unsigned),
            TokenId::TypeU32 => types.ty_int(32, Sign::Unsigned),
            // `usize` is an alias of the widest unsigned integer.
            TokenId::TypeU64 | TokenId::TypeUSize => types.ty_int(64, Sign::Unsigned),
            TokenId::TypeF32 => types.ty_float(32),
            TokenId::TypeF64 => types.ty_float(64),
            TokenId::TypeBool => types.ty_bool(),
            TokenId::TypeString => types.ty_string(),
            TokenId::TypeChar => types.ty_char(),
            TokenId::TypeVoid => types.ty_void(),
            _ => return error::raise_internal(sema, ctx, node),
        },
        TypeExprKind::Named => {
            // Same resolution as an identifier in type position.
            return identifier_post(sema, ctx, node);
        }
    };

    let cst = sema
        .compiler()
        .constants()
        .add(ConstantValue::TypeValue(type_ref));
    sema.set_constant(node, cst);
    Flow::Continue
}

fn wrap_type_post(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    elem: AstNodeRef,
    wrap: WrapType,
) -> Flow {
    let Some(inner) = type_value_of(sema, elem) else {
        return error::raise_at_node(sema, ctx, DiagnosticId::SynErrExpectedType, elem);
    };
    let kind = match wrap {
        WrapType::Pointer => PointerKind::Value,
        WrapType::Slice => PointerKind::Slice,
    };
    let type_ref = sema
        .compiler()
        .types()
        .add(TypeInfo::Pointer { kind, elem: inner });
    let cst = sema
        .compiler()
        .constants()
        .add(ConstantValue::TypeValue(type_ref));
    sema.set_constant(node, cst);
    Flow::Continue
}

fn array_type_post(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    dim: AstNodeRef,
    elem: AstNodeRef,
) -> Flow {
    crate::flow_verify!(error::check_is_constant(sema, ctx, dim));
    let dim_view = sema.view_of(dim);
    let dim_value = sema.compiler().constants().get(dim_view.cst);
    let ConstantValue::Int { v, .. } = dim_value else {
        let ty_u64 = sema.compiler().types().ty_int(64, Sign::Unsigned);
        return error::raise_invalid_type(sema, ctx, dim, dim_view.type_ref, ty_u64);
    };
    let Some(inner) = type_value_of(sema, elem) else {
        return error::raise_at_node(sema, ctx, DiagnosticId::SynErrExpectedType, elem);
    };
    let type_ref = sema.compiler().types().add(TypeInfo::Array {
        dim: v as u32,
        elem: inner,
    });
    let cst = sema
        .compiler()
        .constants()
        .add(ConstantValue::TypeValue(type_ref));
    sema.set_constant(node, cst);
    Flow::Continue
}

// ------------------------------------------------------------ declarations

fn var_decl_post(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    is_const: bool,
    type_node: AstNodeRef,
    init: AstNodeRef,
) -> Flow {
    let sym = node_symbol(sema, node);
    if sym.is_invalid() {
        return error::raise_internal(sema, ctx, node);
    }
    let compiler = sema.compiler().clone();
    let symbol = compiler.symbol(sym);
    if symbol.is_ignored() || symbol.state() >= SymbolState::SemaCompleted {
        return Flow::Continue;
    }

    let declared = if type_node.is_valid() {
        match type_value_of(sema, type_node) {
            Some(t) => Some(t),
            None => {
                return error::raise_at_node(sema, ctx, DiagnosticId::SynErrExpectedType, type_node)
            }
        }
    } else {
        None
    };

    if init.is_invalid() {
        // A bare declaration needs an explicit type.
        let Some(declared) = declared else {
            return error::raise_at_node(sema, ctx, DiagnosticId::SynErrExpectedType, node);
        };
        symbol.set_type_ref(declared);
        compiler.transition(sym, SymbolState::Typed);
        compiler.transition(sym, SymbolState::SemaCompleted);
        return Flow::Continue;
    }

    crate::flow_verify!(error::check_is_value_expr(sema, ctx, init));
    let init_view = sema.view_of(init);

    if is_const && init_view.cst.is_invalid() {
        return error::raise_at_node(sema, ctx, DiagnosticId::SemaErrExprNotConst, init);
    }

    let mods = compiler.ast().base(node).modifiers;
    if init_view.cst.is_valid() {
        let final_cst = if let Some(declared) = declared {
            let mut cast_ctx = CastContext::new(CastKind::Initialization)
                .with_flags(modifier_cast_flags(mods))
                .with_constant(init_view.cst);
            cast_ctx.error_node = node;
            match cast_constant(&compiler, &mut cast_ctx, init_view.cst, declared) {
                Some(out) => out,
                None => {
                    let failure = cast_ctx.failure.take().expect("failure recorded");
                    return emit_cast_failure(sema, ctx, node, failure);
                }
            }
        } else {
            // Unsized literals pick their width from concretization.
            match concretize_constant(&compiler, init_view.cst) {
                Some(out) => out,
                None => {
                    return error::raise_at_node(sema, ctx, DiagnosticId::SemaErrLiteralTooBig, init)
                }
            }
        };
        let value = compiler.constants().get(final_cst);
        // Only constants fold into their uses; a `var` keeps just the type.
        if is_const {
            symbol.set_cst_ref(final_cst);
        }
        symbol.set_type_ref(value.type_of(compiler.types()));
    } else {
        let init_type = init_view.type_ref;
        if let Some(declared) = declared {
            let mut cast_ctx = CastContext::new(CastKind::Initialization)
                .with_flags(modifier_cast_flags(mods));
            if cast_allowed(&compiler, &mut cast_ctx, init_type, declared) == CastQuery::Fail {
                let failure = cast_ctx.failure.take().expect("failure recorded");
                return emit_cast_failure(sema, ctx, node, failure);
            }
            symbol.set_type_ref(declared);
        } else {
            symbol.set_type_ref(init_type);
        }
    }

    sema.set_symbol(node, sym);
    compiler.transition(sym, SymbolState::Typed);
    compiler.transition(sym, SymbolState::SemaCompleted);
    Flow::Continue
}

fn param_decl_post(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    type_node: AstNodeRef,
) -> Flow {
    if node_symbol(sema, node).is_valid() {
        return Flow::Continue;
    }
    let Some(param_type) = (if type_node.is_valid() {
        type_value_of(sema, type_node)
    } else {
        None
    }) else {
        return error::raise_at_node(sema, ctx, DiagnosticId::SynErrExpectedType, node);
    };

    let sym = match sema.declare_symbol(ctx, node, SymbolKind::Variable) {
        Ok(sym) => sym,
        Err(flow) => return flow,
    };
    let compiler = sema.compiler();
    compiler.symbol(sym).set_type_ref(param_type);
    compiler.transition(sym, SymbolState::Typed);
    compiler.transition(sym, SymbolState::SemaCompleted);
    Flow::Continue
}

fn func_decl_post(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    body: AstNodeRef,
) -> Flow {
    let sym = node_symbol(sema, node);
    if sym.is_invalid() {
        return error::raise_internal(sema, ctx, node);
    }
    let compiler = sema.compiler().clone();
    let symbol = compiler.symbol(sym);
    if symbol.is_ignored() || symbol.state() >= SymbolState::SemaCompleted {
        return Flow::Continue;
    }

    // Bodyless functions (interfaces) still get typed here.
    if symbol.state() < SymbolState::Typed {
        let span = match compiler.ast().kind(node) {
            AstKind::FuncDecl { params, ret_type, .. } => (params, ret_type),
            _ => return error::raise_internal(sema, ctx, node),
        };
        crate::flow_verify!(func_body_pre(sema, ctx, node, span.0, span.1));
    }

    // Normalized ABI signature from the lambda type.
    let types = compiler.types();
    let symbol = compiler.symbol(sym);
    if let TypeInfo::Lambda { params, ret, .. } = types.get(symbol.type_ref()) {
        let param_names: Vec<String> = params.iter().map(|p| types.name(*p)).collect();
        symbol.set_abi_signature(format!("fn({}) -> {}", param_names.join(", "), types.name(ret)));
    }

    compiler.transition(sym, SymbolState::SemaCompleted);

    // Build command: hand the function off to code generation.
    if compiler.command() == crate::compiler::Command::Build
        && body.is_valid()
        && symbol.try_mark_codegen_scheduled()
    {
        let job = crate::codegen::CodeGenJob::new(compiler.clone(), sym, node, sema.file());
        compiler.jobs().enqueue(
            Box::new(job),
            crate::jobs::JobPriority::Normal,
            compiler.client(),
        );
    }
    Flow::Continue
}

fn aggregate_decl_post(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    members: crate::core::SpanRef,
    agg_kind: AggregateKind,
) -> Flow {
    let sym = node_symbol(sema, node);
    if sym.is_invalid() {
        return error::raise_internal(sema, ctx, node);
    }
    let compiler = sema.compiler().clone();
    let symbol = compiler.symbol(sym);
    if symbol.is_ignored() || symbol.state() >= SymbolState::SemaCompleted {
        return Flow::Continue;
    }

    let mut fields: Vec<(crate::core::IdentifierRef, TypeRef)> = Vec::new();
    for member in compiler.ast().span(members) {
        let member_sym = node_symbol(sema, member);
        if member_sym.is_invalid() {
            continue;
        }
        let member_symbol = compiler.symbol(member_sym);
        fields.push((member_symbol.name(), member_symbol.type_ref()));
    }

    let type_ref = compiler.types().add(TypeInfo::Aggregate {
        kind: agg_kind,
        sym,
        members: fields.into_boxed_slice(),
    });
    symbol.set_type_ref(type_ref);
    compiler.transition(sym, SymbolState::Typed);
    compiler.transition(sym, SymbolState::SemaCompleted);
    Flow::Continue
}

fn enum_decl_post(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    underlying: AstNodeRef,
    values: crate::core::SpanRef,
) -> Flow {
    let sym = node_symbol(sema, node);
    if sym.is_invalid() {
        return error::raise_internal(sema, ctx, node);
    }
    let compiler = sema.compiler().clone();
    let symbol = compiler.symbol(sym);
    if symbol.is_ignored() || symbol.state() >= SymbolState::SemaCompleted {
        return Flow::Continue;
    }

    let types = compiler.types();
    let underlying_type = if underlying.is_valid() {
        match type_value_of(sema, underlying) {
            Some(t) => t,
            None => {
                return error::raise_at_node(sema, ctx, DiagnosticId::SynErrExpectedType, underlying)
            }
        }
    } else {
        types.ty_int(32, Sign::Signed)
    };

    let enum_type = types.add(TypeInfo::Enum {
        sym,
        underlying: underlying_type,
    });
    symbol.set_type_ref(enum_type);
    compiler.transition(sym, SymbolState::Typed);

    // Enum values: explicit initializer or previous + 1.
    let mut next = IntValue::unsigned(0);
    for value_node in compiler.ast().span(values) {
        let (init_cst, value_int) = match compiler.ast().kind(value_node) {
            AstKind::EnumValueDecl { init } if init.is_valid() => {
                crate::flow_verify!(error::check_is_constant(sema, ctx, init));
                let view = sema.view_of(init);
                let mut cast_ctx =
                    CastContext::new(CastKind::Initialization).with_constant(view.cst);
                match cast_constant(&compiler, &mut cast_ctx, view.cst, underlying_type) {
                    Some(out) => (out, compiler.constants().get(out).get_int()),
                    None => {
                        let failure = cast_ctx.failure.take().expect("failure recorded");
                        return emit_cast_failure(sema, ctx, value_node, failure);
                    }
                }
            }
            _ => {
                let info = types.get(underlying_type);
                if !next.fits(info.int_bits(), info.int_sign() == Sign::Signed) {
                    return error::raise_literal_overflow(
                        sema,
                        ctx,
                        value_node,
                        next.v.to_string(),
                        underlying_type,
                    );
                }
                let cst = compiler.constants().add(ConstantValue::make_int(
                    next,
                    types.get(underlying_type).int_bits(),
                    types.get(underlying_type).int_sign(),
                ));
                (cst, next)
            }
        };

        let enum_cst = compiler.constants().add(ConstantValue::EnumValue {
            enum_type,
            value: init_cst,
        });
        sema.set_constant(value_node, enum_cst);

        // Each value is a symbol in the enum's own map.
        let value_sym = match sema.declare_symbol(ctx, value_node, SymbolKind::Variable) {
            Ok(s) => s,
            Err(flow) => return flow,
        };
        let value_symbol = compiler.symbol(value_sym);
        value_symbol.set_type_ref(enum_type);
        value_symbol.set_cst_ref(enum_cst);
        compiler.transition(value_sym, SymbolState::Typed);
        compiler.transition(value_sym, SymbolState::SemaCompleted);

        next = value_int.add(IntValue::unsigned(1)).0;
    }

    compiler.transition(sym, SymbolState::SemaCompleted);
    Flow::Continue
}

fn alias_decl_post(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    target: AstNodeRef,
) -> Flow {
    let sym = node_symbol(sema, node);
    if sym.is_invalid() {
        return error::raise_internal(sema, ctx, node);
    }
    let compiler = sema.compiler().clone();
    let symbol = compiler.symbol(sym);
    if symbol.is_ignored() || symbol.state() >= SymbolState::SemaCompleted {
        return Flow::Continue;
    }

    let Some(target_type) = type_value_of(sema, target) else {
        return error::raise_at_node(sema, ctx, DiagnosticId::SynErrExpectedType, target);
    };
    let type_ref = compiler.types().add(TypeInfo::Alias {
        sym,
        target: target_type,
    });
    symbol.set_type_ref(type_ref);
    compiler.transition(sym, SymbolState::Typed);
    compiler.transition(sym, SymbolState::SemaCompleted);
    Flow::Continue
}

fn complete_simple_decl(sema: &mut Sema, node: AstNodeRef) -> Flow {
    let sym = node_symbol(sema, node);
    if sym.is_valid() {
        let compiler = sema.compiler();
        if compiler.symbol(sym).type_ref().is_invalid() {
            compiler.symbol(sym).set_type_ref(compiler.types().ty_void());
        }
        compiler.transition(sym, SymbolState::Typed);
        compiler.transition(sym, SymbolState::SemaCompleted);
    }
    Flow::Continue
}

// -------------------------------------------------------------- statements

fn condition_check(sema: &mut Sema, ctx: &mut TaskContext, cond: AstNodeRef) -> Flow {
    crate::flow_verify!(error::check_is_value_expr(sema, ctx, cond));
    let view = sema.view_of(cond);
    let ty_bool = sema.compiler().types().ty_bool();
    if view.cst.is_valid() {
        if !sema.compiler().constants().get(view.cst).is_bool() {
            return error::raise_invalid_type(sema, ctx, cond, view.type_ref, ty_bool);
        }
        return Flow::Continue;
    }
    if view.type_ref != ty_bool {
        return error::raise_invalid_type(sema, ctx, cond, view.type_ref, ty_bool);
    }
    Flow::Continue
}

fn return_post(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    expr: AstNodeRef,
) -> Flow {
    let owner = sema.frame().owner;
    if owner.is_invalid() {
        return Flow::Continue;
    }
    let compiler = sema.compiler().clone();
    let symbol = compiler.symbol(owner);
    if symbol.kind() != SymbolKind::Function {
        return Flow::Continue;
    }
    let types = compiler.types();
    let ret = match types.get(symbol.type_ref()) {
        TypeInfo::Lambda { ret, .. } => ret,
        _ => return Flow::Continue,
    };

    if expr.is_invalid() {
        if types.get(ret) != TypeInfo::Void {
            return error::raise_invalid_type(sema, ctx, node, types.ty_void(), ret);
        }
        return Flow::Continue;
    }

    crate::flow_verify!(error::check_is_value_expr(sema, ctx, expr));
    let view = sema.view_of(expr);
    if view.cst.is_valid() {
        let mut cast_ctx = CastContext::new(CastKind::Implicit).with_constant(view.cst);
        if cast_constant(&compiler, &mut cast_ctx, view.cst, ret).is_none() {
            let failure = cast_ctx.failure.take().expect("failure recorded");
            return emit_cast_failure(sema, ctx, expr, failure);
        }
    } else {
        let mut cast_ctx = CastContext::new(CastKind::Implicit);
        if cast_allowed(&compiler, &mut cast_ctx, view.type_ref, ret) == CastQuery::Fail {
            let failure = cast_ctx.failure.take().expect("failure recorded");
            return emit_cast_failure(sema, ctx, expr, failure);
        }
    }
    Flow::Continue
}
