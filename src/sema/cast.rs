//! Cast legality and constant conversion.
//!
//! `cast_allowed` answers whether a source type converts to a destination
//! type for a given cast kind, returning either success, a concrete typed
//! failure, or "requires constant check" when legality depends on the
//! literal value. When a source constant is attached, `cast_constant`
//! computes the destination constant, checking ranges unless wrapping was
//! requested.

use bitflags::bitflags;

use crate::compiler::Compiler;
use crate::core::{AstNodeRef, ConstantRef, TypeRef};
use crate::report::diagnostic::DiagnosticId;
use crate::sema::constants::{ConstantValue, IntValue};
use crate::sema::types::{Sign, TypeInfo};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CastKind {
    LiteralSuffix,
    Implicit,
    Parameter,
    Condition,
    Explicit,
    Promotion,
    Initialization,
}

bitflags! {
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
    pub struct CastFlags: u32 {
        const BIT_CAST      = 1 << 0;
        const NO_OVERFLOW   = 1 << 1;
        const UN_CONST      = 1 << 2;
        const UFCS_ARGUMENT = 1 << 3;
    }
}

#[derive(Clone, Debug)]
pub struct CastFailure {
    pub diag_id: DiagnosticId,
    pub node: AstNodeRef,
    pub src: TypeRef,
    pub dst: TypeRef,
    /// Offending value rendering for `VALUE` arguments.
    pub value: String,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CastQuery {
    Ok,
    Fail,
    /// Legality depends on the literal value; run the constant path.
    RequiresConstCheck,
}

pub struct CastContext {
    pub kind: CastKind,
    pub flags: CastFlags,
    pub error_node: AstNodeRef,
    pub src_cst: ConstantRef,
    pub out_cst: ConstantRef,
    pub failure: Option<CastFailure>,
}

impl CastContext {
    pub fn new(kind: CastKind) -> Self {
        Self {
            kind,
            flags: CastFlags::empty(),
            error_node: AstNodeRef::INVALID,
            src_cst: ConstantRef::INVALID,
            out_cst: ConstantRef::INVALID,
            failure: None,
        }
    }

    pub fn with_constant(mut self, cst: ConstantRef) -> Self {
        self.src_cst = cst;
        self
    }

    pub fn with_flags(mut self, flags: CastFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_constant_folding(&self) -> bool {
        self.src_cst.is_valid()
    }

    fn fail(&mut self, diag_id: DiagnosticId, src: TypeRef, dst: TypeRef, value: String) {
        self.failure = Some(CastFailure {
            diag_id,
            node: self.error_node,
            src,
            dst,
            value,
        });
    }
}

fn allows_explicit(kind: CastKind) -> bool {
    matches!(kind, CastKind::Explicit | CastKind::LiteralSuffix)
}

/// Type-level legality of `src -> dst` under the context's kind and flags.
pub fn cast_allowed(
    compiler: &Compiler,
    cast_ctx: &mut CastContext,
    src: TypeRef,
    dst: TypeRef,
) -> CastQuery {
    if src == dst {
        return CastQuery::Ok;
    }
    let types = compiler.types();
    let src_res = TypeInfo::unalias(types, src);
    let dst_res = TypeInfo::unalias(types, dst);
    if src_res == dst_res {
        return CastQuery::Ok;
    }
    let s = types.get(src_res);
    let d = types.get(dst_res);

    if cast_ctx.flags.contains(CastFlags::BIT_CAST) {
        let same_size = s.byte_size(types) == d.byte_size(types);
        if same_size && s.byte_size(types).is_some() {
            return CastQuery::Ok;
        }
        cast_ctx.fail(DiagnosticId::SemaErrCannotCast, src, dst, String::new());
        return CastQuery::Fail;
    }

    let query = match (&s, &d) {
        // Condition casts only accept bool.
        _ if cast_ctx.kind == CastKind::Condition => {
            if d.is_bool() && s.is_bool() {
                CastQuery::Ok
            } else {
                CastQuery::Fail
            }
        }

        (TypeInfo::Bool, TypeInfo::Int { .. }) => {
            if allows_explicit(cast_ctx.kind) {
                CastQuery::Ok
            } else {
                CastQuery::Fail
            }
        }
        (TypeInfo::Int { .. }, TypeInfo::Bool) => {
            if allows_explicit(cast_ctx.kind) {
                CastQuery::Ok
            } else {
                CastQuery::Fail
            }
        }

        (TypeInfo::Int { bits: sb, sign: ss }, TypeInfo::Int { bits: db, sign: ds }) => {
            if *sb == 0 {
                // Unsized literal: legality depends on the value.
                CastQuery::RequiresConstCheck
            } else if allows_explicit(cast_ctx.kind) {
                CastQuery::Ok
            } else if db >= sb && (ss == ds || (*ds == Sign::Signed && db > sb)) {
                // Lossless widening.
                CastQuery::Ok
            } else if cast_ctx.is_constant_folding() {
                CastQuery::RequiresConstCheck
            } else {
                CastQuery::Fail
            }
        }

        (TypeInfo::Int { .. }, TypeInfo::Float { .. }) => CastQuery::Ok,

        (TypeInfo::Float { .. }, TypeInfo::Int { .. }) => {
            if allows_explicit(cast_ctx.kind) {
                CastQuery::Ok
            } else if cast_ctx.is_constant_folding() {
                CastQuery::RequiresConstCheck
            } else {
                CastQuery::Fail
            }
        }

        (TypeInfo::Float { bits: sb }, TypeInfo::Float { bits: db }) => {
            if *sb == 0 || db >= sb || allows_explicit(cast_ctx.kind) {
                CastQuery::Ok
            } else if cast_ctx.is_constant_folding() {
                CastQuery::RequiresConstCheck
            } else {
                CastQuery::Fail
            }
        }

        (TypeInfo::Char, TypeInfo::Int { .. }) => {
            if allows_explicit(cast_ctx.kind) {
                CastQuery::Ok
            } else {
                CastQuery::Fail
            }
        }

        (TypeInfo::Enum { underlying, .. }, _) => {
            if allows_explicit(cast_ctx.kind) {
                return cast_allowed(compiler, cast_ctx, *underlying, dst_res);
            }
            CastQuery::Fail
        }

        (TypeInfo::Pointer { .. }, TypeInfo::Pointer { .. }) => {
            if allows_explicit(cast_ctx.kind) {
                CastQuery::Ok
            } else {
                CastQuery::Fail
            }
        }

        // `null` folds into any pointer.
        (TypeInfo::Void, TypeInfo::Pointer { .. }) => CastQuery::Ok,

        _ => CastQuery::Fail,
    };

    if query == CastQuery::Fail {
        let value = if cast_ctx.is_constant_folding() {
            compiler
                .constants()
                .get(cast_ctx.src_cst)
                .to_display_string(compiler.constants())
        } else {
            String::new()
        };
        cast_ctx.fail(DiagnosticId::SemaErrCannotCast, src, dst, value);
    }
    query
}

/// Computes the destination constant for a legal (or constant-checked)
/// cast. Returns `None` with the failure recorded when the value does not
/// fit.
pub fn cast_constant(
    compiler: &Compiler,
    cast_ctx: &mut CastContext,
    cst: ConstantRef,
    dst: TypeRef,
) -> Option<ConstantRef> {
    let types = compiler.types();
    let constants = compiler.constants();
    let value = constants.get(cst);
    let src_type = value.type_of(types);
    if src_type == dst {
        cast_ctx.out_cst = cst;
        return Some(cst);
    }

    let dst_res = TypeInfo::unalias(types, dst);
    let d = types.get(dst_res);
    let wrap = cast_ctx.flags.contains(CastFlags::NO_OVERFLOW);

    let out = match (&value, &d) {
        // bool <-> int-like
        (ConstantValue::Bool(b), TypeInfo::Int { bits, sign }) => Some(ConstantValue::make_int(
            IntValue::unsigned(*b as u64),
            *bits,
            *sign,
        )),
        (ConstantValue::Int { v, .. }, TypeInfo::Bool) => Some(ConstantValue::Bool(*v != 0)),

        // int-like -> int-like, overflow-checked unless wrapping
        (ConstantValue::Int { sign, v, .. }, TypeInfo::Int { bits: db, sign: ds }) => {
            let signed = *sign == Sign::Signed;
            let iv = IntValue { v: *v, signed };
            let dst_signed = *ds == Sign::Signed;
            if wrap {
                Some(ConstantValue::make_int(
                    iv.normalize_to(*db, dst_signed),
                    *db,
                    *ds,
                ))
            } else if iv.fits(*db, dst_signed) {
                Some(ConstantValue::make_int(iv, *db, *ds))
            } else {
                cast_ctx.fail(
                    DiagnosticId::SemaErrLiteralOverflow,
                    src_type,
                    dst,
                    value.to_display_string(constants),
                );
                return None;
            }
        }

        // char -> int-like
        (ConstantValue::Char(c), TypeInfo::Int { bits, sign }) => {
            let iv = IntValue::unsigned(*c as u64);
            if iv.fits(*bits, *sign == Sign::Signed) {
                Some(ConstantValue::make_int(iv, *bits, *sign))
            } else {
                cast_ctx.fail(
                    DiagnosticId::SemaErrLiteralOverflow,
                    src_type,
                    dst,
                    value.to_display_string(constants),
                );
                return None;
            }
        }

        // int-like -> float
        (ConstantValue::Int { sign, v, .. }, TypeInfo::Float { bits }) => {
            let f = if *sign == Sign::Signed {
                *v as i64 as f64
            } else {
                *v as f64
            };
            Some(ConstantValue::make_float(f, *bits))
        }

        // float -> int-like, truncating, range-checked
        (ConstantValue::Float { repr, .. }, TypeInfo::Int { bits, sign }) => {
            let f = f64::from_bits(*repr).trunc();
            let dst_signed = *sign == Sign::Signed;
            let in_range = if dst_signed {
                let lim = 2f64.powi(*bits as i32 - 1);
                f >= -lim && f < lim
            } else {
                f >= 0.0 && f < 2f64.powi(*bits as i32)
            };
            if in_range || wrap {
                let iv = if dst_signed {
                    IntValue::signed(f as i64)
                } else {
                    IntValue::unsigned(f as u64)
                };
                Some(ConstantValue::make_int(
                    iv.normalize_to(*bits, dst_signed),
                    *bits,
                    *sign,
                ))
            } else {
                cast_ctx.fail(
                    DiagnosticId::SemaErrLiteralOverflow,
                    src_type,
                    dst,
                    value.to_display_string(constants),
                );
                return None;
            }
        }

        // float -> float, IEEE default rounding
        (ConstantValue::Float { repr, .. }, TypeInfo::Float { bits }) => {
            Some(ConstantValue::make_float(f64::from_bits(*repr), *bits))
        }

        (ConstantValue::Null, TypeInfo::Pointer { .. }) => Some(ConstantValue::Null),

        (ConstantValue::EnumValue { value: inner, .. }, _) => {
            return cast_constant(compiler, cast_ctx, *inner, dst);
        }

        _ => {
            cast_ctx.fail(
                DiagnosticId::SemaErrCannotCast,
                src_type,
                dst,
                value.to_display_string(constants),
            );
            return None;
        }
    };

    let out_ref = constants.add(out?);
    cast_ctx.out_cst = out_ref;
    Some(out_ref)
}

/// Picks a concrete type for an unsized literal constant: s32 then s64 then
/// u64 for integers (u32/u64 when the literal is explicitly unsigned), f32
/// for floats.
pub fn concretize_constant(compiler: &Compiler, cst: ConstantRef) -> Option<ConstantRef> {
    let constants = compiler.constants();
    let value = constants.get(cst);
    match value {
        ConstantValue::Int { bits: 0, sign, v } => {
            let iv = IntValue {
                v,
                signed: sign == Sign::Signed,
            };
            let (bits, out_sign) = if sign == Sign::Unsigned {
                if iv.fits(32, false) {
                    (32, Sign::Unsigned)
                } else {
                    (64, Sign::Unsigned)
                }
            } else if iv.fits(32, true) {
                (32, Sign::Signed)
            } else if iv.fits(64, true) {
                (64, Sign::Signed)
            } else if !iv.is_negative() {
                (64, Sign::Unsigned)
            } else {
                return None;
            };
            Some(constants.add(ConstantValue::make_int(iv, bits, out_sign)))
        }
        ConstantValue::Float { bits: 0, repr } => {
            Some(constants.add(ConstantValue::make_float(f64::from_bits(repr), 32)))
        }
        _ => Some(cst),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompileOptions, Compiler};

    fn compiler() -> std::sync::Arc<Compiler> {
        Compiler::new(CompileOptions::default())
    }

    #[test]
    fn implicit_widening_is_ok() {
        let c = compiler();
        let types = c.types();
        let mut ctx = CastContext::new(CastKind::Implicit);
        let s8 = types.ty_int(8, Sign::Signed);
        let s32 = types.ty_int(32, Sign::Signed);
        assert_eq!(cast_allowed(&c, &mut ctx, s8, s32), CastQuery::Ok);
        // Narrowing without a constant fails.
        let mut ctx = CastContext::new(CastKind::Implicit);
        assert_eq!(cast_allowed(&c, &mut ctx, s32, s8), CastQuery::Fail);
        assert!(ctx.failure.is_some());
        // Explicit narrowing is fine.
        let mut ctx = CastContext::new(CastKind::Explicit);
        assert_eq!(cast_allowed(&c, &mut ctx, s32, s8), CastQuery::Ok);
    }

    #[test]
    fn unsized_requires_const_check() {
        let c = compiler();
        let types = c.types();
        let mut ctx = CastContext::new(CastKind::Initialization);
        let lit = types.ty_int_unsized(Sign::Unknown);
        let s8 = types.ty_int(8, Sign::Signed);
        assert_eq!(
            cast_allowed(&c, &mut ctx, lit, s8),
            CastQuery::RequiresConstCheck
        );
    }

    #[test]
    fn constant_overflow_reports_value() {
        let c = compiler();
        let constants = c.constants();
        let s8 = c.types().ty_int(8, Sign::Signed);
        let cst = constants.add(ConstantValue::make_int_unsized(
            IntValue::unsigned(200),
            Sign::Unknown,
        ));
        let mut ctx = CastContext::new(CastKind::Initialization);
        assert!(cast_constant(&c, &mut ctx, cst, s8).is_none());
        let failure = ctx.failure.expect("overflow failure");
        assert_eq!(failure.diag_id, DiagnosticId::SemaErrLiteralOverflow);
        assert_eq!(failure.value, "200");
    }

    #[test]
    fn constant_in_range_adopts_width() {
        let c = compiler();
        let constants = c.constants();
        let s8 = c.types().ty_int(8, Sign::Signed);
        let cst = constants.add(ConstantValue::make_int_unsized(
            IntValue::unsigned(100),
            Sign::Unknown,
        ));
        let mut ctx = CastContext::new(CastKind::Initialization);
        let out = cast_constant(&c, &mut ctx, cst, s8).expect("fits");
        match constants.get(out) {
            ConstantValue::Int { bits, sign, v } => {
                assert_eq!(bits, 8);
                assert_eq!(sign, Sign::Signed);
                assert_eq!(v, 100);
            }
            other => panic!("unexpected constant {:?}", other),
        }
    }

    #[test]
    fn wrap_skips_range_check() {
        let c = compiler();
        let constants = c.constants();
        let s8 = c.types().ty_int(8, Sign::Signed);
        let cst = constants.add(ConstantValue::make_int_unsized(
            IntValue::unsigned(200),
            Sign::Unknown,
        ));
        let mut ctx = CastContext::new(CastKind::Initialization).with_flags(CastFlags::NO_OVERFLOW);
        let out = cast_constant(&c, &mut ctx, cst, s8).expect("wraps");
        match constants.get(out) {
            ConstantValue::Int { v, .. } => assert_eq!(v as i8 as i64, -56),
            other => panic!("unexpected constant {:?}", other),
        }
    }

    #[test]
    fn float_to_float_rounds() {
        let c = compiler();
        let constants = c.constants();
        let f32_t = c.types().ty_float(32);
        let cst = constants.add(ConstantValue::make_float_unsized(0.1));
        let mut ctx = CastContext::new(CastKind::Initialization);
        let out = cast_constant(&c, &mut ctx, cst, f32_t).expect("rounds");
        match constants.get(out) {
            ConstantValue::Float { bits, repr } => {
                assert_eq!(bits, 32);
                assert_eq!(f64::from_bits(repr), 0.1f32 as f64);
            }
            other => panic!("unexpected constant {:?}", other),
        }
    }

    #[test]
    fn concretization_prefers_s32() {
        let c = compiler();
        let constants = c.constants();
        let lit = constants.add(ConstantValue::make_int_unsized(
            IntValue::unsigned(7),
            Sign::Unknown,
        ));
        let out = concretize_constant(&c, lit).expect("concrete");
        match constants.get(out) {
            ConstantValue::Int { bits, sign, .. } => {
                assert_eq!(bits, 32);
                assert_eq!(sign, Sign::Signed);
            }
            other => panic!("unexpected constant {:?}", other),
        }
        // Too big for s32, fits s64.
        let lit = constants.add(ConstantValue::make_int_unsized(
            IntValue::unsigned(1 << 40),
            Sign::Unknown,
        ));
        let out = concretize_constant(&c, lit).expect("concrete");
        match constants.get(out) {
            ConstantValue::Int { bits, sign, .. } => {
                assert_eq!(bits, 64);
                assert_eq!(sign, Sign::Signed);
            }
            other => panic!("unexpected constant {:?}", other),
        }
        // 2^63..2^64-1 only fits u64.
        let lit = constants.add(ConstantValue::make_int_unsized(
            IntValue::unsigned(u64::MAX),
            Sign::Unknown,
        ));
        let out = concretize_constant(&c, lit).expect("concrete");
        match constants.get(out) {
            ConstantValue::Int { bits, sign, .. } => {
                assert_eq!(bits, 64);
                assert_eq!(sign, Sign::Unsigned);
            }
            other => panic!("unexpected constant {:?}", other),
        }
    }
}
