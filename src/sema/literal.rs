//! Literal parsing and folding. Every literal kind sets its node constant
//! in `pre_node`; there are no children to visit.

use crate::ast::Flow;
use crate::core::AstNodeRef;
use crate::jobs::TaskContext;
use crate::lexer::lang;
use crate::lexer::{TokenFlags, TokenId};
use crate::report::diagnostic::DiagnosticId;
use crate::sema::constants::{ConstantValue, IntValue};
use crate::sema::error;
use crate::sema::sema::Sema;
use crate::sema::types::Sign;

fn raise_number_too_big(sema: &mut Sema, ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
    error::raise_at_node(sema, ctx, DiagnosticId::SemaErrNumberTooBig, node)
}

pub(crate) fn bool_literal(sema: &mut Sema, _ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
    let cst = match sema.token_id(node) {
        TokenId::KwdTrue => sema.compiler().constants().cst_true(),
        _ => sema.compiler().constants().cst_false(),
    };
    sema.set_constant(node, cst);
    Flow::SkipChildren
}

pub(crate) fn null_literal(sema: &mut Sema, _ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
    let cst = sema.compiler().constants().cst_null();
    sema.set_constant(node, cst);
    Flow::SkipChildren
}

pub(crate) fn undefined_literal(sema: &mut Sema, _ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
    let cst = sema.compiler().constants().cst_undefined();
    sema.set_constant(node, cst);
    Flow::SkipChildren
}

/// Decimal integer: skip `_` separators, detect overflow past 2^64-1. The
/// result is unsized with unknown sign.
pub(crate) fn integer_literal(sema: &mut Sema, ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
    let text = sema.token_text(node);
    let mut value: u64 = 0;
    for b in text.bytes() {
        if lang::is_number_sep(b) {
            continue;
        }
        debug_assert!(lang::is_digit(b));
        let digit = (b - b'0') as u64;
        value = match value.checked_mul(10).and_then(|v| v.checked_add(digit)) {
            Some(v) => v,
            None => return raise_number_too_big(sema, ctx, node),
        };
    }
    let cst = ConstantValue::make_int_unsized(IntValue::unsigned(value), Sign::Unknown);
    let cst = sema.compiler().constants().add(cst);
    sema.set_constant(node, cst);
    Flow::SkipChildren
}

/// `0b...` / `0x...`: unsigned unsized.
pub(crate) fn radix_literal(
    sema: &mut Sema,
    ctx: &mut TaskContext,
    node: AstNodeRef,
    hex: bool,
) -> Flow {
    let text = sema.token_text(node);
    debug_assert!(text.len() > 2);
    let digits = &text.as_bytes()[2..];
    let shift = if hex { 4 } else { 1 };

    let mut value: u64 = 0;
    for &b in digits {
        if lang::is_number_sep(b) {
            continue;
        }
        if value.leading_zeros() < shift {
            return raise_number_too_big(sema, ctx, node);
        }
        value <<= shift;
        let digit = if b.is_ascii_digit() {
            (b - b'0') as u64
        } else {
            (b.to_ascii_lowercase() - b'a') as u64 + 10
        };
        value |= digit;
    }

    let cst = ConstantValue::make_int_unsized(IntValue::unsigned(value), Sign::Unsigned);
    let cst = sema.compiler().constants().add(cst);
    sema.set_constant(node, cst);
    Flow::SkipChildren
}

/// Float literal: mantissa and decimal exponent computed separately so
/// overflow surfaces; the value is unsized.
pub(crate) fn float_literal(sema: &mut Sema, ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
    let text = sema.token_text(node);

    let mut mantissa: u64 = 0;
    let mut frac_digits: i64 = 0;
    let mut exp_value: i64 = 0;
    let mut exp_negative = false;
    let mut seen_dot = false;
    let mut seen_exp = false;

    for b in text.bytes() {
        if lang::is_number_sep(b) {
            continue;
        }
        match b {
            b'0'..=b'9' => {
                let digit = (b - b'0') as i64;
                if seen_exp {
                    exp_value = match exp_value.checked_mul(10).and_then(|v| v.checked_add(digit)) {
                        Some(v) => v,
                        None => return raise_number_too_big(sema, ctx, node),
                    };
                } else {
                    mantissa = match mantissa
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(digit as u64))
                    {
                        Some(v) => v,
                        None => return raise_number_too_big(sema, ctx, node),
                    };
                    if seen_dot {
                        frac_digits += 1;
                    }
                }
            }
            b'.' => seen_dot = true,
            b'e' | b'E' => seen_exp = true,
            b'+' => {}
            b'-' => exp_negative = true,
            _ => return error::raise_internal(sema, ctx, node),
        }
    }

    let mut exp10 = if exp_negative { -exp_value } else { exp_value };
    exp10 -= frac_digits;

    // Mantissa and exponent recombined through the decimal parser for
    // correctly rounded results.
    let value: f64 = format!("{}e{}", mantissa, exp10).parse().unwrap_or(f64::INFINITY);
    if value.is_infinite() {
        return raise_number_too_big(sema, ctx, node);
    }

    let cst = sema
        .compiler()
        .constants()
        .add(ConstantValue::make_float_unsized(value));
    sema.set_constant(node, cst);
    Flow::SkipChildren
}

/// Decodes one escape sequence starting at `\`. Returns the scalar and the
/// number of bytes consumed, or `None` on a malformed escape.
fn decode_escape(bytes: &[u8]) -> Option<(char, usize)> {
    debug_assert_eq!(bytes[0], b'\\');
    let esc = *bytes.get(1)?;
    let simple = |c: char| Some((c, 2));
    match esc {
        b'0' => simple('\0'),
        b'a' => simple('\x07'),
        b'b' => simple('\x08'),
        b'\\' => simple('\\'),
        b't' => simple('\t'),
        b'n' => simple('\n'),
        b'f' => simple('\x0C'),
        b'r' => simple('\r'),
        b'v' => simple('\x0B'),
        b'\'' => simple('\''),
        b'"' => simple('"'),
        b'x' | b'u' | b'U' => {
            let max_digits = match esc {
                b'x' => 2,
                b'u' => 4,
                _ => 8,
            };
            let mut value: u32 = 0;
            let mut used = 0;
            while used < max_digits {
                let Some(&h) = bytes.get(2 + used) else {
                    break;
                };
                if !h.is_ascii_hexdigit() {
                    break;
                }
                value = (value << 4) | (h as char).to_digit(16).unwrap_or(0);
                used += 1;
            }
            if used == 0 {
                return None;
            }
            Some((char::from_u32(value)?, 2 + used))
        }
        _ => None,
    }
}

pub(crate) fn character_literal(sema: &mut Sema, ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
    let text = sema.token_text(node);
    let base = sema.compiler().ast().base(node);
    let escaped = sema
        .compiler()
        .view(base.src_view)
        .token(base.tok)
        .has_flag(TokenFlags::ESCAPED);

    // Strip the quote delimiters.
    if text.len() < 2 {
        return error::raise_at_node(sema, ctx, DiagnosticId::SemaErrInvalidCharLiteral, node);
    }
    let inner = &text[1..text.len() - 1];

    let value = if !escaped {
        let mut chars = inner.chars();
        let Some(c) = chars.next() else {
            return error::raise_at_node(sema, ctx, DiagnosticId::SemaErrInvalidCharLiteral, node);
        };
        if chars.next().is_some() {
            return error::raise_at_node(sema, ctx, DiagnosticId::SemaErrInvalidCharLiteral, node);
        }
        c
    } else {
        // A character literal contains exactly one escape sequence.
        let bytes = inner.as_bytes();
        if bytes.first() != Some(&b'\\') {
            return error::raise_at_node(sema, ctx, DiagnosticId::SemaErrInvalidCharLiteral, node);
        }
        match decode_escape(bytes) {
            Some((c, used)) if used == bytes.len() => c,
            Some(_) => {
                return error::raise_at_node(
                    sema,
                    ctx,
                    DiagnosticId::SemaErrInvalidCharLiteral,
                    node,
                )
            }
            None => return error::raise_at_node(sema, ctx, DiagnosticId::SemaErrInvalidEscape, node),
        }
    };

    let cst = sema.compiler().constants().add(ConstantValue::Char(value));
    sema.set_constant(node, cst);
    Flow::SkipChildren
}

pub(crate) fn string_literal(sema: &mut Sema, ctx: &mut TaskContext, node: AstNodeRef) -> Flow {
    let text = sema.token_text(node);
    let base = sema.compiler().ast().base(node);
    let tok = *sema.compiler().view(base.src_view).token(base.tok);

    // Strip delimiters per string form.
    let inner = match tok.id {
        TokenId::StringLine => text.get(1..text.len().saturating_sub(1)),
        TokenId::StringMultiLine => text.get(3..text.len().saturating_sub(3)),
        TokenId::StringRaw => text.get(2..text.len().saturating_sub(1)),
        _ => None,
    };
    let Some(inner) = inner else {
        return error::raise_internal(sema, ctx, node);
    };

    // Fast path: no escape sequence inside.
    if !tok.has_flag(TokenFlags::ESCAPED) {
        let cst = sema
            .compiler()
            .constants()
            .add(ConstantValue::make_string(inner));
        sema.set_constant(node, cst);
        return Flow::SkipChildren;
    }

    let bytes = inner.as_bytes();
    let mut result = String::with_capacity(inner.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            // Copy one UTF-8 scalar verbatim.
            let rest = &inner[i..];
            let c = rest.chars().next().expect("in-bounds char");
            result.push(c);
            i += c.len_utf8();
            continue;
        }
        match decode_escape(&bytes[i..]) {
            Some((c, used)) => {
                result.push(c);
                i += used;
            }
            None => {
                return error::raise_at_node(sema, ctx, DiagnosticId::SemaErrInvalidEscape, node)
            }
        }
    }

    let cst = sema
        .compiler()
        .constants()
        .add(ConstantValue::make_string(&result));
    sema.set_constant(node, cst);
    Flow::SkipChildren
}
