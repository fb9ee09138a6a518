//! Expression parsing with full precedence climbing.

use crate::ast::{AstKind, ModifierFlags};
use crate::core::AstNodeRef;
use crate::lexer::TokenId;
use crate::parser::parser::Parser;
use crate::report::diagnostic::DiagnosticId;

// Binding powers, loosest first.
const PREC_OR: u8 = 1;
const PREC_AND: u8 = 2;
const PREC_EQUALITY: u8 = 3;
const PREC_COMPARISON: u8 = 4;
const PREC_BIT_OR: u8 = 5;
const PREC_BIT_XOR: u8 = 6;
const PREC_BIT_AND: u8 = 7;
const PREC_SHIFT: u8 = 8;
const PREC_ADDITIVE: u8 = 9;
const PREC_MULTIPLICATIVE: u8 = 10;

#[derive(Copy, Clone, PartialEq, Eq)]
enum OpClass {
    Logical,
    Relational,
    Binary,
}

fn binary_precedence(id: TokenId) -> Option<(u8, OpClass)> {
    let entry = match id {
        TokenId::KwdOr => (PREC_OR, OpClass::Logical),
        TokenId::KwdAnd => (PREC_AND, OpClass::Logical),
        TokenId::SymEqualEqual | TokenId::SymBangEqual => (PREC_EQUALITY, OpClass::Relational),
        TokenId::SymLower
        | TokenId::SymLowerEqual
        | TokenId::SymGreater
        | TokenId::SymGreaterEqual => (PREC_COMPARISON, OpClass::Relational),
        TokenId::SymPipe => (PREC_BIT_OR, OpClass::Binary),
        TokenId::SymCircumflex => (PREC_BIT_XOR, OpClass::Binary),
        TokenId::SymAmpersand => (PREC_BIT_AND, OpClass::Binary),
        TokenId::SymGreaterGreater | TokenId::SymLowerLower => (PREC_SHIFT, OpClass::Binary),
        TokenId::SymPlus | TokenId::SymMinus | TokenId::SymPlusPlus => {
            (PREC_ADDITIVE, OpClass::Binary)
        }
        TokenId::SymAsterisk | TokenId::SymSlash | TokenId::SymPercent => {
            (PREC_MULTIPLICATIVE, OpClass::Binary)
        }
        _ => return None,
    };
    Some(entry)
}

impl Parser<'_> {
    pub(crate) fn parse_expr(&mut self) -> Option<AstNodeRef> {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Option<AstNodeRef> {
        let mut left = self.parse_unary()?;

        while let Some((prec, class)) = binary_precedence(self.id()) {
            if prec <= min_prec {
                break;
            }
            let op_tok = self.advance();
            let modifiers = self.parse_modifiers();
            let right = self.parse_binary(prec)?;

            let kind = match class {
                OpClass::Logical => AstKind::LogicalExpr { left, right },
                OpClass::Relational => AstKind::RelationalExpr { left, right },
                OpClass::Binary => AstKind::BinaryExpr { left, right },
            };
            let node = self.make(op_tok, kind);
            if !modifiers.is_empty() {
                self.set_modifiers(node, modifiers);
            }
            left = node;
        }
        Some(left)
    }

    /// `#wrap` / `#prom` directly after an operator.
    fn parse_modifiers(&mut self) -> ModifierFlags {
        let mut modifiers = ModifierFlags::empty();
        loop {
            match self.id() {
                TokenId::ModifierWrap => modifiers |= ModifierFlags::WRAP,
                TokenId::ModifierPromote => modifiers |= ModifierFlags::PROMOTE,
                TokenId::ModifierBit => modifiers |= ModifierFlags::BIT,
                TokenId::ModifierUnConst => modifiers |= ModifierFlags::UN_CONST,
                _ => return modifiers,
            }
            self.advance();
        }
    }

    fn parse_unary(&mut self) -> Option<AstNodeRef> {
        match self.id() {
            TokenId::SymMinus | TokenId::SymTilde | TokenId::KwdNot => {
                let tok = self.advance();
                let expr = self.parse_unary()?;
                Some(self.make(tok, AstKind::UnaryExpr { expr }))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Option<AstNodeRef> {
        let mut expr = self.parse_primary()?;
        while self.id() == TokenId::SymLeftParen {
            let open = self.advance();
            let mut args = Vec::new();
            while !self.at_end() && self.id() != TokenId::SymRightParen {
                args.push(self.parse_expr()?);
                if self.eat(TokenId::SymComma).is_none() {
                    break;
                }
            }
            self.expect(TokenId::SymRightParen)?;
            let args = self.span(&args);
            expr = self.make(open, AstKind::CallExpr { callee: expr, args });
        }
        Some(expr)
    }

    fn parse_primary(&mut self) -> Option<AstNodeRef> {
        match self.id() {
            TokenId::IntegerLiteral => {
                let tok = self.advance();
                Some(self.make(tok, AstKind::IntegerLiteral))
            }
            TokenId::BinaryLiteral => {
                let tok = self.advance();
                Some(self.make(tok, AstKind::BinaryLiteral))
            }
            TokenId::HexaLiteral => {
                let tok = self.advance();
                Some(self.make(tok, AstKind::HexaLiteral))
            }
            TokenId::FloatLiteral => {
                let tok = self.advance();
                Some(self.make(tok, AstKind::FloatLiteral))
            }
            TokenId::CharacterLiteral => {
                let tok = self.advance();
                Some(self.make(tok, AstKind::CharacterLiteral))
            }
            TokenId::StringLine | TokenId::StringMultiLine | TokenId::StringRaw => {
                let tok = self.advance();
                Some(self.make(tok, AstKind::StringLiteral))
            }
            TokenId::KwdTrue | TokenId::KwdFalse => {
                let tok = self.advance();
                Some(self.make(tok, AstKind::BoolLiteral))
            }
            TokenId::KwdNull => {
                let tok = self.advance();
                Some(self.make(tok, AstKind::NullLiteral))
            }
            TokenId::KwdUndefined => {
                let tok = self.advance();
                Some(self.make(tok, AstKind::UndefinedLiteral))
            }
            TokenId::Identifier => {
                let tok = self.advance();
                Some(self.make(tok, AstKind::IdentifierExpr))
            }
            TokenId::SymLeftParen => {
                let tok = self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenId::SymRightParen)?;
                Some(self.make(tok, AstKind::ParenExpr { expr }))
            }
            TokenId::SymLeftBrace => {
                // Aggregate literal `{ a, b, c }`.
                let tok = self.advance();
                let mut children = Vec::new();
                while !self.at_end() && self.id() != TokenId::SymRightBrace {
                    children.push(self.parse_expr()?);
                    if self.eat(TokenId::SymComma).is_none() {
                        break;
                    }
                }
                self.expect(TokenId::SymRightBrace)?;
                let children = self.span(&children);
                Some(self.make(tok, AstKind::AggregateLiteral { children }))
            }
            TokenId::KwdCast => {
                // `cast [#bit] (type) expr`
                let tok = self.advance();
                let modifiers = self.parse_modifiers();
                self.expect(TokenId::SymLeftParen)?;
                let type_node = self.parse_type()?;
                self.expect(TokenId::SymRightParen)?;
                let expr = self.parse_unary()?;
                let node = self.make(tok, AstKind::CastExpr { type_node, expr });
                if !modifiers.is_empty() {
                    self.set_modifiers(node, modifiers);
                }
                Some(node)
            }
            TokenId::CompilerDefined => {
                // `#defined(name)`: anchored at the identifier token so the
                // name resolves straight from the node.
                self.advance();
                self.expect(TokenId::SymLeftParen)?;
                let name = self.expect(TokenId::Identifier)?;
                self.expect(TokenId::SymRightParen)?;
                Some(self.make(name, AstKind::CompilerDefined))
            }
            TokenId::CompilerFile | TokenId::CompilerLine => {
                let tok = self.advance();
                Some(self.make(tok, AstKind::CompilerLiteral))
            }
            TokenId::IntrinsicSizeOf | TokenId::IntrinsicCountOf => {
                let tok = self.advance();
                self.expect(TokenId::SymLeftParen)?;
                let arg = if self.id().is_type() || self.id() == TokenId::SymAsterisk {
                    self.parse_type()?
                } else {
                    self.parse_expr()?
                };
                self.expect(TokenId::SymRightParen)?;
                let args = self.span(&[arg]);
                Some(self.make(tok, AstKind::IntrinsicExpr { args }))
            }
            id if id.is_type() => {
                // A builtin type name used as a value (cast target, sizeof).
                let tok = self.advance();
                Some(self.make(
                    tok,
                    AstKind::TypeExpr {
                        kind: crate::ast::node::TypeExprKind::Builtin,
                    },
                ))
            }
            _ => {
                self.error_here(DiagnosticId::SynErrExpectedExpression, None);
                None
            }
        }
    }
}
